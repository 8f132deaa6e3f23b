//! Display refresh: frame buffers, refresh cadence and clamp suggestion

pub mod clamp;
pub mod framebuffer;
pub mod refresher;

pub use clamp::{luminance_percentile, ClampSuggester, CLAMP_PERCENTILE};
pub use framebuffer::{DisplaySurface, Framebuffer};
pub use refresher::{DisplayRefresher, DriveStatus, RefreshActions, RefreshPhase, RefreshSettings};
