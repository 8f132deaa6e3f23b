//! Advisory radiance clamp suggestion
//!
//! Computed once from the first frame pulled after a warm-up sample count.
//! The value is only shown to the user; it never feeds back into the render.

use super::framebuffer::Framebuffer;

/// Percentile of pixel luminance used as the suggestion
pub const CLAMP_PERCENTILE: f32 = 0.99;

/// One-shot clamp value estimator
#[derive(Debug, Clone, PartialEq)]
pub struct ClampSuggester {
    warmup_samples: u32,
    suggestion: Option<f32>,
}

impl ClampSuggester {
    /// Suggest once `warmup_samples` samples per pixel were rendered
    pub fn new(warmup_samples: u32) -> Self {
        Self {
            warmup_samples,
            suggestion: None,
        }
    }

    /// Feed a pulled frame; returns the suggestion the one time it is computed
    pub fn observe(&mut self, frame: &Framebuffer, samples: u32) -> Option<f32> {
        if self.suggestion.is_some() || samples < self.warmup_samples {
            return None;
        }
        let value = luminance_percentile(frame, CLAMP_PERCENTILE)?;
        log::info!("Suggested clamp value: {value:.3} (after {samples} samples)");
        self.suggestion = Some(value);
        Some(value)
    }

    /// The suggestion, once computed
    pub fn suggestion(&self) -> Option<f32> {
        self.suggestion
    }

    /// Forget the suggestion (new render)
    pub fn reset(&mut self) {
        self.suggestion = None;
    }
}

/// Luminance below which `percentile` of the finite pixels fall
pub fn luminance_percentile(frame: &Framebuffer, percentile: f32) -> Option<f32> {
    let mut values: Vec<f32> = frame.luminances().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    let rank = ((values.len() - 1) as f32 * percentile.clamp(0.0, 1.0)).round() as usize;
    values.get(rank).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gray_ramp(count: u32) -> Framebuffer {
        let mut frame = Framebuffer::new(count, 1);
        for x in 0..count {
            let v = x as f32 + 1.0;
            frame.set_pixel(x, 0, [v, v, v, 1.0]);
        }
        frame
    }

    #[test]
    fn test_percentile_of_ramp() {
        let frame = gray_ramp(101);
        assert_relative_eq!(luminance_percentile(&frame, 0.99).unwrap(), 100.0, epsilon = 1e-3);
        assert_relative_eq!(luminance_percentile(&frame, 0.0).unwrap(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_suggestion_is_computed_once_after_warmup() {
        let mut suggester = ClampSuggester::new(16);
        let frame = gray_ramp(101);
        assert_eq!(suggester.observe(&frame, 8), None);
        assert!(suggester.observe(&frame, 16).is_some());
        assert_eq!(suggester.observe(&gray_ramp(3), 32), None);
        assert_relative_eq!(suggester.suggestion().unwrap(), 100.0, epsilon = 1e-3);
    }

    #[test]
    fn test_empty_frame_gives_no_suggestion() {
        let mut suggester = ClampSuggester::new(0);
        assert_eq!(suggester.observe(&Framebuffer::new(0, 0), 1), None);
        assert_eq!(suggester.suggestion(), None);
    }
}
