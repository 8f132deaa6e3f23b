//! Persisted bridge settings
//!
//! Render settings, halt conditions and refresh cadence live in one
//! [`BridgeConfig`] that is loaded from and saved to TOML or RON files through
//! the [`Config`] trait.

use std::path::Path;
use std::time::Duration;

pub use serde::{Deserialize, Serialize};

use crate::diagnostics::{ErrorLog, DEFAULT_CAPACITY};
use crate::display::{DisplayRefresher, RefreshSettings};
use crate::scene::{FilmSize, ImagePipeline, RenderSettings, Scene};
use crate::session::{HaltConditions, RenderEngine, RenderMode, SessionController};

/// File formats understood by [`Config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.ron`
    Ron,
}

impl ConfigFormat {
    /// Format implied by the file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("ron") => Ok(ConfigFormat::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Serializable settings with file persistence
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Parse from a string in the given format
    fn from_str_as(contents: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Toml => toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
            ConfigFormat::Ron => ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Serialize to a string in the given format
    fn to_string_as(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        match format {
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string())),
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string())),
        }
    }

    /// Load from a `.toml` or `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        Self::from_str_as(&contents, format)
    }

    /// Save to a `.toml` or `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = self.to_string_as(ConfigFormat::from_path(path)?)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything the bridge persists between editor sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// `env_logger` filter used by the demo and hosts without their own logger
    pub log_level: String,
    /// Integrator settings for new scenes
    pub render: RenderSettings,
    /// Final render resolution for new scenes
    pub film: FilmSize,
    /// Post-processing for new scenes
    pub image_pipeline: ImagePipeline,
    /// When final renders stop
    pub halt: HaltConditions,
    /// Refresh cadence of final renders
    pub final_refresh: RefreshSettings,
    /// Refresh cadence of viewport renders
    pub viewport_refresh: RefreshSettings,
    /// Seconds after which an idle viewport render pauses itself
    pub viewport_halt_secs: Option<f32>,
    /// Distinct warnings and errors kept per job
    pub error_log_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            render: RenderSettings::default(),
            film: FilmSize::default(),
            image_pipeline: ImagePipeline::default(),
            halt: HaltConditions::default(),
            final_refresh: RefreshSettings::final_render(),
            viewport_refresh: RefreshSettings::viewport(),
            viewport_halt_secs: Some(60.0),
            error_log_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Config for BridgeConfig {}

impl BridgeConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.film.width == 0 || self.film.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "Film size must be non-zero, got {}x{}",
                self.film.width, self.film.height
            )));
        }
        if self.error_log_capacity == 0 {
            return Err(ConfigError::Invalid("Error log capacity must be at least 1".to_string()));
        }
        if self.viewport_halt_secs.is_some_and(|s| !s.is_finite() || s < 0.0) {
            return Err(ConfigError::Invalid("Viewport halt time must be a positive number".to_string()));
        }
        for refresh in [&self.final_refresh, &self.viewport_refresh] {
            if refresh.stats_interval_secs <= 0.0 || refresh.display_interval_secs <= 0.0 {
                return Err(ConfigError::Invalid("Refresh intervals must be positive".to_string()));
            }
        }
        Ok(())
    }

    /// Copy render, film and image pipeline defaults into a scene
    pub fn apply_to(&self, scene: &mut Scene) {
        scene.render = self.render.clone();
        scene.film = self.film;
        scene.image_pipeline = self.image_pipeline.clone();
    }

    /// Session controller configured for `mode`
    ///
    /// Viewport renders ignore the final-render halt conditions and pause
    /// after [`Self::viewport_halt_secs`] instead.
    pub fn controller<E: RenderEngine>(&self, engine: E, mode: RenderMode) -> SessionController<E> {
        let halt = match mode {
            RenderMode::Final => self.halt.clone(),
            RenderMode::Viewport => HaltConditions::default(),
        };
        let controller = SessionController::new(engine, mode, halt)
            .with_error_log(ErrorLog::with_capacity(self.error_log_capacity));
        match (mode, self.viewport_halt_secs) {
            (RenderMode::Viewport, Some(secs)) => {
                controller.with_viewport_halt_time(Duration::try_from_secs_f32(secs).unwrap_or(Duration::MAX))
            }
            _ => controller,
        }
    }

    /// Display refresher with the cadence for `mode`
    pub fn refresher(&self, mode: RenderMode) -> DisplayRefresher {
        let settings = match mode {
            RenderMode::Final => self.final_refresh.clone(),
            RenderMode::Viewport => self.viewport_refresh.clone(),
        };
        DisplayRefresher::new(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::EngineKind;
    use crate::session::SimulatedEngine;

    fn custom() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.render.engine = EngineKind::BidirCpu;
        config.halt = HaltConditions::samples(64);
        config.viewport_halt_secs = Some(30.0);
        config
    }

    #[test]
    fn test_toml_and_ron_round_trip() {
        let config = custom();
        for format in [ConfigFormat::Toml, ConfigFormat::Ron] {
            let text = config.to_string_as(format).unwrap();
            let parsed = BridgeConfig::from_str_as(&text, format).unwrap();
            assert_eq!(parsed, config);
        }
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("scene_bridge_config_{}.toml", std::process::id()));
        let config = custom();
        config.save_to_file(&path).unwrap();
        let loaded = BridgeConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed = BridgeConfig::from_str_as("error_log_capacity = 10\n", ConfigFormat::Toml).unwrap();
        assert_eq!(parsed.error_log_capacity, 10);
        assert_eq!(parsed.final_refresh, RefreshSettings::final_render());
    }

    #[test]
    fn test_unsupported_extension() {
        let err = BridgeConfig::load_from_file("settings.json").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_validate_rejects_empty_film() {
        let mut config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        config.film.width = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_controller_by_mode() {
        let config = custom();
        let final_render = config.controller(SimulatedEngine::default(), RenderMode::Final);
        assert_eq!(final_render.halt_conditions(), &HaltConditions::samples(64));
        let viewport = config.controller(SimulatedEngine::default(), RenderMode::Viewport);
        assert!(!viewport.halt_conditions().is_enabled());
    }
}
