//! Halt conditions
//!
//! Final renders and viewport renders share this evaluation; only the
//! controller's reaction differs (stop versus pause).

use serde::{Deserialize, Serialize};
use std::fmt;

use super::stats::RenderStats;
use crate::props::Properties;

/// Optional stopping criteria, persisted with the render settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HaltConditions {
    /// Stop after `time_secs` of rendering
    pub use_time: bool,
    /// Wall-clock limit in seconds
    pub time_secs: u64,
    /// Stop once `samples` samples per pixel are reached
    pub use_samples: bool,
    /// Sample limit
    pub samples: u32,
    /// Stop once `light_samples` light-path samples are reached
    pub use_light_samples: bool,
    /// Light-path sample limit
    pub light_samples: u32,
    /// Stop once the engine reports full convergence against `noise_threshold`
    pub use_noise_threshold: bool,
    /// Per-pixel noise level counted as converged (0..1)
    pub noise_threshold: f32,
    /// Samples rendered before noise is estimated at all
    pub noise_warmup: u32,
    /// Samples between noise estimates
    pub noise_step: u32,
}

impl Default for HaltConditions {
    fn default() -> Self {
        Self {
            use_time: false,
            time_secs: 60,
            use_samples: false,
            samples: 256,
            use_light_samples: false,
            light_samples: 256,
            use_noise_threshold: false,
            noise_threshold: 0.02,
            noise_warmup: 32,
            noise_step: 32,
        }
    }
}

/// Which condition ended the render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Time limit reached
    Time,
    /// Sample limit reached
    Samples,
    /// Light-path sample limit reached
    LightSamples,
    /// Noise fell below the threshold
    NoiseThreshold,
    /// Viewport auto-pause time exceeded
    ViewportTime,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            HaltReason::Time => "time limit reached",
            HaltReason::Samples => "sample limit reached",
            HaltReason::LightSamples => "light sample limit reached",
            HaltReason::NoiseThreshold => "noise threshold reached",
            HaltReason::ViewportTime => "viewport halt time reached",
        };
        f.write_str(text)
    }
}

impl HaltConditions {
    /// Only a sample limit
    pub fn samples(samples: u32) -> Self {
        Self {
            use_samples: true,
            samples,
            ..Default::default()
        }
    }

    /// Only a time limit
    pub fn time(secs: u64) -> Self {
        Self {
            use_time: true,
            time_secs: secs,
            ..Default::default()
        }
    }

    /// Whether any condition is enabled
    pub fn is_enabled(&self) -> bool {
        self.use_time || self.use_samples || self.use_light_samples || self.use_noise_threshold
    }

    /// Every satisfied condition, in priority order
    pub fn satisfied<'a>(&'a self, stats: &'a RenderStats) -> impl Iterator<Item = HaltReason> + 'a {
        [
            (self.use_time && stats.elapsed_secs >= self.time_secs as f32, HaltReason::Time),
            (self.use_samples && stats.samples >= self.samples, HaltReason::Samples),
            (
                self.use_light_samples && stats.light_samples >= self.light_samples,
                HaltReason::LightSamples,
            ),
            (
                self.use_noise_threshold && stats.samples >= self.noise_warmup && stats.convergence >= 1.0,
                HaltReason::NoiseThreshold,
            ),
        ]
        .into_iter()
        .filter_map(|(met, reason)| met.then_some(reason))
    }

    /// Fraction of the closest enabled limit reached, for progress display
    pub fn progress(&self, stats: &RenderStats) -> Option<f32> {
        let mut fractions = Vec::new();
        if self.use_time && self.time_secs > 0 {
            fractions.push(stats.elapsed_secs / self.time_secs as f32);
        }
        if self.use_samples && self.samples > 0 {
            fractions.push(stats.samples as f32 / self.samples as f32);
        }
        if self.use_light_samples && self.light_samples > 0 {
            fractions.push(stats.light_samples as f32 / self.light_samples as f32);
        }
        if self.use_noise_threshold {
            fractions.push(stats.convergence);
        }
        fractions.into_iter().reduce(f32::max).map(|f| f.clamp(0.0, 1.0))
    }

    /// Engine-side noise estimation settings
    ///
    /// The engine computes convergence itself; only the threshold decision
    /// is taken here.
    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.set_key("film.noiseestimation.warmup", self.noise_warmup);
        props.set_key("film.noiseestimation.step", self.noise_step.max(1));
        if self.use_noise_threshold {
            props.set_key("batch.haltnoisethreshold", self.noise_threshold);
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(samples: u32, secs: f32) -> RenderStats {
        RenderStats {
            samples,
            eye_samples: samples,
            elapsed_secs: secs,
            ..Default::default()
        }
    }

    #[test]
    fn test_sample_limit_triggers_at_threshold_not_before() {
        let halt = HaltConditions::samples(32);
        assert_eq!(halt.satisfied(&stats(31, 100.0)).next(), None);
        assert_eq!(halt.satisfied(&stats(32, 0.0)).next(), Some(HaltReason::Samples));
        assert_eq!(halt.satisfied(&stats(40, 0.0)).next(), Some(HaltReason::Samples));
    }

    #[test]
    fn test_all_satisfied_conditions_are_listed() {
        let halt = HaltConditions {
            use_time: true,
            time_secs: 10,
            use_samples: true,
            samples: 32,
            ..Default::default()
        };
        let met: Vec<HaltReason> = halt.satisfied(&stats(64, 20.0)).collect();
        assert_eq!(met, vec![HaltReason::Time, HaltReason::Samples]);
        assert_eq!(halt.satisfied(&stats(64, 1.0)).collect::<Vec<_>>(), vec![HaltReason::Samples]);
    }

    #[test]
    fn test_disabled_conditions_never_halt() {
        let halt = HaltConditions::default();
        assert!(!halt.is_enabled());
        assert_eq!(halt.satisfied(&stats(1_000_000, 1.0e6)).next(), None);
    }

    #[test]
    fn test_noise_threshold_waits_for_warmup() {
        let halt = HaltConditions {
            use_noise_threshold: true,
            noise_warmup: 16,
            ..Default::default()
        };
        let mut s = stats(8, 1.0);
        s.convergence = 1.0;
        assert_eq!(halt.satisfied(&s).next(), None);
        s.samples = 16;
        assert_eq!(halt.satisfied(&s).next(), Some(HaltReason::NoiseThreshold));
    }

    #[test]
    fn test_progress_uses_closest_limit() {
        let halt = HaltConditions {
            use_time: true,
            time_secs: 10,
            use_samples: true,
            samples: 100,
            ..Default::default()
        };
        let progress = halt.progress(&stats(25, 5.0)).unwrap();
        assert!((progress - 0.5).abs() < 1e-6);
        assert_eq!(HaltConditions::default().progress(&stats(1, 1.0)), None);
    }

    #[test]
    fn test_halt_conditions_round_trip_through_toml() {
        let halt = HaltConditions::samples(64);
        let text = toml::to_string(&halt).unwrap();
        let back: HaltConditions = toml::from_str(&text).unwrap();
        assert_eq!(back, halt);
    }
}
