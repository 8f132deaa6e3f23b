//! Live render statistics parsed from the engine's stats properties

use crate::props::Properties;

/// Memory usage of one render device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMemory {
    /// Device identifier
    pub name: String,
    /// Bytes in use
    pub used: u64,
    /// Bytes available
    pub total: u64,
}

/// Snapshot of the engine's progress
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderStats {
    /// Seconds spent rendering
    pub elapsed_secs: f32,
    /// Samples per pixel
    pub samples: u32,
    /// Eye-path samples per pixel
    pub eye_samples: u32,
    /// Light-path samples per pixel
    pub light_samples: u32,
    /// Fraction of pixels below the noise threshold (0..1)
    pub convergence: f32,
    /// Throughput in samples per second
    pub samples_per_sec: f32,
    /// Per-device memory usage
    pub devices: Vec<DeviceMemory>,
}

impl RenderStats {
    /// Parse the `stats.*` properties reported by the engine.
    ///
    /// Missing keys read as zero, so a session that has not produced a pass
    /// yet reports `samples == 0`.
    pub fn from_properties(props: &Properties) -> Self {
        let samples = to_u32(props.get_i64("stats.renderengine.pass", 0));
        let devices = props
            .get_unique_sub_names("stats.devices")
            .into_iter()
            .map(|name| {
                let prefix = format!("stats.devices.{name}.memory");
                DeviceMemory {
                    used: to_u64(props.get_i64(&format!("{prefix}.used"), 0)),
                    total: to_u64(props.get_i64(&format!("{prefix}.total"), 0)),
                    name,
                }
            })
            .collect();

        Self {
            elapsed_secs: props.get_f32("stats.renderengine.time", 0.0),
            samples,
            eye_samples: to_u32(props.get_i64("stats.renderengine.pass.eye", i64::from(samples))),
            light_samples: to_u32(props.get_i64("stats.renderengine.pass.light", 0)),
            convergence: props.get_f32("stats.renderengine.convergence", 0.0).clamp(0.0, 1.0),
            samples_per_sec: props.get_f32("stats.renderengine.total.samplesec", 0.0),
            devices,
        }
    }

    /// Largest memory use over all devices, in bytes
    pub fn peak_memory(&self) -> u64 {
        self.devices.iter().map(|d| d.used).max().unwrap_or(0)
    }

    /// One-line status text
    pub fn summary(&self) -> String {
        let mut text = format!("Time: {:.1}s | Samples: {}", self.elapsed_secs, self.samples);
        if self.light_samples > 0 {
            text.push_str(&format!(" (light: {})", self.light_samples));
        }
        if self.convergence > 0.0 {
            text.push_str(&format!(" | Convergence: {:.0}%", self.convergence * 100.0));
        }
        if self.samples_per_sec > 0.0 {
            text.push_str(&format!(" | {:.2} MS/s", self.samples_per_sec / 1.0e6));
        }
        let peak = self.peak_memory();
        if peak > 0 {
            text.push_str(&format!(" | Memory: {:.1} MiB", peak as f64 / (1024.0 * 1024.0)));
        }
        text
    }
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value.max(0)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stats_properties() {
        let text = "\
stats.renderengine.time = 2.5
stats.renderengine.pass = 48
stats.renderengine.pass.light = 12
stats.renderengine.convergence = 0.25
stats.devices.cpu.memory.used = 1048576
stats.devices.cpu.memory.total = 8388608
";
        let stats = RenderStats::from_properties(&Properties::parse(text).unwrap());
        assert_eq!(stats.samples, 48);
        assert_eq!(stats.eye_samples, 48);
        assert_eq!(stats.light_samples, 12);
        assert_eq!(stats.devices.len(), 1);
        assert_eq!(stats.devices[0].name, "cpu");
        assert_eq!(stats.peak_memory(), 1_048_576);
    }

    #[test]
    fn test_empty_stats_read_as_zero() {
        let stats = RenderStats::from_properties(&Properties::new());
        assert_eq!(stats, RenderStats::default());
    }

    #[test]
    fn test_summary_mentions_samples_and_memory() {
        let stats = RenderStats {
            elapsed_secs: 1.0,
            samples: 8,
            devices: vec![DeviceMemory {
                name: "cpu".to_string(),
                used: 2 * 1024 * 1024,
                total: 0,
            }],
            ..Default::default()
        };
        assert_eq!(stats.summary(), "Time: 1.0s | Samples: 8 | Memory: 2.0 MiB");
    }
}
