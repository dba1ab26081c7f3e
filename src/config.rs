use crate::alert::AlertCategory;
use crate::error::ConfigError;
use crate::queue::MAX_QUEUE_CAPACITY;
use crate::sensor::{SensorStream, StreamProfile};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueSettings {
    pub dir: PathBuf,
    /// Messages each queue can hold over its lifetime.
    pub capacity: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            capacity: 65_536,
        }
    }
}

/// Window overrides for one stream family. Unset fields keep the stream's
/// built-in profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSettings {
    pub capacity: Option<usize>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertSettings {
    pub smoker_log: PathBuf,
    pub food_log: PathBuf,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            smoker_log: PathBuf::from(AlertCategory::SmokerStall.default_log_file()),
            food_log: PathBuf::from(AlertCategory::FoodStall.default_log_file()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplaySettings {
    pub interval_secs: u64,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

impl ReplaySettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSettings {
    pub pin_cores: bool,
    /// Log a progress line every this many readings per stream.
    pub progress_interval: usize,
    /// Log evaluation latency every this many readings per stream.
    pub latency_report_interval: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            pin_cores: false,
            progress_interval: 100,
            latency_report_interval: 1_000,
        }
    }
}

/// Everything both the producer and the monitor can be tuned with.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub queues: QueueSettings,
    pub smoker: WindowSettings,
    pub food: WindowSettings,
    pub alerts: AlertSettings,
    pub replay: ReplaySettings,
    pub runtime: RuntimeSettings,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, window) in [("smoker", &self.smoker), ("food", &self.food)] {
            if window.capacity == Some(0) {
                return Err(ConfigError::Invalid(format!("{name}.capacity must be at least 1")));
            }
            if let Some(threshold) = window.threshold
                && (!threshold.is_finite() || threshold < 0.0)
            {
                return Err(ConfigError::Invalid(format!(
                    "{name}.threshold must be a finite, non-negative number of degrees"
                )));
            }
        }
        if self.queues.capacity == 0 || self.queues.capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "queues.capacity must be between 1 and {MAX_QUEUE_CAPACITY}"
            )));
        }
        if self.runtime.progress_interval == 0 || self.runtime.latency_report_interval == 0 {
            return Err(ConfigError::Invalid("runtime intervals must be at least 1".into()));
        }
        Ok(())
    }

    pub fn profile(&self, stream: SensorStream) -> StreamProfile {
        let window = match stream {
            SensorStream::Smoker => self.smoker,
            SensorStream::FoodA | SensorStream::FoodB => self.food,
        };
        let builtin = stream.default_profile();
        StreamProfile::new(
            window.capacity.unwrap_or(builtin.capacity),
            stream.rule_with_threshold(window.threshold.unwrap_or(builtin.rule.threshold())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stall::StallRule;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.profile(SensorStream::Smoker), SensorStream::Smoker.default_profile());
        assert_eq!(config.profile(SensorStream::FoodB), SensorStream::FoodB.default_profile());
        assert_eq!(config.replay.interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_overrides_apply_per_section() {
        let config = Config::from_toml(
            r#"
            [queues]
            dir = "/var/lib/stall-watch"

            [food]
            capacity = 10
            threshold = 0.5

            [replay]
            interval_secs = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.queues.dir, PathBuf::from("/var/lib/stall-watch"));
        assert_eq!(config.queues.capacity, 65_536);
        let food = config.profile(SensorStream::FoodA);
        assert_eq!(food.capacity, 10);
        assert_eq!(food.rule, StallRule::RangePlateau { threshold: 0.5 });
        assert_eq!(config.profile(SensorStream::Smoker).capacity, 5);
    }

    #[test]
    fn test_partial_section_keeps_builtin_values() {
        let config = Config::from_toml("[smoker]\nthreshold = 10.0\n").unwrap();
        let smoker = config.profile(SensorStream::Smoker);
        assert_eq!(smoker.capacity, 5);
        assert_eq!(smoker.rule, StallRule::DecreasingDelta { threshold: 10.0 });
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = Config::from_toml("[smoker]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_oversized_queue_capacity() {
        let err = Config::from_toml("[queues]\ncapacity = 100000000000000000\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(Config::from_toml(&format!("[queues]\ncapacity = {MAX_QUEUE_CAPACITY}\n")).is_ok());
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let err = Config::from_toml("[food]\nthreshold = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(matches!(
            Config::from_toml("[smoker]\ncapacity = 5\nthreshold = 15.0\nwindow = 3\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
