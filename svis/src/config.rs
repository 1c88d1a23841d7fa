//! Engine configuration, read once at startup and immutable afterwards.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// [Hz] Camera trigger rate written into the setup frame
    pub camera_rate: u8,

    /// Gyro full-scale selector, 0..=3
    pub gyro_sens: u8,

    /// Accelerometer full-scale selector, 0..=3
    pub acc_sens: u8,

    /// Window size of the IMU moving average
    pub imu_filter_size: usize,

    /// Offset samples to collect before freezing the clock offset
    pub offset_sample_count: usize,

    /// [s] Minimum wait after an alignment pulse before sampling
    pub offset_sample_time: f64,

    /// [s] Age beyond which unmatched strobes and images are dropped
    pub stale_age: f64,

    /// Hex-dump every accepted report frame at trace level
    pub dump_frames: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_rate: 30,
            gyro_sens: 0,
            acc_sens: 0,
            imu_filter_size: 5,
            offset_sample_count: 100,
            offset_sample_time: 0.5,
            stale_age: 1.0,
            dump_frames: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gyro_sens > 3 {
            return Err(ConfigError::SelectorOutOfRange {
                name: "gyro_sens",
                value: self.gyro_sens,
            });
        }
        if self.acc_sens > 3 {
            return Err(ConfigError::SelectorOutOfRange {
                name: "acc_sens",
                value: self.acc_sens,
            });
        }
        if self.imu_filter_size == 0 {
            return Err(ConfigError::ZeroCount {
                name: "imu_filter_size",
            });
        }
        if self.offset_sample_count == 0 {
            return Err(ConfigError::ZeroCount {
                name: "offset_sample_count",
            });
        }
        if self.offset_sample_time < 0.0 {
            return Err(ConfigError::NegativeSeconds {
                name: "offset_sample_time",
                value: self.offset_sample_time,
            });
        }
        if self.stale_age < 0.0 {
            return Err(ConfigError::NegativeSeconds {
                name: "stale_age",
                value: self.stale_age,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn selectors_out_of_range_are_rejected() {
        let config = Config {
            gyro_sens: 4,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            acc_sens: 200,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_window_is_rejected() {
        let config = Config {
            imu_filter_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn serde_roundtrip_with_partial_input() {
        let config = Config {
            camera_rate: 60,
            imu_filter_size: 2,
            ..Default::default()
        };
        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);

        // Missing fields fall back to defaults.
        let partial: Config = serde_json::from_str(r#"{"camera_rate": 15}"#).unwrap();
        assert_eq!(partial.camera_rate, 15);
        assert_eq!(partial.offset_sample_count, 100);
    }
}
