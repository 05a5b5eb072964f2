//! Tunable settings for the sensor network.
//!
//! All values are plain numbers with defaults, so a TOML table may name any
//! subset of them.

use crate::error::NetworkError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_interaction_radius() -> f64 {
    16.0
}

fn default_max_propagation_distance() -> f64 {
    1000.0
}

fn default_propagation_delay_ticks() -> u64 {
    5
}

fn default_activation_window_ticks() -> u64 {
    10
}

fn default_max_hot_regions() -> usize {
    50
}

fn default_max_hot_lifetime_ms() -> u64 {
    30_000
}

fn default_release_check_delay_ticks() -> u64 {
    100
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Settings consumed by [`SignalNetwork`](crate::SignalNetwork) and its components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Maximum distance between two nodes for them to be connected
    #[serde(default = "default_interaction_radius")]
    pub interaction_radius: f64,
    /// Distance budget for reachability from a signal source
    #[serde(default = "default_max_propagation_distance")]
    pub max_propagation_distance: f64,
    /// Ticks between consecutive hops of a propagating signal
    #[serde(default = "default_propagation_delay_ticks")]
    pub propagation_delay_ticks: u64,
    /// Ticks a node stays active after a hop reaches it
    #[serde(default = "default_activation_window_ticks")]
    pub activation_window_ticks: u64,
    /// Maximum number of simultaneously hot regions
    #[serde(default = "default_max_hot_regions")]
    pub max_hot_regions: usize,
    /// Idle time after which a hot region is released, in milliseconds
    #[serde(default = "default_max_hot_lifetime_ms")]
    pub max_hot_lifetime_ms: u64,
    /// Ticks after activation at which a region's own expiry check runs
    #[serde(default = "default_release_check_delay_ticks")]
    pub release_check_delay_ticks: u64,
    /// Period of the background sweep, in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            interaction_radius: default_interaction_radius(),
            max_propagation_distance: default_max_propagation_distance(),
            propagation_delay_ticks: default_propagation_delay_ticks(),
            activation_window_ticks: default_activation_window_ticks(),
            max_hot_regions: default_max_hot_regions(),
            max_hot_lifetime_ms: default_max_hot_lifetime_ms(),
            release_check_delay_ticks: default_release_check_delay_ticks(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl NetworkSettings {
    pub fn max_hot_lifetime(&self) -> Duration {
        Duration::from_millis(self.max_hot_lifetime_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Checks the settings for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), NetworkError> {
        if !self.interaction_radius.is_finite() || self.interaction_radius <= 0.0 {
            return Err(NetworkError::InvalidConfig(format!(
                "interaction_radius must be a positive number, got {}",
                self.interaction_radius
            )));
        }
        if !self.max_propagation_distance.is_finite() || self.max_propagation_distance < 0.0 {
            return Err(NetworkError::InvalidConfig(format!(
                "max_propagation_distance must be a non-negative number, got {}",
                self.max_propagation_distance
            )));
        }
        if self.propagation_delay_ticks == 0 {
            return Err(NetworkError::InvalidConfig(
                "propagation_delay_ticks must be at least 1".to_string(),
            ));
        }
        if self.activation_window_ticks == 0 {
            return Err(NetworkError::InvalidConfig(
                "activation_window_ticks must be at least 1".to_string(),
            ));
        }
        if self.max_hot_regions == 0 {
            return Err(NetworkError::InvalidConfig(
                "max_hot_regions must be at least 1".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(NetworkError::InvalidConfig(
                "sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = NetworkSettings::default();
        assert_eq!(settings.interaction_radius, 16.0);
        assert_eq!(settings.max_propagation_distance, 1000.0);
        assert_eq!(settings.propagation_delay_ticks, 5);
        assert_eq!(settings.activation_window_ticks, 10);
        assert_eq!(settings.max_hot_regions, 50);
        assert_eq!(settings.max_hot_lifetime(), Duration::from_secs(30));
        assert_eq!(settings.release_check_delay_ticks, 100);
        assert_eq!(settings.sweep_interval(), Duration::from_secs(60));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: NetworkSettings = toml::from_str(
            r#"
interaction_radius = 24.0
max_hot_regions = 8
"#,
        )
        .unwrap();

        assert_eq!(settings.interaction_radius, 24.0);
        assert_eq!(settings.max_hot_regions, 8);
        assert_eq!(settings.propagation_delay_ticks, 5);
        assert_eq!(settings.max_hot_lifetime_ms, 30_000);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut settings = NetworkSettings::default();
        settings.interaction_radius = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = NetworkSettings::default();
        settings.max_propagation_distance = f64::NAN;
        assert!(settings.validate().is_err());

        let mut settings = NetworkSettings::default();
        settings.max_hot_regions = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("max_hot_regions"));

        let mut settings = NetworkSettings::default();
        settings.activation_window_ticks = 0;
        assert!(settings.validate().is_err());
    }
}
