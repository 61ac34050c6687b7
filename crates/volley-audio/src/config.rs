//! Engine configuration.
//!
//! Pool sizing, category routes and default volumes, pitch limits and the
//! timing margins used by the watchdog and auto-detach tasks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use volley_common::{AudioCategory, ConfigError};
use volley_kernel::BusRoute;

/// Route and default volume for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRoute {
    /// Mixer bus name.
    pub bus: String,
    /// Exposed decibel parameter controlling the bus volume.
    pub volume_parameter: String,
    /// Linear volume applied at startup (0.0-1.0).
    pub default_volume: f32,
}

impl CategoryRoute {
    /// Conventional route for a category with its stock default volume.
    #[must_use]
    pub fn conventional(category: AudioCategory) -> Self {
        let route = BusRoute::conventional(category);
        Self {
            bus: route.bus,
            volume_parameter: route.volume_parameter,
            default_volume: category.default_volume(),
        }
    }

    /// The routing part, as the bus router wants it.
    #[must_use]
    pub fn bus_route(&self) -> BusRoute {
        BusRoute {
            bus: self.bus.clone(),
            volume_parameter: self.volume_parameter.clone(),
        }
    }
}

/// Audio engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Channels constructed up front.
    pub initial_pool_size: usize,
    /// Pool size above which a one-time capacity warning is logged.
    pub pool_capacity_warning: usize,
    /// Name of the master volume parameter.
    pub master_parameter: String,
    /// Master volume applied at startup (0.0-1.0).
    pub master_volume: f32,
    /// Category routes. Categories left out are unrouted.
    pub categories: BTreeMap<AudioCategory, CategoryRoute>,
    /// Lowest allowed playback pitch.
    pub min_pitch: f32,
    /// Highest allowed playback pitch.
    pub max_pitch: f32,
    /// Seconds added to a clip's length before the watchdog reclaims it.
    pub lifetime_margin: f32,
    /// Seconds added to a clip's length before auto-detach starts polling.
    pub detach_margin: f32,
    /// Seed for volume/pitch jitter (None = random).
    pub random_seed: Option<u64>,
    /// Events, and resolved but unpolled wait tickets, kept before the
    /// oldest are dropped.
    pub max_queued_events: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            initial_pool_size: 8,
            pool_capacity_warning: 64,
            master_parameter: "master_volume".to_string(),
            master_volume: 1.0,
            categories: AudioCategory::ALL
                .into_iter()
                .map(|category| (category, CategoryRoute::conventional(category)))
                .collect(),
            min_pitch: 0.1,
            max_pitch: 4.0,
            lifetime_margin: 0.5,
            detach_margin: 0.1,
            random_seed: None,
            max_queued_events: 256,
        }
    }
}

impl AudioConfig {
    /// Sets the number of channels constructed up front.
    #[must_use]
    pub fn with_initial_pool_size(mut self, size: usize) -> Self {
        self.initial_pool_size = size;
        self
    }

    /// Sets the capacity warning threshold.
    #[must_use]
    pub fn with_capacity_warning(mut self, size: usize) -> Self {
        self.pool_capacity_warning = size;
        self
    }

    /// Sets the master parameter name.
    #[must_use]
    pub fn with_master_parameter(mut self, name: impl Into<String>) -> Self {
        self.master_parameter = name.into();
        self
    }

    /// Replaces one category route.
    #[must_use]
    pub fn with_category(mut self, category: AudioCategory, route: CategoryRoute) -> Self {
        self.categories.insert(category, route);
        self
    }

    /// Leaves a category unrouted.
    #[must_use]
    pub fn without_category(mut self, category: AudioCategory) -> Self {
        self.categories.remove(&category);
        self
    }

    /// Sets the pitch limits.
    #[must_use]
    pub fn with_pitch_range(mut self, min: f32, max: f32) -> Self {
        self.min_pitch = min;
        self.max_pitch = max;
        self
    }

    /// Seeds the jitter generator.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Reports values that cannot be used as given.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.master_parameter.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "master_parameter",
                message: "must not be empty".to_string(),
            });
        }
        if !(self.min_pitch > 0.0 && self.min_pitch <= self.max_pitch) {
            return Err(ConfigError::InvalidValue {
                field: "min_pitch",
                message: format!(
                    "expected 0 < min_pitch <= max_pitch, got {} / {}",
                    self.min_pitch, self.max_pitch
                ),
            });
        }
        if let Some((category, _)) = self
            .categories
            .iter()
            .find(|(_, route)| route.volume_parameter.is_empty())
        {
            return Err(ConfigError::InvalidValue {
                field: "categories",
                message: format!("{category} has an empty volume parameter"),
            });
        }
        Ok(())
    }

    /// Clamps values into their valid ranges.
    pub fn validate(&mut self) {
        self.master_volume = self.master_volume.clamp(0.0, 1.0);
        self.min_pitch = self.min_pitch.clamp(0.01, 16.0);
        self.max_pitch = self.max_pitch.clamp(self.min_pitch, 16.0);
        self.lifetime_margin = self.lifetime_margin.max(0.0);
        self.detach_margin = self.detach_margin.max(0.0);
        self.max_queued_events = self.max_queued_events.max(1);
        if self.pool_capacity_warning < self.initial_pool_size {
            warn!(
                "pool_capacity_warning {} below initial_pool_size {}, raising it",
                self.pool_capacity_warning, self.initial_pool_size
            );
            self.pool_capacity_warning = self.initial_pool_size;
        }
        for route in self.categories.values_mut() {
            route.default_volume = route.default_volume.clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AudioConfig::default();
        assert_eq!(config.initial_pool_size, 8);
        assert_eq!(config.categories.len(), AudioCategory::COUNT);
        let music = &config.categories[&AudioCategory::Music];
        assert_eq!(music.volume_parameter, "music_volume");
        assert!((music.default_volume - 0.7).abs() < f32::EPSILON);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = AudioConfig {
            master_volume: 2.0,
            min_pitch: -1.0,
            max_pitch: 100.0,
            lifetime_margin: -3.0,
            max_queued_events: 0,
            pool_capacity_warning: 2,
            ..AudioConfig::default()
        };
        config.validate();

        assert!((config.master_volume - 1.0).abs() < f32::EPSILON);
        assert!((config.min_pitch - 0.01).abs() < f32::EPSILON);
        assert!((config.max_pitch - 16.0).abs() < f32::EPSILON);
        assert!(config.lifetime_margin.abs() < f32::EPSILON);
        assert_eq!(config.max_queued_events, 1);
        assert_eq!(config.pool_capacity_warning, config.initial_pool_size);
    }

    #[test]
    fn test_check_rejects_bad_pitch() {
        let config = AudioConfig::default().with_pitch_range(2.0, 1.0);
        assert!(matches!(
            config.check(),
            Err(ConfigError::InvalidValue { field: "min_pitch", .. })
        ));
    }

    #[test]
    fn test_toml_roundtrip_partial() {
        let config: AudioConfig = toml::from_str(
            r#"
            initial_pool_size = 4
            [categories.voice]
            bus = "dialogue"
            volume_parameter = "dialogue_volume"
            default_volume = 0.9
            "#,
        )
        .expect("parse");

        assert_eq!(config.initial_pool_size, 4);
        // a categories table replaces the default map
        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.categories[&AudioCategory::Voice].bus, "dialogue");
        assert_eq!(config.master_parameter, "master_volume");
    }
}
