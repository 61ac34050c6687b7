//! Category routing.
//!
//! A [`BusRouter`] maps each category to a mixer bus and exposes named
//! bus parameters in decibels. [`ParameterMixer`] is the in-process router
//! used when no external mixing graph is present.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use volley_common::{AudioCategory, CategoryTable};

/// A category's bus and the parameter that controls its volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusHandle {
    /// Category routed to this bus.
    pub category: AudioCategory,
    /// Bus name.
    pub name: Arc<str>,
    /// Name of the exposed volume parameter (decibels).
    pub volume_parameter: Arc<str>,
}

/// Serializable description of one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusRoute {
    /// Bus name.
    pub bus: String,
    /// Volume parameter name.
    pub volume_parameter: String,
}

impl BusRoute {
    /// Conventional route for a category: bus `"sfx"`, parameter `"sfx_volume"`.
    #[must_use]
    pub fn conventional(category: AudioCategory) -> Self {
        Self {
            bus: category.name().to_string(),
            volume_parameter: format!("{}_volume", category.name()),
        }
    }
}

/// Category → bus routing with named decibel parameters.
pub trait BusRouter: fmt::Debug {
    /// Bus for a category, if routed.
    fn bus(&self, category: AudioCategory) -> Option<BusHandle>;

    /// Sets a parameter. Returns `false` if the parameter is not exposed.
    fn set_parameter(&mut self, name: &str, db: f32) -> bool;

    /// Reads a parameter.
    fn parameter(&self, name: &str) -> Option<f32>;
}

/// In-process router with a fixed route table.
#[derive(Debug, Clone)]
pub struct ParameterMixer {
    routes: CategoryTable<Option<BusHandle>>,
    parameters: AHashMap<String, f32>,
}

impl ParameterMixer {
    /// Creates a router exposing only the master parameter.
    #[must_use]
    pub fn new(master_parameter: &str) -> Self {
        let mut parameters = AHashMap::new();
        parameters.insert(master_parameter.to_string(), 0.0);
        Self {
            routes: CategoryTable::default(),
            parameters,
        }
    }

    /// Creates a router with the conventional route for every category.
    #[must_use]
    pub fn with_conventional_routes(master_parameter: &str) -> Self {
        AudioCategory::ALL
            .into_iter()
            .fold(Self::new(master_parameter), |mixer, category| {
                mixer.with_route(category, &BusRoute::conventional(category))
            })
    }

    /// Adds (or replaces) the route for a category and exposes its parameter at 0 dB.
    #[must_use]
    pub fn with_route(mut self, category: AudioCategory, route: &BusRoute) -> Self {
        self.parameters
            .entry(route.volume_parameter.clone())
            .or_insert(0.0);
        *self.routes.get_mut(category) = Some(BusHandle {
            category,
            name: Arc::from(route.bus.as_str()),
            volume_parameter: Arc::from(route.volume_parameter.as_str()),
        });
        debug!("Routed {} -> bus '{}'", category, route.bus);
        self
    }

    /// Removes the route for a category.
    pub fn unroute(&mut self, category: AudioCategory) {
        *self.routes.get_mut(category) = None;
    }
}

impl BusRouter for ParameterMixer {
    fn bus(&self, category: AudioCategory) -> Option<BusHandle> {
        self.routes.get(category).clone()
    }

    fn set_parameter(&mut self, name: &str, db: f32) -> bool {
        match self.parameters.get_mut(name) {
            Some(value) => {
                *value = db;
                true
            },
            None => false,
        }
    }

    fn parameter(&self, name: &str) -> Option<f32> {
        self.parameters.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conventional_routes() {
        let mixer = ParameterMixer::with_conventional_routes("master_volume");
        let bus = mixer.bus(AudioCategory::Music).expect("music routed");
        assert_eq!(&*bus.name, "music");
        assert_eq!(&*bus.volume_parameter, "music_volume");
        assert_eq!(mixer.parameter("music_volume"), Some(0.0));
        assert_eq!(mixer.parameter("master_volume"), Some(0.0));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let mut mixer = ParameterMixer::new("master_volume");
        assert!(!mixer.set_parameter("nope", -6.0));
        assert!(mixer.set_parameter("master_volume", -6.0));
        assert_eq!(mixer.parameter("master_volume"), Some(-6.0));
    }

    #[test]
    fn test_unrouted_category() {
        let mut mixer = ParameterMixer::with_conventional_routes("master_volume");
        mixer.unroute(AudioCategory::Voice);
        assert!(mixer.bus(AudioCategory::Voice).is_none());
        assert!(mixer.bus(AudioCategory::Sfx).is_some());
    }
}
