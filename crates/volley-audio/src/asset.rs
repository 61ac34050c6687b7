//! Asset descriptors and per-call playback parameters.

use serde::{Deserialize, Serialize};
use volley_common::{AssetId, AudioCategory};
use volley_kernel::ClipRef;

/// Default random volume factor range.
pub const DEFAULT_RANDOM_VOLUME: RandomRange = RandomRange { min: 0.9, max: 1.1 };

/// Default random pitch factor range.
pub const DEFAULT_RANDOM_PITCH: RandomRange = RandomRange { min: 0.95, max: 1.05 };

/// Immutable description of a playable sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAsset {
    /// Catalog ID.
    pub id: AssetId,
    /// Waveform reference.
    pub clip: ClipRef,
    /// Base volume (0.0-1.0).
    #[serde(default = "unit")]
    pub default_volume: f32,
    /// Base playback speed.
    #[serde(default = "unit")]
    pub default_pitch: f32,
    /// Whether the clip repeats by default.
    #[serde(default)]
    pub looping: bool,
    /// 0.0 = flat 2D, 1.0 = fully positional.
    #[serde(default)]
    pub spatial_blend: f32,
    /// Full-volume radius for positional playback.
    #[serde(default = "unit")]
    pub min_distance: f32,
    /// Distance at which attenuation stops.
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
    /// Importance hint for hosts (higher = more important).
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Minimum seconds between accepted plays of this asset.
    #[serde(default)]
    pub min_time_between_plays: f32,
    /// Maximum simultaneous instances (0 = unlimited).
    #[serde(default)]
    pub max_concurrent_instances: u32,
    /// Mixer category.
    #[serde(default)]
    pub category: AudioCategory,
}

fn unit() -> f32 {
    1.0
}

fn default_max_distance() -> f32 {
    500.0
}

fn default_priority() -> u8 {
    128
}

impl AudioAsset {
    /// Creates a flat, one-shot sound effect with neutral defaults.
    #[must_use]
    pub fn new(id: impl Into<AssetId>, clip: ClipRef) -> Self {
        Self {
            id: id.into(),
            clip,
            default_volume: 1.0,
            default_pitch: 1.0,
            looping: false,
            spatial_blend: 0.0,
            min_distance: 1.0,
            max_distance: default_max_distance(),
            priority: default_priority(),
            min_time_between_plays: 0.0,
            max_concurrent_instances: 0,
            category: AudioCategory::Sfx,
        }
    }

    /// Sets the base volume.
    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.default_volume = volume;
        self
    }

    /// Sets the base pitch.
    #[must_use]
    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.default_pitch = pitch;
        self
    }

    /// Sets looping.
    #[must_use]
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Sets the spatial blend.
    #[must_use]
    pub fn with_spatial_blend(mut self, blend: f32) -> Self {
        self.spatial_blend = blend;
        self
    }

    /// Sets the attenuation distances.
    #[must_use]
    pub fn with_distances(mut self, min: f32, max: f32) -> Self {
        self.min_distance = min;
        self.max_distance = max;
        self
    }

    /// Sets the priority hint.
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the replay throttle.
    #[must_use]
    pub fn with_min_interval(mut self, seconds: f32) -> Self {
        self.min_time_between_plays = seconds;
        self
    }

    /// Sets the instance cap.
    #[must_use]
    pub fn with_max_instances(mut self, max: u32) -> Self {
        self.max_concurrent_instances = max;
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: AudioCategory) -> Self {
        self.category = category;
        self
    }

    /// Clamps every field into its valid range.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.default_volume = self.default_volume.clamp(0.0, 1.0);
        self.default_pitch = self.default_pitch.max(0.0);
        self.spatial_blend = self.spatial_blend.clamp(0.0, 1.0);
        self.min_distance = self.min_distance.max(0.0);
        self.max_distance = self.max_distance.max(self.min_distance);
        self.min_time_between_plays = self.min_time_between_plays.max(0.0);
        self
    }
}

/// Inclusive range for random jitter factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomRange {
    /// Lower bound.
    pub min: f32,
    /// Upper bound.
    pub max: f32,
}

impl RandomRange {
    /// Creates a range; bounds are swapped if given in reverse.
    #[must_use]
    pub fn new(min: f32, max: f32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Draws a factor from the range.
    pub fn sample(&self, rng: &mut fastrand::Rng) -> f32 {
        self.min + rng.f32() * (self.max - self.min)
    }
}

/// Per-call overrides. Every field defaults to "use the asset's value".
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackParameters {
    /// Multiplies the asset volume.
    pub volume_multiplier: f32,
    /// Multiplies the asset pitch.
    pub pitch_multiplier: f32,
    /// Random volume factor, if jitter is wanted.
    pub random_volume: Option<RandomRange>,
    /// Random pitch factor, if jitter is wanted.
    pub random_pitch: Option<RandomRange>,
    /// Replaces the asset's looping flag.
    pub loop_override: Option<bool>,
    /// Replaces the asset's spatial blend.
    pub spatial_blend_override: Option<f32>,
    /// Seconds before the clip starts.
    pub delay: f32,
    /// Seconds to ramp up from silence.
    pub fade_in: f32,
}

impl Default for PlaybackParameters {
    fn default() -> Self {
        Self {
            volume_multiplier: 1.0,
            pitch_multiplier: 1.0,
            random_volume: None,
            random_pitch: None,
            loop_override: None,
            spatial_blend_override: None,
            delay: 0.0,
            fade_in: 0.0,
        }
    }
}

impl PlaybackParameters {
    /// Sets the volume multiplier.
    #[must_use]
    pub fn with_volume(mut self, multiplier: f32) -> Self {
        self.volume_multiplier = multiplier;
        self
    }

    /// Sets the pitch multiplier.
    #[must_use]
    pub fn with_pitch(mut self, multiplier: f32) -> Self {
        self.pitch_multiplier = multiplier;
        self
    }

    /// Enables volume jitter with the default range.
    #[must_use]
    pub fn with_random_volume(mut self) -> Self {
        self.random_volume = Some(DEFAULT_RANDOM_VOLUME);
        self
    }

    /// Enables volume jitter within `range`.
    #[must_use]
    pub fn with_random_volume_range(mut self, range: RandomRange) -> Self {
        self.random_volume = Some(range);
        self
    }

    /// Enables pitch jitter with the default range.
    #[must_use]
    pub fn with_random_pitch(mut self) -> Self {
        self.random_pitch = Some(DEFAULT_RANDOM_PITCH);
        self
    }

    /// Enables pitch jitter within `range`.
    #[must_use]
    pub fn with_random_pitch_range(mut self, range: RandomRange) -> Self {
        self.random_pitch = Some(range);
        self
    }

    /// Forces looping on or off.
    #[must_use]
    pub fn with_loop(mut self, looping: bool) -> Self {
        self.loop_override = Some(looping);
        self
    }

    /// Forces a spatial blend.
    #[must_use]
    pub fn with_spatial_blend(mut self, blend: f32) -> Self {
        self.spatial_blend_override = Some(blend);
        self
    }

    /// Delays the start.
    #[must_use]
    pub fn with_delay(mut self, seconds: f32) -> Self {
        self.delay = seconds;
        self
    }

    /// Fades in from silence.
    #[must_use]
    pub fn with_fade_in(mut self, seconds: f32) -> Self {
        self.fade_in = seconds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_builder() {
        let asset = AudioAsset::new("Gunfire", ClipRef::new("sfx/gunfire.wav", 0.4))
            .with_min_interval(0.05)
            .with_max_instances(3)
            .with_category(AudioCategory::Sfx);

        assert_eq!(asset.id.as_str(), "Gunfire");
        assert_eq!(asset.max_concurrent_instances, 3);
        assert!((asset.min_time_between_plays - 0.05).abs() < f32::EPSILON);
    }

    #[test]
    fn test_normalized_clamps() {
        let asset = AudioAsset::new("x", ClipRef::new("x.wav", 1.0))
            .with_volume(3.0)
            .with_spatial_blend(-1.0)
            .with_distances(10.0, 2.0)
            .with_min_interval(-5.0)
            .normalized();

        assert!((asset.default_volume - 1.0).abs() < f32::EPSILON);
        assert!(asset.spatial_blend.abs() < f32::EPSILON);
        assert!((asset.max_distance - 10.0).abs() < f32::EPSILON);
        assert!(asset.min_time_between_plays.abs() < f32::EPSILON);
    }

    #[test]
    fn test_random_range_bounds() {
        let range = RandomRange::new(1.2, 0.8);
        assert!((range.min - 0.8).abs() < f32::EPSILON);

        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..1000 {
            let v = range.sample(&mut rng);
            assert!((0.8..=1.2).contains(&v));
        }
    }

    #[test]
    fn test_parameter_defaults() {
        let params = PlaybackParameters::default();
        assert!((params.volume_multiplier - 1.0).abs() < f32::EPSILON);
        assert!(params.loop_override.is_none());
        assert!(params.fade_in.abs() < f32::EPSILON);
    }

    #[test]
    fn test_asset_from_toml() {
        let asset: AudioAsset = toml::from_str(
            r#"
            id = "Explosion"
            category = "sfx"
            default_volume = 0.8
            clip = { path = "sfx/explosion.wav", duration = 2.5 }
            "#,
        )
        .expect("parse");

        assert_eq!(asset.id.as_str(), "Explosion");
        assert!((asset.default_pitch - 1.0).abs() < f32::EPSILON);
        assert!((asset.clip.duration - 2.5).abs() < f32::EPSILON);
        assert_eq!(asset.max_concurrent_instances, 0);
    }
}
