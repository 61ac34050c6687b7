//! Audio categories (mixer buses).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical audio bus with independent volume control.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AudioCategory {
    /// Background music.
    Music,
    /// Sound effects.
    #[default]
    Sfx,
    /// Ambient/environmental sounds.
    Ambient,
    /// UI/menu sounds.
    Ui,
    /// Voice/dialogue.
    Voice,
}

impl AudioCategory {
    /// Number of categories.
    pub const COUNT: usize = 5;

    /// All categories in ordinal order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Music,
        Self::Sfx,
        Self::Ambient,
        Self::Ui,
        Self::Voice,
    ];

    /// Index of this category in [`AudioCategory::ALL`].
    #[must_use]
    pub const fn ordinal(self) -> usize {
        match self {
            Self::Music => 0,
            Self::Sfx => 1,
            Self::Ambient => 2,
            Self::Ui => 3,
            Self::Voice => 4,
        }
    }

    /// Get the default volume for this category.
    #[must_use]
    pub const fn default_volume(self) -> f32 {
        match self {
            Self::Sfx | Self::Voice => 1.0,
            Self::Music => 0.7,
            Self::Ambient => 0.5,
            Self::Ui => 0.8,
        }
    }

    /// Lowercase name, as used in configuration files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Music => "music",
            Self::Sfx => "sfx",
            Self::Ambient => "ambient",
            Self::Ui => "ui",
            Self::Voice => "voice",
        }
    }
}

impl fmt::Display for AudioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-size table with one slot per [`AudioCategory`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryTable<T> {
    slots: [T; AudioCategory::COUNT],
}

impl<T> CategoryTable<T> {
    /// Builds a table by evaluating `f` for each category.
    pub fn from_fn(mut f: impl FnMut(AudioCategory) -> T) -> Self {
        Self {
            slots: AudioCategory::ALL.map(&mut f),
        }
    }

    /// Slot for a category.
    #[must_use]
    pub fn get(&self, category: AudioCategory) -> &T {
        &self.slots[category.ordinal()]
    }

    /// Mutable slot for a category.
    pub fn get_mut(&mut self, category: AudioCategory) -> &mut T {
        &mut self.slots[category.ordinal()]
    }

    /// Iterates `(category, slot)` pairs in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (AudioCategory, &T)> {
        AudioCategory::ALL.into_iter().zip(self.slots.iter())
    }

    /// Iterates mutable slots in ordinal order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AudioCategory, &mut T)> {
        AudioCategory::ALL.into_iter().zip(self.slots.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serde_names() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            category: AudioCategory,
        }

        let parsed: Wrapper = toml::from_str("category = \"ambient\"").expect("parse");
        assert_eq!(parsed.category, AudioCategory::Ambient);
        for category in AudioCategory::ALL {
            assert_eq!(category.to_string(), category.name());
        }
    }

    #[test]
    fn test_category_table() {
        let mut table = CategoryTable::from_fn(AudioCategory::default_volume);
        assert!((table.get(AudioCategory::Music) - 0.7).abs() < f32::EPSILON);

        *table.get_mut(AudioCategory::Music) = 0.2;
        assert!((table.get(AudioCategory::Music) - 0.2).abs() < f32::EPSILON);
        assert_eq!(table.iter().count(), AudioCategory::COUNT);
    }
}
