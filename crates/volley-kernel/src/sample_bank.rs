//! Decoded clip storage for the rodio backend.
//!
//! Short clips are decoded once and replayed from memory. The bank is keyed
//! by clip path and bounded by a byte budget; inserts past the budget are
//! refused rather than evicting clips that may be mid-playback.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use rodio::{Decoder, Source};
use tracing::{debug, warn};
use volley_common::DeviceError;

/// Default byte budget for decoded clips.
pub const DEFAULT_BANK_BUDGET: usize = 64 * 1024 * 1024;

/// One decoded clip.
#[derive(Debug, Clone)]
pub struct DecodedClip {
    /// Interleaved samples.
    pub samples: Arc<Vec<f32>>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
}

impl DecodedClip {
    /// Size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }

    /// Duration in seconds.
    #[must_use]
    pub fn duration(&self) -> f32 {
        let frames = self.samples.len() / usize::from(self.channels.max(1));
        frames as f32 / self.sample_rate.max(1) as f32
    }
}

/// Decoded clips keyed by clip path.
#[derive(Debug)]
pub struct SampleBank {
    root: PathBuf,
    clips: AHashMap<Arc<str>, DecodedClip>,
    total_size: usize,
    budget: usize,
}

impl SampleBank {
    /// Creates an empty bank resolving clip paths against `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clips: AHashMap::new(),
            total_size: 0,
            budget: DEFAULT_BANK_BUDGET,
        }
    }

    /// Overrides the byte budget.
    #[must_use]
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    /// Decoded clip for a path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&DecodedClip> {
        self.clips.get(path)
    }

    /// Whether a clip is resident.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.clips.contains_key(path)
    }

    /// Total decoded bytes.
    #[must_use]
    pub const fn total_size(&self) -> usize {
        self.total_size
    }

    /// Number of resident clips.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// Whether the bank is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Decodes a clip from disk unless it is already resident.
    pub fn load(&mut self, path: &str) -> Result<&DecodedClip, DeviceError> {
        if !self.clips.contains_key(path) {
            let clip = decode_file(&self.root.join(path))?;
            self.insert(path, clip)?;
        }
        self.clips
            .get(path)
            .ok_or_else(|| DeviceError::ClipMissing(path.to_string()))
    }

    /// Stores already-decoded samples under `path`.
    pub fn insert(&mut self, path: &str, clip: DecodedClip) -> Result<(), DeviceError> {
        if let Some(previous) = self.clips.get(path) {
            self.total_size -= previous.size_bytes();
        }
        let size = clip.size_bytes();
        if self.total_size + size > self.budget {
            warn!(
                "Sample bank budget exceeded ({} + {} > {} bytes), refusing '{}'",
                self.total_size, size, self.budget, path
            );
            return Err(DeviceError::DecodeFailed {
                path: path.to_string(),
                message: "sample bank budget exceeded".to_string(),
            });
        }
        self.total_size += size;
        self.clips.insert(Arc::from(path), clip);
        debug!("Banked clip '{}' ({} bytes)", path, size);
        Ok(())
    }

    /// Drops a clip.
    pub fn remove(&mut self, path: &str) -> Option<DecodedClip> {
        let clip = self.clips.remove(path)?;
        self.total_size -= clip.size_bytes();
        Some(clip)
    }
}

fn decode_file(path: &Path) -> Result<DecodedClip, DeviceError> {
    let decode_err = |message: String| DeviceError::DecodeFailed {
        path: path.display().to_string(),
        message,
    };

    let file = File::open(path).map_err(|e| decode_err(e.to_string()))?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|e| decode_err(e.to_string()))?;

    let sample_rate = decoder.sample_rate();
    let channels = decoder.channels();
    let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();

    Ok(DecodedClip {
        samples: Arc::new(samples),
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(frames: usize) -> DecodedClip {
        DecodedClip {
            samples: Arc::new(vec![0.0; frames * 2]),
            sample_rate: 44_100,
            channels: 2,
        }
    }

    #[test]
    fn test_decoded_duration() {
        assert!((clip(44_100).duration() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_budget_refuses_insert() {
        let mut bank = SampleBank::new(".").with_budget(1000);
        assert!(bank.insert("a", clip(100)).is_ok());
        assert!(bank.insert("b", clip(100)).is_err());
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.total_size(), 800);
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let mut bank = SampleBank::new("/nonexistent");
        assert!(matches!(
            bank.load("nope.wav"),
            Err(DeviceError::DecodeFailed { .. })
        ));
    }
}
