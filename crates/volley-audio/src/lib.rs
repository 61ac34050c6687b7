//! # Volley Audio
//!
//! Pooled, category-aware audio playback.
//!
//! This crate turns "play sound X" into a throttled, routed, recycled
//! channel allocation:
//! - Asset descriptors and per-call parameters
//! - Catalog lookup with TOML/JSON manifests
//! - Category mixing in decibels with mute and master volume
//! - A recycling channel pool with generation-checked leases
//! - Per-asset rate and concurrency limits with FIFO eviction
//! - Handles with cooperative fades, pauses and completion waits
//! - An event queue the host drains instead of callbacks
//!
//! Nothing here spawns threads. The host drives everything through
//! [`AudioEngine::tick`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod asset;
pub mod catalog;
pub mod channel;
pub mod config;
pub mod engine;
pub mod events;
pub mod guard;
pub mod handle;
pub mod mixer;
pub mod pool;
pub mod tasks;


/// Prelude for convenient imports
pub mod prelude {
    pub use crate::asset::*;
    pub use crate::catalog::*;
    pub use crate::channel::*;
    pub use crate::config::*;
    pub use crate::engine::*;
    pub use crate::events::*;
    pub use crate::guard::*;
    pub use crate::handle::*;
    pub use crate::mixer::*;
    pub use crate::pool::*;
    pub use crate::tasks::*;
}

pub use prelude::*;
