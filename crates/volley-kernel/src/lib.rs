//! # Volley Kernel
//!
//! The seams the playback engine is built on.
//!
//! This crate owns everything the engine talks to but does not decide:
//! - Output devices: one binding per playback channel ([`device`])
//! - A simulated device for servers and tests ([`headless`])
//! - Real output through rodio, behind the `rodio-output` feature
//! - Category routing and bus parameters ([`bus`])
//! - Distance attenuation for spatial playback ([`spatial`])
//! - The cooperative task scheduler ([`scheduler`])
//! - Tick sources that drive it ([`tick`])
//!
//! ## Threading
//!
//! Nothing here spawns threads or takes locks on the tick path. All state is
//! mutated from the single thread that calls the engine's tick.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod bus;
pub mod device;
pub mod headless;
pub mod scheduler;
pub mod spatial;
pub mod tick;

#[cfg(feature = "rodio-output")]
pub mod backend;
#[cfg(feature = "rodio-output")]
pub mod sample_bank;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bus::*;
    pub use crate::device::*;
    pub use crate::headless::*;
    pub use crate::scheduler::*;
    pub use crate::spatial::*;
    pub use crate::tick::*;
}

pub use prelude::*;
