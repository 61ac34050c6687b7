//! # Volley Common
//!
//! Common types shared by every Volley crate.
//!
//! This crate provides the foundational vocabulary of the engine:
//! - ID types (`AssetId`, `ChannelId`, `HandleId`, `WaitTicket`)
//! - Audio categories with a fixed ordinal table
//! - World positions and moving anchors for spatial playback
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod category;
pub mod coords;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::category::*;
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_ordinals_cover_table() {
        for (i, category) in AudioCategory::ALL.iter().enumerate() {
            assert_eq!(category.ordinal(), i);
        }
        assert_eq!(AudioCategory::ALL.len(), AudioCategory::COUNT);
    }

    #[test]
    fn test_handle_ids_are_ordered() {
        let a = HandleId::from_raw(1);
        let b = HandleId::from_raw(2);
        assert!(a < b);
        assert!(a.is_valid());
        assert!(!HandleId::NULL.is_valid());
    }

    #[test]
    fn test_anchor_follow() {
        let anchor = Anchor::new(Vec3::ZERO);
        let follower = anchor.follower();
        anchor.set(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(follower.position(), Some(Vec3::new(1.0, 2.0, 3.0)));
    }
}
