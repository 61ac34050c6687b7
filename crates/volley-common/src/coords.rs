//! World positions and moving anchors for spatial playback.

use std::cell::Cell;
use std::rc::{Rc, Weak};

pub use glam::Vec3;

/// A moving reference point that playbacks can be attached to.
///
/// The owner moves the anchor; attached channels read the latest position
/// each tick. Dropping every `Anchor` clone detaches the followers, which
/// keep their last known position.
#[derive(Debug, Clone)]
pub struct Anchor {
    position: Rc<Cell<Vec3>>,
}

impl Anchor {
    /// Creates an anchor at a position.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            position: Rc::new(Cell::new(position)),
        }
    }

    /// Moves the anchor.
    pub fn set(&self, position: Vec3) {
        self.position.set(position);
    }

    /// Current position.
    #[must_use]
    pub fn get(&self) -> Vec3 {
        self.position.get()
    }

    /// Creates a non-owning follower.
    #[must_use]
    pub fn follower(&self) -> AnchorFollower {
        AnchorFollower {
            position: Rc::downgrade(&self.position),
        }
    }
}

/// Weak view of an [`Anchor`].
#[derive(Debug, Clone)]
pub struct AnchorFollower {
    position: Weak<Cell<Vec3>>,
}

impl AnchorFollower {
    /// Latest anchor position, or `None` once the anchor is gone.
    #[must_use]
    pub fn position(&self) -> Option<Vec3> {
        self.position.upgrade().map(|cell| cell.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follower_outlives_anchor() {
        let anchor = Anchor::new(Vec3::X);
        let follower = anchor.follower();
        assert_eq!(follower.position(), Some(Vec3::X));

        drop(anchor);
        assert_eq!(follower.position(), None);
    }
}
