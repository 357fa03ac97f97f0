pub mod arbiter;
pub mod classifier;
pub mod landmarks;

pub use arbiter::{InteractionArbiter, InteractionKind};
pub use classifier::{GestureClassifier, GestureState};
pub use hit_test::{resolve, InteractionTarget, LockedAction};
pub use landmarks::{ingest, FaceSampler, FrameReport, Landmark};

use serde::{Deserialize, Serialize};

/// A position in percent of the screen, origin top-left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}
