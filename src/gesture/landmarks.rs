//! Per-frame landmark ingest.
//!
//! Turns a raw detector report (zero or one hand, optional face presence)
//! into a `Sample`: a mirrored screen position in percent, the thumb/index
//! pinch distance, and a presence flag.

use serde::{Deserialize, Serialize};

use crate::log_debug;

use super::Point;

const ENABLE_LOGS: bool = false;

/// Hand landmark indices (21-point hand model).
pub mod index {
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_TIP: usize = 8;
    /// Middle finger MCP joint, used as the palm center: it moves with the
    /// hand but not with the pinching fingers.
    pub const PALM_CENTER: usize = 9;
}

/// Number of landmarks in a complete hand set.
pub const HAND_LANDMARK_COUNT: usize = 21;

/// A single landmark in normalized image coordinates `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Detector confidence for this point, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            visibility: None,
        }
    }

    fn distance_to(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One detector callback worth of results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameReport {
    /// Zero or more hand landmark sets; only the first is used.
    #[serde(default)]
    pub hands: Vec<Vec<Landmark>>,
    /// `None` when the face detector did not run on this frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_present: Option<bool>,
}

impl FrameReport {
    pub fn with_hand(hand: Vec<Landmark>) -> Self {
        Self {
            hands: vec![hand],
            face_present: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Normalized per-frame hand observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub present: bool,
    pub position: Point,
    pub pinch_distance: Option<f32>,
}

impl Sample {
    pub fn absent() -> Self {
        Self {
            present: false,
            position: Point::default(),
            pinch_distance: None,
        }
    }

    pub fn at(x: f32, y: f32, pinch_distance: f32) -> Self {
        Self {
            present: true,
            position: Point::new(x, y),
            pinch_distance: Some(pinch_distance),
        }
    }
}

/// Build a `Sample` from the first hand in the report.
///
/// Truncated or non-finite landmark sets count as "no hand" so that a
/// glitching detector degrades to a release instead of a phantom grab.
pub fn ingest(report: &FrameReport) -> Sample {
    let Some(hand) = report.hands.first() else {
        return Sample::absent();
    };

    if hand.len() < HAND_LANDMARK_COUNT {
        log_debug!("Ignoring hand with {} landmarks", hand.len());
        return Sample::absent();
    }

    let palm = &hand[index::PALM_CENTER];
    if !palm.is_finite() {
        log_debug!("Ignoring hand with non-finite palm");
        return Sample::absent();
    }

    let thumb = &hand[index::THUMB_TIP];
    let finger = &hand[index::INDEX_FINGER_TIP];
    let pinch_distance = if thumb.is_finite() && finger.is_finite() {
        Some(thumb.distance_to(finger))
    } else {
        None
    };

    Sample {
        present: true,
        position: Point::new((1.0 - palm.x) * 100.0, palm.y * 100.0),
        pinch_distance,
    }
}

/// Decides on which frames the (expensive) face detector should run.
#[derive(Debug, Clone)]
pub struct FaceSampler {
    every_active: u64,
    every_standby: u64,
    frame_count: u64,
}

impl FaceSampler {
    pub fn new(every_active: u64, every_standby: u64) -> Self {
        Self {
            every_active: every_active.max(1),
            every_standby: every_standby.max(1),
            frame_count: 0,
        }
    }

    /// Advance the frame counter and report whether this frame should be
    /// sent to the face detector.
    pub fn should_sample(&mut self, standby: bool) -> bool {
        self.frame_count = self.frame_count.wrapping_add(1);
        let every = if standby {
            self.every_standby
        } else {
            self.every_active
        };
        self.frame_count % every == 0
    }
}

#[cfg(test)]
pub(crate) fn make_hand(palm_x: f32, palm_y: f32, pinch: f32) -> Vec<Landmark> {
    let mut hand = vec![Landmark::new(0.5, 0.5); HAND_LANDMARK_COUNT];
    hand[index::PALM_CENTER] = Landmark::new(palm_x, palm_y);
    hand[index::THUMB_TIP] = Landmark::new(0.3, 0.3);
    hand[index::INDEX_FINGER_TIP] = Landmark::new(0.3 + pinch, 0.3);
    hand
}
