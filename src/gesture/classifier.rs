//! Pinch classification with a hysteresis band.
//!
//! A grab engages below `engage` and only releases at or above `release`,
//! so a pinch hovering around the engage threshold cannot toggle the grab
//! several times per second.

use serde::Serialize;

use super::{hit_test::InteractionTarget, landmarks::Sample, Point};

/// Coarse gesture level for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GesturePhase {
    Idle,
    Hovering,
    Grabbing,
}

impl Default for GesturePhase {
    fn default() -> Self {
        GesturePhase::Idle
    }
}

/// Edge produced by a classification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinchEdge {
    None,
    GrabStarted,
    GrabEnded,
}

#[derive(Debug, Clone)]
pub struct GestureClassifier {
    engage: f32,
    release: f32,
    grabbing: bool,
}

impl GestureClassifier {
    pub fn new(engage: f32, release: f32) -> Self {
        Self {
            engage,
            release: release.max(engage),
            grabbing: false,
        }
    }

    pub fn is_grabbing(&self) -> bool {
        self.grabbing
    }

    /// Feed one sample; returns the transition it caused, if any.
    ///
    /// An absent hand or a missing pinch distance always ends a grab.
    pub fn step(&mut self, sample: &Sample) -> PinchEdge {
        let now_grabbing = match (sample.present, sample.pinch_distance) {
            (true, Some(distance)) if self.grabbing => distance < self.release,
            (true, Some(distance)) => distance < self.engage,
            _ => false,
        };

        let edge = match (self.grabbing, now_grabbing) {
            (false, true) => PinchEdge::GrabStarted,
            (true, false) => PinchEdge::GrabEnded,
            _ => PinchEdge::None,
        };
        self.grabbing = now_grabbing;
        edge
    }
}

/// Process-wide gesture state, rebuilt every frame.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureState {
    pub phase: GesturePhase,
    pub pointer: Point,
    pub hand_present: bool,
    pub hovered_target_id: Option<String>,
}

impl GestureState {
    /// Recompute the level from this frame's sample, grab flag and the
    /// target under the pointer.
    pub fn update(&mut self, sample: &Sample, grabbing: bool, target: &InteractionTarget) {
        self.hand_present = sample.present;
        if !sample.present {
            self.phase = GesturePhase::Idle;
            self.hovered_target_id = None;
            return;
        }

        self.pointer = sample.position;
        self.hovered_target_id = target.id().map(str::to_string);
        self.phase = if grabbing {
            GesturePhase::Grabbing
        } else if target.is_none() {
            GesturePhase::Idle
        } else {
            GesturePhase::Hovering
        };
    }

    pub fn clear(&mut self) {
        self.phase = GesturePhase::Idle;
        self.hovered_target_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::hit_test::CornerZone;

    fn classifier() -> GestureClassifier {
        GestureClassifier::new(0.05, 0.10)
    }

    #[test]
    fn test_engage_below_threshold() {
        let mut c = classifier();
        assert_eq!(c.step(&Sample::at(50.0, 50.0, 0.06)), PinchEdge::None);
        assert_eq!(c.step(&Sample::at(50.0, 50.0, 0.04)), PinchEdge::GrabStarted);
        assert!(c.is_grabbing());
    }

    #[test]
    fn test_hysteresis_holds_grab_inside_band() {
        let mut c = classifier();
        c.step(&Sample::at(50.0, 50.0, 0.03));
        for i in 0..200 {
            let distance = if i % 2 == 0 { 0.06 } else { 0.09 };
            assert_eq!(c.step(&Sample::at(50.0, 50.0, distance)), PinchEdge::None);
            assert!(c.is_grabbing(), "flickered at frame {i}");
        }
        assert_eq!(c.step(&Sample::at(50.0, 50.0, 0.10)), PinchEdge::GrabEnded);
    }

    #[test]
    fn test_band_does_not_engage_from_idle() {
        let mut c = classifier();
        for distance in [0.06, 0.07, 0.09, 0.06] {
            assert_eq!(c.step(&Sample::at(10.0, 10.0, distance)), PinchEdge::None);
        }
        assert!(!c.is_grabbing());
    }

    #[test]
    fn test_absent_hand_releases() {
        let mut c = classifier();
        c.step(&Sample::at(50.0, 50.0, 0.01));
        assert_eq!(c.step(&Sample::absent()), PinchEdge::GrabEnded);
        assert_eq!(c.step(&Sample::absent()), PinchEdge::None);
    }

    #[test]
    fn test_missing_pinch_distance_releases() {
        let mut c = classifier();
        c.step(&Sample::at(50.0, 50.0, 0.01));
        let sample = Sample {
            pinch_distance: None,
            ..Sample::at(50.0, 50.0, 0.0)
        };
        assert_eq!(c.step(&sample), PinchEdge::GrabEnded);
    }

    #[test]
    fn test_state_levels() {
        let mut state = GestureState::default();
        state.update(&Sample::at(50.0, 50.0, 0.2), false, &InteractionTarget::None);
        assert_eq!(state.phase, GesturePhase::Idle);

        let corner = InteractionTarget::Corner(CornerZone::Standby);
        state.update(&Sample::at(95.0, 95.0, 0.2), false, &corner);
        assert_eq!(state.phase, GesturePhase::Hovering);

        state.update(&Sample::at(95.0, 95.0, 0.01), true, &corner);
        assert_eq!(state.phase, GesturePhase::Grabbing);

        state.update(&Sample::absent(), false, &InteractionTarget::None);
        assert_eq!(state.phase, GesturePhase::Idle);
        assert!(!state.hand_present);
    }
}
