//! Idle layout relaxation.
//!
//! Each tick pulls out-of-bounds widgets back toward the visible area and
//! pushes overlapping widgets apart. Forces are computed against a snapshot
//! of the positions at the start of the tick and applied together at the
//! end, so the result does not depend on iteration order.

use crate::{
    config::InteractionConfig,
    gesture::Point,
    log_debug,
    session::{PowerPhase, ViewMode},
};

use super::registry::WidgetRegistry;

const ENABLE_LOGS: bool = false;

/// Conditions under which the simulation is allowed to move anything.
#[derive(Debug, Clone, Copy)]
pub struct LayoutGate {
    pub any_dragging: bool,
    pub settings_open: bool,
    pub phase: PowerPhase,
    pub view: ViewMode,
    pub focus_active: bool,
}

impl LayoutGate {
    pub fn allows_tick(&self) -> bool {
        !self.any_dragging
            && !self.settings_open
            && self.phase == PowerPhase::Active
            && self.view == ViewMode::Dashboard
            && !self.focus_active
    }
}

#[derive(Debug, Clone)]
pub struct LayoutEngine {
    bounds_min: f32,
    bounds_max: f32,
    bounds_pull: f32,
    radius: f32,
    strength: f32,
    epsilon: f32,
}

impl LayoutEngine {
    pub fn new(config: &InteractionConfig) -> Self {
        Self {
            bounds_min: config.bounds_margin,
            bounds_max: 100.0 - config.bounds_margin,
            bounds_pull: config.bounds_pull,
            radius: config.repulsion_radius,
            strength: config.repulsion_strength,
            epsilon: config.move_epsilon,
        }
    }

    /// Run one relaxation step. Returns the ids of widgets that moved.
    pub fn tick(&self, widgets: &mut WidgetRegistry, gate: LayoutGate) -> Vec<String> {
        if !gate.allows_tick() {
            return Vec::new();
        }

        let snapshot: Vec<(Point, bool)> = widgets
            .iter()
            .map(|w| (w.position(), w.visible))
            .collect();

        let mut moves: Vec<Option<Point>> = Vec::with_capacity(snapshot.len());
        for (i, widget) in widgets.iter().enumerate() {
            if !widget.is_draggable() || widget.is_dragging {
                moves.push(None);
                continue;
            }

            let origin = snapshot[i].0;
            let mut dx = self.bounds_correction(origin.x);
            let mut dy = self.bounds_correction(origin.y);

            for (j, (other, visible)) in snapshot.iter().enumerate() {
                if i == j || !visible {
                    continue;
                }
                let (px, py) = self.repulsion(i, j, origin, *other);
                dx += px;
                dy += py;
            }

            if dx.abs() > self.epsilon || dy.abs() > self.epsilon {
                moves.push(Some(Point::new(origin.x + dx, origin.y + dy)));
            } else {
                moves.push(None);
            }
        }

        let mut moved = Vec::new();
        for (widget, next) in widgets.iter_mut().zip(moves) {
            if let Some(next) = next {
                widget.x = next.x;
                widget.y = next.y;
                moved.push(widget.id.clone());
            }
        }

        if !moved.is_empty() {
            log_debug!("Layout tick moved {:?}", moved);
        }
        moved
    }

    /// Soft clamp: recover a fraction of the overshoot per tick.
    fn bounds_correction(&self, value: f32) -> f32 {
        if value < self.bounds_min {
            (self.bounds_min - value) * self.bounds_pull
        } else if value > self.bounds_max {
            (self.bounds_max - value) * self.bounds_pull
        } else {
            0.0
        }
    }

    fn repulsion(&self, i: usize, j: usize, origin: Point, other: Point) -> (f32, f32) {
        let distance = origin.distance_to(other);
        if distance >= self.radius {
            return (0.0, 0.0);
        }

        let force = (self.radius - distance) * self.strength;
        if distance <= f32::EPSILON {
            // Coincident centers: split them along x, lower index to the left.
            let sign = if i < j { -1.0 } else { 1.0 };
            return (sign * force, 0.0);
        }

        (
            (origin.x - other.x) / distance * force,
            (origin.y - other.y) / distance * force,
        )
    }
}
