use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// Tunable thresholds for gesture recognition, layout and power management.
///
/// All values were picked by hand on real hardware; none of them is
/// normative. Distances are in percent of the screen unless noted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct InteractionConfig {
    /// Pinch distance (normalized landmark space) below which a grab engages.
    pub grab_engage_distance: f32,
    /// Pinch distance at or above which an active grab releases.
    pub grab_release_distance: f32,

    /// Size of the reload/standby corner squares.
    pub corner_margin: f32,
    /// Half-width of a locked widget's action zone at scale 1.0.
    pub locked_zone_half_width: f32,
    /// Multiply locked zone half-width by the widget's scale.
    pub scale_locked_zones: bool,
    /// Half-width of a draggable widget's grab box.
    pub widget_half_width: f32,
    /// Half-width of the center zone that ends focus mode.
    pub focus_zone_half_width: f32,

    /// Dwell required on the reload corner.
    pub reload_dwell_ms: u64,
    /// Dwell required on the standby corner.
    pub standby_dwell_ms: u64,
    /// Dwell required on the clock (focus toggle) zone.
    pub focus_dwell_ms: u64,
    /// Dwell required on the calendar (open agenda) zone.
    pub agenda_dwell_ms: u64,
    /// Upper bound on the time credited for a single frame, so a stalled
    /// camera does not fire an action in one step.
    pub max_frame_gap_ms: u64,

    /// Vertical movement that turns an agenda grab into a scroll.
    pub agenda_scroll_threshold: f32,
    /// Scroll offset units per percent of vertical hand movement.
    pub agenda_scroll_gain: f32,

    pub layout_tick_ms: u64,
    /// Inner bound of the soft clamp; the outer bound is `100 - bounds_margin`.
    pub bounds_margin: f32,
    /// Fraction of the out-of-bounds distance recovered per tick.
    pub bounds_pull: f32,
    pub repulsion_radius: f32,
    pub repulsion_strength: f32,
    /// Per-axis movement below which a layout step is dropped.
    pub move_epsilon: f32,

    pub session_tick_ms: u64,
    pub inactivity_timeout_ms: u64,
    pub boot_delay_ms: u64,
    /// Activity ignored for this long after a forced standby.
    pub standby_wake_grace_ms: u64,

    pub focus_duration_secs: u64,
    pub focus_exit_delay_ms: u64,

    /// Face detection cadence (frames) while active.
    pub face_sample_every_active: u64,
    /// Face detection cadence (frames) while in standby.
    pub face_sample_every_standby: u64,

    pub search_display_ms: u64,
    /// Quiet period before a settled layout is written out.
    pub persist_debounce_ms: u64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            grab_engage_distance: 0.05,
            grab_release_distance: 0.10,
            corner_margin: 10.0,
            locked_zone_half_width: 15.0,
            scale_locked_zones: true,
            widget_half_width: 18.0,
            focus_zone_half_width: 20.0,
            reload_dwell_ms: 1000,
            standby_dwell_ms: 1000,
            focus_dwell_ms: 800,
            agenda_dwell_ms: 650,
            max_frame_gap_ms: 100,
            agenda_scroll_threshold: 3.0,
            agenda_scroll_gain: 25.0,
            layout_tick_ms: 50,
            bounds_margin: 5.0,
            bounds_pull: 0.1,
            repulsion_radius: 18.0,
            repulsion_strength: 0.05,
            move_epsilon: 0.1,
            session_tick_ms: 1000,
            inactivity_timeout_ms: 15_000,
            boot_delay_ms: 2000,
            standby_wake_grace_ms: 2000,
            focus_duration_secs: 1500,
            focus_exit_delay_ms: 5000,
            face_sample_every_active: 60,
            face_sample_every_standby: 5,
            search_display_ms: 10_000,
            persist_debounce_ms: 250,
        }
    }
}

impl InteractionConfig {
    /// Load overrides from a JSON file. A missing or malformed file yields
    /// the defaults; only I/O errors other than "not found" are reported.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(
                "No interaction config at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read interaction config {}", path.display()))?;

        match serde_json::from_str::<Self>(&contents) {
            Ok(config) => Ok(config.sanitized()),
            Err(err) => {
                warn!(
                    "Ignoring malformed interaction config {}: {err}",
                    path.display()
                );
                Ok(Self::default())
            }
        }
    }

    /// Repair combinations that would break the grab hysteresis band.
    pub fn sanitized(mut self) -> Self {
        if self.grab_release_distance < self.grab_engage_distance {
            warn!(
                "grabReleaseDistance {} below grabEngageDistance {}, widening",
                self.grab_release_distance, self.grab_engage_distance
            );
            self.grab_release_distance = self.grab_engage_distance;
        }
        self.face_sample_every_active = self.face_sample_every_active.max(1);
        self.face_sample_every_standby = self.face_sample_every_standby.max(1);
        self.layout_tick_ms = self.layout_tick_ms.max(1);
        self.session_tick_ms = self.session_tick_ms.max(1);
        self
    }

    pub fn layout_tick(&self) -> Duration {
        Duration::from_millis(self.layout_tick_ms)
    }

    pub fn session_tick(&self) -> Duration {
        Duration::from_millis(self.session_tick_ms)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }

    pub fn boot_delay(&self) -> Duration {
        Duration::from_millis(self.boot_delay_ms)
    }

    pub fn standby_wake_grace(&self) -> Duration {
        Duration::from_millis(self.standby_wake_grace_ms)
    }

    pub fn focus_duration(&self) -> Duration {
        Duration::from_secs(self.focus_duration_secs)
    }

    pub fn focus_exit_delay(&self) -> Duration {
        Duration::from_millis(self.focus_exit_delay_ms)
    }

    pub fn max_frame_gap(&self) -> Duration {
        Duration::from_millis(self.max_frame_gap_ms)
    }

    pub fn search_display(&self) -> Duration {
        Duration::from_millis(self.search_display_ms)
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_form_hysteresis_band() {
        let config = InteractionConfig::default();
        assert!(config.grab_release_distance > config.grab_engage_distance);
        assert!(config.agenda_dwell_ms < config.reload_dwell_ms);
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let config: InteractionConfig =
            serde_json::from_str(r#"{ "grabEngageDistance": 0.04, "layoutTickMs": 40 }"#).unwrap();
        assert_eq!(config.grab_engage_distance, 0.04);
        assert_eq!(config.layout_tick_ms, 40);
        assert_eq!(config.repulsion_radius, 18.0);
    }

    #[test]
    fn test_sanitized_widens_inverted_band() {
        let config = InteractionConfig {
            grab_engage_distance: 0.08,
            grab_release_distance: 0.02,
            ..InteractionConfig::default()
        }
        .sanitized();
        assert_eq!(config.grab_release_distance, 0.08);
    }

    #[test]
    fn test_load_missing_and_malformed_files() {
        let dir = std::env::temp_dir().join(format!("mirror-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = InteractionConfig::load(&dir.join("absent.json")).unwrap();
        assert_eq!(missing, InteractionConfig::default());

        let broken = dir.join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert_eq!(
            InteractionConfig::load(&broken).unwrap(),
            InteractionConfig::default()
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
