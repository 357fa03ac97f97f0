//! Turns classified frames into drags, dwell actions and agenda scrolls.
//!
//! Dwell is accumulated as wall time between frames, capped per frame, so
//! thresholds hold at any camera rate. After a dwell action fires, or after
//! the arbiter is cancelled by a view change, nothing else happens until
//! the current grab ends.

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::{
    config::InteractionConfig,
    layout::WidgetRegistry,
    log_debug, log_info,
    session::ViewMode,
};

use super::{
    classifier::PinchEdge,
    hit_test::{CornerZone, InteractionTarget, LockedAction},
    landmarks::Sample,
};

const ENABLE_LOGS: bool = true;

/// What a sustained grab on the current target would trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionKind {
    Reload,
    Standby,
    Focus,
    Agenda,
}

impl InteractionKind {
    fn for_target(target: &InteractionTarget) -> Option<Self> {
        match target {
            InteractionTarget::Corner(CornerZone::Reload) => Some(InteractionKind::Reload),
            InteractionTarget::Corner(CornerZone::Standby) => Some(InteractionKind::Standby),
            InteractionTarget::LockedZone {
                action: LockedAction::Focus,
                ..
            }
            | InteractionTarget::FocusCenter => Some(InteractionKind::Focus),
            InteractionTarget::LockedZone {
                action: LockedAction::Agenda,
                ..
            } => Some(InteractionKind::Agenda),
            _ => None,
        }
    }

    fn action(&self) -> Action {
        match self {
            InteractionKind::Reload => Action::Reload,
            InteractionKind::Standby => Action::Standby,
            InteractionKind::Focus => Action::ToggleFocus,
            InteractionKind::Agenda => Action::OpenAgenda,
        }
    }
}

/// Mode-level effect requested by the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Reload,
    Standby,
    ToggleFocus,
    OpenAgenda,
    DismissAgenda,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArbiterEvent {
    GrabStarted { id: String },
    /// A drag ended; the widget position is final and can be stored.
    Settled { id: String },
    Fired(Action),
    Scrolled { offset: f32 },
}

/// One classified frame, as seen by the arbiter.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub sample: &'a Sample,
    pub edge: PinchEdge,
    pub grabbing: bool,
    pub target: &'a InteractionTarget,
    pub view: ViewMode,
    pub now: Instant,
}

#[derive(Debug, Clone, Default)]
struct DwellAccumulator {
    kind: Option<InteractionKind>,
    elapsed: Duration,
}

impl DwellAccumulator {
    /// Credit `dt` to `kind`. A different kind starts over from zero.
    /// Returns true, and resets, once `threshold` is reached.
    fn advance(&mut self, kind: InteractionKind, dt: Duration, threshold: Duration) -> bool {
        if self.kind != Some(kind) {
            self.kind = Some(kind);
            self.elapsed = Duration::ZERO;
            return false;
        }

        self.elapsed += dt;
        if self.elapsed >= threshold {
            self.reset();
            return true;
        }
        false
    }

    fn reset(&mut self) {
        self.kind = None;
        self.elapsed = Duration::ZERO;
    }
}

#[derive(Debug, Clone, Copy)]
struct AgendaGesture {
    start_y: f32,
    last_y: f32,
    has_scrolled: bool,
}

#[derive(Debug, Clone)]
pub struct InteractionArbiter {
    dwell: DwellAccumulator,
    agenda: Option<AgendaGesture>,
    scroll_offset: f32,
    await_release: bool,
    last_frame_at: Option<Instant>,
    reload_dwell: Duration,
    standby_dwell: Duration,
    focus_dwell: Duration,
    agenda_dwell: Duration,
    max_frame_gap: Duration,
    scroll_threshold: f32,
    scroll_gain: f32,
}

impl InteractionArbiter {
    pub fn new(config: &InteractionConfig) -> Self {
        Self {
            dwell: DwellAccumulator::default(),
            agenda: None,
            scroll_offset: 0.0,
            await_release: false,
            last_frame_at: None,
            reload_dwell: Duration::from_millis(config.reload_dwell_ms),
            standby_dwell: Duration::from_millis(config.standby_dwell_ms),
            focus_dwell: Duration::from_millis(config.focus_dwell_ms),
            agenda_dwell: Duration::from_millis(config.agenda_dwell_ms),
            max_frame_gap: config.max_frame_gap(),
            scroll_threshold: config.agenda_scroll_threshold,
            scroll_gain: config.agenda_scroll_gain,
        }
    }

    fn threshold(&self, kind: InteractionKind) -> Duration {
        match kind {
            InteractionKind::Reload => self.reload_dwell,
            InteractionKind::Standby => self.standby_dwell,
            InteractionKind::Focus => self.focus_dwell,
            InteractionKind::Agenda => self.agenda_dwell,
        }
    }

    /// Kind of the target currently accumulating dwell.
    pub fn interaction_kind(&self) -> Option<InteractionKind> {
        self.dwell.kind
    }

    /// Dwell progress toward the current target's threshold, 0 to 100.
    pub fn interaction_progress(&self) -> u8 {
        let Some(kind) = self.dwell.kind else {
            return 0;
        };
        let threshold = self.threshold(kind).as_secs_f32();
        if threshold <= 0.0 {
            return 100;
        }
        ((self.dwell.elapsed.as_secs_f32() / threshold) * 100.0).clamp(0.0, 100.0) as u8
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    pub fn reset_scroll(&mut self) {
        self.scroll_offset = 0.0;
    }

    /// Drop every in-progress grab, dwell and agenda gesture. A grab that
    /// is still held must be released before the next one counts.
    pub fn cancel(&mut self, widgets: &mut WidgetRegistry, still_grabbing: bool) -> Option<String> {
        self.dwell.reset();
        self.agenda = None;
        self.await_release = still_grabbing;
        widgets.end_drag()
    }

    pub fn step(&mut self, input: FrameInput<'_>, widgets: &mut WidgetRegistry) -> Vec<ArbiterEvent> {
        let dt = self
            .last_frame_at
            .map(|last| input.now.saturating_duration_since(last).min(self.max_frame_gap))
            .unwrap_or(Duration::ZERO);
        self.last_frame_at = Some(input.now);

        let mut events = Vec::new();

        if !input.sample.present {
            if let Some(id) = self.cancel(widgets, false) {
                log_info!("Hand lost, released '{}'", id);
                events.push(ArbiterEvent::Settled { id });
            }
            return events;
        }

        if self.await_release {
            if !input.grabbing {
                self.await_release = false;
            }
            return events;
        }

        match input.view {
            ViewMode::Dashboard => self.step_dashboard(input, dt, widgets, &mut events),
            ViewMode::Agenda => self.step_agenda(input, &mut events),
            ViewMode::Focus => self.step_focus(input, dt, &mut events),
        }
        events
    }

    fn step_dashboard(
        &mut self,
        input: FrameInput<'_>,
        dt: Duration,
        widgets: &mut WidgetRegistry,
        events: &mut Vec<ArbiterEvent>,
    ) {
        if !input.grabbing {
            if let Some(id) = widgets.end_drag() {
                log_info!("Settled '{}'", id);
                events.push(ArbiterEvent::Settled { id });
            }
            self.dwell.reset();
            return;
        }

        if input.edge == PinchEdge::GrabStarted {
            if let InteractionTarget::Widget { id } = input.target {
                if widgets.begin_drag(id) {
                    log_info!("Grabbed '{}'", id);
                    events.push(ArbiterEvent::GrabStarted { id: id.clone() });
                }
            }
        }

        if let Some(id) = widgets.dragging_id().map(str::to_owned) {
            widgets.move_to(&id, input.sample.position);
            self.dwell.reset();
            return;
        }

        self.accumulate(input.target, dt, events);
    }

    fn step_focus(&mut self, input: FrameInput<'_>, dt: Duration, events: &mut Vec<ArbiterEvent>) {
        if !input.grabbing {
            self.dwell.reset();
            return;
        }
        self.accumulate(input.target, dt, events);
    }

    fn accumulate(&mut self, target: &InteractionTarget, dt: Duration, events: &mut Vec<ArbiterEvent>) {
        let Some(kind) = InteractionKind::for_target(target) else {
            self.dwell.reset();
            return;
        };

        if self.dwell.advance(kind, dt, self.threshold(kind)) {
            let action = kind.action();
            log_info!("Dwell on {:?} fired {:?}", kind, action);
            events.push(ArbiterEvent::Fired(action));
            self.await_release = true;
        }
    }

    fn step_agenda(&mut self, input: FrameInput<'_>, events: &mut Vec<ArbiterEvent>) {
        let y = input.sample.position.y;

        if input.edge == PinchEdge::GrabStarted {
            self.agenda = Some(AgendaGesture {
                start_y: y,
                last_y: y,
                has_scrolled: false,
            });
        }

        if !input.grabbing {
            if let Some(gesture) = self.agenda.take() {
                if !gesture.has_scrolled {
                    log_info!("Agenda tap, dismissing");
                    events.push(ArbiterEvent::Fired(Action::DismissAgenda));
                }
            }
            return;
        }

        let Some(gesture) = self.agenda.as_mut() else {
            return;
        };

        if !gesture.has_scrolled && (y - gesture.start_y).abs() > self.scroll_threshold {
            log_debug!("Agenda gesture locked into scroll");
            gesture.has_scrolled = true;
        }

        if gesture.has_scrolled {
            let delta = y - gesture.last_y;
            let next = (self.scroll_offset - delta * self.scroll_gain).max(0.0);
            if next != self.scroll_offset {
                self.scroll_offset = next;
                events.push(ArbiterEvent::Scrolled { offset: next });
            }
        }
        gesture.last_y = y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gesture::{hit_test, GestureClassifier},
        layout::Preset,
    };

    const FRAME: Duration = Duration::from_millis(20);

    /// Drives classifier, hit-tester and arbiter the way the state loop does.
    struct Rig {
        config: InteractionConfig,
        classifier: GestureClassifier,
        arbiter: InteractionArbiter,
        widgets: WidgetRegistry,
        view: ViewMode,
        t0: Instant,
        frame: u32,
    }

    impl Rig {
        fn new() -> Self {
            let config = InteractionConfig::default();
            Self {
                classifier: GestureClassifier::new(
                    config.grab_engage_distance,
                    config.grab_release_distance,
                ),
                arbiter: InteractionArbiter::new(&config),
                widgets: WidgetRegistry::from_preset(Preset::Default),
                view: ViewMode::Dashboard,
                t0: Instant::now(),
                frame: 0,
                config,
            }
        }

        fn feed(&mut self, sample: Sample) -> Vec<ArbiterEvent> {
            let edge = self.classifier.step(&sample);
            let grabbing = self.classifier.is_grabbing();
            let target = if sample.present {
                hit_test::resolve(sample.position, &self.widgets, self.view, grabbing, &self.config)
            } else {
                InteractionTarget::None
            };
            let now = self.t0 + FRAME * self.frame;
            self.frame += 1;
            let input = FrameInput {
                sample: &sample,
                edge,
                grabbing,
                target: &target,
                view: self.view,
                now,
            };
            self.arbiter.step(input, &mut self.widgets)
        }

        fn pinch(&mut self, x: f32, y: f32) -> Vec<ArbiterEvent> {
            self.feed(Sample::at(x, y, 0.01))
        }

        fn open(&mut self, x: f32, y: f32) -> Vec<ArbiterEvent> {
            self.feed(Sample::at(x, y, 0.2))
        }

        fn fired(events: &[ArbiterEvent]) -> Vec<Action> {
            events
                .iter()
                .filter_map(|e| match e {
                    ArbiterEvent::Fired(action) => Some(*action),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_drag_follows_pointer_and_settles_in_place() {
        let mut rig = Rig::new();
        let events = rig.pinch(21.0, 21.0);
        assert_eq!(events, vec![ArbiterEvent::GrabStarted { id: "weather".into() }]);

        for step in 1..=10 {
            let p = 21.0 + 19.0 * step as f32 / 10.0;
            rig.pinch(p, p);
        }
        let weather = rig.widgets.get("weather").unwrap();
        assert_eq!((weather.x, weather.y), (40.0, 40.0));
        assert!(weather.is_dragging);

        let events = rig.open(40.0, 40.0);
        assert_eq!(events, vec![ArbiterEvent::Settled { id: "weather".into() }]);
        let weather = rig.widgets.get("weather").unwrap();
        assert_eq!((weather.x, weather.y), (40.0, 40.0));
        assert!(!weather.is_dragging);
    }

    #[test]
    fn test_lost_hand_releases_drag() {
        let mut rig = Rig::new();
        rig.pinch(21.0, 21.0);
        rig.pinch(30.0, 30.0);
        let events = rig.feed(Sample::absent());
        assert_eq!(events, vec![ArbiterEvent::Settled { id: "weather".into() }]);
        assert!(!rig.widgets.any_dragging());
    }

    #[test]
    fn test_sweeping_into_widget_while_grabbing_does_not_pick_it_up() {
        let mut rig = Rig::new();
        rig.pinch(50.0, 20.0);
        rig.pinch(21.0, 21.0);
        assert!(!rig.widgets.any_dragging());
    }

    #[test]
    fn test_at_most_one_drag_across_sequence() {
        let mut rig = Rig::new();
        let path = [
            (21.0, 21.0, 0.01),
            (80.0, 80.0, 0.01),
            (80.0, 80.0, 0.2),
            (80.0, 80.0, 0.01),
            (21.0, 50.0, 0.01),
            (20.0, 80.0, 0.2),
            (20.0, 80.0, 0.01),
            (85.0, 50.0, 0.07),
            (85.0, 50.0, 0.2),
        ];
        for (x, y, pinch) in path {
            rig.feed(Sample::at(x, y, pinch));
            assert!(rig.widgets.iter().filter(|w| w.is_dragging).count() <= 1);
        }
    }

    #[test]
    fn test_corner_hold_fires_once() {
        let mut rig = Rig::new();
        let mut fired = Vec::new();
        // 50 frames at 20ms = 1s of dwell, plus 5.
        for _ in 0..56 {
            fired.extend(Rig::fired(&rig.pinch(96.0, 96.0)));
        }
        assert_eq!(fired, vec![Action::Standby]);
        assert_eq!(rig.arbiter.interaction_progress(), 0);
    }

    #[test]
    fn test_corner_requires_grab() {
        let mut rig = Rig::new();
        for _ in 0..100 {
            assert!(Rig::fired(&rig.open(96.0, 96.0)).is_empty());
        }
    }

    #[test]
    fn test_dwell_resets_on_target_change() {
        let mut rig = Rig::new();
        for _ in 0..26 {
            rig.pinch(96.0, 96.0);
        }
        assert_eq!(rig.arbiter.interaction_kind(), Some(InteractionKind::Standby));
        assert_eq!(rig.arbiter.interaction_progress(), 50);

        for _ in 0..26 {
            assert!(Rig::fired(&rig.pinch(4.0, 4.0)).is_empty());
        }
        assert_eq!(rig.arbiter.interaction_kind(), Some(InteractionKind::Reload));
        assert_eq!(rig.arbiter.interaction_progress(), 50);

        let mut fired = Vec::new();
        for _ in 0..25 {
            fired.extend(Rig::fired(&rig.pinch(4.0, 4.0)));
        }
        assert_eq!(fired, vec![Action::Reload]);
    }

    #[test]
    fn test_dwell_resets_when_grab_stops() {
        let mut rig = Rig::new();
        for _ in 0..40 {
            rig.pinch(96.0, 96.0);
        }
        rig.open(96.0, 96.0);
        assert_eq!(rig.arbiter.interaction_progress(), 0);
        for _ in 0..40 {
            assert!(Rig::fired(&rig.pinch(96.0, 96.0)).is_empty());
        }
    }

    #[test]
    fn test_stalled_camera_cannot_fire_in_one_frame() {
        let mut rig = Rig::new();
        rig.pinch(96.0, 96.0);
        rig.pinch(96.0, 96.0);
        rig.frame += 500;
        assert!(Rig::fired(&rig.pinch(96.0, 96.0)).is_empty());
    }

    #[test]
    fn test_locked_zone_fires_after_its_own_threshold() {
        let mut rig = Rig::new();
        // Calendar at (20,50): 650ms, i.e. 33 frames after the first.
        let mut fired = Vec::new();
        for _ in 0..34 {
            fired.extend(Rig::fired(&rig.pinch(21.0, 50.0)));
        }
        assert_eq!(fired, vec![Action::OpenAgenda]);
        assert!(!rig.widgets.any_dragging());
    }

    fn agenda_rig() -> Rig {
        let mut rig = Rig::new();
        rig.view = ViewMode::Agenda;
        rig
    }

    #[test]
    fn test_agenda_small_movement_dismisses() {
        let mut rig = agenda_rig();
        rig.open(50.0, 50.0);
        let mut fired = Vec::new();
        for step in 0..=10 {
            fired.extend(Rig::fired(&rig.pinch(50.0, 50.0 + step as f32 * 0.1)));
        }
        fired.extend(Rig::fired(&rig.open(50.0, 51.0)));
        assert_eq!(fired, vec![Action::DismissAgenda]);
    }

    #[test]
    fn test_agenda_large_movement_only_scrolls() {
        let mut rig = agenda_rig();
        rig.open(50.0, 60.0);
        let mut events = Vec::new();
        for step in 0..=10 {
            events.extend(rig.pinch(50.0, 60.0 - step as f32));
        }
        // Movement stops but the gesture stays a scroll.
        for _ in 0..20 {
            events.extend(rig.pinch(50.0, 50.0));
        }
        events.extend(rig.open(50.0, 50.0));

        assert!(Rig::fired(&events).is_empty());
        assert!(events
            .iter()
            .any(|e| matches!(e, ArbiterEvent::Scrolled { .. })));
        assert!(rig.arbiter.scroll_offset() > 0.0);
    }

    #[test]
    fn test_agenda_scroll_offset_never_negative() {
        let mut rig = agenda_rig();
        for step in 0..=20 {
            rig.pinch(50.0, 40.0 + step as f32);
        }
        assert_eq!(rig.arbiter.scroll_offset(), 0.0);
    }

    #[test]
    fn test_agenda_hand_loss_cancels_without_dismiss() {
        let mut rig = agenda_rig();
        rig.pinch(50.0, 50.0);
        rig.pinch(50.0, 50.5);
        assert!(Rig::fired(&rig.feed(Sample::absent())).is_empty());
        assert!(Rig::fired(&rig.open(50.0, 50.0)).is_empty());
    }

    #[test]
    fn test_cancel_requires_fresh_grab() {
        let mut rig = Rig::new();
        rig.pinch(21.0, 21.0);
        let released = rig.arbiter.cancel(&mut rig.widgets, true);
        assert_eq!(released.as_deref(), Some("weather"));

        // The grab that opened the agenda must not count as a tap on release.
        rig.view = ViewMode::Agenda;
        rig.pinch(50.0, 50.0);
        assert!(Rig::fired(&rig.open(50.0, 50.0)).is_empty());

        rig.pinch(50.0, 50.0);
        assert_eq!(Rig::fired(&rig.open(50.0, 50.0)), vec![Action::DismissAgenda]);
    }

    #[test]
    fn test_focus_center_toggles_off() {
        let mut rig = Rig::new();
        rig.view = ViewMode::Focus;
        let mut fired = Vec::new();
        for _ in 0..45 {
            fired.extend(Rig::fired(&rig.pinch(50.0, 50.0)));
        }
        assert_eq!(fired, vec![Action::ToggleFocus]);

        // Corners are inert in focus view.
        rig.open(96.0, 96.0);
        for _ in 0..80 {
            assert!(Rig::fired(&rig.pinch(96.0, 96.0)).is_empty());
        }
    }
}
