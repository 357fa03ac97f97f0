//! The single owned mirror state.
//!
//! Frames, layout ticks, session ticks and push messages are all applied
//! here, one at a time, in the order the controller receives them. Each
//! entry point returns the events it caused; nothing in here performs I/O.

use anyhow::Result;
use log::info;
use serde::Serialize;
use std::time::Instant;

use crate::{
    audio::Cue,
    config::InteractionConfig,
    gesture::{
        arbiter::{Action, ArbiterEvent, FrameInput},
        ingest, resolve, FaceSampler, FrameReport, GestureClassifier, GestureState,
        InteractionArbiter, InteractionKind, InteractionTarget,
    },
    layout::{LayoutEngine, LayoutGate, Preset, Widget, WidgetInfo, WidgetKind, WidgetRegistry},
    push::PushEvent,
    session::{
        FocusStatus, FocusTimer, FocusTransition, PowerPhase, PowerTransition, SessionState,
        ViewMode,
    },
};

/// Everything the UI shell needs to know about a change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MirrorEvent {
    GrabStarted { id: String },
    WidgetSettled { id: String },
    WidgetsMoved { ids: Vec<String> },
    ActionFired { action: Action },
    ViewChanged { view: ViewMode },
    PowerChanged { phase: PowerPhase },
    FocusChanged { active: bool },
    FocusCompleted,
    AgendaScrolled { offset: f32 },
    WidgetUpdated { id: String },
    WidgetToggled { id: String, visible: bool },
    PresetApplied { preset: Preset },
    /// The reload corner fired; the owner should rebuild from storage.
    ReloadRequested,
    Reloaded,
    Cue { cue: Cue },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSnapshot {
    pub status: FocusStatus,
    pub remaining_secs: u64,
    pub session_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorSnapshot {
    pub widgets: Vec<Widget>,
    /// Drag flags are not serialized with widgets.
    pub dragging_id: Option<String>,
    pub gesture: GestureState,
    pub phase: PowerPhase,
    pub view: ViewMode,
    pub focus: FocusSnapshot,
    pub interaction_progress: u8,
    pub interaction_kind: Option<InteractionKind>,
    pub face_present: bool,
    pub settings_open: bool,
    pub agenda_scroll: f32,
    /// Toggleable widgets for the settings panel.
    pub catalogue: Vec<WidgetInfo>,
}

pub struct MirrorState {
    config: InteractionConfig,
    classifier: GestureClassifier,
    gesture: GestureState,
    arbiter: InteractionArbiter,
    layout: LayoutEngine,
    widgets: WidgetRegistry,
    session: SessionState,
    view: ViewMode,
    focus: FocusTimer,
    face_sampler: FaceSampler,
    face_present: bool,
    settings_open: bool,
    search_shown_at: Option<Instant>,
    layout_dirty: bool,
}

impl MirrorState {
    pub fn new(config: InteractionConfig, widgets: WidgetRegistry, now: Instant) -> Self {
        Self {
            classifier: GestureClassifier::new(
                config.grab_engage_distance,
                config.grab_release_distance,
            ),
            gesture: GestureState::default(),
            arbiter: InteractionArbiter::new(&config),
            layout: LayoutEngine::new(&config),
            widgets,
            session: SessionState::new(now, config.inactivity_timeout(), config.boot_delay()),
            view: ViewMode::Dashboard,
            focus: FocusTimer::new(config.focus_duration(), config.focus_exit_delay()),
            face_sampler: FaceSampler::new(
                config.face_sample_every_active,
                config.face_sample_every_standby,
            ),
            face_present: false,
            settings_open: false,
            search_shown_at: None,
            layout_dirty: false,
            config,
        }
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    #[cfg(test)]
    fn widgets(&self) -> &WidgetRegistry {
        &self.widgets
    }

    #[cfg(test)]
    fn phase(&self) -> PowerPhase {
        self.session.phase()
    }

    #[cfg(test)]
    fn view(&self) -> ViewMode {
        self.view
    }

    #[cfg(test)]
    fn focus_active(&self) -> bool {
        self.focus.is_engaged()
    }

    /// Whether the face detector should run on the next camera frame.
    pub fn should_sample_face(&mut self) -> bool {
        self.face_sampler.should_sample(self.session.is_standby())
    }

    /// One camera frame: ingest, classify, hit-test, arbitrate.
    pub fn on_frame(&mut self, report: &FrameReport, now: Instant) -> Vec<MirrorEvent> {
        let mut events = Vec::new();
        let sample = ingest(report);

        if let Some(face) = report.face_present {
            self.face_present = face;
            if face {
                self.register_activity(now, &mut events);
            }
        }
        if sample.present {
            self.register_activity(now, &mut events);
        }

        let edge = self.classifier.step(&sample);
        let grabbing = self.classifier.is_grabbing();

        if self.session.phase() != PowerPhase::Active {
            self.cancel_interaction(&mut events);
            self.gesture.update(&sample, false, &InteractionTarget::None);
            return events;
        }

        let target = if sample.present {
            resolve(sample.position, &self.widgets, self.view, grabbing, &self.config)
        } else {
            InteractionTarget::None
        };
        self.gesture.update(&sample, grabbing, &target);

        let input = FrameInput {
            sample: &sample,
            edge,
            grabbing,
            target: &target,
            view: self.view,
            now,
        };
        for event in self.arbiter.step(input, &mut self.widgets) {
            match event {
                ArbiterEvent::GrabStarted { id } => events.push(MirrorEvent::GrabStarted { id }),
                ArbiterEvent::Settled { id } => {
                    self.layout_dirty = true;
                    events.push(MirrorEvent::WidgetSettled { id });
                }
                ArbiterEvent::Scrolled { offset } => {
                    events.push(MirrorEvent::AgendaScrolled { offset })
                }
                ArbiterEvent::Fired(action) => self.apply_action(action, now, &mut events),
            }
        }
        events
    }

    /// Fixed-period layout relaxation.
    pub fn layout_tick(&mut self) -> Vec<MirrorEvent> {
        let gate = LayoutGate {
            any_dragging: self.widgets.any_dragging(),
            settings_open: self.settings_open,
            phase: self.session.phase(),
            view: self.view,
            focus_active: self.focus.is_engaged(),
        };
        let ids = self.layout.tick(&mut self.widgets, gate);
        if ids.is_empty() {
            return Vec::new();
        }
        self.layout_dirty = true;
        vec![MirrorEvent::WidgetsMoved { ids }]
    }

    /// Fixed-period power, focus and search-expiry checks.
    pub fn session_tick(&mut self, now: Instant) -> Vec<MirrorEvent> {
        let mut events = Vec::new();

        if let Some(transition) = self.session.poll(now, self.focus.is_engaged()) {
            self.on_power_transition(transition, &mut events);
        }

        match self.focus.poll(now) {
            Some(FocusTransition::Completed) => {
                info!("Focus session complete");
                events.push(MirrorEvent::FocusCompleted);
                events.push(MirrorEvent::Cue { cue: Cue::Complete });
            }
            Some(FocusTransition::Expired) => {
                events.push(MirrorEvent::FocusChanged { active: false });
                self.set_view(ViewMode::Dashboard, &mut events);
            }
            None => {}
        }

        if let Some(shown_at) = self.search_shown_at {
            if now.saturating_duration_since(shown_at) >= self.config.search_display() {
                self.search_shown_at = None;
                self.widgets.set_visible(WidgetKind::Search.id(), false);
                self.layout_dirty = true;
                events.push(MirrorEvent::WidgetToggled {
                    id: WidgetKind::Search.id().to_string(),
                    visible: false,
                });
            }
        }

        events
    }

    pub fn apply_push(&mut self, event: PushEvent, now: Instant) -> Vec<MirrorEvent> {
        let mut events = Vec::new();
        self.register_activity(now, &mut events);

        let notification = matches!(event, PushEvent::NewNotification(_));
        let search = matches!(event, PushEvent::SearchResult { .. });
        if let Some(id) = event.apply(&mut self.widgets) {
            self.layout_dirty = true;
            events.push(MirrorEvent::WidgetUpdated { id });
        }
        if notification {
            events.push(MirrorEvent::Cue {
                cue: Cue::Notification,
            });
        }
        if search {
            self.search_shown_at = Some(now);
        }
        events
    }

    pub fn toggle_widget(&mut self, id: &str) -> Vec<MirrorEvent> {
        let mut events = Vec::new();
        if self.widgets.dragging_id() == Some(id) {
            self.cancel_interaction(&mut events);
        }
        if let Some(visible) = self.widgets.toggle(id) {
            self.layout_dirty = true;
            events.push(MirrorEvent::WidgetToggled {
                id: id.to_string(),
                visible,
            });
        }
        events
    }

    pub fn apply_preset(&mut self, name: &str) -> Vec<MirrorEvent> {
        let preset = Preset::from_name(name);
        let mut events = Vec::new();
        self.cancel_interaction(&mut events);
        self.widgets.apply_preset(preset);
        self.layout_dirty = true;
        info!("Applied preset '{}'", preset.as_str());
        events.push(MirrorEvent::PresetApplied { preset });
        events
    }

    pub fn set_settings_open(&mut self, open: bool, now: Instant) -> Vec<MirrorEvent> {
        let mut events = Vec::new();
        self.settings_open = open;
        self.register_activity(now, &mut events);
        events
    }

    /// Switch focus mode on or off outside of gestures.
    pub fn toggle_focus(&mut self, now: Instant) -> Vec<MirrorEvent> {
        let mut events = Vec::new();
        self.register_activity(now, &mut events);
        self.flip_focus(now, &mut events);
        events
    }

    /// Back to the default preset and a clean interaction state.
    pub fn reset_to_factory(&mut self, now: Instant) -> Vec<MirrorEvent> {
        let mut events = Vec::new();
        self.cancel_interaction(&mut events);
        self.focus.cancel();
        self.set_view(ViewMode::Dashboard, &mut events);
        self.widgets = WidgetRegistry::from_preset(Preset::Default);
        self.settings_open = false;
        self.search_shown_at = None;
        self.register_activity(now, &mut events);
        // An empty store already loads the default preset.
        self.layout_dirty = false;
        events.push(MirrorEvent::PresetApplied {
            preset: Preset::Default,
        });
        events
    }

    /// Start over from `widgets` as if freshly launched. A pinch held across
    /// the reload has to be released before it can do anything again.
    pub fn reinitialize(&mut self, widgets: WidgetRegistry, now: Instant) {
        let grabbing = self.classifier.is_grabbing();
        *self = MirrorState::new(self.config.clone(), widgets, now);
        if grabbing {
            self.arbiter.cancel(&mut self.widgets, true);
        }
    }

    /// Serialized layout, if it changed and nothing is mid-drag.
    pub fn take_settled_layout(&mut self) -> Option<Result<String>> {
        if !self.layout_dirty || self.widgets.any_dragging() {
            return None;
        }
        self.layout_dirty = false;
        Some(self.widgets.to_json())
    }

    pub fn snapshot(&self, now: Instant) -> MirrorSnapshot {
        MirrorSnapshot {
            widgets: self.widgets.iter().cloned().collect(),
            dragging_id: self.widgets.dragging_id().map(str::to_string),
            gesture: self.gesture.clone(),
            phase: self.session.phase(),
            view: self.view,
            focus: FocusSnapshot {
                status: self.focus.status,
                remaining_secs: self.focus.remaining_secs(now),
                session_complete: self.focus.session_complete(),
            },
            interaction_progress: self.arbiter.interaction_progress(),
            interaction_kind: self.arbiter.interaction_kind(),
            face_present: self.face_present,
            settings_open: self.settings_open,
            agenda_scroll: self.arbiter.scroll_offset(),
            catalogue: WidgetKind::catalogue(),
        }
    }

    fn register_activity(&mut self, now: Instant, events: &mut Vec<MirrorEvent>) {
        if let Some(transition) = self.session.register_activity(now) {
            self.on_power_transition(transition, events);
        }
    }

    fn on_power_transition(&mut self, transition: PowerTransition, events: &mut Vec<MirrorEvent>) {
        match transition {
            PowerTransition::WentStandby => self.cancel_interaction(events),
            PowerTransition::BootStarted | PowerTransition::BootFinished => {}
        }
        let phase = self.session.phase();
        info!("Power phase -> {:?}", phase);
        events.push(MirrorEvent::PowerChanged { phase });
    }

    fn apply_action(&mut self, action: Action, now: Instant, events: &mut Vec<MirrorEvent>) {
        events.push(MirrorEvent::ActionFired { action });
        match action {
            Action::Reload => events.push(MirrorEvent::ReloadRequested),
            Action::Standby => {
                if let Some(transition) =
                    self.session.force_standby(now, self.config.standby_wake_grace())
                {
                    self.on_power_transition(transition, events);
                }
            }
            Action::ToggleFocus => self.flip_focus(now, events),
            Action::OpenAgenda => {
                self.arbiter.reset_scroll();
                self.set_view(ViewMode::Agenda, events);
                events.push(MirrorEvent::Cue { cue: Cue::Swipe });
            }
            Action::DismissAgenda => {
                self.set_view(ViewMode::Dashboard, events);
                events.push(MirrorEvent::Cue { cue: Cue::Swipe });
            }
        }
    }

    fn flip_focus(&mut self, now: Instant, events: &mut Vec<MirrorEvent>) {
        if self.focus.is_engaged() {
            self.focus.cancel();
            events.push(MirrorEvent::FocusChanged { active: false });
            self.set_view(ViewMode::Dashboard, events);
        } else {
            self.focus.start(now);
            events.push(MirrorEvent::FocusChanged { active: true });
            self.set_view(ViewMode::Focus, events);
        }
    }

    fn set_view(&mut self, view: ViewMode, events: &mut Vec<MirrorEvent>) {
        if self.view == view {
            return;
        }
        self.cancel_interaction(events);
        info!("View {:?} -> {:?}", self.view, view);
        self.view = view;
        events.push(MirrorEvent::ViewChanged { view });
    }

    fn cancel_interaction(&mut self, events: &mut Vec<MirrorEvent>) {
        let grabbing = self.classifier.is_grabbing();
        if let Some(id) = self.arbiter.cancel(&mut self.widgets, grabbing) {
            self.layout_dirty = true;
            events.push(MirrorEvent::WidgetSettled { id });
        }
        self.gesture.clear();
    }
}
