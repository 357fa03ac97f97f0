use std::{sync::Arc, time::Instant};

use anyhow::Result;
use log::{error, info, warn};
use tokio::{
    sync::{broadcast, Mutex, Notify},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    audio::CuePlayer,
    config::InteractionConfig,
    db::Database,
    gesture::FrameReport,
    layout::{Preset, WidgetRegistry},
    push::PushEvent,
    settings::{SettingsStore, UiConfig},
    state::{MirrorEvent, MirrorSnapshot, MirrorState},
};

use super::PowerPhase;

const EVENT_CAPACITY: usize = 256;

/// Async owner of the mirror state.
///
/// Frames, pushes and UI commands are applied under one lock; background
/// tasks drive the layout and session clocks and write settled layouts to
/// storage. Every change is broadcast as a `MirrorEvent`.
#[derive(Clone)]
pub struct MirrorController {
    state: Arc<Mutex<MirrorState>>,
    db: Database,
    settings: Arc<SettingsStore>,
    cues: Arc<dyn CuePlayer>,
    events: broadcast::Sender<MirrorEvent>,
    persist_signal: Arc<Notify>,
    cancel_token: CancellationToken,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl MirrorController {
    pub async fn new(
        config: InteractionConfig,
        db: Database,
        cues: Arc<dyn CuePlayer>,
    ) -> Result<Self> {
        let widgets = load_widgets(&db).await;
        let settings = SettingsStore::load(db.clone()).await?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            state: Arc::new(Mutex::new(MirrorState::new(config, widgets, Instant::now()))),
            db,
            settings: Arc::new(settings),
            cues,
            events,
            persist_signal: Arc::new(Notify::new()),
            cancel_token: CancellationToken::new(),
            workers: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Spawn the layout ticker, the session ticker and the layout writer.
    pub async fn start(&self) {
        let mut workers = self.workers.lock().await;
        workers.push(tokio::spawn(self.clone().run_layout_ticker()));
        workers.push(tokio::spawn(self.clone().run_session_ticker()));
        workers.push(tokio::spawn(self.clone().run_layout_writer()));
        info!("Mirror controller started");
    }

    /// Stop background work and write out any unsaved layout.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        let handles = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            if let Err(err) = handle.await {
                error!("Mirror worker failed to join: {err:?}");
            }
        }
        self.persist_layout().await;
        info!("Mirror controller stopped");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MirrorEvent> {
        self.events.subscribe()
    }

    pub async fn on_frame(&self, report: &FrameReport) {
        let events = self.state.lock().await.on_frame(report, Instant::now());
        self.dispatch(events).await;
    }

    pub async fn should_sample_face(&self) -> bool {
        self.state.lock().await.should_sample_face()
    }

    pub async fn apply_push(&self, event: PushEvent) {
        let events = self.state.lock().await.apply_push(event, Instant::now());
        self.dispatch(events).await;
    }

    pub async fn toggle_widget(&self, id: &str) {
        let events = self.state.lock().await.toggle_widget(id);
        self.dispatch(events).await;
    }

    pub async fn apply_preset(&self, name: &str) {
        let events = self.state.lock().await.apply_preset(name);
        self.dispatch(events).await;
    }

    pub async fn set_settings_open(&self, open: bool) {
        let events = self
            .state
            .lock()
            .await
            .set_settings_open(open, Instant::now());
        self.dispatch(events).await;
    }

    pub async fn toggle_focus(&self) {
        let events = self.state.lock().await.toggle_focus(Instant::now());
        self.dispatch(events).await;
    }

    pub fn ui_config(&self) -> UiConfig {
        self.settings.ui_config()
    }

    pub async fn update_ui_config(&self, config: UiConfig) -> Result<()> {
        self.settings.update_ui_config(config).await
    }

    /// Wipe stored layout and settings, then return to the default preset.
    pub async fn reset_to_factory(&self) -> Result<()> {
        self.db.clear_all().await?;
        self.settings.reset().await?;
        let events = self.state.lock().await.reset_to_factory(Instant::now());
        warn!("Factory reset: stored layout and settings cleared");
        self.dispatch(events).await;
        Ok(())
    }

    pub async fn snapshot(&self) -> MirrorSnapshot {
        self.state.lock().await.snapshot(Instant::now())
    }

    async fn dispatch(&self, events: Vec<MirrorEvent>) {
        let booting = events.iter().any(|event| {
            matches!(
                event,
                MirrorEvent::PowerChanged {
                    phase: PowerPhase::Booting
                }
            )
        });
        let reload = events.contains(&MirrorEvent::ReloadRequested);

        self.publish(events);

        if booting {
            self.schedule_boot_finish().await;
        }
        if reload {
            self.reload().await;
        }
    }

    fn publish(&self, events: Vec<MirrorEvent>) {
        for event in events {
            match &event {
                MirrorEvent::Cue { cue } => self.cues.play(*cue),
                MirrorEvent::WidgetSettled { .. }
                | MirrorEvent::WidgetsMoved { .. }
                | MirrorEvent::WidgetToggled { .. }
                | MirrorEvent::WidgetUpdated { .. }
                | MirrorEvent::PresetApplied { .. }
                | MirrorEvent::PowerChanged { .. } => self.persist_signal.notify_one(),
                _ => {}
            }
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }

    /// Finish the boot as soon as the delay passes rather than on the next
    /// session tick.
    async fn schedule_boot_finish(&self) {
        let delay = self.state.lock().await.config().boot_delay();
        let this = self.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep(delay) => this.session_tick().await,
                _ = this.cancel_token.cancelled() => {}
            }
        });

        let mut workers = self.workers.lock().await;
        workers.retain(|worker| !worker.is_finished());
        workers.push(handle);
    }

    async fn reload(&self) {
        self.persist_layout().await;
        let widgets = load_widgets(&self.db).await;
        self.state
            .lock()
            .await
            .reinitialize(widgets, Instant::now());
        info!("Mirror state reloaded");
        self.publish(vec![MirrorEvent::Reloaded]);
    }

    async fn session_tick(&self) {
        let events = self.state.lock().await.session_tick(Instant::now());
        self.publish(events);
    }

    async fn run_layout_ticker(self) {
        let period = self.state.lock().await.config().layout_tick();
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let events = self.state.lock().await.layout_tick();
                    self.publish(events);
                }
                _ = self.cancel_token.cancelled() => break,
            }
        }
    }

    async fn run_session_ticker(self) {
        let period = self.state.lock().await.config().session_tick();
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.session_tick().await,
                _ = self.cancel_token.cancelled() => break,
            }
        }
    }

    /// Coalesces bursts of layout changes into one write.
    async fn run_layout_writer(self) {
        let debounce = self.state.lock().await.config().persist_debounce();

        loop {
            tokio::select! {
                _ = self.persist_signal.notified() => {
                    tokio::select! {
                        _ = time::sleep(debounce) => {}
                        _ = self.cancel_token.cancelled() => {}
                    }
                    self.persist_layout().await;
                }
                _ = self.cancel_token.cancelled() => break,
            }
        }
    }

    async fn persist_layout(&self) {
        let pending = self.state.lock().await.take_settled_layout();
        let json = match pending {
            None => return,
            Some(Ok(json)) => json,
            Some(Err(err)) => {
                error!("Failed to serialize widget layout: {err:?}");
                return;
            }
        };
        if let Err(err) = self.db.save_layout(json).await {
            error!("Failed to persist widget layout: {err:?}");
        }
    }
}

/// Stored layout, or the default preset when there is none or it is unreadable.
async fn load_widgets(db: &Database) -> WidgetRegistry {
    match db.load_layout().await {
        Ok(Some(json)) => WidgetRegistry::from_saved(&json).unwrap_or_else(|err| {
            warn!("Discarding stored layout: {err:?}");
            WidgetRegistry::from_preset(Preset::Default)
        }),
        Ok(None) => WidgetRegistry::from_preset(Preset::Default),
        Err(err) => {
            error!("Failed to load stored layout: {err:?}");
            WidgetRegistry::from_preset(Preset::Default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::RecordingCuePlayer, db::temp_database, gesture::landmarks::make_hand,
        session::ViewMode,
    };
    use std::time::Duration;

    fn hand_at(x: f32, y: f32, pinch: f32) -> FrameReport {
        FrameReport::with_hand(make_hand(1.0 - x / 100.0, y / 100.0, pinch))
    }

    async fn controller(db: Database) -> MirrorController {
        controller_with(InteractionConfig::default(), db).await
    }

    async fn controller_with(config: InteractionConfig, db: Database) -> MirrorController {
        MirrorController::new(config, db, Arc::new(RecordingCuePlayer::default()))
            .await
            .unwrap()
    }

    fn visible(snapshot: &MirrorSnapshot, id: &str) -> bool {
        snapshot.widgets.iter().any(|w| w.id == id && w.visible)
    }

    async fn drag(controller: &MirrorController, from: (f32, f32), to: (f32, f32)) {
        controller.on_frame(&hand_at(from.0, from.1, 0.01)).await;
        for step in 1..=10 {
            let t = step as f32 / 10.0;
            let x = from.0 + (to.0 - from.0) * t;
            let y = from.1 + (to.1 - from.1) * t;
            controller.on_frame(&hand_at(x, y, 0.01)).await;
        }
        controller.on_frame(&hand_at(to.0, to.1, 0.2)).await;
    }

    fn weather(snapshot: &MirrorSnapshot) -> (f32, f32) {
        let widget = snapshot.widgets.iter().find(|w| w.id == "weather").unwrap();
        (widget.x, widget.y)
    }

    #[tokio::test]
    async fn test_settled_layout_survives_restart() {
        let db = temp_database();
        let first = controller(db.clone()).await;
        drag(&first, (20.0, 20.0), (30.0, 70.0)).await;
        first.shutdown().await;
        let before = weather(&first.snapshot().await);
        assert!((before.0 - 30.0).abs() < 1e-3);

        let second = controller(db).await;
        assert_eq!(weather(&second.snapshot().await), before);
    }

    #[tokio::test]
    async fn test_standby_toggle_survives_restart() {
        let db = temp_database();
        let config = InteractionConfig {
            inactivity_timeout_ms: 50,
            session_tick_ms: 20,
            ..InteractionConfig::default()
        };
        let first = controller_with(config.clone(), db.clone()).await;
        let mut rx = first.subscribe();
        first.start().await;

        time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(MirrorEvent::PowerChanged {
                    phase: PowerPhase::Standby,
                }) = rx.recv().await
                {
                    break;
                }
            }
        })
        .await
        .unwrap();

        first.toggle_widget("news").await;
        time::sleep(Duration::from_millis(400)).await;
        assert_eq!(first.snapshot().await.phase, PowerPhase::Standby);
        first.shutdown().await;

        let second = controller_with(config, db).await;
        assert!(!visible(&second.snapshot().await, "news"));
    }

    #[tokio::test]
    async fn test_boot_finishes_without_session_ticker() {
        let config = InteractionConfig {
            inactivity_timeout_ms: 50,
            boot_delay_ms: 50,
            ..InteractionConfig::default()
        };
        let controller = controller_with(config, temp_database()).await;

        time::sleep(Duration::from_millis(100)).await;
        controller.session_tick().await;
        assert_eq!(controller.snapshot().await.phase, PowerPhase::Standby);

        controller.on_frame(&hand_at(50.0, 50.0, 0.2)).await;
        assert_eq!(controller.snapshot().await.phase, PowerPhase::Booting);

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.snapshot().await.phase, PowerPhase::Active);
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let controller = controller(temp_database()).await;
        let mut rx = controller.subscribe();

        controller.on_frame(&hand_at(20.0, 20.0, 0.01)).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            MirrorEvent::GrabStarted {
                id: "weather".into()
            }
        );
    }

    #[tokio::test]
    async fn test_layout_ticker_pulls_widget_back_on_screen() {
        let controller = controller(temp_database()).await;
        drag(&controller, (20.0, 20.0), (1.0, 40.0)).await;
        assert!(weather(&controller.snapshot().await).0 < 1.5);

        controller.start().await;
        time::sleep(Duration::from_millis(400)).await;
        controller.shutdown().await;
        assert!(weather(&controller.snapshot().await).0 > 1.5);
    }

    #[tokio::test]
    async fn test_toggle_focus_and_settings() {
        let controller = controller(temp_database()).await;
        controller.toggle_focus().await;
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.view, ViewMode::Focus);
        assert_eq!(snapshot.focus.remaining_secs, 1500);

        controller.set_settings_open(true).await;
        assert!(controller.snapshot().await.settings_open);
    }

    #[tokio::test]
    async fn test_reset_to_factory_clears_storage() {
        let db = temp_database();
        let controller = controller(db.clone()).await;
        controller.toggle_widget("news").await;
        controller
            .update_ui_config(UiConfig {
                theme: "cyber".into(),
                ..UiConfig::default()
            })
            .await
            .unwrap();
        controller.shutdown().await;
        assert!(db.load_layout().await.unwrap().is_some());

        controller.reset_to_factory().await.unwrap();
        assert_eq!(controller.ui_config(), UiConfig::default());
        assert!(db.load_layout().await.unwrap().is_none());
        assert!(db.load_ui_config().await.unwrap().is_none());
        let snapshot = controller.snapshot().await;
        let news = snapshot.widgets.iter().find(|w| w.id == "news").unwrap();
        assert!(news.visible);
    }

    #[tokio::test]
    async fn test_malformed_stored_layout_falls_back_to_default() {
        let db = temp_database();
        db.save_layout("[[[".into()).await.unwrap();
        let controller = controller(db).await;
        assert_eq!(weather(&controller.snapshot().await), (20.0, 20.0));
    }
}
