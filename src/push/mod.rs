//! Payload updates arriving from the phone relay.

pub mod feed;

pub use feed::push_feed_loop;

use anyhow::{bail, Context, Result};
use chrono::Local;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::layout::{
    CalendarEvent, MailItem, Notification, Track, WidgetKind, WidgetPayload, WidgetRegistry,
    MAX_NOTIFICATIONS,
};

/// Wire shape: `{ "event": "<name>", "payload": ... }`.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

/// Notification as sent by the relay; every field is optional and the id
/// may be a number.
#[derive(Debug, Deserialize)]
struct IncomingNotification {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    app: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    time: Option<String>,
}

impl IncomingNotification {
    fn normalize(self) -> Notification {
        let id = match self.id {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        Notification {
            id,
            app: self.app.unwrap_or_else(|| "System".into()),
            message: self.message.unwrap_or_else(|| "New notification".into()),
            time: self
                .time
                .unwrap_or_else(|| Local::now().format("%H:%M").to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    query: String,
    result: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    NewNotification(Notification),
    UpdateCalendar(Vec<CalendarEvent>),
    UpdateMail(Vec<MailItem>),
    UpdateMusic(Option<Track>),
    SearchResult { query: String, result: String },
}

impl PushEvent {
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: PushEnvelope =
            serde_json::from_str(text).context("push message is not a valid envelope")?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: PushEnvelope) -> Result<Self> {
        let PushEnvelope { event, payload } = envelope;
        let parsed = match event.as_str() {
            "new-notification" => {
                let incoming: IncomingNotification = serde_json::from_value(payload)?;
                PushEvent::NewNotification(incoming.normalize())
            }
            "update-calendar" => PushEvent::UpdateCalendar(serde_json::from_value(payload)?),
            "update-mail" => PushEvent::UpdateMail(serde_json::from_value(payload)?),
            "update-music" => PushEvent::UpdateMusic(serde_json::from_value(payload)?),
            "search-result" => {
                let search: SearchPayload = serde_json::from_value(payload)?;
                PushEvent::SearchResult {
                    query: search.query,
                    result: search.result,
                }
            }
            other => bail!("unknown push event '{other}'"),
        };
        Ok(parsed)
    }

    pub fn widget_kind(&self) -> WidgetKind {
        match self {
            PushEvent::NewNotification(_) => WidgetKind::Notifications,
            PushEvent::UpdateCalendar(_) => WidgetKind::Calendar,
            PushEvent::UpdateMail(_) => WidgetKind::Mail,
            PushEvent::UpdateMusic(_) => WidgetKind::Music,
            PushEvent::SearchResult { .. } => WidgetKind::Search,
        }
    }

    /// Write the payload into its widget and make the widget visible.
    /// Returns the id of the updated widget.
    pub fn apply(self, widgets: &mut WidgetRegistry) -> Option<String> {
        let kind = self.widget_kind();
        let widget = widgets.get_mut(kind.id())?;
        widget.visible = true;

        widget.payload = match (self, std::mem::take(&mut widget.payload)) {
            (PushEvent::NewNotification(item), WidgetPayload::Notifications { mut items }) => {
                items.insert(0, item);
                items.truncate(MAX_NOTIFICATIONS);
                WidgetPayload::Notifications { items }
            }
            (PushEvent::NewNotification(item), _) => WidgetPayload::Notifications {
                items: vec![item],
            },
            (PushEvent::UpdateCalendar(events), _) => WidgetPayload::Calendar { events },
            (PushEvent::UpdateMail(emails), _) => WidgetPayload::Mail { emails },
            (PushEvent::UpdateMusic(track), _) => WidgetPayload::Music { track },
            (PushEvent::SearchResult { query, result }, _) => {
                WidgetPayload::Search { query, result }
            }
        };

        Some(widget.id.clone())
    }
}
