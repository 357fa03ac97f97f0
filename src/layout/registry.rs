use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::gesture::{LockedAction, Point};

use super::presets::Preset;

/// Most-recent-first notifications kept on the notifications widget.
pub const MAX_NOTIFICATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WidgetKind {
    Clock,
    Weather,
    Status,
    News,
    Music,
    Notifications,
    Calendar,
    Mail,
    Search,
}

/// Settings-panel entry for one widget kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub category: &'static str,
    pub priority: u8,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 9] = [
        WidgetKind::Clock,
        WidgetKind::Weather,
        WidgetKind::Status,
        WidgetKind::News,
        WidgetKind::Music,
        WidgetKind::Notifications,
        WidgetKind::Calendar,
        WidgetKind::Mail,
        WidgetKind::Search,
    ];

    /// Registry key.
    pub fn id(&self) -> &'static str {
        match self {
            WidgetKind::Clock => "time",
            WidgetKind::Weather => "weather",
            WidgetKind::Status => "status",
            WidgetKind::News => "news",
            WidgetKind::Music => "music",
            WidgetKind::Notifications => "notifications",
            WidgetKind::Calendar => "calendar",
            WidgetKind::Mail => "mail",
            WidgetKind::Search => "search",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WidgetKind::Clock => "Master Clock",
            WidgetKind::Weather => "Atmosphere",
            WidgetKind::Status => "Systems",
            WidgetKind::News => "Global Feed",
            WidgetKind::Music => "Audio",
            WidgetKind::Notifications => "Message Center",
            WidgetKind::Calendar => "Daily Agenda",
            WidgetKind::Mail => "Priority Inbox",
            WidgetKind::Search => "Voice Search",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            WidgetKind::Clock | WidgetKind::Status => "system",
            WidgetKind::Weather => "ambient",
            WidgetKind::News => "info",
            WidgetKind::Music => "media",
            WidgetKind::Notifications => "communication",
            WidgetKind::Calendar | WidgetKind::Mail => "productivity",
            WidgetKind::Search => "intelligence",
        }
    }

    pub fn priority(&self) -> u8 {
        match self {
            WidgetKind::Search => 0,
            WidgetKind::Clock => 1,
            WidgetKind::Weather => 2,
            WidgetKind::Status => 3,
            WidgetKind::News => 4,
            WidgetKind::Music => 5,
            WidgetKind::Notifications => 6,
            WidgetKind::Calendar => 7,
            WidgetKind::Mail => 8,
        }
    }

    pub fn info(&self) -> WidgetInfo {
        WidgetInfo {
            id: self.id(),
            name: self.display_name(),
            category: self.category(),
            priority: self.priority(),
        }
    }

    /// Every kind, highest priority first.
    pub fn catalogue() -> Vec<WidgetInfo> {
        let mut entries: Vec<WidgetInfo> = Self::ALL.iter().map(WidgetKind::info).collect();
        entries.sort_by_key(|info| info.priority);
        entries
    }

    /// Locked widgets cannot be dragged; a sustained grab on them fires
    /// their action instead.
    pub fn locked_action(&self) -> Option<LockedAction> {
        match self {
            WidgetKind::Clock => Some(LockedAction::Focus),
            WidgetKind::Calendar => Some(LockedAction::Agenda),
            _ => None,
        }
    }

    fn empty_payload(&self) -> WidgetPayload {
        match self {
            WidgetKind::Notifications => WidgetPayload::Notifications { items: Vec::new() },
            WidgetKind::Calendar => WidgetPayload::Calendar { events: Vec::new() },
            WidgetKind::Mail => WidgetPayload::Mail { emails: Vec::new() },
            WidgetKind::Music => WidgetPayload::Music { track: None },
            WidgetKind::Search => WidgetPayload::Search {
                query: String::new(),
                result: String::new(),
            },
            _ => WidgetPayload::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub app: String,
    pub message: String,
    #[serde(default)]
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub title: String,
    #[serde(default)]
    pub time: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailItem {
    pub from: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub title: String,
    #[serde(default)]
    pub artist: String,
}

/// Kind-specific content carried by a widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WidgetPayload {
    None,
    Notifications { items: Vec<Notification> },
    Calendar { events: Vec<CalendarEvent> },
    Mail { emails: Vec<MailItem> },
    Music { track: Option<Track> },
    Search { query: String, result: String },
}

impl Default for WidgetPayload {
    fn default() -> Self {
        WidgetPayload::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: String,
    pub kind: WidgetKind,
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub visible: bool,
    /// Ephemeral; never persisted.
    #[serde(skip)]
    pub is_dragging: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub payload: WidgetPayload,
}

impl Widget {
    pub fn new(kind: WidgetKind, preset: Preset) -> Self {
        let placement = preset.placement(kind);
        Self {
            id: kind.id().to_string(),
            kind,
            x: placement.x,
            y: placement.y,
            scale: placement.scale,
            visible: placement.visible,
            is_dragging: false,
            locked: kind.locked_action().is_some(),
            payload: kind.empty_payload(),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Visible, unlocked and therefore grabbable.
    pub fn is_draggable(&self) -> bool {
        self.visible && !self.locked
    }
}

/// Owned set of widgets, in stable catalogue order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetRegistry {
    widgets: Vec<Widget>,
}

impl WidgetRegistry {
    pub fn from_preset(preset: Preset) -> Self {
        Self {
            widgets: WidgetKind::ALL
                .into_iter()
                .map(|kind| Widget::new(kind, preset))
                .collect(),
        }
    }

    /// Merge a stored layout over the default preset.
    ///
    /// Entries with unknown ids or that fail to parse are dropped; widgets
    /// missing from the stored layout come from the preset. Lock flags
    /// always follow the widget kind.
    pub fn from_saved(json: &str) -> Result<Self> {
        let entries: Vec<serde_json::Value> =
            serde_json::from_str(json).context("stored widget layout is not a JSON array")?;

        let mut registry = Self::from_preset(Preset::Default);
        for entry in entries {
            let widget: Widget = match serde_json::from_value(entry) {
                Ok(widget) => widget,
                Err(err) => {
                    warn!("Dropping unreadable stored widget: {err}");
                    continue;
                }
            };

            if WidgetKind::from_id(&widget.id) != Some(widget.kind) {
                warn!("Dropping stored widget with unknown id '{}'", widget.id);
                continue;
            }

            if !widget.x.is_finite() || !widget.y.is_finite() || !widget.scale.is_finite() {
                warn!("Dropping stored widget '{}' with non-finite geometry", widget.id);
                continue;
            }

            if let Some(slot) = registry.get_mut(&widget.id) {
                let locked = slot.locked;
                let payload = if payload_matches(widget.kind, &widget.payload) {
                    widget.payload
                } else {
                    std::mem::take(&mut slot.payload)
                };
                *slot = Widget {
                    locked,
                    payload,
                    is_dragging: false,
                    ..widget
                };
            }
        }

        Ok(registry)
    }

    /// Serialize for storage. `is_dragging` is never written.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.widgets).context("failed to serialize widget layout")
    }

    pub fn iter(&self) -> impl Iterator<Item = &Widget> {
        self.widgets.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Widget> {
        self.widgets.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn get(&self, id: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.id == id)
    }

    pub fn dragging_id(&self) -> Option<&str> {
        self.widgets
            .iter()
            .find(|w| w.is_dragging)
            .map(|w| w.id.as_str())
    }

    pub fn any_dragging(&self) -> bool {
        self.widgets.iter().any(|w| w.is_dragging)
    }

    /// Mark `id` as the single dragged widget. Returns false when the
    /// widget does not exist or cannot be dragged.
    pub fn begin_drag(&mut self, id: &str) -> bool {
        let grabbable = self.get(id).map(Widget::is_draggable).unwrap_or(false);
        if !grabbable {
            return false;
        }
        for widget in &mut self.widgets {
            widget.is_dragging = widget.id == id;
        }
        true
    }

    pub fn move_to(&mut self, id: &str, position: Point) {
        if let Some(widget) = self.get_mut(id) {
            widget.x = position.x;
            widget.y = position.y;
        }
    }

    /// Clear every drag flag; returns the widget that was being dragged.
    pub fn end_drag(&mut self) -> Option<String> {
        let mut released = None;
        for widget in &mut self.widgets {
            if widget.is_dragging {
                widget.is_dragging = false;
                released = Some(widget.id.clone());
            }
        }
        released
    }

    /// Flip visibility; returns the new value.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let widget = self.get_mut(id)?;
        widget.visible = !widget.visible;
        if !widget.visible {
            widget.is_dragging = false;
        }
        Some(widget.visible)
    }

    pub fn set_visible(&mut self, id: &str, visible: bool) {
        if let Some(widget) = self.get_mut(id) {
            widget.visible = visible;
        }
    }

    /// Overwrite geometry and visibility from a preset; payloads survive.
    pub fn apply_preset(&mut self, preset: Preset) {
        for widget in &mut self.widgets {
            let placement = preset.placement(widget.kind);
            widget.x = placement.x;
            widget.y = placement.y;
            widget.scale = placement.scale;
            widget.visible = placement.visible;
            widget.is_dragging = false;
        }
    }
}

fn payload_matches(kind: WidgetKind, payload: &WidgetPayload) -> bool {
    matches!(
        (kind, payload),
        (WidgetKind::Notifications, WidgetPayload::Notifications { .. })
            | (WidgetKind::Calendar, WidgetPayload::Calendar { .. })
            | (WidgetKind::Mail, WidgetPayload::Mail { .. })
            | (WidgetKind::Music, WidgetPayload::Music { .. })
            | (WidgetKind::Search, WidgetPayload::Search { .. })
            | (
                WidgetKind::Clock | WidgetKind::Weather | WidgetKind::Status | WidgetKind::News,
                WidgetPayload::None
            )
    )
}
