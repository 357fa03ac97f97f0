pub mod engine;
pub mod presets;
pub mod registry;

pub use engine::{LayoutEngine, LayoutGate};
pub use presets::Preset;
pub use registry::{
    CalendarEvent, MailItem, Notification, Track, Widget, WidgetInfo, WidgetKind, WidgetPayload,
    WidgetRegistry, MAX_NOTIFICATIONS,
};
