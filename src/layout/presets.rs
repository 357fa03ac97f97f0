use serde::{Deserialize, Serialize};

use super::registry::WidgetKind;

/// Position, size and visibility of one widget in a preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub visible: bool,
}

const fn at(x: f32, y: f32, scale: f32, visible: bool) -> Placement {
    Placement {
        x,
        y,
        scale,
        visible,
    }
}

/// Named widget arrangements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Preset {
    Default,
    Morning,
}

impl Preset {
    /// Unknown names fall back to the default arrangement.
    pub fn from_name(name: &str) -> Self {
        match name {
            "morning" => Preset::Morning,
            _ => Preset::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Morning => "morning",
        }
    }

    pub fn placement(&self, kind: WidgetKind) -> Placement {
        match self {
            Preset::Default => match kind {
                WidgetKind::Clock => at(50.0, 50.0, 1.5, true),
                WidgetKind::Weather => at(20.0, 20.0, 1.0, true),
                WidgetKind::Status => at(90.0, 5.0, 0.9, true),
                WidgetKind::News => at(50.0, 85.0, 1.0, true),
                WidgetKind::Music => at(80.0, 80.0, 1.0, true),
                WidgetKind::Notifications => at(85.0, 50.0, 1.0, true),
                WidgetKind::Calendar => at(20.0, 50.0, 1.0, true),
                WidgetKind::Mail => at(20.0, 80.0, 1.0, true),
                WidgetKind::Search => at(50.0, 30.0, 1.0, false),
            },
            Preset::Morning => match kind {
                WidgetKind::Clock => at(50.0, 15.0, 1.0, true),
                WidgetKind::Weather => at(85.0, 20.0, 1.0, true),
                WidgetKind::Status => at(90.0, 5.0, 0.8, true),
                WidgetKind::News => at(50.0, 85.0, 1.0, true),
                WidgetKind::Music => at(10.0, 90.0, 1.0, false),
                WidgetKind::Notifications => at(90.0, 80.0, 1.0, true),
                WidgetKind::Calendar => at(25.0, 50.0, 1.2, true),
                WidgetKind::Mail => at(75.0, 50.0, 1.1, true),
                WidgetKind::Search => at(50.0, 30.0, 1.0, false),
            },
        }
    }
}
