use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a mouse button
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    /// Side or extra buttons, carrying the platform button code
    Other(u8),
}

impl MouseButton {
    fn label(&self) -> String {
        match self {
            MouseButton::Left => "Left".to_string(),
            MouseButton::Right => "Right".to_string(),
            MouseButton::Middle => "Middle".to_string(),
            MouseButton::Other(code) => format!("Button{}", code),
        }
    }
}

/// A raw mouse event as delivered by the input hook.
///
/// `at_ms` is a monotonic timestamp in milliseconds since the session epoch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum InputEvent {
    ButtonDown { button: MouseButton, at_ms: u64 },
    ButtonUp { button: MouseButton, at_ms: u64 },
    /// Signed wheel deltas in ticks: `dx` horizontal, `dy` vertical (positive is up)
    WheelScroll { dx: i64, dy: i64, at_ms: u64 },
    CursorMove { x: f64, y: f64, at_ms: u64 },
}

impl InputEvent {
    /// Timestamp of the event in milliseconds since the session epoch
    pub fn at_ms(&self) -> u64 {
        match *self {
            InputEvent::ButtonDown { at_ms, .. }
            | InputEvent::ButtonUp { at_ms, .. }
            | InputEvent::WheelScroll { at_ms, .. }
            | InputEvent::CursorMove { at_ms, .. } => at_ms,
        }
    }
}

/// The `event` column of a log row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventLabel {
    WheelUp,
    WheelDown,
    WheelLeft,
    WheelRight,
    /// Wheel message with no delta on either axis
    Wheel,
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
}

impl EventLabel {
    /// Label for a wheel event; the vertical axis wins when both deltas are set.
    pub fn for_wheel(dx: i64, dy: i64) -> Self {
        if dy > 0 {
            EventLabel::WheelUp
        } else if dy < 0 {
            EventLabel::WheelDown
        } else if dx > 0 {
            EventLabel::WheelRight
        } else if dx < 0 {
            EventLabel::WheelLeft
        } else {
            EventLabel::Wheel
        }
    }

    pub fn is_wheel(&self) -> bool {
        !matches!(self, EventLabel::ButtonDown(_) | EventLabel::ButtonUp(_))
    }
}

impl fmt::Display for EventLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventLabel::WheelUp => write!(f, "WheelUp"),
            EventLabel::WheelDown => write!(f, "WheelDown"),
            EventLabel::WheelLeft => write!(f, "WheelLeft"),
            EventLabel::WheelRight => write!(f, "WheelRight"),
            EventLabel::Wheel => write!(f, "Wheel"),
            EventLabel::ButtonDown(button) => write!(f, "{}Down", button.label()),
            EventLabel::ButtonUp(button) => write!(f, "{}Up", button.label()),
        }
    }
}
