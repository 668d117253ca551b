//! The on-page badge: a view over the budgeter plus its own input handling.
//!
//! The badge shows `visible / total` exchanges, tints its border by how much
//! of the conversation is hidden, and accepts three gestures:
//!
//! | Gesture | Effect |
//! |---------|--------|
//! | click | manual budget +5 |
//! | shift-click | manual budget −5 (floor 1) |
//! | alt-drag | move the badge; the position is saved |

use serde::{Deserialize, Serialize};

use crate::config::PillPosition;
use crate::prune::EXPAND_STEP;

/// Badge footprint, used to keep it inside the viewport while dragging.
pub const BADGE_WIDTH: f64 = 140.0;
pub const BADGE_HEIGHT: f64 = 36.0;

/// Border color when more than half the conversation is hidden.
pub const SEVERE_BORDER: &str = "rgba(255, 100, 100, 0.6)";
/// Border color when more than a quarter is hidden.
pub const WARN_BORDER: &str = "rgba(255, 200, 0, 0.6)";
const DARK_BORDER: &str = "rgba(255, 255, 255, 0.2)";
const LIGHT_BORDER: &str = "rgba(0, 0, 0, 0.15)";
const DARK_BACKGROUND: &str = "rgba(32, 33, 35, 0.9)";
const LIGHT_BACKGROUND: &str = "rgba(255, 255, 255, 0.9)";

/// Keyboard modifiers held during a pointer gesture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
}

impl Modifiers {
    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::default()
        }
    }

    pub fn alt() -> Self {
        Self {
            alt: true,
            ..Self::default()
        }
    }
}

/// Viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Everything a host needs to draw the badge.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorView {
    pub label: String,
    pub border_color: String,
    pub background: String,
    pub dark: bool,
    /// `None` keeps the default corner placement.
    pub position: Option<PillPosition>,
}

impl IndicatorView {
    /// Compose the view from unit counts.
    pub fn compose(
        visible: usize,
        total: usize,
        hidden: usize,
        dark: bool,
        position: Option<PillPosition>,
    ) -> Self {
        let label = if total == 0 {
            "No messages found".to_string()
        } else {
            format!("{visible} visible / {total} total")
        };
        let hidden_percent = if total > 0 {
            hidden as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let border_color = if hidden_percent > 50.0 {
            SEVERE_BORDER
        } else if hidden_percent > 25.0 {
            WARN_BORDER
        } else if dark {
            DARK_BORDER
        } else {
            LIGHT_BORDER
        };
        Self {
            label,
            border_color: border_color.to_string(),
            background: if dark { DARK_BACKGROUND } else { LIGHT_BACKGROUND }.to_string(),
            dark,
            position,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    grab_dx: f64,
    grab_dy: f64,
    moved: bool,
}

/// Badge position and drag state.
#[derive(Debug, Clone, Default)]
pub struct Indicator {
    position: Option<PillPosition>,
    drag: Option<Drag>,
}

impl Indicator {
    pub fn new(position: Option<PillPosition>) -> Self {
        Self {
            position,
            drag: None,
        }
    }

    pub fn position(&self) -> Option<PillPosition> {
        self.position
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Budget after a click. Shift steps down, anything else steps up.
    pub fn click_budget(modifiers: Modifiers, effective: usize) -> usize {
        if modifiers.shift {
            effective.saturating_sub(EXPAND_STEP).max(1)
        } else {
            effective.saturating_add(EXPAND_STEP)
        }
    }

    /// Begin a drag at pointer `(x, y)`. Only an alt-held press drags.
    /// `origin` is where the badge is drawn now.
    pub fn drag_start(&mut self, x: f64, y: f64, modifiers: Modifiers, origin: PillPosition) -> bool {
        if !modifiers.alt {
            return false;
        }
        let origin = self.position.unwrap_or(origin);
        self.drag = Some(Drag {
            grab_dx: x - origin.x,
            grab_dy: y - origin.y,
            moved: false,
        });
        true
    }

    /// Follow the pointer, keeping the badge fully inside the viewport.
    pub fn drag_move(&mut self, x: f64, y: f64, viewport: Viewport) -> Option<PillPosition> {
        let drag = self.drag.as_mut()?;
        drag.moved = true;
        let max_x = (viewport.width - BADGE_WIDTH).max(0.0);
        let max_y = (viewport.height - BADGE_HEIGHT).max(0.0);
        let pos = PillPosition {
            x: (x - drag.grab_dx).clamp(0.0, max_x),
            y: (y - drag.grab_dy).clamp(0.0, max_y),
        };
        self.position = Some(pos);
        Some(pos)
    }

    /// Finish a drag. Returns the position to persist if the badge moved.
    pub fn drag_end(&mut self) -> Option<PillPosition> {
        let drag = self.drag.take()?;
        if drag.moved { self.position } else { None }
    }
}
