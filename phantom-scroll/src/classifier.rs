//! Rolling classification of mouse events
//!
//! Each wheel event is compared against the time of the last button event
//! ("near-click"), and the rate of button-down events over a trailing window
//! decides whether the player is currently in combat.

use crate::{EventLabel, InputEvent, LogRow, MouseButton};
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

pub const NEAR_CLICK_MS_DEFAULT: u64 = 80;
pub const NEAR_CLICK_MS_RANGE: (u64, u64) = (20, 500);
pub const COMBAT_CPS_DEFAULT: f64 = 2.0;
pub const COMBAT_CPS_RANGE: (f64, f64) = (1.0, 20.0);
pub const RATE_WINDOW_MS_DEFAULT: u64 = 1000;

/// Which button-down events count toward the click rate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RateButtons {
    /// Only the primary (left) button, i.e. the trigger
    #[default]
    Primary,
    /// Every mouse button
    Any,
}

impl RateButtons {
    fn counts(&self, button: MouseButton) -> bool {
        match self {
            RateButtons::Primary => button == MouseButton::Left,
            RateButtons::Any => true,
        }
    }
}

/// Configuration for the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// A wheel event this close to a button event is flagged as near-click (milliseconds)
    pub near_click_ms: u64,

    /// Button-downs per second above which the session counts as combat
    pub combat_cps: f64,

    /// Length of the trailing window used for the click rate (milliseconds)
    pub rate_window_ms: u64,

    /// Whether to track and log cursor coordinates
    pub coords_enabled: bool,

    /// Whether button down/up events also produce log rows
    pub log_button_events: bool,

    /// Which buttons count toward the click rate
    pub rate_buttons: RateButtons,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            near_click_ms: NEAR_CLICK_MS_DEFAULT,
            combat_cps: COMBAT_CPS_DEFAULT,
            rate_window_ms: RATE_WINDOW_MS_DEFAULT,
            coords_enabled: false,
            log_button_events: false,
            rate_buttons: RateButtons::Primary,
        }
    }
}

impl ClassifierConfig {
    /// Clamp thresholds into the ranges the tool supports
    pub fn validated(mut self) -> Self {
        self.near_click_ms = self
            .near_click_ms
            .clamp(NEAR_CLICK_MS_RANGE.0, NEAR_CLICK_MS_RANGE.1);
        self.combat_cps = if self.combat_cps.is_finite() {
            self.combat_cps.clamp(COMBAT_CPS_RANGE.0, COMBAT_CPS_RANGE.1)
        } else {
            COMBAT_CPS_DEFAULT
        };
        self.rate_window_ms = self.rate_window_ms.max(1);
        self
    }
}

/// A change of the combat flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatTransition {
    Entered,
    Left,
}

/// The result of feeding one event to the classifier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verdict {
    /// Row to append to the session log, if the event qualifies
    pub row: Option<LogRow>,
    /// Set when the event flipped the combat flag
    pub transition: Option<CombatTransition>,
}

/// Rolling state for one session
#[derive(Debug, Clone, Default)]
pub struct ClassifierState {
    last_button_ms: Option<u64>,
    recent_downs: VecDeque<u64>,
    combat: bool,
    last_position: Option<(i32, i32)>,
    latest_ms: u64,
}

impl ClassifierState {
    pub fn last_button_ms(&self) -> Option<u64> {
        self.last_button_ms
    }

    pub fn in_combat(&self) -> bool {
        self.combat
    }

    pub fn last_position(&self) -> Option<(i32, i32)> {
        self.last_position
    }
}

/// Session-scoped event classifier
pub struct Classifier {
    config: ClassifierConfig,
    state: ClassifierState,
    started_at: DateTime<Local>,
}

impl Classifier {
    /// Create a classifier for a session that started at `started_at`
    pub fn new(config: ClassifierConfig, started_at: DateTime<Local>) -> Self {
        Self {
            config: config.validated(),
            state: ClassifierState::default(),
            started_at,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    /// Apply new thresholds mid-session
    pub fn set_config(&mut self, config: ClassifierConfig) {
        let config = config.validated();
        if !config.coords_enabled {
            self.state.last_position = None;
        }
        debug!("Classifier config updated: {:?}", config);
        self.config = config;
    }

    /// Dispatch a raw input event
    pub fn observe(&mut self, event: &InputEvent) -> Verdict {
        match *event {
            InputEvent::ButtonDown { button, at_ms } => self.on_button_down(button, at_ms),
            InputEvent::ButtonUp { button, at_ms } => self.on_button_up(button, at_ms),
            InputEvent::WheelScroll { dx, dy, at_ms } => self.on_wheel_scroll(at_ms, dx, dy),
            InputEvent::CursorMove { x, y, .. } => {
                self.on_cursor_move(x, y);
                Verdict::default()
            }
        }
    }

    pub fn on_button_down(&mut self, button: MouseButton, at_ms: u64) -> Verdict {
        let now = self.advance(at_ms);

        if self.config.rate_buttons.counts(button) {
            self.state.recent_downs.push_back(now);
        }
        let transition = self.refresh_combat(now);
        self.state.last_button_ms = Some(now);

        Verdict {
            row: self.button_row(EventLabel::ButtonDown(button), now),
            transition,
        }
    }

    pub fn on_button_up(&mut self, button: MouseButton, at_ms: u64) -> Verdict {
        let now = self.advance(at_ms);
        let transition = self.refresh_combat(now);
        self.state.last_button_ms = Some(now);

        Verdict {
            row: self.button_row(EventLabel::ButtonUp(button), now),
            transition,
        }
    }

    pub fn on_wheel_scroll(&mut self, at_ms: u64, dx: i64, dy: i64) -> Verdict {
        let now = self.advance(at_ms);
        let transition = self.refresh_combat(now);

        let ms_since_button_event = self
            .state
            .last_button_ms
            .map(|last| now.saturating_sub(last));
        let scroll_near_click =
            matches!(ms_since_button_event, Some(ms) if ms <= self.config.near_click_ms);

        let (x, y) = self.position();
        let row = LogRow {
            timestamp: self.wall_clock(now),
            ms_since_start: now,
            x,
            y,
            dx,
            dy,
            ms_since_button_event,
            combat_state: self.state.combat,
            scroll_near_click,
            event: EventLabel::for_wheel(dx, dy),
        };

        if scroll_near_click {
            debug!(
                "Wheel event {} ms after a button event (combat: {})",
                ms_since_button_event.unwrap_or_default(),
                self.state.combat
            );
        }

        Verdict {
            row: Some(row),
            transition,
        }
    }

    pub fn on_cursor_move(&mut self, x: f64, y: f64) {
        if self.config.coords_enabled {
            self.state.last_position = Some((x.round() as i32, y.round() as i32));
        }
    }

    /// Evict stale button-downs without an input event so combat can end while idle.
    ///
    /// `now_ms` only drives eviction; the event timeline used to clamp later
    /// events is left untouched.
    pub fn tick(&mut self, now_ms: u64) -> Option<CombatTransition> {
        let now = now_ms.max(self.state.latest_ms);
        self.refresh_combat(now)
    }

    /// Counted button-downs per second over the trailing window
    pub fn clicks_per_sec(&self) -> f64 {
        self.state.recent_downs.len() as f64 / (self.config.rate_window_ms as f64 / 1000.0)
    }

    /// Clamp out-of-order timestamps to the latest one seen
    fn advance(&mut self, at_ms: u64) -> u64 {
        self.state.latest_ms = self.state.latest_ms.max(at_ms);
        self.state.latest_ms
    }

    fn refresh_combat(&mut self, now: u64) -> Option<CombatTransition> {
        let cutoff = now.saturating_sub(self.config.rate_window_ms);
        while self
            .state
            .recent_downs
            .front()
            .is_some_and(|&down| down < cutoff)
        {
            self.state.recent_downs.pop_front();
        }

        // a lone click is never combat, whatever the threshold
        let combat =
            self.state.recent_downs.len() >= 2 && self.clicks_per_sec() > self.config.combat_cps;

        let transition = match (self.state.combat, combat) {
            (false, true) => Some(CombatTransition::Entered),
            (true, false) => Some(CombatTransition::Left),
            _ => None,
        };
        self.state.combat = combat;
        transition
    }

    fn button_row(&self, event: EventLabel, now: u64) -> Option<LogRow> {
        if !self.config.log_button_events {
            return None;
        }

        let (x, y) = self.position();
        Some(LogRow {
            timestamp: self.wall_clock(now),
            ms_since_start: now,
            x,
            y,
            dx: 0,
            dy: 0,
            ms_since_button_event: Some(0),
            combat_state: self.state.combat,
            scroll_near_click: false,
            event,
        })
    }

    fn position(&self) -> (Option<i32>, Option<i32>) {
        match self.state.last_position {
            Some((x, y)) if self.config.coords_enabled => (Some(x), Some(y)),
            _ => (None, None),
        }
    }

    fn wall_clock(&self, ms: u64) -> DateTime<Local> {
        self.started_at + Duration::milliseconds(ms as i64)
    }
}
