//! Lock screen state machine
//!
//! ```text
//! Locked(NoAuth) --gesture--> Locked(AwaitingSecondaryAuth) --secret--> Unlocked
//!        \_____________ gesture, no secret configured ____________/
//! ```
//!
//! Wrong input keeps the state, clears the buffer and raises an error
//! indicator that expires on its own. Retries are unlimited.

use std::time::{Duration, Instant};

use super::pattern::{self, PatternPad};
use super::pointer::{PointerEvent, SlideTrack, SwipeUp, dispatch};
use super::{GestureDirection, LockConfig, LockOptions, PIN_LENGTH, SecondaryAuth};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStage {
    NoAuth,
    AwaitingSecondaryAuth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked(LockStage),
    /// Terminal for the session
    Unlocked,
}

/// What one piece of input did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Accepted, more input needed
    Pending,
    Unlocked,
    /// Wrong secret; buffer cleared, error indicator raised
    Rejected,
    /// Input does not apply to the current state
    Ignored,
}

#[derive(Debug)]
enum Gesture {
    Slide(SlideTrack),
    Swipe(SwipeUp),
}

pub struct LockScreenController {
    state: LockState,
    auth: Option<SecondaryAuth>,
    gesture: Gesture,
    pad: PatternPad,
    pin_input: String,
    error_since: Option<Instant>,
    error_display: Duration,
}

impl LockScreenController {
    /// Start of session: locked when the feature is enabled
    pub fn new(config: &LockConfig, options: &LockOptions) -> Self {
        let state = if config.enabled {
            LockState::Locked(LockStage::NoAuth)
        } else {
            LockState::Unlocked
        };

        let gesture = match config.gesture_direction {
            GestureDirection::Horizontal => {
                Gesture::Slide(SlideTrack::new(options.slide_track_width, options.slide_threshold))
            }
            GestureDirection::Vertical => Gesture::Swipe(SwipeUp::new(options.swipe_distance)),
        };

        tracing::debug!("Lock screen starts {:?}", state);

        Self {
            state,
            auth: config.secondary_auth(),
            gesture,
            pad: PatternPad::new(options.pattern_spacing, options.pattern_hit_radius),
            pin_input: String::new(),
            error_since: None,
            error_display: Duration::from_millis(options.error_display_ms),
        }
    }

    /// Controller for a session with no lock screen
    pub fn unlocked() -> Self {
        Self::new(&LockConfig::default(), &LockOptions::default())
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == LockState::Unlocked
    }

    /// The secondary-auth method the session expects, if any
    pub fn secondary_auth(&self) -> Option<&SecondaryAuth> {
        self.auth.as_ref()
    }

    /// The unlock gesture crossed its threshold
    pub fn gesture_complete(&mut self) -> LockState {
        if self.state == LockState::Locked(LockStage::NoAuth) {
            self.state = match self.auth {
                None => LockState::Unlocked,
                Some(_) => LockState::Locked(LockStage::AwaitingSecondaryAuth),
            };
            tracing::debug!("Unlock gesture complete, now {:?}", self.state);
        }
        self.state
    }

    /// Feed a pointer event to the slide track or swipe area
    pub fn handle_unlock_pointer(&mut self, event: PointerEvent) -> LockState {
        if self.state != LockState::Locked(LockStage::NoAuth) {
            return self.state;
        }
        let done = match &mut self.gesture {
            Gesture::Slide(track) => dispatch(track, event),
            Gesture::Swipe(swipe) => dispatch(swipe, event),
        };
        match done {
            Some(()) => self.gesture_complete(),
            None => self.state,
        }
    }

    /// Slide handle position, 0.0..=1.0; always 0 for swipe-up
    pub fn slide_progress(&self) -> f32 {
        match &self.gesture {
            Gesture::Slide(track) => track.progress(),
            Gesture::Swipe(_) => 0.0,
        }
    }

    fn awaiting(&self) -> bool {
        self.state == LockState::Locked(LockStage::AwaitingSecondaryAuth)
    }

    fn expects_pin(&self) -> bool {
        self.awaiting() && matches!(self.auth, Some(SecondaryAuth::Pin(_)))
    }

    fn expects_pattern(&self) -> bool {
        self.awaiting() && matches!(self.auth, Some(SecondaryAuth::Pattern(_)))
    }

    /// Append one keypad digit; the PIN is checked once it is complete
    pub fn press_digit(&mut self, digit: char, now: Instant) -> AuthOutcome {
        if !self.expects_pin() || !digit.is_ascii_digit() {
            return AuthOutcome::Ignored;
        }
        if self.pin_input.len() < PIN_LENGTH {
            self.pin_input.push(digit);
        }
        if self.pin_input.len() < PIN_LENGTH {
            return AuthOutcome::Pending;
        }
        let input = std::mem::take(&mut self.pin_input);
        self.submit_pin(&input, now)
    }

    pub fn backspace(&mut self) {
        self.pin_input.pop();
    }

    /// Digits typed so far
    pub fn pin_input(&self) -> &str {
        &self.pin_input
    }

    /// Check a whole PIN at once
    pub fn submit_pin(&mut self, pin: &str, now: Instant) -> AuthOutcome {
        if !self.expects_pin() {
            return AuthOutcome::Ignored;
        }
        self.pin_input.clear();
        let matched = matches!(&self.auth, Some(SecondaryAuth::Pin(expected)) if expected == pin);
        self.settle(matched, now)
    }

    /// Feed a pointer event to the pattern pad; the stroke is checked when it ends
    pub fn handle_pattern_pointer(&mut self, event: PointerEvent, now: Instant) -> AuthOutcome {
        if !self.expects_pattern() {
            return AuthOutcome::Ignored;
        }
        match dispatch(&mut self.pad, event) {
            Some(drawn) => self.submit_pattern(&drawn, now),
            None => AuthOutcome::Pending,
        }
    }

    /// Check a drawn pattern; too-short draws count as wrong
    pub fn submit_pattern(&mut self, drawn: &[u8], now: Instant) -> AuthOutcome {
        if !self.expects_pattern() {
            return AuthOutcome::Ignored;
        }
        let matched = pattern::is_valid_pattern(drawn)
            && matches!(&self.auth, Some(SecondaryAuth::Pattern(expected)) if expected == drawn);
        self.settle(matched, now)
    }

    /// Cells selected in the stroke being drawn
    pub fn pattern_selection(&self) -> &[u8] {
        self.pad.selected()
    }

    fn settle(&mut self, matched: bool, now: Instant) -> AuthOutcome {
        if matched {
            self.state = LockState::Unlocked;
            self.error_since = None;
            tracing::info!("Lock screen unlocked");
            AuthOutcome::Unlocked
        } else {
            self.error_since = Some(now);
            tracing::debug!("Wrong secondary auth input");
            AuthOutcome::Rejected
        }
    }

    /// Whether the wrong-input indicator is still showing at `now`
    pub fn error_visible(&self, now: Instant) -> bool {
        self.error_since
            .is_some_and(|since| now.saturating_duration_since(since) < self.error_display)
    }
}
