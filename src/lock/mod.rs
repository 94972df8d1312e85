//! Lock screen - configuration, gesture surfaces and the unlock state machine
//!
//! The configuration is not one stored document: each field lives under its
//! own flag key in the key-value store, as plain strings. [`LockConfig`]
//! reads and writes that flag vector as a unit.

pub mod controller;
pub mod pattern;
pub mod pointer;

pub use controller::{AuthOutcome, LockScreenController, LockStage, LockState};
pub use pattern::{PatternPad, PatternSetup, SetupOutcome, SetupStep};
pub use pointer::{Point, PointerEvent, PointerSurface, SlideTrack, SwipeUp};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::storage::KeyValueStore;
use crate::{Error, Result};

pub const KEY_ENABLED: &str = "lockScreenEnabled";
pub const KEY_GESTURE_DIRECTION: &str = "lockGestureDirection";
pub const KEY_PIN_ENABLED: &str = "lockPinEnabled";
pub const KEY_PIN: &str = "lockPin";
pub const KEY_PATTERN_ENABLED: &str = "lockPatternEnabled";
pub const KEY_PATTERN: &str = "lockPattern";
pub const KEY_PASSWORD_TYPE: &str = "lockPasswordType";

/// Every flag key that makes up a [`LockConfig`]
pub const LOCK_FLAG_KEYS: &[&str] = &[
    KEY_ENABLED,
    KEY_GESTURE_DIRECTION,
    KEY_PIN_ENABLED,
    KEY_PIN,
    KEY_PATTERN_ENABLED,
    KEY_PATTERN,
    KEY_PASSWORD_TYPE,
];

/// Number of digits in a PIN
pub const PIN_LENGTH: usize = 4;

pub fn is_valid_pin(pin: &str) -> bool {
    pin.len() == PIN_LENGTH && pin.chars().all(|c| c.is_ascii_digit())
}

/// Which gesture dismisses the lock screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureDirection {
    /// Slide the handle along a horizontal track
    #[default]
    Horizontal,
    /// Swipe up
    Vertical,
}

impl GestureDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureDirection::Horizontal => "horizontal",
            GestureDirection::Vertical => "vertical",
        }
    }
}

impl std::str::FromStr for GestureDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "horizontal" => Ok(GestureDirection::Horizontal),
            "vertical" => Ok(GestureDirection::Vertical),
            _ => Err(Error::Validation(format!("Unknown gesture direction: {}", s))),
        }
    }
}

/// Discriminator selecting the active secondary-auth method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordType {
    Pin,
    Pattern,
}

impl PasswordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PasswordType::Pin => "pin",
            PasswordType::Pattern => "pattern",
        }
    }
}

impl std::str::FromStr for PasswordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pin" | "password" => Ok(PasswordType::Pin),
            "pattern" | "gesture" => Ok(PasswordType::Pattern),
            _ => Err(Error::Validation(format!("Unknown password type: {}", s))),
        }
    }
}

/// The secret checked after the unlock gesture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecondaryAuth {
    Pin(String),
    Pattern(Vec<u8>),
}

/// Lock screen settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockConfig {
    pub enabled: bool,
    pub gesture_direction: GestureDirection,
    pub pin_enabled: bool,
    pub pin: Option<String>,
    pub pattern_enabled: bool,
    pub pattern: Option<Vec<u8>>,
    pub password_type: Option<PasswordType>,
}

impl LockConfig {
    /// Make `pin` the active secondary auth. Disables the pattern.
    pub fn set_pin(&mut self, pin: &str) -> Result<()> {
        if !is_valid_pin(pin) {
            return Err(Error::Validation(format!("PIN must be {} digits", PIN_LENGTH)));
        }
        self.pin = Some(pin.to_string());
        self.pin_enabled = true;
        self.pattern_enabled = false;
        self.password_type = Some(PasswordType::Pin);
        Ok(())
    }

    /// Make `pattern` the active secondary auth. Disables the PIN.
    pub fn set_pattern(&mut self, pattern: &[u8]) -> Result<()> {
        if !pattern::is_valid_pattern(pattern) {
            return Err(Error::Validation(format!(
                "pattern needs at least {} distinct points",
                pattern::MIN_PATTERN_POINTS
            )));
        }
        self.pattern = Some(pattern.to_vec());
        self.pattern_enabled = true;
        self.pin_enabled = false;
        self.password_type = Some(PasswordType::Pattern);
        Ok(())
    }

    /// Back to slide-only unlock; stored secrets are dropped.
    pub fn clear_secondary(&mut self) {
        self.pin = None;
        self.pin_enabled = false;
        self.pattern = None;
        self.pattern_enabled = false;
        self.password_type = None;
    }

    /// The secret to check after the gesture, if any.
    ///
    /// `passwordType` picks the method. A selected method that is disabled
    /// or has no valid secret collapses to slide-only. Without a
    /// discriminator (older data), an enabled PIN wins over a pattern.
    pub fn secondary_auth(&self) -> Option<SecondaryAuth> {
        if !self.enabled {
            return None;
        }

        let pin = || {
            self.pin
                .as_deref()
                .filter(|pin| self.pin_enabled && is_valid_pin(pin))
                .map(|pin| SecondaryAuth::Pin(pin.to_string()))
        };
        let pattern = || {
            self.pattern
                .as_deref()
                .filter(|p| self.pattern_enabled && pattern::is_valid_pattern(p))
                .map(|p| SecondaryAuth::Pattern(p.to_vec()))
        };

        match self.password_type {
            Some(PasswordType::Pin) => pin(),
            Some(PasswordType::Pattern) => pattern(),
            None => pin().or_else(pattern),
        }
    }

    /// Flag-key representation; absent secrets have no entry
    pub fn to_flags(&self) -> Vec<(&'static str, String)> {
        let mut flags = vec![
            (KEY_ENABLED, self.enabled.to_string()),
            (KEY_GESTURE_DIRECTION, self.gesture_direction.as_str().to_string()),
            (KEY_PIN_ENABLED, self.pin_enabled.to_string()),
            (KEY_PATTERN_ENABLED, self.pattern_enabled.to_string()),
        ];
        if let Some(pin) = &self.pin {
            flags.push((KEY_PIN, pin.clone()));
        }
        if let Some(p) = &self.pattern {
            flags.push((KEY_PATTERN, pattern::encode_pattern(p)));
        }
        if let Some(kind) = self.password_type {
            flags.push((KEY_PASSWORD_TYPE, kind.as_str().to_string()));
        }
        flags
    }

    /// Build from flag values. Malformed values are treated as absent.
    pub fn from_flags<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| match lookup(key).as_deref() {
            Some("true") => true,
            Some("false") | None => false,
            Some(other) => {
                tracing::warn!("Ignoring malformed lock flag {}={}", key, other);
                false
            }
        };

        let parsed = |key: &str| -> Option<String> { lookup(key).filter(|v| !v.is_empty()) };

        let gesture_direction = parsed(KEY_GESTURE_DIRECTION)
            .and_then(|v| v.parse::<GestureDirection>().map_err(|e| tracing::warn!("{}", e)).ok())
            .unwrap_or_default();

        let pin = parsed(KEY_PIN).filter(|pin| {
            let ok = is_valid_pin(pin);
            if !ok {
                tracing::warn!("Ignoring malformed stored PIN");
            }
            ok
        });

        let pattern = parsed(KEY_PATTERN).and_then(|v| {
            let decoded = pattern::decode_pattern(&v);
            if decoded.is_none() {
                tracing::warn!("Ignoring malformed stored pattern {:?}", v);
            }
            decoded
        });

        let password_type = parsed(KEY_PASSWORD_TYPE)
            .and_then(|v| v.parse::<PasswordType>().map_err(|e| tracing::warn!("{}", e)).ok());

        Self {
            enabled: flag(KEY_ENABLED),
            gesture_direction,
            pin_enabled: flag(KEY_PIN_ENABLED),
            pin,
            pattern_enabled: flag(KEY_PATTERN_ENABLED),
            pattern,
            password_type,
        }
    }

    /// Read the flag vector from the store. Missing flags mean "off".
    pub async fn load(kv: &KeyValueStore) -> Result<Self> {
        let mut values = std::collections::HashMap::new();
        for key in LOCK_FLAG_KEYS {
            if let Some(value) = kv.get(key).await? {
                if let Some(flag) = flag_string(&value) {
                    values.insert(*key, flag);
                }
            }
        }
        Ok(Self::from_flags(|key| values.get(key).cloned()))
    }

    /// Write the flag vector in one transaction; flags for absent secrets are removed.
    pub async fn save(&self, kv: &KeyValueStore) -> Result<()> {
        let flags = self.to_flags();
        let changes = LOCK_FLAG_KEYS
            .iter()
            .map(|key| {
                let value = flags
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, value)| Value::String(value.clone()));
                (key.to_string(), value)
            })
            .collect();
        kv.apply(changes).await?;
        tracing::info!("Saved lock screen settings (enabled: {})", self.enabled);
        Ok(())
    }
}

/// Flag value as a string; flags migrated from older data may be JSON
/// booleans or numbers instead of strings.
pub fn flag_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Gesture thresholds and timings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockOptions {
    /// Width of the slide track in pixels
    pub slide_track_width: f32,
    /// Fraction of the track the handle must pass
    pub slide_threshold: f32,
    /// Upward travel in pixels that completes a swipe
    pub swipe_distance: f32,
    /// Distance between pattern cell centres in pixels
    pub pattern_spacing: f32,
    pub pattern_hit_radius: f32,
    /// How long the wrong-input indicator stays up
    pub error_display_ms: u64,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            slide_track_width: 240.0,
            slide_threshold: 0.9,
            swipe_distance: 100.0,
            pattern_spacing: 80.0,
            pattern_hit_radius: 30.0,
            error_display_ms: 2000,
        }
    }
}
