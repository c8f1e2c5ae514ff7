//! Glove gesture decoding
//!
//! Maps each noisy [`SensorReading`] to zero or more discrete [`Command`]s:
//!
//! * **Color**: with the thumb pad pressed, the first pressed finger pad in
//!   the order index, middle, ring, little picks the potion color.
//! * **Fire**: average flex above threshold throws, at most once per cooldown
//!   window. A held fist keeps firing once per window.
//! * **Aim**: lateral acceleration nudges the aim every reading.

use serde::{Deserialize, Serialize};

use super::state::PotionColor;
use crate::consts::*;
use crate::sensor::SensorReading;

/// Touch pad that gates color selection
const THUMB_PAD: usize = 4;

/// Finger pads in priority order and the color each selects
const FINGER_COLORS: [(usize, PotionColor); 4] = [
    (0, PotionColor::Green),  // index
    (1, PotionColor::Yellow), // middle
    (2, PotionColor::Pink),   // ring
    (3, PotionColor::Blue),   // little
];

/// Discrete gameplay command
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    SelectColor(PotionColor),
    /// Relative aim change in degrees
    SetAimAngle(f32),
    /// Throw with the given impact strength (0.5 - 1.5)
    Fire(f32),
}

/// Debounce for fire commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownGate {
    last_fire_at: Option<u64>,
    cooldown_ms: u64,
}

impl CooldownGate {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            last_fire_at: None,
            cooldown_ms,
        }
    }

    /// A clock that stepped back past the last fire counts as a reset and
    /// opens the gate.
    pub fn is_open(&self, now_ms: u64) -> bool {
        match self.last_fire_at {
            None => true,
            Some(last) if now_ms < last => true,
            Some(last) => now_ms - last >= self.cooldown_ms,
        }
    }

    /// Pass through the gate if open, closing it behind us
    pub fn try_pass(&mut self, now_ms: u64) -> bool {
        if self.is_open(now_ms) {
            self.last_fire_at = Some(now_ms);
            true
        } else {
            false
        }
    }

    pub fn last_fire_at(&self) -> Option<u64> {
        self.last_fire_at
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(FIRE_COOLDOWN_MS)
    }
}

/// Decoder thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureConfig {
    pub touch_threshold: f64,
    pub flex_threshold: f64,
    pub accel_sensitivity: f64,
    pub cooldown_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_threshold: TOUCH_THRESHOLD,
            flex_threshold: FLEX_THRESHOLD,
            accel_sensitivity: ACCEL_SENSITIVITY,
            cooldown_ms: FIRE_COOLDOWN_MS,
        }
    }
}

/// Stateful gesture decoder; owns the fire cooldown
#[derive(Debug, Clone, Default)]
pub struct GestureDecoder {
    config: GestureConfig,
    gate: CooldownGate,
}

impl GestureDecoder {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            gate: CooldownGate::new(config.cooldown_ms),
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    /// Decode one reading. Commands come out as color, fire, aim.
    ///
    /// The reading's capture time drives the cooldown, so replaying a
    /// recorded stream decodes identically.
    pub fn on_reading(&mut self, reading: &SensorReading) -> Vec<Command> {
        let mut commands = Vec::with_capacity(3);

        if let Some(color) = self.select_color(&reading.touch) {
            commands.push(Command::SelectColor(color));
        }

        let avg_flex = reading.avg_flex();
        if avg_flex > self.config.flex_threshold && self.gate.try_pass(reading.captured_at) {
            commands.push(Command::Fire(impact_strength(avg_flex)));
        }

        let delta = reading.accel[0] * self.config.accel_sensitivity;
        commands.push(Command::SetAimAngle(delta as f32));

        commands
    }

    fn select_color(&self, touch: &[f64; TOUCH_CHANNELS]) -> Option<PotionColor> {
        let pressed = |pad: usize| touch[pad] < self.config.touch_threshold;
        if !pressed(THUMB_PAD) {
            return None;
        }
        FINGER_COLORS
            .iter()
            .find(|(pad, _)| pressed(*pad))
            .map(|(_, color)| *color)
    }
}

/// Map average flex to impact strength
pub fn impact_strength(avg_flex: f64) -> f32 {
    ((avg_flex / FLEX_STRENGTH_DIVISOR) as f32).clamp(MIN_IMPACT_STRENGTH, MAX_IMPACT_STRENGTH)
}
