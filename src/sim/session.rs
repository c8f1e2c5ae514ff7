//! One game session: gesture decoder feeding a bubble field
//!
//! Readings and frame ticks are handled in arrival order by whoever owns the
//! session; nothing here blocks or spawns.

use super::collision::find_contacts;
use super::field::{BubbleField, HitOutcome};
use super::gesture::{GestureConfig, GestureDecoder};
use super::state::FieldEvent;
use crate::sensor::SensorReading;

pub struct GameSession {
    decoder: GestureDecoder,
    field: BubbleField,
}

impl GameSession {
    pub fn new(seed: u64) -> Self {
        Self::with_parts(GestureDecoder::default(), BubbleField::new(seed))
    }

    pub fn with_parts(decoder: GestureDecoder, field: BubbleField) -> Self {
        Self { decoder, field }
    }

    pub fn with_config(seed: u64, config: GestureConfig) -> Self {
        Self::with_parts(GestureDecoder::new(config), BubbleField::new(seed))
    }

    pub fn field(&self) -> &BubbleField {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut BubbleField {
        &mut self.field
    }

    /// Decode a reading and apply its commands. Returns how many were applied.
    pub fn on_reading(&mut self, reading: &SensorReading) -> usize {
        let commands = self.decoder.on_reading(reading);
        let count = commands.len();
        for command in commands {
            self.field.apply(command);
        }
        count
    }

    /// Advance one frame and resolve contacts found after moving
    pub fn step(&mut self, dt_ms: u64) -> Vec<FieldEvent> {
        self.field.advance(dt_ms);

        let contacts = find_contacts(self.field.projectiles(), self.field.bubbles());
        for contact in contacts {
            if let HitOutcome::Burst { bubbles } =
                self.field.on_projectile_hit(contact.projectile, contact.bubble)
            {
                log::debug!("Projectile {} burst {} bubbles", contact.projectile, bubbles);
            }
        }

        self.field.drain_events()
    }

    pub fn is_over(&self) -> bool {
        self.field.state().is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::sim::state::PotionColor;
    use glam::Vec2;

    fn reading(flex: f64, touch: [f64; 6], at: u64) -> SensorReading {
        SensorReading {
            flex: [flex; 4],
            touch,
            accel: [0.0, 0.0, 9.8],
            captured_at: at,
        }
    }

    #[test]
    fn test_gesture_to_burst() {
        let mut field = BubbleField::empty(5);
        // Straight above the shooter
        let target = field.spawn_bubble(Vec2::new(SHOOTER_X, 200.0), PotionColor::Green);
        let mut session = GameSession::with_parts(GestureDecoder::default(), field);

        // Thumb + index selects green, full fist throws
        let touch = [10.0, 50.0, 50.0, 50.0, 10.0, 50.0];
        session.on_reading(&reading(3000.0, touch, 0));
        assert_eq!(session.field().shooter.color, PotionColor::Green);
        assert_eq!(session.field().projectiles().len(), 1);

        let mut events = Vec::new();
        for _ in 0..60 {
            events.extend(session.step(16));
            if session.is_over() {
                break;
            }
        }

        assert!(session.is_over());
        assert!(session.field().state().game_won);
        assert_eq!(session.field().score(), 2);
        assert!(events.iter().any(|e| matches!(e, FieldEvent::Burst { bubbles: 1, .. })));
        assert!(session.field().bubble(target).is_none_or(|b| !b.active));
    }

    #[test]
    fn test_mismatch_keeps_target() {
        let mut field = BubbleField::empty(5);
        let target = field.spawn_bubble(Vec2::new(SHOOTER_X, 200.0), PotionColor::Blue);
        let mut session = GameSession::with_parts(GestureDecoder::default(), field);

        session.on_reading(&reading(3000.0, [50.0; 6], 0));
        for _ in 0..60 {
            session.step(16);
        }

        assert!(session.field().projectiles().is_empty());
        assert!(session.field().bubble(target).unwrap().active);
        assert_eq!(session.field().score(), 0);
    }
}
