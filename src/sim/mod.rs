//! Deterministic game simulation
//!
//! All gameplay logic lives here:
//! - Gesture decoding (readings to commands)
//! - Bubble field rules (burst, escalation, win/loss)
//! - Explicit time only: callers pass elapsed milliseconds
//! - Seeded RNG only

pub mod collision;
pub mod field;
pub mod gesture;
pub mod session;
pub mod state;

pub use collision::{Contact, bounce_off_walls, circles_touch, find_contacts};
pub use field::{BubbleField, HitOutcome};
pub use gesture::{Command, CooldownGate, GestureConfig, GestureDecoder, impact_strength};
pub use session::GameSession;
pub use state::{Bubble, FieldEvent, GameState, PotionColor, Projectile, ShooterState};
