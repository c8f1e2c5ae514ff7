//! Potion Blast - glove-controlled bubble matching
//!
//! Core modules:
//! - `sensor`: Raw telemetry lines to validated readings
//! - `bridge`: Ingestion process (reading broadcaster + WebSocket server)
//! - `link`: Reconnecting reading subscription for the game side
//! - `sim`: Gesture decoding and the bubble field game engine
//! - `settings`: Process settings loaded from JSON

pub mod bridge;
pub mod cli;
pub mod link;
pub mod sensor;
pub mod settings;
pub mod sim;

pub use sensor::{FrameError, SensorReading};
pub use settings::Settings;

use std::time::{SystemTime, UNIX_EPOCH};

/// Game configuration constants
pub mod consts {
    /// Marker prefix for firmware log lines on the sensor link
    pub const DEBUG_MARKER: &str = "[DEBUG]";
    /// Channels per raw frame (4 flex + 6 touch + 3 accel)
    pub const FRAME_FIELDS: usize = 13;
    pub const FLEX_CHANNELS: usize = 4;
    pub const TOUCH_CHANNELS: usize = 6;
    pub const ACCEL_CHANNELS: usize = 3;

    /// Delay before the game side retries a lost bridge connection
    pub const RECONNECT_DELAY_MS: u64 = 2000;

    /// Touch pad reading below which a finger counts as pressed (lower = firmer)
    pub const TOUCH_THRESHOLD: f64 = 30.0;
    /// Average flex above which the hand counts as a throw
    pub const FLEX_THRESHOLD: f64 = 2000.0;
    /// Degrees of aim change per unit of lateral acceleration
    pub const ACCEL_SENSITIVITY: f64 = 0.5;
    /// Minimum time between two shots
    pub const FIRE_COOLDOWN_MS: u64 = 800;
    /// Average flex that maps to an impact strength of 1.0
    pub const FLEX_STRENGTH_DIVISOR: f64 = 3000.0;
    pub const MIN_IMPACT_STRENGTH: f32 = 0.5;
    pub const MAX_IMPACT_STRENGTH: f32 = 1.5;

    /// Playfield (physics world) dimensions
    pub const WORLD_WIDTH: f32 = 600.0;
    pub const WORLD_HEIGHT: f32 = 600.0;

    /// Bubble lattice
    pub const GRID_ROWS: usize = 7;
    pub const GRID_COLS: usize = 15;
    pub const BUBBLE_SIZE: f32 = 35.0;
    pub const BUBBLE_SPACING: f32 = BUBBLE_SIZE * 1.1;
    /// Vertical distance of one escalation step
    pub const ROW_HEIGHT: f32 = BUBBLE_SPACING;
    /// Centre y of the top row
    pub const GRID_TOP: f32 = 70.0;
    /// Collision radius of a bubble sprite (scaled 0.6)
    pub const BUBBLE_RADIUS: f32 = BUBBLE_SIZE * 0.6 / 2.0;

    /// A bubble reaching this y ends the game
    pub const LOSS_LINE_Y: f32 = 500.0;
    /// Interval between threat rows
    pub const ESCALATION_INTERVAL_MS: u64 = 15_000;

    /// Burst radius per unit of impact strength (dimensionless balance constant)
    pub const BURST_RADIUS_PER_STRENGTH: f32 = 100.0;
    /// Points per burst bubble
    pub const POINTS_PER_BUBBLE: u64 = 2;

    /// Shooter
    pub const SHOOTER_X: f32 = 300.0;
    pub const SHOOTER_Y: f32 = 550.0;
    pub const MIN_AIM_DEGREES: f32 = -90.0;
    pub const MAX_AIM_DEGREES: f32 = 90.0;

    /// Projectile
    pub const PROJECTILE_SPEED: f32 = 600.0;
    pub const PROJECTILE_TTL_MS: u64 = 3000;
    pub const PROJECTILE_RADIUS: f32 = BUBBLE_RADIUS;

    /// Aim guide
    pub const AIM_GUIDE_LENGTH: f32 = 200.0;
    pub const AIM_GUIDE_STEP: f32 = 12.0;
}

/// Wall-clock milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
