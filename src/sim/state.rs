//! Game entities and score state
//!
//! Everything the bubble field owns: shooter, bubbles, projectiles, score
//! and the events it reports to whoever renders the game.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Potion palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PotionColor {
    #[default]
    Pink,
    Green,
    Blue,
    Yellow,
}

impl PotionColor {
    /// Palette in index order
    pub const ALL: [PotionColor; 4] = [
        PotionColor::Pink,
        PotionColor::Green,
        PotionColor::Blue,
        PotionColor::Yellow,
    ];

    pub fn index(&self) -> usize {
        match self {
            PotionColor::Pink => 0,
            PotionColor::Green => 1,
            PotionColor::Blue => 2,
            PotionColor::Yellow => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PotionColor::Pink => "Pink",
            PotionColor::Green => "Green",
            PotionColor::Blue => "Blue",
            PotionColor::Yellow => "Yellow",
        }
    }

    /// Uniformly random palette entry
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

impl std::fmt::Display for PotionColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The launcher at the bottom of the playfield
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShooterState {
    pub color: PotionColor,
    /// Aim in degrees, 0 = straight up, clamped to [-90, 90]
    pub angle_degrees: f32,
}

impl Default for ShooterState {
    fn default() -> Self {
        Self {
            color: PotionColor::Pink,
            angle_degrees: 0.0,
        }
    }
}

impl ShooterState {
    pub fn position(&self) -> Vec2 {
        Vec2::new(SHOOTER_X, SHOOTER_Y)
    }

    /// Accumulate an aim delta, clamping to the allowed arc
    pub fn rotate(&mut self, delta_degrees: f32) {
        if !delta_degrees.is_finite() {
            return;
        }
        self.angle_degrees =
            (self.angle_degrees + delta_degrees).clamp(MIN_AIM_DEGREES, MAX_AIM_DEGREES);
    }

    /// Unit vector along the current aim (screen coordinates, y down)
    pub fn direction(&self) -> Vec2 {
        let rad = (self.angle_degrees - 90.0).to_radians();
        Vec2::new(rad.cos(), rad.sin())
    }

    /// Dots of the dotted aim guide, starting at the shooter
    pub fn aim_guide(&self) -> Vec<Vec2> {
        let origin = self.position();
        let dir = self.direction();
        let steps = (AIM_GUIDE_LENGTH / AIM_GUIDE_STEP).ceil() as usize;
        (0..steps)
            .map(|i| origin + dir * (i as f32 * AIM_GUIDE_STEP))
            .collect()
    }

    /// Arrow head at the end of the aim guide: tip, then the two barbs
    pub fn aim_arrow(&self) -> [Vec2; 3] {
        let tip = self.position() + self.direction() * AIM_GUIDE_LENGTH;
        let rad = (self.angle_degrees - 90.0).to_radians();
        let barb = |offset: f32| {
            let a = rad + offset;
            tip - Vec2::new(a.cos(), a.sin()) * 15.0
        };
        [
            tip,
            barb(-std::f32::consts::FRAC_PI_6),
            barb(std::f32::consts::FRAC_PI_6),
        ]
    }
}

/// A target potion on the field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bubble {
    pub id: u32,
    pub pos: Vec2,
    pub color: PotionColor,
    /// Inactive bubbles are gone from play but keep their slot until the
    /// next frame boundary
    pub active: bool,
}

/// A fired star in flight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub color: PotionColor,
    /// 0.5 - 1.5, scales the burst radius
    pub impact_strength: f32,
    /// Time in flight
    pub age_ms: u64,
}

impl Projectile {
    pub fn burst_radius(&self) -> f32 {
        self.impact_strength * BURST_RADIUS_PER_STRENGTH
    }
}

/// Score and terminal flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub score: u64,
    pub game_over: bool,
    pub game_won: bool,
}

impl GameState {
    /// No more shots or threat rows once the game is decided
    pub fn is_terminal(&self) -> bool {
        self.game_over || self.game_won
    }
}

/// Things that happened on the field since the last drain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldEvent {
    ColorChanged(PotionColor),
    Fired { projectile: u32, strength: f32 },
    /// Fire arrived after the game was decided
    FireIgnored,
    Burst { projectile: u32, bubbles: usize, points: u64 },
    /// Projectile hit a bubble of another color
    Miss { projectile: u32 },
    /// Projectile ran out of time without hitting anything
    Expired { projectile: u32 },
    RowAdded,
    GameWon,
    GameOver,
}
