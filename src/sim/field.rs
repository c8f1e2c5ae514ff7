//! The bubble field: match, burst and escalation rules
//!
//! Owns the shooter, every bubble and projectile, the score and the threat
//! timer. All mutation of game state goes through here. Time only moves when
//! [`BubbleField::advance`] is called, so a seeded field replays identically.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::collision::bounce_off_walls;
use super::gesture::Command;
use super::state::{Bubble, FieldEvent, GameState, PotionColor, Projectile, ShooterState};
use crate::consts::*;

/// What a reported projectile/bubble contact did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Same color: this many bubbles burst
    Burst { bubbles: usize },
    /// Different color: projectile removed, nothing else
    Mismatch,
    /// Game already decided: projectile removed, nothing else
    Inert,
    /// Unknown projectile, or bubble not in play; nothing changed
    Ignored,
}

/// Complete game field
#[derive(Debug, Clone)]
pub struct BubbleField {
    pub shooter: ShooterState,
    state: GameState,
    bubbles: Vec<Bubble>,
    projectiles: Vec<Projectile>,
    /// Time accumulated toward the next threat row
    escalation_ms: u64,
    rng: Pcg32,
    events: Vec<FieldEvent>,
    next_id: u32,
}

impl BubbleField {
    /// A fresh game: full lattice of random potions
    pub fn new(seed: u64) -> Self {
        let mut field = Self::empty(seed);
        for row in 0..GRID_ROWS {
            let y = GRID_TOP + row as f32 * ROW_HEIGHT;
            field.spawn_row(y);
        }
        log::debug!(
            "Field seeded ({}) with {} bubbles",
            seed,
            field.bubbles.len()
        );
        field
    }

    /// A field with no bubbles, for custom layouts
    pub fn empty(seed: u64) -> Self {
        Self {
            shooter: ShooterState::default(),
            state: GameState::default(),
            bubbles: Vec::new(),
            projectiles: Vec::new(),
            escalation_ms: 0,
            rng: Pcg32::seed_from_u64(seed),
            events: Vec::new(),
            next_id: 1,
        }
    }

    fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Place a single bubble
    pub fn spawn_bubble(&mut self, pos: Vec2, color: PotionColor) -> u32 {
        let id = self.next_entity_id();
        self.bubbles.push(Bubble {
            id,
            pos,
            color,
            active: true,
        });
        id
    }

    /// Lattice x of a column centre
    pub fn column_x(col: usize) -> f32 {
        col as f32 * BUBBLE_SPACING + BUBBLE_SIZE / 2.0
    }

    fn spawn_row(&mut self, y: f32) {
        for col in 0..GRID_COLS {
            let color = PotionColor::random(&mut self.rng);
            self.spawn_bubble(Vec2::new(Self::column_x(col), y), color);
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn score(&self) -> u64 {
        self.state.score
    }

    /// Every bubble still held, including ones deactivated this frame
    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn bubble(&self, id: u32) -> Option<&Bubble> {
        self.bubbles.iter().find(|b| b.id == id)
    }

    pub fn active_bubbles(&self) -> impl Iterator<Item = &Bubble> {
        self.bubbles.iter().filter(|b| b.active)
    }

    pub fn active_count(&self) -> usize {
        self.active_bubbles().count()
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Milliseconds until the next threat row
    pub fn time_to_next_row(&self) -> u64 {
        ESCALATION_INTERVAL_MS.saturating_sub(self.escalation_ms)
    }

    /// Take the events recorded since the last call
    pub fn drain_events(&mut self) -> Vec<FieldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Apply a decoded gesture command
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::SelectColor(color) => self.select_color(color),
            Command::SetAimAngle(delta) => self.shooter.rotate(delta),
            Command::Fire(strength) => {
                self.fire(strength);
            }
        }
    }

    pub fn select_color(&mut self, color: PotionColor) {
        if self.shooter.color != color {
            self.shooter.color = color;
            self.events.push(FieldEvent::ColorChanged(color));
        }
    }

    /// Launch a star along the current aim. No-op once the game is decided.
    pub fn fire(&mut self, impact_strength: f32) -> Option<u32> {
        if self.state.is_terminal() {
            log::debug!("Fire ignored, game already decided");
            self.events.push(FieldEvent::FireIgnored);
            return None;
        }

        let strength = if impact_strength.is_finite() {
            impact_strength.clamp(MIN_IMPACT_STRENGTH, MAX_IMPACT_STRENGTH)
        } else {
            MIN_IMPACT_STRENGTH
        };
        let id = self.next_entity_id();
        self.projectiles.push(Projectile {
            id,
            pos: self.shooter.position(),
            vel: self.shooter.direction() * PROJECTILE_SPEED,
            color: self.shooter.color,
            impact_strength: strength,
            age_ms: 0,
        });
        self.events.push(FieldEvent::Fired {
            projectile: id,
            strength,
        });
        Some(id)
    }

    /// Resolve a contact reported by the physics layer.
    ///
    /// The projectile is always consumed. On a color match every active bubble
    /// of that color within the burst radius of the hit bubble is deactivated
    /// in one step (radius test around the impact, not a flood fill).
    pub fn on_projectile_hit(&mut self, projectile_id: u32, bubble_id: u32) -> HitOutcome {
        let Some(p_idx) = self.projectiles.iter().position(|p| p.id == projectile_id) else {
            return HitOutcome::Ignored;
        };
        let Some(hit) = self.bubble(bubble_id).filter(|b| b.active).copied() else {
            return HitOutcome::Ignored;
        };

        let projectile = self.projectiles.remove(p_idx);

        if self.state.is_terminal() {
            return HitOutcome::Inert;
        }

        if projectile.color != hit.color {
            self.events.push(FieldEvent::Miss {
                projectile: projectile.id,
            });
            return HitOutcome::Mismatch;
        }

        let radius = projectile.burst_radius();
        let mut burst = 0;
        for bubble in self.bubbles.iter_mut() {
            if bubble.active && bubble.color == hit.color && bubble.pos.distance(hit.pos) <= radius {
                bubble.active = false;
                burst += 1;
            }
        }

        let points = burst as u64 * POINTS_PER_BUBBLE;
        self.state.score += points;
        self.events.push(FieldEvent::Burst {
            projectile: projectile.id,
            bubbles: burst,
            points,
        });
        log::debug!(
            "{} burst of {} (radius {:.0}), score {}",
            hit.color,
            burst,
            radius,
            self.state.score
        );

        if self.active_count() == 0 {
            self.state.game_won = true;
            self.events.push(FieldEvent::GameWon);
            log::info!("Field cleared, game won with score {}", self.state.score);
        }

        HitOutcome::Burst { bubbles: burst }
    }

    /// Advance time by `dt_ms`: fly projectiles, expire stale ones and run the
    /// threat timer. Bubbles deactivated during the previous frame are
    /// released here.
    pub fn advance(&mut self, dt_ms: u64) {
        self.bubbles.retain(|b| b.active);

        let dt = dt_ms as f32 / 1000.0;
        for projectile in self.projectiles.iter_mut() {
            projectile.pos += projectile.vel * dt;
            bounce_off_walls(&mut projectile.pos, &mut projectile.vel, PROJECTILE_RADIUS);
            projectile.age_ms += dt_ms;
        }

        let events = &mut self.events;
        self.projectiles.retain(|p| {
            let alive = p.age_ms < PROJECTILE_TTL_MS;
            if !alive {
                events.push(FieldEvent::Expired { projectile: p.id });
            }
            alive
        });

        if self.state.is_terminal() {
            return;
        }
        self.escalation_ms += dt_ms;
        while self.escalation_ms >= ESCALATION_INTERVAL_MS && !self.state.is_terminal() {
            self.escalation_ms -= ESCALATION_INTERVAL_MS;
            self.escalate();
        }
    }

    /// Push every active bubble down one row, then add a fresh row on top.
    ///
    /// A bubble reaching the loss line is taken out of play and ends the game;
    /// no row is added in that case.
    pub fn escalate(&mut self) {
        if self.state.is_terminal() {
            return;
        }

        let mut crossed = 0;
        for bubble in self.bubbles.iter_mut().filter(|b| b.active) {
            bubble.pos.y += ROW_HEIGHT;
            if bubble.pos.y >= LOSS_LINE_Y {
                bubble.active = false;
                crossed += 1;
            }
        }

        if crossed > 0 {
            self.state.game_over = true;
            self.events.push(FieldEvent::GameOver);
            log::info!(
                "{} bubble(s) crossed the line, game over with score {}",
                crossed,
                self.state.score
            );
            return;
        }

        self.spawn_row(GRID_TOP);
        self.events.push(FieldEvent::RowAdded);
        log::debug!("Threat row added ({} active)", self.active_count());
    }
}
