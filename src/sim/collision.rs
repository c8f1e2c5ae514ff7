//! Contact detection between stars and potions
//!
//! The game treats "projectile touched bubble" as an event supplied by the
//! physics layer. This is the circle-overlap stand-in used by the headless
//! session and by tests; a renderer with its own physics can skip it and call
//! [`BubbleField::on_projectile_hit`](super::BubbleField::on_projectile_hit)
//! directly.

use glam::Vec2;

use super::state::{Bubble, Projectile};
use crate::consts::*;

/// A projectile overlapping a bubble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub projectile: u32,
    pub bubble: u32,
}

/// Whether two circles overlap (touching counts)
#[inline]
pub fn circles_touch(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    a.distance_squared(b) <= (ra + rb) * (ra + rb)
}

/// For every projectile, the nearest active bubble it overlaps (if any).
///
/// At most one contact per projectile, in projectile order.
pub fn find_contacts(projectiles: &[Projectile], bubbles: &[Bubble]) -> Vec<Contact> {
    projectiles
        .iter()
        .filter_map(|p| {
            bubbles
                .iter()
                .filter(|b| b.active && circles_touch(p.pos, PROJECTILE_RADIUS, b.pos, BUBBLE_RADIUS))
                .min_by(|a, b| {
                    a.pos
                        .distance_squared(p.pos)
                        .partial_cmp(&b.pos.distance_squared(p.pos))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|b| Contact {
                    projectile: p.id,
                    bubble: b.id,
                })
        })
        .collect()
}

/// Keep a circle inside the world rectangle, reflecting its velocity off
/// any wall it crossed (perfectly elastic)
pub fn bounce_off_walls(pos: &mut Vec2, vel: &mut Vec2, radius: f32) {
    let (min_x, max_x) = (radius, WORLD_WIDTH - radius);
    let (min_y, max_y) = (radius, WORLD_HEIGHT - radius);

    if pos.x < min_x {
        pos.x = min_x + (min_x - pos.x);
        vel.x = vel.x.abs();
    } else if pos.x > max_x {
        pos.x = max_x - (pos.x - max_x);
        vel.x = -vel.x.abs();
    }

    if pos.y < min_y {
        pos.y = min_y + (min_y - pos.y);
        vel.y = vel.y.abs();
    } else if pos.y > max_y {
        pos.y = max_y - (pos.y - max_y);
        vel.y = -vel.y.abs();
    }
}
