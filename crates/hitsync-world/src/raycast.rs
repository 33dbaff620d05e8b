//! Block raycasting using the DDA (Amanatides & Woo) algorithm.
//!
//! Used by hosts to compute the server's own idea of what an actor is aiming
//! at. Steps through the integer block grid with f64 parametric values and
//! reports the first block accepted by the caller's predicate.

use glam::{DVec3, IVec3};

use crate::geometry::{BlockPos, Direction};
use crate::trace::{BlockHit, RayTraceResult};

/// A ray in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    /// Start point (usually the actor's eye).
    pub origin: DVec3,
    /// Unit direction.
    pub direction: DVec3,
    /// Maximum distance in blocks.
    pub max_distance: f64,
}

impl Ray {
    /// Creates a ray; `direction` is normalized (zero stays zero).
    pub fn new(origin: DVec3, direction: DVec3, max_distance: f64) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            max_distance,
        }
    }

    /// Point at parametric distance `t`.
    pub fn point_at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }
}

/// Look vector for a yaw/pitch in degrees.
///
/// Yaw 0 faces south (+Z) and increases clockwise seen from above; pitch 90
/// looks straight down.
pub fn look_direction(yaw_degrees: f32, pitch_degrees: f32) -> DVec3 {
    let yaw = (yaw_degrees as f64).to_radians();
    let pitch = (pitch_degrees as f64).to_radians();
    DVec3::new(
        -yaw.sin() * pitch.cos(),
        -pitch.sin(),
        yaw.cos() * pitch.cos(),
    )
}

/// Walks the grid along `ray` and returns the first block (other than the
/// one containing the origin) for which `is_hit` returns `true`.
pub fn trace_blocks(ray: &Ray, mut is_hit: impl FnMut(BlockPos) -> bool) -> RayTraceResult {
    let dir = ray.direction;
    if dir == DVec3::ZERO || !ray.origin.is_finite() || !dir.is_finite() {
        return RayTraceResult::Miss;
    }

    let mut voxel = BlockPos::containing(ray.origin).as_ivec3();
    let step = IVec3::new(step_of(dir.x), step_of(dir.y), step_of(dir.z));

    // Distance in t-units to cross one full block on each axis.
    let t_delta = DVec3::new(
        safe_inv(dir.x.abs()),
        safe_inv(dir.y.abs()),
        safe_inv(dir.z.abs()),
    );

    let sub = ray.origin - ray.origin.floor();
    let mut t_max = DVec3::new(
        initial_t_max(sub.x, dir.x, t_delta.x),
        initial_t_max(sub.y, dir.y, t_delta.y),
        initial_t_max(sub.z, dir.z, t_delta.z),
    );

    loop {
        let t;
        let normal;
        if t_max.x < t_max.y && t_max.x < t_max.z {
            t = t_max.x;
            t_max.x += t_delta.x;
            voxel.x = voxel.x.saturating_add(step.x);
            normal = IVec3::new(-step.x, 0, 0);
        } else if t_max.y < t_max.z {
            t = t_max.y;
            t_max.y += t_delta.y;
            voxel.y = voxel.y.saturating_add(step.y);
            normal = IVec3::new(0, -step.y, 0);
        } else {
            t = t_max.z;
            t_max.z += t_delta.z;
            voxel.z = voxel.z.saturating_add(step.z);
            normal = IVec3::new(0, 0, -step.z);
        }

        if t > ray.max_distance {
            return RayTraceResult::Miss;
        }

        let pos = BlockPos::from(voxel);
        if is_hit(pos)
            && let Some(face) = Direction::from_normal(normal)
        {
            return BlockHit::new(pos, ray.point_at(t), face).into();
        }
    }
}

fn step_of(component: f64) -> i32 {
    if component >= 0.0 { 1 } else { -1 }
}

/// 1 / x, clamped to `f64::MAX` when x is ~0.
fn safe_inv(x: f64) -> f64 {
    if x.abs() < f64::EPSILON {
        f64::MAX
    } else {
        1.0 / x
    }
}

fn initial_t_max(sub: f64, dir_component: f64, t_delta: f64) -> f64 {
    if dir_component > 0.0 {
        (1.0 - sub) * t_delta
    } else if dir_component < 0.0 {
        sub * t_delta
    } else {
        f64::MAX
    }
}
