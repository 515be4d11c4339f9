//! Ray queries against bodies
//!
//! The spatial index supplies candidates along the ray; each candidate's
//! shapes are then tested exactly and the nearest hit wins.

use std::collections::HashMap;

use glam::{Quat, Vec3};

use super::body::{BodyId, RigidBody};
use super::layers;
use super::shape::WorldShape;
use super::spatial_hash::SpatialIndex;
use crate::error::{PhysicsError, PhysicsResult};
use crate::{axis_vector, dominant_axis, vec3_is_finite};

/// Filters for a world raycast
#[derive(Debug, Clone, PartialEq)]
pub struct RaycastOptions {
    /// Only bodies whose layer bit is in this mask are hit
    pub mask: u32,
    /// Bodies the ray passes through
    pub ignore: Vec<BodyId>,
}

impl Default for RaycastOptions {
    fn default() -> Self {
        Self {
            mask: layers::ALL,
            ignore: Vec::new(),
        }
    }
}

impl RaycastOptions {
    pub fn with_mask(mask: u32) -> Self {
        Self {
            mask,
            ..Self::default()
        }
    }

    pub fn ignoring(mut self, id: BodyId) -> Self {
        self.ignore.push(id);
        self
    }
}

/// Closest hit of a world raycast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub body: BodyId,
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

/// Smallest non-negative root within `max_distance`, with its outward normal
pub fn ray_sphere(
    origin: Vec3,
    dir: Vec3,
    center: Vec3,
    radius: f32,
    max_distance: f32,
) -> Option<(f32, Vec3)> {
    let oc = origin - center;
    let b = oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    // near root first, far root when starting inside
    [-b - sqrt_d, -b + sqrt_d]
        .into_iter()
        .find(|&t| t >= 0.0 && t <= max_distance)
        .map(|t| (t, (origin + dir * t - center) / radius))
}

/// Slab test in box-local space. The normal is the face on the dominant axis
/// of the local hit point, scaled by the half extents.
pub fn ray_obb(
    origin: Vec3,
    dir: Vec3,
    center: Vec3,
    half_extents: Vec3,
    rotation: Quat,
    max_distance: f32,
) -> Option<(f32, Vec3)> {
    let inv = rotation.inverse();
    let o = inv * (origin - center);
    let d = inv * dir;

    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;
    for axis in 0..3 {
        if d[axis].abs() < 1e-8 {
            if o[axis] < -half_extents[axis] || o[axis] > half_extents[axis] {
                return None;
            }
            continue;
        }
        let inv_d = 1.0 / d[axis];
        let mut t0 = (-half_extents[axis] - o[axis]) * inv_d;
        let mut t1 = (half_extents[axis] - o[axis]) * inv_d;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }
    if t_max < 0.0 || t_min > max_distance {
        return None;
    }
    let t = if t_min >= 0.0 { t_min } else { t_max };
    if t > max_distance {
        return None;
    }

    let local_hit = o + d * t;
    let axis = dominant_axis(local_hit / half_extents);
    let sign = if local_hit[axis] >= 0.0 { 1.0 } else { -1.0 };
    Some((t, rotation * (axis_vector(axis) * sign)))
}

/// Exact test against one placed primitive (capsules use their proxy)
pub fn ray_shape(origin: Vec3, dir: Vec3, shape: &WorldShape, max_distance: f32) -> Option<(f32, Vec3)> {
    match shape.narrow_proxy() {
        WorldShape::Sphere { center, radius } => ray_sphere(origin, dir, center, radius, max_distance),
        WorldShape::Box {
            center,
            half_extents,
            rotation,
        } => ray_obb(origin, dir, center, half_extents, rotation, max_distance),
        WorldShape::Capsule { .. } => None,
    }
}

/// Nearest hit on one body's collider
pub fn ray_body(origin: Vec3, dir: Vec3, body: &RigidBody, max_distance: f32) -> Option<RaycastHit> {
    let pose = body.pose();
    let mut best: Option<RaycastHit> = None;
    for shape in body.collider.world_shapes(&pose) {
        let limit = best.map_or(max_distance, |b| b.distance);
        if let Some((t, normal)) = ray_shape(origin, dir, &shape, limit) {
            if best.is_none_or(|b| t < b.distance) {
                best = Some(RaycastHit {
                    body: body.id,
                    point: origin + dir * t,
                    normal,
                    distance: t,
                });
            }
        }
    }
    best
}

/// Closest body hit along a ray through the spatial index
pub fn raycast(
    index: &SpatialIndex,
    bodies: &[RigidBody],
    slots: &HashMap<BodyId, usize>,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    options: &RaycastOptions,
) -> PhysicsResult<Option<RaycastHit>> {
    if !vec3_is_finite(origin) {
        return Err(PhysicsError::NonFinite("ray origin"));
    }
    if !vec3_is_finite(direction) || !max_distance.is_finite() {
        return Err(PhysicsError::NonFinite("ray direction"));
    }
    let Some(dir) = direction.try_normalize() else {
        return Err(PhysicsError::ZeroLengthVector("ray direction"));
    };

    let mut best: Option<RaycastHit> = None;
    for id in index.raycast_candidates(origin, dir, max_distance) {
        if options.ignore.contains(&id) {
            continue;
        }
        let Some(&slot) = slots.get(&id) else {
            continue;
        };
        let body = &bodies[slot];
        if body.layer & options.mask == 0 {
            continue;
        }
        let limit = best.map_or(max_distance, |b| b.distance);
        if let Some(hit) = ray_body(origin, dir, body, limit) {
            // ties go to the lower id
            let closer = |b: RaycastHit| {
                hit.distance < b.distance || (hit.distance == b.distance && hit.body < b.body)
            };
            if best.is_none_or(closer) {
                best = Some(hit);
            }
        }
    }
    Ok(best)
}
