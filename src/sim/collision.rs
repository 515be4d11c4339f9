//! Narrow phase: shape-pair contact tests
//!
//! Shapes are dispatched in a canonical order (sphere < box). A pair given
//! the other way round is solved swapped and its normal flipped in
//! `collide_shapes`, the only place that happens. Capsules reach this module
//! as their sphere proxy.
//!
//! Every result's normal points from the first shape (A) toward the second
//! (B).

use glam::{Quat, Vec3};

use super::body::RigidBody;
use super::math::{Aabb, Pose};
use super::shape::{Collider, WorldShape};
use crate::consts::EPSILON;
use crate::{axis_vector, normalize_or};

/// Contact geometry from one shape pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    /// World-space contact point
    pub point: Vec3,
    /// Unit normal from A toward B
    pub normal: Vec3,
    /// Overlap depth (> 0)
    pub penetration: f32,
}

impl CollisionResult {
    /// Same contact seen from the other body
    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }
}

/// Sphere vs sphere
pub fn sphere_sphere(ca: Vec3, ra: f32, cb: Vec3, rb: f32) -> Option<CollisionResult> {
    let delta = cb - ca;
    let dist_sq = delta.length_squared();
    let radii = ra + rb;
    if dist_sq >= radii * radii {
        return None;
    }
    let dist = dist_sq.sqrt();
    // coincident centers: push apart along +Y
    let normal = if dist > EPSILON { delta / dist } else { Vec3::Y };
    let penetration = radii - dist;
    Some(CollisionResult {
        point: ca + normal * (ra - penetration * 0.5),
        normal,
        penetration,
    })
}

/// Sphere (A) vs oriented box (B)
pub fn sphere_box(
    center: Vec3,
    radius: f32,
    box_center: Vec3,
    half_extents: Vec3,
    rotation: Quat,
) -> Option<CollisionResult> {
    let local = rotation.inverse() * (center - box_center);
    let clamped = local.clamp(-half_extents, half_extents);
    let delta = local - clamped;
    let dist_sq = delta.length_squared();

    if dist_sq > EPSILON * EPSILON {
        if dist_sq >= radius * radius {
            return None;
        }
        let dist = dist_sq.sqrt();
        // box -> sphere, negated below so the normal runs sphere -> box
        let outward = rotation * (delta / dist);
        return Some(CollisionResult {
            point: box_center + rotation * clamped,
            normal: -outward,
            penetration: radius - dist,
        });
    }

    // center inside the box: leave through the nearest face
    let margins = half_extents - local.abs();
    let axis = if margins.x <= margins.y && margins.x <= margins.z {
        0
    } else if margins.y <= margins.z {
        1
    } else {
        2
    };
    let sign = if local[axis] >= 0.0 { 1.0 } else { -1.0 };
    let mut surface = local;
    surface[axis] = sign * half_extents[axis];
    let outward = rotation * (axis_vector(axis) * sign);
    Some(CollisionResult {
        point: box_center + rotation * surface,
        normal: -outward,
        penetration: radius + margins[axis],
    })
}

/// Box vs box, approximated by the world-axis bounds of both boxes.
/// The contact lies on the axis of least overlap.
pub fn box_box(a: &Aabb, b: &Aabb) -> Option<CollisionResult> {
    let overlap = a.max.min(b.max) - a.min.max(b.min);
    if overlap.min_element() <= 0.0 {
        return None;
    }
    let axis = if overlap.x <= overlap.y && overlap.x <= overlap.z {
        0
    } else if overlap.y <= overlap.z {
        1
    } else {
        2
    };
    let offset = b.center() - a.center();
    let sign = if offset[axis] >= 0.0 { 1.0 } else { -1.0 };
    let region_min = a.min.max(b.min);
    let region_max = a.max.min(b.max);
    Some(CollisionResult {
        point: (region_min + region_max) * 0.5,
        normal: axis_vector(axis) * sign,
        penetration: overlap[axis],
    })
}

/// Dispatch one world-space shape pair
pub fn collide_shapes(a: &WorldShape, b: &WorldShape) -> Option<CollisionResult> {
    let a = a.narrow_proxy();
    let b = b.narrow_proxy();
    if a.order() > b.order() {
        collide_ordered(&b, &a).map(CollisionResult::flipped)
    } else {
        collide_ordered(&a, &b)
    }
}

fn collide_ordered(a: &WorldShape, b: &WorldShape) -> Option<CollisionResult> {
    match (*a, *b) {
        (
            WorldShape::Sphere { center: ca, radius: ra },
            WorldShape::Sphere { center: cb, radius: rb },
        ) => sphere_sphere(ca, ra, cb, rb),
        (
            WorldShape::Sphere { center, radius },
            WorldShape::Box {
                center: box_center,
                half_extents,
                rotation,
            },
        ) => sphere_box(center, radius, box_center, half_extents, rotation),
        (WorldShape::Box { .. }, WorldShape::Box { .. }) => box_box(&a.aabb(), &b.aabb()),
        _ => None,
    }
}

/// Deepest contact across both colliders' shape lists
pub fn collide_colliders(
    collider_a: &Collider,
    pose_a: &Pose,
    collider_b: &Collider,
    pose_b: &Pose,
) -> Option<CollisionResult> {
    let mut deepest: Option<CollisionResult> = None;
    for shape_a in collider_a.world_shapes(pose_a) {
        for shape_b in collider_b.world_shapes(pose_b) {
            if let Some(hit) = collide_shapes(&shape_a, &shape_b) {
                if deepest.is_none_or(|d| hit.penetration > d.penetration) {
                    deepest = Some(hit);
                }
            }
        }
    }
    deepest.map(|hit| CollisionResult {
        normal: normalize_or(hit.normal, Vec3::Y),
        ..hit
    })
}

/// Discrete test at the bodies' current poses
pub fn collide_bodies(a: &RigidBody, b: &RigidBody) -> Option<CollisionResult> {
    collide_colliders(&a.collider, &a.pose(), &b.collider, &b.pose())
}
