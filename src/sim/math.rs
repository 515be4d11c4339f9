//! Bounding volumes and rotation helpers
//!
//! Everything is built on glam's `Vec3`/`Quat`/`Mat3`; this module only adds
//! the pieces the engine needs on top.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position + orientation of a body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Body-local point to world space
    #[inline]
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.orientation * local
    }

    /// World point into body-local space (inverse rotation of the offset)
    #[inline]
    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        self.orientation.inverse() * (world - self.position)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// AABB of a rotated box
    pub fn from_obb(center: Vec3, half_extents: Vec3, rotation: Quat) -> Self {
        let m = Mat3::from_quat(rotation);
        let extent = Vec3::new(
            m.x_axis.x.abs() * half_extents.x
                + m.y_axis.x.abs() * half_extents.y
                + m.z_axis.x.abs() * half_extents.z,
            m.x_axis.y.abs() * half_extents.x
                + m.y_axis.y.abs() * half_extents.y
                + m.z_axis.y.abs() * half_extents.z,
            m.x_axis.z.abs() * half_extents.x
                + m.y_axis.z.abs() * half_extents.y
                + m.z_axis.z.abs() * half_extents.z,
        );
        Self::from_center_half_extents(center, extent)
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Closed-interval overlap test
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    #[inline]
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn translated(&self, offset: Vec3) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    pub fn expanded(&self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }
}

/// Bounding sphere (world space)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    /// Sphere enclosing an AABB
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            center: aabb.center(),
            radius: aabb.half_extents().length(),
        }
    }

    #[inline]
    pub fn overlaps(&self, other: &BoundingSphere) -> bool {
        let r = self.radius + other.radius;
        self.center.distance_squared(other.center) <= r * r
    }
}

/// q ← normalize(q + 0.5·ω·q·dt)
#[inline]
pub fn integrate_orientation(q: Quat, angular_velocity: Vec3, dt: f32) -> Quat {
    let omega = Quat::from_xyzw(angular_velocity.x, angular_velocity.y, angular_velocity.z, 0.0);
    let dq = (omega * q) * (0.5 * dt);
    let next = q + dq;
    if next.length_squared() > 0.0 {
        next.normalize()
    } else {
        q
    }
}

/// World-space inverse inertia from a principal-axis (diagonal) local inverse
/// tensor: R · diag(inv) · Rᵀ
#[inline]
pub fn world_inverse_inertia(orientation: Quat, inv_inertia_local: Vec3) -> Mat3 {
    let r = Mat3::from_quat(orientation);
    r * Mat3::from_diagonal(inv_inertia_local) * r.transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_overlap_and_union() {
        let a = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::from_center_half_extents(Vec3::new(1.5, 0.0, 0.0), Vec3::ONE);
        let c = Aabb::from_center_half_extents(Vec3::new(5.0, 0.0, 0.0), Vec3::ONE);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        let u = a.union(&c);
        assert_eq!(u.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(u.max, Vec3::new(6.0, 1.0, 1.0));
    }

    #[test]
    fn test_obb_aabb_rotated_45() {
        let rot = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        let aabb = Aabb::from_obb(Vec3::ZERO, Vec3::new(1.0, 1.0, 1.0), rot);
        let expected = std::f32::consts::SQRT_2;
        assert!((aabb.max.x - expected).abs() < 1e-5);
        assert!((aabb.max.z - expected).abs() < 1e-5);
        assert!((aabb.max.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_integrate_orientation_stays_unit() {
        let mut q = Quat::IDENTITY;
        for _ in 0..1000 {
            q = integrate_orientation(q, Vec3::new(3.0, -7.0, 11.0), 1.0 / 240.0);
        }
        assert!((q.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_integrate_orientation_matches_axis_angle() {
        // 1 rad/s about Y for 1 s in small steps
        let mut q = Quat::IDENTITY;
        for _ in 0..1000 {
            q = integrate_orientation(q, Vec3::Y, 0.001);
        }
        let expected = Quat::from_rotation_y(1.0);
        assert!(q.dot(expected).abs() > 0.9999);
    }

    #[test]
    fn test_pose_round_trip() {
        let pose = Pose::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_z(0.7));
        let local = Vec3::new(0.3, -0.4, 2.0);
        let back = pose.inverse_transform_point(pose.transform_point(local));
        assert!((back - local).length() < 1e-5);
    }
}
