//! Collider shapes and their bounding volumes
//!
//! A collider is a flat list of primitives in body-local space. Compounds do
//! not nest; the `vehicle` descriptor expands to a chassis box plus four wheel
//! spheres.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::math::{Aabb, Pose};
use crate::error::{PhysicsError, PhysicsResult};
use crate::{quat_is_finite, vec3_is_finite};

/// Primitive in body-local space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Sphere {
        center: Vec3,
        radius: f32,
    },
    /// Oriented box
    Box {
        center: Vec3,
        half_extents: Vec3,
        rotation: Quat,
    },
    /// Segment along local Y of length `2 * half_height`, inflated by `radius`
    Capsule {
        center: Vec3,
        radius: f32,
        half_height: f32,
        rotation: Quat,
    },
}

/// Primitive placed in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldShape {
    Sphere {
        center: Vec3,
        radius: f32,
    },
    Box {
        center: Vec3,
        half_extents: Vec3,
        rotation: Quat,
    },
    Capsule {
        center: Vec3,
        radius: f32,
        half_height: f32,
        rotation: Quat,
    },
}

impl Shape {
    pub fn to_world(&self, pose: &Pose) -> WorldShape {
        match *self {
            Shape::Sphere { center, radius } => WorldShape::Sphere {
                center: pose.transform_point(center),
                radius,
            },
            Shape::Box {
                center,
                half_extents,
                rotation,
            } => WorldShape::Box {
                center: pose.transform_point(center),
                half_extents,
                rotation: pose.orientation * rotation,
            },
            Shape::Capsule {
                center,
                radius,
                half_height,
                rotation,
            } => WorldShape::Capsule {
                center: pose.transform_point(center),
                radius,
                half_height,
                rotation: pose.orientation * rotation,
            },
        }
    }

    /// Smallest half-thickness of the primitive
    pub fn min_extent(&self) -> f32 {
        match *self {
            Shape::Sphere { radius, .. } => radius,
            Shape::Box { half_extents, .. } => half_extents.min_element(),
            Shape::Capsule { radius, .. } => radius,
        }
    }
}

impl WorldShape {
    pub fn aabb(&self) -> Aabb {
        match *self {
            WorldShape::Sphere { center, radius } => {
                Aabb::from_center_half_extents(center, Vec3::splat(radius))
            }
            WorldShape::Box {
                center,
                half_extents,
                rotation,
            } => Aabb::from_obb(center, half_extents, rotation),
            WorldShape::Capsule {
                center,
                radius,
                half_height,
                rotation,
            } => {
                let axis = rotation * Vec3::Y * half_height;
                let a = center + axis;
                let b = center - axis;
                Aabb::new(a.min(b) - Vec3::splat(radius), a.max(b) + Vec3::splat(radius))
            }
        }
    }

    /// Shape used by the narrow phase and raycasts. Capsules stand in as a
    /// sphere of the capsule radius at the capsule center.
    pub fn narrow_proxy(&self) -> WorldShape {
        match *self {
            WorldShape::Capsule { center, radius, .. } => WorldShape::Sphere { center, radius },
            other => other,
        }
    }

    /// Canonical dispatch order (by discriminant)
    pub fn order(&self) -> u8 {
        match self {
            WorldShape::Sphere { .. } => 0,
            WorldShape::Box { .. } => 1,
            WorldShape::Capsule { .. } => 2,
        }
    }

    pub fn center(&self) -> Vec3 {
        match *self {
            WorldShape::Sphere { center, .. }
            | WorldShape::Box { center, .. }
            | WorldShape::Capsule { center, .. } => center,
        }
    }
}

/// Body collider: one or more primitives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub shapes: Vec<Shape>,
}

impl Collider {
    pub fn sphere(radius: f32) -> Self {
        Self {
            shapes: vec![Shape::Sphere {
                center: Vec3::ZERO,
                radius,
            }],
        }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self {
            shapes: vec![Shape::Box {
                center: Vec3::ZERO,
                half_extents,
                rotation: Quat::IDENTITY,
            }],
        }
    }

    pub fn world_shapes<'a>(&'a self, pose: &'a Pose) -> impl Iterator<Item = WorldShape> + 'a {
        self.shapes.iter().map(move |s| s.to_world(pose))
    }

    pub fn world_aabb(&self, pose: &Pose) -> Aabb {
        let mut shapes = self.world_shapes(pose);
        let first = match shapes.next() {
            Some(shape) => shape.aabb(),
            None => return Aabb::from_center_half_extents(pose.position, Vec3::ZERO),
        };
        shapes.fold(first, |acc, s| acc.union(&s.aabb()))
    }

    /// Bounds in body-local space
    pub fn local_aabb(&self) -> Aabb {
        self.world_aabb(&Pose::IDENTITY)
    }

    pub fn min_extent(&self) -> f32 {
        self.shapes
            .iter()
            .map(Shape::min_extent)
            .fold(f32::INFINITY, f32::min)
    }

    /// Principal moments of inertia about the body origin.
    /// Single spheres are exact; anything else uses its local bounding box.
    pub fn principal_inertia(&self, mass: f32) -> Vec3 {
        if let [Shape::Sphere { center, radius }] = self.shapes.as_slice() {
            let i = 0.4 * mass * radius * radius;
            // parallel axis for an offset sphere
            let d = *center;
            return Vec3::new(
                i + mass * (d.y * d.y + d.z * d.z),
                i + mass * (d.x * d.x + d.z * d.z),
                i + mass * (d.x * d.x + d.y * d.y),
            );
        }
        let size = self.local_aabb().half_extents() * 2.0;
        let (x2, y2, z2) = (size.x * size.x, size.y * size.y, size.z * size.z);
        Vec3::new(y2 + z2, x2 + z2, x2 + y2) * (mass / 12.0)
    }
}

/// Known collider tags in descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeTag {
    Sphere,
    Box,
    Capsule,
    Compound,
    Vehicle,
}

impl ShapeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeTag::Sphere => "sphere",
            ShapeTag::Box => "box",
            ShapeTag::Capsule => "capsule",
            ShapeTag::Compound => "compound",
            ShapeTag::Vehicle => "vehicle",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sphere" => Some(ShapeTag::Sphere),
            "box" | "obb" => Some(ShapeTag::Box),
            "capsule" => Some(ShapeTag::Capsule),
            "compound" => Some(ShapeTag::Compound),
            "vehicle" => Some(ShapeTag::Vehicle),
            _ => None,
        }
    }
}

/// Vehicle shorthand: chassis OBB plus four wheel spheres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleColliderConfig {
    pub chassis_half_extents: Vec3,
    pub chassis_center: Vec3,
    pub wheel_radius: f32,
    pub wheel_offsets: [Vec3; 4],
}

impl Default for VehicleColliderConfig {
    fn default() -> Self {
        Self {
            chassis_half_extents: Vec3::new(1.0, 0.5, 2.0),
            chassis_center: Vec3::ZERO,
            wheel_radius: 0.35,
            wheel_offsets: [
                Vec3::new(-0.9, -0.5, 1.4),
                Vec3::new(0.9, -0.5, 1.4),
                Vec3::new(-0.9, -0.5, -1.4),
                Vec3::new(0.9, -0.5, -1.4),
            ],
        }
    }
}

/// Collider descriptor, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColliderConfig {
    Sphere {
        radius: f32,
        #[serde(default)]
        center: Vec3,
    },
    Box {
        half_extents: Vec3,
        #[serde(default)]
        center: Vec3,
        #[serde(default)]
        rotation: Quat,
    },
    Capsule {
        radius: f32,
        half_height: f32,
        #[serde(default)]
        center: Vec3,
        #[serde(default)]
        rotation: Quat,
    },
    Compound {
        children: Vec<ColliderConfig>,
    },
    Vehicle(VehicleColliderConfig),
}

impl ColliderConfig {
    pub fn sphere(radius: f32) -> Self {
        ColliderConfig::Sphere {
            radius,
            center: Vec3::ZERO,
        }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        ColliderConfig::Box {
            half_extents,
            center: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn capsule(radius: f32, half_height: f32) -> Self {
        ColliderConfig::Capsule {
            radius,
            half_height,
            center: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn vehicle() -> Self {
        ColliderConfig::Vehicle(VehicleColliderConfig::default())
    }

    pub fn tag(&self) -> ShapeTag {
        match self {
            ColliderConfig::Sphere { .. } => ShapeTag::Sphere,
            ColliderConfig::Box { .. } => ShapeTag::Box,
            ColliderConfig::Capsule { .. } => ShapeTag::Capsule,
            ColliderConfig::Compound { .. } => ShapeTag::Compound,
            ColliderConfig::Vehicle(_) => ShapeTag::Vehicle,
        }
    }

    pub fn is_vehicle(&self) -> bool {
        matches!(self, ColliderConfig::Vehicle(_))
    }

    /// Parse a descriptor, reporting unknown `type` tags as `UnknownShape`
    pub fn from_json(json: &str) -> PhysicsResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> PhysicsResult<Self> {
        check_tags(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Validate and flatten into primitives
    pub fn build(&self) -> PhysicsResult<Collider> {
        let mut shapes = Vec::new();
        self.push_shapes(&mut shapes, false)?;
        Ok(Collider { shapes })
    }

    fn push_shapes(&self, out: &mut Vec<Shape>, nested: bool) -> PhysicsResult<()> {
        match self {
            ColliderConfig::Sphere { radius, center } => {
                check_radius(*radius, "sphere radius")?;
                check_vec(*center, "sphere center")?;
                out.push(Shape::Sphere {
                    center: *center,
                    radius: *radius,
                });
            }
            ColliderConfig::Box {
                half_extents,
                center,
                rotation,
            } => {
                check_vec(*half_extents, "box half extents")?;
                if half_extents.min_element() <= 0.0 {
                    return Err(PhysicsError::InvalidCollider(format!(
                        "box half extents must be positive, got {half_extents}"
                    )));
                }
                check_vec(*center, "box center")?;
                out.push(Shape::Box {
                    center: *center,
                    half_extents: *half_extents,
                    rotation: check_rotation(*rotation, "box rotation")?,
                });
            }
            ColliderConfig::Capsule {
                radius,
                half_height,
                center,
                rotation,
            } => {
                check_radius(*radius, "capsule radius")?;
                if !(*half_height >= 0.0 && half_height.is_finite()) {
                    return Err(PhysicsError::InvalidCollider(format!(
                        "capsule half height must be >= 0, got {half_height}"
                    )));
                }
                check_vec(*center, "capsule center")?;
                out.push(Shape::Capsule {
                    center: *center,
                    radius: *radius,
                    half_height: *half_height,
                    rotation: check_rotation(*rotation, "capsule rotation")?,
                });
            }
            ColliderConfig::Compound { children } => {
                if nested {
                    return Err(PhysicsError::InvalidCollider("compounds cannot nest".into()));
                }
                if children.is_empty() {
                    return Err(PhysicsError::InvalidCollider("compound has no children".into()));
                }
                for child in children {
                    child.push_shapes(out, true)?;
                }
            }
            ColliderConfig::Vehicle(vehicle) => {
                if nested {
                    return Err(PhysicsError::InvalidCollider(
                        "vehicle collider cannot sit inside a compound".into(),
                    ));
                }
                ColliderConfig::Box {
                    half_extents: vehicle.chassis_half_extents,
                    center: vehicle.chassis_center,
                    rotation: Quat::IDENTITY,
                }
                .push_shapes(out, true)?;
                for offset in vehicle.wheel_offsets {
                    ColliderConfig::Sphere {
                        radius: vehicle.wheel_radius,
                        center: offset,
                    }
                    .push_shapes(out, true)?;
                }
            }
        }
        Ok(())
    }
}

fn check_tags(value: &serde_json::Value) -> PhysicsResult<()> {
    let tag = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| PhysicsError::InvalidCollider("collider descriptor has no `type`".into()))?;
    let tag = ShapeTag::from_str(tag).ok_or_else(|| PhysicsError::UnknownShape(tag.to_string()))?;
    if tag == ShapeTag::Compound {
        if let Some(children) = value.get("children").and_then(serde_json::Value::as_array) {
            for child in children {
                check_tags(child)?;
            }
        }
    }
    Ok(())
}

fn check_radius(radius: f32, what: &str) -> PhysicsResult<()> {
    if radius > 0.0 && radius.is_finite() {
        Ok(())
    } else {
        Err(PhysicsError::InvalidCollider(format!("{what} must be positive, got {radius}")))
    }
}

fn check_vec(v: Vec3, what: &'static str) -> PhysicsResult<()> {
    if vec3_is_finite(v) {
        Ok(())
    } else {
        Err(PhysicsError::NonFinite(what))
    }
}

fn check_rotation(q: Quat, what: &'static str) -> PhysicsResult<Quat> {
    if !quat_is_finite(q) {
        return Err(PhysicsError::NonFinite(what));
    }
    if q.length_squared() < 1e-8 {
        return Err(PhysicsError::ZeroLengthVector(what));
    }
    Ok(q.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_expands_to_chassis_and_wheels() {
        let collider = ColliderConfig::vehicle().build().unwrap();
        assert_eq!(collider.shapes.len(), 5);
        assert!(matches!(collider.shapes[0], Shape::Box { .. }));
        assert!(
            collider.shapes[1..]
                .iter()
                .all(|s| matches!(s, Shape::Sphere { radius, .. } if (*radius - 0.35).abs() < 1e-6))
        );
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let err = ColliderConfig::from_json(r#"{ "type": "torus", "radius": 1.0 }"#).unwrap_err();
        assert_eq!(err, PhysicsError::UnknownShape("torus".into()));

        let err = ColliderConfig::from_json(
            r#"{ "type": "compound", "children": [ { "type": "cone" } ] }"#,
        )
        .unwrap_err();
        assert_eq!(err, PhysicsError::UnknownShape("cone".into()));
    }

    #[test]
    fn test_parse_box_with_defaults() {
        let config = ColliderConfig::from_json(r#"{ "type": "box", "half_extents": [5.0, 0.5, 5.0] }"#)
            .unwrap();
        let collider = config.build().unwrap();
        let aabb = collider.local_aabb();
        assert_eq!(aabb.max, Vec3::new(5.0, 0.5, 5.0));
    }

    #[test]
    fn test_nested_compound_rejected() {
        let config = ColliderConfig::Compound {
            children: vec![ColliderConfig::Compound {
                children: vec![ColliderConfig::sphere(1.0)],
            }],
        };
        assert!(matches!(config.build(), Err(PhysicsError::InvalidCollider(_))));
    }

    #[test]
    fn test_invalid_dimensions_rejected() {
        assert!(ColliderConfig::sphere(0.0).build().is_err());
        assert!(ColliderConfig::cuboid(Vec3::new(1.0, -1.0, 1.0)).build().is_err());
        assert!(matches!(
            ColliderConfig::sphere(f32::NAN).build(),
            Err(PhysicsError::InvalidCollider(_))
        ));
    }

    #[test]
    fn test_capsule_aabb_covers_segment() {
        let collider = ColliderConfig::capsule(0.5, 1.0).build().unwrap();
        let aabb = collider.local_aabb();
        assert!((aabb.max.y - 1.5).abs() < 1e-6);
        assert!((aabb.max.x - 0.5).abs() < 1e-6);
        // narrow phase only sees the center sphere
        let proxy = collider.shapes[0].to_world(&Pose::IDENTITY).narrow_proxy();
        assert!(matches!(proxy, WorldShape::Sphere { radius, .. } if (radius - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_sphere_inertia() {
        let collider = Collider::sphere(0.5);
        let inertia = collider.principal_inertia(2.0);
        assert!((inertia.x - 0.2).abs() < 1e-6);
        assert_eq!(inertia.x, inertia.z);
    }
}
