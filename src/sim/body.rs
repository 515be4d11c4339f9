//! Rigid body state, force accumulation and integration
//!
//! Bodies are created from a validated `BodyConfig` by the world, which
//! assigns the id. Static and kinematic bodies carry `inv_mass == 0` and a
//! zero inverse inertia, so impulses never move them.

use std::fmt;

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::layers;
use super::math::{Aabb, BoundingSphere, Pose, integrate_orientation, world_inverse_inertia};
use super::shape::{Collider, ColliderConfig};
use crate::config::SleepConfig;
use crate::error::{PhysicsError, PhysicsResult};
use crate::{quat_is_finite, vec3_is_finite};

/// Stable body identifier, unique within a world and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u32);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a body participates in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    #[default]
    Dynamic,
    /// Never moves
    Static,
    /// Moved only by the host; its velocity feeds contacts but is not integrated
    Kinematic,
}

/// Surface response coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    /// Bounciness in [0, 1]
    pub restitution: f32,
    /// Coulomb coefficient, >= 0
    pub friction: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            restitution: 0.3,
            friction: 0.5,
        }
    }
}

impl Material {
    pub fn new(restitution: f32, friction: f32) -> Self {
        Self {
            restitution,
            friction,
        }
    }

    pub fn validate(&self) -> PhysicsResult<()> {
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(PhysicsError::InvalidMaterial(format!(
                "restitution {} outside [0, 1]",
                self.restitution
            )));
        }
        if !(self.friction >= 0.0 && self.friction.is_finite()) {
            return Err(PhysicsError::InvalidMaterial(format!(
                "friction {} must be >= 0",
                self.friction
            )));
        }
        Ok(())
    }
}

/// Body registration descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    #[serde(default)]
    pub kind: BodyKind,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub orientation: Quat,
    #[serde(default)]
    pub linear_velocity: Vec3,
    #[serde(default)]
    pub angular_velocity: Vec3,
    /// Ignored for static and kinematic bodies
    #[serde(default = "default_mass")]
    pub mass: f32,
    #[serde(default)]
    pub material: Material,
    pub collider: ColliderConfig,
    /// Single layer bit; defaults from the body kind and collider
    #[serde(default)]
    pub layer: Option<u32>,
    #[serde(default)]
    pub group: Option<u32>,
    #[serde(default)]
    pub mask: Option<u32>,
    /// Defaults to true for the `vehicle` collider
    #[serde(default)]
    pub is_vehicle: Option<bool>,
    /// Quadratic drag coefficient (0 disables drag)
    #[serde(default)]
    pub drag_coefficient: f32,
    /// Reference area for drag; defaults to the collider's X-Y cross-section
    #[serde(default)]
    pub frontal_area: Option<f32>,
}

fn default_mass() -> f32 {
    1.0
}

impl BodyConfig {
    pub fn dynamic(collider: ColliderConfig, mass: f32) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass,
            material: Material::default(),
            collider,
            layer: None,
            group: None,
            mask: None,
            is_vehicle: None,
            drag_coefficient: 0.0,
            frontal_area: None,
        }
    }

    pub fn fixed(collider: ColliderConfig) -> Self {
        Self {
            kind: BodyKind::Static,
            ..Self::dynamic(collider, 0.0)
        }
    }

    pub fn kinematic(collider: ColliderConfig) -> Self {
        Self {
            kind: BodyKind::Kinematic,
            ..Self::dynamic(collider, 0.0)
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, angular_velocity: Vec3) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    pub fn with_material(mut self, restitution: f32, friction: f32) -> Self {
        self.material = Material::new(restitution, friction);
        self
    }

    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_group(mut self, group: u32) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_drag(mut self, coefficient: f32, frontal_area: f32) -> Self {
        self.drag_coefficient = coefficient;
        self.frontal_area = Some(frontal_area);
        self
    }

    /// Parse a descriptor; unknown collider tags become `UnknownShape`
    pub fn from_json(json: &str) -> PhysicsResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let collider = value
            .get("collider")
            .cloned()
            .ok_or_else(|| PhysicsError::InvalidCollider("body descriptor has no collider".into()))?;
        ColliderConfig::from_value(collider)?;
        Ok(serde_json::from_value(value)?)
    }

    fn resolved_layer(&self) -> u32 {
        self.layer.unwrap_or(match self.kind {
            BodyKind::Static => layers::STATIC,
            _ if self.collider.is_vehicle() => layers::VEHICLE,
            _ => layers::DEFAULT,
        })
    }
}

/// A simulated rigid body
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub id: BodyId,
    pub kind: BodyKind,

    // === Pose ===
    pub position: Vec3,
    pub orientation: Quat,
    /// Position at the start of the last integration (CCD, interpolation)
    pub previous_position: Vec3,

    // === Motion ===
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub force: Vec3,
    pub torque: Vec3,

    // === Inertial ===
    pub mass: f32,
    pub inv_mass: f32,
    /// Principal moments (body frame)
    pub inertia: Vec3,
    pub inv_inertia: Vec3,

    pub material: Material,
    pub collider: Collider,

    // === Derived bounds ===
    pub aabb: Aabb,
    pub bounding_sphere: BoundingSphere,
    /// Bounds the spatial index holds (swept for fast movers)
    pub index_aabb: Aabb,

    // === Flags ===
    pub awake: bool,
    pub is_vehicle: bool,
    /// Seconds spent below the sleep thresholds
    pub idle_time: f32,

    pub layer: u32,
    pub group: u32,
    pub mask: u32,

    pub drag_coefficient: f32,
    pub frontal_area: f32,
}

impl RigidBody {
    /// Validate a descriptor and build the body
    pub fn from_config(id: BodyId, config: &BodyConfig) -> PhysicsResult<Self> {
        if !vec3_is_finite(config.position) {
            return Err(PhysicsError::NonFinite("position"));
        }
        if !quat_is_finite(config.orientation) {
            return Err(PhysicsError::NonFinite("orientation"));
        }
        if config.orientation.length_squared() < 1e-8 {
            return Err(PhysicsError::ZeroLengthVector("orientation"));
        }
        if !vec3_is_finite(config.linear_velocity) {
            return Err(PhysicsError::NonFinite("linear velocity"));
        }
        if !vec3_is_finite(config.angular_velocity) {
            return Err(PhysicsError::NonFinite("angular velocity"));
        }
        config.material.validate()?;
        if !(config.drag_coefficient >= 0.0 && config.drag_coefficient.is_finite()) {
            return Err(PhysicsError::InvalidMaterial(format!(
                "drag coefficient {} must be >= 0",
                config.drag_coefficient
            )));
        }

        let collider = config.collider.build()?;
        let layer = config.resolved_layer();
        if layer == 0 {
            return Err(PhysicsError::InvalidConfig("body layer must be non-zero".into()));
        }

        let (mass, inv_mass, inertia, inv_inertia) = match config.kind {
            BodyKind::Dynamic => {
                if !(config.mass > 0.0 && config.mass.is_finite()) {
                    return Err(PhysicsError::NonPositiveMass(config.mass));
                }
                let inertia = collider.principal_inertia(config.mass);
                let inv_inertia = Vec3::new(
                    recip_or_zero(inertia.x),
                    recip_or_zero(inertia.y),
                    recip_or_zero(inertia.z),
                );
                (config.mass, 1.0 / config.mass, inertia, inv_inertia)
            }
            BodyKind::Static | BodyKind::Kinematic => {
                (f32::INFINITY, 0.0, Vec3::splat(f32::INFINITY), Vec3::ZERO)
            }
        };

        let frontal_area = match config.frontal_area {
            Some(area) if area >= 0.0 && area.is_finite() => area,
            Some(area) => {
                return Err(PhysicsError::InvalidMaterial(format!(
                    "frontal area {area} must be >= 0"
                )));
            }
            None => {
                let size = collider.local_aabb().half_extents() * 2.0;
                size.x * size.y
            }
        };

        let is_static = config.kind == BodyKind::Static;
        let (linear_velocity, angular_velocity) = if is_static {
            (Vec3::ZERO, Vec3::ZERO)
        } else {
            (config.linear_velocity, config.angular_velocity)
        };

        let mut body = Self {
            id,
            kind: config.kind,
            position: config.position,
            orientation: config.orientation.normalize(),
            previous_position: config.position,
            linear_velocity,
            angular_velocity,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            mass,
            inv_mass,
            inertia,
            inv_inertia,
            material: config.material,
            collider,
            aabb: Aabb::new(config.position, config.position),
            bounding_sphere: BoundingSphere {
                center: config.position,
                radius: 0.0,
            },
            index_aabb: Aabb::new(config.position, config.position),
            awake: !is_static,
            is_vehicle: config.is_vehicle.unwrap_or(config.collider.is_vehicle()),
            idle_time: 0.0,
            layer,
            group: config.group.unwrap_or(layer),
            mask: config.mask.unwrap_or_else(|| layers::default_mask(layer)),
            drag_coefficient: config.drag_coefficient,
            frontal_area,
        };
        body.refresh_bounds();
        body.index_aabb = body.aabb;
        Ok(body)
    }

    #[inline]
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.orientation)
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.kind == BodyKind::Static
    }

    #[inline]
    pub fn is_kinematic(&self) -> bool {
        self.kind == BodyKind::Kinematic
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    /// Dynamic and awake, or kinematic with a non-zero velocity
    pub fn is_active(&self) -> bool {
        match self.kind {
            BodyKind::Dynamic => self.awake,
            BodyKind::Kinematic => {
                self.linear_velocity != Vec3::ZERO || self.angular_velocity != Vec3::ZERO
            }
            BodyKind::Static => false,
        }
    }

    pub fn is_sleeping(&self) -> bool {
        self.is_dynamic() && !self.awake
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.linear_velocity.length()
    }

    /// World-space inverse inertia tensor
    #[inline]
    pub fn inv_inertia_world(&self) -> Mat3 {
        world_inverse_inertia(self.orientation, self.inv_inertia)
    }

    /// Velocity of the material point at `point`
    #[inline]
    pub fn velocity_at_point(&self, point: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(point - self.position)
    }

    pub fn kinetic_energy(&self) -> f32 {
        if !self.is_dynamic() {
            return 0.0;
        }
        let w = self.orientation.inverse() * self.angular_velocity;
        0.5 * self.mass * self.linear_velocity.length_squared()
            + 0.5 * (self.inertia * w * w).element_sum()
    }

    pub fn wake(&mut self) {
        if self.is_dynamic() {
            self.awake = true;
            self.idle_time = 0.0;
        }
    }

    pub fn sleep(&mut self) {
        if self.is_dynamic() {
            self.awake = false;
            self.linear_velocity = Vec3::ZERO;
            self.angular_velocity = Vec3::ZERO;
            self.force = Vec3::ZERO;
            self.torque = Vec3::ZERO;
        }
    }

    /// Accumulate a force through the center of mass
    pub fn apply_force(&mut self, force: Vec3) {
        if self.inv_mass == 0.0 {
            return;
        }
        self.force += force;
        self.wake();
    }

    /// Accumulate a force at a world point (adds torque `r × F`)
    pub fn apply_force_at_point(&mut self, force: Vec3, point: Vec3) {
        if self.inv_mass == 0.0 {
            return;
        }
        self.force += force;
        self.torque += (point - self.position).cross(force);
        self.wake();
    }

    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if self.inv_mass == 0.0 {
            return;
        }
        self.linear_velocity += impulse * self.inv_mass;
        self.wake();
    }

    /// Linear impulse plus angular impulse `r × J`
    pub fn apply_impulse_at_point(&mut self, impulse: Vec3, point: Vec3) {
        if self.inv_mass == 0.0 {
            return;
        }
        self.linear_velocity += impulse * self.inv_mass;
        let r = point - self.position;
        self.angular_velocity += self.inv_inertia_world() * r.cross(impulse);
        self.wake();
    }

    /// Gravity and quadratic air drag, `F = 0.5·ρ·v²·Cd·A` against motion
    pub fn apply_environment_forces(&mut self, gravity: Vec3, air_density: f32) {
        if !self.is_dynamic() || !self.awake {
            return;
        }
        self.force += gravity * self.mass;
        if self.drag_coefficient > 0.0 && air_density > 0.0 {
            let speed_sq = self.linear_velocity.length_squared();
            if speed_sq > 1e-8 {
                let magnitude =
                    0.5 * air_density * speed_sq * self.drag_coefficient * self.frontal_area;
                self.force -= self.linear_velocity.normalize() * magnitude;
            }
        }
    }

    /// Semi-implicit Euler. Static, kinematic and sleeping bodies are skipped.
    /// Returns true if the body moved.
    pub fn integrate(&mut self, dt: f32) -> bool {
        if self.is_static() {
            self.previous_position = self.position;
            return false;
        }
        if !self.is_dynamic() || !self.awake {
            self.force = Vec3::ZERO;
            self.torque = Vec3::ZERO;
            return false;
        }

        self.previous_position = self.position;
        self.linear_velocity += self.force * self.inv_mass * dt;
        self.angular_velocity += self.inv_inertia_world() * self.torque * dt;
        self.position += self.linear_velocity * dt;
        self.orientation = integrate_orientation(self.orientation, self.angular_velocity, dt);

        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
        self.refresh_bounds();
        true
    }

    /// Recompute AABB and bounding sphere from the collider at the current pose
    pub fn refresh_bounds(&mut self) {
        self.aabb = self.collider.world_aabb(&self.pose());
        self.bounding_sphere = BoundingSphere::from_aabb(&self.aabb);
    }

    /// Bounds to index: the AABB, swept back to the previous position when
    /// the body moves faster than `ccd_threshold`
    pub fn broad_phase_aabb(&self, ccd_threshold: Option<f32>) -> Aabb {
        match ccd_threshold {
            Some(threshold) if self.speed() > threshold => self
                .aabb
                .union(&self.aabb.translated(self.previous_position - self.position)),
            _ => self.aabb,
        }
    }

    /// Track idle time; returns true when the body just fell asleep
    pub fn update_sleep(&mut self, dt: f32, config: &SleepConfig) -> bool {
        if !config.enabled || !self.is_dynamic() || !self.awake {
            return false;
        }
        let idle = self.linear_velocity.length() < config.linear_threshold
            && self.angular_velocity.length() < config.angular_threshold;
        if !idle {
            self.idle_time = 0.0;
            return false;
        }
        self.idle_time += dt;
        if self.idle_time >= config.time_to_sleep {
            self.sleep();
            return true;
        }
        false
    }
}

#[inline]
fn recip_or_zero(v: f32) -> f32 {
    if v > 0.0 && v.is_finite() { 1.0 / v } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_body(mass: f32) -> RigidBody {
        RigidBody::from_config(BodyId(1), &BodyConfig::dynamic(ColliderConfig::sphere(0.5), mass))
            .unwrap()
    }

    #[test]
    fn test_non_positive_mass_rejected() {
        let config = BodyConfig::dynamic(ColliderConfig::sphere(0.5), 0.0);
        assert_eq!(
            RigidBody::from_config(BodyId(1), &config).unwrap_err(),
            PhysicsError::NonPositiveMass(0.0)
        );
        // static bodies ignore mass
        let config = BodyConfig::fixed(ColliderConfig::sphere(0.5));
        assert!(RigidBody::from_config(BodyId(1), &config).is_ok());
    }

    #[test]
    fn test_nan_pose_rejected() {
        let config = BodyConfig::dynamic(ColliderConfig::sphere(0.5), 1.0)
            .with_position(Vec3::new(f32::NAN, 0.0, 0.0));
        assert_eq!(
            RigidBody::from_config(BodyId(1), &config).unwrap_err(),
            PhysicsError::NonFinite("position")
        );
    }

    #[test]
    fn test_static_velocity_forced_to_zero() {
        let config = BodyConfig::fixed(ColliderConfig::sphere(1.0)).with_velocity(Vec3::X);
        let body = RigidBody::from_config(BodyId(1), &config).unwrap();
        assert_eq!(body.linear_velocity, Vec3::ZERO);
        assert_eq!(body.inv_mass, 0.0);
        assert_eq!(body.layer, layers::STATIC);
    }

    #[test]
    fn test_infinite_mass_ignores_impulses() {
        let config = BodyConfig::kinematic(ColliderConfig::sphere(1.0)).with_velocity(Vec3::X);
        let mut body = RigidBody::from_config(BodyId(1), &config).unwrap();
        body.apply_impulse_at_point(Vec3::new(0.0, 100.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        body.apply_force(Vec3::splat(50.0));
        assert_eq!(body.linear_velocity, Vec3::X);
        assert_eq!(body.angular_velocity, Vec3::ZERO);
        assert_eq!(body.force, Vec3::ZERO);
    }

    #[test]
    fn test_impulse_at_point_spins() {
        let mut body = sphere_body(1.0);
        body.apply_impulse_at_point(Vec3::X, Vec3::new(0.0, 0.5, 0.0));
        assert!((body.linear_velocity.x - 1.0).abs() < 1e-6);
        // r = +Y, J = +X  =>  r × J = -Z
        assert!(body.angular_velocity.z < 0.0);
    }

    #[test]
    fn test_semi_implicit_euler() {
        let mut body = sphere_body(2.0);
        body.apply_environment_forces(Vec3::new(0.0, -10.0, 0.0), 0.0);
        body.integrate(0.1);
        // v = -1, x = v*dt = -0.1 (velocity updated first)
        assert!((body.linear_velocity.y + 1.0).abs() < 1e-6);
        assert!((body.position.y + 0.1).abs() < 1e-6);
        assert_eq!(body.previous_position, Vec3::ZERO);
        assert_eq!(body.force, Vec3::ZERO);
    }

    #[test]
    fn test_drag_opposes_motion() {
        let config = BodyConfig::dynamic(ColliderConfig::sphere(0.5), 1.0)
            .with_velocity(Vec3::new(10.0, 0.0, 0.0))
            .with_drag(0.5, 1.0);
        let mut body = RigidBody::from_config(BodyId(1), &config).unwrap();
        body.apply_environment_forces(Vec3::ZERO, 1.2);
        // 0.5 * 1.2 * 100 * 0.5 * 1.0 = 30
        assert!((body.force.x + 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_sleep_after_idle_window() {
        let mut body = sphere_body(1.0);
        let config = SleepConfig::default();
        let steps = (config.time_to_sleep / 0.1).ceil() as usize;
        let mut slept = false;
        for _ in 0..steps + 1 {
            slept |= body.update_sleep(0.1, &config);
        }
        assert!(slept);
        assert!(body.is_sleeping());

        body.apply_impulse(Vec3::Y);
        assert!(body.awake);
    }

    #[test]
    fn test_orientation_normalized_after_integrate() {
        let mut body = sphere_body(1.0);
        body.angular_velocity = Vec3::new(40.0, 13.0, -7.0);
        for _ in 0..500 {
            body.integrate(1.0 / 240.0);
        }
        assert!((body.orientation.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_parse_body_json() {
        let body = BodyConfig::from_json(
            r#"{ "kind": "static", "collider": { "type": "box", "half_extents": [5, 0.5, 5] } }"#,
        )
        .unwrap();
        assert_eq!(body.kind, BodyKind::Static);

        let err = BodyConfig::from_json(r#"{ "collider": { "type": "blob" } }"#).unwrap_err();
        assert_eq!(err, PhysicsError::UnknownShape("blob".into()));
    }
}
