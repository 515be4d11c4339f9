//! Sequential-impulse contact solver and Baumgarte position correction
//!
//! Impulses are accumulated per contact across the iterations of one step,
//! and the clamps (non-negative normal, Coulomb cone for friction) act on the
//! accumulated value. Nothing carries over between steps.

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

use super::body::{BodyId, RigidBody};
use super::collision::CollisionResult;
use super::layers;
use super::pool::Pool;
use crate::config::SolverConfig;
use crate::consts::FRICTION_EPSILON;

/// Which kinds of body meet in a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactKind {
    VehicleVehicle,
    /// Vehicle against a static or kinematic body
    VehicleStatic,
    VehicleDynamic,
    /// Non-vehicle dynamic body against a static or kinematic body
    DynamicStatic,
    DynamicDynamic,
}

impl ContactKind {
    pub fn classify(a: &RigidBody, b: &RigidBody) -> Self {
        match (a.is_vehicle, b.is_vehicle) {
            (true, true) => ContactKind::VehicleVehicle,
            (true, false) | (false, true) => {
                let other = if a.is_vehicle { b } else { a };
                if other.is_dynamic() {
                    ContactKind::VehicleDynamic
                } else {
                    ContactKind::VehicleStatic
                }
            }
            (false, false) => {
                if a.is_dynamic() && b.is_dynamic() {
                    ContactKind::DynamicDynamic
                } else {
                    ContactKind::DynamicStatic
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::VehicleVehicle => "vehicle-vehicle",
            ContactKind::VehicleStatic => "vehicle-static",
            ContactKind::VehicleDynamic => "vehicle-dynamic",
            ContactKind::DynamicStatic => "dynamic-static",
            ContactKind::DynamicDynamic => "dynamic-dynamic",
        }
    }
}

/// Contact between two bodies for one step
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub body_a: BodyId,
    pub body_b: BodyId,
    /// Slots in the world's body list at contact creation
    pub index_a: usize,
    pub index_b: usize,

    pub point: Vec3,
    /// Unit normal from A toward B
    pub normal: Vec3,
    /// Current overlap; reduced by position correction
    pub penetration: f32,
    /// Overlap when the contact was found
    pub initial_penetration: f32,
    /// Step fraction in (0, 1]; 1.0 for discrete contacts
    pub time_of_impact: f32,
    pub kind: ContactKind,
    /// Trigger contact: reported but never resolved
    pub sensor: bool,

    // === Accumulated impulses (this step) ===
    pub normal_impulse: f32,
    pub tangent_impulse: Vec3,

    // === Cached at prepare ===
    pub restitution: f32,
    pub friction: f32,
    /// Relative velocity at the point before solving (B relative to A)
    pub relative_velocity: Vec3,
    /// `relative_velocity · normal` before solving (negative when closing)
    pub approach_speed: f32,
    /// 1 / K along the normal; 0 for degenerate contacts
    pub normal_mass: f32,
    pub degenerate: bool,
    velocity_bias: f32,
}

impl Contact {
    pub fn new(
        a: &RigidBody,
        index_a: usize,
        b: &RigidBody,
        index_b: usize,
        hit: CollisionResult,
        time_of_impact: f32,
    ) -> Self {
        Self {
            body_a: a.id,
            body_b: b.id,
            index_a,
            index_b,
            point: hit.point,
            normal: hit.normal,
            penetration: hit.penetration.max(0.0),
            initial_penetration: hit.penetration.max(0.0),
            time_of_impact,
            kind: ContactKind::classify(a, b),
            sensor: a.layer == layers::TRIGGER || b.layer == layers::TRIGGER,
            normal_impulse: 0.0,
            tangent_impulse: Vec3::ZERO,
            restitution: a.material.restitution.min(b.material.restitution),
            friction: 0.5 * (a.material.friction + b.material.friction),
            relative_velocity: Vec3::ZERO,
            approach_speed: 0.0,
            normal_mass: 0.0,
            degenerate: false,
            velocity_bias: 0.0,
        }
    }

    /// Relative velocity of B with respect to A at the contact point
    pub fn relative_velocity_of(&self, a: &RigidBody, b: &RigidBody) -> Vec3 {
        b.velocity_at_point(self.point) - a.velocity_at_point(self.point)
    }

    /// Effective mass (linear only), used for impact force
    pub fn linear_effective_mass(a: &RigidBody, b: &RigidBody) -> f32 {
        let inv = a.inv_mass + b.inv_mass;
        if inv > 0.0 { 1.0 / inv } else { 0.0 }
    }

    /// Cache per-step quantities. Returns false for a degenerate contact.
    pub fn prepare(&mut self, a: &RigidBody, b: &RigidBody, config: &SolverConfig) -> bool {
        self.relative_velocity = self.relative_velocity_of(a, b);
        self.approach_speed = self.relative_velocity.dot(self.normal);
        self.normal_impulse = 0.0;
        self.tangent_impulse = Vec3::ZERO;

        let k = impulse_denominator(a, b, self.point, self.normal);
        self.degenerate = !(k > 1e-12 && k.is_finite());
        self.normal_mass = if self.degenerate { 0.0 } else { 1.0 / k };

        // resting contacts get no bounce
        self.velocity_bias = if self.approach_speed < -config.restitution_threshold {
            -self.restitution * self.approach_speed
        } else {
            0.0
        };
        !self.degenerate
    }

    /// One velocity pass: normal impulse, then friction
    pub fn solve_velocity(&mut self, a: &mut RigidBody, b: &mut RigidBody) {
        if self.sensor || self.degenerate {
            return;
        }
        let n = self.normal;

        let vn = self.relative_velocity_of(a, b).dot(n);
        let lambda = self.normal_mass * (self.velocity_bias - vn);
        let accumulated = (self.normal_impulse + lambda).max(0.0);
        let lambda = accumulated - self.normal_impulse;
        self.normal_impulse = accumulated;
        if lambda != 0.0 {
            apply_pair_impulse(a, b, n * lambda, self.point);
        }

        if self.friction <= 0.0 {
            return;
        }
        let v_rel = self.relative_velocity_of(a, b);
        let tangential = v_rel - n * v_rel.dot(n);
        let speed = tangential.length();
        if speed < FRICTION_EPSILON {
            return;
        }
        let t = tangential / speed;
        let k = impulse_denominator(a, b, self.point, t);
        if !(k > 1e-12) {
            return;
        }
        let max_friction = self.friction * self.normal_impulse;
        let accumulated = (self.tangent_impulse + t * (-speed / k)).clamp_length_max(max_friction);
        let delta = accumulated - self.tangent_impulse;
        self.tangent_impulse = accumulated;
        apply_pair_impulse(a, b, delta, self.point);
    }

    /// One Baumgarte pass. Only bodies with finite mass move.
    pub fn correct_position(&mut self, a: &mut RigidBody, b: &mut RigidBody, config: &SolverConfig) -> bool {
        if self.sensor || self.degenerate {
            return false;
        }
        let inv_sum = a.inv_mass + b.inv_mass;
        let excess = self.penetration - config.slop;
        if inv_sum <= 0.0 || excess <= 0.0 {
            return false;
        }
        let magnitude = config.baumgarte_percent * excess / inv_sum;
        a.position -= self.normal * (magnitude * a.inv_mass);
        b.position += self.normal * (magnitude * b.inv_mass);
        self.penetration -= magnitude * inv_sum;
        true
    }
}

/// `1/mA + 1/mB + (rA×d)·IA⁻¹(rA×d) + (rB×d)·IB⁻¹(rB×d)`
fn impulse_denominator(a: &RigidBody, b: &RigidBody, point: Vec3, direction: Vec3) -> f32 {
    let angular = |body: &RigidBody, inv_inertia: Mat3| {
        let rn = (point - body.position).cross(direction);
        rn.dot(inv_inertia * rn)
    };
    a.inv_mass
        + b.inv_mass
        + angular(a, a.inv_inertia_world())
        + angular(b, b.inv_inertia_world())
}

#[inline]
fn apply_pair_impulse(a: &mut RigidBody, b: &mut RigidBody, impulse: Vec3, point: Vec3) {
    b.apply_impulse_at_point(impulse, point);
    a.apply_impulse_at_point(-impulse, point);
}

/// Two distinct mutable bodies out of one slice
pub(crate) fn pair_mut(bodies: &mut [RigidBody], a: usize, b: usize) -> (&mut RigidBody, &mut RigidBody) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = bodies.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = bodies.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

/// Prepare every contact; returns how many were degenerate
pub fn prepare_contacts(contacts: &mut Pool<Contact>, bodies: &[RigidBody], config: &SolverConfig) -> u32 {
    let mut degenerate = 0;
    for contact in contacts.iter_mut() {
        if !contact.prepare(&bodies[contact.index_a], &bodies[contact.index_b], config) {
            degenerate += 1;
            log::trace!("degenerate contact {} / {} skipped", contact.body_a, contact.body_b);
        }
    }
    degenerate
}

/// `iterations` passes over the contact list in creation order
pub fn solve_velocities(contacts: &mut Pool<Contact>, bodies: &mut [RigidBody], iterations: u32) {
    for _ in 0..iterations {
        for contact in contacts.iter_mut() {
            let (a, b) = pair_mut(bodies, contact.index_a, contact.index_b);
            contact.solve_velocity(a, b);
        }
    }
}

/// Baumgarte passes; returns the slots of bodies that moved (sorted, unique)
pub fn correct_positions(
    contacts: &mut Pool<Contact>,
    bodies: &mut [RigidBody],
    config: &SolverConfig,
) -> Vec<usize> {
    let mut moved = Vec::new();
    for _ in 0..config.position_iterations {
        for contact in contacts.iter_mut() {
            let (a, b) = pair_mut(bodies, contact.index_a, contact.index_b);
            if contact.correct_position(a, b, config) {
                moved.push(contact.index_a);
                moved.push(contact.index_b);
            }
        }
    }
    moved.sort_unstable();
    moved.dedup();
    moved
}
