//! Physics world
//!
//! Owns every body, the spatial index, and the per-step contact and event
//! pools. `step` runs the phases in their fixed order; `Simulation` in
//! `tick.rs` wraps the same phases with hooks, sinks and the timestep
//! accumulator.

use std::collections::HashMap;
use std::time::Instant;

use glam::Vec3;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::body::{BodyConfig, BodyId, RigidBody};
use super::broad_phase::{self, CandidatePair};
use super::ccd;
use super::collision::collide_bodies;
use super::events::{self, CollisionEvent};
use super::layers;
use super::math::{Aabb, Pose};
use super::pool::Pool;
use super::raycast::{self, RaycastHit, RaycastOptions};
use super::solver::{self, Contact, pair_mut};
use super::spatial_hash::SpatialIndex;
use crate::config::{SolverPreset, WorldConfig};
use crate::error::{PhysicsError, PhysicsResult};
use crate::persistence::{BodySnapshot, BodyState, SNAPSHOT_VERSION, WorldSnapshot};
use crate::{quat_is_finite, vec3_is_finite};

/// Step counters. Per-step fields reset at the start of every step;
/// the rest accumulate over the world's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicsStats {
    // === Per step ===
    pub broad_phase_checks: u32,
    pub narrow_phase_checks: u32,
    pub ccd_checks: u32,
    pub collisions_detected: u32,
    pub bodies_active: u32,
    pub bodies_asleep: u32,
    pub physics_time_ms: f32,
    pub solver_time_ms: f32,
    pub events_published: u32,
    pub degenerate_contacts: u32,

    // === Cumulative ===
    /// Updates whose leftover accumulator time was discarded
    pub dropped_updates: u64,
    /// Pool acquisitions past capacity
    pub pool_overflows: u64,
    /// Queued commands that returned an error
    pub failed_commands: u64,

    pub frame: u64,
    pub time: f64,
}

impl PhysicsStats {
    fn reset_step(&mut self) {
        self.broad_phase_checks = 0;
        self.narrow_phase_checks = 0;
        self.ccd_checks = 0;
        self.collisions_detected = 0;
        self.bodies_active = 0;
        self.bodies_asleep = 0;
        self.physics_time_ms = 0.0;
        self.solver_time_ms = 0.0;
        self.events_published = 0;
        self.degenerate_contacts = 0;
    }
}

/// World change queued by a callback, applied at the next pre-step point
#[derive(Debug, Clone)]
pub enum Command {
    ApplyForce {
        body: BodyId,
        force: Vec3,
    },
    ApplyImpulseAtPoint {
        body: BodyId,
        impulse: Vec3,
        point: Vec3,
    },
    SetKinematic {
        body: BodyId,
        pose: Pose,
        velocity: Vec3,
    },
    Wake(BodyId),
    Remove(BodyId),
    Register(BodyConfig),
}

pub struct PhysicsWorld {
    config: WorldConfig,
    /// Insertion order; this is the iteration order of every phase
    bodies: Vec<RigidBody>,
    slots: HashMap<BodyId, usize>,
    next_id: u32,
    index: SpatialIndex,
    contacts: Pool<Contact>,
    events: Pool<CollisionEvent>,
    rng: Pcg32,
    stats: PhysicsStats,
    frame: u64,
    time: f64,
    step_started: Option<Instant>,
}

impl PhysicsWorld {
    pub fn new(config: WorldConfig) -> PhysicsResult<Self> {
        config.validate()?;
        log::info!(
            "Physics world created (dt {:.5}s, cell {} m x {} level(s), {} solver iterations, seed {:#x})",
            config.dt_fixed,
            config.spatial_hash.cell_size,
            config.spatial_hash.levels,
            config.solver.iterations,
            config.seed
        );
        Ok(Self {
            index: SpatialIndex::from_config(&config.spatial_hash),
            contacts: Pool::with_capacity(config.contact_pool_capacity),
            events: Pool::with_capacity(config.event_pool_capacity),
            rng: Pcg32::seed_from_u64(config.seed),
            config,
            bodies: Vec::new(),
            slots: HashMap::new(),
            next_id: 0,
            stats: PhysicsStats::default(),
            frame: 0,
            time: 0.0,
            step_started: None,
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn gravity(&self) -> Vec3 {
        self.config.gravity
    }

    /// Change gravity and wake every dynamic body so sleepers react to it
    pub fn set_gravity(&mut self, gravity: Vec3) -> PhysicsResult<()> {
        if !vec3_is_finite(gravity) {
            return Err(PhysicsError::NonFinite("gravity"));
        }
        self.config.gravity = gravity;
        for body in &mut self.bodies {
            body.wake();
        }
        Ok(())
    }

    pub fn set_solver_preset(&mut self, preset: SolverPreset) {
        self.config.apply_preset(preset);
        log::debug!("Solver preset {}", preset.as_str());
    }

    // === Bodies ===

    pub fn register_body(&mut self, config: &BodyConfig) -> PhysicsResult<BodyId> {
        let id = BodyId(self.next_id);
        let body = RigidBody::from_config(id, config)?;
        self.next_id += 1;

        self.index.insert(id, &body.index_aabb);
        self.slots.insert(id, self.bodies.len());
        log::debug!(
            "Registered body {} ({:?}, {} layer, mass {})",
            id,
            body.kind,
            layers::layer_name(body.layer),
            body.mass
        );
        self.bodies.push(body);
        Ok(id)
    }

    pub fn remove_body(&mut self, id: BodyId) -> PhysicsResult<()> {
        let slot = self.slots.remove(&id).ok_or(PhysicsError::BodyNotFound(id))?;
        self.bodies.remove(slot);
        self.index.remove(id);
        for s in self.slots.values_mut() {
            if *s > slot {
                *s -= 1;
            }
        }

        // keep last step's contacts pointing at the right slots
        self.contacts.retain(|c| c.body_a != id && c.body_b != id);
        for contact in self.contacts.iter_mut() {
            if contact.index_a > slot {
                contact.index_a -= 1;
            }
            if contact.index_b > slot {
                contact.index_b -= 1;
            }
        }
        log::debug!("Removed body {}", id);
        Ok(())
    }

    /// Teleport a body and set its velocity. The previous position is kept so
    /// the move can be swept by CCD.
    pub fn update_body_kinematic(&mut self, id: BodyId, pose: Pose, velocity: Vec3) -> PhysicsResult<()> {
        if !vec3_is_finite(pose.position) {
            return Err(PhysicsError::NonFinite("position"));
        }
        if !quat_is_finite(pose.orientation) {
            return Err(PhysicsError::NonFinite("orientation"));
        }
        if !vec3_is_finite(velocity) {
            return Err(PhysicsError::NonFinite("velocity"));
        }
        if pose.orientation.length_squared() < 1e-12 {
            return Err(PhysicsError::ZeroLengthVector("orientation"));
        }

        let slot = self.slot(id)?;
        let body = &mut self.bodies[slot];
        if body.is_static() {
            return Err(PhysicsError::StaticBody(id));
        }
        body.previous_position = body.position;
        body.position = pose.position;
        body.orientation = pose.orientation.normalize();
        body.linear_velocity = velocity;
        body.wake();
        body.refresh_bounds();
        body.index_aabb = body.aabb;
        self.index.update(id, &body.aabb);
        Ok(())
    }

    pub fn apply_force(&mut self, id: BodyId, force: Vec3) -> PhysicsResult<()> {
        if !vec3_is_finite(force) {
            return Err(PhysicsError::NonFinite("force"));
        }
        let slot = self.slot(id)?;
        self.bodies[slot].apply_force(force);
        Ok(())
    }

    pub fn apply_impulse_at_point(&mut self, id: BodyId, impulse: Vec3, point: Vec3) -> PhysicsResult<()> {
        if !vec3_is_finite(impulse) {
            return Err(PhysicsError::NonFinite("impulse"));
        }
        if !vec3_is_finite(point) {
            return Err(PhysicsError::NonFinite("impulse point"));
        }
        let slot = self.slot(id)?;
        self.bodies[slot].apply_impulse_at_point(impulse, point);
        Ok(())
    }

    pub fn wake_body(&mut self, id: BodyId) -> PhysicsResult<()> {
        let slot = self.slot(id)?;
        self.bodies[slot].wake();
        Ok(())
    }

    pub fn apply_command(&mut self, command: Command) -> PhysicsResult<()> {
        match command {
            Command::ApplyForce { body, force } => self.apply_force(body, force),
            Command::ApplyImpulseAtPoint {
                body,
                impulse,
                point,
            } => self.apply_impulse_at_point(body, impulse, point),
            Command::SetKinematic {
                body,
                pose,
                velocity,
            } => self.update_body_kinematic(body, pose, velocity),
            Command::Wake(body) => self.wake_body(body),
            Command::Remove(body) => self.remove_body(body),
            Command::Register(config) => self.register_body(&config).map(|_| ()),
        }
    }

    // === Queries ===

    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.slots.get(&id).map(|&slot| &self.bodies[slot])
    }

    /// All bodies in insertion order
    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn query_body_pose(&self, id: BodyId) -> PhysicsResult<Pose> {
        self.body(id).map(RigidBody::pose).ok_or(PhysicsError::BodyNotFound(id))
    }

    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        options: &RaycastOptions,
    ) -> PhysicsResult<Option<RaycastHit>> {
        raycast::raycast(
            &self.index,
            &self.bodies,
            &self.slots,
            origin,
            direction,
            max_distance,
            options,
        )
    }

    pub fn query_aabb(&mut self, aabb: &Aabb) -> Vec<BodyId> {
        self.index.query_aabb(aabb)
    }

    pub fn query_radius(&mut self, point: Vec3, radius: f32) -> Vec<BodyId> {
        self.index.query_point_radius(point, radius)
    }

    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Contacts of the last step, in creation order
    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter()
    }

    /// Events built in the last step
    pub fn events(&self) -> impl Iterator<Item = &CollisionEvent> {
        self.events.iter()
    }

    pub fn stats(&self) -> &PhysicsStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut PhysicsStats {
        &mut self.stats
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulated seconds
    pub fn time(&self) -> f64 {
        self.time
    }

    // === Step phases ===

    /// Run one full step without hooks or sinks
    pub fn step(&mut self, dt: f32) -> PhysicsResult<()> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(PhysicsError::InvalidConfig(format!("step dt {dt} must be positive")));
        }
        self.begin_step();
        self.apply_forces();
        self.integrate(dt);
        self.refresh_spatial_index();
        let pairs = self.broad_phase();
        self.narrow_phase(&pairs, dt);
        self.solve();
        self.correct_positions();
        self.build_events();
        self.finish_step(dt);
        Ok(())
    }

    pub(crate) fn begin_step(&mut self) {
        self.step_started = Some(Instant::now());
        self.contacts.release_all();
        self.events.release_all();
        self.stats.reset_step();
    }

    pub(crate) fn apply_forces(&mut self) {
        let (gravity, air_density) = (self.config.gravity, self.config.air_density);
        for body in &mut self.bodies {
            body.apply_environment_forces(gravity, air_density);
        }
    }

    pub(crate) fn integrate(&mut self, dt: f32) {
        for body in &mut self.bodies {
            body.integrate(dt);
        }
    }

    /// Re-index moved bodies, swept when they are fast enough for CCD
    pub(crate) fn refresh_spatial_index(&mut self) {
        let threshold = self.ccd_threshold();
        for body in &mut self.bodies {
            if body.is_static() {
                continue;
            }
            let bounds = body.broad_phase_aabb(threshold);
            if bounds != body.index_aabb {
                self.index.update(body.id, &bounds);
                body.index_aabb = bounds;
            }
        }
    }

    pub(crate) fn broad_phase(&mut self) -> Vec<CandidatePair> {
        let output = broad_phase::find_pairs(&self.index, &self.bodies, &self.slots, self.ccd_threshold());
        self.stats.broad_phase_checks += output.checks;
        output.pairs
    }

    pub(crate) fn narrow_phase(&mut self, pairs: &[CandidatePair], dt: f32) {
        for pair in pairs {
            let (a, b) = (&self.bodies[pair.a], &self.bodies[pair.b]);
            let sensor = a.layer == layers::TRIGGER || b.layer == layers::TRIGGER;
            // nothing to resolve between two immovable bodies
            if a.inv_mass == 0.0 && b.inv_mass == 0.0 && !sensor {
                continue;
            }
            self.stats.narrow_phase_checks += 1;

            let (hit, time_of_impact) = if pair.swept {
                self.stats.ccd_checks += 1;
                let Some(sweep) = ccd::sweep(a, b, dt, self.config.ccd_samples, self.config.ccd_max_samples)
                else {
                    continue;
                };
                if !sensor {
                    let (a, b) = pair_mut(&mut self.bodies, pair.a, pair.b);
                    for (body, pose) in [(a, sweep.pose_a), (b, sweep.pose_b)] {
                        if body.is_dynamic() {
                            body.position = pose.position;
                            body.refresh_bounds();
                        }
                    }
                }
                (sweep.contact, sweep.fraction)
            } else {
                match collide_bodies(a, b) {
                    Some(hit) => (hit, 1.0),
                    None => continue,
                }
            };

            let (a, b) = pair_mut(&mut self.bodies, pair.a, pair.b);
            if a.is_active() || b.is_active() {
                a.wake();
                b.wake();
            }
            let contact = Contact::new(a, pair.a, b, pair.b, hit, time_of_impact);
            self.contacts.acquire(contact);
            self.stats.collisions_detected += 1;
        }
        log::trace!(
            "narrow phase: {} checks ({} swept), {} contacts",
            self.stats.narrow_phase_checks,
            self.stats.ccd_checks,
            self.stats.collisions_detected
        );
    }

    /// Prepare contacts and run the velocity iterations
    pub(crate) fn solve(&mut self) {
        let started = Instant::now();
        self.stats.degenerate_contacts += solver::prepare_contacts(&mut self.contacts, &self.bodies, &self.config.solver);
        solver::solve_velocities(&mut self.contacts, &mut self.bodies, self.config.solver.iterations);
        self.stats.solver_time_ms += started.elapsed().as_secs_f32() * 1000.0;
    }

    pub(crate) fn correct_positions(&mut self) {
        let started = Instant::now();
        let moved = solver::correct_positions(&mut self.contacts, &mut self.bodies, &self.config.solver);
        for slot in moved {
            self.bodies[slot].refresh_bounds();
        }
        self.stats.solver_time_ms += started.elapsed().as_secs_f32() * 1000.0;
    }

    /// Turn solved contacts into events in the event pool
    pub(crate) fn build_events(&mut self) {
        for contact in self.contacts.iter() {
            if contact.degenerate && !contact.sensor {
                continue;
            }
            let (a, b) = (&self.bodies[contact.index_a], &self.bodies[contact.index_b]);
            if let Some(event) =
                events::build_event(contact, a, b, &self.config.damage, self.frame, &mut self.rng)
            {
                self.events.acquire(event);
                self.stats.events_published += 1;
            }
        }
    }

    /// Events of the current step, cloned for dispatch
    pub(crate) fn step_events(&self) -> Vec<CollisionEvent> {
        self.events.iter().cloned().collect()
    }

    /// Sleep bookkeeping, exact re-index, clock advance
    pub(crate) fn finish_step(&mut self, dt: f32) {
        for body in &mut self.bodies {
            if body.update_sleep(dt, &self.config.sleep) {
                log::trace!("Body {} fell asleep", body.id);
            }
            if body.is_kinematic() {
                body.previous_position = body.position;
            }
            if body.index_aabb != body.aabb {
                self.index.update(body.id, &body.aabb);
                body.index_aabb = body.aabb;
            }
        }

        self.stats.bodies_active = self.bodies.iter().filter(|b| b.is_active()).count() as u32;
        self.stats.bodies_asleep = self.bodies.iter().filter(|b| b.is_sleeping()).count() as u32;
        self.stats.pool_overflows =
            self.contacts.overflow_allocations() + self.events.overflow_allocations();

        self.frame += 1;
        self.time += f64::from(dt);
        self.stats.frame = self.frame;
        self.stats.time = self.time;
        if let Some(started) = self.step_started.take() {
            self.stats.physics_time_ms = started.elapsed().as_secs_f32() * 1000.0;
        }
    }

    fn ccd_threshold(&self) -> Option<f32> {
        self.config.ccd_enabled.then_some(self.config.ccd_threshold)
    }

    fn slot(&self, id: BodyId) -> PhysicsResult<usize> {
        self.slots.get(&id).copied().ok_or(PhysicsError::BodyNotFound(id))
    }

    // === Lifecycle ===

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            version: SNAPSHOT_VERSION,
            frame: self.frame,
            time: self.time,
            gravity: self.config.gravity,
            bodies: self
                .bodies
                .iter()
                .map(|body| BodySnapshot {
                    id: body.id,
                    awake: body.awake,
                    idle_time: body.idle_time,
                    state: BodyState::of(body),
                })
                .collect(),
        }
    }

    /// Write snapshot state back onto existing bodies. Nothing changes unless
    /// every entry validates.
    pub fn restore(&mut self, snapshot: &WorldSnapshot) -> PhysicsResult<()> {
        snapshot.check_version()?;
        if !vec3_is_finite(snapshot.gravity) {
            return Err(PhysicsError::NonFinite("gravity"));
        }
        let mut resolved = Vec::with_capacity(snapshot.bodies.len());
        for entry in &snapshot.bodies {
            let slot = self.slot(entry.id)?;
            let state = &entry.state;
            if !vec3_is_finite(state.position())
                || !quat_is_finite(state.orientation())
                || !vec3_is_finite(state.linear_velocity())
                || !vec3_is_finite(state.angular_velocity())
            {
                return Err(PhysicsError::NonFinite("snapshot body state"));
            }
            if state.orientation().length_squared() < 1e-12 {
                return Err(PhysicsError::ZeroLengthVector("snapshot orientation"));
            }
            resolved.push((slot, entry));
        }

        for (slot, entry) in resolved {
            let body = &mut self.bodies[slot];
            body.position = entry.state.position();
            body.previous_position = body.position;
            body.orientation = entry.state.orientation().normalize();
            if !body.is_static() {
                body.linear_velocity = entry.state.linear_velocity();
                body.angular_velocity = entry.state.angular_velocity();
                body.awake = entry.awake;
                body.idle_time = entry.idle_time;
            }
            body.force = Vec3::ZERO;
            body.torque = Vec3::ZERO;
            body.refresh_bounds();
            body.index_aabb = body.aabb;
            self.index.update(body.id, &body.aabb);
        }

        self.config.gravity = snapshot.gravity;
        self.frame = snapshot.frame;
        self.time = snapshot.time;
        self.stats.frame = self.frame;
        self.stats.time = self.time;
        self.contacts.release_all();
        self.events.release_all();
        log::debug!("Restored {} bodies at frame {}", snapshot.bodies.len(), snapshot.frame);
        Ok(())
    }

    /// Drop every body and all per-step state
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.slots.clear();
        self.index.clear();
        self.contacts.release_all();
        self.events.release_all();
        log::info!("Physics world cleared at frame {}", self.frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::shape::ColliderConfig;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(WorldConfig::zero_gravity()).unwrap()
    }

    fn ball_at(position: Vec3) -> BodyConfig {
        BodyConfig::dynamic(ColliderConfig::sphere(0.5), 1.0).with_position(position)
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let mut world = world();
        let a = world.register_body(&ball_at(Vec3::ZERO)).unwrap();
        let b = world.register_body(&ball_at(Vec3::X * 3.0)).unwrap();
        assert_eq!(a, BodyId(0));
        assert_eq!(b, BodyId(1));
        assert_eq!(world.body_count(), 2);
        assert!(world.spatial_index().contains(a));
    }

    #[test]
    fn test_register_rejects_bad_config() {
        let mut world = world();
        let err = world
            .register_body(&BodyConfig::dynamic(ColliderConfig::sphere(0.5), 0.0))
            .unwrap_err();
        assert!(matches!(err, PhysicsError::NonPositiveMass(_)));
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_remove_and_not_found() {
        let mut world = world();
        let a = world.register_body(&ball_at(Vec3::ZERO)).unwrap();
        let b = world.register_body(&ball_at(Vec3::X * 3.0)).unwrap();
        world.remove_body(a).unwrap();
        assert!(world.body(a).is_none());
        assert_eq!(world.body(b).unwrap().id, b);
        assert!(!world.spatial_index().contains(a));
        assert_eq!(world.remove_body(a), Err(PhysicsError::BodyNotFound(a)));
        assert_eq!(
            world.apply_force(a, Vec3::X),
            Err(PhysicsError::BodyNotFound(a))
        );
    }

    #[test]
    fn test_kinematic_update_reindexes() {
        let mut world = world();
        let id = world.register_body(&ball_at(Vec3::ZERO)).unwrap();
        let target = Vec3::new(40.0, 0.0, 0.0);
        world
            .update_body_kinematic(id, Pose::new(target, glam::Quat::IDENTITY), Vec3::ZERO)
            .unwrap();
        let body = world.body(id).unwrap();
        assert_eq!(body.position, target);
        assert_eq!(body.previous_position, Vec3::ZERO);
        let aabb = body.aabb;
        assert!(world.query_aabb(&aabb).contains(&id));
        assert!(!world.query_radius(Vec3::ZERO, 0.1).contains(&id));
    }

    #[test]
    fn test_static_body_cannot_be_moved() {
        let mut world = world();
        let id = world
            .register_body(&BodyConfig::fixed(ColliderConfig::cuboid(Vec3::ONE)))
            .unwrap();
        let err = world
            .update_body_kinematic(id, Pose::default(), Vec3::X)
            .unwrap_err();
        assert_eq!(err, PhysicsError::StaticBody(id));
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let mut world = world();
        let id = world.register_body(&ball_at(Vec3::ZERO)).unwrap();
        assert!(world.apply_force(id, Vec3::new(f32::NAN, 0.0, 0.0)).is_err());
        assert!(world.set_gravity(Vec3::splat(f32::INFINITY)).is_err());
        assert!(world.step(0.0).is_err());
    }

    #[test]
    fn test_step_advances_clock_and_falls() {
        let mut world = PhysicsWorld::new(WorldConfig::default()).unwrap();
        let id = world.register_body(&ball_at(Vec3::new(0.0, 10.0, 0.0))).unwrap();
        for _ in 0..24 {
            world.step(1.0 / 240.0).unwrap();
        }
        assert_eq!(world.frame(), 24);
        assert!((world.time() - 0.1).abs() < 1e-6);
        assert!(world.body(id).unwrap().position.y < 10.0);
        assert_eq!(world.stats().frame, 24);
    }

    #[test]
    fn test_contact_wakes_sleeping_body() {
        let mut world = world();
        let sleeper = world.register_body(&ball_at(Vec3::ZERO)).unwrap();
        let slot = world.slots[&sleeper];
        world.bodies[slot].sleep();
        world
            .register_body(&ball_at(Vec3::new(-0.95, 0.0, 0.0)).with_velocity(Vec3::X * 3.0))
            .unwrap();
        world.step(1.0 / 240.0).unwrap();
        assert!(world.body(sleeper).unwrap().awake);
        assert_eq!(world.stats().collisions_detected, 1);
    }

    #[test]
    fn test_commands_apply() {
        let mut world = world();
        let id = world.register_body(&ball_at(Vec3::ZERO)).unwrap();
        world
            .apply_command(Command::ApplyImpulseAtPoint {
                body: id,
                impulse: Vec3::X * 2.0,
                point: Vec3::ZERO,
            })
            .unwrap();
        assert_eq!(world.body(id).unwrap().linear_velocity, Vec3::X * 2.0);
        world.apply_command(Command::Remove(id)).unwrap();
        assert!(world.apply_command(Command::Wake(id)).is_err());
        world
            .apply_command(Command::Register(ball_at(Vec3::Y)))
            .unwrap();
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut world = PhysicsWorld::new(WorldConfig::default()).unwrap();
        let id = world.register_body(&ball_at(Vec3::new(0.0, 10.0, 0.0))).unwrap();
        world.step(1.0 / 240.0).unwrap();
        let snapshot = world.snapshot();
        let before = world.body(id).unwrap().position;

        for _ in 0..10 {
            world.step(1.0 / 240.0).unwrap();
        }
        assert_ne!(world.body(id).unwrap().position, before);

        world.restore(&snapshot).unwrap();
        assert_eq!(world.body(id).unwrap().position, before);
        assert_eq!(world.frame(), 1);

        let mut stranger = snapshot.clone();
        stranger.bodies[0].id = BodyId(99);
        assert_eq!(world.restore(&stranger), Err(PhysicsError::BodyNotFound(BodyId(99))));
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut world = world();
        world.register_body(&ball_at(Vec3::ZERO)).unwrap();
        world.clear();
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.spatial_index().body_count(), 0);
    }
}
