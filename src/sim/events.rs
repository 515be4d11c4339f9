//! Collision events, damage annotation and the sink interfaces
//!
//! Events are built after the velocity solve from each contact's pre-solve
//! closing speed. Hooks and sinks never get the world mutably: they receive a
//! `SimContext`, which can read body poses, publish extra events, and queue
//! commands that run at the start of the next step.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::body::{BodyId, RigidBody};
use super::math::Pose;
use super::solver::{Contact, ContactKind};
use super::world::{Command, PhysicsWorld};
use crate::config::{DamageConfig, ZoneThresholds};
use crate::error::{PhysicsError, PhysicsResult};

/// Impact location in vehicle-local space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DamageZone {
    Front,
    Rear,
    Left,
    Right,
    Top,
    Bottom,
    Center,
}

impl DamageZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            DamageZone::Front => "FRONT",
            DamageZone::Rear => "REAR",
            DamageZone::Left => "LEFT",
            DamageZone::Right => "RIGHT",
            DamageZone::Top => "TOP",
            DamageZone::Bottom => "BOTTOM",
            DamageZone::Center => "CENTER",
        }
    }
}

/// Zone for a vehicle-local point. Front/rear win over the sides, sides
/// over top/bottom.
pub fn classify_zone(local: Vec3, thresholds: &ZoneThresholds) -> DamageZone {
    if local.z > thresholds.front_z {
        DamageZone::Front
    } else if local.z < thresholds.rear_z {
        DamageZone::Rear
    } else if local.x > thresholds.right_x {
        DamageZone::Right
    } else if local.x < thresholds.left_x {
        DamageZone::Left
    } else if local.y > thresholds.top_y {
        DamageZone::Top
    } else if local.y < thresholds.bottom_y {
        DamageZone::Bottom
    } else {
        DamageZone::Center
    }
}

/// Damage annotation for one vehicle in an impact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageInfo {
    pub vehicle: BodyId,
    pub zone: DamageZone,
    /// 0..=1
    pub severity: f32,
    /// Impact point in the vehicle's frame
    pub local_point: Vec3,
    /// Inward dent in the vehicle's frame
    pub deformation: Vec3,
    pub components: Vec<String>,
}

/// A published impact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub kind: ContactKind,
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub layer_a: u32,
    pub layer_b: u32,
    pub point: Vec3,
    /// Unit normal from A toward B
    pub normal: Vec3,
    /// Velocity of B relative to A at the point, before the solve
    pub relative_velocity: Vec3,
    /// Newtons
    pub impact_force: f32,
    pub penetration: f32,
    /// Step fraction in (0, 1]
    pub time_of_impact: f32,
    /// One entry per vehicle involved
    pub damage: Vec<DamageInfo>,
    /// Seconds until the impact is audible at the configured listener
    pub audio_delay: Option<f32>,
    /// Trigger overlap (no impulse was applied)
    pub sensor: bool,
    pub frame: u64,
}

impl CollisionEvent {
    /// First damage annotation, if a vehicle was involved
    pub fn damage_info(&self) -> Option<&DamageInfo> {
        self.damage.first()
    }

    pub fn damage_for(&self, vehicle: BodyId) -> Option<&DamageInfo> {
        self.damage.iter().find(|d| d.vehicle == vehicle)
    }

    pub fn involves(&self, id: BodyId) -> bool {
        self.body_a == id || self.body_b == id
    }
}

/// `|v_rel·n| · m_eff · (1 + e)`
#[inline]
pub fn impact_force(approach_speed: f32, effective_mass: f32, restitution: f32) -> f32 {
    approach_speed.abs() * effective_mass * (1.0 + restitution)
}

#[inline]
pub fn severity(force: f32, max_force: f32) -> f32 {
    (force / max_force).clamp(0.0, 1.0)
}

/// Each candidate is kept with probability `severity * scale` (clamped)
pub fn select_components<R: Rng>(
    candidates: &[String],
    severity: f32,
    scale: f32,
    rng: &mut R,
) -> Vec<String> {
    let p = (severity * scale).clamp(0.0, 1.0);
    candidates
        .iter()
        .filter(|_| rng.random::<f32>() < p)
        .cloned()
        .collect()
}

/// Annotate one vehicle. `inward` is the world direction pointing into it.
pub fn annotate_damage<R: Rng>(
    vehicle: &RigidBody,
    point: Vec3,
    inward: Vec3,
    severity: f32,
    config: &DamageConfig,
    rng: &mut R,
) -> DamageInfo {
    let pose = vehicle.pose();
    let local_point = pose.inverse_transform_point(point);
    let zone = classify_zone(local_point, &config.zones);
    let deformation = vehicle.orientation.inverse() * inward * (severity * config.max_deformation);
    let components = select_components(
        config.components.for_zone(zone),
        severity,
        config.component_probability_scale,
        rng,
    );
    DamageInfo {
        vehicle: vehicle.id,
        zone,
        severity,
        local_point,
        deformation,
        components,
    }
}

/// Event for a solved contact, or `None` below the force threshold.
/// Sensor contacts always publish.
pub fn build_event<R: Rng>(
    contact: &Contact,
    a: &RigidBody,
    b: &RigidBody,
    config: &DamageConfig,
    frame: u64,
    rng: &mut R,
) -> Option<CollisionEvent> {
    let force = impact_force(
        contact.approach_speed,
        Contact::linear_effective_mass(a, b),
        contact.restitution,
    );
    if !contact.sensor && force <= config.min_impact_force {
        return None;
    }
    let severity = severity(force, config.max_impact_force);

    let mut damage = Vec::new();
    if !contact.sensor {
        // normal runs A -> B, so it points into B and out of A
        if a.is_vehicle {
            damage.push(annotate_damage(a, contact.point, -contact.normal, severity, config, rng));
        }
        if b.is_vehicle {
            damage.push(annotate_damage(b, contact.point, contact.normal, severity, config, rng));
        }
    }

    let audio_delay = config
        .listener
        .map(|listener| listener.distance(contact.point) / config.speed_of_sound);

    Some(CollisionEvent {
        kind: contact.kind,
        body_a: a.id,
        body_b: b.id,
        layer_a: a.layer,
        layer_b: b.layer,
        point: contact.point,
        normal: contact.normal,
        relative_velocity: contact.relative_velocity,
        impact_force: force,
        penetration: contact.initial_penetration,
        time_of_impact: contact.time_of_impact,
        damage,
        audio_delay,
        sensor: contact.sensor,
        frame,
    })
}

/// Capability bundle handed to hooks and sinks
pub struct SimContext<'a> {
    world: &'a PhysicsWorld,
    outbox: &'a mut Vec<CollisionEvent>,
    commands: &'a mut Vec<Command>,
}

impl<'a> SimContext<'a> {
    pub(crate) fn new(
        world: &'a PhysicsWorld,
        outbox: &'a mut Vec<CollisionEvent>,
        commands: &'a mut Vec<Command>,
    ) -> Self {
        Self {
            world,
            outbox,
            commands,
        }
    }

    pub fn query_body_pose(&self, id: BodyId) -> PhysicsResult<Pose> {
        self.world
            .body(id)
            .map(RigidBody::pose)
            .ok_or(PhysicsError::BodyNotFound(id))
    }

    /// Read-only body access
    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.world.body(id)
    }

    pub fn frame(&self) -> u64 {
        self.world.frame()
    }

    pub fn time(&self) -> f64 {
        self.world.time()
    }

    /// Deliver an extra event to the global sinks in this step
    pub fn publish_event(&mut self, event: CollisionEvent) {
        self.outbox.push(event);
    }

    /// Queue a world change for the next pre-step point
    pub fn enqueue(&mut self, command: Command) {
        self.commands.push(command);
    }
}

/// Receives every event
pub trait CollisionSink {
    fn on_collision(&mut self, event: &CollisionEvent, ctx: &mut SimContext<'_>);
}

impl<F> CollisionSink for F
where
    F: FnMut(&CollisionEvent, &mut SimContext<'_>),
{
    fn on_collision(&mut self, event: &CollisionEvent, ctx: &mut SimContext<'_>) {
        self(event, ctx)
    }
}

/// Receives events for bodies on the layers it subscribed to, once per
/// subscribed body, with that body as `self_body`
pub trait LayerCollisionSink {
    fn on_collision(
        &mut self,
        event: &CollisionEvent,
        self_body: BodyId,
        other_body: BodyId,
        ctx: &mut SimContext<'_>,
    );
}

impl<F> LayerCollisionSink for F
where
    F: FnMut(&CollisionEvent, BodyId, BodyId, &mut SimContext<'_>),
{
    fn on_collision(
        &mut self,
        event: &CollisionEvent,
        self_body: BodyId,
        other_body: BodyId,
        ctx: &mut SimContext<'_>,
    ) {
        self(event, self_body, other_body, ctx)
    }
}

/// Pre/post step callbacks
pub trait StepHooks {
    fn on_pre_step(&mut self, _dt: f32, _ctx: &mut SimContext<'_>) {}
    fn on_post_step(&mut self, _dt: f32, _ctx: &mut SimContext<'_>) {}
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    use super::*;
    use crate::sim::body::BodyConfig;
    use crate::sim::collision::CollisionResult;
    use crate::sim::shape::ColliderConfig;

    fn car() -> RigidBody {
        RigidBody::from_config(BodyId(1), &BodyConfig::dynamic(ColliderConfig::vehicle(), 1200.0))
            .unwrap()
    }

    #[test]
    fn test_zone_thresholds() {
        let t = ZoneThresholds::default();
        assert_eq!(classify_zone(Vec3::new(0.0, 0.5, 1.8), &t), DamageZone::Front);
        assert_eq!(classify_zone(Vec3::new(0.0, 0.5, -1.8), &t), DamageZone::Rear);
        assert_eq!(classify_zone(Vec3::new(0.9, 0.5, 0.0), &t), DamageZone::Right);
        assert_eq!(classify_zone(Vec3::new(-0.9, 0.5, 0.0), &t), DamageZone::Left);
        assert_eq!(classify_zone(Vec3::new(0.0, 0.6, 0.0), &t), DamageZone::Top);
        assert_eq!(classify_zone(Vec3::new(0.0, -0.2, 0.0), &t), DamageZone::Bottom);
        assert_eq!(classify_zone(Vec3::new(0.0, 0.2, 0.0), &t), DamageZone::Center);
    }

    #[test]
    fn test_zone_in_rotated_frame() {
        let mut vehicle = car();
        vehicle.position = Vec3::new(10.0, 0.0, 0.0);
        vehicle.orientation = glam::Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        // vehicle +Z now faces world +X
        let mut rng = Pcg32::seed_from_u64(1);
        let info = annotate_damage(
            &vehicle,
            Vec3::new(11.8, 0.3, 0.0),
            -Vec3::X,
            0.5,
            &DamageConfig::default(),
            &mut rng,
        );
        assert_eq!(info.zone, DamageZone::Front);
        // dent points backwards in the vehicle frame
        assert!(info.deformation.z < 0.0);
        assert!((info.deformation.length() - 0.125).abs() < 1e-5);
    }

    #[test]
    fn test_component_selection_extremes() {
        let tags: Vec<String> = vec!["hood".into(), "radiator".into(), "bumper_front".into()];
        let mut rng = Pcg32::seed_from_u64(7);
        assert!(select_components(&tags, 0.0, 1.0, &mut rng).is_empty());
        assert_eq!(select_components(&tags, 1.0, 1.0, &mut rng), tags);
    }

    #[test]
    fn test_component_selection_is_seeded() {
        let tags = DamageConfig::default().components.front;
        let a = select_components(&tags, 0.5, 1.0, &mut Pcg32::seed_from_u64(42));
        let b = select_components(&tags, 0.5, 1.0, &mut Pcg32::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_weak_impacts_publish_nothing() {
        let vehicle = car();
        let wall =
            RigidBody::from_config(BodyId(2), &BodyConfig::fixed(ColliderConfig::sphere(1.0))).unwrap();
        let hit = CollisionResult {
            point: Vec3::new(0.0, 0.0, 2.0),
            normal: Vec3::Z,
            penetration: 0.05,
        };
        let mut contact = Contact::new(&vehicle, 0, &wall, 1, hit, 1.0);
        let mut rng = Pcg32::seed_from_u64(3);
        let config = DamageConfig::default();

        // 0.05 m/s into a wall: 0.05 * 1200 * 1.3 = 78 N
        contact.approach_speed = -0.05;
        assert!(build_event(&contact, &vehicle, &wall, &config, 0, &mut rng).is_none());

        contact.approach_speed = -10.0;
        let event = build_event(&contact, &vehicle, &wall, &config, 4, &mut rng).unwrap();
        assert_eq!(event.kind, ContactKind::VehicleStatic);
        assert!((event.impact_force - 10.0 * 1200.0 * 1.3).abs() < 1.0);
        let damage = event.damage_info().unwrap();
        assert_eq!(damage.zone, DamageZone::Front);
        assert!((damage.severity - 15_600.0 / 5.0e5).abs() < 1e-6);
        assert!(event.audio_delay.is_none());
        assert_eq!(event.frame, 4);
    }

    #[test]
    fn test_audio_delay_from_listener() {
        let vehicle = car();
        let wall =
            RigidBody::from_config(BodyId(2), &BodyConfig::fixed(ColliderConfig::sphere(1.0))).unwrap();
        let hit = CollisionResult {
            point: Vec3::new(0.0, 0.0, 2.0),
            normal: Vec3::Z,
            penetration: 0.05,
        };
        let mut contact = Contact::new(&vehicle, 0, &wall, 1, hit, 1.0);
        contact.approach_speed = -20.0;
        let config = DamageConfig {
            listener: Some(Vec3::new(0.0, 0.0, 345.0)),
            ..DamageConfig::default()
        };
        let event =
            build_event(&contact, &vehicle, &wall, &config, 0, &mut Pcg32::seed_from_u64(0)).unwrap();
        assert!((event.audio_delay.unwrap() - 1.0).abs() < 1e-5);
    }
}
