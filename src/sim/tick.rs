//! Fixed timestep controller
//!
//! Accumulates wall-clock time and advances the world in `dt_fixed` steps.
//! Each step runs the world phases in a fixed order and calls the
//! registered hooks and sinks at their points in it:
//!
//! 1. queued commands, pre-step hooks (then commands they queued)
//! 2. forces, integration, spatial hash refresh
//! 3. broad phase, narrow phase
//! 4. velocity solve, position correction
//! 5. events: global sinks, then layer sinks
//! 6. sleep and clock bookkeeping, post-step hooks

use glam::Vec3;

use super::body::{BodyConfig, BodyId};
use super::events::{CollisionEvent, CollisionSink, LayerCollisionSink, SimContext, StepHooks};
use super::math::Pose;
use super::raycast::{RaycastHit, RaycastOptions};
use super::world::{Command, PhysicsStats, PhysicsWorld};
use crate::config::WorldConfig;
use crate::error::PhysicsResult;

pub struct Simulation {
    world: PhysicsWorld,
    hooks: Vec<Box<dyn StepHooks>>,
    sinks: Vec<Box<dyn CollisionSink>>,
    /// (layer mask, sink)
    layer_sinks: Vec<(u32, Box<dyn LayerCollisionSink>)>,
    /// Events published from callbacks, delivered at the next delivery point
    outbox: Vec<CollisionEvent>,
    /// Commands queued from callbacks, applied at the next pre-step point
    commands: Vec<Command>,
    /// Everything delivered to sinks during the last step
    last_events: Vec<CollisionEvent>,
    accumulator: f32,
    alpha: f32,
    paused: bool,
    single_step_requested: bool,
}

impl Simulation {
    pub fn new(config: WorldConfig) -> PhysicsResult<Self> {
        Ok(Self {
            world: PhysicsWorld::new(config)?,
            hooks: Vec::new(),
            sinks: Vec::new(),
            layer_sinks: Vec::new(),
            outbox: Vec::new(),
            commands: Vec::new(),
            last_events: Vec::new(),
            accumulator: 0.0,
            alpha: 0.0,
            paused: false,
            single_step_requested: false,
        })
    }

    /// Tear down: drop callbacks and every body
    pub fn dispose(mut self) {
        self.hooks.clear();
        self.sinks.clear();
        self.layer_sinks.clear();
        self.world.clear();
        log::info!(
            "Simulation disposed after {} frames ({:.3}s simulated)",
            self.world.frame(),
            self.world.time()
        );
    }

    /// Advance by a wall-clock delta. Returns the number of steps taken.
    pub fn update(&mut self, delta: f32) -> u32 {
        let dt = self.world.config().dt_fixed;
        if self.paused {
            if !self.single_step_requested {
                return 0;
            }
            // one step per request, independent of the delta
            self.single_step_requested = false;
            self.run_step(dt);
            return 1;
        }
        self.single_step_requested = false;

        let max_delta = self.world.config().max_frame_delta;
        let delta = if delta.is_finite() { delta.clamp(0.0, max_delta) } else { 0.0 };
        self.accumulator += delta;

        let max_substeps = self.world.config().max_substeps;
        let mut steps = 0;
        while self.accumulator >= dt && steps < max_substeps {
            self.run_step(dt);
            self.accumulator -= dt;
            steps += 1;
        }

        // spiral of death guard
        if self.accumulator > dt {
            log::warn!(
                "Dropping {:.4}s of simulation time after {} substeps",
                self.accumulator,
                steps
            );
            self.accumulator = 0.0;
            self.world.stats_mut().dropped_updates += 1;
        }
        self.alpha = self.accumulator / dt;
        steps
    }

    /// Run exactly one fixed step now, paused or not
    pub fn step(&mut self) {
        let dt = self.world.config().dt_fixed;
        self.run_step(dt);
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
        self.single_step_requested = false;
    }

    /// While paused, the next `update` runs one step
    pub fn single_step(&mut self) {
        self.single_step_requested = true;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Leftover accumulator as a fraction of a step, for render interpolation
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    // === Callbacks ===

    pub fn on_collision<F>(&mut self, sink: F)
    where
        F: FnMut(&CollisionEvent, &mut SimContext<'_>) + 'static,
    {
        self.sinks.push(Box::new(sink));
    }

    /// Called once per subscribed body for events touching `layer_mask`
    pub fn on_layer_collision<F>(&mut self, layer_mask: u32, sink: F)
    where
        F: FnMut(&CollisionEvent, BodyId, BodyId, &mut SimContext<'_>) + 'static,
    {
        self.layer_sinks.push((layer_mask, Box::new(sink)));
    }

    pub fn add_sink(&mut self, sink: Box<dyn CollisionSink>) {
        self.sinks.push(sink);
    }

    pub fn add_layer_sink(&mut self, layer_mask: u32, sink: Box<dyn LayerCollisionSink>) {
        self.layer_sinks.push((layer_mask, sink));
    }

    pub fn add_hooks(&mut self, hooks: Box<dyn StepHooks>) {
        self.hooks.push(hooks);
    }

    /// Queue a command for the next pre-step point
    pub fn enqueue(&mut self, command: Command) {
        self.commands.push(command);
    }

    // === World access ===

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.world
    }

    pub fn stats(&self) -> &PhysicsStats {
        self.world.stats()
    }

    pub fn last_events(&self) -> &[CollisionEvent] {
        &self.last_events
    }

    pub fn register_body(&mut self, config: &BodyConfig) -> PhysicsResult<BodyId> {
        self.world.register_body(config)
    }

    pub fn remove_body(&mut self, id: BodyId) -> PhysicsResult<()> {
        self.world.remove_body(id)
    }

    pub fn update_body_kinematic(&mut self, id: BodyId, pose: Pose, velocity: Vec3) -> PhysicsResult<()> {
        self.world.update_body_kinematic(id, pose, velocity)
    }

    pub fn apply_force(&mut self, id: BodyId, force: Vec3) -> PhysicsResult<()> {
        self.world.apply_force(id, force)
    }

    pub fn apply_impulse_at_point(&mut self, id: BodyId, impulse: Vec3, point: Vec3) -> PhysicsResult<()> {
        self.world.apply_impulse_at_point(id, impulse, point)
    }

    pub fn set_gravity(&mut self, gravity: Vec3) -> PhysicsResult<()> {
        self.world.set_gravity(gravity)
    }

    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        options: &RaycastOptions,
    ) -> PhysicsResult<Option<RaycastHit>> {
        self.world.raycast(origin, direction, max_distance, options)
    }

    pub fn query_body_pose(&self, id: BodyId) -> PhysicsResult<Pose> {
        self.world.query_body_pose(id)
    }

    // === Step ===

    fn run_step(&mut self, dt: f32) {
        self.world.begin_step();
        self.last_events.clear();
        self.apply_commands();

        self.call_hooks(dt, true);
        self.apply_commands();

        self.world.apply_forces();
        self.world.integrate(dt);
        self.world.refresh_spatial_index();
        let pairs = self.world.broad_phase();
        self.world.narrow_phase(&pairs, dt);
        self.world.solve();
        self.world.correct_positions();
        self.world.build_events();

        for event in self.world.step_events() {
            self.deliver(&event);
            self.last_events.push(event);
        }
        self.flush_outbox();

        self.world.finish_step(dt);
        self.call_hooks(dt, false);
        self.flush_outbox();
    }

    fn apply_commands(&mut self) {
        for command in std::mem::take(&mut self.commands) {
            if let Err(err) = self.world.apply_command(command) {
                log::warn!("Queued command failed: {err}");
                self.world.stats_mut().failed_commands += 1;
            }
        }
    }

    fn call_hooks(&mut self, dt: f32, pre: bool) {
        let Self {
            world,
            hooks,
            outbox,
            commands,
            ..
        } = &mut *self;
        let mut ctx = SimContext::new(world, outbox, commands);
        for hook in hooks.iter_mut() {
            if pre {
                hook.on_pre_step(dt, &mut ctx);
            } else {
                hook.on_post_step(dt, &mut ctx);
            }
        }
    }

    /// Global sinks, then layer sinks once per subscribed side
    fn deliver(&mut self, event: &CollisionEvent) {
        let Self {
            world,
            sinks,
            layer_sinks,
            outbox,
            commands,
            ..
        } = &mut *self;
        let mut ctx = SimContext::new(world, outbox, commands);
        for sink in sinks.iter_mut() {
            sink.on_collision(event, &mut ctx);
        }
        for (mask, sink) in layer_sinks.iter_mut() {
            if event.layer_a & *mask != 0 {
                sink.on_collision(event, event.body_a, event.body_b, &mut ctx);
            }
            if event.layer_b & *mask != 0 {
                sink.on_collision(event, event.body_b, event.body_a, &mut ctx);
            }
        }
    }

    /// Hand events published from callbacks to the global sinks. Events they
    /// publish in turn wait for the next delivery point.
    fn flush_outbox(&mut self) {
        let published = std::mem::take(&mut self.outbox);
        for event in published {
            let Self {
                world,
                sinks,
                outbox,
                commands,
                ..
            } = &mut *self;
            let mut ctx = SimContext::new(world, outbox, commands);
            for sink in sinks.iter_mut() {
                sink.on_collision(&event, &mut ctx);
            }
            self.last_events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::sim::layers;
    use crate::sim::shape::ColliderConfig;

    /// Binary-exact step so accumulator arithmetic has no rounding
    fn config() -> WorldConfig {
        WorldConfig {
            dt_fixed: 1.0 / 64.0,
            max_frame_delta: 0.5,
            ..WorldConfig::zero_gravity()
        }
    }

    fn colliding_pair(sim: &mut Simulation) -> (BodyId, BodyId) {
        let car = sim
            .register_body(
                &BodyConfig::dynamic(ColliderConfig::sphere(0.5), 1000.0)
                    .with_position(Vec3::new(-0.45, 0.0, 0.0))
                    .with_velocity(Vec3::X * 4.0)
                    .with_layer(layers::VEHICLE),
            )
            .unwrap();
        let wall = sim
            .register_body(
                &BodyConfig::fixed(ColliderConfig::cuboid(Vec3::new(0.5, 2.0, 2.0)))
                    .with_position(Vec3::new(0.5, 0.0, 0.0)),
            )
            .unwrap();
        (car, wall)
    }

    #[test]
    fn test_accumulator_steps() {
        let mut sim = Simulation::new(config()).unwrap();
        assert_eq!(sim.update(4.0 / 64.0), 4);
        assert_eq!(sim.world().frame(), 4);
        assert_eq!(sim.update(0.5 / 64.0), 0);
        assert!((sim.alpha() - 0.5).abs() < 1e-6);
        assert_eq!(sim.update(0.5 / 64.0), 1);
        assert_eq!(sim.alpha(), 0.0);
    }

    #[test]
    fn test_substep_cap_drops_time() {
        let mut sim = Simulation::new(WorldConfig {
            max_substeps: 2,
            ..config()
        })
        .unwrap();
        assert_eq!(sim.update(8.0 / 64.0), 2);
        assert_eq!(sim.alpha(), 0.0);
        assert_eq!(sim.stats().dropped_updates, 1);
    }

    #[test]
    fn test_delta_is_clamped() {
        let mut sim = Simulation::new(WorldConfig {
            max_frame_delta: 2.0 / 64.0,
            ..config()
        })
        .unwrap();
        assert_eq!(sim.update(10.0), 2);
        assert_eq!(sim.update(f32::NAN), 0);
    }

    #[test]
    fn test_pause_and_single_step() {
        let mut sim = Simulation::new(config()).unwrap();
        sim.pause();
        assert_eq!(sim.update(1.0 / 64.0), 0);
        sim.single_step();
        assert_eq!(sim.update(0.0), 1);
        assert_eq!(sim.update(1.0 / 64.0), 0);
        sim.resume();
        assert_eq!(sim.update(1.0 / 64.0), 1);
        assert_eq!(sim.world().frame(), 2);
    }

    #[test]
    fn test_hooks_run_in_order() {
        struct Recorder(Rc<RefCell<Vec<&'static str>>>);
        impl StepHooks for Recorder {
            fn on_pre_step(&mut self, _dt: f32, _ctx: &mut SimContext<'_>) {
                self.0.borrow_mut().push("pre");
            }
            fn on_post_step(&mut self, _dt: f32, _ctx: &mut SimContext<'_>) {
                self.0.borrow_mut().push("post");
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sim = Simulation::new(config()).unwrap();
        sim.add_hooks(Box::new(Recorder(log.clone())));
        let sink_log = log.clone();
        sim.on_collision(move |_event, _ctx| sink_log.borrow_mut().push("collision"));
        colliding_pair(&mut sim);

        sim.step();
        assert_eq!(*log.borrow(), vec!["pre", "collision", "post"]);
    }

    #[test]
    fn test_layer_sink_gets_self_first() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut sim = Simulation::new(config()).unwrap();
        let (car, wall) = colliding_pair(&mut sim);
        let recorded = seen.clone();
        sim.on_layer_collision(layers::VEHICLE, move |_event, me, other, _ctx| {
            recorded.borrow_mut().push((me, other));
        });

        sim.step();
        assert_eq!(*seen.borrow(), vec![(car, wall)]);
    }

    #[test]
    fn test_sink_commands_apply_next_step() {
        let mut sim = Simulation::new(config()).unwrap();
        let (car, _wall) = colliding_pair(&mut sim);
        sim.on_collision(move |event, ctx| {
            if event.involves(car) {
                ctx.enqueue(Command::Remove(car));
                ctx.enqueue(Command::Wake(BodyId(999)));
            }
        });

        sim.step();
        assert!(sim.world().body(car).is_some());
        sim.step();
        assert!(sim.world().body(car).is_none());
        assert_eq!(sim.stats().failed_commands, 1);
    }

    #[test]
    fn test_published_events_reach_global_sinks() {
        let count = Rc::new(RefCell::new(0));
        let mut sim = Simulation::new(config()).unwrap();
        colliding_pair(&mut sim);
        sim.on_collision(|event, ctx| {
            if !event.sensor {
                let mut echo = event.clone();
                echo.sensor = true;
                ctx.publish_event(echo);
            }
        });
        let counted = count.clone();
        sim.on_collision(move |_event, _ctx| *counted.borrow_mut() += 1);

        sim.step();
        assert_eq!(*count.borrow(), 2);
        assert_eq!(sim.last_events().len(), 2);
    }

    #[test]
    fn test_context_queries() {
        let mut sim = Simulation::new(config()).unwrap();
        let (car, _) = colliding_pair(&mut sim);
        let poses = Rc::new(RefCell::new(Vec::new()));
        let out = poses.clone();
        sim.on_collision(move |_event, ctx| {
            out.borrow_mut().push(ctx.query_body_pose(car).map(|p| p.position.x));
            out.borrow_mut().push(ctx.query_body_pose(BodyId(77)).map(|p| p.position.x));
        });
        sim.step();
        let poses = poses.borrow();
        assert!(poses[0].is_ok());
        assert!(poses[1].is_err());
    }
}
