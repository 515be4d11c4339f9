//! Crash Physics headless demo
//!
//! Two vehicles drive head-on across a ground slab, through a trigger gate,
//! and into each other. Collision events are logged as they happen and the
//! final statistics are printed as JSON. Pass a world config JSON path as
//! the first argument to override the defaults.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Quat, Vec3};

use crash_physics::sim::{BodyConfig, ColliderConfig, CollisionEvent, Simulation, layers};
use crash_physics::{PhysicsResult, WorldConfig};

/// Simulated seconds
const DURATION: f32 = 4.0;
/// Wall-clock frame delta fed to the accumulator
const FRAME_DELTA: f32 = 1.0 / 60.0;

fn main() {
    env_logger::init();
    log::info!("Crash Physics demo starting...");

    if let Err(err) = run() {
        log::error!("Demo failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> PhysicsResult<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => WorldConfig::load(path)?,
        None => WorldConfig::default(),
    };
    let mut sim = Simulation::new(config)?;

    sim.register_body(
        &BodyConfig::fixed(ColliderConfig::cuboid(Vec3::new(50.0, 0.5, 50.0)))
            .with_position(Vec3::new(0.0, -0.5, 0.0))
            .with_material(0.1, 0.3),
    )?;

    let red = sim.register_body(
        &BodyConfig::dynamic(ColliderConfig::vehicle(), 1200.0)
            .with_position(Vec3::new(0.0, 0.86, -20.0))
            .with_velocity(Vec3::new(0.0, 0.0, 15.0))
            .with_material(0.2, 0.3)
            .with_drag(0.3, 2.2),
    )?;
    let blue = sim.register_body(
        &BodyConfig::dynamic(ColliderConfig::vehicle(), 1500.0)
            .with_position(Vec3::new(0.3, 0.86, 20.0))
            .with_orientation(Quat::from_rotation_y(std::f32::consts::PI))
            .with_velocity(Vec3::new(0.0, 0.0, -15.0))
            .with_material(0.2, 0.3)
            .with_drag(0.3, 2.4),
    )?;

    sim.register_body(
        &BodyConfig::fixed(ColliderConfig::cuboid(Vec3::new(3.0, 2.0, 0.25)))
            .with_position(Vec3::new(0.0, 2.0, -10.0))
            .with_layer(layers::TRIGGER),
    )?;

    for i in 0..6 {
        sim.register_body(
            &BodyConfig::dynamic(ColliderConfig::sphere(0.15), 2.0)
                .with_position(Vec3::new(4.0 + i as f32 * 0.2, 1.0 + i as f32 * 0.35, 0.0))
                .with_layer(layers::DEBRIS),
        )?;
    }

    let crashes = Rc::new(RefCell::new(Vec::<CollisionEvent>::new()));
    let recorded = crashes.clone();
    sim.on_collision(move |event, ctx| {
        if event.sensor {
            log::debug!("{} / {} sensor contact at t={:.3}s", event.body_a, event.body_b, ctx.time());
            return;
        }
        if event.damage.is_empty() {
            return;
        }
        for damage in &event.damage {
            log::info!(
                "{} hit in {} (severity {:.2}, {:.0} N): {:?}",
                damage.vehicle,
                damage.zone.as_str(),
                damage.severity,
                event.impact_force,
                damage.components
            );
        }
        recorded.borrow_mut().push(event.clone());
    });
    sim.on_layer_collision(layers::TRIGGER, |event, gate, vehicle, _ctx| {
        log::debug!("Gate {} touched by {} at {:?}", gate, vehicle, event.point);
    });

    let frames = (DURATION / FRAME_DELTA).round() as u32;
    for _ in 0..frames {
        sim.update(FRAME_DELTA);
    }

    for id in [red, blue] {
        let pose = sim.query_body_pose(id)?;
        log::info!("{} ends at {:?}", id, pose.position);
    }
    log::info!("{} damaging impacts recorded", crashes.borrow().len());

    let stats = serde_json::to_string_pretty(sim.stats())?;
    println!("{stats}");

    sim.dispose();
    Ok(())
}
