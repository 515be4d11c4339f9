//! Deterministic simulation module
//!
//! All physics lives here. This module must stay pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (body insertion order, sorted id pairs)
//! - No rendering or platform dependencies

pub mod body;
pub mod broad_phase;
pub mod ccd;
pub mod collision;
pub mod events;
pub mod layers;
pub mod math;
pub mod pool;
pub mod raycast;
pub mod shape;
pub mod solver;
pub mod spatial_hash;
pub mod tick;
pub mod world;

pub use body::{BodyConfig, BodyId, BodyKind, Material, RigidBody};
pub use broad_phase::{BroadPhaseOutput, CandidatePair};
pub use ccd::SweepHit;
pub use collision::{CollisionResult, collide_bodies, collide_shapes};
pub use events::{
    CollisionEvent, CollisionSink, DamageInfo, DamageZone, LayerCollisionSink, SimContext, StepHooks,
    classify_zone,
};
pub use math::{Aabb, BoundingSphere, Pose};
pub use pool::{Pool, PoolHandle};
pub use raycast::{RaycastHit, RaycastOptions};
pub use shape::{Collider, ColliderConfig, Shape, ShapeTag, VehicleColliderConfig, WorldShape};
pub use solver::{Contact, ContactKind};
pub use spatial_hash::{CellKey, HierarchicalSpatialHash, SpatialHash, SpatialIndex};
pub use tick::Simulation;
pub use world::{Command, PhysicsStats, PhysicsWorld};
