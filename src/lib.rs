//! Crash Physics - rigid-body core for a vehicle crash simulation
//!
//! Core modules:
//! - `sim`: Deterministic simulation (bodies, spatial hash, collisions, solver, events)
//! - `config`: Typed configuration records per subsystem
//! - `error`: Error type returned by every fallible public API
//! - `persistence`: Versioned JSON snapshots of body state

pub mod config;
pub mod error;
pub mod persistence;
pub mod sim;

pub use config::{DamageConfig, SleepConfig, SolverConfig, SolverPreset, SpatialHashConfig, WorldConfig};
pub use error::{PhysicsError, PhysicsResult};

use glam::{Quat, Vec3};

/// Simulation defaults (SI units throughout)
pub mod consts {
    /// Fixed simulation timestep (240 Hz)
    pub const SIM_DT: f32 = 1.0 / 240.0;
    /// Maximum substeps per update to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 10;
    /// Wall-clock deltas are clamped to this before accumulation
    pub const MAX_FRAME_DELTA: f32 = 0.1;

    /// Standard gravity (m/s²)
    pub const GRAVITY: f32 = -9.81;
    /// Sea-level air density (kg/m³)
    pub const AIR_DENSITY: f32 = 1.225;
    /// Speed of sound in air (m/s), used for event audio delay
    pub const SPEED_OF_SOUND: f32 = 343.0;

    /// Guard for near-zero distances in normal computation
    pub const EPSILON: f32 = 1e-4;
    /// Tangential speeds below this get no friction impulse
    pub const FRICTION_EPSILON: f32 = 1e-3;

    /// Speed above which continuous collision detection kicks in (m/s)
    pub const CCD_THRESHOLD: f32 = 5.0;
    /// Minimum number of swept sub-samples
    pub const CCD_SAMPLES: u32 = 4;
    /// Upper bound for adaptive sub-samples
    pub const CCD_MAX_SAMPLES: u32 = 64;

    /// Default broad-phase cell size (m)
    pub const CELL_SIZE: f32 = 4.0;
    /// Cell footprint above which a body is kept off the grid
    pub const MAX_CELLS_PER_BODY: u32 = 4096;

    /// Impacts below this force publish no event (N)
    pub const MIN_IMPACT_FORCE: f32 = 100.0;
    /// Force mapped to severity 1.0 (N)
    pub const MAX_IMPACT_FORCE: f32 = 5.0e5;

    /// Default RNG seed for stochastic damage annotation
    pub const DEFAULT_SEED: u64 = 0x5EED;
}

/// True when every component is finite
#[inline]
pub fn vec3_is_finite(v: Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

/// True when every component is finite
#[inline]
pub fn quat_is_finite(q: Quat) -> bool {
    q.x.is_finite() && q.y.is_finite() && q.z.is_finite() && q.w.is_finite()
}

/// Normalize, falling back to `fallback` for near-zero vectors
#[inline]
pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    let len = v.length();
    if len > consts::EPSILON { v / len } else { fallback }
}

/// Index (0, 1, 2) of the component with the largest magnitude
#[inline]
pub fn dominant_axis(v: Vec3) -> usize {
    let a = v.abs();
    if a.x >= a.y && a.x >= a.z {
        0
    } else if a.y >= a.z {
        1
    } else {
        2
    }
}

/// Unit vector along axis `axis` (0 = X, 1 = Y, 2 = Z)
#[inline]
pub fn axis_vector(axis: usize) -> Vec3 {
    match axis {
        0 => Vec3::X,
        1 => Vec3::Y,
        _ => Vec3::Z,
    }
}
