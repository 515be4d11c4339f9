//! Typed configuration records
//!
//! One record per subsystem. All of them deserialize with defaults filled
//! in, so a JSON file only needs the fields it wants to override.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{PhysicsError, PhysicsResult};
use crate::sim::DamageZone;
use crate::vec3_is_finite;

/// Solver quality levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SolverPreset {
    Fast,
    #[default]
    Balanced,
    Precise,
}

impl SolverPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverPreset::Fast => "Fast",
            SolverPreset::Balanced => "Balanced",
            SolverPreset::Precise => "Precise",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fast" => Some(SolverPreset::Fast),
            "balanced" | "default" => Some(SolverPreset::Balanced),
            "precise" | "high" => Some(SolverPreset::Precise),
            _ => None,
        }
    }

    /// Velocity iterations for this preset
    pub fn solver_iterations(&self) -> u32 {
        match self {
            SolverPreset::Fast => 4,
            SolverPreset::Balanced => 10,
            SolverPreset::Precise => 20,
        }
    }

    /// Position correction passes for this preset
    pub fn position_iterations(&self) -> u32 {
        match self {
            SolverPreset::Fast => 1,
            SolverPreset::Balanced => 3,
            SolverPreset::Precise => 5,
        }
    }
}

/// Sequential-impulse solver and Baumgarte correction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Velocity passes over the contact list
    pub iterations: u32,
    /// Position correction passes
    pub position_iterations: u32,
    /// Fraction of (penetration - slop) removed per correction pass
    pub baumgarte_percent: f32,
    /// Penetration tolerated without correction (m)
    pub slop: f32,
    /// Approach speed below which restitution is ignored (m/s)
    pub restitution_threshold: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::from_preset(SolverPreset::Balanced)
    }
}

impl SolverConfig {
    pub fn from_preset(preset: SolverPreset) -> Self {
        Self {
            iterations: preset.solver_iterations(),
            position_iterations: preset.position_iterations(),
            baumgarte_percent: 0.2,
            slop: 0.01,
            restitution_threshold: 1.0,
        }
    }

    pub fn validate(&self) -> PhysicsResult<()> {
        if self.iterations == 0 {
            return Err(PhysicsError::InvalidConfig("solver iterations must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&self.baumgarte_percent) {
            return Err(PhysicsError::InvalidConfig(format!(
                "baumgarte percent {} outside [0, 1]",
                self.baumgarte_percent
            )));
        }
        if !(self.slop >= 0.0 && self.slop.is_finite()) {
            return Err(PhysicsError::InvalidConfig(format!("slop {} must be >= 0", self.slop)));
        }
        if !(self.restitution_threshold >= 0.0) {
            return Err(PhysicsError::InvalidConfig("restitution threshold must be >= 0".into()));
        }
        Ok(())
    }
}

/// Sleep thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepConfig {
    pub enabled: bool,
    /// Linear speed below which a body counts as idle (m/s)
    pub linear_threshold: f32,
    /// Angular speed below which a body counts as idle (rad/s)
    pub angular_threshold: f32,
    /// Continuous idle time before the body falls asleep (s)
    pub time_to_sleep: f32,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            linear_threshold: 0.08,
            angular_threshold: 0.1,
            time_to_sleep: 0.5,
        }
    }
}

/// Broad-phase grid parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialHashConfig {
    /// Edge length of the base cell (m)
    pub cell_size: f32,
    /// Number of levels; 1 selects the flat hash, more selects the hierarchy
    /// with cell sizes `cell_size * 2^i`
    pub levels: u32,
    /// Bodies overlapping more base cells than this skip the grid and are
    /// paired against everything instead
    pub max_cells_per_body: u32,
}

impl Default for SpatialHashConfig {
    fn default() -> Self {
        Self {
            cell_size: CELL_SIZE,
            levels: 1,
            max_cells_per_body: MAX_CELLS_PER_BODY,
        }
    }
}

impl SpatialHashConfig {
    pub fn validate(&self) -> PhysicsResult<()> {
        if !(self.cell_size > 0.0 && self.cell_size.is_finite()) {
            return Err(PhysicsError::InvalidConfig(format!(
                "cell size {} must be positive",
                self.cell_size
            )));
        }
        if self.levels == 0 || self.levels > 16 {
            return Err(PhysicsError::InvalidConfig(format!(
                "hierarchy levels {} outside 1..=16",
                self.levels
            )));
        }
        if self.max_cells_per_body == 0 {
            return Err(PhysicsError::InvalidConfig(
                "max cells per body must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Vehicle-local thresholds that map an impact point to a zone.
/// Checked in order: front, rear, right, left, top, bottom, else center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneThresholds {
    pub front_z: f32,
    pub rear_z: f32,
    pub right_x: f32,
    pub left_x: f32,
    pub top_y: f32,
    pub bottom_y: f32,
}

impl Default for ZoneThresholds {
    fn default() -> Self {
        Self {
            front_z: 1.0,
            rear_z: -1.0,
            right_x: 0.5,
            left_x: -0.5,
            top_y: 0.5,
            bottom_y: 0.0,
        }
    }
}

/// Component tags that can be affected by a hit in each zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneComponents {
    pub front: Vec<String>,
    pub rear: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub top: Vec<String>,
    pub bottom: Vec<String>,
    pub center: Vec<String>,
}

fn tags(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for ZoneComponents {
    fn default() -> Self {
        Self {
            front: tags(&["bumper_front", "hood", "radiator", "headlight_left", "headlight_right"]),
            rear: tags(&["bumper_rear", "trunk", "taillight_left", "taillight_right", "exhaust"]),
            left: tags(&["door_front_left", "door_rear_left", "mirror_left", "fender_left"]),
            right: tags(&["door_front_right", "door_rear_right", "mirror_right", "fender_right"]),
            top: tags(&["roof", "windshield"]),
            bottom: tags(&["undercarriage", "oil_pan"]),
            center: tags(&["chassis"]),
        }
    }
}

impl ZoneComponents {
    pub fn for_zone(&self, zone: DamageZone) -> &[String] {
        match zone {
            DamageZone::Front => &self.front,
            DamageZone::Rear => &self.rear,
            DamageZone::Left => &self.left,
            DamageZone::Right => &self.right,
            DamageZone::Top => &self.top,
            DamageZone::Bottom => &self.bottom,
            DamageZone::Center => &self.center,
        }
    }
}

/// Event publishing and damage annotation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageConfig {
    /// Contacts below this impact force publish nothing (N)
    pub min_impact_force: f32,
    /// Impact force that maps to severity 1.0 (N)
    pub max_impact_force: f32,
    pub zones: ZoneThresholds,
    pub components: ZoneComponents,
    /// Per-component inclusion probability is `severity * scale`, clamped to 1
    pub component_probability_scale: f32,
    /// Deformation depth at severity 1.0 (m)
    pub max_deformation: f32,
    /// Listener position for audio delay; `None` disables the field
    pub listener: Option<Vec3>,
    pub speed_of_sound: f32,
}

impl Default for DamageConfig {
    fn default() -> Self {
        Self {
            min_impact_force: MIN_IMPACT_FORCE,
            max_impact_force: MAX_IMPACT_FORCE,
            zones: ZoneThresholds::default(),
            components: ZoneComponents::default(),
            component_probability_scale: 1.0,
            max_deformation: 0.25,
            listener: None,
            speed_of_sound: SPEED_OF_SOUND,
        }
    }
}

impl DamageConfig {
    pub fn validate(&self) -> PhysicsResult<()> {
        if !(self.min_impact_force >= 0.0) {
            return Err(PhysicsError::InvalidConfig("min impact force must be >= 0".into()));
        }
        if !(self.max_impact_force > 0.0 && self.max_impact_force.is_finite()) {
            return Err(PhysicsError::InvalidConfig("max impact force must be positive".into()));
        }
        if !(self.speed_of_sound > 0.0) {
            return Err(PhysicsError::InvalidConfig("speed of sound must be positive".into()));
        }
        if let Some(listener) = self.listener {
            if !vec3_is_finite(listener) {
                return Err(PhysicsError::NonFinite("listener position"));
            }
        }
        Ok(())
    }
}

/// Top-level world configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Fixed step (s)
    pub dt_fixed: f32,
    pub max_substeps: u32,
    /// Wall-clock deltas are clamped to this (s)
    pub max_frame_delta: f32,
    pub gravity: Vec3,
    pub air_density: f32,

    // === Continuous collision ===
    pub ccd_enabled: bool,
    /// Strictly faster bodies take the swept path (m/s)
    pub ccd_threshold: f32,
    pub ccd_samples: u32,
    pub ccd_max_samples: u32,

    // === Pools ===
    pub contact_pool_capacity: usize,
    pub event_pool_capacity: usize,

    /// Seed for the stochastic damage annotation
    pub seed: u64,

    pub spatial_hash: SpatialHashConfig,
    pub solver: SolverConfig,
    pub sleep: SleepConfig,
    pub damage: DamageConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            dt_fixed: SIM_DT,
            max_substeps: MAX_SUBSTEPS,
            max_frame_delta: MAX_FRAME_DELTA,
            gravity: Vec3::new(0.0, GRAVITY, 0.0),
            air_density: AIR_DENSITY,

            ccd_enabled: true,
            ccd_threshold: CCD_THRESHOLD,
            ccd_samples: CCD_SAMPLES,
            ccd_max_samples: CCD_MAX_SAMPLES,

            contact_pool_capacity: 256,
            event_pool_capacity: 64,

            seed: DEFAULT_SEED,

            spatial_hash: SpatialHashConfig::default(),
            solver: SolverConfig::default(),
            sleep: SleepConfig::default(),
            damage: DamageConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Zero-gravity config, handy for isolated collision setups
    pub fn zero_gravity() -> Self {
        Self {
            gravity: Vec3::ZERO,
            ..Self::default()
        }
    }

    /// Apply a solver preset (only the iteration counts change)
    pub fn apply_preset(&mut self, preset: SolverPreset) {
        self.solver.iterations = preset.solver_iterations();
        self.solver.position_iterations = preset.position_iterations();
    }

    pub fn validate(&self) -> PhysicsResult<()> {
        if !(self.dt_fixed > 0.0 && self.dt_fixed.is_finite()) {
            return Err(PhysicsError::InvalidConfig(format!(
                "dt_fixed {} must be positive",
                self.dt_fixed
            )));
        }
        if self.max_substeps == 0 {
            return Err(PhysicsError::InvalidConfig("max_substeps must be >= 1".into()));
        }
        if !(self.max_frame_delta > 0.0) {
            return Err(PhysicsError::InvalidConfig("max_frame_delta must be positive".into()));
        }
        if !vec3_is_finite(self.gravity) {
            return Err(PhysicsError::NonFinite("gravity"));
        }
        if !(self.air_density >= 0.0) {
            return Err(PhysicsError::InvalidConfig("air density must be >= 0".into()));
        }
        if !(self.ccd_threshold >= 0.0) {
            return Err(PhysicsError::InvalidConfig("ccd threshold must be >= 0".into()));
        }
        if self.ccd_samples == 0 || self.ccd_max_samples < self.ccd_samples {
            return Err(PhysicsError::InvalidConfig(format!(
                "ccd samples {}..{} invalid",
                self.ccd_samples, self.ccd_max_samples
            )));
        }
        self.spatial_hash.validate()?;
        self.solver.validate()?;
        self.damage.validate()?;
        Ok(())
    }

    pub fn from_json(json: &str) -> PhysicsResult<Self> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> PhysicsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> PhysicsResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PhysicsError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded world config from {}", path.display());
        Ok(config)
    }
}
