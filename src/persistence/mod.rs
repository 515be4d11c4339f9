//! Body-state snapshots
//!
//! Features:
//! - Versioned JSON envelope
//! - Plain-old-data per-body state, so a whole world can be compared (or
//!   hashed) as raw bytes

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};
use crate::sim::{BodyId, RigidBody};

/// Current envelope version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Pose and velocities of one body as plain floats
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct BodyState {
    pub position: [f32; 3],
    /// x, y, z, w
    pub orientation: [f32; 4],
    pub linear_velocity: [f32; 3],
    pub angular_velocity: [f32; 3],
}

impl BodyState {
    pub fn of(body: &RigidBody) -> Self {
        Self {
            position: body.position.to_array(),
            orientation: body.orientation.to_array(),
            linear_velocity: body.linear_velocity.to_array(),
            angular_velocity: body.angular_velocity.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_array(self.orientation)
    }

    pub fn linear_velocity(&self) -> Vec3 {
        Vec3::from_array(self.linear_velocity)
    }

    pub fn angular_velocity(&self) -> Vec3 {
        Vec3::from_array(self.angular_velocity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub id: BodyId,
    pub awake: bool,
    pub idle_time: f32,
    pub state: BodyState,
}

/// Versioned envelope around every body's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub version: u32,
    pub frame: u64,
    pub time: f64,
    pub gravity: Vec3,
    pub bodies: Vec<BodySnapshot>,
}

impl WorldSnapshot {
    pub fn to_json(&self) -> PhysicsResult<String> {
        serde_json::to_string(self).map_err(|e| PhysicsError::Snapshot(e.to_string()))
    }

    pub fn from_json(json: &str) -> PhysicsResult<Self> {
        let snapshot: WorldSnapshot =
            serde_json::from_str(json).map_err(|e| PhysicsError::Snapshot(e.to_string()))?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    pub fn check_version(&self) -> PhysicsResult<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(PhysicsError::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        Ok(())
    }

    /// Raw bytes of every body state, in body order
    pub fn state_bytes(&self) -> Vec<u8> {
        let states: Vec<BodyState> = self.bodies.iter().map(|b| b.state).collect();
        bytemuck::cast_slice(&states).to_vec()
    }
}

/// Raw pose bytes of a body list, for bit-exact comparisons between runs
pub fn pose_bytes<'a>(bodies: impl IntoIterator<Item = &'a RigidBody>) -> Vec<u8> {
    let states: Vec<BodyState> = bodies.into_iter().map(BodyState::of).collect();
    bytemuck::cast_slice(&states).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> WorldSnapshot {
        WorldSnapshot {
            version: SNAPSHOT_VERSION,
            frame: 12,
            time: 0.05,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            bodies: vec![BodySnapshot {
                id: BodyId(3),
                awake: true,
                idle_time: 0.0,
                state: BodyState {
                    position: [1.0, 2.0, 3.0],
                    orientation: [0.0, 0.0, 0.0, 1.0],
                    linear_velocity: [0.0, -1.0, 0.0],
                    angular_velocity: [0.0; 3],
                },
            }],
        }
    }

    #[test]
    fn test_json_envelope() {
        let snap = snapshot();
        let json = snap.to_json().unwrap();
        assert!(json.contains("\"version\":1"));
        assert_eq!(WorldSnapshot::from_json(&json).unwrap(), snap);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut snap = snapshot();
        snap.version = 99;
        let json = snap.to_json().unwrap();
        assert!(matches!(WorldSnapshot::from_json(&json), Err(PhysicsError::Snapshot(_))));
    }

    #[test]
    fn test_state_bytes_length() {
        assert_eq!(snapshot().state_bytes().len(), std::mem::size_of::<BodyState>());
        assert_eq!(std::mem::size_of::<BodyState>(), 13 * 4);
    }
}
