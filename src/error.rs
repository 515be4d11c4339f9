//! Error type for physics operations
//!
//! Every fallible public API returns `PhysicsResult<T>`. Nothing here is
//! thrown across callbacks: sinks only ever see validated events.

use thiserror::Error;

use crate::sim::BodyId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Collider descriptor carried a tag outside sphere|box|capsule|compound|vehicle
    #[error("unknown collider shape tag `{0}`")]
    UnknownShape(String),

    #[error("non-static body needs a positive finite mass (got {0})")]
    NonPositiveMass(f32),

    /// NaN or infinity in a vector, quaternion or scalar input
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("invalid material: {0}")]
    InvalidMaterial(String),

    #[error("invalid collider: {0}")]
    InvalidCollider(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The id was never registered or has been removed
    #[error("body {0} not found")]
    BodyNotFound(BodyId),

    #[error("body {0} is static and cannot be moved")]
    StaticBody(BodyId),

    #[error("zero-length vector in {0}")]
    ZeroLengthVector(&'static str),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

pub type PhysicsResult<T> = Result<T, PhysicsError>;

impl From<serde_json::Error> for PhysicsError {
    fn from(err: serde_json::Error) -> Self {
        PhysicsError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PhysicsError::UnknownShape("torus".into());
        assert_eq!(err.to_string(), "unknown collider shape tag `torus`");

        let err = PhysicsError::BodyNotFound(BodyId(7));
        assert_eq!(err.to_string(), "body #7 not found");
    }

    #[test]
    fn test_json_error_maps_to_config() {
        let err: PhysicsError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, PhysicsError::InvalidConfig(_)));
    }
}
