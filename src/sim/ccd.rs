//! Continuous collision detection by swept sub-samples
//!
//! Both bodies are slid linearly from `previous_position` to `position` and
//! the discrete narrow phase runs at each sample. Orientation is held at the
//! end-of-step value. The sample count adapts to how far the pair moves
//! relative to its thinnest primitives, so a thin wall cannot fall between
//! two samples.

use super::body::RigidBody;
use super::collision::{CollisionResult, collide_colliders};
use super::math::Pose;

/// First sampled overlap of a swept pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    pub contact: CollisionResult,
    /// Sample fraction of the step in (0, 1]
    pub fraction: f32,
    /// `fraction * dt`
    pub time_of_impact: f32,
    /// Body poses at the hit sample
    pub pose_a: Pose,
    pub pose_b: Pose,
}

/// Samples needed so neither body skips more than the pair's combined
/// thinnest extent between samples
pub fn sample_count(a: &RigidBody, b: &RigidBody, min_samples: u32, max_samples: u32) -> u32 {
    let travel = ((a.position - a.previous_position) - (b.position - b.previous_position)).length();
    let thickness = a.collider.min_extent() + b.collider.min_extent();
    if !(thickness > 0.0) || !travel.is_finite() {
        return max_samples.max(min_samples);
    }
    let needed = (travel / thickness).ceil() as u32;
    needed.clamp(min_samples, max_samples.max(min_samples))
}

/// Sample the pair across the step; returns the first overlapping sample
pub fn sweep(
    a: &RigidBody,
    b: &RigidBody,
    dt: f32,
    min_samples: u32,
    max_samples: u32,
) -> Option<SweepHit> {
    let samples = sample_count(a, b, min_samples, max_samples).max(1);
    for i in 1..=samples {
        let fraction = i as f32 / samples as f32;
        let pose_a = Pose::new(a.previous_position.lerp(a.position, fraction), a.orientation);
        let pose_b = Pose::new(b.previous_position.lerp(b.position, fraction), b.orientation);
        if let Some(contact) = collide_colliders(&a.collider, &pose_a, &b.collider, &pose_b) {
            return Some(SweepHit {
                contact,
                fraction,
                time_of_impact: fraction * dt,
                pose_a,
                pose_b,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::sim::body::{BodyConfig, BodyId};
    use crate::sim::shape::ColliderConfig;

    fn bullet(from: Vec3, to: Vec3) -> RigidBody {
        let mut body =
            RigidBody::from_config(BodyId(1), &BodyConfig::dynamic(ColliderConfig::sphere(0.1), 1.0))
                .unwrap();
        body.previous_position = from;
        body.position = to;
        body
    }

    fn thin_floor() -> RigidBody {
        RigidBody::from_config(
            BodyId(0),
            &BodyConfig::fixed(ColliderConfig::cuboid(Vec3::new(10.0, 0.01, 10.0))),
        )
        .unwrap()
    }

    #[test]
    fn test_sample_count_adapts_to_thickness() {
        let floor = thin_floor();
        let fast = bullet(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -2.25, 0.0));
        // 3.25 / 0.11 rounds up to 30
        assert_eq!(sample_count(&floor, &fast, 4, 64), 30);
        let slow = bullet(Vec3::ZERO, Vec3::new(0.0, -0.1, 0.0));
        assert_eq!(sample_count(&floor, &slow, 4, 64), 4);
    }

    #[test]
    fn test_sweep_catches_thin_floor() {
        let floor = thin_floor();
        let fast = bullet(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -2.25, 0.0));
        let hit = sweep(&floor, &fast, 1.0 / 60.0, 4, 64).unwrap();
        assert!(hit.fraction > 0.0 && hit.fraction <= 1.0);
        assert!((hit.time_of_impact - hit.fraction / 60.0).abs() < 1e-7);
        assert!(hit.pose_b.position.y > -0.11 && hit.pose_b.position.y < 0.11);
        // floor -> bullet
        assert_eq!(hit.contact.normal, Vec3::Y);
    }

    #[test]
    fn test_sweep_misses_without_crossing() {
        let floor = thin_floor();
        let rising = bullet(Vec3::new(0.0, 0.5, 0.0), Vec3::new(0.0, 4.0, 0.0));
        assert!(sweep(&floor, &rising, 1.0 / 60.0, 4, 64).is_none());
    }
}
