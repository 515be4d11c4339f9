//! Broad phase: candidate pairs from the spatial index
//!
//! Pairs come out of the index already deduplicated. Pairs where neither
//! body can move are dropped while enumerating; the layer filter and a
//! bounding-sphere reject run afterwards, so every pair that shares a cell
//! is counted as a broad-phase check.

use std::collections::HashMap;

use super::body::{BodyId, RigidBody};
use super::layers;
use super::spatial_hash::SpatialIndex;

/// Pair handed to the narrow phase (indices into the body list)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidatePair {
    pub a: usize,
    pub b: usize,
    /// Either body is above the CCD threshold; use the swept test
    pub swept: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BroadPhaseOutput {
    pub pairs: Vec<CandidatePair>,
    /// Pairs that survived the activity predicate
    pub checks: u32,
    pub layer_rejected: u32,
    pub sphere_rejected: u32,
}

/// At least one side must be able to move. Rejects static/static,
/// sleeping/sleeping and static/sleeping pairs.
#[inline]
pub fn should_test(a: &RigidBody, b: &RigidBody) -> bool {
    a.is_active() || b.is_active()
}

/// Group/mask test for a body pair
#[inline]
pub fn layers_allow(a: &RigidBody, b: &RigidBody) -> bool {
    layers::groups_collide(a.group, a.mask, b.group, b.mask)
}

/// Collect narrow-phase candidates in body-id order
pub fn find_pairs(
    index: &SpatialIndex,
    bodies: &[RigidBody],
    slots: &HashMap<BodyId, usize>,
    ccd_threshold: Option<f32>,
) -> BroadPhaseOutput {
    let mut output = BroadPhaseOutput::default();

    let pairs = index.enumerate_pairs(|a, b| match (slots.get(&a), slots.get(&b)) {
        (Some(&ia), Some(&ib)) => should_test(&bodies[ia], &bodies[ib]),
        _ => false,
    });

    for (id_a, id_b) in pairs {
        let (Some(&ia), Some(&ib)) = (slots.get(&id_a), slots.get(&id_b)) else {
            continue;
        };
        output.checks += 1;
        let (a, b) = (&bodies[ia], &bodies[ib]);

        if !layers_allow(a, b) {
            output.layer_rejected += 1;
            continue;
        }

        let swept = ccd_threshold.is_some_and(|t| a.speed() > t || b.speed() > t);
        if !swept && !a.bounding_sphere.overlaps(&b.bounding_sphere) {
            output.sphere_rejected += 1;
            continue;
        }

        output.pairs.push(CandidatePair { a: ia, b: ib, swept });
    }

    log::trace!(
        "broad phase: {} checks, {} layer rejects, {} sphere rejects, {} candidates",
        output.checks,
        output.layer_rejected,
        output.sphere_rejected,
        output.pairs.len()
    );
    output
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::config::SpatialHashConfig;
    use crate::sim::body::BodyConfig;
    use crate::sim::shape::ColliderConfig;

    fn setup(configs: &[BodyConfig]) -> (SpatialIndex, Vec<RigidBody>, HashMap<BodyId, usize>) {
        let mut index = SpatialIndex::from_config(&SpatialHashConfig::default());
        let mut bodies = Vec::new();
        let mut slots = HashMap::new();
        for (i, config) in configs.iter().enumerate() {
            let body = RigidBody::from_config(BodyId(i as u32), config).unwrap();
            index.insert(body.id, &body.aabb);
            slots.insert(body.id, i);
            bodies.push(body);
        }
        (index, bodies, slots)
    }

    #[test]
    fn test_static_pairs_never_tested() {
        let ground = BodyConfig::fixed(ColliderConfig::cuboid(Vec3::new(5.0, 0.5, 5.0)));
        let wall = BodyConfig::fixed(ColliderConfig::cuboid(Vec3::ONE)).with_position(Vec3::Y);
        let (index, bodies, slots) = setup(&[ground, wall]);
        let output = find_pairs(&index, &bodies, &slots, None);
        assert_eq!(output.checks, 0);
        assert!(output.pairs.is_empty());
    }

    #[test]
    fn test_layer_mask_rejects_debris() {
        let a = BodyConfig::dynamic(ColliderConfig::sphere(0.5), 1.0).with_layer(layers::DEBRIS);
        let b = BodyConfig::dynamic(ColliderConfig::sphere(0.5), 1.0)
            .with_layer(layers::DEBRIS)
            .with_position(Vec3::new(0.5, 0.0, 0.0));
        let (index, bodies, slots) = setup(&[a, b]);
        let output = find_pairs(&index, &bodies, &slots, None);
        assert_eq!(output.checks, 1);
        assert_eq!(output.layer_rejected, 1);
        assert!(output.pairs.is_empty());
    }

    #[test]
    fn test_sphere_reject_skipped_for_swept_pairs() {
        let a = BodyConfig::dynamic(ColliderConfig::sphere(0.2), 1.0);
        let b = BodyConfig::dynamic(ColliderConfig::sphere(0.2), 1.0)
            .with_position(Vec3::new(2.0, 0.0, 0.0))
            .with_velocity(Vec3::new(-50.0, 0.0, 0.0));
        let (index, bodies, slots) = setup(&[a, b]);

        let discrete = find_pairs(&index, &bodies, &slots, None);
        assert_eq!(discrete.sphere_rejected, 1);

        let swept = find_pairs(&index, &bodies, &slots, Some(5.0));
        assert_eq!(swept.pairs, vec![CandidatePair { a: 0, b: 1, swept: true }]);
    }
}
