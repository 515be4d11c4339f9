//! Collision layers and the default collision matrix
//!
//! A body belongs to one layer (a single bit). Its `group` defaults to that
//! bit and its `mask` to the layer's row in the matrix below. A pair collides
//! only when `a.group & b.mask != 0 && b.group & a.mask != 0`.

pub const DEFAULT: u32 = 0x01;
pub const VEHICLE: u32 = 0x02;
pub const STATIC: u32 = 0x04;
pub const DESTRUCTIBLE: u32 = 0x08;
pub const TRIGGER: u32 = 0x10;
pub const DEBRIS: u32 = 0x20;

/// Every layer
pub const ALL: u32 = DEFAULT | VEHICLE | STATIC | DESTRUCTIBLE | TRIGGER | DEBRIS;

/// Default mask for a layer bit
pub fn default_mask(layer: u32) -> u32 {
    match layer {
        DEFAULT => DEFAULT | VEHICLE | STATIC | DESTRUCTIBLE | TRIGGER,
        // vehicles hit static, destructible, triggers and other vehicles
        VEHICLE => DEFAULT | VEHICLE | STATIC | DESTRUCTIBLE | TRIGGER,
        STATIC => DEFAULT | VEHICLE | DESTRUCTIBLE | DEBRIS,
        // destructibles never hit each other
        DESTRUCTIBLE => DEFAULT | VEHICLE | STATIC,
        TRIGGER => DEFAULT | VEHICLE,
        // debris only settles on static geometry
        DEBRIS => STATIC,
        _ => ALL,
    }
}

/// Symmetric group/mask test
#[inline]
pub fn groups_collide(group_a: u32, mask_a: u32, group_b: u32, mask_b: u32) -> bool {
    (group_a & mask_b) != 0 && (group_b & mask_a) != 0
}

/// Human-readable layer name (logging)
pub fn layer_name(layer: u32) -> &'static str {
    match layer {
        DEFAULT => "default",
        VEHICLE => "vehicle",
        STATIC => "static",
        DESTRUCTIBLE => "destructible",
        TRIGGER => "trigger",
        DEBRIS => "debris",
        _ => "custom",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collide(a: u32, b: u32) -> bool {
        groups_collide(a, default_mask(a), b, default_mask(b))
    }

    #[test]
    fn test_default_matrix() {
        assert!(collide(VEHICLE, VEHICLE));
        assert!(collide(VEHICLE, STATIC));
        assert!(collide(VEHICLE, DESTRUCTIBLE));
        assert!(collide(VEHICLE, TRIGGER));
        assert!(collide(DEBRIS, STATIC));
        assert!(!collide(DEBRIS, DEBRIS));
        assert!(!collide(DEBRIS, VEHICLE));
        assert!(!collide(DESTRUCTIBLE, DESTRUCTIBLE));
    }

    #[test]
    fn test_matrix_is_symmetric() {
        let layers = [DEFAULT, VEHICLE, STATIC, DESTRUCTIBLE, TRIGGER, DEBRIS];
        for &a in &layers {
            for &b in &layers {
                assert_eq!(collide(a, b), collide(b, a), "{} vs {}", layer_name(a), layer_name(b));
            }
        }
    }
}
