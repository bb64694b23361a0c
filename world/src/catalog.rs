//! Built-in `ShipDefinition` catalog.
//!
//! The data model defines the shape of `ShipDefinition` but not its
//! contents; `ship_purchase` trade-in math and the boundary tests need
//! concrete numbers, so a small closed catalog is seeded here.

use uuid::Uuid;

use crate::model::ShipDefinition;

/// Deterministic id for a catalog entry, so repeated seeding is idempotent
/// and tests can reference a definition by name without a lookup round-trip.
fn catalog_id(name: &str) -> Uuid {
    const CATALOG_NAMESPACE: Uuid = Uuid::from_bytes([
        0x63, 0x61, 0x74, 0x61, 0x6c, 0x6f, 0x67, 0x2d, 0x73, 0x68, 0x69, 0x70, 0x2d, 0x64, 0x65,
        0x66,
    ]);
    Uuid::new_v5(&CATALOG_NAMESPACE, name.as_bytes())
}

pub fn kestrel_courier() -> ShipDefinition {
    ShipDefinition {
        id: catalog_id("kestrel_courier"),
        display_name: "Kestrel Courier".to_string(),
        warp_cost_per_jump: 1,
        max_warp_power: 250,
        max_shields: 50,
        max_fighters: 25,
        cargo_holds: 40,
        purchase_price: 2_500,
        is_escape_pod: false,
    }
}

pub fn talon_frigate() -> ShipDefinition {
    ShipDefinition {
        id: catalog_id("talon_frigate"),
        display_name: "Talon Frigate".to_string(),
        warp_cost_per_jump: 2,
        max_warp_power: 400,
        max_shields: 150,
        max_fighters: 120,
        cargo_holds: 60,
        purchase_price: 18_000,
        is_escape_pod: false,
    }
}

pub fn dreadnought_bulwark() -> ShipDefinition {
    ShipDefinition {
        id: catalog_id("dreadnought_bulwark"),
        display_name: "Dreadnought Bulwark".to_string(),
        warp_cost_per_jump: 4,
        max_warp_power: 800,
        max_shields: 500,
        max_fighters: 400,
        cargo_holds: 120,
        purchase_price: 90_000,
        is_escape_pod: false,
    }
}

/// Unsinkable bare-bones hull every destroyed character is rebound to when
/// their last ship was already an escape pod and can't be degraded further.
pub fn bare_escape_pod() -> ShipDefinition {
    ShipDefinition {
        id: catalog_id("bare_escape_pod"),
        display_name: "Escape Pod".to_string(),
        warp_cost_per_jump: 1,
        max_warp_power: 50,
        max_shields: 0,
        max_fighters: 0,
        cargo_holds: 5,
        purchase_price: 0,
        is_escape_pod: true,
    }
}

pub fn all() -> Vec<ShipDefinition> {
    vec![
        kestrel_courier(),
        talon_frigate(),
        dreadnought_bulwark(),
        bare_escape_pod(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_stable_across_calls() {
        assert_eq!(kestrel_courier().id, kestrel_courier().id);
    }

    #[test]
    fn only_escape_pod_has_no_offense() {
        for def in all() {
            if def.is_escape_pod {
                assert_eq!(def.max_fighters, 0);
            }
        }
    }
}
