//! Opaque identifiers used across the sector MMO server.
//!
//! All entity identifiers are 128-bit values (`Uuid`), except sectors which
//! are small non-negative integers per the universe's logical addressing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sector is an integer node in the warp graph.
pub type SectorId = i64;

pub type CharacterId = Uuid;
pub type ShipId = Uuid;
pub type ShipDefinitionId = Uuid;
pub type CorporationId = Uuid;
pub type CombatId = Uuid;
pub type SalvageId = Uuid;
pub type PortId = Uuid;
pub type EventId = i64;

/// Caller-supplied or server-generated correlation token, echoed in every
/// event produced by the request it names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed namespace for hashing legacy display names into deterministic
/// version-5 UUIDs. Overridden by `SUPABASE_LEGACY_ID_NAMESPACE`.
pub const DEFAULT_LEGACY_ID_NAMESPACE: Uuid =
    Uuid::from_bytes([
        0x6e, 0x61, 0x6d, 0x65, 0x2d, 0x73, 0x70, 0x61, 0x63, 0x65, 0x2d, 0x6d, 0x6d, 0x6f, 0x5f,
        0x31,
    ]);

/// Hash a trimmed display name into a deterministic character id.
///
/// A migration concession: clients that still address
/// characters by name get a stable id, but two different-cased spellings of
/// the same name collide, matching `Character.display_name`'s
/// case-insensitive uniqueness invariant.
pub fn legacy_name_to_id(name: &str, namespace: Uuid) -> CharacterId {
    Uuid::new_v5(&namespace, name.trim().to_lowercase().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_id_is_deterministic_and_case_insensitive() {
        let a = legacy_name_to_id("Captain Zor", DEFAULT_LEGACY_ID_NAMESPACE);
        let b = legacy_name_to_id("captain zor", DEFAULT_LEGACY_ID_NAMESPACE);
        let c = legacy_name_to_id(" Captain Zor ", DEFAULT_LEGACY_ID_NAMESPACE);
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn legacy_id_differs_by_namespace() {
        let other_ns = Uuid::new_v4();
        let a = legacy_name_to_id("Captain Zor", DEFAULT_LEGACY_ID_NAMESPACE);
        let b = legacy_name_to_id("Captain Zor", other_ns);
        assert_ne!(a, b);
    }
}
