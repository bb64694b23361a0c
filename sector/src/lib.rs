//! Warp-graph topology, BFS-bounded map regions, and recipient
//! computation for `SectorGraph` and `VisibilityResolver`.

pub mod graph;
pub mod region;
pub mod visibility;

pub use graph::{PathResult, SectorGraph, SectorResult};
pub use region::{
    local_map_region, path_region_payload, upsert_map_knowledge, LocalMapRegion,
    PathRegionPayload, PathVisitedNode, SeenFromStub, VisitedNode,
};
pub use visibility::{ResolvedRecipients, ScopedRecipient, VisibilityResolver};
