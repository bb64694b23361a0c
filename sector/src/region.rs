//! BFS-bounded map regions and the map-knowledge upsert.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sector_mmo_common::errors::SectorError;
use sector_mmo_common::ids::SectorId;
use sector_mmo_world::model::{MapKnowledge, PortObservation, SectorMemory};
use sector_mmo_world::{SectorSnapshot, WorldStore};

use crate::graph::{PathResult, SectorResult};

/// A sector that has never been visited, included only because a visited
/// neighbor observed it across a lane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeenFromStub {
    pub sector_id: SectorId,
    pub seen_from: Vec<SectorId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitedNode {
    pub sector_id: SectorId,
    pub hops: u32,
    pub adjacent_sectors: Vec<SectorId>,
    pub position: (i64, i64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalMapRegion {
    pub visited: Vec<VisitedNode>,
    pub seen_from: Vec<SeenFromStub>,
}

/// BFS from `center` through only **visited** sectors (per `knowledge`) up
/// to `max_hops`, capped at `max_nodes` total emitted nodes. Unvisited
/// neighbors of visited nodes are recorded as `seen_from` stubs. Result is
/// sorted ascending by sector id.
pub fn local_map_region(
    knowledge: &MapKnowledge,
    center: SectorId,
    max_hops: u32,
    max_nodes: usize,
) -> LocalMapRegion {
    let mut visited_out = Vec::new();
    let mut seen_from: std::collections::HashMap<SectorId, HashSet<SectorId>> =
        std::collections::HashMap::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();

    if let Some(memory) = knowledge.sectors.get(&center) {
        queue.push_back((center, 0u32));
        seen.insert(center);
        visited_out.push(VisitedNode {
            sector_id: center,
            hops: 0,
            adjacent_sectors: memory.adjacent_sectors.clone(),
            position: memory.position,
        });
    }

    while let Some((current, hops)) = queue.pop_front() {
        if hops >= max_hops || visited_out.len() >= max_nodes {
            continue;
        }
        let Some(memory) = knowledge.sectors.get(&current) else {
            continue;
        };
        for &neighbor in &memory.adjacent_sectors {
            if let Some(next_memory) = knowledge.sectors.get(&neighbor) {
                if seen.insert(neighbor) && visited_out.len() < max_nodes {
                    visited_out.push(VisitedNode {
                        sector_id: neighbor,
                        hops: hops + 1,
                        adjacent_sectors: next_memory.adjacent_sectors.clone(),
                        position: next_memory.position,
                    });
                    queue.push_back((neighbor, hops + 1));
                }
            } else {
                seen_from.entry(neighbor).or_default().insert(current);
            }
        }
    }

    // a stub is dropped once the sector it names becomes a full visited node
    let visited_ids: HashSet<SectorId> = visited_out.iter().map(|v| v.sector_id).collect();
    let mut stubs: Vec<SeenFromStub> = seen_from
        .into_iter()
        .filter(|(id, _)| !visited_ids.contains(id))
        .map(|(sector_id, froms)| {
            let mut seen_from: Vec<SectorId> = froms.into_iter().collect();
            seen_from.sort_unstable();
            SeenFromStub { sector_id, seen_from }
        })
        .collect();

    visited_out.sort_by_key(|v| v.sector_id);
    stubs.sort_by_key(|s| s.sector_id);

    LocalMapRegion {
        visited: visited_out,
        seen_from: stubs,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathVisitedNode {
    pub sector_id: SectorId,
    pub snapshot: SectorSnapshot,
    pub adjacent_to_path_nodes: Vec<SectorId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRegionPayload {
    pub path: Vec<SectorId>,
    pub visited: Vec<PathVisitedNode>,
    pub seen_from: Vec<SeenFromStub>,
}

/// Anchors every sector on `path` at distance 0, then BFS's outward through
/// visited sectors within `region_hops`, embedding a full `SectorSnapshot`
/// for each visited node.
pub async fn path_region_payload(
    world: &Arc<dyn WorldStore>,
    knowledge: &MapKnowledge,
    path: PathResult,
    region_hops: u32,
    max_sectors: usize,
) -> SectorResult<PathRegionPayload> {
    let mut seen: HashSet<SectorId> = path.path.iter().copied().collect();
    let mut queue: VecDeque<(SectorId, u32)> = path.path.iter().map(|&s| (s, 0)).collect();
    let mut order: Vec<SectorId> = path.path.clone();
    let mut seen_from: std::collections::HashMap<SectorId, HashSet<SectorId>> =
        std::collections::HashMap::new();

    while let Some((current, hops)) = queue.pop_front() {
        if hops >= region_hops || order.len() >= max_sectors {
            continue;
        }
        let Some(memory) = knowledge.sectors.get(&current) else {
            continue;
        };
        for &neighbor in &memory.adjacent_sectors {
            if knowledge.sectors.contains_key(&neighbor) {
                if seen.insert(neighbor) && order.len() < max_sectors {
                    order.push(neighbor);
                    queue.push_back((neighbor, hops + 1));
                }
            } else {
                seen_from.entry(neighbor).or_default().insert(current);
            }
        }
    }

    let path_set: HashSet<SectorId> = path.path.iter().copied().collect();
    let mut visited = Vec::new();
    for &sector_id in &order {
        let snapshot = world
            .sector_snapshot(sector_id, None)
            .await
            .map_err(|_| SectorError::SectorNotFound(sector_id))?;
        let adjacent_to_path_nodes: Vec<SectorId> = if path_set.contains(&sector_id) {
            Vec::new()
        } else {
            snapshot
                .adjacent_sectors
                .iter()
                .copied()
                .filter(|n| path_set.contains(n))
                .collect()
        };
        visited.push(PathVisitedNode {
            sector_id,
            snapshot,
            adjacent_to_path_nodes,
        });
    }

    let visited_ids: HashSet<SectorId> = order.into_iter().collect();
    let mut stubs: Vec<SeenFromStub> = seen_from
        .into_iter()
        .filter(|(id, _)| !visited_ids.contains(id))
        .map(|(sector_id, froms)| {
            let mut seen_from: Vec<SectorId> = froms.into_iter().collect();
            seen_from.sort_unstable();
            SeenFromStub { sector_id, seen_from }
        })
        .collect();
    stubs.sort_by_key(|s| s.sector_id);

    Ok(PathRegionPayload {
        path: path.path,
        visited,
        seen_from: stubs,
    })
}

/// Idempotent map-knowledge upsert. Returns `true` iff this is the sector's
/// first recorded visit.
pub fn upsert_map_knowledge(
    knowledge: &mut MapKnowledge,
    sector_id: SectorId,
    adjacent: Vec<SectorId>,
    position: (i64, i64),
    timestamp: DateTime<Utc>,
    observed_port_code: Option<String>,
) -> bool {
    let first_visit = !knowledge.sectors.contains_key(&sector_id);
    let port_observed = observed_port_code.map(|code| PortObservation {
        code,
        observed_at: timestamp,
    });
    knowledge.sectors.insert(
        sector_id,
        SectorMemory {
            adjacent_sectors: adjacent,
            position,
            last_visited: timestamp,
            port_observed,
        },
    );
    knowledge.current_sector = Some(sector_id);
    if first_visit {
        knowledge.total_visited += 1;
    }
    first_visit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(adjacent: Vec<SectorId>, x: i64) -> SectorMemory {
        SectorMemory {
            adjacent_sectors: adjacent,
            position: (x, 0),
            last_visited: Utc::now(),
            port_observed: None,
        }
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut knowledge = MapKnowledge::default();
        let now = Utc::now();
        let first = upsert_map_knowledge(&mut knowledge, 1, vec![2], (1, 0), now, None);
        assert!(first);
        assert_eq!(knowledge.total_visited, 1);

        let second = upsert_map_knowledge(&mut knowledge, 1, vec![2], (1, 0), now, None);
        assert!(!second);
        assert_eq!(knowledge.total_visited, 1);
    }

    #[test]
    fn local_region_caps_at_max_nodes_and_sorts() {
        let mut knowledge = MapKnowledge::default();
        knowledge.sectors.insert(5, memory(vec![3, 7], 5));
        knowledge.sectors.insert(3, memory(vec![5], 3));
        knowledge.sectors.insert(7, memory(vec![5, 9], 7));
        knowledge.sectors.insert(9, memory(vec![7], 9));

        let region = local_map_region(&knowledge, 5, 10, 2);
        assert_eq!(region.visited.len(), 2);
        assert!(region.visited.windows(2).all(|w| w[0].sector_id < w[1].sector_id));
    }

    #[test]
    fn max_hops_zero_returns_only_center() {
        let mut knowledge = MapKnowledge::default();
        knowledge.sectors.insert(0, memory(vec![1], 0));
        knowledge.sectors.insert(1, memory(vec![0], 1));

        let region = local_map_region(&knowledge, 0, 0, 50);
        assert_eq!(region.visited.len(), 1);
        assert_eq!(region.visited[0].sector_id, 0);
    }
}
