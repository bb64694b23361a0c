//! Shortest-path BFS over the warp graph.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use sector_mmo_common::errors::SectorError;
use sector_mmo_common::ids::SectorId;
use sector_mmo_world::WorldStore;

pub type SectorResult<T> = Result<T, SectorError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResult {
    pub path: Vec<SectorId>,
    pub distance: u32,
}

/// Pure algorithmic layer over `WorldStore`'s sector adjacency. Holds no
/// state of its own beyond a per-call adjacency cache; see
/// `VisibilityResolver` for the one genuinely stateful piece of this crate.
pub struct SectorGraph {
    world: Arc<dyn WorldStore>,
}

impl SectorGraph {
    pub fn new(world: Arc<dyn WorldStore>) -> Self {
        Self { world }
    }

    async fn adjacency_cached(
        &self,
        cache: &mut HashMap<SectorId, Vec<SectorId>>,
        sector_id: SectorId,
    ) -> SectorResult<Vec<SectorId>> {
        if let Some(hit) = cache.get(&sector_id) {
            return Ok(hit.clone());
        }
        let neighbors = self
            .world
            .sector_adjacency(sector_id)
            .await
            .map_err(|_| SectorError::SectorNotFound(sector_id))?;
        cache.insert(sector_id, neighbors.clone());
        Ok(neighbors)
    }

    /// BFS shortest path; ties among neighbors are broken by ascending id so
    /// results are deterministic and `shortestPath(A,B)` reversed equals
    /// `shortestPath(B,A)` when every edge is two-way.
    pub async fn shortest_path(&self, from: SectorId, to: SectorId) -> SectorResult<PathResult> {
        if from == to {
            return Ok(PathResult {
                path: vec![from],
                distance: 0,
            });
        }
        let mut cache = HashMap::new();
        let mut visited: HashMap<SectorId, SectorId> = HashMap::new();
        let mut queue = VecDeque::new();
        visited.insert(from, from);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            let mut neighbors = self.adjacency_cached(&mut cache, current).await?;
            neighbors.sort_unstable();
            for next in neighbors {
                if visited.contains_key(&next) {
                    continue;
                }
                visited.insert(next, current);
                if next == to {
                    return Ok(PathResult {
                        path: reconstruct(&visited, from, to),
                        distance: path_distance(&visited, from, to),
                    });
                }
                queue.push_back(next);
            }
        }
        Err(SectorError::PathNotFound { from, to })
    }
}

fn reconstruct(
    visited: &HashMap<SectorId, SectorId>,
    from: SectorId,
    to: SectorId,
) -> Vec<SectorId> {
    let mut path = vec![to];
    let mut current = to;
    while current != from {
        current = visited[&current];
        path.push(current);
    }
    path.reverse();
    path
}

fn path_distance(visited: &HashMap<SectorId, SectorId>, from: SectorId, to: SectorId) -> u32 {
    let mut distance = 0;
    let mut current = to;
    while current != from {
        current = visited[&current];
        distance += 1;
    }
    distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use sector_mmo_world::model::{Sector, WarpEdge};
    use sector_mmo_world::MemoryWorldStore;

    fn edge(to: SectorId) -> WarpEdge {
        WarpEdge {
            to,
            two_way: true,
            hyperlane: false,
        }
    }

    fn seed_line(store: &MemoryWorldStore, nodes: &[SectorId]) {
        for window in nodes.windows(2) {
            let (a, b) = (window[0], window[1]);
            store.seed_sector(Sector {
                id: a,
                x: a,
                y: 0,
                region_tag: "core".into(),
                edges: vec![edge(b)],
            });
        }
        // ensure terminal node exists even with no outgoing edge recorded yet
        if let Some(&last) = nodes.last() {
            store.seed_sector(Sector {
                id: last,
                x: last,
                y: 0,
                region_tag: "core".into(),
                edges: nodes
                    .windows(2)
                    .rev()
                    .find(|w| w[1] == last)
                    .map(|w| vec![edge(w[0])])
                    .unwrap_or_default(),
            });
        }
    }

    #[tokio::test]
    async fn shortest_path_reverses_symmetrically() {
        let store = Arc::new(MemoryWorldStore::new());
        seed_line(&store, &[0, 1, 2, 3]);
        let graph = SectorGraph::new(store);

        let forward = graph.shortest_path(0, 3).await.unwrap();
        let backward = graph.shortest_path(3, 0).await.unwrap();

        let mut reversed_backward = backward.path.clone();
        reversed_backward.reverse();
        assert_eq!(forward.path, reversed_backward);
        assert_eq!(forward.distance, backward.distance);
    }

    #[tokio::test]
    async fn unreachable_sector_fails() {
        let store = Arc::new(MemoryWorldStore::new());
        store.seed_sector(Sector {
            id: 0,
            x: 0,
            y: 0,
            region_tag: "core".into(),
            edges: vec![],
        });
        store.seed_sector(Sector {
            id: 9,
            x: 9,
            y: 0,
            region_tag: "core".into(),
            edges: vec![],
        });
        let graph = SectorGraph::new(store);
        assert!(graph.shortest_path(0, 9).await.is_err());
    }
}
