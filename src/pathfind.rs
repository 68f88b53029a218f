use crate::config::EngineConfig;
use crate::cutset::CutSet;
use crate::network::{Adjacency, Network, StationId};
use log::*;
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Breadth-first shortest path by hop count.
///
/// Returns `[start]` both when `start == end` and when `end` cannot be
/// reached; callers must check [`is_route`] before using the hop count.
pub fn shortest_path(
    network: &Network,
    start: &str,
    end: &str,
    cuts: Option<&CutSet>,
) -> Vec<StationId> {
    if start == end {
        return vec![start.to_string()];
    }
    let graph = network.adjacency(cuts);
    path_in(&graph, start, end).unwrap_or_else(|| {
        trace!("No path from {} to {}", start, end);
        vec![start.to_string()]
    })
}

fn path_in(graph: &Adjacency, start: &str, end: &str) -> Option<Vec<StationId>> {
    let mut queue = VecDeque::new();
    let mut visited = HashSet::new();
    queue.push_back(vec![start.to_string()]);
    visited.insert(start.to_string());

    while let Some(path) = queue.pop_front() {
        let node = path.last()?;
        if node == end {
            return Some(path);
        }
        for next in graph.get(node).into_iter().flatten() {
            if visited.insert(next.clone()) {
                let mut longer = path.clone();
                longer.push(next.clone());
                queue.push_back(longer);
            }
        }
    }
    None
}

/// Whether a path returned by [`shortest_path`] is an actual route.
pub fn is_route(path: &[StationId]) -> bool {
    path.len() >= 2
}

/// All stations reachable from `start`. A cut start station reaches nothing,
/// not even itself.
pub fn reachable(graph: &Adjacency, start: &str, cuts: &CutSet) -> BTreeSet<StationId> {
    let mut visited = BTreeSet::new();
    if cuts.is_station_cut(start) {
        return visited;
    }
    let mut queue = VecDeque::new();
    queue.push_back(start.to_string());
    while let Some(node) = queue.pop_front() {
        if visited.insert(node.clone()) {
            for next in graph.get(&node).into_iter().flatten() {
                if !visited.contains(next) {
                    queue.push_back(next.clone());
                }
            }
        }
    }
    visited
}

/// Hop-count estimate of the travel time along a route, or `None` when the
/// path is not a route.
pub fn estimated_travel_minutes(path: &[StationId], config: &EngineConfig) -> Option<u32> {
    if !is_route(path) {
        return None;
    }
    let hops = (path.len() - 1) as u32;
    Some(config.min_path_travel_minutes.max(hops * config.hop_minutes))
}
