use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::NodeIndex;

use crate::types::{AppError, RelationKind, Result};

use super::knowledge_graph::KnowledgeGraph;

/// Hard ceiling on traversal depth accepted from callers.
pub const MAX_TRAVERSAL_DEPTH: usize = 5;

impl KnowledgeGraph {
    /// Entities reachable from `entity_id` within `depth` hops along outgoing edges.
    ///
    /// Depth 1 is the set of direct successors. Deeper traversals are
    /// breadth-first: each node is reported once, at the depth it was first
    /// reached, in discovery order. The source itself is never reported.
    pub fn neighbors(
        &self,
        entity_id: &str,
        kind: Option<RelationKind>,
        depth: usize,
    ) -> Result<Vec<String>> {
        let start = self
            .node_index(entity_id)
            .ok_or_else(|| AppError::NotFound(format!("Entity {}", entity_id)))?;

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut found: Vec<String> = Vec::new();
        let mut frontier: VecDeque<NodeIndex> = VecDeque::new();

        visited.insert(start);
        frontier.push_back(start);

        for _ in 1..=depth {
            if frontier.is_empty() {
                break;
            }

            let level: Vec<NodeIndex> = frontier.drain(..).collect();
            for current in level {
                for (target, _) in self.out_edges(current, kind) {
                    if visited.insert(target) {
                        found.push(self.node_id(target).to_string());
                        frontier.push_back(target);
                    }
                }
            }
        }

        Ok(found)
    }

    /// Fewest-hop directed path from `source` to `target`, both ends included.
    ///
    /// With `kind` set only edges of that kind are followed. `None` when either
    /// endpoint is missing or no path exists.
    pub fn shortest_path(
        &self,
        source: &str,
        target: &str,
        kind: Option<RelationKind>,
    ) -> Option<Vec<String>> {
        let start = self.node_index(source)?;
        let goal = self.node_index(target)?;

        if start == goal {
            return Some(vec![source.to_string()]);
        }

        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for (next, _) in self.out_edges(current, kind) {
                if !visited.insert(next) {
                    continue;
                }
                parent.insert(next, current);
                if next == goal {
                    let mut path = vec![self.node_id(goal).to_string()];
                    let mut cursor = goal;
                    while let Some(&prev) = parent.get(&cursor) {
                        path.push(self.node_id(prev).to_string());
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }

        None
    }

    /// Seeds present in the graph followed by everything they reach within
    /// `depth` hops, deduplicated, in discovery order.
    pub fn expand(&self, seeds: &[String], kind: Option<RelationKind>, depth: usize) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut related: Vec<String> = Vec::new();

        let present: Vec<&String> = seeds.iter().filter(|s| self.contains(s)).collect();
        for seed in &present {
            if seen.insert((*seed).clone()) {
                related.push((*seed).clone());
            }
        }

        for seed in present {
            // presence checked above
            let Ok(reached) = self.neighbors(seed, kind, depth) else {
                continue;
            };
            for id in reached {
                if seen.insert(id.clone()) {
                    related.push(id);
                }
            }
        }

        tracing::debug!(
            seeds = seeds.len(),
            related = related.len(),
            depth,
            "Graph expansion"
        );
        related
    }
}
