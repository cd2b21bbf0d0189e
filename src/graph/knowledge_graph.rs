use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::extract::EntityRegistry;
use crate::types::{AppError, Entity, EntityKind, Properties, Relation, RelationKind, Result};

/// Node payload: the entity attributes the graph needs for traversal and reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
    pub frequency: u64,

    #[serde(default)]
    pub properties: Properties,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            frequency: 0,
            properties: Properties::new(),
        }
    }
}

impl From<&Entity> for GraphNode {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            kind: entity.kind,
            name: entity.name.clone(),
            frequency: entity.frequency,
            properties: entity.properties.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub kind: RelationKind,
    pub weight: f64,
    pub properties: Properties,
}

/// Directed multigraph of entities.
///
/// At most one edge exists per `(source, target, kind)`; repeat observations
/// add to its weight. Edges of different kinds between the same pair coexist.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<GraphNode, GraphEdge>,
    index: HashMap<String, NodeIndex>,
    edge_lookup: HashMap<(NodeIndex, NodeIndex, RelationKind), EdgeIndex>,
    registry: EntityRegistry,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: EntityRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub(crate) fn set_registry(&mut self, registry: EntityRegistry) {
        self.registry = registry;
    }

    /// Insert a node. An existing node with the same id is left untouched.
    pub fn add_node(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node.id) {
            return idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        idx
    }

    /// Insert an edge, or add to the weight of the existing edge of the same kind.
    ///
    /// Both endpoints must already be nodes.
    pub fn add_relation(&mut self, relation: Relation) -> Result<EdgeIndex> {
        if !relation.weight.is_finite() || relation.weight < 0.0 {
            return Err(AppError::Input(format!(
                "Invalid weight {} on {} -> {}",
                relation.weight, relation.source, relation.target
            )));
        }

        let source = self.require_endpoint(&relation.source, &relation)?;
        let target = self.require_endpoint(&relation.target, &relation)?;

        Ok(self.insert_edge(
            source,
            target,
            GraphEdge {
                kind: relation.kind,
                weight: relation.weight,
                properties: relation.properties,
            },
        ))
    }

    fn insert_edge(&mut self, source: NodeIndex, target: NodeIndex, edge: GraphEdge) -> EdgeIndex {
        let key = (source, target, edge.kind);
        if let Some(&existing_idx) = self.edge_lookup.get(&key) {
            if let Some(existing) = self.graph.edge_weight_mut(existing_idx) {
                existing.weight += edge.weight;
                existing.properties.extend(edge.properties);
            }
            return existing_idx;
        }

        let idx = self.graph.add_edge(source, target, edge);
        self.edge_lookup.insert(key, idx);
        idx
    }

    fn require_endpoint(&self, id: &str, relation: &Relation) -> Result<NodeIndex> {
        self.index.get(id).copied().ok_or_else(|| {
            AppError::GraphIntegrity(format!(
                "{} edge {} -> {} references unknown node '{}'",
                relation.kind, relation.source, relation.target, id
            ))
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    /// Edges in insertion order.
    pub fn relations(&self) -> Vec<Relation> {
        self.graph
            .edge_references()
            .map(|edge| self.to_relation(edge.source(), edge.target(), edge.weight()))
            .collect()
    }

    /// Every edge from `source` to `target`, across kinds.
    pub fn relations_between(&self, source: &str, target: &str) -> Vec<Relation> {
        let (Some(&s), Some(&t)) = (self.index.get(source), self.index.get(target)) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self.graph.edges_connecting(s, t).collect();
        edges.sort_by_key(|e| e.id());
        edges
            .into_iter()
            .map(|e| self.to_relation(s, t, e.weight()))
            .collect()
    }

    /// The edge `(source, target, kind)`, if present.
    pub fn relation(&self, source: &str, target: &str, kind: RelationKind) -> Option<Relation> {
        let s = *self.index.get(source)?;
        let t = *self.index.get(target)?;
        let edge = *self.edge_lookup.get(&(s, t, kind))?;
        self.graph
            .edge_weight(edge)
            .map(|weight| self.to_relation(s, t, weight))
    }

    fn to_relation(&self, source: NodeIndex, target: NodeIndex, edge: &GraphEdge) -> Relation {
        Relation {
            source: self.graph[source].id.clone(),
            target: self.graph[target].id.clone(),
            kind: edge.kind,
            weight: edge.weight,
            properties: edge.properties.clone(),
        }
    }

    /// Induced subgraph over `ids`, optionally widened by direct neighbours in
    /// either direction. Unknown ids are ignored.
    pub fn subgraph(&self, ids: &[&str], include_neighbors: bool) -> KnowledgeGraph {
        let mut keep: HashSet<NodeIndex> = ids
            .iter()
            .filter_map(|id| self.index.get(*id).copied())
            .collect();

        if include_neighbors {
            let seeds: Vec<NodeIndex> = keep.iter().copied().collect();
            for idx in seeds {
                keep.extend(self.graph.neighbors_directed(idx, Direction::Outgoing));
                keep.extend(self.graph.neighbors_directed(idx, Direction::Incoming));
            }
        }

        let mut sub = KnowledgeGraph::new();
        let remap: HashMap<NodeIndex, NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| keep.contains(idx))
            .map(|idx| (idx, sub.add_node(self.graph[idx].clone())))
            .collect();
        for edge in self.graph.edge_references() {
            if let (Some(&s), Some(&t)) = (remap.get(&edge.source()), remap.get(&edge.target())) {
                sub.insert_edge(s, t, edge.weight().clone());
            }
        }
        sub.registry = self
            .registry
            .entities()
            .into_iter()
            .filter(|e| sub.contains(&e.id))
            .cloned()
            .collect();
        sub
    }

    pub(crate) fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub(crate) fn node_id(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].id
    }

    pub(crate) fn inner(&self) -> &DiGraph<GraphNode, GraphEdge> {
        &self.graph
    }

    /// Outgoing edges of `idx` in insertion order, optionally restricted to one kind.
    pub(crate) fn out_edges(
        &self,
        idx: NodeIndex,
        kind: Option<RelationKind>,
    ) -> Vec<(NodeIndex, &GraphEdge)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| kind.map_or(true, |k| e.weight().kind == k))
            .collect();
        edges.sort_by_key(|e| e.id());
        edges
            .into_iter()
            .map(|e| (e.target(), e.weight()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(ids: &[&str]) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        for id in ids {
            graph.add_node(GraphNode::new(*id, EntityKind::CodeIdentifier, *id));
        }
        graph
    }

    #[test]
    fn test_add_relation_accumulates_same_kind() {
        let mut graph = graph_with(&["AC-2", "mfa"]);
        graph
            .add_relation(Relation::new("AC-2", "mfa", RelationKind::CoOccurrence))
            .unwrap();
        graph
            .add_relation(Relation::new("AC-2", "mfa", RelationKind::CoOccurrence).with_weight(2.0))
            .unwrap();
        graph
            .add_relation(Relation::new("AC-2", "mfa", RelationKind::Semantic).with_weight(0.5))
            .unwrap();

        assert_eq!(graph.edge_count(), 2);
        let co = graph
            .relation("AC-2", "mfa", RelationKind::CoOccurrence)
            .unwrap();
        assert_eq!(co.weight, 3.0);
        assert_eq!(graph.relations_between("AC-2", "mfa").len(), 2);
        assert!(graph.relations_between("mfa", "AC-2").is_empty());
    }

    #[test]
    fn test_add_relation_rejects_unknown_endpoint() {
        let mut graph = graph_with(&["AC-2"]);
        let result = graph.add_relation(Relation::new("AC-2", "ghost", RelationKind::Hierarchy));
        assert!(matches!(result, Err(AppError::GraphIntegrity(_))));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_add_relation_rejects_negative_weight() {
        let mut graph = graph_with(&["a", "b"]);
        let result =
            graph.add_relation(Relation::new("a", "b", RelationKind::Semantic).with_weight(-1.0));
        assert!(matches!(result, Err(AppError::Input(_))));
    }

    #[test]
    fn test_add_node_keeps_first() {
        let mut graph = KnowledgeGraph::new();
        let first = graph.add_node(GraphNode::new("AC-2", EntityKind::CodeIdentifier, "first"));
        let second = graph.add_node(GraphNode::new("AC-2", EntityKind::CodeIdentifier, "second"));
        assert_eq!(first, second);
        assert_eq!(graph.node("AC-2").unwrap().name, "first");
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_subgraph_with_neighbors() {
        let mut graph = graph_with(&["a", "b", "c", "d"]);
        graph
            .add_relation(Relation::new("a", "b", RelationKind::Hierarchy))
            .unwrap();
        graph
            .add_relation(Relation::new("c", "a", RelationKind::Hierarchy))
            .unwrap();
        graph
            .add_relation(Relation::new("c", "d", RelationKind::Hierarchy))
            .unwrap();

        let narrow = graph.subgraph(&["a"], false);
        assert_eq!(narrow.node_count(), 1);
        assert_eq!(narrow.edge_count(), 0);

        let wide = graph.subgraph(&["a", "missing"], true);
        let ids: Vec<&str> = wide.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(wide.edge_count(), 2);
    }

    #[test]
    fn test_subgraph_keeps_edge_payloads() {
        let mut graph = graph_with(&["a", "b", "c"]);
        graph
            .add_relation(
                Relation::new("a", "b", RelationKind::CoOccurrence)
                    .with_weight(3.0)
                    .with_property("co_occurrence_count", 3),
            )
            .unwrap();
        graph
            .add_relation(Relation::new("a", "b", RelationKind::Semantic).with_weight(0.5))
            .unwrap();
        graph
            .add_relation(Relation::new("b", "c", RelationKind::Hierarchy))
            .unwrap();

        let sub = graph.subgraph(&["a", "b"], false);
        assert_eq!(sub.edge_count(), 2);
        assert_eq!(sub.relations_between("a", "b").len(), 2);

        let co = sub.relation("a", "b", RelationKind::CoOccurrence).unwrap();
        assert_eq!(co.weight, 3.0);
        assert_eq!(co.properties["co_occurrence_count"], 3);
        assert!(sub.relation("b", "c", RelationKind::Hierarchy).is_none());
    }
}
