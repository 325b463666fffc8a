//! Dependency graph management using `petgraph`.
//!
//! Builds a directed acyclic graph whose edges mean "must exist before",
//! and resolves a deterministic topological ordering: among nodes that are
//! ready at the same time, the one declared first comes first.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use stackweave_common::error::{Result, StackweaveError};

use crate::descriptor::ResourceDescriptor;
use crate::reference::Reference;

/// A dependency graph of named nodes (resources or stacks).
#[derive(Debug)]
pub struct DependencyGraph {
    /// Internal petgraph representation.
    graph: petgraph::Graph<String, ()>,
    /// Node lookup by name.
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: petgraph::Graph::new(),
            index: HashMap::new(),
        }
    }

    /// Adds a node, or returns the existing node with that name.
    ///
    /// Insertion order is the declaration order used to break ties.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeIndex {
        let name = name.into();
        if let Some(&idx) = self.index.get(&name) {
            return idx;
        }
        let idx = self.graph.add_node(name.clone());
        let _ = self.index.insert(name, idx);
        idx
    }

    /// Returns the node registered under `name`.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    ///
    /// The graph edge points from `dependency` to `dependent` so that
    /// dependencies are emitted first. Repeated edges are collapsed.
    pub fn add_dependency(&mut self, dependent: NodeIndex, dependency: NodeIndex) {
        let _ = self.graph.update_edge(dependency, dependent, ());
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns the direct dependencies of a node, in declaration order.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let Some(idx) = self.node(name) else {
            return Vec::new();
        };
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect();
        deps.sort_unstable();
        deps.into_iter()
            .filter_map(|d| self.graph.node_weight(d).cloned())
            .collect()
    }

    /// Returns a topological ordering with dependencies first.
    ///
    /// # Errors
    ///
    /// Returns `CyclicDependency` naming one cycle if the graph is cyclic.
    pub fn resolve_order(&self) -> Result<Vec<String>> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<NodeIndex>> = self
            .graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let degree = &mut in_degree[next.index()];
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() < self.graph.node_count() {
            let cycle = self.find_cycle();
            tracing::warn!(?cycle, "dependency cycle detected");
            return Err(StackweaveError::CyclicDependency { cycle });
        }

        Ok(order
            .into_iter()
            .filter_map(|idx| self.graph.node_weight(idx).cloned())
            .collect())
    }

    /// Names one cycle as `a -> b -> ... -> a`, where each arrow reads
    /// "depends on".
    fn find_cycle(&self) -> Vec<String> {
        let component = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.iter().any(|&n| self.graph.contains_edge(n, n))
            })
            .min_by_key(|scc| scc.iter().min().copied());

        let Some(component) = component else {
            return Vec::new();
        };
        let members: HashSet<NodeIndex> = component.iter().copied().collect();
        let Some(&start) = component.iter().min() else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut visited = HashSet::from([start]);
        if !self.walk_back_to(start, start, &members, &mut path, &mut visited) {
            path.push(start);
        }
        path.into_iter()
            .filter_map(|idx| self.graph.node_weight(idx).cloned())
            .collect()
    }

    fn walk_back_to(
        &self,
        current: NodeIndex,
        start: NodeIndex,
        members: &HashSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
    ) -> bool {
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(current, Direction::Incoming)
            .filter(|n| members.contains(n))
            .collect();
        deps.sort_unstable();

        for dep in deps {
            if dep == start {
                path.push(start);
                return true;
            }
            if visited.insert(dep) {
                path.push(dep);
                if self.walk_back_to(dep, start, members, path, visited) {
                    return true;
                }
                let _ = path.pop();
            }
        }
        false
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Orders the descriptors of one stack so that every referenced resource
/// precedes its dependents.
///
/// A reference equal to one in `external` (an imported export, realized by
/// an earlier stack) adds no edge. Any other reference must target a
/// descriptor in `descriptors`; other attributes of an imported resource
/// stay out of reach.
///
/// # Errors
///
/// Returns `NotFound` for a dangling reference and `CyclicDependency` if
/// descriptors reference each other in a cycle (including self-reference).
pub fn order_descriptors<'a>(
    descriptors: &'a [ResourceDescriptor],
    external: &BTreeSet<Reference>,
) -> Result<Vec<&'a ResourceDescriptor>> {
    let mut graph = DependencyGraph::new();
    for descriptor in descriptors {
        let _ = graph.add_node(descriptor.id().as_str());
    }

    for descriptor in descriptors {
        let dependent = graph.add_node(descriptor.id().as_str());
        for reference in descriptor.references() {
            let target = reference.target();
            if let Some(dependency) = graph.node(target.as_str()) {
                graph.add_dependency(dependent, dependency);
            } else if !external.contains(reference) {
                return Err(StackweaveError::NotFound {
                    kind: "reference target",
                    id: format!("{reference} (referenced by {})", descriptor.id()),
                });
            }
        }
    }

    let by_id: HashMap<&str, &ResourceDescriptor> = descriptors
        .iter()
        .map(|d| (d.id().as_str(), d))
        .collect();
    let order = graph.resolve_order()?;
    Ok(order
        .iter()
        .filter_map(|name| by_id.get(name.as_str()).copied())
        .collect())
}

#[cfg(test)]
mod tests {
    use stackweave_common::types::ResourceKind;

    use super::*;
    use crate::descriptor::DescriptorBuilder;

    fn descriptor(id: &str, refs: &[&str]) -> ResourceDescriptor {
        let mut builder = DescriptorBuilder::new(id, ResourceKind::Role);
        for (i, target) in refs.iter().enumerate() {
            builder.set(format!("dep{i}"), Reference::new(*target, "arn"));
        }
        builder.freeze()
    }

    fn ids(ordered: &[&ResourceDescriptor]) -> Vec<String> {
        ordered.iter().map(|d| d.id().to_string()).collect()
    }

    #[test]
    fn empty_graph_resolves_to_empty() {
        let graph = DependencyGraph::new();
        let order = graph.resolve_order().expect("should resolve");
        assert!(order.is_empty());
    }

    #[test]
    fn single_node_resolves() {
        let mut graph = DependencyGraph::new();
        let _ = graph.add_node("api");
        let order = graph.resolve_order().expect("should resolve");
        assert_eq!(order, vec!["api"]);
    }

    #[test]
    fn linear_dependency_chain() {
        let mut graph = DependencyGraph::new();
        let api = graph.add_node("api");
        let db = graph.add_node("db");
        graph.add_dependency(api, db);

        let order = graph.resolve_order().expect("should resolve");
        assert_eq!(order, vec!["db", "api"]);
    }

    #[test]
    fn diamond_dependency() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let c = graph.add_node("c");
        let d = graph.add_node("d");
        graph.add_dependency(a, b);
        graph.add_dependency(a, c);
        graph.add_dependency(b, d);
        graph.add_dependency(c, d);

        let order = graph.resolve_order().expect("should resolve");
        assert_eq!(order, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn ties_follow_declaration_order() {
        let mut graph = DependencyGraph::new();
        let _ = graph.add_node("z");
        let _ = graph.add_node("y");
        let _ = graph.add_node("x");
        let order = graph.resolve_order().expect("should resolve");
        assert_eq!(order, vec!["z", "y", "x"]);
    }

    #[test]
    fn add_node_is_idempotent() {
        let mut graph = DependencyGraph::new();
        let first = graph.add_node("vpc");
        let second = graph.add_node("vpc");
        assert_eq!(first, second);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn cycle_detection_names_the_cycle() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        graph.add_dependency(a, b);
        graph.add_dependency(b, a);

        let err = graph.resolve_order().unwrap_err();
        match err {
            StackweaveError::CyclicDependency { cycle } => {
                assert_eq!(cycle, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn three_node_cycle_detection() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let c = graph.add_node("c");
        let ok = graph.add_node("ok");
        graph.add_dependency(a, b);
        graph.add_dependency(b, c);
        graph.add_dependency(c, a);
        graph.add_dependency(ok, a);

        let msg = graph.resolve_order().unwrap_err().to_string();
        assert!(msg.contains("a -> b -> c -> a"), "got: {msg}");
    }

    #[test]
    fn dependencies_of_lists_direct_dependencies() {
        let mut graph = DependencyGraph::new();
        let svc = graph.add_node("svc");
        let vpc = graph.add_node("vpc");
        let cluster = graph.add_node("cluster");
        graph.add_dependency(svc, cluster);
        graph.add_dependency(svc, vpc);
        assert_eq!(graph.dependencies_of("svc"), vec!["vpc", "cluster"]);
        assert!(graph.dependencies_of("missing").is_empty());
    }

    #[test]
    fn descriptors_ordered_after_their_references() {
        let descriptors = vec![
            descriptor("Service", &["Cluster", "Vpc"]),
            descriptor("Cluster", &["Vpc"]),
            descriptor("Vpc", &[]),
        ];
        let ordered = order_descriptors(&descriptors, &BTreeSet::new()).expect("order");
        assert_eq!(ids(&ordered), vec!["Vpc", "Cluster", "Service"]);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let descriptors = vec![descriptor("Loop", &["Loop"])];
        let err = order_descriptors(&descriptors, &BTreeSet::new()).unwrap_err();
        assert_eq!(err.to_string(), "cyclic dependency: Loop -> Loop");
    }

    #[test]
    fn transitive_reference_cycle_fails() {
        let descriptors = vec![
            descriptor("A", &["B"]),
            descriptor("B", &["C"]),
            descriptor("C", &["A"]),
        ];
        let err = order_descriptors(&descriptors, &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, StackweaveError::CyclicDependency { .. }));
    }

    #[test]
    fn dangling_reference_fails() {
        let descriptors = vec![descriptor("Service", &["Ghost"])];
        let msg = order_descriptors(&descriptors, &BTreeSet::new())
            .unwrap_err()
            .to_string();
        assert!(msg.contains("Ghost"), "got: {msg}");
        assert!(msg.contains("Service"), "got: {msg}");
    }

    #[test]
    fn external_reference_adds_no_edge() {
        let descriptors = vec![descriptor("TaskDef", &["Repo"])];
        let external = BTreeSet::from([Reference::new("Repo", "arn")]);
        let ordered = order_descriptors(&descriptors, &external).expect("order");
        assert_eq!(ids(&ordered), vec!["TaskDef"]);
    }

    #[test]
    fn other_attribute_of_external_resource_is_dangling() {
        let descriptors = vec![descriptor("TaskDef", &["Repo"])];
        let external = BTreeSet::from([Reference::new("Repo", "repositoryUri")]);
        let msg = order_descriptors(&descriptors, &external)
            .unwrap_err()
            .to_string();
        assert!(msg.contains("Repo.arn"), "got: {msg}");
    }
}
