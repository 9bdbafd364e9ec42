//! The `(component, group)` dependency graph and its Tarjan ordering.

use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::comp::Component;
use crate::conn::Connections;
use crate::sched::deps::{DependencyKind, PortGroups};
use crate::sched::submodel::{EvalNode, SubModel};

/// Directed graph over `(component, group)` nodes. Edges carry the id of
/// the connection inducing them; intra-component feedthrough is encoded in
/// the group partition itself.
pub struct DependencyGraph {
    graph: DiGraph<EvalNode, usize>,
    node_of: Vec<Vec<NodeIndex>>,
    groups: Vec<PortGroups>,
}

impl DependencyGraph {
    /// Build the graph for the requested dependency relation. Connections
    /// already decoupled contribute no edge.
    pub fn build(
        components: &[Component],
        connections: &Connections,
        which: DependencyKind,
    ) -> Self {
        let groups: Vec<PortGroups> = components
            .iter()
            .map(|c| PortGroups::compute(&c.dependencies(which)))
            .collect();

        let mut graph = DiGraph::new();
        let mut node_of = Vec::with_capacity(components.len());
        for (comp, comp_groups) in groups.iter().enumerate() {
            let nodes: Vec<NodeIndex> = (0..comp_groups.len())
                .map(|group| graph.add_node(EvalNode { comp, group }))
                .collect();
            node_of.push(nodes);
        }

        for (conn_id, connection) in connections.iter().enumerate() {
            let info = &connection.info;
            if info.decoupled {
                continue;
            }

            let src_group = groups[info.source].group_of_output(info.source_channel);
            let src_node = node_of[info.source][src_group];
            for trg_group in groups[info.target].groups_of_input(info.target_channel) {
                graph.add_edge(src_node, node_of[info.target][trg_group], conn_id);
            }
        }

        Self {
            graph,
            node_of,
            groups,
        }
    }

    pub fn groups(&self) -> &[PortGroups] {
        &self.groups
    }

    pub fn node(&self, index: NodeIndex) -> EvalNode {
        self.graph[index]
    }

    fn has_self_edge(&self, index: NodeIndex) -> bool {
        self.graph.find_edge(index, index).is_some()
    }

    /// Run the black-box SCC routine. `tarjan_scc` reports components in
    /// reverse topological order; the result is re-reversed so that sources
    /// come first.
    pub fn ordered_nodes(&self) -> OrderedNodes {
        let mut sccs = algo::tarjan_scc(&self.graph);
        sccs.reverse();
        for scc in &mut sccs {
            scc.sort();
        }

        let looping = sccs
            .iter()
            .map(|scc| scc.len() > 1 || self.has_self_edge(scc[0]))
            .collect();

        OrderedNodes { sccs, looping }
    }

    /// Connection ids of all edges with both endpoints inside `scc`,
    /// including self edges.
    pub fn connections_within(&self, scc: &[NodeIndex]) -> Vec<usize> {
        let mut conn_ids = Vec::new();
        for &node in scc {
            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                if scc.contains(&edge.target()) {
                    conn_ids.push(*edge.weight());
                }
            }
        }
        conn_ids.sort_unstable();
        conn_ids.dedup();
        conn_ids
    }

    /// Flatten an acyclic ordering into a [`SubModel`], layering nodes by
    /// their longest path from a source.
    pub fn to_submodel(&self, ordered: &OrderedNodes) -> SubModel {
        debug_assert!(!ordered.has_loops());

        let order: Vec<NodeIndex> = ordered.sccs.iter().map(|scc| scc[0]).collect();

        let mut depth_of = vec![0usize; self.graph.node_count()];
        for &node in &order {
            let depth = self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|pred| depth_of[pred.index()] + 1)
                .max()
                .unwrap_or(0);
            depth_of[node.index()] = depth;
        }

        let nodes = order.iter().map(|&n| self.graph[n]).collect();
        let depths = order.iter().map(|&n| depth_of[n.index()]).collect();
        SubModel::new(nodes, depths)
    }
}

/// Result of the SCC routine: strongly connected components in topological
/// order, with a loop flag per component.
pub struct OrderedNodes {
    pub sccs: Vec<Vec<NodeIndex>>,
    looping: Vec<bool>,
}

impl OrderedNodes {
    pub fn has_loops(&self) -> bool {
        self.looping.iter().any(|&l| l)
    }

    /// The nontrivial strongly connected components.
    pub fn loops(&self) -> impl Iterator<Item = &Vec<NodeIndex>> {
        self.sccs
            .iter()
            .zip(&self.looping)
            .filter(|(_, &looping)| looping)
            .map(|(scc, _)| scc)
    }
}
