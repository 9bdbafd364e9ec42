//! Dependency solver: grouping, ordering and loop decoupling.
//!
//! Nodes of the dependency graph are `(component, group)` pairs, where a
//! group collects the output ports of a component that feed through from
//! the same input ports. The Tarjan SCC routine (petgraph) orders the
//! graph; nontrivial components are broken by decoupling one connection per
//! loop and re-running until the graph is acyclic.

pub mod deps;
mod decouple;
mod graph;
mod submodel;

pub use deps::{Dependencies, DependencyKind, GroupInfo, PortGroups};
pub use graph::{DependencyGraph, OrderedNodes};
pub use submodel::{EvalNode, SubModel};

use itertools::Itertools;

use crate::comp::Component;
use crate::conn::Connections;
use crate::{Error, Status};

fn log_node_map(
    components: &[Component],
    graph: &DependencyGraph,
    ordered: &OrderedNodes,
    debug: bool,
) {
    for scc in &ordered.sccs {
        for &index in scc {
            let node = graph.node(index);
            let line = format!("  ({}, {})", components[node.comp].name(), node.group);
            if debug {
                log::debug!("{line}");
            } else {
                log::info!("{line}");
            }
        }
    }
}

/// Compute a loop-free evaluation order for the requested dependency
/// relation.
///
/// For runtime dependencies, loops are broken by decoupling connections
/// (`allow_decoupling`); initial-dependency loops are a hard error. Returns
/// the submodel and whether any connection was decoupled.
pub fn build_submodel(
    components: &[Component],
    connections: &mut Connections,
    which: DependencyKind,
    allow_decoupling: bool,
    ignore_decouple_metadata: bool,
) -> Result<(SubModel, Status), Error> {
    let mut iteration = 0;

    loop {
        let graph = DependencyGraph::build(components, connections, which);
        let ordered = graph.ordered_nodes();

        log_node_map(components, &graph, &ordered, iteration > 0);

        if !ordered.has_loops() {
            if iteration > 0 {
                log::info!("Evaluation order of decoupled model (element, group):");
                log_node_map(components, &graph, &ordered, false);
            }
            return Ok((graph.to_submodel(&ordered), Status::Ok));
        }

        if !allow_decoupling {
            let cycle = ordered
                .loops()
                .map(|scc| {
                    scc.iter()
                        .map(|&n| components[graph.node(n).comp].name())
                        .dedup()
                        .join(" -> ")
                })
                .join("; ");
            return Err(Error::InitializationLoop { cycle });
        }

        iteration += 1;
        decouple::decouple_loops(
            &graph,
            &ordered,
            connections,
            components,
            ignore_decouple_metadata,
        )
        .map_err(|err| {
            log::error!("Unable to decouple algebraic loop in iteration {iteration}");
            err
        })?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_input::connections::DecoupleKind;
    use lockstep_input::model::{ComponentKindTag, PortInput, SpecificDataInput};
    use lockstep_input::ComponentInput;

    use crate::bus::ChannelType;
    use crate::comp::create_component;
    use crate::conn::{Connection, ConnectionInfo, FilterMode};

    fn integrator(name: &str, id: usize) -> Component {
        let mut input = ComponentInput::new(ComponentKindTag::Integrator, name);
        input.inports = vec![PortInput::double("u")];
        input.outports = vec![PortInput::double("y")];
        input.specific_data = Some(SpecificDataInput::Integrator {
            initial_state: None,
            gain: None,
        });
        create_component(&input, id, None).unwrap()
    }

    fn link(src: usize, trg: usize, kind: DecoupleKind, priority: i32) -> Connection {
        let info = ConnectionInfo::new(
            src,
            0,
            trg,
            0,
            kind,
            priority,
            None,
            format!("c{src}.y -> c{trg}.u"),
        );
        Connection::new(info, ChannelType::Double, FilterMode::Extrapolating)
    }

    #[test]
    fn chain_orders_sources_first() {
        let components = vec![integrator("a", 0), integrator("b", 1)];
        let mut connections = Connections::default();
        connections.push(link(0, 1, DecoupleKind::Default, 0));

        let (submodel, _) = build_submodel(
            &components,
            &mut connections,
            DependencyKind::Runtime,
            true,
            false,
        )
        .unwrap();

        assert_eq!(submodel.components(), &[0, 1]);
        assert_eq!(submodel.layers().len(), 2);
        assert!(connections.iter().all(|c| !c.info.decoupled));
    }

    #[test]
    fn loop_decouples_highest_priority_connection() {
        let components = vec![integrator("a", 0), integrator("b", 1)];
        let mut connections = Connections::default();
        connections.push(link(0, 1, DecoupleKind::IfNeeded, 1));
        connections.push(link(1, 0, DecoupleKind::IfNeeded, 7));

        let (submodel, _) = build_submodel(
            &components,
            &mut connections,
            DependencyKind::Runtime,
            true,
            false,
        )
        .unwrap();

        assert!(!connections[0].info.decoupled);
        assert!(connections[1].info.decoupled);
        // cutting b -> a leaves a before b
        assert_eq!(submodel.components(), &[0, 1]);
    }

    #[test]
    fn always_beats_priority() {
        let components = vec![integrator("a", 0), integrator("b", 1)];
        let mut connections = Connections::default();
        connections.push(link(0, 1, DecoupleKind::Always, 0));
        connections.push(link(1, 0, DecoupleKind::IfNeeded, 100));

        build_submodel(
            &components,
            &mut connections,
            DependencyKind::Runtime,
            true,
            false,
        )
        .unwrap();

        assert!(connections[0].info.decoupled);
        assert!(!connections[1].info.decoupled);
    }

    #[test]
    fn never_only_loop_cannot_be_decoupled() {
        let components = vec![integrator("a", 0), integrator("b", 1)];
        let mut connections = Connections::default();
        connections.push(link(0, 1, DecoupleKind::Never, 0));
        connections.push(link(1, 0, DecoupleKind::Never, 0));

        let err = build_submodel(
            &components,
            &mut connections,
            DependencyKind::Runtime,
            true,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UndecouplableLoop { .. }));
    }

    #[test]
    fn initial_dependencies_of_integrators_break_runtime_loops() {
        // the same loop is acyclic under initial dependencies, so the
        // initialization order builds without decoupling
        let components = vec![integrator("a", 0), integrator("b", 1)];
        let mut connections = Connections::default();
        connections.push(link(0, 1, DecoupleKind::Never, 0));
        connections.push(link(1, 0, DecoupleKind::Never, 0));

        let (submodel, _) = build_submodel(
            &components,
            &mut connections,
            DependencyKind::Initial,
            false,
            false,
        )
        .unwrap();
        assert_eq!(submodel.len(), 2);
        assert!(connections.iter().all(|c| !c.info.decoupled));
    }
}
