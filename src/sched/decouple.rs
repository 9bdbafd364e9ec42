//! Selection of connections to break algebraic loops with.

use itertools::Itertools;
use lockstep_input::connections::DecoupleKind;
use petgraph::graph::NodeIndex;

use crate::comp::Component;
use crate::conn::Connections;
use crate::sched::graph::{DependencyGraph, OrderedNodes};
use crate::{Error, Outcome, Status};

fn cycle_description(
    graph: &DependencyGraph,
    components: &[Component],
    scc: &[NodeIndex],
) -> String {
    scc.iter()
        .map(|&n| components[graph.node(n).comp].name())
        .dedup()
        .join(" -> ")
}

/// Decouple one connection per nontrivial SCC.
///
/// Eligibility and preference, in this exact order: `Never` connections are
/// not eligible, `Always` connections are preferred first, then the highest
/// decouple priority wins, ties broken by lowest source component id, then
/// lowest source channel id. A self-loop is only decouplable through an
/// `Always` connection. With `ignore_metadata` (trigger sequences present)
/// connections of ordinary loops stay eligible but only the id tie-break
/// applies.
pub fn decouple_loops(
    graph: &DependencyGraph,
    ordered: &OrderedNodes,
    connections: &mut Connections,
    components: &[Component],
    ignore_metadata: bool,
) -> Outcome {
    for scc in ordered.loops() {
        let self_loop = scc.len() == 1;
        let candidates: Vec<usize> = graph
            .connections_within(scc)
            .into_iter()
            .filter(|&id| {
                let info = &connections[id].info;
                if info.decoupled {
                    return false;
                }
                if self_loop {
                    return !ignore_metadata && info.decouple == DecoupleKind::Always;
                }
                ignore_metadata || info.decouple != DecoupleKind::Never
            })
            .collect();

        let chosen = candidates.into_iter().min_by_key(|&id| {
            let info = &connections[id].info;
            let (always, priority) = if ignore_metadata {
                (1, 0)
            } else {
                (
                    (info.decouple != DecoupleKind::Always) as i64,
                    -(info.decouple_priority as i64),
                )
            };
            (always, priority, info.source, info.source_channel)
        });

        let Some(id) = chosen else {
            return Err(Error::UndecouplableLoop {
                cycle: cycle_description(graph, components, scc),
            });
        };

        let info = &mut connections[id].info;
        info.decoupled = true;
        log::info!("Decoupling connection {}", info.connection_string());
    }

    Ok(Status::Ok)
}
