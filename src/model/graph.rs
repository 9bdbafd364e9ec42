//! Diagnostic DOT output of the model topology and of per-component
//! dependency matrices.

use std::io::Write;
use std::path::Path;

use lockstep_input::model::ComponentKindTag;

use crate::comp::Component;
use crate::conn::Connections;
use crate::sched::DependencyKind;

fn abbrev(tag: ComponentKindTag) -> &'static str {
    match tag {
        ComponentKindTag::Constant => "C",
        ComponentKindTag::Integrator => "INT",
        ComponentKindTag::VectorIntegrator => "VINT",
        ComponentKindTag::Fmu => "FMU",
    }
}

fn port_fields(prefix: &str, count: usize) -> String {
    (0..count)
        .map(|i| format!("<{prefix}{i}>{i}"))
        .collect::<Vec<_>>()
        .join("|")
}

/// One node per component with its port rectangles, one edge per
/// connection.
pub fn write_model_graph(
    components: &[Component],
    connections: &Connections,
    path: &Path,
) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;

    writeln!(file, "digraph model {{")?;
    writeln!(file, "graph [nodesep=\"1\"]")?;
    writeln!(file, "rankdir = LR;")?;

    for comp in components {
        let db = comp.databus();
        writeln!(
            file,
            "comp{} [shape=record, label=\"{{{{{}}}|{} ({})|{{{}}}}}\"];",
            comp.id(),
            port_fields("in", db.num_in_channels()),
            abbrev(comp.tag()),
            comp.name(),
            port_fields("out", db.num_out_channels()),
        )?;
    }

    for connection in connections.iter() {
        let info = &connection.info;
        writeln!(
            file,
            "comp{}:out{} -> comp{}:in{};",
            info.source, info.source_channel, info.target, info.target_channel,
        )?;
    }

    writeln!(file, "}}")?;
    Ok(())
}

/// The input-to-output dependency matrix of one component as a bipartite
/// graph.
pub fn write_component_graph(
    comp: &Component,
    which: DependencyKind,
    path: &Path,
) -> std::io::Result<()> {
    let deps = comp.dependencies(which);
    let mut file = std::fs::File::create(path)?;

    writeln!(file, "digraph model {{")?;
    writeln!(file, "graph [nodesep=\"1\"]")?;
    writeln!(file, "rankdir = LR;")?;
    writeln!(
        file,
        "in [shape=record, label=\"in|{{{}}}\"];",
        port_fields("in", deps.num_in())
    )?;
    writeln!(
        file,
        "out [shape=record, label=\"{{{}}}|out\"];",
        port_fields("out", deps.num_out())
    )?;

    for input in 0..deps.num_in() {
        for output in 0..deps.num_out() {
            if deps.get(input, output) {
                writeln!(file, "in:in{input} -> out:out{output};")?;
            }
        }
    }

    writeln!(file, "labelloc=\"t\";")?;
    writeln!(file, "label=\"{} ({})\";", abbrev(comp.tag()), comp.name())?;
    writeln!(file, "}}")?;
    Ok(())
}
