//! Layer-wise stepping with a worker pool.

use lockstep_input::task::StepKind;
use rayon::prelude::*;

use crate::comp::Component;
use crate::step::{
    scan_finish_states, trigger_node, update_out_node, StepParts, StepType, StepTypeParams,
};
use crate::{Outcome, Status};

/// Within one evaluation layer, `do_step` calls are dispatched to the rayon
/// pool; triggers and outport updates stay on the driver thread, which
/// gives the barrier semantics between layers for free. The layer partition
/// guarantees that a component appears at most once per layer, so the
/// mutable component borrows are disjoint.
pub struct ParallelMultiThread;

/// Mutable references to the listed components, in id order. Relies on the
/// ids being sorted and unique.
fn select_components<'a>(
    components: &'a mut [Component],
    ids: &[usize],
) -> Vec<&'a mut Component> {
    debug_assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let mut wanted = ids.iter().copied().peekable();
    let mut selected = Vec::with_capacity(ids.len());
    for (id, comp) in components.iter_mut().enumerate() {
        if wanted.peek() == Some(&id) {
            selected.push(comp);
            wanted.next();
        }
    }
    selected
}

impl StepType for ParallelMultiThread {
    fn kind(&self) -> StepKind {
        StepKind::ParallelMultiThread
    }

    fn do_step(&mut self, params: &mut StepTypeParams, parts: &mut StepParts) -> Outcome {
        let interval = params.interval();
        let mut status = Status::Ok;

        for layer in parts.submodel.layers() {
            if params.abort_requested() {
                return Ok(status);
            }

            for &idx in layer {
                let node = parts.submodel.nodes()[idx];
                status = status.merge(trigger_node(
                    &mut parts.components[node.comp],
                    parts.connections,
                    &interval,
                    params.input_at_end_time,
                )?);
            }

            // one (comp, group) job per worker, sorted for the disjoint
            // borrow selection
            let mut jobs: Vec<(usize, usize)> = layer
                .iter()
                .map(|&idx| {
                    let node = parts.submodel.nodes()[idx];
                    (node.comp, node.group)
                })
                .collect();
            jobs.sort_unstable();

            let ids: Vec<usize> = jobs.iter().map(|&(comp, _)| comp).collect();
            let groups: Vec<usize> = jobs.iter().map(|&(_, group)| group).collect();
            let selected = select_components(parts.components, &ids);

            let results: Vec<Outcome> = selected
                .into_par_iter()
                .zip(groups.into_par_iter())
                .map(|(comp, group)| {
                    comp.do_step(
                        group,
                        interval.start,
                        params.time_step_size,
                        interval.end,
                        params.is_new_step,
                    )
                })
                .collect();

            // every worker of the layer ran to completion; now surface the
            // first failure
            for result in results {
                status = status.merge(result?);
            }

            for &idx in layer {
                let node = parts.submodel.nodes()[idx];
                status = status.merge(update_out_node(
                    &mut parts.components[node.comp],
                    parts.connections,
                    interval.end,
                )?);
            }
        }

        scan_finish_states(params, parts.components);
        Ok(status)
    }
}
