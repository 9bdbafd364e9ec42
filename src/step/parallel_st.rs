//! Cooperative layer-wise stepping on a single thread.

use lockstep_input::task::StepKind;

use crate::step::{
    scan_finish_states, trigger_node, update_out_node, StepParts, StepType, StepTypeParams,
};
use crate::{Outcome, Status};

/// All components of one evaluation layer are stepped before any of their
/// outputs propagate, which is semantically a barrier between layers. Every
/// component therefore reads inputs computed in earlier layers only,
/// regardless of its position within the layer.
pub struct ParallelSingleThread;

impl StepType for ParallelSingleThread {
    fn kind(&self) -> StepKind {
        StepKind::ParallelSingleThread
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

            for &idx in layer {
                let node = parts.submodel.nodes()[idx];
                status = status.merge(parts.components[node.comp].do_step(
                    node.group,
                    interval.start,
                    params.time_step_size,
                    interval.end,
                    params.is_new_step,
                )?);
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
