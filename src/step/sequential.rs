//! Single-threaded stepping in strict submodel order.

use lockstep_input::task::StepKind;

use crate::step::{
    scan_finish_states, trigger_node, update_out_node, StepParts, StepType, StepTypeParams,
};
use crate::{Outcome, Status};

/// Node-by-node stepping: each component sees the outputs of everything
/// ordered before it within the same coupling step. The binary-channel
/// fast path applies under this discipline only.
pub struct Sequential;

impl StepType for Sequential {
    fn kind(&self) -> StepKind {
        StepKind::Sequential
    }

    fn do_step(&mut self, params: &mut StepTypeParams, parts: &mut StepParts) -> Outcome {
        let interval = params.interval();
        let mut status = Status::Ok;

        for node in parts.submodel.nodes() {
            if params.abort_requested() {
                return Ok(status);
            }

            let comp = &mut parts.components[node.comp];
            status = status.merge(trigger_node(
                comp,
                parts.connections,
                &interval,
                params.input_at_end_time,
            )?);
            status = status.merge(comp.do_step(
                node.group,
                interval.start,
                params.time_step_size,
                interval.end,
                params.is_new_step,
            )?);
            status = status.merge(update_out_node(comp, parts.connections, interval.end)?);
        }

        scan_finish_states(params, parts.components);
        Ok(status)
    }
}
