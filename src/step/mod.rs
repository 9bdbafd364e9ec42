//! Step disciplines driving the advancement loop.
//!
//! All three disciplines share one per-node kernel: trigger the inports
//! over `[t, t + dt]`, call `do_step`, publish the outports. They differ in
//! how nodes of one evaluation layer are interleaved and in whether a
//! worker pool is used.

mod parallel_mt;
mod parallel_st;
mod sequential;

pub use parallel_mt::ParallelMultiThread;
pub use parallel_st::ParallelSingleThread;
pub use sequential::Sequential;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lockstep_input::task::StepKind;

use crate::comp::Component;
use crate::conn::Connections;
use crate::sched::SubModel;
use crate::{ComponentFinishState, Outcome, Status, TimeInterval};

/// Working variables of the advancement loop.
#[derive(Debug, Clone)]
pub struct StepTypeParams {
    pub time: f64,
    pub time_step_size: f64,
    pub time_end_step: f64,
    pub is_new_step: bool,
    pub num_steps: u64,
    pub a_component_finished: bool,

    /// If true, `time = sum of step sizes`; otherwise `time = n * dt`,
    /// avoiding floating-point drift over very long runs.
    pub sum_time: bool,
    pub input_at_end_time: bool,

    start_time: f64,
    nominal_step: f64,
    abort: Arc<AtomicBool>,
}

impl StepTypeParams {
    pub fn new(start_time: f64, step_size: f64, sum_time: bool, input_at_end_time: bool) -> Self {
        Self {
            time: start_time,
            time_step_size: step_size,
            time_end_step: start_time + step_size,
            is_new_step: true,
            num_steps: 0,
            a_component_finished: false,
            sum_time,
            input_at_end_time,
            start_time,
            nominal_step: step_size,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The coupling interval of the current step.
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::new(self.time, self.time + self.time_step_size)
    }

    /// Advance the global clock past the current step.
    pub fn advance(&mut self) {
        self.num_steps += 1;
        if self.sum_time {
            self.time += self.time_step_size;
        } else {
            self.time = self.start_time + self.num_steps as f64 * self.nominal_step;
        }
        self.time_end_step = self.time + self.time_step_size;
        self.is_new_step = true;
    }

    /// Flag checked at layer and step boundaries; typically raised from a
    /// signal handler.
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }
}

/// Mutually disjoint borrows of the model parts a step discipline works on.
pub struct StepParts<'a> {
    pub submodel: &'a SubModel,
    pub components: &'a mut [Component],
    pub connections: &'a mut Connections,
}

/// Strategy advancing the whole submodel by one coupling step.
pub trait StepType: Send {
    fn kind(&self) -> StepKind;

    fn configure(&mut self, _params: &StepTypeParams, _submodel: &SubModel) -> Outcome {
        Ok(Status::Ok)
    }

    fn do_step(&mut self, params: &mut StepTypeParams, parts: &mut StepParts) -> Outcome;
}

pub fn create_step_type(kind: StepKind) -> Box<dyn StepType> {
    match kind {
        StepKind::Sequential => Box::new(Sequential),
        StepKind::ParallelSingleThread => Box::new(ParallelSingleThread),
        StepKind::ParallelMultiThread => Box::new(ParallelMultiThread),
    }
}

/// Pull inbound connections into the component's inports.
pub(crate) fn trigger_node(
    comp: &mut Component,
    connections: &Connections,
    interval: &TimeInterval,
    task_input_at_end: bool,
) -> Outcome {
    let at_end = comp.input_at_end_time().unwrap_or(task_input_at_end);
    comp.databus_mut()
        .trigger_in_connections(connections, interval, at_end)
}

/// Publish the component's outputs and refresh its outgoing connections.
pub(crate) fn update_out_node(
    comp: &mut Component,
    connections: &mut Connections,
    time: f64,
) -> Outcome {
    let mut status = comp.write_outputs()?;
    status = status.merge(comp.databus().update_out_connections(connections, time)?);
    Ok(status)
}

/// Record whether any component reached its own end condition.
pub(crate) fn scan_finish_states(params: &mut StepTypeParams, components: &[Component]) {
    if components
        .iter()
        .any(|c| c.finish_state() == ComponentFinishState::Finished)
    {
        params.a_component_finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_time_accumulates_nominal_multiplies() {
        let mut summed = StepTypeParams::new(0.0, 0.1, true, false);
        let mut counted = StepTypeParams::new(0.0, 0.1, false, false);

        for _ in 0..1000 {
            summed.advance();
            counted.advance();
        }

        assert_eq!(counted.time, 1000.0 * 0.1);
        // summation drifts, multiplication does not
        assert!((summed.time - 100.0).abs() < 1e-9);
        assert_eq!(counted.num_steps, 1000);
    }

    #[test]
    fn interval_spans_one_coupling_step() {
        let params = StepTypeParams::new(1.0, 0.25, false, false);
        let interval = params.interval();
        assert_eq!(interval.start, 1.0);
        assert_eq!(interval.end, 1.25);
    }

    #[test]
    fn abort_flag_is_shared() {
        let params = StepTypeParams::new(0.0, 0.1, false, false);
        let flag = params.abort_flag();
        assert!(!params.abort_requested());
        flag.store(true, Ordering::Relaxed);
        assert!(params.abort_requested());
    }
}
