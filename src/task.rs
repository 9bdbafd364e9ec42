//! The task: time parameters, step discipline and the advancement loop.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use lockstep_input::task::{EndKind, StepKind, StoreLevelKind, TaskInput};

use crate::model::Model;
use crate::step::{create_step_type, StepType, StepTypeParams};
use crate::{Error, FinishState, Outcome, Status};

/// Opaque results sink; the core calls it at every stored coupling step.
/// Backends (CSV and friends) live outside the orchestration core.
pub trait Recorder {
    fn start(&mut self, _model: &Model) -> Result<(), Error> {
        Ok(())
    }

    fn record(&mut self, model: &Model, time: f64) -> Result<(), Error>;

    fn finish(&mut self, _model: &Model) -> Result<(), Error> {
        Ok(())
    }
}

/// Recorder that drops everything, for runs without results storage.
pub struct NoopRecorder;

impl Recorder for NoopRecorder {
    fn record(&mut self, _model: &Model, _time: f64) -> Result<(), Error> {
        Ok(())
    }
}

pub struct Task {
    time_start: f64,
    time_end: Option<f64>,
    delta_time: f64,
    end_type: EndKind,
    relative_eps: f64,
    input_at_end_time: bool,
    timing_output: bool,
    store_level: StoreLevelKind,

    params: StepTypeParams,
    step_type: Box<dyn StepType>,
    finish_state: Option<FinishState>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("time_start", &self.time_start)
            .field("time_end", &self.time_end)
            .field("delta_time", &self.delta_time)
            .field("end_type", &self.end_type)
            .field("step_type", &self.step_type.kind())
            .finish_non_exhaustive()
    }
}

impl Task {
    /// Resolve task settings from the input tree, applying the documented
    /// defaults for everything left unset.
    pub fn from_input(input: &TaskInput) -> Result<Task, Error> {
        let delta_time = input
            .delta_time
            .ok_or_else(|| Error::InvalidTask("coupling step size (delta_time) not set".into()))?;
        if delta_time <= 0.0 {
            return Err(Error::InvalidTask(format!(
                "coupling step size must be positive, got {delta_time}"
            )));
        }

        let time_start = input.start_time.unwrap_or(0.0);
        let end_type = input.end_type.unwrap_or_default();
        let time_end = input.end_time;

        if end_type == EndKind::Time && time_end.is_none() {
            return Err(Error::InvalidTask(
                "end time required for the end_time stop condition".into(),
            ));
        }
        if let Some(end) = time_end {
            if end <= time_start {
                return Err(Error::InvalidTask(format!(
                    "end time {end} does not lie after start time {time_start}"
                )));
            }
        }

        let sum_time = input.sum_time.unwrap_or(false);
        let input_at_end_time = input.input_at_end_time.unwrap_or(false);

        Ok(Task {
            time_start,
            time_end,
            delta_time,
            end_type,
            relative_eps: input.relative_eps.unwrap_or(1e-7),
            input_at_end_time,
            timing_output: input.timing_output.unwrap_or(false),
            store_level: input.results.store_level.unwrap_or_default(),
            params: StepTypeParams::new(time_start, delta_time, sum_time, input_at_end_time),
            step_type: create_step_type(input.step_type),
            finish_state: None,
        })
    }

    pub fn time_start(&self) -> f64 {
        self.time_start
    }

    pub fn time_end(&self) -> Option<f64> {
        self.time_end
    }

    /// The coupling step size; components with an own time step are checked
    /// against this in the binary fast-path test.
    pub fn time_step(&self) -> f64 {
        self.delta_time
    }

    pub fn step_kind(&self) -> StepKind {
        self.step_type.kind()
    }

    pub fn end_type(&self) -> EndKind {
        self.end_type
    }

    pub fn input_at_end_time(&self) -> bool {
        self.input_at_end_time
    }

    pub fn store_level(&self) -> StoreLevelKind {
        self.store_level
    }

    pub fn params(&self) -> &StepTypeParams {
        &self.params
    }

    pub fn finish_state(&self) -> Option<FinishState> {
        self.finish_state
    }

    /// Shared flag raised (e.g. from a signal handler) to stop the run at
    /// the next layer boundary.
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.params.abort_flag()
    }

    /// Configure the chosen step discipline against the computed evaluation
    /// order.
    pub fn setup(&mut self, model: &Model) -> Outcome {
        let submodel = model
            .submodel()
            .ok_or_else(|| Error::InvalidTask("model not set up".into()))?;
        self.step_type.configure(&self.params, submodel)
    }

    fn end_time_reached(&self) -> bool {
        match self.time_end {
            Some(end) => self.params.time + self.relative_eps * self.delta_time >= end,
            None => false,
        }
    }

    /// Advance the model until the stop condition is met. Results are
    /// handed to `recorder` at every stored step.
    pub fn run(&mut self, model: &mut Model, recorder: &mut dyn Recorder) -> Result<FinishState, Error> {
        let store = self.store_level != StoreLevelKind::None;
        let wall_start = Instant::now();
        let mut status = Status::Ok;

        recorder.start(model)?;
        if store {
            recorder.record(model, self.params.time)?;
        }

        let finish = loop {
            if self.params.abort_requested() {
                break FinishState::Aborted;
            }
            if self.end_time_reached() {
                break FinishState::TimeReached;
            }

            status = status.merge(self.step_type.do_step(&mut self.params, &mut model.step_parts()?)?);
            self.params.advance();

            if store {
                recorder.record(model, self.params.time)?;
            }

            if self.params.abort_requested() {
                break FinishState::Aborted;
            }
            if self.end_type == EndKind::FirstComponent && self.params.a_component_finished {
                log::info!("An element finished the co-simulation");
                break FinishState::Finished;
            }
        };

        recorder.finish(model)?;

        log::info!(
            "Simulation finished at t = {} after {} steps",
            self.params.time,
            self.params.num_steps
        );
        if self.timing_output {
            let wall = wall_start.elapsed().as_secs_f64();
            let simulated = self.params.time - self.time_start;
            if wall > 0.0 {
                log::info!("Real-time factor: {:.3}", simulated / wall);
            }
        }
        if status == Status::Warning {
            log::warn!("The run finished with warnings");
        }

        self.finish_state = Some(finish);
        Ok(finish)
    }
}
