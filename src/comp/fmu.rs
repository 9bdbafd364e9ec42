//! The seam for FMU-style black-box co-simulation slaves.
//!
//! The core never loads FMUs itself; an embedder registers a factory that
//! produces [`FmuSlave`] implementations, and the core drives them through
//! this trait only.

use crate::bus::{component_error, ChannelValue, Databus};
use crate::sched::Dependencies;
use crate::{ComponentFinishState, Error, Outcome, Status};

/// Failure reported by an FMU binding; the core wraps it with the element
/// name.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FmuFault(pub String);

impl FmuFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The co-simulation interface of an opaque FMU binding.
///
/// Inputs and outputs are addressed by scalar channel index in declaration
/// order. Dependency queries may return `None`, in which case the core
/// assumes dense feedthrough.
pub trait FmuSlave: Send {
    fn enter_initialization_mode(&mut self) -> Result<(), FmuFault> {
        Ok(())
    }

    fn exit_initialization_mode(&mut self) -> Result<(), FmuFault> {
        Ok(())
    }

    fn initialize(&mut self, _start_time: f64) -> Result<(), FmuFault> {
        Ok(())
    }

    fn set_input(&mut self, index: usize, value: &ChannelValue) -> Result<(), FmuFault>;

    fn get_output(&mut self, index: usize) -> Result<ChannelValue, FmuFault>;

    /// Recompute initial outputs from the currently set inputs, used by the
    /// co-simulation-style initialization iteration.
    fn update_initial_outputs(&mut self) -> Result<(), FmuFault> {
        Ok(())
    }

    fn do_step(&mut self, time: f64, step_size: f64) -> Result<(), FmuFault>;

    fn finish_state(&self) -> ComponentFinishState {
        ComponentFinishState::NeverFinishes
    }

    /// Declared input-to-output feedthrough during a communication step.
    fn output_dependencies(&self) -> Option<Dependencies> {
        None
    }

    /// Declared feedthrough of initial output computation.
    fn initial_output_dependencies(&self) -> Option<Dependencies> {
        None
    }
}

/// Factory registered by the embedder to instantiate FMU bindings.
pub type FmuFactory =
    dyn Fn(&lockstep_input::ComponentInput) -> Result<Box<dyn FmuSlave>, Error>;

pub struct FmuComp {
    slave: Box<dyn FmuSlave>,
}

impl std::fmt::Debug for FmuComp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FmuComp").finish_non_exhaustive()
    }
}

fn fmu_error(name: &str, fault: FmuFault) -> Error {
    Error::Fmu {
        component: name.to_string(),
        message: fault.0,
    }
}

impl FmuComp {
    pub fn new(slave: Box<dyn FmuSlave>) -> Self {
        Self { slave }
    }

    pub fn enter_initialization_mode(&mut self, name: &str) -> Outcome {
        self.slave
            .enter_initialization_mode()
            .map_err(|e| fmu_error(name, e))?;
        Ok(Status::Ok)
    }

    pub fn exit_initialization_mode(&mut self, name: &str) -> Outcome {
        self.slave
            .exit_initialization_mode()
            .map_err(|e| fmu_error(name, e))?;
        Ok(Status::Ok)
    }

    pub fn initialize(&mut self, name: &str, start_time: f64) -> Outcome {
        self.slave
            .initialize(start_time)
            .map_err(|e| fmu_error(name, e))?;
        Ok(Status::Ok)
    }

    /// Push the current inport values into the slave.
    pub fn push_inputs(&mut self, databus: &Databus, name: &str) -> Outcome {
        for (index, channel) in databus.in_channels().iter().enumerate() {
            self.slave
                .set_input(index, &channel.value)
                .map_err(|e| fmu_error(name, e))?;
        }
        Ok(Status::Ok)
    }

    /// Pull the slave's outputs into the outport values.
    pub fn pull_outputs(&mut self, databus: &mut Databus, name: &str) -> Outcome {
        for index in 0..databus.num_out_channels() {
            let value = self
                .slave
                .get_output(index)
                .map_err(|e| fmu_error(name, e))?;
            databus
                .set_out_value(index, value)
                .map_err(|e| component_error(name, e))?;
        }
        Ok(Status::Ok)
    }

    pub fn update_initial_outputs(&mut self, databus: &mut Databus, name: &str) -> Outcome {
        self.slave
            .update_initial_outputs()
            .map_err(|e| fmu_error(name, e))?;
        self.pull_outputs(databus, name)
    }

    pub fn do_step(&mut self, databus: &Databus, name: &str, time: f64, step: f64) -> Outcome {
        self.push_inputs(databus, name)?;
        self.slave
            .do_step(time, step)
            .map_err(|e| fmu_error(name, e))?;
        Ok(Status::Ok)
    }

    pub fn finish_state(&self) -> ComponentFinishState {
        self.slave.finish_state()
    }

    /// Declared dependency matrix, validated against the channel counts;
    /// mismatched declarations fall back to dense feedthrough.
    pub fn dependencies(&self, name: &str, num_in: usize, num_out: usize, initial: bool) -> Dependencies {
        let declared = if initial {
            self.slave
                .initial_output_dependencies()
                .or_else(|| self.slave.output_dependencies())
        } else {
            self.slave.output_dependencies()
        };

        match declared {
            Some(deps) if deps.num_in() == num_in && deps.num_out() == num_out => deps,
            Some(_) => {
                log::warn!(
                    "Element {name}: declared dependency matrix does not match the port counts, \
                     assuming dense feedthrough"
                );
                Dependencies::dense(num_in, num_out)
            }
            None => Dependencies::dense(num_in, num_out),
        }
    }
}
