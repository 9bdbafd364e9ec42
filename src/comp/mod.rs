//! Simulation elements and their closed dispatch.
//!
//! A [`Component`] carries everything all element kinds share (identity,
//! databus, timing settings); behavior is dispatched over the closed
//! [`ComponentKind`] variant. The FMU kind delegates to the opaque
//! [`FmuSlave`] binding registered by the embedder.

mod constant;
mod fmu;
mod integrator;
mod vector_integrator;

pub use constant::ConstantComp;
pub use fmu::{FmuComp, FmuFactory, FmuFault, FmuSlave};
pub use integrator::IntegratorComp;
pub use vector_integrator::VectorIntegratorComp;

use lockstep_input::model::ComponentKindTag;
use lockstep_input::ComponentInput;

use crate::bus::{ChannelValue, Databus};
use crate::sched::{Dependencies, DependencyKind};
use crate::{ComponentFinishState, Error, Outcome, Status};

#[derive(Debug)]
pub enum ComponentKind {
    Constant(ConstantComp),
    Fmu(FmuComp),
    Integrator(IntegratorComp),
    VectorIntegrator(VectorIntegratorComp),
}

#[derive(Debug)]
pub struct Component {
    id: usize,
    name: String,
    tag: ComponentKindTag,
    databus: Databus,

    /// Own communication step size, if declared.
    delta_time: Option<f64>,
    trigger_sequence: Option<i32>,
    input_at_end_time: Option<bool>,

    /// Initial port values from the input tree, applied during databus
    /// setup.
    initial_values: Vec<(String, ChannelValue)>,

    /// Local clock: end time of the last completed step.
    time: f64,
    /// Guard against double stepping when a component owns several
    /// evaluation groups within one coupling step.
    stepped_until: f64,

    kind: ComponentKind,
}

/// Instantiate a component from its input record. `id` is the insertion
/// order in the model. FMU components require a registered factory.
pub fn create_component(
    input: &ComponentInput,
    id: usize,
    fmu_factory: Option<&FmuFactory>,
) -> Result<Component, Error> {
    let databus = Databus::from_ports(&input.inports, &input.outports)?;

    let kind = match input.kind {
        ComponentKindTag::Constant => {
            ComponentKind::Constant(ConstantComp::from_input(input, &databus)?)
        }
        ComponentKindTag::Integrator => {
            ComponentKind::Integrator(IntegratorComp::from_input(input)?)
        }
        ComponentKindTag::VectorIntegrator => {
            ComponentKind::VectorIntegrator(VectorIntegratorComp::from_input(input, &databus)?)
        }
        ComponentKindTag::Fmu => {
            let factory = fmu_factory.ok_or_else(|| Error::Fmu {
                component: input.name.clone(),
                message: "no FMU binding registered".into(),
            })?;
            ComponentKind::Fmu(FmuComp::new(factory(input)?))
        }
    };

    Ok(Component {
        id,
        name: input.name.clone(),
        tag: input.kind,
        databus,
        delta_time: input.delta_time,
        trigger_sequence: input.trigger_sequence,
        input_at_end_time: input.input_at_end_time,
        initial_values: input
            .initial_values
            .iter()
            .map(|iv| (iv.port.clone(), ChannelValue::from(&iv.value)))
            .collect(),
        time: 0.0,
        stepped_until: f64::NEG_INFINITY,
        kind,
    })
}

impl Component {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> ComponentKindTag {
        self.tag
    }

    pub fn databus(&self) -> &Databus {
        &self.databus
    }

    pub fn databus_mut(&mut self) -> &mut Databus {
        &mut self.databus
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub fn has_own_time(&self) -> bool {
        self.delta_time.is_some()
    }

    pub fn time_step(&self) -> Option<f64> {
        self.delta_time
    }

    pub fn sequence_number(&self) -> Option<i32> {
        self.trigger_sequence
    }

    pub fn input_at_end_time(&self) -> Option<bool> {
        self.input_at_end_time
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Kind-specific setup: buffer allocation and reference-vector binding.
    pub fn setup(&mut self) -> Outcome {
        match &mut self.kind {
            ComponentKind::Constant(c) => c.setup(&mut self.databus, &self.name),
            ComponentKind::Integrator(c) => c.setup(&mut self.databus, &self.name),
            ComponentKind::VectorIntegrator(c) => c.setup(&mut self.databus, &self.name),
            ComponentKind::Fmu(_) => Ok(Status::Ok),
        }
    }

    /// Generic databus setup: apply initial port values from the input
    /// tree. Unknown port names are reported as warnings, not errors.
    pub fn setup_databus(&mut self) -> Outcome {
        let mut status = Status::Ok;

        for (port, value) in std::mem::take(&mut self.initial_values) {
            let applied = if let Some(idx) = self.databus.find_in_vector(&port) {
                let info = self.databus.in_vector_info(idx).unwrap().clone();
                (info.start_index..=info.end_index)
                    .try_for_each(|i| self.databus.set_in_value(i, value.clone()))
            } else if let Some(idx) = self.databus.find_out_vector(&port) {
                let info = self.databus.out_vector_info(idx).unwrap().clone();
                (info.start_index..=info.end_index)
                    .try_for_each(|i| self.databus.set_out_value(i, value.clone()))
            } else {
                log::warn!(
                    "Element {}: initial value for unknown port `{port}` ignored",
                    self.name
                );
                status = status.merge(Status::Warning);
                continue;
            };

            applied.map_err(|e| crate::bus::component_error(&self.name, e))?;
        }

        Ok(status)
    }

    pub fn enter_initialization_mode(&mut self) -> Outcome {
        match &mut self.kind {
            ComponentKind::Fmu(c) => c.enter_initialization_mode(&self.name),
            _ => Ok(Status::Ok),
        }
    }

    pub fn initialize(&mut self, start_time: f64) -> Outcome {
        self.time = start_time;
        self.stepped_until = f64::NEG_INFINITY;
        match &mut self.kind {
            ComponentKind::Constant(_) => Ok(Status::Ok),
            ComponentKind::Integrator(c) => {
                c.initialize();
                Ok(Status::Ok)
            }
            ComponentKind::VectorIntegrator(c) => {
                c.initialize();
                Ok(Status::Ok)
            }
            ComponentKind::Fmu(c) => c.initialize(&self.name, start_time),
        }
    }

    pub fn exit_initialization_mode(&mut self) -> Outcome {
        match &mut self.kind {
            ComponentKind::Fmu(c) => c.exit_initialization_mode(&self.name),
            _ => Ok(Status::Ok),
        }
    }

    /// Pull the current inport values into internal buffers.
    pub fn update_in_channels(&mut self) -> Outcome {
        match &mut self.kind {
            ComponentKind::Constant(_) => Ok(Status::Ok),
            ComponentKind::Integrator(c) => {
                c.update_in_channels(&self.databus);
                Ok(Status::Ok)
            }
            ComponentKind::VectorIntegrator(c) => c.update_in_channels(&self.databus, &self.name),
            ComponentKind::Fmu(c) => c.push_inputs(&self.databus, &self.name),
        }
    }

    /// Recompute initial outputs from the current inputs (co-simulation
    /// initialization iteration).
    pub fn update_initial_out_channels(&mut self) -> Outcome {
        match &mut self.kind {
            ComponentKind::Fmu(c) => c.update_initial_outputs(&mut self.databus, &self.name),
            _ => Ok(Status::Ok),
        }
    }

    /// Advance the element over `[time, end_time]`. When a component owns
    /// several evaluation groups, only the first call per coupling step
    /// advances the state.
    pub fn do_step(
        &mut self,
        _group: usize,
        time: f64,
        delta_time: f64,
        end_time: f64,
        _is_new_step: bool,
    ) -> Outcome {
        if end_time <= self.stepped_until {
            return Ok(Status::Ok);
        }

        let result = match &mut self.kind {
            ComponentKind::Constant(_) => Ok(Status::Ok),
            ComponentKind::Integrator(c) => {
                c.do_step(&self.databus, delta_time);
                Ok(Status::Ok)
            }
            ComponentKind::VectorIntegrator(c) => c.do_step(&self.databus, &self.name, delta_time),
            ComponentKind::Fmu(c) => c.do_step(&self.databus, &self.name, time, delta_time),
        };

        if result.is_ok() {
            self.stepped_until = end_time;
            self.time = end_time;
        }
        result
    }

    /// Publish the element's state on its outport values.
    pub fn write_outputs(&mut self) -> Outcome {
        match &mut self.kind {
            ComponentKind::Constant(c) => c.write_outputs(&mut self.databus, &self.name),
            ComponentKind::Integrator(c) => c.write_outputs(&mut self.databus, &self.name),
            ComponentKind::VectorIntegrator(c) => c.write_outputs(&mut self.databus, &self.name),
            ComponentKind::Fmu(c) => c.pull_outputs(&mut self.databus, &self.name),
        }
    }

    pub fn finish_state(&self) -> ComponentFinishState {
        match &self.kind {
            ComponentKind::Fmu(c) => c.finish_state(),
            _ => ComponentFinishState::NeverFinishes,
        }
    }

    /// Input-to-output dependency matrix for the requested relation.
    /// Built-in integrators feed through at runtime but compute their
    /// initial outputs from their state alone.
    pub fn dependencies(&self, which: DependencyKind) -> Dependencies {
        let num_in = self.databus.num_in_channels();
        let num_out = self.databus.num_out_channels();

        match (&self.kind, which) {
            (ComponentKind::Constant(_), _) => Dependencies::independent(num_in, num_out),
            (ComponentKind::Integrator(_), DependencyKind::Runtime)
            | (ComponentKind::VectorIntegrator(_), DependencyKind::Runtime) => {
                Dependencies::dense(num_in, num_out)
            }
            (ComponentKind::Integrator(_), DependencyKind::Initial)
            | (ComponentKind::VectorIntegrator(_), DependencyKind::Initial) => {
                Dependencies::independent(num_in, num_out)
            }
            (ComponentKind::Fmu(c), which) => c.dependencies(
                &self.name,
                num_in,
                num_out,
                which == DependencyKind::Initial,
            ),
        }
    }
}
