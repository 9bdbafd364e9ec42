//! Vector explicit-Euler integrator over an arbitrary set of vector ports.

use lockstep_input::model::{ComponentInput, SpecificDataInput};

use crate::bus::{component_error, ChannelType, Databus};
use crate::{Error, Outcome, Status};

#[derive(Debug)]
pub struct VectorIntegratorComp {
    num_states: usize,
    initial_state: f64,
    state: Vec<f64>,
    deriv: Vec<f64>,
    /// Buffer offset of each in/out vector channel, fixed during setup.
    in_offsets: Vec<usize>,
    out_offsets: Vec<usize>,
}

impl VectorIntegratorComp {
    /// Each vector inport carries derivatives for the vector outport of the
    /// same shape; the flattened port counts must agree.
    pub fn from_input(input: &ComponentInput, databus: &Databus) -> Result<Self, Error> {
        let num_all_in: usize = (0..databus.num_in_vectors())
            .map(|i| databus.in_vector_info(i).unwrap().len())
            .sum();
        let num_all_out: usize = (0..databus.num_out_vectors())
            .map(|i| databus.out_vector_info(i).unwrap().len())
            .sum();

        if num_all_in != num_all_out {
            return Err(Error::Component {
                component: input.name.clone(),
                message: format!(
                    "#inports ({num_all_in}) does not match the #outports ({num_all_out})"
                ),
            });
        }

        let initial_state = match &input.specific_data {
            Some(SpecificDataInput::VectorIntegrator { initial_state }) => {
                initial_state.unwrap_or(0.0)
            }
            _ => 0.0,
        };

        Ok(Self {
            num_states: num_all_out,
            initial_state,
            state: Vec::new(),
            deriv: Vec::new(),
            in_offsets: Vec::new(),
            out_offsets: Vec::new(),
        })
    }

    pub fn setup(&mut self, databus: &mut Databus, name: &str) -> Outcome {
        self.deriv = vec![0.0; self.num_states];
        self.state = vec![0.0; self.num_states];

        let mut next_idx = 0;
        for i in 0..databus.num_in_vectors() {
            let info = databus.in_vector_info(i).unwrap();
            let (start_idx, end_idx) = (info.start_index, info.end_index);
            let num_ch = end_idx - start_idx;
            databus
                .bind_in_vector(i, start_idx, end_idx, ChannelType::Double)
                .map_err(|e| component_error(name, e))?;
            self.in_offsets.push(next_idx);
            next_idx = next_idx + num_ch + 1;
        }

        let mut next_idx = 0;
        for i in 0..databus.num_out_vectors() {
            let info = databus.out_vector_info(i).unwrap();
            let (start_idx, end_idx) = (info.start_index, info.end_index);
            let num_ch = end_idx - start_idx;
            databus
                .bind_out_vector(i, start_idx, end_idx, ChannelType::Double)
                .map_err(|e| component_error(name, e))?;
            self.out_offsets.push(next_idx);
            next_idx = next_idx + num_ch + 1;
        }

        Ok(Status::Ok)
    }

    pub fn initialize(&mut self) {
        for state in &mut self.state {
            *state = self.initial_state;
        }
    }

    pub fn update_in_channels(&mut self, databus: &Databus, name: &str) -> Outcome {
        for (i, &offset) in self.in_offsets.iter().enumerate() {
            let len = databus.in_vector_info(i).unwrap().len();
            databus
                .read_in_slice(i, &mut self.deriv[offset..offset + len])
                .map_err(|e| component_error(name, e))?;
        }
        Ok(Status::Ok)
    }

    pub fn do_step(&mut self, databus: &Databus, name: &str, delta_time: f64) -> Outcome {
        self.update_in_channels(databus, name)?;
        for i in 0..self.num_states {
            self.state[i] += self.deriv[i] * delta_time;
        }
        Ok(Status::Ok)
    }

    pub fn write_outputs(&self, databus: &mut Databus, name: &str) -> Outcome {
        for (i, &offset) in self.out_offsets.iter().enumerate() {
            let len = databus.out_vector_info(i).unwrap().len();
            databus
                .write_out_slice(i, &self.state[offset..offset + len])
                .map_err(|e| component_error(name, e))?;
        }
        Ok(Status::Ok)
    }

    pub fn state(&self) -> &[f64] {
        &self.state
    }
}
