//! Scalar explicit-Euler integrator: `y += gain * u * dt`.

use lockstep_input::model::{ComponentInput, SpecificDataInput};
use lockstep_input::ScalarInput;

use crate::bus::{component_error, ChannelType, ChannelValue, Databus};
use crate::{Error, Outcome, Status};

#[derive(Debug)]
pub struct IntegratorComp {
    initial_state: f64,
    gain: f64,
    state: f64,
    deriv: f64,
}

fn parameter(input: &ComponentInput, name: &str) -> Option<f64> {
    input.parameters.iter().find(|p| p.name == name).and_then(|p| match &p.value {
        ScalarInput::Double(v) => Some(*v),
        ScalarInput::Integer(v) => Some(*v as f64),
        _ => None,
    })
}

impl IntegratorComp {
    pub fn from_input(input: &ComponentInput) -> Result<Self, Error> {
        let (mut initial_state, mut gain) = (None, None);
        if let Some(SpecificDataInput::Integrator {
            initial_state: i,
            gain: g,
        }) = &input.specific_data
        {
            initial_state = *i;
            gain = *g;
        }

        Ok(Self {
            initial_state: initial_state
                .or_else(|| parameter(input, "initial_state"))
                .unwrap_or(0.0),
            gain: gain.or_else(|| parameter(input, "gain")).unwrap_or(1.0),
            state: 0.0,
            deriv: 0.0,
        })
    }

    /// Expects exactly one Double inport (`u`) and one Double outport (`y`).
    pub fn setup(&mut self, databus: &mut Databus, name: &str) -> Outcome {
        let ok = databus.num_in_channels() == 1
            && databus.num_out_channels() == 1
            && databus.in_channel(0).unwrap().info.ty == ChannelType::Double
            && databus.out_channel(0).unwrap().info.ty == ChannelType::Double;
        if !ok {
            return Err(Error::Component {
                component: name.to_string(),
                message: "integrator requires one Double inport and one Double outport".into(),
            });
        }
        Ok(Status::Ok)
    }

    pub fn initialize(&mut self) {
        self.state = self.initial_state;
    }

    pub fn update_in_channels(&mut self, databus: &Databus) {
        self.deriv = databus
            .in_channel(0)
            .and_then(|c| c.value.as_double())
            .unwrap_or(0.0);
    }

    pub fn do_step(&mut self, databus: &Databus, delta_time: f64) {
        self.update_in_channels(databus);
        self.state += self.gain * self.deriv * delta_time;
    }

    pub fn write_outputs(&self, databus: &mut Databus, name: &str) -> Outcome {
        databus
            .set_out_value(0, ChannelValue::Double(self.state))
            .map_err(|e| component_error(name, e))?;
        Ok(Status::Ok)
    }

    pub fn state(&self) -> f64 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_input::model::{ComponentKindTag, PortInput};

    fn make() -> (IntegratorComp, Databus) {
        let mut input = ComponentInput::new(ComponentKindTag::Integrator, "int");
        input.inports = vec![PortInput::double("u")];
        input.outports = vec![PortInput::double("y")];
        input.specific_data = Some(SpecificDataInput::Integrator {
            initial_state: Some(0.5),
            gain: Some(2.0),
        });
        let databus = Databus::from_ports(&input.inports, &input.outports).unwrap();
        (IntegratorComp::from_input(&input).unwrap(), databus)
    }

    #[test]
    fn euler_step_applies_gain() {
        let (mut comp, mut databus) = make();
        comp.setup(&mut databus, "int").unwrap();
        comp.initialize();
        assert_eq!(comp.state(), 0.5);

        databus.in_channel_mut(0).unwrap().value = ChannelValue::Double(1.0);
        comp.do_step(&databus, 0.1);
        assert!((comp.state() - 0.7).abs() < 1e-12);

        comp.write_outputs(&mut databus, "int").unwrap();
        assert_eq!(
            databus.out_channel(0).unwrap().value.as_double().unwrap(),
            comp.state()
        );
    }

    #[test]
    fn parameters_fall_back_to_parameter_list() {
        let mut input = ComponentInput::new(ComponentKindTag::Integrator, "int");
        input.inports = vec![PortInput::double("u")];
        input.outports = vec![PortInput::double("y")];
        input.parameters = vec![lockstep_input::model::ParameterInput {
            name: "gain".into(),
            value: ScalarInput::Double(3.0),
        }];
        let comp = IntegratorComp::from_input(&input).unwrap();
        assert_eq!(comp.gain, 3.0);
        assert_eq!(comp.initial_state, 0.0);
    }

    #[test]
    fn wrong_port_shape_is_rejected() {
        let mut input = ComponentInput::new(ComponentKindTag::Integrator, "int");
        input.outports = vec![PortInput::double("y")];
        let mut databus = Databus::from_ports(&input.inports, &input.outports).unwrap();
        let mut comp = IntegratorComp::from_input(&input).unwrap();
        assert!(comp.setup(&mut databus, "int").is_err());
    }
}
