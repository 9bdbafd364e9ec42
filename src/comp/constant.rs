//! Boundary-condition element emitting fixed values on its outports.

use lockstep_input::model::{ComponentInput, ConstantValueInput, SpecificDataInput};

use crate::bus::{component_error, ChannelValue, Databus};
use crate::{Error, Outcome, Status};

/// One value block per out vector channel; scalars are vectors of length 1.
#[derive(Debug)]
pub struct ConstantComp {
    values: Vec<Vec<ChannelValue>>,
}

impl ConstantComp {
    pub fn from_input(input: &ComponentInput, databus: &Databus) -> Result<Self, Error> {
        let num_vec_out = databus.num_out_vectors();

        let declared = match &input.specific_data {
            Some(SpecificDataInput::Constant { values }) => values.as_slice(),
            _ => &[],
        };

        if !declared.is_empty() && declared.len() != num_vec_out {
            return Err(Error::Component {
                component: input.name.clone(),
                message: format!(
                    "expected {num_vec_out} value blocks, got {}",
                    declared.len()
                ),
            });
        }

        let mut values = Vec::with_capacity(num_vec_out);
        for i in 0..num_vec_out {
            let info = databus.out_vector_info(i).expect("declared out vector");
            let block = match declared.get(i) {
                Some(ConstantValueInput::Scalar(v)) => vec![ChannelValue::from(v)],
                Some(ConstantValueInput::Array(vs)) => {
                    vs.iter().map(ChannelValue::from).collect()
                }
                None => vec![ChannelValue::default_for(info.ty); info.len()],
            };
            if block.len() != info.len() {
                return Err(Error::Component {
                    component: input.name.clone(),
                    message: format!(
                        "value block for `{}` has {} entries, port covers {}",
                        info.name,
                        block.len(),
                        info.len()
                    ),
                });
            }
            values.push(block);
        }

        Ok(Self { values })
    }

    /// Bind every out vector channel as a reference to the stored values and
    /// publish them once.
    pub fn setup(&mut self, databus: &mut Databus, name: &str) -> Outcome {
        for (i, block) in self.values.iter().enumerate() {
            let info = databus.out_vector_info(i).expect("declared out vector");
            let (start, end, ty) = (info.start_index, info.end_index, info.ty);

            databus
                .bind_out_vector(i, start, end, ty)
                .map_err(|e| component_error(name, e))?;

            for (offset, value) in block.iter().enumerate() {
                databus
                    .set_out_value(start + offset, value.clone())
                    .map_err(|e| component_error(name, e))?;
            }
        }

        Ok(Status::Ok)
    }

    /// Values never change; republish them so outbound connections see a
    /// sample each step.
    pub fn write_outputs(&self, databus: &mut Databus, name: &str) -> Outcome {
        for (i, block) in self.values.iter().enumerate() {
            let start = databus
                .out_vector_info(i)
                .expect("declared out vector")
                .start_index;
            for (offset, value) in block.iter().enumerate() {
                databus
                    .set_out_value(start + offset, value.clone())
                    .map_err(|e| component_error(name, e))?;
            }
        }
        Ok(Status::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_input::model::{ComponentKindTag, PortInput};
    use lockstep_input::ScalarInput;

    fn input(values: Vec<ConstantValueInput>) -> ComponentInput {
        let mut input = ComponentInput::new(ComponentKindTag::Constant, "src");
        input.outports = vec![
            PortInput::double("y"),
            PortInput::double("v").with_dimension(2),
        ];
        input.specific_data = Some(SpecificDataInput::Constant { values });
        input
    }

    #[test]
    fn scalar_and_array_values_bind_to_channels() {
        let input = input(vec![
            ConstantValueInput::Scalar(ScalarInput::Double(1.5)),
            ConstantValueInput::Array(vec![ScalarInput::Double(2.0), ScalarInput::Double(3.0)]),
        ]);
        let mut databus = Databus::from_ports(&input.inports, &input.outports).unwrap();
        let mut comp = ConstantComp::from_input(&input, &databus).unwrap();

        comp.setup(&mut databus, "src").unwrap();
        assert_eq!(databus.out_channel(0).unwrap().value, ChannelValue::Double(1.5));
        assert_eq!(databus.out_channel(1).unwrap().value, ChannelValue::Double(2.0));
        assert_eq!(databus.out_channel(2).unwrap().value, ChannelValue::Double(3.0));
    }

    #[test]
    fn wrong_block_length_is_rejected() {
        let input = input(vec![
            ConstantValueInput::Scalar(ScalarInput::Double(1.0)),
            ConstantValueInput::Array(vec![ScalarInput::Double(2.0)]),
        ]);
        let databus = Databus::from_ports(&input.inports, &input.outports).unwrap();
        assert!(matches!(
            ConstantComp::from_input(&input, &databus),
            Err(Error::Component { .. })
        ));
    }

    #[test]
    fn missing_values_default_to_zero() {
        let mut input = ComponentInput::new(ComponentKindTag::Constant, "src");
        input.outports = vec![PortInput::double("y")];
        let mut databus = Databus::from_ports(&input.inports, &input.outports).unwrap();
        let mut comp = ConstantComp::from_input(&input, &databus).unwrap();
        comp.setup(&mut databus, "src").unwrap();
        assert_eq!(databus.out_channel(0).unwrap().value, ChannelValue::Double(0.0));
    }
}
