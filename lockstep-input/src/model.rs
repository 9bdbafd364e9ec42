//! Model part of the system description: components, their ports, and the
//! connections between them.

use serde::{Deserialize, Serialize};

use crate::{connections::ConnectionInput, InputError, Location, ScalarInput};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelInput {
    pub components: Vec<ComponentInput>,
    #[serde(default)]
    pub connections: Vec<ConnectionInput>,
}

/// The closed set of component kinds the core can instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKindTag {
    Constant,
    Fmu,
    Integrator,
    VectorIntegrator,
}

impl std::str::FromStr for ComponentKindTag {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constant" => Ok(Self::Constant),
            "fmu" => Ok(Self::Fmu),
            "integrator" => Ok(Self::Integrator),
            "vector_integrator" => Ok(Self::VectorIntegrator),
            _ => Err(InputError::UnknownEnumValue {
                kind: "component type",
                value: s.into(),
            }),
        }
    }
}

impl std::fmt::Display for ComponentKindTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Constant => "CONSTANT",
            Self::Fmu => "FMU",
            Self::Integrator => "INTEGRATOR",
            Self::VectorIntegrator => "VECTOR_INTEGRATOR",
        };
        f.write_str(name)
    }
}

/// Value type of a declared port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    #[default]
    Double,
    Integer,
    Bool,
    String,
    Binary,
}

/// Whether a port must be connected for the model to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortModeKind {
    #[default]
    Optional,
    Mandatory,
}

/// A declared inport or outport. `dimension` turns the port into a vector
/// channel covering that many scalar slots; a scalar port is a vector of
/// length 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortInput {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: PortKind,
    #[serde(default)]
    pub mode: PortModeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

impl PortInput {
    /// Shorthand for a scalar double port, the dominant case in tests and
    /// generated descriptions.
    pub fn double(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PortKind::Double,
            mode: PortModeKind::Optional,
            unit: None,
            dimension: None,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mode = PortModeKind::Mandatory;
        self
    }

    pub fn with_kind(mut self, kind: PortKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

/// An initial value for a named port, applied before initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitialValueInput {
    pub port: String,
    pub value: ScalarInput,
}

/// A named parameter of a component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterInput {
    pub name: String,
    pub value: ScalarInput,
}

/// One value of a constant component: a scalar per scalar channel, an array
/// per vector channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstantValueInput {
    Array(Vec<ScalarInput>),
    Scalar(ScalarInput),
}

/// Kind-specific settings of a component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecificDataInput {
    Constant {
        values: Vec<ConstantValueInput>,
    },
    Integrator {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_state: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gain: Option<f64>,
    },
    VectorIntegrator {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_state: Option<f64>,
    },
    Fmu {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentInput {
    #[serde(rename = "type")]
    pub kind: ComponentKindTag,
    pub name: String,

    #[serde(default)]
    pub inports: Vec<PortInput>,
    #[serde(default)]
    pub outports: Vec<PortInput>,

    #[serde(default)]
    pub parameters: Vec<ParameterInput>,
    #[serde(default)]
    pub initial_values: Vec<InitialValueInput>,

    /// Position in an externally defined trigger sequence; `>= 0` disables
    /// user decoupling metadata model-wide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_sequence: Option<i32>,
    /// Evaluate inbound filters at the end of the coupling interval instead
    /// of its start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_at_end_time: Option<bool>,
    /// Own communication step size of the element, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_time: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_data: Option<SpecificDataInput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl ComponentInput {
    pub fn new(kind: ComponentKindTag, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            inports: Vec::new(),
            outports: Vec::new(),
            parameters: Vec::new(),
            initial_values: Vec::new(),
            trigger_sequence: None,
            input_at_end_time: None,
            delta_time: None,
            specific_data: None,
            location: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_kind_mapping() {
        for (text, kind) in [
            ("constant", ComponentKindTag::Constant),
            ("fmu", ComponentKindTag::Fmu),
            ("integrator", ComponentKindTag::Integrator),
            ("vector_integrator", ComponentKindTag::VectorIntegrator),
        ] {
            assert_eq!(text.parse::<ComponentKindTag>().unwrap(), kind);
        }
        assert!("INTEGRATOR".parse::<ComponentKindTag>().is_err());
    }

    #[test]
    fn component_from_json() {
        let comp: ComponentInput = serde_json::from_str(
            r#"{
                "type": "integrator",
                "name": "int1",
                "inports": [{"name": "u", "mode": "mandatory"}],
                "outports": [{"name": "y"}],
                "specific_data": {"integrator": {"initial_state": 0.0, "gain": 1.0}}
            }"#,
        )
        .unwrap();

        assert_eq!(comp.kind, ComponentKindTag::Integrator);
        assert_eq!(comp.inports[0].mode, PortModeKind::Mandatory);
        assert_eq!(comp.outports[0].kind, PortKind::Double);
        assert!(matches!(
            comp.specific_data,
            Some(SpecificDataInput::Integrator {
                gain: Some(g),
                ..
            }) if g == 1.0
        ));
    }

    #[test]
    fn constant_values_scalar_or_array() {
        let values: Vec<ConstantValueInput> =
            serde_json::from_str(r#"[1.0, [1.0, 2.0, 3.0]]"#).unwrap();
        assert!(matches!(values[0], ConstantValueInput::Scalar(_)));
        assert!(matches!(&values[1], ConstantValueInput::Array(a) if a.len() == 3));
    }
}
