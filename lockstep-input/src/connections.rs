//! Connection records: endpoints, decoupling settings and inter-/extrapolation
//! settings.

use serde::{Deserialize, Serialize};

use crate::{InputError, Location};

/// One side of a connection. A vector endpoint addresses the scalar slots
/// `[start_index, end_index]` (inclusive) of a vector port.
///
/// Untagged: the vector form is tried first, so a record without indices
/// falls through to the scalar form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EndpointInput {
    Vector {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        component: Option<String>,
        channel: String,
        start_index: usize,
        end_index: usize,
    },
    Scalar {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        component: Option<String>,
        channel: String,
    },
}

impl EndpointInput {
    pub fn scalar(component: impl Into<String>, channel: impl Into<String>) -> Self {
        Self::Scalar {
            component: Some(component.into()),
            channel: channel.into(),
        }
    }

    pub fn vector(
        component: impl Into<String>,
        channel: impl Into<String>,
        start_index: usize,
        end_index: usize,
    ) -> Self {
        Self::Vector {
            component: Some(component.into()),
            channel: channel.into(),
            start_index,
            end_index,
        }
    }

    pub fn component(&self) -> Option<&str> {
        match self {
            Self::Vector { component, .. } | Self::Scalar { component, .. } => component.as_deref(),
        }
    }

    pub fn channel(&self) -> &str {
        match self {
            Self::Vector { channel, .. } | Self::Scalar { channel, .. } => channel,
        }
    }
}

/// How a connection may participate in algebraic-loop decoupling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoupleKind {
    #[default]
    Default,
    Never,
    Always,
    IfNeeded,
}

impl std::str::FromStr for DecoupleKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "never" => Ok(Self::Never),
            "always" => Ok(Self::Always),
            "if_needed" => Ok(Self::IfNeeded),
            _ => Err(InputError::UnknownEnumValue {
                kind: "decouple type",
                value: s.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecoupleInput {
    #[serde(rename = "type", default)]
    pub kind: DecoupleKind,
    /// Higher priority wins when a loop offers several decoupling candidates.
    #[serde(default)]
    pub priority: i32,
}

/// Sampling grid of an inter-/extrapolation polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    #[default]
    Coupling,
    Synchronization,
}

impl std::str::FromStr for IntervalKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coupling" => Ok(Self::Coupling),
            "synchronization" => Ok(Self::Synchronization),
            _ => Err(InputError::UnknownEnumValue {
                kind: "inter-/extrapolation interval",
                value: s.into(),
            }),
        }
    }
}

/// Order of an inter-/extrapolation polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderKind {
    #[default]
    #[serde(rename = "zero")]
    Constant,
    #[serde(rename = "first")]
    Linear,
}

impl std::str::FromStr for OrderKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zero" => Ok(Self::Constant),
            "first" => Ok(Self::Linear),
            _ => Err(InputError::UnknownEnumValue {
                kind: "inter-/extrapolation order",
                value: s.into(),
            }),
        }
    }
}

/// One side (interpolation or extrapolation) of a polynomial setting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolynomialInput {
    #[serde(default)]
    pub interval: IntervalKind,
    #[serde(default)]
    pub order: OrderKind,
}

/// Presence of this record selects polynomial inter-/extrapolation for the
/// connection; absence means plain value transfer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterExtrapolationInput {
    #[serde(default)]
    pub interpolation: PolynomialInput,
    #[serde(default)]
    pub extrapolation: PolynomialInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionInput {
    pub from: EndpointInput,
    pub to: EndpointInput,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inter_extrapolation: Option<InterExtrapolationInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoupling: Option<DecoupleInput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl ConnectionInput {
    pub fn new(from: EndpointInput, to: EndpointInput) -> Self {
        Self {
            from,
            to,
            inter_extrapolation: None,
            decoupling: None,
            location: None,
        }
    }

    pub fn decoupled(mut self, kind: DecoupleKind, priority: i32) -> Self {
        self.decoupling = Some(DecoupleInput { kind, priority });
        self
    }

    pub fn with_inter_extrapolation(mut self, settings: InterExtrapolationInput) -> Self {
        self.inter_extrapolation = Some(settings);
        self
    }
}
