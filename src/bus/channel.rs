//! Typed value slots on a component's databus.

use std::sync::Arc;

use lockstep_input::model::{PortKind, PortModeKind};
use lockstep_input::ScalarInput;

use crate::conn::ConnId;

/// Value type of a channel.
///
/// `Binary` and `BinaryReference` carry the same payload; they differ in
/// transfer semantics. A `Binary` connection owns a per-connection copy of
/// the bytes, a `BinaryReference` connection shares the source buffer
/// (promotion happens in the binary-channel preprocessing pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    Double,
    Integer,
    Bool,
    String,
    Binary,
    BinaryReference,
}

impl ChannelType {
    pub fn is_binary(self) -> bool {
        matches!(self, Self::Binary | Self::BinaryReference)
    }

    /// Type compatibility of connection endpoints: plain equality, with the
    /// two binary flavors considered the same type. Mixing anything else is
    /// a hard error at resolution time.
    pub fn compatible(self, other: ChannelType) -> bool {
        self == other || (self.is_binary() && other.is_binary())
    }
}

impl From<PortKind> for ChannelType {
    fn from(kind: PortKind) -> Self {
        match kind {
            PortKind::Double => Self::Double,
            PortKind::Integer => Self::Integer,
            PortKind::Bool => Self::Bool,
            PortKind::String => Self::String,
            PortKind::Binary => Self::Binary,
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Double => "Double",
            Self::Integer => "Integer",
            Self::Bool => "Bool",
            Self::String => "String",
            Self::Binary => "Binary",
            Self::BinaryReference => "BinaryReference",
        };
        f.write_str(name)
    }
}

/// A channel value. `Binary` payloads are reference counted so that a
/// promoted binary-reference transfer is a pointer copy.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValue {
    Double(f64),
    Integer(i32),
    Bool(bool),
    String(String),
    Binary(Arc<[u8]>),
}

impl ChannelValue {
    /// Zero value of the given type.
    pub fn default_for(ty: ChannelType) -> Self {
        match ty {
            ChannelType::Double => Self::Double(0.0),
            ChannelType::Integer => Self::Integer(0),
            ChannelType::Bool => Self::Bool(false),
            ChannelType::String => Self::String(String::new()),
            ChannelType::Binary | ChannelType::BinaryReference => Self::Binary(Arc::from(&[][..])),
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        match self {
            Self::Double(_) => ChannelType::Double,
            Self::Integer(_) => ChannelType::Integer,
            Self::Bool(_) => ChannelType::Bool,
            Self::String(_) => ChannelType::String,
            Self::Binary(_) => ChannelType::Binary,
        }
    }

    /// Whether this value can be stored in a channel of type `ty`.
    pub fn fits(&self, ty: ChannelType) -> bool {
        self.channel_type().compatible(ty)
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Copy this value into a connection of the given channel type. For
    /// `Binary` the bytes are copied into a fresh buffer; for
    /// `BinaryReference` the existing buffer is shared.
    pub fn transfer(&self, ty: ChannelType) -> ChannelValue {
        match (self, ty) {
            (Self::Binary(bytes), ChannelType::Binary) => Self::Binary(Arc::from(&bytes[..])),
            _ => self.clone(),
        }
    }
}

impl From<&ScalarInput> for ChannelValue {
    fn from(value: &ScalarInput) -> Self {
        match value {
            ScalarInput::Bool(v) => Self::Bool(*v),
            ScalarInput::Integer(v) => Self::Integer(*v as i32),
            ScalarInput::Double(v) => Self::Double(*v),
            ScalarInput::String(v) => Self::String(v.clone()),
        }
    }
}

/// Whether a channel must be connected for the model to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    #[default]
    Optional,
    Mandatory,
}

impl From<PortModeKind> for ChannelMode {
    fn from(mode: PortModeKind) -> Self {
        match mode {
            PortModeKind::Optional => Self::Optional,
            PortModeKind::Mandatory => Self::Mandatory,
        }
    }
}

/// Static description of a scalar channel.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub name: String,
    /// Mutable: the binary preprocessing pass may promote `Binary` to
    /// `BinaryReference` before connections are materialized.
    pub ty: ChannelType,
    pub mode: ChannelMode,
    pub unit: Option<String>,
    /// Index of the channel in its databus direction.
    pub id: usize,
}

/// An input channel: holds the most recently pulled value and at most one
/// inbound connection after resolution.
#[derive(Debug, Clone)]
pub struct ChannelIn {
    pub info: ChannelInfo,
    pub value: ChannelValue,
    pub connection: Option<ConnId>,
}

impl ChannelIn {
    pub fn new(info: ChannelInfo) -> Self {
        let value = ChannelValue::default_for(info.ty);
        Self {
            info,
            value,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

/// An output channel: holds the value written by its owning component and
/// the list of outgoing connections.
#[derive(Debug, Clone)]
pub struct ChannelOut {
    pub info: ChannelInfo,
    pub value: ChannelValue,
    pub connections: Vec<ConnId>,
}

impl ChannelOut {
    pub fn new(info: ChannelInfo) -> Self {
        let value = ChannelValue::default_for(info.ty);
        Self {
            info,
            value,
            connections: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }
}
