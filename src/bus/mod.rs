//! Per-component container of typed input and output channels.
//!
//! A databus presents both a scalar view (one port, one value) and a vector
//! view (one port, a contiguous range of scalar values) over the same
//! underlying channel lists, and mediates value propagation between
//! components: inbound connections are pulled in [`Databus::trigger_in_connections`],
//! outbound connections are refreshed in [`Databus::update_out_connections`].

mod channel;
mod vector;

pub use channel::{ChannelIn, ChannelInfo, ChannelMode, ChannelOut, ChannelType, ChannelValue};
pub use vector::VectorChannelInfo;

use lockstep_input::model::PortInput;

use crate::conn::Connections;
use crate::{Error, Outcome, Status, TimeInterval};

/// Errors local to a databus; callers wrap them with the owning component's
/// name.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("no vector channel with index {index}")]
    NoSuchVector { index: usize },

    #[error("no scalar channel with index {index}")]
    NoSuchChannel { index: usize },

    #[error("range [{start}, {end}] exceeds vector channel `{name}`")]
    RangeExceeded {
        name: String,
        start: usize,
        end: usize,
    },

    #[error("type {requested} is incompatible with channel `{name}` of type {actual}")]
    TypeIncompatible {
        name: String,
        requested: ChannelType,
        actual: ChannelType,
    },

    #[error("vector channel `{name}` expects {expected} values, got {got}")]
    SliceLength {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("vector channel `{name}` is not bound to a reference buffer")]
    NotBound { name: String },

    #[error("value of type {value} does not fit channel `{name}` of type {ty}")]
    ValueType {
        name: String,
        value: ChannelType,
        ty: ChannelType,
    },
}

#[derive(Debug, Default)]
pub struct Databus {
    in_channels: Vec<ChannelIn>,
    out_channels: Vec<ChannelOut>,
    in_vectors: Vec<VectorChannelInfo>,
    out_vectors: Vec<VectorChannelInfo>,
}

fn flatten_ports(
    ports: &[PortInput],
) -> Result<(Vec<ChannelInfo>, Vec<VectorChannelInfo>), Error> {
    let mut infos = Vec::new();
    let mut vectors = Vec::new();

    for port in ports {
        let ty = ChannelType::from(port.kind);
        let dimension = port.dimension.unwrap_or(1);
        if dimension == 0 {
            return Err(Error::InvalidVectorRange {
                channel: port.name.clone(),
                start_index: 0,
                end_index: 0,
            });
        }

        let start = infos.len();
        let end = start + dimension - 1;
        vectors.push(VectorChannelInfo::new(port.name.clone(), ty, start, end));

        for offset in 0..dimension {
            let name = if dimension == 1 {
                port.name.clone()
            } else {
                format!("{}[{offset}]", port.name)
            };
            infos.push(ChannelInfo {
                name,
                ty,
                mode: port.mode.into(),
                unit: port.unit.clone(),
                id: start + offset,
            });
        }
    }

    Ok((infos, vectors))
}

impl Databus {
    /// Build the channel lists from declared ports. Every port becomes one
    /// vector channel; a scalar port is a vector of length 1.
    pub fn from_ports(inports: &[PortInput], outports: &[PortInput]) -> Result<Self, Error> {
        let (in_infos, in_vectors) = flatten_ports(inports)?;
        let (out_infos, out_vectors) = flatten_ports(outports)?;

        Ok(Self {
            in_channels: in_infos.into_iter().map(ChannelIn::new).collect(),
            out_channels: out_infos.into_iter().map(ChannelOut::new).collect(),
            in_vectors,
            out_vectors,
        })
    }

    pub fn num_in_channels(&self) -> usize {
        self.in_channels.len()
    }

    pub fn num_out_channels(&self) -> usize {
        self.out_channels.len()
    }

    pub fn num_in_vectors(&self) -> usize {
        self.in_vectors.len()
    }

    pub fn num_out_vectors(&self) -> usize {
        self.out_vectors.len()
    }

    pub fn in_channel(&self, index: usize) -> Option<&ChannelIn> {
        self.in_channels.get(index)
    }

    pub fn in_channel_mut(&mut self, index: usize) -> Option<&mut ChannelIn> {
        self.in_channels.get_mut(index)
    }

    pub fn out_channel(&self, index: usize) -> Option<&ChannelOut> {
        self.out_channels.get(index)
    }

    pub fn out_channel_mut(&mut self, index: usize) -> Option<&mut ChannelOut> {
        self.out_channels.get_mut(index)
    }

    pub fn in_channels(&self) -> &[ChannelIn] {
        &self.in_channels
    }

    pub fn out_channels(&self) -> &[ChannelOut] {
        &self.out_channels
    }

    pub fn in_vector_info(&self, index: usize) -> Option<&VectorChannelInfo> {
        self.in_vectors.get(index)
    }

    pub fn out_vector_info(&self, index: usize) -> Option<&VectorChannelInfo> {
        self.out_vectors.get(index)
    }

    pub fn find_in_vector(&self, name: &str) -> Option<usize> {
        self.in_vectors.iter().position(|v| v.name == name)
    }

    pub fn find_out_vector(&self, name: &str) -> Option<usize> {
        self.out_vectors.iter().position(|v| v.name == name)
    }

    /// Bind a contiguous run of output channels to a component-owned buffer.
    /// Fails if the range exceeds the declared vector channel or the type is
    /// incompatible.
    pub fn bind_out_vector(
        &mut self,
        vector_idx: usize,
        start: usize,
        end: usize,
        ty: ChannelType,
    ) -> Result<(), BusError> {
        Self::bind_vector(&mut self.out_vectors, vector_idx, start, end, ty)
    }

    /// Symmetric to [`Databus::bind_out_vector`] for inputs.
    pub fn bind_in_vector(
        &mut self,
        vector_idx: usize,
        start: usize,
        end: usize,
        ty: ChannelType,
    ) -> Result<(), BusError> {
        Self::bind_vector(&mut self.in_vectors, vector_idx, start, end, ty)
    }

    fn bind_vector(
        vectors: &mut [VectorChannelInfo],
        vector_idx: usize,
        start: usize,
        end: usize,
        ty: ChannelType,
    ) -> Result<(), BusError> {
        let info = vectors.get_mut(vector_idx).ok_or(BusError::NoSuchVector {
            index: vector_idx,
        })?;
        if !info.covers(start, end) {
            return Err(BusError::RangeExceeded {
                name: info.name.clone(),
                start,
                end,
            });
        }
        if !ty.compatible(info.ty) {
            return Err(BusError::TypeIncompatible {
                name: info.name.clone(),
                requested: ty,
                actual: info.ty,
            });
        }
        info.bound = true;
        Ok(())
    }

    /// Copy a component-owned double buffer into the scalar channels of a
    /// bound output vector.
    pub fn write_out_slice(&mut self, vector_idx: usize, values: &[f64]) -> Result<(), BusError> {
        let info = self
            .out_vectors
            .get(vector_idx)
            .ok_or(BusError::NoSuchVector { index: vector_idx })?;
        if !info.bound {
            return Err(BusError::NotBound {
                name: info.name.clone(),
            });
        }
        if values.len() != info.len() {
            return Err(BusError::SliceLength {
                name: info.name.clone(),
                expected: info.len(),
                got: values.len(),
            });
        }
        for (offset, value) in values.iter().enumerate() {
            self.out_channels[info.start_index + offset].value = ChannelValue::Double(*value);
        }
        Ok(())
    }

    /// Copy the scalar channels of a bound input vector into a
    /// component-owned double buffer.
    pub fn read_in_slice(&self, vector_idx: usize, values: &mut [f64]) -> Result<(), BusError> {
        let info = self
            .in_vectors
            .get(vector_idx)
            .ok_or(BusError::NoSuchVector { index: vector_idx })?;
        if !info.bound {
            return Err(BusError::NotBound {
                name: info.name.clone(),
            });
        }
        if values.len() != info.len() {
            return Err(BusError::SliceLength {
                name: info.name.clone(),
                expected: info.len(),
                got: values.len(),
            });
        }
        for (offset, value) in values.iter_mut().enumerate() {
            let channel = &self.in_channels[info.start_index + offset];
            *value = channel.value.as_double().unwrap_or(0.0);
        }
        Ok(())
    }

    /// Store an arbitrary value into an output channel, checking the type.
    pub fn set_out_value(&mut self, index: usize, value: ChannelValue) -> Result<(), BusError> {
        let channel = self
            .out_channels
            .get_mut(index)
            .ok_or(BusError::NoSuchChannel { index })?;
        if !value.fits(channel.info.ty) {
            return Err(BusError::ValueType {
                name: channel.info.name.clone(),
                value: value.channel_type(),
                ty: channel.info.ty,
            });
        }
        channel.value = value;
        Ok(())
    }

    /// Store an arbitrary value into an input channel, checking the type.
    /// Used for initial values from the input tree.
    pub fn set_in_value(&mut self, index: usize, value: ChannelValue) -> Result<(), BusError> {
        let channel = self
            .in_channels
            .get_mut(index)
            .ok_or(BusError::NoSuchChannel { index })?;
        if !value.fits(channel.info.ty) {
            return Err(BusError::ValueType {
                name: channel.info.name.clone(),
                value: value.channel_type(),
                ty: channel.info.ty,
            });
        }
        channel.value = value;
        Ok(())
    }

    /// Pull (or inter-/extrapolate) the source value of every connected
    /// input channel into its input buffer.
    pub fn trigger_in_connections(
        &mut self,
        connections: &Connections,
        interval: &TimeInterval,
        input_at_end_time: bool,
    ) -> Outcome {
        for channel in &mut self.in_channels {
            let Some(conn_id) = channel.connection else {
                continue;
            };
            if let Some(value) = connections[conn_id].evaluate(interval, input_at_end_time) {
                channel.value = value;
            }
        }
        Ok(Status::Ok)
    }

    /// Push the current value of every output channel into its outgoing
    /// connections.
    pub fn update_out_connections(&self, connections: &mut Connections, time: f64) -> Outcome {
        for channel in &self.out_channels {
            for &conn_id in &channel.connections {
                connections[conn_id].store(&channel.value, time);
            }
        }
        Ok(Status::Ok)
    }
}

/// Wrap a bus-local error with the owning component's name.
pub(crate) fn component_error(component: &str, err: BusError) -> Error {
    Error::Component {
        component: component.to_string(),
        message: err.to_string(),
    }
}
