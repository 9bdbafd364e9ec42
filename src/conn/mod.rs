//! Live, typed links between an output channel and an input channel.
//!
//! A connection buffers the most recent source value (copy or shared
//! reference, depending on the resolved channel type) and, when filtered,
//! the polynomial sample history used to inter-/extrapolate across the
//! coupling step.

mod filter;
mod info;
pub mod resolve;

pub use filter::{FilterMode, PolyFilter};
pub use info::{ConnId, ConnectionInfo};

use lockstep_input::connections::PolynomialInput;

use crate::bus::{ChannelType, ChannelValue};
use crate::{Error, TimeInterval};

#[derive(Debug)]
pub struct Connection {
    pub info: ConnectionInfo,
    /// Channel type snapshotted when the connection was materialized, i.e.
    /// after binary promotion may have retyped the endpoints.
    pub channel_type: ChannelType,
    /// Filter flavor this connection would use, fixed by the step
    /// discipline at materialization time.
    filter_mode: FilterMode,
    value: Option<ChannelValue>,
    filter: Option<PolyFilter>,
}

impl Connection {
    pub fn new(info: ConnectionInfo, channel_type: ChannelType, filter_mode: FilterMode) -> Self {
        Self {
            info,
            channel_type,
            filter_mode,
            value: None,
            filter: None,
        }
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Insert the polynomial filter this connection is configured for.
    /// Decoupled connections always extrapolate; explicit inter-/extrapolation
    /// settings follow the flavor selected by the step discipline.
    pub fn add_filter(&mut self) -> Result<(), Error> {
        if self.channel_type != ChannelType::Double {
            return Err(Error::FilterChannelType {
                connection: self.info.connection_string().to_string(),
                kind: self.channel_type,
            });
        }

        let mode = if self.info.decoupled {
            FilterMode::Extrapolating
        } else {
            self.filter_mode
        };
        let settings = self.info.inter_extrapolation.unwrap_or_default();
        let PolynomialInput { interval, order } = match mode {
            FilterMode::Interpolating => settings.interpolation,
            FilterMode::Extrapolating => settings.extrapolation,
        };

        self.filter = Some(PolyFilter::new(order, interval, mode));
        Ok(())
    }

    /// Push a fresh source value into the connection. Binary payloads are
    /// copied or shared according to the resolved channel type; doubles also
    /// feed the filter history.
    pub fn store(&mut self, value: &ChannelValue, time: f64) {
        if let (Some(filter), Some(v)) = (self.filter.as_mut(), value.as_double()) {
            filter.add_sample(time, v);
        }
        self.value = Some(value.transfer(self.channel_type));
    }

    /// Value seen by the target over `interval`; `None` while the source
    /// never produced one.
    pub fn evaluate(&self, interval: &TimeInterval, at_end: bool) -> Option<ChannelValue> {
        if let Some(filter) = &self.filter {
            let time = if at_end { interval.end } else { interval.start };
            if let Some(v) = filter.evaluate(time) {
                return Some(ChannelValue::Double(v));
            }
        }
        self.value.clone()
    }

    /// Latest stored value, bypassing any filter.
    pub fn current_value(&self) -> Option<&ChannelValue> {
        self.value.as_ref()
    }

    pub fn enter_init_mode(&mut self) {
        if let Some(filter) = &mut self.filter {
            filter.reset();
        }
    }

    /// Leave initialization mode: the filter history collapses to a single
    /// sample anchored at `time`, so the first step extrapolates from the
    /// task start.
    pub fn exit_init_mode(&mut self, time: f64) {
        if let Some(filter) = &mut self.filter {
            filter.rebase(time);
        }
    }
}

/// Arena of live connections, indexed by [`ConnId`].
#[derive(Debug, Default)]
pub struct Connections {
    items: Vec<Connection>,
}

impl Connections {
    pub fn push(&mut self, connection: Connection) -> ConnId {
        self.items.push(connection);
        self.items.len() - 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.items.iter_mut()
    }
}

impl std::ops::Index<ConnId> for Connections {
    type Output = Connection;

    fn index(&self, id: ConnId) -> &Connection {
        &self.items[id]
    }
}

impl std::ops::IndexMut<ConnId> for Connections {
    fn index_mut(&mut self, id: ConnId) -> &mut Connection {
        &mut self.items[id]
    }
}
