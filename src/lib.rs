//! Orchestration core of a co-simulation engine.
//!
//! The crate composes heterogeneous simulation elements ("components") into a
//! directed graph, determines a legal evaluation order, decouples algebraic
//! loops, and repeatedly advances the whole graph in lock-step. Values are
//! exchanged over typed channels on a per-component [`bus::Databus`];
//! FMU-style black-box simulators plug in through the opaque
//! [`comp::FmuSlave`] trait next to the built-in elements (constants,
//! integrators, vector integrators).
//!
//! A run goes through three phases, driven by [`Model`] and [`Task`]:
//!
//! 1. **read**: components and connections are materialized from a parsed
//!    [`lockstep_input`] tree,
//! 2. **setup**: connections are resolved and checked, the dependency solver
//!    orders the components into evaluation groups (breaking loops by
//!    decoupling), filters are inserted,
//! 3. **run**: the initialization protocol brings all elements to a
//!    consistent state, then the configured step discipline advances the
//!    model until its end condition.

#![deny(clippy::all)]

pub mod bus;
pub mod comp;
pub mod conn;
pub mod model;
pub mod sched;
pub mod step;
pub mod task;

pub use model::Model;
pub use task::{Recorder, Task};

use crate::bus::ChannelType;

/// Severity of a completed operation. Errors travel separately as [`Error`].
///
/// A warning does not stop the current phase; it is merged upward and
/// promoted to the caller's result unless an error intervenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Status {
    #[default]
    Ok,
    Warning,
}

impl Status {
    /// Combine two results, keeping the more severe one.
    #[must_use]
    pub fn merge(self, other: Status) -> Status {
        self.max(other)
    }
}

/// Result of an engine operation: `Ok`/`Warning` on success, [`Error`] on
/// failure. Errors short-circuit upward with `?` and abort the current
/// setup or step phase.
pub type Outcome = std::result::Result<Status, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // input-structural
    #[error(
        "unknown component `{name}` referenced by a connection{}",
        .location.as_ref().map(|l| format!(" at {l}")).unwrap_or_default()
    )]
    UnknownComponent {
        name: String,
        location: Option<lockstep_input::Location>,
    },

    #[error(
        "component `{component}` has no port `{channel}`{}",
        .location.as_ref().map(|l| format!(" at {l}")).unwrap_or_default()
    )]
    UnknownChannel {
        component: String,
        channel: String,
        location: Option<lockstep_input::Location>,
    },

    #[error("elements {first} and {second} have the same name `{name}`")]
    DuplicateComponentName {
        name: String,
        first: usize,
        second: usize,
    },

    #[error("connection {connection}: cannot connect a scalar endpoint to a vector endpoint")]
    EndpointShapeMismatch { connection: String },

    #[error("connection {connection}: vector ranges differ in length ({from_len} vs {to_len})")]
    VectorLengthMismatch {
        connection: String,
        from_len: usize,
        to_len: usize,
    },

    #[error("port `{channel}`: invalid vector range [{start_index}, {end_index}]")]
    InvalidVectorRange {
        channel: String,
        start_index: usize,
        end_index: usize,
    },

    #[error("connection {connection}: incompatible channel types ({from} -> {to})")]
    TypeMismatch {
        connection: String,
        from: ChannelType,
        to: ChannelType,
    },

    #[error("connection {connection}: incompatible units (`{from}` -> `{to}`)")]
    UnitMismatch {
        connection: String,
        from: String,
        to: String,
    },

    #[error("{0}")]
    Input(#[from] lockstep_input::InputError),

    #[error("invalid task settings: {0}")]
    InvalidTask(String),

    // topology
    #[error("inport `{channel}` of element `{component}` is driven by more than one connection")]
    MultiplyDrivenInput { component: String, channel: String },

    #[error("{index}. {direction} (`{channel}`) of element `{component}` not connected")]
    MandatoryNotConnected {
        component: String,
        channel: String,
        index: usize,
        direction: &'static str,
    },

    #[error("algebraic loop cannot be decoupled: {cycle}")]
    UndecouplableLoop { cycle: String },

    #[error("found loops in the initialization topology: {cycle}")]
    InitializationLoop { cycle: String },

    #[error("connection {connection}: inter-/extrapolation requires a Double channel, got {kind}")]
    FilterChannelType {
        connection: String,
        kind: ChannelType,
    },

    // component-local
    #[error("element `{component}`: {message}")]
    Component { component: String, message: String },

    #[error("element `{component}`: FMU error: {message}")]
    Fmu { component: String, message: String },

    // runtime
    #[error("results storage failed: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Per-component end-condition report, polled after every coupling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentFinishState {
    /// The element has no own end condition.
    #[default]
    NeverFinishes,
    /// The element has an end condition which is not reached yet.
    NotFinished,
    /// The element reached its own end condition.
    Finished,
}

/// Overall outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishState {
    /// The task end time was reached.
    TimeReached,
    /// A component reported [`ComponentFinishState::Finished`] and the task
    /// stops on the first finished component.
    Finished,
    /// The global abort flag was raised.
    Aborted,
}

/// Closed time interval handed to inport triggers and `DoStep`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInterval {
    pub start: f64,
    pub end: f64,
}

impl TimeInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Degenerate interval used during initialization, where no time passes.
    pub fn instant(time: f64) -> Self {
        Self {
            start: time,
            end: time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_input::Location;

    #[test]
    fn status_merge_keeps_most_severe() {
        assert_eq!(Status::Ok.merge(Status::Ok), Status::Ok);
        assert_eq!(Status::Ok.merge(Status::Warning), Status::Warning);
        assert_eq!(Status::Warning.merge(Status::Ok), Status::Warning);
    }

    #[test]
    fn error_messages_carry_context() {
        let err = Error::MandatoryNotConnected {
            component: "plant".into(),
            channel: "u".into(),
            index: 1,
            direction: "inport",
        };
        assert_eq!(
            err.to_string(),
            "1. inport (`u`) of element `plant` not connected"
        );

        let err = Error::UnknownComponent {
            name: "ghost".into(),
            location: Some(Location {
                file: Some("system.json".into()),
                line: Some(4),
            }),
        };
        assert!(err.to_string().contains("system.json:4"));
    }
}
