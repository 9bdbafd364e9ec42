//! In-memory system-description tree consumed by the `lockstep` co-simulation
//! core.
//!
//! A system description names the simulation elements (components), the typed
//! connections between their ports, and the task that drives them. This crate
//! only defines the tree and the textual enum mappings; producing the tree
//! (e.g. from an SSD/XML document) is the job of a reader, and every record
//! derives [`serde`] traits so a description can also be loaded directly from
//! JSON.
//!
//! All optional settings are modeled as `Option<T>`; defaulting happens in the
//! core when the tree is consumed.

#![deny(clippy::all)]

pub mod connections;
pub mod model;
pub mod task;

pub use connections::{ConnectionInput, DecoupleInput, DecoupleKind, EndpointInput};
pub use model::{ComponentInput, ComponentKindTag, ModelInput, PortInput};
pub use task::{EndKind, StepKind, StoreLevelKind, TaskInput};

use serde::{Deserialize, Serialize};

/// Error raised while interpreting a system-description tree.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("unknown {kind} `{value}`")]
    UnknownEnumValue { kind: &'static str, value: String },

    #[error("missing required field `{field}`{}", .location.as_ref().map(|l| format!(" at {l}")).unwrap_or_default())]
    MissingField {
        field: &'static str,
        location: Option<Location>,
    },
}

/// Source position of an input record, carried along for error reporting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub file: Option<String>,
    pub line: Option<u64>,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{file}:{line}"),
            (Some(file), None) => write!(f, "{file}"),
            (None, Some(line)) => write!(f, "line {line}"),
            (None, None) => write!(f, "<unknown>"),
        }
    }
}

/// Root of a parsed system description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputRoot {
    #[serde(default)]
    pub config: ConfigInput,
    pub model: ModelInput,
    pub task: TaskInput,
}

/// Engine-level settings that are not part of the model or the task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigInput {
    /// Compute a dedicated initialization evaluation order and iterate
    /// initial outputs in co-simulation style.
    #[serde(default)]
    pub cosim_init_enabled: bool,

    /// Emit DOT files of the model graph and of each component's
    /// input-to-output dependencies.
    #[serde(default)]
    pub write_graphs: bool,
}

/// A scalar literal in the input tree.
///
/// Untagged: JSON `true`, `3`, `0.5` and `"text"` all map directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarInput {
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
}
