//! Connection metadata produced by endpoint expansion.

use lockstep_input::connections::{DecoupleKind, InterExtrapolationInput};

/// Index of a live connection in the model's connection arena.
pub type ConnId = usize;

/// Pure metadata of one scalar-to-scalar link: endpoints by component id and
/// channel id, plus decoupling and inter-/extrapolation settings taken
/// verbatim from the input. Components are referenced by arena index, never
/// owned.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub source: usize,
    pub source_channel: usize,
    pub target: usize,
    pub target_channel: usize,

    pub decouple: DecoupleKind,
    pub decouple_priority: i32,
    pub inter_extrapolation: Option<InterExtrapolationInput>,

    /// Set by the dependency solver when this connection is chosen to break
    /// an algebraic loop.
    pub decoupled: bool,

    /// Human-readable `source.port -> target.port` label, fixed at
    /// resolution time.
    label: String,
}

impl ConnectionInfo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: usize,
        source_channel: usize,
        target: usize,
        target_channel: usize,
        decouple: DecoupleKind,
        decouple_priority: i32,
        inter_extrapolation: Option<InterExtrapolationInput>,
        label: String,
    ) -> Self {
        Self {
            source,
            source_channel,
            target,
            target_channel,
            decouple,
            decouple_priority,
            inter_extrapolation,
            decoupled: false,
            label,
        }
    }

    /// The `source.port -> target.port` connection string used in logs and
    /// error messages.
    pub fn connection_string(&self) -> &str {
        &self.label
    }

    /// Whether the user attached any decoupling metadata.
    pub fn has_decouple_settings(&self) -> bool {
        self.decouple != DecoupleKind::Default || self.decouple_priority > 0
    }

    /// Whether a live connection made from this info needs a polynomial
    /// filter.
    pub fn needs_filter(&self) -> bool {
        self.decoupled || self.inter_extrapolation.is_some()
    }
}
