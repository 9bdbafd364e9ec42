//! Polynomial inter-/extrapolation over the samples a connection has seen.
//!
//! A filter keeps the two most recent `(time, value)` samples pushed by the
//! source channel and reconstructs a value at an arbitrary evaluation time:
//! order `Constant` holds the last sample, order `Linear` follows the line
//! through the last two. Decoupled connections use the extrapolating flavor
//! to bridge the coupling step a loop was cut at.

use lockstep_input::connections::{IntervalKind, OrderKind};

/// Whether evaluation times fall inside the sampled range (sequential step
/// discipline) or beyond it (parallel disciplines and decoupled links).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Interpolating,
    Extrapolating,
}

#[derive(Debug, Clone)]
pub struct PolyFilter {
    order: OrderKind,
    interval: IntervalKind,
    mode: FilterMode,
    /// Most recent sample last.
    samples: [(f64, f64); 2],
    len: usize,
}

impl PolyFilter {
    pub fn new(order: OrderKind, interval: IntervalKind, mode: FilterMode) -> Self {
        Self {
            order,
            interval,
            mode,
            samples: [(0.0, 0.0); 2],
            len: 0,
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn order(&self) -> OrderKind {
        self.order
    }

    pub fn interval(&self) -> IntervalKind {
        self.interval
    }

    /// Record a sample. A sample at the time of the newest one replaces it,
    /// so repeated updates within one instant (initialization iterations) do
    /// not collapse the history.
    pub fn add_sample(&mut self, time: f64, value: f64) {
        if self.len > 0 && self.samples[self.len - 1].0 == time {
            self.samples[self.len - 1].1 = value;
            return;
        }
        if self.len < 2 {
            self.samples[self.len] = (time, value);
            self.len += 1;
        } else {
            self.samples[0] = self.samples[1];
            self.samples[1] = (time, value);
        }
    }

    /// Drop all history, e.g. when entering initialization mode.
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Re-anchor the newest sample at `time`, keeping its value. Called when
    /// leaving initialization mode so the first step extrapolates from the
    /// start time instead of from the init instant ordering.
    pub fn rebase(&mut self, time: f64) {
        if self.len > 0 {
            let value = self.samples[self.len - 1].1;
            self.samples = [(0.0, 0.0); 2];
            self.samples[0] = (time, value);
            self.len = 1;
        }
    }

    /// Reconstruct a value at `time`; `None` while no sample was recorded.
    pub fn evaluate(&self, time: f64) -> Option<f64> {
        match self.len {
            0 => None,
            1 => Some(self.samples[0].1),
            _ => match self.order {
                OrderKind::Constant => Some(self.samples[1].1),
                OrderKind::Linear => {
                    let (t0, v0) = self.samples[0];
                    let (t1, v1) = self.samples[1];
                    if t1 == t0 {
                        Some(v1)
                    } else {
                        Some(v0 + (v1 - v0) * (time - t0) / (t1 - t0))
                    }
                }
            },
        }
    }
}
