use ndarray::Array2;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Lifecycle of a single receding-horizon solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SolvePhase {
    Idle,
    Building,
    Solving,
    Solved,
    Infeasible,
}

/// Unconstrained action suggested by a learned policy, indexed by stall.
#[derive(Debug, Clone, PartialEq)]
pub enum ProposedAction {
    /// One action per stall for the current timestep.
    Step(Vec<f64>),
    /// Stalls by horizon steps. Only the overlap with the program horizon is projected.
    Sequence(Array2<f64>),
}

impl ProposedAction {
    pub fn stalls(&self) -> usize {
        match self {
            ProposedAction::Step(values) => values.len(),
            ProposedAction::Sequence(values) => values.nrows(),
        }
    }

    /// Number of horizon steps this proposal covers.
    pub fn steps(&self) -> usize {
        match self {
            ProposedAction::Step(_) => 1,
            ProposedAction::Sequence(values) => values.ncols(),
        }
    }

    pub fn value(&self, stall: usize, step: usize) -> f64 {
        match self {
            ProposedAction::Step(values) => values[stall],
            ProposedAction::Sequence(values) => values[[stall, step]],
        }
    }
}

/// What the program minimizes over the shared constraint scaffold.
#[derive(Debug, Clone, PartialEq)]
pub enum Objective {
    /// `sum_j price[j] * sum_i AC[i, j]`. Charging only.
    MinimizeCost { prices: Vec<f64> },
    /// Squared distance between `AC + AD` and the proposal.
    Project(ProposedAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectionSettings {
    /// Model vehicle-to-grid discharge within each vehicle's budget and window.
    pub discharge_enabled: bool,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self {
            discharge_enabled: true,
        }
    }
}
