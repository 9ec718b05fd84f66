//! Receding-horizon charging optimizer.
//!
//! - [`problem`]: feasible-set builder (snapshot -> [`ChargingProblem`])
//! - [`program`]: translation into solver standard form
//! - [`solver`]: Clarabel solve and plan extraction
//! - [`laxity`]: laxity rows and values

pub mod laxity;
pub mod problem;
pub mod program;
pub mod solver;
pub mod types;

pub use problem::*;
pub use solver::*;
pub use types::*;
