//! Charging agents: given the lot at timestep `t`, return one normalized
//! action per stall.

pub mod asap;
pub mod observation;
pub mod optim;
pub mod policy;
pub mod projection;

pub use asap::*;
pub use observation::*;
pub use optim::*;
pub use policy::*;
pub use projection::*;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::domain::OccupancySnapshot;
use crate::error::Result;

pub trait ChargingAgent {
    fn name(&self) -> &'static str;

    /// Action vector of length `max_cars` in stall order, `0` for empty stalls.
    fn act(&mut self, snapshot: &OccupancySnapshot, t: i64) -> Result<Vec<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Charge every vehicle as fast as possible.
    Asap,
    /// Receding-horizon energy cost minimization.
    Optim,
    /// Policy proposal projected onto the feasible set.
    Projected,
}
