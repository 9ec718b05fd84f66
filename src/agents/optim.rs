use std::sync::Arc;

use tracing::debug;

use super::ChargingAgent;
use crate::domain::{OccupancySnapshot, PhysicalParameters, PriceSeries};
use crate::error::Result;
use crate::optimizer::{ChargingOptimizer, HorizonPlan, ProblemBuilder};

/// Receding-horizon cost minimization.
///
/// Every call builds the program from scratch for the current snapshot,
/// minimizes predicted energy cost up to the latest departure, and returns
/// only the first step. The agent keeps no state between calls.
#[derive(Debug, Clone)]
pub struct CostMinimizingAgent {
    optimizer: ChargingOptimizer,
    prices: Arc<PriceSeries>,
}

impl CostMinimizingAgent {
    pub fn new(params: PhysicalParameters, prices: Arc<PriceSeries>) -> Result<Self> {
        Ok(Self {
            optimizer: ChargingOptimizer::new(params)?,
            prices,
        })
    }

    /// Full solved horizon, or `None` when no vehicle needs a decision.
    pub fn plan(&self, snapshot: &OccupancySnapshot, t: i64) -> Result<Option<HorizonPlan>> {
        let params = self.optimizer.params();
        let Some(problem) = ProblemBuilder::new(params).cost_minimization(snapshot, t, &self.prices)? else {
            debug!(t, "no chargeable vehicles, skipping solve");
            return Ok(None);
        };
        self.optimizer.solve(&problem).map(Some)
    }
}

impl ChargingAgent for CostMinimizingAgent {
    fn name(&self) -> &'static str {
        "optim"
    }

    fn act(&mut self, snapshot: &OccupancySnapshot, t: i64) -> Result<Vec<f64>> {
        let max_cars = self.optimizer.params().max_cars;
        Ok(self
            .plan(snapshot, t)?
            .map(|plan| plan.first_actions(max_cars))
            .unwrap_or_else(|| vec![0.0; max_cars]))
    }
}
