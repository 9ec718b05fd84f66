use tracing::{debug, warn};

use super::{ChargingAgent, ObservationBuilder, Policy};
use crate::domain::{OccupancySnapshot, PhysicalParameters};
use crate::error::Result;
use crate::optimizer::{
    ChargingOptimizer, HorizonPlan, ProblemBuilder, ProjectionSettings, ProposedAction,
};

/// Maps an unconstrained policy action onto the nearest action that keeps
/// every vehicle able to meet its deadline.
#[derive(Debug, Clone)]
pub struct SafetyProjector {
    optimizer: ChargingOptimizer,
    settings: ProjectionSettings,
}

impl SafetyProjector {
    pub fn new(params: PhysicalParameters, settings: ProjectionSettings) -> Result<Self> {
        Ok(Self {
            optimizer: ChargingOptimizer::new(params)?,
            settings,
        })
    }

    pub fn params(&self) -> &PhysicalParameters {
        self.optimizer.params()
    }

    /// Solved projection horizon, or `None` when no vehicle can act.
    pub fn plan(
        &self,
        snapshot: &OccupancySnapshot,
        t: i64,
        proposal: ProposedAction,
    ) -> Result<Option<HorizonPlan>> {
        let builder = ProblemBuilder::new(self.optimizer.params());
        match builder.projection(snapshot, t, proposal, &self.settings)? {
            Some(problem) => self.optimizer.solve(&problem).map(Some),
            None => Ok(None),
        }
    }

    /// Feasible first-step action closest to `proposal`.
    pub fn project(
        &self,
        snapshot: &OccupancySnapshot,
        t: i64,
        proposal: ProposedAction,
    ) -> Result<Vec<f64>> {
        let max_cars = self.params().max_cars;
        Ok(self
            .plan(snapshot, t, proposal)?
            .map(|plan| plan.first_actions(max_cars))
            .unwrap_or_else(|| vec![0.0; max_cars]))
    }

    /// Projects each `(snapshot, proposal)` pair independently.
    ///
    /// Stops at the first failure; no partial batch is returned.
    pub fn project_batch(
        &self,
        batch: &[(OccupancySnapshot, ProposedAction)],
        t: i64,
    ) -> Result<Vec<Vec<f64>>> {
        batch
            .iter()
            .map(|(snapshot, proposal)| self.project(snapshot, t, proposal.clone()))
            .collect()
    }
}

/// A policy whose every proposal goes through the safety projection.
#[derive(Debug, Clone)]
pub struct ProjectedPolicyAgent<P> {
    policy: P,
    projector: SafetyProjector,
    observations: ObservationBuilder,
}

impl<P: Policy> ProjectedPolicyAgent<P> {
    pub fn new(policy: P, projector: SafetyProjector, observations: ObservationBuilder) -> Self {
        Self {
            policy,
            projector,
            observations,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }
}

impl<P: Policy> ChargingAgent for ProjectedPolicyAgent<P> {
    fn name(&self) -> &'static str {
        "projected"
    }

    fn act(&mut self, snapshot: &OccupancySnapshot, t: i64) -> Result<Vec<f64>> {
        let observation = self.observations.build(snapshot, t)?;
        let proposal = self.policy.propose(&observation);
        let projected = self
            .projector
            .project(snapshot, t, ProposedAction::Step(proposal.clone()))?;

        let correction: f64 = proposal
            .iter()
            .zip(&projected)
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            .sqrt();
        if correction > 0.5 * self.projector.params().max_charge_action() {
            warn!(t, correction, "policy proposal needed a large correction");
        } else {
            debug!(t, correction, "policy proposal projected");
        }
        Ok(projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Deadline, ParkingSlot, Vehicle};

    fn params() -> PhysicalParameters {
        PhysicalParameters {
            max_cars: 2,
            final_soc: 1.0,
            battery_capacity_kwh: 40.0,
            eta_c: 1.0,
            eta_d: 1.0,
            alpha_c_kw: 10.0,
            alpha_d_kw: 10.0,
        }
    }

    fn relaxed_vehicle() -> Vehicle {
        Vehicle::charging(1, 0.5, Deadline::Remaining { t_rem: 6 })
    }

    #[test]
    fn feasible_proposal_is_kept() {
        let projector = SafetyProjector::new(params(), ProjectionSettings::default()).unwrap();
        let snapshot = OccupancySnapshot::new(vec![ParkingSlot::Occupied(relaxed_vehicle()), ParkingSlot::Empty]);
        let actions = projector
            .project(&snapshot, 0, ProposedAction::Step(vec![0.1, 0.3]))
            .unwrap();
        assert!((actions[0] - 0.1).abs() < 1e-5);
        assert_eq!(actions[1], 0.0);
    }

    #[test]
    fn over_limit_proposal_is_clipped_to_power_bound() {
        let projector = SafetyProjector::new(params(), ProjectionSettings::default()).unwrap();
        let snapshot = OccupancySnapshot::new(vec![ParkingSlot::Empty, ParkingSlot::Occupied(relaxed_vehicle())]);
        let actions = projector
            .project(&snapshot, 0, ProposedAction::Step(vec![0.0, 0.9]))
            .unwrap();
        assert!((actions[1] - 0.25).abs() < 1e-5);
    }

    #[test]
    fn empty_batch_member_returns_zeros() {
        let projector = SafetyProjector::new(params(), ProjectionSettings::default()).unwrap();
        let batch = vec![
            (OccupancySnapshot::empty(2), ProposedAction::Step(vec![0.2, 0.2])),
            (
                OccupancySnapshot::new(vec![ParkingSlot::Occupied(relaxed_vehicle()), ParkingSlot::Empty]),
                ProposedAction::Step(vec![0.2, 0.2]),
            ),
        ];
        let actions = projector.project_batch(&batch, 0).unwrap();
        assert_eq!(actions[0], vec![0.0, 0.0]);
        assert!((actions[1][0] - 0.2).abs() < 1e-5);
    }
}
