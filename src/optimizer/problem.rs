//! Feasible-set description of one receding-horizon step.
//!
//! [`ProblemBuilder`] turns an occupancy snapshot into a [`ChargingProblem`]:
//! a plain value listing each vehicle's initial SOC, deadline and discharge
//! allowance over a horizon, plus the objective. It knows nothing about the
//! solver; [`crate::optimizer::program::compile`] does the translation.

use tracing::debug;

use super::{Objective, ProjectionSettings, ProposedAction};
use crate::domain::{OccupancySnapshot, PhysicalParameters, PriceSeries};
use crate::error::{ChargeError, Result};

/// Discharge a vehicle may still perform during this horizon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DischargeAllowance {
    /// Upper bound on `-sum_j AD[i, j] / eta_d`.
    pub budget: f64,
    /// Leading horizon steps where discharge is allowed.
    pub steps: usize,
}

/// Per-vehicle rules for one solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehiclePlan {
    pub stall: usize,
    /// Initial condition `SOC[i, 0]`.
    pub soc: f64,
    /// Unclipped terminal index `j_end`. Zero or less pins the vehicle.
    pub terminal_index: i64,
    pub discharge: Option<DischargeAllowance>,
}

impl VehiclePlan {
    pub fn is_pinned(&self) -> bool {
        self.terminal_index <= 0
    }

    /// First SOC column forced to the target, clipped to the horizon.
    pub fn terminal_column(&self, horizon: usize) -> usize {
        usize::try_from(self.terminal_index.max(0))
            .unwrap_or(usize::MAX)
            .min(horizon)
    }

    /// Steps left before the deadline, the first term of the laxity formula.
    pub fn laxity_offset(&self) -> f64 {
        (self.terminal_index - 1) as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargingProblem {
    pub params: PhysicalParameters,
    pub horizon: usize,
    pub vehicles: Vec<VehiclePlan>,
    pub objective: Objective,
}

impl ChargingProblem {
    pub fn active_vehicles(&self) -> impl Iterator<Item = &VehiclePlan> + '_ {
        self.vehicles.iter().filter(|v| !v.is_pinned())
    }
}

pub struct ProblemBuilder<'a> {
    params: &'a PhysicalParameters,
}

impl<'a> ProblemBuilder<'a> {
    pub fn new(params: &'a PhysicalParameters) -> Self {
        Self { params }
    }

    /// Cost-minimization problem at timestep `t`.
    ///
    /// Returns `Ok(None)` when no occupied vehicle can still be charged, in which
    /// case no program has to be solved and no price lookup happens.
    pub fn cost_minimization(
        &self,
        snapshot: &OccupancySnapshot,
        t: i64,
        prices: &PriceSeries,
    ) -> Result<Option<ChargingProblem>> {
        snapshot.validate(self.params)?;
        let mut vehicles = self.vehicle_plans(snapshot, t, false, 0);
        let Some(required) = required_horizon(&vehicles) else {
            return Ok(None);
        };

        let predicted = prices.predict(t, required)?;
        let horizon = predicted.len();
        if horizon < required {
            debug!(t, required, horizon, "price data ends inside the horizon");
        }
        // Discharge is never modeled in cost mode.
        for vehicle in &mut vehicles {
            vehicle.discharge = None;
        }

        Ok(Some(ChargingProblem {
            params: *self.params,
            horizon,
            vehicles,
            objective: Objective::MinimizeCost { prices: predicted },
        }))
    }

    /// Safety-projection problem at timestep `t` for a policy proposal.
    pub fn projection(
        &self,
        snapshot: &OccupancySnapshot,
        t: i64,
        proposal: ProposedAction,
        settings: &ProjectionSettings,
    ) -> Result<Option<ChargingProblem>> {
        snapshot.validate(self.params)?;
        if proposal.stalls() != self.params.max_cars {
            return Err(ChargeError::InvalidSnapshot(format!(
                "proposal covers {} stalls, lot has {}",
                proposal.stalls(),
                self.params.max_cars
            )));
        }
        let provisional = self.vehicle_plans(snapshot, t, false, 0);
        let Some(horizon) = required_horizon(&provisional) else {
            return Ok(None);
        };
        let vehicles = self.vehicle_plans(snapshot, t, settings.discharge_enabled, horizon);

        Ok(Some(ChargingProblem {
            params: *self.params,
            horizon,
            vehicles,
            objective: Objective::Project(proposal),
        }))
    }

    fn vehicle_plans(
        &self,
        snapshot: &OccupancySnapshot,
        t: i64,
        with_discharge: bool,
        horizon: usize,
    ) -> Vec<VehiclePlan> {
        let can_discharge = with_discharge && self.params.alpha_d_kw > 0.0;
        snapshot
            .occupied()
            .map(|(stall, vehicle)| {
                let terminal_index = vehicle.deadline.terminal_index(t);
                let discharge = (can_discharge
                    && terminal_index > 0
                    && vehicle.t_dis > 0
                    && vehicle.soc_dis > 0.0)
                    .then(|| DischargeAllowance {
                        budget: vehicle.soc_dis,
                        steps: (vehicle.t_dis as usize).min(horizon),
                    });
                VehiclePlan {
                    stall,
                    soc: vehicle.soc_t,
                    terminal_index,
                    discharge,
                }
            })
            .collect()
    }
}

/// `max_i j_end`, or `None` when every vehicle is pinned (or there are none).
fn required_horizon(vehicles: &[VehiclePlan]) -> Option<usize> {
    vehicles
        .iter()
        .filter(|v| !v.is_pinned())
        .map(|v| v.terminal_index)
        .max()
        .and_then(|n| usize::try_from(n).ok())
}
