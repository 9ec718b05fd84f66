//! Laxity: idle time a vehicle can still afford before it must charge at full
//! power for the rest of its stay.
//!
//! `laxity = (j_end - 1) - (FINAL_SOC - SOC[i, 1]) * B / (alpha_c * eta_c)`
//!
//! The program carries `laxity >= 0` as a constraint, so a plan that comes back
//! from the solver never reports a vehicle that cannot make its deadline.

use super::problem::VehiclePlan;
use crate::domain::PhysicalParameters;
use crate::dynamics::steps_to_full;

/// Laxity of `vehicle` given the SOC it reaches after the first step.
pub fn laxity(vehicle: &VehiclePlan, soc_after_first_step: f64, params: &PhysicalParameters) -> f64 {
    vehicle.laxity_offset() - steps_to_full(soc_after_first_step, params)
}

/// Coefficients of the `laxity >= 0` row, written as `coef * SOC[i, 1] <= rhs`.
pub fn nonnegative_row(vehicle: &VehiclePlan, params: &PhysicalParameters) -> (f64, f64) {
    let scale = params.battery_capacity_kwh / (params.alpha_c_kw * params.eta_c);
    (-scale, vehicle.laxity_offset() - params.final_soc * scale)
}

/// Whether the program for this horizon carries a laxity row for `vehicle`.
pub fn is_constrained(vehicle: &VehiclePlan, horizon: usize) -> bool {
    horizon > 1 && !vehicle.is_pinned()
}
