//! State-of-charge dynamics shared by the environment, the rule-based agent and
//! the optimizer's equality constraints.
//!
//! Actions are normalized power (`kW / B`) applied for one timestep:
//! `soc' = soc + a_c * eta_c + a_d / eta_d` with `a_c >= 0` and `a_d <= 0`.

use crate::domain::{PhysicalParameters, SOC_TOLERANCE};
use crate::error::{ChargeError, Result};

/// Next SOC for an explicit charge/discharge split. No clamping.
pub fn next_soc(soc: f64, charge: f64, discharge: f64, params: &PhysicalParameters) -> f64 {
    soc + charge * params.eta_c + discharge / params.eta_d
}

/// Splits a signed action into its charge (`>= 0`) and discharge (`<= 0`) parts.
pub fn split_action(action: f64) -> (f64, f64) {
    if action >= 0.0 {
        (action, 0.0)
    } else {
        (0.0, action)
    }
}

/// Applies a signed action to a vehicle in `stall`.
///
/// Solver round-off within [`SOC_TOLERANCE`] is absorbed; anything larger is an error.
pub fn apply_action(
    stall: usize,
    soc: f64,
    action: f64,
    params: &PhysicalParameters,
) -> Result<f64> {
    let (charge, discharge) = split_action(action);
    let next = next_soc(soc, charge, discharge, params);
    if next < -SOC_TOLERANCE || next > params.final_soc + SOC_TOLERANCE || !next.is_finite() {
        return Err(ChargeError::SocOutOfRange { stall, soc: next });
    }
    Ok(next.clamp(0.0, params.final_soc))
}

/// Largest charge action that does not overshoot the target SOC.
pub fn asap_action(soc: f64, params: &PhysicalParameters) -> f64 {
    if soc >= params.final_soc {
        return 0.0;
    }
    params
        .max_charge_action()
        .min((params.final_soc - soc) / params.eta_c)
}

/// Full-power charging steps still needed to reach the target from `soc`.
pub fn steps_to_full(soc: f64, params: &PhysicalParameters) -> f64 {
    (params.final_soc - soc) * params.battery_capacity_kwh / (params.alpha_c_kw * params.eta_c)
}
