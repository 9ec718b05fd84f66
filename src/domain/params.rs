use serde::{Deserialize, Serialize};

use crate::error::{ChargeError, Result};

/// Numerical tolerance used when comparing solver output against physical bounds.
pub const SOC_TOLERANCE: f64 = 1e-6;

/// Physical constants of the parking lot and its vehicles.
///
/// Actions throughout the crate are power normalized by the battery capacity,
/// applied over one unit timestep, so a charge action of `alpha_c_kw / battery_capacity_kwh`
/// is full-power charging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicalParameters {
    /// Number of charging stalls in the lot.
    pub max_cars: usize,
    /// Target state of charge every vehicle must reach before it leaves.
    pub final_soc: f64,
    pub battery_capacity_kwh: f64,
    /// Charging efficiency (grid to battery).
    pub eta_c: f64,
    /// Discharging efficiency (battery to grid).
    pub eta_d: f64,
    /// Maximum charging power per stall.
    pub alpha_c_kw: f64,
    /// Maximum discharging power per stall. Zero disables V2G.
    pub alpha_d_kw: f64,
}

impl Default for PhysicalParameters {
    fn default() -> Self {
        Self {
            max_cars: 8,
            final_soc: 0.97,
            battery_capacity_kwh: 80.0,
            eta_c: 0.95,
            eta_d: 0.95,
            alpha_c_kw: 11.0,
            alpha_d_kw: 11.0,
        }
    }
}

impl PhysicalParameters {
    /// Rejects malformed constants. Call once at initialization; the solver
    /// assumes validated parameters.
    pub fn validate(&self) -> Result<()> {
        if self.max_cars == 0 {
            return Err(ChargeError::Configuration(
                "max_cars must be at least 1".into(),
            ));
        }
        if !(self.battery_capacity_kwh.is_finite() && self.battery_capacity_kwh > 0.0) {
            return Err(ChargeError::Configuration(format!(
                "battery capacity must be positive, got {}",
                self.battery_capacity_kwh
            )));
        }
        if !(self.final_soc > 0.0 && self.final_soc <= 1.0) {
            return Err(ChargeError::Configuration(format!(
                "final_soc must lie in (0, 1], got {}",
                self.final_soc
            )));
        }
        for (name, eta) in [("eta_c", self.eta_c), ("eta_d", self.eta_d)] {
            if !(eta > 0.0 && eta <= 1.0) {
                return Err(ChargeError::Configuration(format!(
                    "{name} must lie in (0, 1], got {eta}"
                )));
            }
        }
        if !(self.alpha_c_kw.is_finite() && self.alpha_c_kw > 0.0) {
            return Err(ChargeError::Configuration(format!(
                "maximum charging power must be positive, got {}",
                self.alpha_c_kw
            )));
        }
        if !(self.alpha_d_kw.is_finite() && self.alpha_d_kw >= 0.0) {
            return Err(ChargeError::Configuration(format!(
                "maximum discharging power must be non-negative, got {}",
                self.alpha_d_kw
            )));
        }
        Ok(())
    }

    /// Upper bound of a normalized charge action (`alpha_c / B`).
    pub fn max_charge_action(&self) -> f64 {
        self.alpha_c_kw / self.battery_capacity_kwh
    }

    /// Lower bound of a normalized discharge action (`-alpha_d / B`).
    pub fn max_discharge_action(&self) -> f64 {
        -self.alpha_d_kw / self.battery_capacity_kwh
    }

    /// SOC gained by one timestep at full charging power.
    pub fn full_power_soc_step(&self) -> f64 {
        self.max_charge_action() * self.eta_c
    }
}
