//! Parking-lot environment: admits sessions into free stalls, applies agent
//! actions through the SOC dynamics, bills energy at the imbalance price and
//! releases vehicles after their departure step.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::sessions::Session;
use crate::domain::{
    Deadline, OccupancySnapshot, ParkingSlot, PhysicalParameters, PriceSeries, Vehicle, SOC_TOLERANCE,
};
use crate::dynamics::{apply_action, split_action};
use crate::error::{ChargeError, Result};

/// Tolerance on the target SOC when judging whether a departure was served.
const TARGET_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ParkedVehicle {
    session: Session,
    soc: f64,
    soc_dis: f64,
    t_dis: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepartureRecord {
    pub session_id: u64,
    pub stall: usize,
    pub soc: f64,
    pub met_target: bool,
}

/// What happened during one applied timestep.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StepOutcome {
    pub t: i64,
    pub occupied: usize,
    /// Price times net grid energy; discharge earns money back.
    pub cost: f64,
    pub energy_charged_kwh: f64,
    pub energy_discharged_kwh: f64,
    pub departures: Vec<DepartureRecord>,
}

pub struct ParkingLot {
    params: PhysicalParameters,
    prices: Arc<PriceSeries>,
    slots: Vec<Option<ParkedVehicle>>,
    pending: VecDeque<Session>,
    rejected: usize,
}

impl ParkingLot {
    /// `sessions` are admitted in arrival order as stalls free up.
    pub fn new(
        params: PhysicalParameters,
        prices: Arc<PriceSeries>,
        mut sessions: Vec<Session>,
    ) -> Result<Self> {
        params.validate()?;
        sessions.sort_by_key(|s| (s.ts_arr, s.session_id));
        Ok(Self {
            slots: vec![None; params.max_cars],
            params,
            prices,
            pending: sessions.into(),
            rejected: 0,
        })
    }

    pub fn params(&self) -> &PhysicalParameters {
        &self.params
    }

    /// Sessions turned away because every stall was taken.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Parks every session arriving at or before `t`. Late sessions whose
    /// departure already passed are dropped.
    pub fn admit_arrivals(&mut self, t: i64) -> usize {
        let mut admitted = 0;
        while let Some(session) = self.pending.front().copied() {
            if session.ts_arr > t {
                break;
            }
            self.pending.pop_front();
            if session.ts_dep < t {
                debug!(session = session.session_id, t, "session already departed, dropping");
                continue;
            }
            match self.slots.iter().position(Option::is_none) {
                Some(stall) => {
                    self.slots[stall] = Some(ParkedVehicle {
                        session,
                        soc: session.soc_arr,
                        soc_dis: session.soc_dis,
                        t_dis: session.t_dis,
                    });
                    debug!(session = session.session_id, stall, t, soc = session.soc_arr, "vehicle parked");
                    admitted += 1;
                }
                None => {
                    warn!(session = session.session_id, t, "lot full, session rejected");
                    self.rejected += 1;
                }
            }
        }
        admitted
    }

    /// Immutable view handed to agents.
    pub fn snapshot(&self) -> OccupancySnapshot {
        OccupancySnapshot::new(
            self.slots
                .iter()
                .map(|slot| match slot {
                    None => ParkingSlot::Empty,
                    Some(parked) => ParkingSlot::Occupied(Vehicle {
                        session_id: parked.session.session_id,
                        soc_t: parked.soc,
                        deadline: Deadline::Departure {
                            t_dep: parked.session.ts_dep,
                        },
                        soc_dis: parked.soc_dis,
                        t_dis: parked.t_dis,
                    }),
                })
                .collect(),
        )
    }

    /// Applies one action per stall at timestep `t`, then releases vehicles
    /// whose departure step is `t`.
    pub fn apply(&mut self, t: i64, actions: &[f64]) -> Result<StepOutcome> {
        if actions.len() != self.params.max_cars {
            return Err(ChargeError::InvalidSnapshot(format!(
                "expected {} actions, got {}",
                self.params.max_cars,
                actions.len()
            )));
        }
        let price = self.prices.price_at(t)?;
        let b = self.params.battery_capacity_kwh;
        let mut outcome = StepOutcome {
            t,
            occupied: self.occupied(),
            ..Default::default()
        };

        for (stall, (slot, &action)) in self.slots.iter_mut().zip(actions).enumerate() {
            let Some(parked) = slot.as_mut() else {
                if action != 0.0 {
                    warn!(stall, action, "action for empty stall ignored");
                }
                continue;
            };

            let (charge, discharge) = split_action(action);
            let drawn = -discharge / self.params.eta_d;
            let allowed = if parked.t_dis > 0 { parked.soc_dis } else { 0.0 };
            if drawn > allowed + SOC_TOLERANCE {
                return Err(ChargeError::DischargeNotAllowed {
                    stall,
                    requested: drawn,
                    allowed,
                });
            }

            parked.soc = apply_action(stall, parked.soc, action, &self.params)?;
            parked.soc_dis = (parked.soc_dis - drawn).max(0.0);
            parked.t_dis = parked.t_dis.saturating_sub(1);

            outcome.energy_charged_kwh += charge * b;
            outcome.energy_discharged_kwh += -discharge * b;
            outcome.cost += price * action * b;
        }

        for (stall, slot) in self.slots.iter_mut().enumerate() {
            let departs = slot.map_or(false, |parked| parked.session.ts_dep <= t);
            if !departs {
                continue;
            }
            if let Some(parked) = slot.take() {
                let met_target = parked.soc >= self.params.final_soc - TARGET_TOLERANCE;
                if !met_target {
                    warn!(session = parked.session.session_id, stall, soc = parked.soc, "vehicle left below target");
                } else {
                    debug!(session = parked.session.session_id, stall, "vehicle left charged");
                }
                outcome.departures.push(DepartureRecord {
                    session_id: parked.session.session_id,
                    stall,
                    soc: parked.soc,
                    met_target,
                });
            }
        }

        if !outcome.departures.is_empty() {
            info!(t, departures = outcome.departures.len(), "departures processed");
        }
        Ok(outcome)
    }
}
