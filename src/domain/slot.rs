use serde::{Deserialize, Serialize};

use super::params::{PhysicalParameters, SOC_TOLERANCE};
use crate::error::{ChargeError, Result};

/// When a parked vehicle has to be fully charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Deadline {
    /// Absolute departure timestep. The vehicle is still charged during `t_dep`.
    Departure { t_dep: i64 },
    /// Timesteps left before the vehicle leaves.
    Remaining { t_rem: u32 },
}

impl Deadline {
    /// Horizon index from which the SOC must sit at the target (`j_end`).
    ///
    /// Zero or negative means the vehicle has no time left.
    pub fn terminal_index(&self, t: i64) -> i64 {
        match *self {
            Deadline::Departure { t_dep } => t_dep - t + 1,
            Deadline::Remaining { t_rem } => i64::from(t_rem),
        }
    }

    /// Steps left until the deadline, as used by the laxity formula.
    pub fn laxity_offset(&self, t: i64) -> i64 {
        self.terminal_index(t) - 1
    }

    /// Timesteps left in the remaining-time convention, saturating at zero.
    pub fn remaining(&self, t: i64) -> u32 {
        u32::try_from(self.terminal_index(t).max(0)).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub session_id: u64,
    pub soc_t: f64,
    pub deadline: Deadline,
    /// Energy (as SOC fraction) the vehicle may still give back to the lot.
    pub soc_dis: f64,
    /// Timesteps during which discharging is still allowed.
    pub t_dis: u32,
}

impl Vehicle {
    /// A charge-only vehicle with no discharge allowance.
    pub fn charging(session_id: u64, soc_t: f64, deadline: Deadline) -> Self {
        Self {
            session_id,
            soc_t,
            deadline,
            soc_dis: 0.0,
            t_dis: 0,
        }
    }
}

/// One physical charging stall.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ParkingSlot {
    #[default]
    Empty,
    Occupied(Vehicle),
}

impl ParkingSlot {
    pub fn vehicle(&self) -> Option<&Vehicle> {
        match self {
            ParkingSlot::Empty => None,
            ParkingSlot::Occupied(vehicle) => Some(vehicle),
        }
    }

    pub fn is_occupied(&self) -> bool {
        matches!(self, ParkingSlot::Occupied(_))
    }
}

/// The lot as seen by an agent at one timestep, in stall order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OccupancySnapshot {
    pub slots: Vec<ParkingSlot>,
}

impl OccupancySnapshot {
    pub fn empty(max_cars: usize) -> Self {
        Self {
            slots: vec![ParkingSlot::Empty; max_cars],
        }
    }

    pub fn new(slots: Vec<ParkingSlot>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Occupied stalls with their stall index, in stall order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &Vehicle)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(stall, slot)| slot.vehicle().map(|vehicle| (stall, vehicle)))
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied().count()
    }

    /// Checks the snapshot against the lot layout and the SOC invariant.
    pub fn validate(&self, params: &PhysicalParameters) -> Result<()> {
        if self.slots.len() != params.max_cars {
            return Err(ChargeError::InvalidSnapshot(format!(
                "expected {} stalls, got {}",
                params.max_cars,
                self.slots.len()
            )));
        }
        for (stall, vehicle) in self.occupied() {
            if !(vehicle.soc_t >= -SOC_TOLERANCE
                && vehicle.soc_t <= params.final_soc + SOC_TOLERANCE)
            {
                return Err(ChargeError::InvalidSnapshot(format!(
                    "stall {stall}: soc_t {} outside [0, {}]",
                    vehicle.soc_t, params.final_soc
                )));
            }
            if !(vehicle.soc_dis >= 0.0) {
                return Err(ChargeError::InvalidSnapshot(format!(
                    "stall {stall}: negative discharge budget {}",
                    vehicle.soc_dis
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_index_follows_both_conventions() {
        let departure = Deadline::Departure { t_dep: 13 };
        assert_eq!(departure.terminal_index(10), 4);
        assert_eq!(departure.laxity_offset(10), 3);
        assert_eq!(departure.terminal_index(14), 0);

        let remaining = Deadline::Remaining { t_rem: 3 };
        assert_eq!(remaining.terminal_index(10), 3);
        assert_eq!(remaining.laxity_offset(10), 2);
    }

    #[test]
    fn remaining_saturates_for_departed_vehicles() {
        assert_eq!(Deadline::Departure { t_dep: 5 }.remaining(9), 0);
        assert_eq!(Deadline::Departure { t_dep: 5 }.remaining(5), 1);
    }

    #[test]
    fn occupied_keeps_stall_order() {
        let vehicle = Vehicle::charging(7, 0.5, Deadline::Remaining { t_rem: 2 });
        let snapshot = OccupancySnapshot::new(vec![
            ParkingSlot::Empty,
            ParkingSlot::Occupied(vehicle),
            ParkingSlot::Empty,
            ParkingSlot::Occupied(Vehicle { session_id: 8, ..vehicle }),
        ]);
        let stalls: Vec<_> = snapshot.occupied().map(|(stall, v)| (stall, v.session_id)).collect();
        assert_eq!(stalls, vec![(1, 7), (3, 8)]);
    }

    #[test]
    fn validate_rejects_wrong_length_and_soc() {
        let params = PhysicalParameters {
            max_cars: 2,
            ..Default::default()
        };
        assert!(matches!(
            OccupancySnapshot::empty(3).validate(&params),
            Err(ChargeError::InvalidSnapshot(_))
        ));

        let overfull = Vehicle::charging(1, 1.5, Deadline::Remaining { t_rem: 2 });
        let snapshot =
            OccupancySnapshot::new(vec![ParkingSlot::Occupied(overfull), ParkingSlot::Empty]);
        assert!(matches!(
            snapshot.validate(&params),
            Err(ChargeError::InvalidSnapshot(_))
        ));

        assert!(OccupancySnapshot::empty(2).validate(&params).is_ok());
    }
}
