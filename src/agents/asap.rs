use super::ChargingAgent;
use crate::domain::{OccupancySnapshot, PhysicalParameters};
use crate::dynamics::asap_action;
use crate::error::Result;

/// Rule-based baseline: every parked vehicle charges at full power until it
/// reaches the target, with the last step trimmed so it never overshoots.
///
/// Ignores prices and deadlines.
#[derive(Debug, Clone)]
pub struct AsapAgent {
    params: PhysicalParameters,
}

impl AsapAgent {
    pub fn new(params: PhysicalParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }
}

impl ChargingAgent for AsapAgent {
    fn name(&self) -> &'static str {
        "asap"
    }

    fn act(&mut self, snapshot: &OccupancySnapshot, _t: i64) -> Result<Vec<f64>> {
        snapshot.validate(&self.params)?;
        let mut actions = vec![0.0; self.params.max_cars];
        for (stall, vehicle) in snapshot.occupied() {
            actions[stall] = asap_action(vehicle.soc_t, &self.params);
        }
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Deadline, ParkingSlot, Vehicle};

    #[test]
    fn charges_occupied_stalls_only() {
        let params = PhysicalParameters {
            max_cars: 3,
            final_soc: 1.0,
            battery_capacity_kwh: 40.0,
            eta_c: 1.0,
            alpha_c_kw: 10.0,
            ..Default::default()
        };
        let deadline = Deadline::Departure { t_dep: 10 };
        let snapshot = OccupancySnapshot::new(vec![
            ParkingSlot::Occupied(Vehicle::charging(1, 0.1, deadline)),
            ParkingSlot::Empty,
            ParkingSlot::Occupied(Vehicle::charging(2, 0.9, deadline)),
        ]);
        let mut agent = AsapAgent::new(params).unwrap();
        let actions = agent.act(&snapshot, 0).unwrap();
        assert_eq!(actions[0], 0.25);
        assert_eq!(actions[1], 0.0);
        assert!((actions[2] - 0.1).abs() < 1e-12);
    }
}
