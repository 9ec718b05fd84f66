use std::sync::Arc;

use crate::domain::{OccupancySnapshot, PriceSeries};
use crate::error::Result;

/// Values recorded per stall: `soc_t`, `t_rem`, `soc_dis`, `t_dis`.
pub const FEATURES_PER_STALL: usize = 4;

/// Flattens the lot into the fixed-width state vector fed to learned policies.
///
/// Layout: per stall `[soc_t, t_rem, soc_dis, t_dis]` (zeros for empty stalls),
/// then `price_window` predicted prices, then the hour of day. The price block
/// is zero-filled past the end of the price data so the width never changes.
#[derive(Debug, Clone)]
pub struct ObservationBuilder {
    max_cars: usize,
    price_window: usize,
    prices: Arc<PriceSeries>,
}

impl ObservationBuilder {
    pub fn new(max_cars: usize, price_window: usize, prices: Arc<PriceSeries>) -> Self {
        Self {
            max_cars,
            price_window,
            prices,
        }
    }

    pub fn width(&self) -> usize {
        self.max_cars * FEATURES_PER_STALL + self.price_window + 1
    }

    pub fn build(&self, snapshot: &OccupancySnapshot, t: i64) -> Result<Vec<f64>> {
        let mut x = Vec::with_capacity(self.width());
        for slot in snapshot.slots.iter().take(self.max_cars) {
            match slot.vehicle() {
                Some(v) => x.extend([
                    v.soc_t,
                    f64::from(v.deadline.remaining(t)),
                    v.soc_dis,
                    f64::from(v.t_dis),
                ]),
                None => x.extend([0.0; FEATURES_PER_STALL]),
            }
        }

        let predicted = self.prices.predict(t, self.price_window)?;
        x.extend(&predicted);
        x.resize(x.len() + self.price_window - predicted.len(), 0.0);
        x.push(t.rem_euclid(24) as f64);
        Ok(x)
    }
}
