use std::io::Read;
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChargeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Simulation timestep this price applies to.
    pub ts: i64,
    /// Imbalance price per kWh.
    #[serde(rename = "price_im")]
    pub price: f64,
}

/// Time-indexed electricity prices, one row per timestep, kept in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Self {
        Self { points }
    }

    /// Loads a price CSV with `ts` and `price_im` columns. Other columns are ignored.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let series = Self::from_csv_reader(file)?;
        debug!(path = %path.as_ref().display(), rows = series.len(), "loaded price series");
        Ok(series)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::Reader::from_reader(reader);
        let points = csv
            .deserialize::<PricePoint>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { points })
    }

    /// Daily pattern for runs without a price file: cheap at night, expensive
    /// during the working day, medium in between.
    pub fn synthetic_daily(ts_start: i64, len: usize) -> Self {
        let points = (0..len as i64)
            .map(|offset| {
                let ts = ts_start + offset;
                let hour = ts.rem_euclid(24);
                let price = if !(6..=22).contains(&hour) {
                    0.5
                } else if (9..=18).contains(&hour) {
                    2.0
                } else {
                    1.0
                };
                PricePoint { ts, price }
            })
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn first_ts(&self) -> Option<i64> {
        self.points.first().map(|p| p.ts)
    }

    pub fn last_ts(&self) -> Option<i64> {
        self.points.last().map(|p| p.ts)
    }

    /// Row index of timestep `t`. Fails unless `t` appears exactly once.
    pub fn index_of(&self, t: i64) -> Result<usize> {
        let matches = self.points.iter().positions(|p| p.ts == t).collect_vec();
        match matches.as_slice() {
            [idx] => Ok(*idx),
            _ => Err(ChargeError::Lookup {
                t,
                matches: matches.len(),
            }),
        }
    }

    pub fn price_at(&self, t: i64) -> Result<f64> {
        Ok(self.points[self.index_of(t)?].price)
    }

    /// Prices for timesteps `[t, t + n)`, cut short at the end of the series.
    ///
    /// Callers size their horizon to the returned length; nothing is padded.
    pub fn predict(&self, t: i64, n: usize) -> Result<Vec<f64>> {
        let start = self.index_of(t)?;
        let end = start.saturating_add(n).min(self.points.len());
        Ok(self.points[start..end].iter().map(|p| p.price).collect())
    }
}
