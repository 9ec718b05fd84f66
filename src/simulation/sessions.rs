//! Charging sessions: who arrives when, with how much charge, and until when.

use std::io::Read;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::PhysicalParameters;
use crate::error::{ChargeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: u64,
    /// First timestep the vehicle is parked.
    pub ts_arr: i64,
    /// Last timestep the vehicle is parked and charged.
    pub ts_dep: i64,
    /// SOC on arrival.
    pub soc_arr: f64,
    /// Discharge budget agreed on arrival.
    #[serde(default)]
    pub soc_dis: f64,
    /// Timesteps after arrival during which discharge is allowed.
    #[serde(default)]
    pub t_dis: u32,
}

impl Session {
    pub fn dwell(&self) -> i64 {
        self.ts_dep - self.ts_arr + 1
    }
}

/// Reads a session CSV (`session_id, ts_arr, ts_dep, soc_arr[, soc_dis, t_dis]`),
/// sorted by arrival.
pub fn load_sessions_csv(path: impl AsRef<Path>) -> Result<Vec<Session>> {
    let file = std::fs::File::open(path.as_ref())?;
    let sessions = read_sessions(file)?;
    debug!(path = %path.as_ref().display(), sessions = sessions.len(), "loaded sessions");
    Ok(sessions)
}

pub fn read_sessions<R: Read>(reader: R) -> Result<Vec<Session>> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut sessions = csv
        .deserialize::<Session>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if let Some(bad) = sessions.iter().find(|s| s.ts_dep < s.ts_arr) {
        return Err(ChargeError::InvalidSnapshot(format!(
            "session {} departs at {} before arriving at {}",
            bad.session_id, bad.ts_dep, bad.ts_arr
        )));
    }
    sessions.sort_by_key(|s| (s.ts_arr, s.session_id));
    Ok(sessions)
}

/// Settings for [`generate_sessions`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionGeneratorConfig {
    /// Probability that a vehicle arrives in any given timestep.
    pub arrival_probability: f64,
    pub dwell_min: u32,
    pub dwell_max: u32,
    pub soc_arr_min: f64,
    pub soc_arr_max: f64,
    /// Largest discharge budget offered to a session.
    pub soc_dis_max: f64,
    /// Fraction of full-power charging over the stay a session may require.
    pub feasibility_margin: f64,
}

impl Default for SessionGeneratorConfig {
    fn default() -> Self {
        Self {
            arrival_probability: 0.4,
            dwell_min: 3,
            dwell_max: 12,
            soc_arr_min: 0.2,
            soc_arr_max: 0.8,
            soc_dis_max: 0.1,
            feasibility_margin: 0.8,
        }
    }
}

/// Random sessions arriving in `[ts_start, ts_end)` and leaving no later than
/// `ts_end - 1`. Every session can reach the target SOC by charging at full
/// power for at most `feasibility_margin` of its stay.
pub fn generate_sessions(
    config: &SessionGeneratorConfig,
    params: &PhysicalParameters,
    ts_start: i64,
    ts_end: i64,
    seed: u64,
) -> Vec<Session> {
    let mut rng = StdRng::seed_from_u64(seed);
    let step_gain = params.full_power_soc_step();
    let dwell_max = config.dwell_max.max(config.dwell_min);
    let mut sessions = Vec::new();

    for ts_arr in ts_start..ts_end {
        if !rng.gen_bool(config.arrival_probability.clamp(0.0, 1.0)) {
            continue;
        }
        let dwell = i64::from(rng.gen_range(config.dwell_min..=dwell_max));
        let ts_dep = (ts_arr + dwell - 1).min(ts_end - 1);
        let stay = (ts_dep - ts_arr + 1) as f64;

        let reachable_floor = params.final_soc - config.feasibility_margin * stay * step_gain;
        let sampled = rng.gen_range(config.soc_arr_min..=config.soc_arr_max.max(config.soc_arr_min));
        let soc_arr = sampled.max(reachable_floor).clamp(0.0, params.final_soc);

        let soc_dis = if config.soc_dis_max > 0.0 {
            rng.gen_range(0.0..=config.soc_dis_max)
        } else {
            0.0
        };
        let t_dis = rng.gen_range(0..=(stay as u32) / 2);

        sessions.push(Session {
            session_id: sessions.len() as u64,
            ts_arr,
            ts_dep,
            soc_arr,
            soc_dis,
            t_dis,
        });
    }
    sessions
}
