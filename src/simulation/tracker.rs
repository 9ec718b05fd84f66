//! Per-step bookkeeping for an episode and the summary printed at the end.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::parking_lot::StepOutcome;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub t: i64,
    pub occupied: usize,
    pub cost: f64,
    pub energy_charged_kwh: f64,
    pub energy_discharged_kwh: f64,
    pub departures: usize,
    pub missed_targets: usize,
    /// Wall-clock time the agent spent choosing the action.
    pub decision_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub agent: String,
    pub steps: usize,
    pub total_cost: f64,
    pub energy_charged_kwh: f64,
    pub energy_discharged_kwh: f64,
    pub departures: usize,
    pub missed_targets: usize,
    /// Worst shortfall below the target SOC among departures.
    pub max_shortfall: f64,
    pub rejected_sessions: usize,
    pub mean_decision_ms: f64,
    pub max_decision_ms: f64,
}

#[derive(Debug, Default)]
pub struct EpisodeTracker {
    records: Vec<StepRecord>,
    max_shortfall: f64,
}

impl EpisodeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &StepOutcome, final_soc: f64, decision_ms: f64) {
        for departure in &outcome.departures {
            self.max_shortfall = self.max_shortfall.max(final_soc - departure.soc);
        }
        self.records.push(StepRecord {
            t: outcome.t,
            occupied: outcome.occupied,
            cost: outcome.cost,
            energy_charged_kwh: outcome.energy_charged_kwh,
            energy_discharged_kwh: outcome.energy_discharged_kwh,
            departures: outcome.departures.len(),
            missed_targets: outcome.departures.iter().filter(|d| !d.met_target).count(),
            decision_ms,
        });
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn summary(&self, agent: &str, rejected_sessions: usize) -> EpisodeSummary {
        let steps = self.records.len();
        let total_decision: f64 = self.records.iter().map(|r| r.decision_ms).sum();
        EpisodeSummary {
            agent: agent.to_string(),
            steps,
            total_cost: self.records.iter().map(|r| r.cost).sum(),
            energy_charged_kwh: self.records.iter().map(|r| r.energy_charged_kwh).sum(),
            energy_discharged_kwh: self.records.iter().map(|r| r.energy_discharged_kwh).sum(),
            departures: self.records.iter().map(|r| r.departures).sum(),
            missed_targets: self.records.iter().map(|r| r.missed_targets).sum(),
            max_shortfall: self.max_shortfall,
            rejected_sessions,
            mean_decision_ms: if steps == 0 { 0.0 } else { total_decision / steps as f64 },
            max_decision_ms: self.records.iter().map(|r| r.decision_ms).fold(0.0, f64::max),
        }
    }

    /// Writes one CSV row per step.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        for record in &self.records {
            csv.serialize(record)?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_csv(std::fs::File::create(path)?)
    }
}
