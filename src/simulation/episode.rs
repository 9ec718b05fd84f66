use std::time::Instant;

use tracing::{debug, info, info_span};

use super::parking_lot::ParkingLot;
use super::tracker::{EpisodeSummary, EpisodeTracker};
use crate::agents::ChargingAgent;
use crate::error::Result;

/// Drives `agent` through timesteps `[t_start, t_end)`: admit arrivals,
/// snapshot, decide, apply.
pub fn run_episode(
    lot: &mut ParkingLot,
    agent: &mut dyn ChargingAgent,
    t_start: i64,
    t_end: i64,
    tracker: &mut EpisodeTracker,
) -> Result<EpisodeSummary> {
    let span = info_span!("episode", agent = agent.name(), t_start, t_end);
    let _guard = span.enter();
    let final_soc = lot.params().final_soc;

    for t in t_start..t_end {
        let admitted = lot.admit_arrivals(t);
        let snapshot = lot.snapshot();

        let started = Instant::now();
        let actions = agent.act(&snapshot, t)?;
        let decision_ms = started.elapsed().as_secs_f64() * 1e3;

        let outcome = lot.apply(t, &actions)?;
        debug!(
            t,
            admitted,
            occupied = outcome.occupied,
            cost = outcome.cost,
            decision_ms,
            "step applied"
        );
        tracker.record(&outcome, final_soc, decision_ms);
    }

    let summary = tracker.summary(agent.name(), lot.rejected());
    info!(
        steps = summary.steps,
        total_cost = summary.total_cost,
        departures = summary.departures,
        missed = summary.missed_targets,
        "episode finished"
    );
    Ok(summary)
}
