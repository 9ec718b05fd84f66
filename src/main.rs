use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ev_charge_control::agents::{
    AgentKind, AsapAgent, ChargingAgent, CostMinimizingAgent, ObservationBuilder,
    ProjectedPolicyAgent, SafetyProjector, UniformRandomPolicy,
};
use ev_charge_control::config::Config;
use ev_charge_control::domain::PriceSeries;
use ev_charge_control::simulation::{
    generate_sessions, load_sessions_csv, run_episode, EpisodeTracker, ParkingLot,
};
use ev_charge_control::telemetry::init_tracing;
use tracing::{info, warn};

/// Runs one parking-lot charging episode and prints its summary as JSON.
#[derive(Parser, Debug)]
#[command(name = "ev-charge-control", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Charging agent: asap, optim or projected
    #[arg(long)]
    agent: Option<AgentKind>,

    /// Price CSV with `ts,price_im` columns
    #[arg(long)]
    prices: Option<PathBuf>,

    /// Session CSV with `session_id,ts_arr,ts_dep,soc_arr[,soc_dis,t_dis]` columns
    #[arg(long)]
    sessions: Option<PathBuf>,

    /// Seed for the session generator and the random policy
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = Config::load(args.config.as_deref())?;
    if let Some(agent) = args.agent {
        cfg.simulation.agent = agent;
    }
    if let Some(seed) = args.seed {
        cfg.simulation.seed = seed;
    }
    if args.prices.is_some() {
        cfg.simulation.prices_file = args.prices;
    }
    if args.sessions.is_some() {
        cfg.simulation.sessions_file = args.sessions;
    }

    let sim = &cfg.simulation;
    let params = cfg.physical;
    let t_start = sim.ts_start;

    let prices = Arc::new(match &sim.prices_file {
        Some(path) => PriceSeries::from_csv_path(path)
            .with_context(|| format!("failed to load prices from {}", path.display()))?,
        None => PriceSeries::synthetic_daily(t_start, sim.episode_len),
    });
    let last_ts = prices
        .last_ts()
        .context("price series is empty")?;
    let mut t_end = t_start + sim.episode_len as i64;
    if t_end > last_ts + 1 {
        warn!(requested = t_end, available = last_ts + 1, "episode truncated to price data");
        t_end = last_ts + 1;
    }

    let sessions = match &sim.sessions_file {
        Some(path) => load_sessions_csv(path)
            .with_context(|| format!("failed to load sessions from {}", path.display()))?,
        None => generate_sessions(&sim.generator, &params, t_start, t_end, sim.seed),
    };
    info!(
        agent = %sim.agent,
        sessions = sessions.len(),
        t_start,
        t_end,
        "starting episode"
    );

    let mut agent: Box<dyn ChargingAgent> = match sim.agent {
        AgentKind::Asap => Box::new(AsapAgent::new(params)?),
        AgentKind::Optim => Box::new(CostMinimizingAgent::new(params, prices.clone())?),
        AgentKind::Projected => {
            let policy = UniformRandomPolicy::new(
                params.max_cars,
                cfg.projection.policy_low,
                cfg.projection.policy_high,
                sim.seed,
            )?;
            let projector = SafetyProjector::new(params, cfg.projection.settings())?;
            let observations = ObservationBuilder::new(params.max_cars, sim.price_window, prices.clone());
            Box::new(ProjectedPolicyAgent::new(policy, projector, observations))
        }
    };

    let mut lot = ParkingLot::new(params, prices, sessions)?;
    let mut tracker = EpisodeTracker::new();
    let summary = run_episode(&mut lot, agent.as_mut(), t_start, t_end, &mut tracker)
        .context("episode aborted")?;

    if let Some(path) = &sim.trace_file {
        tracker
            .write_csv_path(path)
            .with_context(|| format!("failed to write trace to {}", path.display()))?;
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
