//! Closed-loop episodes: every agent drives the parking lot from arrival to
//! departure and every vehicle must leave at the target SOC.

use std::sync::Arc;

use ev_charge_control::agents::{
    AgentKind, AsapAgent, ChargingAgent, CostMinimizingAgent, ObservationBuilder,
    ProjectedPolicyAgent, SafetyProjector, UniformRandomPolicy,
};
use ev_charge_control::domain::{PhysicalParameters, PriceSeries};
use ev_charge_control::optimizer::ProjectionSettings;
use ev_charge_control::simulation::{
    generate_sessions, read_sessions, run_episode, EpisodeTracker, ParkingLot, SessionGeneratorConfig,
};
use rstest::rstest;

const EPISODE_LEN: i64 = 48;

fn build_agent(
    kind: AgentKind,
    params: PhysicalParameters,
    prices: Arc<PriceSeries>,
) -> Box<dyn ChargingAgent> {
    match kind {
        AgentKind::Asap => Box::new(AsapAgent::new(params).unwrap()),
        AgentKind::Optim => Box::new(CostMinimizingAgent::new(params, prices).unwrap()),
        AgentKind::Projected => {
            let policy = UniformRandomPolicy::new(params.max_cars, -0.1, 0.3, 11).unwrap();
            let projector = SafetyProjector::new(params, ProjectionSettings::default()).unwrap();
            let observations = ObservationBuilder::new(params.max_cars, 8, prices);
            Box::new(ProjectedPolicyAgent::new(policy, projector, observations))
        }
    }
}

#[rstest]
#[case::asap(AgentKind::Asap)]
#[case::optim(AgentKind::Optim)]
#[case::projected(AgentKind::Projected)]
fn synthetic_episode_serves_every_departure(#[case] kind: AgentKind) {
    let params = PhysicalParameters {
        max_cars: 4,
        ..Default::default()
    };
    let prices = Arc::new(PriceSeries::synthetic_daily(0, EPISODE_LEN as usize));
    let sessions = generate_sessions(&SessionGeneratorConfig::default(), &params, 0, EPISODE_LEN, 5);
    let mut lot = ParkingLot::new(params, prices.clone(), sessions).unwrap();
    let mut agent = build_agent(kind, params, prices);
    let mut tracker = EpisodeTracker::new();

    let summary = run_episode(&mut lot, agent.as_mut(), 0, EPISODE_LEN, &mut tracker).unwrap();

    assert_eq!(summary.agent, kind.to_string());
    assert_eq!(summary.steps, EPISODE_LEN as usize);
    assert!(summary.departures > 0);
    assert_eq!(summary.missed_targets, 0, "{summary:?}");
    assert!(summary.max_shortfall < 1e-4);
    assert_eq!(lot.occupied(), 0);
    assert_eq!(tracker.records().len(), EPISODE_LEN as usize);
}

#[test]
fn cost_optimizer_is_no_more_expensive_than_asap() {
    let params = PhysicalParameters {
        max_cars: 4,
        ..Default::default()
    };
    let prices = Arc::new(PriceSeries::synthetic_daily(0, EPISODE_LEN as usize));
    let sessions = generate_sessions(&SessionGeneratorConfig::default(), &params, 0, EPISODE_LEN, 9);

    let mut costs = Vec::new();
    for kind in [AgentKind::Asap, AgentKind::Optim] {
        let mut lot = ParkingLot::new(params, prices.clone(), sessions.clone()).unwrap();
        let mut agent = build_agent(kind, params, prices.clone());
        let summary =
            run_episode(&mut lot, agent.as_mut(), 0, EPISODE_LEN, &mut EpisodeTracker::new()).unwrap();
        assert_eq!(summary.missed_targets, 0);
        costs.push(summary.total_cost);
    }
    assert!(costs[1] <= costs[0] + 1e-3, "asap {} optim {}", costs[0], costs[1]);
}

#[test]
fn csv_inputs_drive_an_episode() {
    let prices = PriceSeries::from_csv_reader(
        "ts,price_im\n0,3.0\n1,3.0\n2,1.0\n3,1.0\n4,1.0\n5,2.0\n".as_bytes(),
    )
    .unwrap();
    let sessions = read_sessions(
        "session_id,ts_arr,ts_dep,soc_arr,soc_dis,t_dis\n1,0,4,0.6,0.0,0\n2,1,5,0.5,0.0,0\n".as_bytes(),
    )
    .unwrap();
    let params = PhysicalParameters {
        max_cars: 2,
        final_soc: 1.0,
        battery_capacity_kwh: 40.0,
        eta_c: 1.0,
        eta_d: 1.0,
        alpha_c_kw: 10.0,
        alpha_d_kw: 0.0,
    };
    let prices = Arc::new(prices);
    let mut lot = ParkingLot::new(params, prices.clone(), sessions).unwrap();
    let mut agent = CostMinimizingAgent::new(params, prices).unwrap();
    let mut tracker = EpisodeTracker::new();

    let summary = run_episode(&mut lot, &mut agent, 0, 6, &mut tracker).unwrap();

    assert_eq!(summary.departures, 2);
    assert_eq!(summary.missed_targets, 0);
    // 0.4 + 0.5 SOC of 40 kWh, all of it bought at the 1.0 price.
    assert!((summary.energy_charged_kwh - 36.0).abs() < 1e-3);
    assert!((summary.total_cost - 36.0).abs() < 1e-2, "{summary:?}");
}
