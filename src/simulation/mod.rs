//! # Parking-Lot Simulation
//!
//! Closed-loop harness around the charging agents.
//!
//! - **Sessions**: arrivals from CSV or a seeded random generator
//! - **ParkingLot**: stall assignment, SOC updates, billing, departures
//! - **Tracker**: per-step records and the episode summary
//! - **Episode**: the arrive / observe / act / apply loop
//!
//! ```no_run
//! use std::sync::Arc;
//! use ev_charge_control::agents::AsapAgent;
//! use ev_charge_control::domain::{PhysicalParameters, PriceSeries};
//! use ev_charge_control::simulation::{
//!     generate_sessions, run_episode, EpisodeTracker, ParkingLot, SessionGeneratorConfig,
//! };
//!
//! let params = PhysicalParameters::default();
//! let prices = Arc::new(PriceSeries::synthetic_daily(0, 48));
//! let sessions = generate_sessions(&SessionGeneratorConfig::default(), &params, 0, 48, 7);
//! let mut lot = ParkingLot::new(params, prices, sessions)?;
//! let mut agent = AsapAgent::new(params)?;
//! let summary = run_episode(&mut lot, &mut agent, 0, 48, &mut EpisodeTracker::new())?;
//! println!("cost: {:.2}", summary.total_cost);
//! # Ok::<(), ev_charge_control::ChargeError>(())
//! ```

pub mod episode;
pub mod parking_lot;
pub mod sessions;
pub mod tracker;

pub use episode::run_episode;
pub use parking_lot::{DepartureRecord, ParkingLot, StepOutcome};
pub use sessions::{generate_sessions, load_sessions_csv, read_sessions, Session, SessionGeneratorConfig};
pub use tracker::{EpisodeSummary, EpisodeTracker, StepRecord};
