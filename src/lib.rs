//! EV parking-lot charging control.
//!
//! Models a lot of `max_cars` stalls, predicts imbalance prices over a
//! receding horizon, and decides per-stall charge/discharge actions that are
//! guaranteed to leave every vehicle at the target SOC by its deadline.

pub mod agents;
pub mod config;
pub mod domain;
pub mod dynamics;
pub mod error;
pub mod optimizer;
pub mod simulation;
pub mod telemetry;

pub use error::{ChargeError, Result};
