use thiserror::Error;

/// Errors raised by the charging core.
///
/// None of these are recovered inside the crate: the caller decides whether
/// to skip the episode, reset the lot, or abort.
#[derive(Debug, Error)]
pub enum ChargeError {
    /// The requested timestep is missing from the price series or appears more than once.
    #[error("timestep {t} matched {matches} price rows (expected exactly one)")]
    Lookup { t: i64, matches: usize },

    /// The solver found no optimal schedule, or a constant row (terminal SOC,
    /// laxity) is violated before solving.
    #[error("infeasible charging program: {0}")]
    InfeasibleProgram(String),

    /// Physical constants out of range, or a problem built with constants other
    /// than the optimizer's.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Wrong slot or action count, SOC outside `[0, final_soc]`, or a malformed session.
    #[error("invalid occupancy snapshot: {0}")]
    InvalidSnapshot(String),

    /// An applied action would leave the admissible SOC range.
    #[error("stall {stall}: action drives SOC to {soc:.6}, outside the admissible range")]
    SocOutOfRange { stall: usize, soc: f64 },

    /// The environment was asked to discharge beyond the session's remaining
    /// budget or outside its discharge window.
    #[error("stall {stall}: discharge of {requested:.6} SOC exceeds the allowance of {allowed:.6}")]
    DischargeNotAllowed {
        stall: usize,
        requested: f64,
        allowed: f64,
    },

    /// The solver rejected its settings or problem data.
    #[error("solver error: {0}")]
    Solver(String),

    /// Malformed price or session CSV.
    #[error("data error: {0}")]
    Data(#[from] csv::Error),

    /// Price or session file could not be opened.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = ChargeError> = std::result::Result<T, E>;
