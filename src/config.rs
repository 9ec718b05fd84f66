use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::agents::AgentKind;
use crate::domain::PhysicalParameters;
use crate::optimizer::ProjectionSettings;
use crate::simulation::SessionGeneratorConfig;

pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "EVCC__";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub physical: PhysicalParameters,
    pub simulation: SimulationConfig,
    pub projection: ProjectionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub agent: AgentKind,
    pub seed: u64,
    /// Price CSV; a synthetic daily profile is used when unset.
    pub prices_file: Option<PathBuf>,
    /// Session CSV; sessions are generated when unset.
    pub sessions_file: Option<PathBuf>,
    /// Per-step CSV trace written after the episode.
    pub trace_file: Option<PathBuf>,
    pub ts_start: i64,
    pub episode_len: usize,
    pub generator: SessionGeneratorConfig,
    /// Predicted prices included in the policy observation.
    pub price_window: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            agent: AgentKind::Optim,
            seed: 42,
            prices_file: None,
            sessions_file: None,
            trace_file: None,
            ts_start: 0,
            episode_len: 96,
            generator: SessionGeneratorConfig::default(),
            price_window: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectionConfig {
    pub discharge_enabled: bool,
    /// Range of the random exploration policy.
    pub policy_low: f64,
    pub policy_high: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            discharge_enabled: true,
            policy_low: -0.1,
            policy_high: 0.3,
        }
    }
}

impl ProjectionConfig {
    pub fn settings(&self) -> ProjectionSettings {
        ProjectionSettings {
            discharge_enabled: self.discharge_enabled,
        }
    }
}

impl Config {
    /// Defaults, then `config/default.toml`, then `path`, then `EVCC__*`
    /// environment variables (`EVCC__PHYSICAL__MAX_CARS=4`).
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            anyhow::ensure!(path.exists(), "config file {} not found", path.display());
        }
        let cfg: Config = Self::figment(path)
            .extract()
            .context("failed to load configuration")?;
        cfg.physical
            .validate()
            .context("invalid [physical] parameters")?;
        Ok(cfg)
    }
}
