// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Intervention Impact Engine - Scenario Definitions

//! Named intervention scenarios.
//!
//! A scenario file is JSON:
//!
//! ```json
//! { "scenarios": [ {
//!     "simulation_name": "reference_intervention",
//!     "label": "Reference intervention",
//!     "population_by_region": { "north": 200000, "south": 222726 },
//!     "n_trials": 100000,
//!     "target_p_reached": 0.145,
//!     "target_p_uptake": 0.75,
//!     "target_p_adverse_event": 0.06,
//!     "effect_size_min": 0.10,
//!     "effect_size_max": 0.24
//! } ] }
//! ```
//!
//! `concentration` defaults to 40 and `label` to the simulation name.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ScenarioError, SimError};
use crate::types::{SimulationConfig, DEFAULT_CONCENTRATION};

// ─── Scenario Configuration ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub label: String,
    pub config: SimulationConfig,
}

impl Scenario {
    pub fn name(&self) -> &str {
        &self.config.simulation_name
    }

    /// Case-insensitive substring match on name or label.
    pub fn matches(&self, filter: &str) -> bool {
        let f = filter.to_lowercase();
        self.name().to_lowercase().contains(&f) || self.label.to_lowercase().contains(&f)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    scenarios: Vec<ScenarioSpec>,
}

/// One entry as written in a scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSpec {
    pub simulation_name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub population_size: Option<u64>,
    /// Sub-regional totals, summed into `population_size`.
    #[serde(default)]
    pub population_by_region: Option<BTreeMap<String, u64>>,
    pub n_trials: u64,
    #[serde(default = "default_concentration")]
    pub concentration: f64,
    pub target_p_reached: f64,
    pub target_p_uptake: f64,
    pub target_p_adverse_event: f64,
    pub effect_size_min: f64,
    pub effect_size_max: f64,
}

fn default_concentration() -> f64 {
    DEFAULT_CONCENTRATION
}

impl ScenarioSpec {
    fn population(&self) -> Result<u64, ScenarioError> {
        match (&self.population_size, &self.population_by_region) {
            (Some(total), None) => Ok(*total),
            (None, Some(regions)) => regions.iter().try_fold(0u64, |acc, (region, n)| {
                acc.checked_add(*n).ok_or_else(|| ScenarioError::PopulationOverflow {
                    name: self.simulation_name.clone(),
                    region: region.clone(),
                })
            }),
            _ => Err(ScenarioError::AmbiguousPopulation {
                name: self.simulation_name.clone(),
            }),
        }
    }

    /// Resolve the population and build the run config. Field domains are
    /// checked later by the simulator.
    pub fn into_scenario(self) -> Result<Scenario, ScenarioError> {
        let population_size = self.population()?;
        let label = self.label.clone().unwrap_or_else(|| self.simulation_name.clone());
        Ok(Scenario {
            label,
            config: SimulationConfig {
                population_size,
                n_trials: self.n_trials,
                concentration: self.concentration,
                target_p_reached: self.target_p_reached,
                target_p_uptake: self.target_p_uptake,
                target_p_adverse_event: self.target_p_adverse_event,
                effect_size_min: self.effect_size_min,
                effect_size_max: self.effect_size_max,
                simulation_name: self.simulation_name,
            },
        })
    }
}

// ─── Loading ────────────────────────────────────────────────────────────────

/// Parse scenario JSON. `origin` only labels errors.
pub fn parse_scenarios(json: &str, origin: &Path) -> Result<Vec<Scenario>, SimError> {
    let file: ScenarioFile = serde_json::from_str(json).map_err(|source| ScenarioError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;

    // Names key the cache, so two entries sharing one would share results.
    let mut seen = HashSet::new();
    let mut scenarios = Vec::with_capacity(file.scenarios.len());
    for spec in file.scenarios {
        if !seen.insert(spec.simulation_name.clone()) {
            return Err(ScenarioError::DuplicateName(spec.simulation_name).into());
        }
        scenarios.push(spec.into_scenario()?);
    }
    Ok(scenarios)
}

pub fn load_scenarios(path: &Path) -> Result<Vec<Scenario>, SimError> {
    let json = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scenarios(&json, path)
}

/// Built-in scenario used when no scenario file is given.
pub fn reference_scenarios() -> Vec<Scenario> {
    vec![Scenario {
        label: "Reference intervention (ANC cohort)".to_string(),
        config: SimulationConfig {
            population_size: 422_726,
            n_trials: 100_000,
            concentration: DEFAULT_CONCENTRATION,
            target_p_reached: 0.145,
            target_p_uptake: 0.75,
            target_p_adverse_event: 0.06,
            effect_size_min: 0.10,
            effect_size_max: 0.24,
            simulation_name: "reference_intervention".to_string(),
        },
    }]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
