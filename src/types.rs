// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Intervention Impact Engine - Type Definitions

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Shape value shared by every Beta distribution unless a scenario overrides it.
pub const DEFAULT_CONCENTRATION: f64 = 40.0;

// ─── Simulation Config ──────────────────────────────────────────────────────

/// Immutable input to one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub population_size: u64,
    pub n_trials: u64,
    /// Fixed Beta shape `a`; higher values tighten every drawn probability
    /// around its target.
    pub concentration: f64,
    pub target_p_reached: f64,
    pub target_p_uptake: f64,
    pub target_p_adverse_event: f64,
    pub effect_size_min: f64,
    pub effect_size_max: f64,
    /// Cache key component; must be unique per parameter set.
    pub simulation_name: String,
}

impl SimulationConfig {
    /// Check every field against its domain. Runs before any random draw.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.population_size == 0 {
            return Err(SimError::invalid(
                "population_size",
                self.population_size,
                "must be positive",
            ));
        }
        if self.n_trials == 0 {
            return Err(SimError::invalid("n_trials", self.n_trials, "must be positive"));
        }
        if !(self.concentration.is_finite() && self.concentration > 0.0) {
            return Err(SimError::invalid(
                "concentration",
                self.concentration,
                "must be a positive finite number",
            ));
        }

        for (field, p) in [
            ("target_p_reached", self.target_p_reached),
            ("target_p_uptake", self.target_p_uptake),
            ("target_p_adverse_event", self.target_p_adverse_event),
        ] {
            check_target_probability(field, p)?;
        }

        for (field, e) in [
            ("effect_size_min", self.effect_size_min),
            ("effect_size_max", self.effect_size_max),
        ] {
            if !(0.0..=1.0).contains(&e) {
                return Err(SimError::invalid(field, e, "must lie in [0, 1]"));
            }
        }
        if self.effect_size_min > self.effect_size_max {
            return Err(SimError::invalid(
                "effect_size_min",
                self.effect_size_min,
                "must not exceed effect_size_max",
            ));
        }

        if self.simulation_name.trim().is_empty() {
            return Err(SimError::invalid(
                "simulation_name",
                "\"\"",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Target probabilities live in (0, 1]. NaN fails both comparisons.
pub(crate) fn check_target_probability(field: &'static str, p: f64) -> Result<(), SimError> {
    if p > 0.0 && p <= 1.0 {
        Ok(())
    } else {
        Err(SimError::invalid(field, p, "must lie in (0, 1]"))
    }
}

// ─── Trial Record ───────────────────────────────────────────────────────────

/// One row of Monte Carlo output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub p_reached: f64,
    pub n_reached: u64,
    pub p_uptake: f64,
    pub n_uptake: u64,
    pub p_adverse_event: f64,
    pub n_no_intervention: u64,
    pub adverse_events_no_intervention: u64,
    pub effect_size: f64,
    pub adjusted_adverse_event_rate: f64,
    pub adverse_events_with_intervention: u64,
    pub total_adverse_events: u64,
    /// Expected events in the uptake group at the drawn baseline rate minus
    /// the simulated events with intervention. Real-valued, can be negative.
    pub cases_prevented: f64,
}

// ─── Simulation Output ──────────────────────────────────────────────────────

/// A completed run: the config it was produced from plus every trial, in
/// trial order. This is the unit the cache persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub config: SimulationConfig,
    pub trials: Vec<TrialRecord>,
}

impl SimulationOutput {
    pub fn new(config: SimulationConfig, trials: Vec<TrialRecord>) -> Self {
        Self { config, trials }
    }

    pub fn name(&self) -> &str {
        &self.config.simulation_name
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Trials are numbered from 1.
    pub fn trial(&self, index: usize) -> Option<&TrialRecord> {
        index.checked_sub(1).and_then(|i| self.trials.get(i))
    }

    pub fn cases_prevented(&self) -> impl Iterator<Item = f64> + '_ {
        self.trials.iter().map(|t| t.cases_prevented)
    }

    pub fn effect_sizes(&self) -> impl Iterator<Item = f64> + '_ {
        self.trials.iter().map(|t| t.effect_size)
    }
}
