// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Intervention Impact Engine - Trial Generator

//! Per-trial outcome model.
//!
//! Each trial walks the chain reached → uptake → adverse events without and
//! with the intervention, then scores cases prevented in the uptake group.
//! Trial `i` draws from ChaCha8 stream `i` under the run seed, so a run is
//! reproducible whether trials execute sequentially or on the rayon pool.

use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Binomial, Distribution};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::distribution::TrialDistributions;
use crate::error::SimError;
use crate::types::{SimulationConfig, TrialRecord};

// ─── Generator Seam ─────────────────────────────────────────────────────────

/// Produces the trial table for a validated config.
pub trait TrialGenerator {
    fn generate(
        &self,
        config: &SimulationConfig,
        distributions: &TrialDistributions,
    ) -> Result<Vec<TrialRecord>, SimError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Execution {
    #[default]
    Parallel,
    Sequential,
}

/// Seeded Monte Carlo generator.
#[derive(Debug, Clone, Copy)]
pub struct MonteCarloGenerator {
    pub seed: u64,
    pub execution: Execution,
}

impl MonteCarloGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed, execution: Execution::default() }
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }
}

impl TrialGenerator for MonteCarloGenerator {
    fn generate(
        &self,
        config: &SimulationConfig,
        distributions: &TrialDistributions,
    ) -> Result<Vec<TrialRecord>, SimError> {
        let start = Instant::now();
        let n = usize::try_from(config.n_trials)
            .map_err(|_| SimError::invalid("n_trials", config.n_trials, "exceeds addressable memory"))?;
        let seed = self.seed;

        let run = |i: usize| generate_trial(config, distributions, &mut trial_rng(seed, i as u64));
        let trials = match self.execution {
            Execution::Sequential => (0..n).map(run).collect::<Result<Vec<_>, _>>()?,
            Execution::Parallel => (0..n).into_par_iter().map(run).collect::<Result<Vec<_>, _>>()?,
        };

        tracing::debug!(
            simulation = %config.simulation_name,
            n_trials = n,
            seed,
            execution = ?self.execution,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generated trials"
        );
        Ok(trials)
    }
}

/// RNG for one trial: the run seed selects the key, the trial index the stream.
pub fn trial_rng(seed: u64, trial_index: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(trial_index);
    rng
}

/// Generate every trial for `config` with a fresh seeded generator.
pub fn generate_trials(
    config: &SimulationConfig,
    distributions: &TrialDistributions,
    seed: u64,
) -> Result<Vec<TrialRecord>, SimError> {
    MonteCarloGenerator::new(seed).generate(config, distributions)
}

// ─── Single Trial ───────────────────────────────────────────────────────────

/// Draw one trial. Later draws consume earlier ones as parameters, so the
/// order of draws is fixed.
pub fn generate_trial<R: Rng + ?Sized>(
    config: &SimulationConfig,
    d: &TrialDistributions,
    rng: &mut R,
) -> Result<TrialRecord, SimError> {
    let population = config.population_size;

    let p_reached = finite(d.reached.sample(rng), "p_reached")?;
    let n_reached = ((population as f64) * p_reached)
        .round()
        .clamp(0.0, population as f64) as u64;

    let p_uptake = finite(d.uptake.sample(rng), "p_uptake")?;
    let n_uptake = draw_binomial(rng, n_reached, p_uptake, "uptake")?;

    let p_adverse_event = finite(d.adverse_event.sample(rng), "p_adverse_event")?;

    // n_uptake <= n_reached <= population
    let n_no_intervention = population - n_uptake;
    let adverse_events_no_intervention =
        draw_binomial(rng, n_no_intervention, p_adverse_event, "adverse events without intervention")?;

    let effect_size = d.effect_size.sample(rng);
    let adjusted_adverse_event_rate = (p_adverse_event * (1.0 - effect_size)).clamp(0.0, 1.0);
    let adverse_events_with_intervention = draw_binomial(
        rng,
        n_uptake,
        adjusted_adverse_event_rate,
        "adverse events with intervention",
    )?;

    let total_adverse_events = adverse_events_no_intervention + adverse_events_with_intervention;
    // Expected (not simulated) count at the drawn baseline rate.
    let cases_prevented =
        n_uptake as f64 * p_adverse_event - adverse_events_with_intervention as f64;

    Ok(TrialRecord {
        p_reached,
        n_reached,
        p_uptake,
        n_uptake,
        p_adverse_event,
        n_no_intervention,
        adverse_events_no_intervention,
        effect_size,
        adjusted_adverse_event_rate,
        adverse_events_with_intervention,
        total_adverse_events,
        cases_prevented,
    })
}

fn finite(value: f64, what: &'static str) -> Result<f64, SimError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SimError::domain("beta", format!("{what} draw is {value}")))
    }
}

fn draw_binomial<R: Rng + ?Sized>(
    rng: &mut R,
    n: u64,
    p: f64,
    what: &'static str,
) -> Result<u64, SimError> {
    let dist = Binomial::new(n, p)
        .map_err(|e| SimError::domain("binomial", format!("{what}: Binomial({n}, {p}): {e}")))?;
    Ok(dist.sample(rng))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::reference_config;

    fn run(config: &SimulationConfig, generator: MonteCarloGenerator) -> Vec<TrialRecord> {
        let d = TrialDistributions::from_config(config).expect("test: distributions");
        generator.generate(config, &d).expect("test: generation")
    }

    #[test]
    fn counts_respect_population_bounds() {
        let cfg = reference_config();
        let trials = run(&cfg, MonteCarloGenerator::new(1));
        assert_eq!(trials.len() as u64, cfg.n_trials);
        for t in &trials {
            assert!(t.n_uptake <= t.n_reached);
            assert!(t.n_reached <= cfg.population_size);
            assert_eq!(t.n_no_intervention, cfg.population_size - t.n_uptake);
            assert!(t.adverse_events_no_intervention <= t.n_no_intervention);
            assert!(t.adverse_events_with_intervention <= t.n_uptake);
            assert_eq!(
                t.total_adverse_events,
                t.adverse_events_no_intervention + t.adverse_events_with_intervention
            );
            assert!(t.effect_size >= cfg.effect_size_min && t.effect_size <= cfg.effect_size_max);
        }
    }

    #[test]
    fn derived_fields_follow_formulas() {
        let cfg = reference_config();
        for t in run(&cfg, MonteCarloGenerator::new(3)) {
            let rate = t.p_adverse_event * (1.0 - t.effect_size);
            assert_eq!(t.adjusted_adverse_event_rate, rate.clamp(0.0, 1.0));
            let expected = t.n_uptake as f64 * t.p_adverse_event
                - t.adverse_events_with_intervention as f64;
            assert_eq!(t.cases_prevented, expected);
            let reached = (cfg.population_size as f64 * t.p_reached).round() as u64;
            assert_eq!(t.n_reached, reached.min(cfg.population_size));
        }
    }

    #[test]
    fn same_seed_same_records() {
        let cfg = reference_config();
        let a = run(&cfg, MonteCarloGenerator::new(99));
        let b = run(&cfg, MonteCarloGenerator::new(99));
        assert_eq!(a, b);
    }

    #[test]
    fn parallel_matches_sequential() {
        let cfg = reference_config();
        let par = run(&cfg, MonteCarloGenerator::new(5).with_execution(Execution::Parallel));
        let seq = run(&cfg, MonteCarloGenerator::new(5).with_execution(Execution::Sequential));
        assert_eq!(par, seq);
    }

    #[test]
    fn generate_trials_matches_default_generator() {
        let cfg = reference_config();
        let d = TrialDistributions::from_config(&cfg).expect("test: distributions");
        let direct = generate_trials(&cfg, &d, 21).expect("test: generate_trials");
        assert_eq!(direct, run(&cfg, MonteCarloGenerator::new(21)));
        assert_eq!(direct.len() as u64, cfg.n_trials);
    }

    #[test]
    fn different_seeds_differ() {
        let cfg = reference_config();
        let a = run(&cfg, MonteCarloGenerator::new(1));
        let b = run(&cfg, MonteCarloGenerator::new(2));
        assert_ne!(a, b);
    }

    #[test]
    fn full_reach_target_reaches_everyone() {
        let mut cfg = reference_config();
        cfg.target_p_reached = 1.0;
        cfg.n_trials = 200;
        for t in run(&cfg, MonteCarloGenerator::new(11)) {
            assert_eq!(t.p_reached, 1.0);
            assert_eq!(t.n_reached, cfg.population_size);
        }
    }

    #[test]
    fn fixed_effect_size_when_bounds_equal() {
        let mut cfg = reference_config();
        cfg.effect_size_min = 0.2;
        cfg.effect_size_max = 0.2;
        cfg.n_trials = 50;
        for t in run(&cfg, MonteCarloGenerator::new(4)) {
            assert_eq!(t.effect_size, 0.2);
        }
    }

    #[test]
    fn full_effect_prevents_every_event() {
        let mut cfg = reference_config();
        cfg.effect_size_min = 1.0;
        cfg.effect_size_max = 1.0;
        cfg.n_trials = 50;
        for t in run(&cfg, MonteCarloGenerator::new(8)) {
            assert_eq!(t.adjusted_adverse_event_rate, 0.0);
            assert_eq!(t.adverse_events_with_intervention, 0);
            assert!(t.cases_prevented >= 0.0);
        }
    }

    #[test]
    fn binomial_rejects_out_of_range_probability() {
        let mut rng = trial_rng(0, 0);
        let err = draw_binomial(&mut rng, 10, 1.5, "test").expect_err("test: p > 1 must fail");
        assert!(matches!(err, SimError::DistributionDomain { .. }));
    }
}
