// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Intervention Impact Engine - Summarizer

use serde::Serialize;

use crate::error::SimError;
use crate::types::SimulationOutput;

/// Percentile levels reported for cases prevented, as fractions.
pub const PERCENTILE_LEVELS: [f64; 9] = [0.025, 0.05, 0.10, 0.25, 0.50, 0.75, 0.90, 0.95, 0.975];

// ─── Descriptive Statistics ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    /// Mean, sample standard deviation, and a normal-approximation 95% CI of
    /// the mean. An empty sample yields all zeros.
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let stderr = std_dev / (n as f64).sqrt();
        let z = 1.96; // 95% CI
        Self {
            mean,
            std_dev,
            ci_lower: mean - z * stderr,
            ci_upper: mean + z * stderr,
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }
}

// ─── Quantiles ──────────────────────────────────────────────────────────────

/// Linear-interpolation quantile of an ascending-sorted sample: with
/// `h = (n - 1) * q`, interpolate between order statistics `floor(h)` and
/// `floor(h) + 1`. Returns `None` for an empty sample.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Cases-prevented percentiles at [`PERCENTILE_LEVELS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Percentiles {
    pub p2_5: f64,
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p97_5: f64,
}

impl Percentiles {
    fn from_sorted(sorted: &[f64]) -> Option<Self> {
        let q = |level| quantile_sorted(sorted, level);
        Some(Self {
            p2_5: q(0.025)?,
            p5: q(0.05)?,
            p10: q(0.10)?,
            p25: q(0.25)?,
            p50: q(0.50)?,
            p75: q(0.75)?,
            p90: q(0.90)?,
            p95: q(0.95)?,
            p97_5: q(0.975)?,
        })
    }

    /// `(level, value)` pairs in ascending level order.
    pub fn entries(&self) -> [(f64, f64); 9] {
        let values = [
            self.p2_5, self.p5, self.p10, self.p25, self.p50, self.p75, self.p90, self.p95, self.p97_5,
        ];
        let mut out = [(0.0, 0.0); 9];
        for (slot, (level, value)) in out.iter_mut().zip(PERCENTILE_LEVELS.iter().zip(values)) {
            *slot = (*level, value);
        }
        out
    }
}

// ─── Summary ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SummaryStatistics {
    pub simulation_name: String,
    pub n_trials: usize,
    pub cases_prevented_percentiles: Percentiles,
    pub mean_cases_prevented: f64,
    pub mean_effect_size: f64,
    pub min_effect_size: f64,
    pub max_effect_size: f64,
    pub cases_prevented: Stats,
    pub effect_size: Stats,
    pub total_adverse_events: Stats,
    pub n_uptake: Stats,
}

impl SummaryStatistics {
    pub fn median_cases_prevented(&self) -> f64 {
        self.cases_prevented_percentiles.p50
    }

    /// The 2.5th–97.5th percentile interval of cases prevented.
    pub fn interval_95(&self) -> (f64, f64) {
        (self.cases_prevented_percentiles.p2_5, self.cases_prevented_percentiles.p97_5)
    }
}

/// Reduce a completed simulation to its summary. Pure; no randomness.
pub fn summarize(output: &SimulationOutput) -> Result<SummaryStatistics, SimError> {
    let cases: Vec<f64> = output.cases_prevented().collect();
    let mut sorted = cases.clone();
    sorted.sort_by(f64::total_cmp);
    let percentiles = Percentiles::from_sorted(&sorted)
        .ok_or_else(|| SimError::EmptySimulation(output.name().to_string()))?;

    let effects: Vec<f64> = output.effect_sizes().collect();
    let totals: Vec<f64> = output.trials.iter().map(|t| t.total_adverse_events as f64).collect();
    let uptake: Vec<f64> = output.trials.iter().map(|t| t.n_uptake as f64).collect();

    let cases_prevented = Stats::from_samples(&cases);
    let effect_size = Stats::from_samples(&effects);

    Ok(SummaryStatistics {
        simulation_name: output.name().to_string(),
        n_trials: output.len(),
        cases_prevented_percentiles: percentiles,
        mean_cases_prevented: cases_prevented.mean,
        mean_effect_size: effect_size.mean,
        min_effect_size: effect_size.min,
        max_effect_size: effect_size.max,
        cases_prevented,
        effect_size,
        total_adverse_events: Stats::from_samples(&totals),
        n_uptake: Stats::from_samples(&uptake),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
