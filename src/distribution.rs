// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Intervention Impact Engine - Distribution Parameterizer

//! Converts target probabilities into samplers.
//!
//! Every uncertain probability is drawn from `Beta(a, b)` with
//! `a = concentration` and `b = concentration * (1 - p) / p`, so the mean is
//! exactly `p` and the spread is governed by `concentration` alone.

use rand::Rng;
use rand_distr::{Beta, Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::types::{check_target_probability, SimulationConfig};

// ─── Beta Shape ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaShape {
    pub a: f64,
    pub b: f64,
}

impl BetaShape {
    pub fn mean(&self) -> f64 {
        self.a / (self.a + self.b)
    }

    pub fn variance(&self) -> f64 {
        let sum = self.a + self.b;
        (self.a * self.b) / (sum * sum * (sum + 1.0))
    }
}

/// Derive `Beta(a, b)` shape parameters whose mean is `target_probability`.
///
/// `target_probability == 1.0` gives `b == 0`, which is not a valid Beta;
/// [`ProbabilitySampler::from_shape`] turns that into the constant 1.0.
pub fn derive_beta_shape(concentration: f64, target_probability: f64) -> Result<BetaShape, SimError> {
    if !(concentration.is_finite() && concentration > 0.0) {
        return Err(SimError::invalid(
            "concentration",
            concentration,
            "must be a positive finite number",
        ));
    }
    check_target_probability("target_probability", target_probability)?;

    let a = concentration;
    let b = concentration * (1.0 - target_probability) / target_probability;
    if !b.is_finite() {
        return Err(SimError::domain(
            "beta",
            format!("shape b is {b} for target {target_probability}"),
        ));
    }
    Ok(BetaShape { a, b })
}

// ─── Probability Sampler ────────────────────────────────────────────────────

/// Sampler for an uncertain probability.
#[derive(Debug, Clone)]
pub enum ProbabilitySampler {
    Beta(Beta<f64>),
    /// Degenerate case for a target of exactly 1.
    Constant(f64),
}

impl ProbabilitySampler {
    pub fn from_shape(shape: BetaShape) -> Result<Self, SimError> {
        if shape.b == 0.0 {
            return Ok(Self::Constant(1.0));
        }
        Beta::new(shape.a, shape.b)
            .map(Self::Beta)
            .map_err(|e| SimError::domain("beta", format!("Beta({}, {}): {e}", shape.a, shape.b)))
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Self::Beta(beta) => beta.sample(rng),
            Self::Constant(p) => *p,
        }
    }
}

// ─── Trial Distributions ────────────────────────────────────────────────────

/// Everything a trial draws from, built once per run.
#[derive(Debug, Clone)]
pub struct TrialDistributions {
    pub reached: ProbabilitySampler,
    pub uptake: ProbabilitySampler,
    pub adverse_event: ProbabilitySampler,
    pub effect_size: Uniform<f64>,
    pub shapes: ShapeSet,
}

/// The three derived shape pairs, kept for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeSet {
    pub reached: BetaShape,
    pub uptake: BetaShape,
    pub adverse_event: BetaShape,
}

impl TrialDistributions {
    /// Build samplers for a config. The config must already be validated;
    /// bad fields are still reported rather than handed to a sampler.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, SimError> {
        let c = config.concentration;
        let shapes = ShapeSet {
            reached: derive_beta_shape(c, config.target_p_reached)
                .map_err(|e| rename_field(e, "target_p_reached"))?,
            uptake: derive_beta_shape(c, config.target_p_uptake)
                .map_err(|e| rename_field(e, "target_p_uptake"))?,
            adverse_event: derive_beta_shape(c, config.target_p_adverse_event)
                .map_err(|e| rename_field(e, "target_p_adverse_event"))?,
        };

        let (lo, hi) = (config.effect_size_min, config.effect_size_max);
        if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
            return Err(SimError::domain(
                "uniform",
                format!("effect size bounds [{lo}, {hi}]"),
            ));
        }

        Ok(Self {
            reached: ProbabilitySampler::from_shape(shapes.reached)?,
            uptake: ProbabilitySampler::from_shape(shapes.uptake)?,
            adverse_event: ProbabilitySampler::from_shape(shapes.adverse_event)?,
            effect_size: Uniform::new_inclusive(lo, hi),
            shapes,
        })
    }
}

fn rename_field(err: SimError, to: &'static str) -> SimError {
    match err {
        SimError::InvalidParameter { field: "target_probability", value, reason } => {
            SimError::InvalidParameter { field: to, value, reason }
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
