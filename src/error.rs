// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Intervention Impact Engine - Error Types

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Simulation errors
// ---------------------------------------------------------------------------

/// Errors that abort a single scenario run.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A configuration value outside its domain. Raised before any draw.
    #[error("invalid parameter `{field}` = {value}: {reason}")]
    InvalidParameter {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// An internal distribution parameter that is non-finite or rejected
    /// by the sampler.
    #[error("{distribution} domain error: {detail}")]
    DistributionDomain {
        distribution: &'static str,
        detail: String,
    },

    #[error("simulation `{0}` has no trials to summarize")]
    EmptySimulation(String),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

impl SimError {
    pub(crate) fn invalid(
        field: &'static str,
        value: impl ToString,
        reason: &'static str,
    ) -> Self {
        Self::InvalidParameter {
            field,
            value: value.to_string(),
            reason,
        }
    }

    pub(crate) fn domain(distribution: &'static str, detail: impl Into<String>) -> Self {
        Self::DistributionDomain {
            distribution,
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Cache errors
// ---------------------------------------------------------------------------

/// Persistence failures. The orchestrator recovers from all of these.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode cache entry {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("corrupt cache entry at {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Scenario file errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("failed to read scenario file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("scenario `{0}` is defined more than once")]
    DuplicateName(String),

    #[error("scenario `{name}` must give exactly one of `population_size` or `population_by_region`")]
    AmbiguousPopulation { name: String },

    #[error("population of scenario `{name}` overflows when summing region `{region}`")]
    PopulationOverflow { name: String, region: String },
}
