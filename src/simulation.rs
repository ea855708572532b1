// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Intervention Impact Engine - Simulation Orchestrator

use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, CacheKeyPolicy, MemoryStore, SimulationStore};
use crate::distribution::TrialDistributions;
use crate::error::SimError;
use crate::trials::{MonteCarloGenerator, TrialGenerator};
use crate::types::{SimulationConfig, SimulationOutput};

/// Where a returned output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputSource {
    Cache,
    Generated,
}

// ─── Simulator ──────────────────────────────────────────────────────────────

/// Entry point for running scenarios: validation, distribution setup, and
/// cache lookup around a [`TrialGenerator`].
pub struct Simulator<S = MemoryStore, G = MonteCarloGenerator> {
    store: S,
    generator: G,
    key_policy: CacheKeyPolicy,
    use_cache: bool,
}

impl Simulator {
    /// Uncached simulator with an in-memory store, mostly for one-off runs.
    pub fn in_memory(seed: u64) -> Self {
        Simulator::new(MemoryStore::new(), MonteCarloGenerator::new(seed)).with_cache(false)
    }
}

impl<S: SimulationStore, G: TrialGenerator> Simulator<S, G> {
    pub fn new(store: S, generator: G) -> Self {
        Self {
            store,
            generator,
            key_policy: CacheKeyPolicy::default(),
            use_cache: true,
        }
    }

    pub fn with_key_policy(mut self, policy: CacheKeyPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    /// Whether cached entries may be returned. Fresh results are written
    /// to the store either way.
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Validate `config`, derive its distributions, then load or compute.
    pub fn run_simulation(&mut self, config: &SimulationConfig) -> Result<SimulationOutput, SimError> {
        self.run_with_source(config).map(|(output, _)| output)
    }

    /// Like [`run_simulation`](Self::run_simulation), also reporting
    /// whether the output was served from the store.
    pub fn run_with_source(
        &mut self,
        config: &SimulationConfig,
    ) -> Result<(SimulationOutput, OutputSource), SimError> {
        config.validate()?;
        let distributions = TrialDistributions::from_config(config)?;
        tracing::debug!(
            simulation = %config.simulation_name,
            reached = ?distributions.shapes.reached,
            uptake = ?distributions.shapes.uptake,
            adverse_event = ?distributions.shapes.adverse_event,
            "derived beta shapes"
        );
        self.load_or_compute(config, &distributions, self.use_cache)
    }

    /// Return the stored output for this config's key when `use_cache` is set
    /// and an entry exists; otherwise generate, store, and return.
    ///
    /// An unreadable entry falls back to generation. A failed write is
    /// logged and the fresh output is still returned.
    pub fn load_or_compute(
        &mut self,
        config: &SimulationConfig,
        distributions: &TrialDistributions,
        use_cache: bool,
    ) -> Result<(SimulationOutput, OutputSource), SimError> {
        let key = CacheKey::for_config(config, self.key_policy);

        if use_cache {
            match self.store.get(&key) {
                Ok(Some(cached)) => {
                    if cached.config != *config {
                        tracing::warn!(
                            key = %key,
                            "cached output was produced from a different config; returning it unchanged"
                        );
                    }
                    tracing::info!(key = %key, n_trials = cached.len(), "cache hit");
                    return Ok((cached, OutputSource::Cache));
                }
                Ok(None) => tracing::debug!(key = %key, "cache miss"),
                Err(e) => tracing::warn!(key = %key, error = %e, "unreadable cache entry, recomputing"),
            }
        }

        let trials = self.generator.generate(config, distributions)?;
        let output = SimulationOutput::new(config.clone(), trials);

        if let Err(e) = self.store.put(&key, &output) {
            tracing::warn!(key = %key, error = %e, "failed to write cache entry");
        }
        Ok((output, OutputSource::Generated))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::types::tests::reference_config;
    use crate::types::TrialRecord;
    use std::cell::Cell;
    use std::path::PathBuf;

    /// Counts calls and delegates to a real generator.
    struct CountingGenerator {
        inner: MonteCarloGenerator,
        calls: Cell<u32>,
    }

    impl CountingGenerator {
        fn new(seed: u64) -> Self {
            Self { inner: MonteCarloGenerator::new(seed), calls: Cell::new(0) }
        }
    }

    impl TrialGenerator for CountingGenerator {
        fn generate(
            &self,
            config: &SimulationConfig,
            distributions: &TrialDistributions,
        ) -> Result<Vec<TrialRecord>, SimError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.generate(config, distributions)
        }
    }

    /// Every read is corrupt, every write fails.
    struct BrokenStore;

    impl SimulationStore for BrokenStore {
        fn get(&self, _key: &CacheKey) -> Result<Option<SimulationOutput>, CacheError> {
            Err(CacheError::Io {
                path: PathBuf::from("broken"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "read failed"),
            })
        }

        fn put(&mut self, _key: &CacheKey, _output: &SimulationOutput) -> Result<(), CacheError> {
            Err(CacheError::Io {
                path: PathBuf::from("broken"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "write failed"),
            })
        }
    }

    #[test]
    fn second_run_is_served_from_cache() {
        let mut sim = Simulator::new(MemoryStore::new(), CountingGenerator::new(1));
        let cfg = reference_config();

        let (first, src1) = sim.run_with_source(&cfg).expect("test: first run");
        let (second, src2) = sim.run_with_source(&cfg).expect("test: second run");

        assert_eq!(src1, OutputSource::Generated);
        assert_eq!(src2, OutputSource::Cache);
        assert_eq!(first, second);
        assert_eq!(sim.generator().calls.get(), 1);
    }

    #[test]
    fn disabled_cache_regenerates_and_still_writes() {
        let mut sim = Simulator::new(MemoryStore::new(), CountingGenerator::new(1)).with_cache(false);
        let cfg = reference_config();
        sim.run_simulation(&cfg).expect("test: run");
        sim.run_simulation(&cfg).expect("test: run");
        assert_eq!(sim.generator().calls.get(), 2);
        assert_eq!(sim.store().len(), 1);
    }

    #[test]
    fn weak_key_returns_stale_output_for_changed_config() {
        let mut sim = Simulator::new(MemoryStore::new(), CountingGenerator::new(1));
        let cfg = reference_config();
        let first = sim.run_simulation(&cfg).expect("test: run");

        let mut changed = cfg.clone();
        changed.target_p_uptake = 0.3;
        let second = sim.run_simulation(&changed).expect("test: run");

        assert_eq!(second, first);
        assert_eq!(second.config.target_p_uptake, 0.75);
        assert_eq!(sim.generator().calls.get(), 1);
    }

    #[test]
    fn full_config_key_separates_changed_config() {
        let mut sim = Simulator::new(MemoryStore::new(), CountingGenerator::new(1))
            .with_key_policy(CacheKeyPolicy::FullConfig);
        let cfg = reference_config();
        sim.run_simulation(&cfg).expect("test: run");

        let mut changed = cfg.clone();
        changed.target_p_uptake = 0.3;
        let second = sim.run_simulation(&changed).expect("test: run");

        assert_eq!(second.config, changed);
        assert_eq!(sim.generator().calls.get(), 2);
    }

    #[test]
    fn broken_store_degrades_to_fresh_result() {
        let mut sim = Simulator::new(BrokenStore, CountingGenerator::new(1));
        let cfg = reference_config();
        let (output, source) = sim.run_with_source(&cfg).expect("test: run despite cache");
        assert_eq!(source, OutputSource::Generated);
        assert_eq!(output.len() as u64, cfg.n_trials);
    }

    #[test]
    fn invalid_config_fails_before_generation() {
        let mut sim = Simulator::new(MemoryStore::new(), CountingGenerator::new(1));
        let mut cfg = reference_config();
        cfg.target_p_adverse_event = 0.0;
        let err = sim.run_simulation(&cfg).expect_err("test: invalid config");
        assert!(matches!(err, SimError::InvalidParameter { field: "target_p_adverse_event", .. }));
        assert_eq!(sim.generator().calls.get(), 0);
        assert!(sim.store().is_empty());
    }

    #[test]
    fn output_carries_its_config() {
        let mut sim = Simulator::in_memory(3);
        let cfg = reference_config();
        let output = sim.run_simulation(&cfg).expect("test: run");
        assert_eq!(output.config, cfg);
        assert_eq!(output.name(), "reference");
    }
}
