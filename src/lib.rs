// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Intervention Impact Engine

//! Monte Carlo estimation of the population impact of a maternal-health
//! intervention.
//!
//! ```no_run
//! use impact_engine::{reference_scenarios, summarize, Simulator};
//!
//! let scenario = &reference_scenarios()[0];
//! let output = Simulator::in_memory(42).run_simulation(&scenario.config)?;
//! let summary = summarize(&output)?;
//! println!("median cases prevented: {:.0}", summary.median_cases_prevented());
//! # Ok::<(), impact_engine::SimError>(())
//! ```

pub mod cache;
pub mod distribution;
pub mod error;
pub mod scenario;
pub mod simulation;
pub mod summary;
pub mod trials;
pub mod types;

pub use cache::{name_stem, CacheKey, CacheKeyPolicy, FileStore, MemoryStore, SimulationStore};
pub use distribution::{derive_beta_shape, BetaShape, TrialDistributions};
pub use error::{CacheError, ScenarioError, SimError};
pub use scenario::{load_scenarios, reference_scenarios, Scenario};
pub use simulation::{OutputSource, Simulator};
pub use summary::{summarize, Stats, SummaryStatistics};
pub use trials::{generate_trials, Execution, MonteCarloGenerator, TrialGenerator};
pub use types::*;

// ─── WASM Interface ──────────────────────────────────────────────────────────

#[cfg(feature = "wasm")]
mod wasm {
    use wasm_bindgen::prelude::*;

    use crate::{summarize, Execution, MemoryStore, MonteCarloGenerator, SimulationConfig, Simulator};

    fn simulate(config: JsValue, seed: u64) -> Result<crate::SimulationOutput, JsValue> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        let config: SimulationConfig = serde_wasm_bindgen::from_value(config)?;
        let generator = MonteCarloGenerator::new(seed).with_execution(Execution::Sequential);
        Simulator::new(MemoryStore::new(), generator)
            .with_cache(false)
            .run_simulation(&config)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Run one scenario and return its summary statistics.
    #[wasm_bindgen]
    pub fn run_scenario(config: JsValue, seed: u64) -> Result<JsValue, JsValue> {
        let output = simulate(config, seed)?;
        let summary = summarize(&output).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(serde_wasm_bindgen::to_value(&summary)?)
    }

    /// Run one scenario and return every trial record, for histograms.
    #[wasm_bindgen]
    pub fn run_scenario_trials(config: JsValue, seed: u64) -> Result<JsValue, JsValue> {
        let output = simulate(config, seed)?;
        Ok(serde_wasm_bindgen::to_value(&output)?)
    }
}
