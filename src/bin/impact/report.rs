// Impact Report Types
// Structured output for the downstream table and chart renderers

use std::path::Path;

use serde::Serialize;

use impact_engine::{CacheKeyPolicy, OutputSource, SimulationConfig, SummaryStatistics};

// ─── Per-Scenario Result ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub simulation_name: String,
    pub label: String,
    pub source: OutputSource,
    pub elapsed_ms: u128,
    pub config: SimulationConfig,
    pub summary: SummaryStatistics,
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub seed: u64,
    pub key_policy: CacheKeyPolicy,
    pub summary: RunSummary,
    pub scenarios: Vec<ScenarioReport>,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

pub fn write_report(path: &Path, report: &RunReport) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    std::fs::write(path, json)
}
