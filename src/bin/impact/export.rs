// Per-Trial JSONL Export
// One JSON line per trial for histogram / density plotting outside the engine

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use impact_engine::{name_stem, SimulationOutput, TrialRecord};

#[derive(Debug, Serialize)]
struct TrialLine<'a> {
    trial: usize,
    #[serde(flatten)]
    record: &'a TrialRecord,
}

/// Export location for a scenario, always directly under `output_dir/trials`.
pub fn trials_path(output_dir: &Path, simulation_name: &str) -> PathBuf {
    output_dir.join("trials").join(format!("{}.jsonl", name_stem(simulation_name)))
}

/// Write every trial of `output` to `path`, numbered from 1.
pub fn write_trials_jsonl(path: &Path, output: &SimulationOutput) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = BufWriter::new(std::fs::File::create(path)?);
    for (i, record) in output.trials.iter().enumerate() {
        let line = serde_json::to_string(&TrialLine { trial: i + 1, record })
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        writeln!(file, "{}", line)?;
    }
    file.flush()
}
