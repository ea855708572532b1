// Intervention Impact Runner: Monte Carlo estimates per scenario
// Seeded ChaCha8 streams, file-backed result cache, JSON report + optional JSONL trials
//
// Usage:
//   cargo run --release --bin impact                              # Built-in reference scenario
//   cargo run --release --bin impact -- -s scenarios.json         # Scenario file
//   cargo run --release --bin impact -- -s scenarios.json calcium # Filter by name/label
//   cargo run --release --bin impact -- --no-cache --seed 42      # Fresh run, custom seed
//   cargo run --release --bin impact -- --export-trials           # Per-trial JSONL output

mod export;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clap::Parser;
use impact_engine::{
    load_scenarios, reference_scenarios, summarize, CacheKeyPolicy, Execution, FileStore,
    MonteCarloGenerator, Scenario, SimError, Simulator,
};
use tracing_subscriber::EnvFilter;

use report::{RunReport, RunSummary, ScenarioReport};

// ─── CLI ────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "impact", version, about = "Monte Carlo impact estimates for maternal-health interventions")]
struct Cli {
    /// Scenario file (JSON). Without one, the built-in reference scenario runs.
    #[arg(long, short = 's', env = "IMPACT_SCENARIOS")]
    scenarios: Option<PathBuf>,

    /// Base seed for every scenario's random streams.
    #[arg(long, env = "IMPACT_SEED", default_value_t = 0)]
    seed: u64,

    /// Directory holding cached simulation outputs.
    #[arg(long, env = "IMPACT_CACHE_DIR", default_value = "impact-cache")]
    cache_dir: PathBuf,

    /// Ignore cached outputs (fresh results are still written).
    #[arg(long)]
    no_cache: bool,

    /// Key cache entries on the full config instead of name + trial count.
    #[arg(long)]
    full_config_key: bool,

    /// Generate trials on the current thread only.
    #[arg(long)]
    sequential: bool,

    /// Override every scenario's trial count.
    #[arg(long)]
    trials: Option<u64>,

    /// Write each scenario's trial table as JSONL under the output directory.
    #[arg(long)]
    export_trials: bool,

    /// Directory for the JSON report.
    #[arg(long, default_value = "impact-results")]
    output_dir: PathBuf,

    /// More log output (-v debug, -vv trace). IMPACT_LOG / RUST_LOG take precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only run scenarios whose name or label contains this text.
    filter: Option<String>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("IMPACT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(format!("impact_engine={level},impact={level}")));

    // stdout carries the result table; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn select_scenarios(cli: &Cli) -> Result<Vec<Scenario>, SimError> {
    let mut all = match &cli.scenarios {
        Some(path) => load_scenarios(path)?,
        None => reference_scenarios(),
    };
    if let Some(n) = cli.trials {
        for s in &mut all {
            s.config.n_trials = n;
        }
    }
    Ok(match &cli.filter {
        Some(f) => all.into_iter().filter(|s| s.matches(f)).collect(),
        None => all,
    })
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let to_run = match select_scenarios(&cli) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to load scenarios");
            return ExitCode::FAILURE;
        }
    };
    if to_run.is_empty() {
        tracing::error!(filter = ?cli.filter, "no scenarios match filter");
        return ExitCode::FAILURE;
    }

    let key_policy = if cli.full_config_key {
        CacheKeyPolicy::FullConfig
    } else {
        CacheKeyPolicy::NameAndTrials
    };
    let execution = if cli.sequential { Execution::Sequential } else { Execution::Parallel };
    let generator = MonteCarloGenerator::new(cli.seed).with_execution(execution);
    let mut simulator = Simulator::new(FileStore::new(cli.cache_dir.clone()), generator)
        .with_key_policy(key_policy)
        .with_cache(!cli.no_cache);

    println!("\n  Intervention Impact Engine v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "  PRNG: ChaCha8Rng | Seed: {} | Cache: {} ({})",
        cli.seed,
        cli.cache_dir.display(),
        if cli.no_cache { "refresh" } else { "reuse" },
    );
    println!("  Running {} scenario(s)...\n", to_run.len());
    println!(
        "  {:<36} {:>8} {:>10} {:>10} {:>10} {:>10} {:>7} {:>9} {:>8}",
        "Scenario", "Trials", "Median", "P2.5", "P97.5", "Mean", "Effect", "Source", "Time"
    );
    println!("  {}", "-".repeat(116));

    let suite_start = Instant::now();
    let mut reports = Vec::with_capacity(to_run.len());
    let mut failed = 0usize;

    for scenario in &to_run {
        let start = Instant::now();
        let result = simulator
            .run_with_source(&scenario.config)
            .and_then(|(output, source)| summarize(&output).map(|s| (output, source, s)));
        let elapsed_ms = start.elapsed().as_millis();

        let (output, source, summary) = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(scenario = scenario.name(), error = %e, "scenario failed");
                println!("  {:<36} FAILED: {}", scenario.label, e);
                failed += 1;
                continue;
            }
        };

        let (p2_5, p97_5) = summary.interval_95();
        println!(
            "  {:<36} {:>8} {:>10.1} {:>10.1} {:>10.1} {:>10.1} {:>6.1}% {:>9} {:>6}ms",
            scenario.label,
            summary.n_trials,
            summary.median_cases_prevented(),
            p2_5,
            p97_5,
            summary.mean_cases_prevented,
            summary.mean_effect_size * 100.0,
            format!("{source:?}").to_lowercase(),
            elapsed_ms,
        );

        if cli.export_trials {
            let path = export::trials_path(&cli.output_dir, scenario.name());
            if let Err(e) = export::write_trials_jsonl(&path, &output) {
                tracing::warn!(path = %path.display(), error = %e, "failed to write trial export");
            }
        }

        reports.push(ScenarioReport {
            simulation_name: scenario.name().to_string(),
            label: scenario.label.clone(),
            source,
            elapsed_ms,
            config: output.config.clone(),
            summary,
        });
    }

    let suite_elapsed = suite_start.elapsed();
    let total = to_run.len();

    println!("  {}", "-".repeat(116));
    println!(
        "  Total: {}  Completed: {}  Failed: {}  Suite time: {:.1}s\n",
        total,
        total - failed,
        failed,
        suite_elapsed.as_secs_f64()
    );

    // ─── Write JSON Report ──────────────────────────────────────────────

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string();

    let run_report = RunReport {
        timestamp: timestamp.clone(),
        version: env!("CARGO_PKG_VERSION"),
        prng: "ChaCha8Rng",
        seed: cli.seed,
        key_policy,
        summary: RunSummary { total, completed: total - failed, failed },
        scenarios: reports,
    };

    let path = cli.output_dir.join(format!("impact-{timestamp}.json"));
    match report::write_report(&path, &run_report) {
        Ok(()) => println!("  Results saved to: {}\n", path.display()),
        Err(e) => tracing::error!(path = %path.display(), error = %e, "failed to write report"),
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
