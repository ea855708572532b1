// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Intervention Impact Engine - Simulation Cache

//! Key-value persistence for completed simulation outputs.
//!
//! The default key is `(simulation_name, n_trials)`. Two configs that share
//! both but differ elsewhere map to the same entry, and a hit is returned
//! without comparing the rest of the config. [`CacheKeyPolicy::FullConfig`]
//! opts into a key that also covers every other field.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CacheError;
use crate::types::{SimulationConfig, SimulationOutput};

// ─── Cache Key ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheKeyPolicy {
    /// Name and trial count only.
    #[default]
    NameAndTrials,
    /// Name, trial count, and a digest of the full config.
    FullConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub simulation_name: String,
    pub n_trials: u64,
    pub config_digest: Option<String>,
}

impl CacheKey {
    pub fn for_config(config: &SimulationConfig, policy: CacheKeyPolicy) -> Self {
        let config_digest = match policy {
            CacheKeyPolicy::NameAndTrials => None,
            CacheKeyPolicy::FullConfig => Some(config_digest(config)),
        };
        Self {
            simulation_name: config.simulation_name.clone(),
            n_trials: config.n_trials,
            config_digest,
        }
    }

    /// Filesystem-safe stem, distinct for distinct keys.
    pub fn file_stem(&self) -> String {
        let name = name_stem(&self.simulation_name);
        match &self.config_digest {
            Some(digest) => format!("{name}_{}_{}", self.n_trials, &digest[..16]),
            None => format!("{name}_{}", self.n_trials),
        }
    }
}

/// Filesystem-safe form of a simulation name: characters outside
/// `[A-Za-z0-9_-]` become `_`, followed by the first 12 hex digits of the
/// raw name's SHA-256 so names that sanitize alike stay apart.
pub fn name_stem(name: &str) -> String {
    let readable: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    format!("{readable}-{}", &digest[..12])
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.simulation_name, self.n_trials)?;
        if let Some(digest) = &self.config_digest {
            write!(f, "@{}", &digest[..16])?;
        }
        Ok(())
    }
}

/// SHA-256 over every config field in declaration order, hex-encoded.
/// Floats contribute their bit patterns; the name is length-prefixed.
pub fn config_digest(config: &SimulationConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.population_size.to_le_bytes());
    hasher.update(config.n_trials.to_le_bytes());
    for value in [
        config.concentration,
        config.target_p_reached,
        config.target_p_uptake,
        config.target_p_adverse_event,
        config.effect_size_min,
        config.effect_size_max,
    ] {
        hasher.update(value.to_bits().to_le_bytes());
    }
    hasher.update((config.simulation_name.len() as u64).to_le_bytes());
    hasher.update(config.simulation_name.as_bytes());
    hex::encode(hasher.finalize())
}

// ─── Store Seam ─────────────────────────────────────────────────────────────

/// Persistence backend for simulation outputs.
pub trait SimulationStore {
    /// `Ok(None)` for a clean miss; `Err` for an entry that exists but
    /// cannot be read.
    fn get(&self, key: &CacheKey) -> Result<Option<SimulationOutput>, CacheError>;

    fn put(&mut self, key: &CacheKey, output: &SimulationOutput) -> Result<(), CacheError>;
}

impl<S: SimulationStore + ?Sized> SimulationStore for Box<S> {
    fn get(&self, key: &CacheKey) -> Result<Option<SimulationOutput>, CacheError> {
        (**self).get(key)
    }

    fn put(&mut self, key: &CacheKey, output: &SimulationOutput) -> Result<(), CacheError> {
        (**self).put(key, output)
    }
}

// ─── In-Memory Store ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<CacheKey, SimulationOutput>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SimulationStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Result<Option<SimulationOutput>, CacheError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &CacheKey, output: &SimulationOutput) -> Result<(), CacheError> {
        self.entries.insert(key.clone(), output.clone());
        Ok(())
    }
}

// ─── File Store ─────────────────────────────────────────────────────────────

/// One JSON file per key under `dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    /// Remove the entry for `key`, if any.
    pub fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }
}

impl SimulationStore for FileStore {
    fn get(&self, key: &CacheKey) -> Result<Option<SimulationOutput>, CacheError> {
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|source| CacheError::Deserialize { path, source })
    }

    fn put(&mut self, key: &CacheKey, output: &SimulationOutput) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        // Write beside the target, then rename, so readers never see a
        // partial entry.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let io_err = |source: std::io::Error| CacheError::Io { path: tmp.clone(), source };

        let file = File::create(&tmp).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, output).map_err(|source| CacheError::Serialize {
            key: key.to_string(),
            source,
        })?;
        writer.flush().map_err(io_err)?;
        drop(writer);

        fs::rename(&tmp, &path).map_err(|source| CacheError::Io { path, source })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::reference_config;
    use crate::types::TrialRecord;

    fn output() -> SimulationOutput {
        let record = TrialRecord {
            p_reached: 0.14,
            n_reached: 59_000,
            p_uptake: 0.76,
            n_uptake: 44_800,
            p_adverse_event: 0.061,
            n_no_intervention: 377_926,
            adverse_events_no_intervention: 23_050,
            effect_size: 0.17,
            adjusted_adverse_event_rate: 0.05063,
            adverse_events_with_intervention: 2_270,
            total_adverse_events: 25_320,
            cases_prevented: 462.8,
        };
        SimulationOutput::new(reference_config(), vec![record; 3])
    }

    #[test]
    fn weak_key_ignores_other_fields() {
        let a = reference_config();
        let mut b = reference_config();
        b.target_p_uptake = 0.5;
        assert_eq!(
            CacheKey::for_config(&a, CacheKeyPolicy::NameAndTrials),
            CacheKey::for_config(&b, CacheKeyPolicy::NameAndTrials)
        );
        assert_ne!(
            CacheKey::for_config(&a, CacheKeyPolicy::FullConfig),
            CacheKey::for_config(&b, CacheKeyPolicy::FullConfig)
        );
    }

    #[test]
    fn key_includes_trial_count() {
        let a = reference_config();
        let mut b = reference_config();
        b.n_trials += 1;
        assert_ne!(
            CacheKey::for_config(&a, CacheKeyPolicy::NameAndTrials),
            CacheKey::for_config(&b, CacheKeyPolicy::NameAndTrials)
        );
    }

    #[test]
    fn file_stem_is_sanitized() {
        let mut cfg = reference_config();
        cfg.simulation_name = "../iron/folate (ANC)".to_string();
        let key = CacheKey::for_config(&cfg, CacheKeyPolicy::NameAndTrials);
        let stem = key.file_stem();
        assert!(stem.starts_with("___iron_folate__ANC_-"), "got: {stem}");
        assert!(stem.ends_with("_1000"));
        assert!(stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn names_that_sanitize_alike_get_distinct_files() {
        let mut a = reference_config();
        a.simulation_name = "iron/folate".to_string();
        let mut b = reference_config();
        b.simulation_name = "iron_folate".to_string();

        let store = FileStore::new("cache");
        let ka = CacheKey::for_config(&a, CacheKeyPolicy::NameAndTrials);
        let kb = CacheKey::for_config(&b, CacheKeyPolicy::NameAndTrials);
        assert_ne!(store.path_for(&ka), store.path_for(&kb));
        assert_ne!(name_stem("iron/folate"), name_stem("iron_folate"));
    }

    #[test]
    fn digest_is_stable_and_hex() {
        let cfg = reference_config();
        let d1 = config_digest(&cfg);
        let d2 = config_digest(&cfg.clone());
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64);
        assert!(d1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_covers_every_field() {
        let base = config_digest(&reference_config());
        let variants: [fn(&mut SimulationConfig); 9] = [
            |c| c.population_size += 1,
            |c| c.n_trials += 1,
            |c| c.concentration = 41.0,
            |c| c.target_p_reached = 0.15,
            |c| c.target_p_uptake = 0.7,
            |c| c.target_p_adverse_event = 0.05,
            |c| c.effect_size_min = 0.11,
            |c| c.effect_size_max = 0.25,
            |c| c.simulation_name.push('x'),
        ];
        for (i, change) in variants.iter().enumerate() {
            let mut cfg = reference_config();
            change(&mut cfg);
            assert_ne!(config_digest(&cfg), base, "field change {i} left the digest unchanged");
        }
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new();
        let key = CacheKey::for_config(&reference_config(), CacheKeyPolicy::default());
        assert!(store.get(&key).expect("test: get").is_none());
        store.put(&key, &output()).expect("test: put");
        assert_eq!(store.get(&key).expect("test: get"), Some(output()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().expect("test: tempdir");
        let mut store = FileStore::new(dir.path().join("cache"));
        let key = CacheKey::for_config(&reference_config(), CacheKeyPolicy::default());

        assert!(store.get(&key).expect("test: clean miss").is_none());
        store.put(&key, &output()).expect("test: put");
        assert!(store.path_for(&key).exists());
        assert!(!store.path_for(&key).with_extension("json.tmp").exists());
        assert_eq!(store.get(&key).expect("test: hit"), Some(output()));

        assert!(store.remove(&key).expect("test: remove"));
        assert!(!store.remove(&key).expect("test: remove again"));
    }

    #[test]
    fn file_store_returns_generated_records_bit_for_bit() {
        let cfg = reference_config();
        let d = crate::distribution::TrialDistributions::from_config(&cfg).expect("test: distributions");
        let trials = crate::trials::generate_trials(&cfg, &d, 17).expect("test: generate");
        let generated = SimulationOutput::new(cfg.clone(), trials);

        let dir = tempfile::tempdir().expect("test: tempdir");
        let mut store = FileStore::new(dir.path());
        let key = CacheKey::for_config(&cfg, CacheKeyPolicy::default());
        store.put(&key, &generated).expect("test: put");
        let loaded = store.get(&key).expect("test: get").expect("test: hit");

        for (i, (a, b)) in generated.trials.iter().zip(&loaded.trials).enumerate() {
            assert_eq!(a.p_reached.to_bits(), b.p_reached.to_bits(), "trial {}", i + 1);
            assert_eq!(a.effect_size.to_bits(), b.effect_size.to_bits(), "trial {}", i + 1);
            assert_eq!(a.cases_prevented.to_bits(), b.cases_prevented.to_bits(), "trial {}", i + 1);
        }
        assert_eq!(loaded, generated);
    }

    #[test]
    fn file_store_reports_corrupt_entry() {
        let dir = tempfile::tempdir().expect("test: tempdir");
        let store = FileStore::new(dir.path());
        let key = CacheKey::for_config(&reference_config(), CacheKeyPolicy::default());
        fs::write(store.path_for(&key), b"{ not json").expect("test: write");
        let err = store.get(&key).expect_err("test: corrupt entry");
        assert!(matches!(err, CacheError::Deserialize { .. }), "got: {err}");
    }
}
