use crate::workorder::filename::IdMode;
use crate::workorder::paths::resolve_home;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_SCAN_CONCURRENCY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub concurrency: usize,
    pub max_file_bytes: u64,
    pub progress_every: usize,
    pub id_mode: IdMode,
    pub extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 16,
            max_file_bytes: 10 * 1024 * 1024,
            progress_every: 50,
            id_mode: IdMode::Anchored,
            extensions: vec!["docx".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Saving an empty record list over more than this many records is refused.
    pub wipe_threshold: usize,
    /// `ultimo_numero` of a store that does not exist yet.
    pub seed_last_number: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            wipe_threshold: 10,
            seed_last_number: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OsrecConfig {
    pub scan: ScanConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialOsrecConfig {
    scan: Option<ScanConfig>,
    store: Option<StoreConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_id_mode(var: &str, fallback: IdMode) -> Result<IdMode> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => {
            v.parse::<IdMode>().map_err(|err| anyhow!("{var}: {err}"))
        }
        _ => Ok(fallback),
    }
}

fn env_or_csv(var: &str, fallback: &[String]) -> Vec<String> {
    match env::var(var) {
        Ok(v) => {
            let out = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_start_matches('.').to_ascii_lowercase())
                .collect::<Vec<_>>();
            if out.is_empty() {
                fallback.to_vec()
            } else {
                out
            }
        }
        Err(_) => fallback.to_vec(),
    }
}

fn validate(cfg: &OsrecConfig) -> Result<()> {
    if cfg.scan.concurrency == 0 || cfg.scan.concurrency > MAX_SCAN_CONCURRENCY {
        return Err(anyhow!(
            "invalid scan concurrency: require 1 <= concurrency <= {MAX_SCAN_CONCURRENCY}"
        ));
    }
    if cfg.scan.max_file_bytes == 0 {
        return Err(anyhow!("invalid scan max file bytes: must be >= 1"));
    }
    if cfg.scan.progress_every == 0 {
        return Err(anyhow!("invalid scan progress interval: must be >= 1"));
    }
    if cfg.scan.extensions.iter().all(|e| e.trim().is_empty()) {
        return Err(anyhow!("invalid scan extensions: list cannot be empty"));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("OSREC_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = resolve_home().ok()?;
    Some(home.join("osrec.toml"))
}

fn merge_file_config(base: &mut OsrecConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: PartialOsrecConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse osrec config {}: {err}", path.display()))?;
    if let Some(scan) = parsed.scan {
        base.scan = scan;
    }
    if let Some(store) = parsed.store {
        base.store = store;
    }
    Ok(())
}

pub fn load_config() -> Result<OsrecConfig> {
    let mut cfg = OsrecConfig::default();
    if let Some(path) = resolve_config_path() {
        merge_file_config(&mut cfg, &path)?;
    }

    cfg.scan.concurrency = env_or_usize("OSREC_SCAN_CONCURRENCY", cfg.scan.concurrency);
    cfg.scan.max_file_bytes = env_or_u64("OSREC_MAX_FILE_BYTES", cfg.scan.max_file_bytes);
    cfg.scan.progress_every = env_or_usize("OSREC_PROGRESS_EVERY", cfg.scan.progress_every);
    cfg.scan.id_mode = env_or_id_mode("OSREC_ID_MODE", cfg.scan.id_mode)?;
    cfg.scan.extensions = env_or_csv("OSREC_EXTENSIONS", &cfg.scan.extensions);
    cfg.store.wipe_threshold = env_or_usize("OSREC_WIPE_THRESHOLD", cfg.store.wipe_threshold);
    cfg.store.seed_last_number =
        env_or_u32("OSREC_SEED_LAST_NUMBER", cfg.store.seed_last_number);

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        let cfg = OsrecConfig::default();
        assert!(validate(&cfg).is_ok());
        assert_eq!(cfg.scan.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.store.wipe_threshold, 10);
    }

    #[test]
    fn validate_rejects_out_of_range_concurrency() {
        let mut cfg = OsrecConfig::default();
        cfg.scan.concurrency = 0;
        assert!(validate(&cfg).is_err());
        cfg.scan.concurrency = MAX_SCAN_CONCURRENCY + 1;
        assert!(validate(&cfg).is_err());
        cfg.scan.concurrency = 10;
        cfg.scan.extensions = vec![" ".to_string()];
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn file_sections_replace_defaults() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("osrec.toml");
        fs::write(
            &path,
            "[scan]\nconcurrency = 4\nid_mode = \"loose\"\n\n[store]\nseed_last_number = 3825\n",
        )
        .expect("write config");

        let mut cfg = OsrecConfig::default();
        merge_file_config(&mut cfg, &path).expect("merge");
        assert_eq!(cfg.scan.concurrency, 4);
        assert_eq!(cfg.scan.id_mode, IdMode::Loose);
        assert_eq!(cfg.scan.progress_every, 50);
        assert_eq!(cfg.store.seed_last_number, 3825);
        assert_eq!(cfg.store.wipe_threshold, 10);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("osrec.toml");
        fs::write(&path, "[scan\nconcurrency = ").expect("write config");
        let mut cfg = OsrecConfig::default();
        assert!(merge_file_config(&mut cfg, &path).is_err());
    }
}
