use anyhow::Result;
use std::env;

use crate::commands::{CommandReport, guard_for};
use crate::workorder::config::load_config;
use crate::workorder::model::{Store, parse_price};
use crate::workorder::paths::resolve_paths;
use crate::workorder::persist::LoadState;

include!(concat!(env!("OUT_DIR"), "/osrec_env_allowlist.rs"));

pub fn env_overrides_set() -> Vec<&'static str> {
    GENERATED_OSREC_ENV_ALLOWLIST
        .iter()
        .copied()
        .filter(|key| env::var_os(key).is_some_and(|v| !v.is_empty()))
        .collect()
}

pub fn price_total(store: &Store) -> f64 {
    store.records.iter().map(|r| parse_price(&r.price)).sum()
}

pub fn store_summary(report: &mut CommandReport, store: &Store) {
    report.detail(format!("records={}", store.records.len()));
    report.detail(format!("last_number={}", store.last_number));
    report.detail(format!("next_id={}", store.next_id()));
    report.detail(format!("delivered={}", store.delivered_count()));
    report.detail(format!("price_total={:.2}", price_total(store)));
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("build={}", env!("BUILD_ID")));
    report.detail(format!("home={}", paths.home.display()));
    report.detail(format!("db_path={}", paths.db_path.display()));
    report.detail(format!("output_dir={}", paths.output_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!(
        "scan: concurrency={} id_mode={} max_file_bytes={}",
        cfg.scan.concurrency, cfg.scan.id_mode, cfg.scan.max_file_bytes
    ));

    if !paths.output_dir.exists() {
        report.issue(format!(
            "missing output dir ({})",
            paths.output_dir.display()
        ));
    }

    match guard_for(&paths, &cfg).inspect() {
        LoadState::Missing => {
            report.detail("store=missing");
            store_summary(&mut report, &Store::empty(cfg.store.seed_last_number));
        }
        LoadState::Unreadable(reason) => {
            report.issue(format!("store unreadable: {reason}"));
        }
        LoadState::Loaded(store) => {
            report.detail("store=loaded");
            store_summary(&mut report, &store);
        }
    }

    let overrides = env_overrides_set();
    if !overrides.is_empty() {
        report.detail(format!("env_overrides={}", overrides.join(",")));
    }

    Ok(report)
}
