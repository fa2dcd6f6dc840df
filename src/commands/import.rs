use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::commands::{CommandReport, guard_for, record_audit};
use crate::workorder::config::load_config;
use crate::workorder::model::Store;
use crate::workorder::paths::resolve_paths;

pub fn run(input: &Path, force: bool) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let mut report = CommandReport::new("import");
    report.detail(format!("input={}", input.display()));
    report.detail(format!("db_path={}", paths.db_path.display()));

    let raw = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let store: Store = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse store file {}", input.display()))?;
    report.detail(format!("records={}", store.records.len()));
    report.detail(format!("last_number={}", store.last_number));

    let guard = guard_for(&paths, &cfg);
    let saved = if force {
        guard.save_replacing_unreadable(&store)
    } else {
        guard.save(&store)
    };
    match saved {
        Ok(path) => {
            report.detail(format!("saved={}", path.display()));
            record_audit(
                &paths,
                "save",
                "ok",
                &format!("import records={}", store.records.len()),
            );
        }
        Err(err) => {
            let message = format!("{}: {err}", err.code().as_str());
            record_audit(&paths, "save", "rejected", &message);
            report.issue(message);
        }
    }

    Ok(report)
}
