use anyhow::Result;
use std::path::Path;

use crate::commands::{CommandReport, guard_for, record_audit};
use crate::workorder::config::load_config;
use crate::workorder::export::export_csv;
use crate::workorder::paths::resolve_paths;
use crate::workorder::persist::LoadState;

pub fn run(output: &Path) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let mut report = CommandReport::new("export");
    report.detail(format!("db_path={}", paths.db_path.display()));
    report.detail(format!("output={}", output.display()));

    let store = match guard_for(&paths, &cfg).inspect() {
        LoadState::Loaded(store) => store,
        LoadState::Missing => {
            report.issue("no records to export: store file missing");
            return Ok(report);
        }
        LoadState::Unreadable(reason) => {
            report.issue(format!("store unreadable: {reason}"));
            return Ok(report);
        }
    };
    if store.records.is_empty() {
        report.issue("no records to export");
        return Ok(report);
    }

    let rows = export_csv(&store, output)?;
    report.detail(format!("rows={rows}"));
    record_audit(
        &paths,
        "export",
        "ok",
        &format!("rows={rows} output={}", output.display()),
    );
    Ok(report)
}
