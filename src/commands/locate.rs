use anyhow::Result;

use crate::commands::{CommandReport, record_audit};
use crate::workorder::config::load_config;
use crate::workorder::locate::{delete_documents, locate_documents};
use crate::workorder::paths::resolve_paths;

pub fn run(id: u32, delete: bool) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let mut report = CommandReport::new("locate");
    report.detail(format!("id={id}"));

    if delete {
        let removed = delete_documents(&paths.output_dir, id, &cfg.scan.extensions)?;
        report.detail(format!("deleted={}", removed.len()));
        for path in &removed {
            report.detail(format!("document={}", path.display()));
        }
        record_audit(
            &paths,
            "delete",
            "ok",
            &format!("id={id} deleted={}", removed.len()),
        );
        return Ok(report);
    }

    let found = locate_documents(&paths.output_dir, id, &cfg.scan.extensions)?;
    if found.is_empty() {
        report.issue(format!(
            "no document for id {id} in {}",
            paths.output_dir.display()
        ));
    }
    for path in found {
        report.detail(format!("document={}", path.display()));
    }
    Ok(report)
}
