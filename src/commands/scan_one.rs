use anyhow::Result;

use crate::commands::{CommandReport, open_recovery, scan_runtime};
use crate::workorder::config::load_config;
use crate::workorder::model::Field;
use crate::workorder::paths::resolve_paths;

fn field_detail(name: &str, field: &Field) -> String {
    format!("{name}={} ({})", field.value, field.provenance.as_str())
}

pub fn run(id: u32) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let recovery = open_recovery(&paths, &cfg, None);
    let runtime = scan_runtime(cfg.scan.concurrency)?;

    let mut report = CommandReport::new("scan-one");
    report.detail(format!("id={id}"));
    match recovery.store().get(id) {
        Some(stored) => {
            report.detail("in_store=true");
            report.detail(format!("stored_client={}", stored.client));
        }
        None => report.detail("in_store=false"),
    }

    match runtime.block_on(recovery.scan_one(id)) {
        Ok(Some(candidate)) => {
            report.detail(format!("source_file={}", candidate.source_file.display()));
            report.detail(format!(
                "source_file_timestamp={}",
                candidate.source_file_timestamp
            ));
            report.detail(format!("created_date={}", candidate.created_date));
            report.detail(field_detail("client", &candidate.client));
            report.detail(field_detail("phone", &candidate.phone));
            report.detail(field_detail("equipment", &candidate.equipment));
            report.detail(field_detail("price", &candidate.price));
            report.detail(format!("status={}", candidate.status));
        }
        Ok(None) => report.issue(format!(
            "no document for id {id} in {}",
            paths.output_dir.display()
        )),
        Err(err) => report.issue(format!("{}: {err}", err.code().as_str())),
    }

    Ok(report)
}
