use std::sync::Arc;

use anyhow::{Result, anyhow};

use crate::commands::{CommandReport, format_ids, open_recovery, record_audit, scan_runtime};
use crate::workorder::config::{MAX_SCAN_CONCURRENCY, load_config};
use crate::workorder::filename::IdMode;
use crate::workorder::paths::resolve_paths;
use crate::workorder::reconcile::{ScanAllOutcome, ScanStats};
use crate::workorder::scanner::{ProgressFn, ScanProgress};

#[derive(Debug, Clone, Default)]
pub struct ScanCommandOptions {
    pub dry_run: bool,
    pub concurrency: Option<usize>,
    pub id_mode: Option<IdMode>,
    /// Print `progress: N/M` lines to stderr while the scan runs.
    pub progress: bool,
}

fn push_stats(report: &mut CommandReport, stats: &ScanStats) {
    report.detail(format!("enumerated={}", stats.enumerated));
    report.detail(format!("eligible={}", stats.eligible));
    report.detail(format!("recovered={}", stats.recovered));
    report.detail(format!("skipped_oversized={}", stats.skipped_oversized));
    report.detail(format!("duplicates_dropped={}", stats.duplicates));
    report.detail(format!("failed={}", stats.failed.len()));
    for failure in &stats.failed {
        report.detail(format!(
            "skipped {}: {}",
            failure.file.display(),
            failure.reason
        ));
    }
}

pub fn run(opts: &ScanCommandOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut cfg = load_config()?;
    if let Some(concurrency) = opts.concurrency {
        if concurrency == 0 || concurrency > MAX_SCAN_CONCURRENCY {
            return Err(anyhow!(
                "invalid --concurrency {concurrency}: require 1 <= concurrency <= {MAX_SCAN_CONCURRENCY}"
            ));
        }
        cfg.scan.concurrency = concurrency;
    }
    if let Some(mode) = opts.id_mode {
        cfg.scan.id_mode = mode;
    }

    let progress = opts.progress.then(|| {
        let print: ProgressFn =
            Arc::new(|p: ScanProgress| eprintln!("progress: {}/{}", p.processed, p.total));
        print
    });
    let mut recovery = open_recovery(&paths, &cfg, progress);

    let mut report = CommandReport::new("scan");
    report.detail(format!("output_dir={}", recovery.output_dir().display()));
    report.detail(format!("db_path={}", recovery.guard().db_path().display()));
    report.detail(format!("concurrency={}", cfg.scan.concurrency));
    report.detail(format!("id_mode={}", cfg.scan.id_mode));
    let runtime = scan_runtime(cfg.scan.concurrency)?;

    if opts.dry_run {
        match runtime.block_on(recovery.scan_all_dry_run()) {
            Ok(dry) => {
                push_stats(&mut report, &dry.stats);
                let ids = dry.reconciliation.added.iter().map(|r| &r.id);
                report.detail("dry_run=true");
                report.detail(format!("would_add={}", dry.reconciliation.added.len()));
                report.detail(format!("would_add_ids={}", format_ids(ids)));
                report.detail(format!(
                    "last_number={} -> {}",
                    recovery.store().last_number,
                    dry.reconciliation.merged.last_number
                ));
            }
            Err(err) => report.issue(format!("{}: {err}", err.code().as_str())),
        }
        return Ok(report);
    }

    match runtime.block_on(recovery.scan_all()) {
        Ok(outcome) => {
            if let Some(stats) = recovery.last_scan() {
                push_stats(&mut report, stats);
            }
            match outcome {
                ScanAllOutcome::NoNewRecords => {
                    report.detail("added=0");
                    report.detail("no new records");
                    record_audit(&paths, "scan", "ok", "no new records");
                }
                ScanAllOutcome::Recovered { added, merged } => {
                    let ids = format_ids(added.iter().map(|r| &r.id));
                    report.detail(format!("added={}", added.len()));
                    report.detail(format!("added_ids={ids}"));
                    report.detail(format!("last_number={}", merged.last_number));
                    report.detail(format!("records={}", merged.records.len()));
                    record_audit(
                        &paths,
                        "scan",
                        "recovered",
                        &format!("added={} ids={ids}", added.len()),
                    );
                }
            }
        }
        Err(err) => {
            let message = format!("{}: {err}", err.code().as_str());
            record_audit(&paths, "scan", "failed", &message);
            report.issue(message);
        }
    }

    Ok(report)
}
