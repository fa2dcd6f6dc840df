pub mod export;
pub mod import;
pub mod locate;
pub mod scan;
pub mod scan_one;
pub mod status;
pub mod verify;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::runtime::Runtime;
use tracing::warn;

use crate::workorder::audit;
use crate::workorder::config::OsrecConfig;
use crate::workorder::paths::OsrecPaths;
use crate::workorder::persist::{GuardOptions, PersistenceGuard};
use crate::workorder::reconcile::Recovery;
use crate::workorder::scanner::{ProgressFn, ScanOptions, Scanner};

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

pub fn guard_for(paths: &OsrecPaths, cfg: &OsrecConfig) -> PersistenceGuard {
    PersistenceGuard::new(paths.db_path.clone(), GuardOptions::from(&cfg.store))
}

pub fn open_recovery(
    paths: &OsrecPaths,
    cfg: &OsrecConfig,
    progress: Option<ProgressFn>,
) -> Recovery {
    let mut scanner = Scanner::new(ScanOptions::from(&cfg.scan));
    if let Some(progress) = progress {
        scanner = scanner.on_progress(progress);
    }
    Recovery::open(guard_for(paths, cfg), scanner, paths.output_dir.clone())
}

/// Only the scanning commands pay for a runtime.
pub fn scan_runtime(worker_threads: usize) -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads.clamp(1, 8))
        .enable_all()
        .build()
        .context("failed to build tokio runtime for scan")
}

/// Audit failures are logged, never fatal to the command.
pub fn record_audit(paths: &OsrecPaths, phase: &str, status: &str, message: &str) {
    if let Err(err) = audit::append_event(paths, phase, status, message) {
        warn!(error = %err, phase, "failed to append audit event");
    }
}

pub fn format_ids<'a>(ids: impl IntoIterator<Item = &'a u32>) -> String {
    ids.into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
