use crate::error::RecoveryError;
use crate::workorder::dedup::dedup;
use crate::workorder::model::{RecoveredCandidate, Store, WorkOrder};
use crate::workorder::persist::PersistenceGuard;
use crate::workorder::scanner::{ItemFailure, ScanReport, Scanner};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub merged: Store,
    /// Records appended to the store, ascending by id.
    pub added: Vec<WorkOrder>,
    /// Candidates that lost to another document with the same id.
    pub duplicates: usize,
}

/// Merge recovered candidates into `store` without touching existing
/// records. Candidates whose id is already present are discarded.
pub fn reconcile(store: &Store, candidates: Vec<RecoveredCandidate>) -> Reconciliation {
    let deduped = dedup(candidates);
    let duplicates = deduped.dropped;
    let existing = store.ids();

    let added = deduped
        .records
        .into_iter()
        .filter(|candidate| !existing.contains(&candidate.id))
        .map(RecoveredCandidate::into_work_order)
        .collect::<Vec<_>>();

    let mut records = store.records.clone();
    records.extend(added.iter().cloned());
    records.sort_by_key(|record| record.id);

    let last_number = store
        .last_number
        .max(deduped.max_id.unwrap_or(0))
        .max(store.max_id().unwrap_or(0));

    Reconciliation {
        merged: Store {
            last_number,
            records,
        },
        added,
        duplicates,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanAllOutcome {
    NoNewRecords,
    Recovered {
        added: Vec<WorkOrder>,
        merged: Store,
    },
}

/// Counters from the most recent scan, without the candidates themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub enumerated: usize,
    pub eligible: usize,
    pub processed: usize,
    pub recovered: usize,
    pub failed: Vec<ItemFailure>,
    pub skipped_oversized: usize,
    /// Documents that lost to another one carrying the same id.
    pub duplicates: usize,
}

impl From<&ScanReport> for ScanStats {
    fn from(report: &ScanReport) -> Self {
        Self {
            enumerated: report.enumerated,
            eligible: report.eligible,
            processed: report.processed,
            recovered: report.candidates.len(),
            failed: report.failed.clone(),
            skipped_oversized: report.skipped_oversized.len(),
            duplicates: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DryRun {
    pub stats: ScanStats,
    pub reconciliation: Reconciliation,
}

/// Holds the authoritative in-memory store. Every change to it is persisted
/// through the guard first.
#[derive(Debug)]
pub struct Recovery {
    guard: PersistenceGuard,
    store: Store,
    scanner: Scanner,
    output_dir: PathBuf,
    last_scan: Option<ScanStats>,
}

impl Recovery {
    pub fn open(guard: PersistenceGuard, scanner: Scanner, output_dir: impl Into<PathBuf>) -> Self {
        let store = guard.load();
        Self {
            guard,
            store,
            scanner,
            output_dir: output_dir.into(),
            last_scan: None,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn guard(&self) -> &PersistenceGuard {
        &self.guard
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn last_scan(&self) -> Option<&ScanStats> {
        self.last_scan.as_ref()
    }

    /// Save `store` and adopt it. On failure the in-memory store is unchanged.
    pub fn save(&mut self, store: Store) -> Result<PathBuf, RecoveryError> {
        let path = self.guard.save(&store)?;
        self.store = store;
        Ok(path)
    }

    async fn scan_reconcile(&mut self) -> Result<Reconciliation, RecoveryError> {
        let report = self.scanner.scan(&self.output_dir).await?;
        let mut stats = ScanStats::from(&report);
        let reconciliation = reconcile(&self.store, report.candidates);
        stats.duplicates = reconciliation.duplicates;
        self.last_scan = Some(stats);
        Ok(reconciliation)
    }

    pub async fn scan_all(&mut self) -> Result<ScanAllOutcome, RecoveryError> {
        let reconciliation = self.scan_reconcile().await?;
        if reconciliation.added.is_empty() {
            info!(records = self.store.records.len(), "scan found no missing records");
            return Ok(ScanAllOutcome::NoNewRecords);
        }

        self.save(reconciliation.merged)?;
        info!(
            added = reconciliation.added.len(),
            last_number = self.store.last_number,
            "recovered records merged into store"
        );
        Ok(ScanAllOutcome::Recovered {
            added: reconciliation.added,
            merged: self.store.clone(),
        })
    }

    pub async fn scan_all_dry_run(&mut self) -> Result<DryRun, RecoveryError> {
        let reconciliation = self.scan_reconcile().await?;
        let stats = self.last_scan.clone().unwrap_or_default();
        Ok(DryRun {
            stats,
            reconciliation,
        })
    }

    /// Best candidate for a single id, or `None` when no document carries it.
    pub async fn scan_one(&self, id: u32) -> Result<Option<RecoveredCandidate>, RecoveryError> {
        let mut scanner = self.scanner.clone();
        scanner.options_mut().only_id = Some(id);
        let report = scanner.scan(&self.output_dir).await?;
        Ok(dedup(report.candidates).records.into_iter().next())
    }
}
