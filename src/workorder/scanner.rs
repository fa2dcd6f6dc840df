use crate::error::ScanError;
use crate::workorder::config::ScanConfig;
use crate::workorder::filename::{IdMode, extract_id};
use crate::workorder::miner::{DocumentMiner, DocxMiner};
use crate::workorder::model::RecoveredCandidate;
use crate::workorder::util::{created_or_modified, display_date, epoch_secs, modified};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Prefix of the lock files an editor leaves next to an open document.
pub const TRANSIENT_EDIT_PREFIX: &str = "~$";

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub concurrency: usize,
    pub max_file_bytes: u64,
    pub progress_every: usize,
    pub id_mode: IdMode,
    pub extensions: Vec<String>,
    /// Only schedule files whose name yields this id.
    pub only_id: Option<u32>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

impl From<&ScanConfig> for ScanOptions {
    fn from(cfg: &ScanConfig) -> Self {
        Self {
            concurrency: cfg.concurrency,
            max_file_bytes: cfg.max_file_bytes,
            progress_every: cfg.progress_every,
            id_mode: cfg.id_mode,
            extensions: cfg.extensions.clone(),
            only_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub processed: usize,
    pub total: usize,
}

pub type ProgressFn = Arc<dyn Fn(ScanProgress) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub file: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Sorted by id, then by source file.
    pub candidates: Vec<RecoveredCandidate>,
    pub enumerated: usize,
    pub eligible: usize,
    pub processed: usize,
    pub failed: Vec<ItemFailure>,
    pub skipped_oversized: Vec<PathBuf>,
}

enum FileOutcome {
    Recovered(Box<RecoveredCandidate>),
    Oversized(PathBuf),
    Failed(ItemFailure),
}

struct EligibleFile {
    path: PathBuf,
    file_name: String,
    id: u32,
}

#[derive(Clone)]
pub struct Scanner {
    options: ScanOptions,
    miner: Arc<dyn DocumentMiner>,
    progress: Option<ProgressFn>,
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("options", &self.options)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

fn has_known_extension(file_name: &str, extensions: &[String]) -> bool {
    let Some(ext) = Path::new(file_name).extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|known| known.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

/// Name-only eligibility: known extension, not an editor lock file, and a
/// valid id under the configured mode.
pub fn eligible_id(file_name: &str, options: &ScanOptions) -> Option<u32> {
    if file_name.starts_with(TRANSIENT_EDIT_PREFIX) {
        return None;
    }
    if !has_known_extension(file_name, &options.extensions) {
        return None;
    }
    let id = extract_id(file_name, options.id_mode)?.id;
    match options.only_id {
        Some(only) if only != id => None,
        _ => Some(id),
    }
}

async fn process_file(
    file: EligibleFile,
    max_file_bytes: u64,
    miner: Arc<dyn DocumentMiner>,
) -> FileOutcome {
    let EligibleFile {
        path,
        file_name,
        id,
    } = file;
    let fail = |path: PathBuf, reason: String| {
        FileOutcome::Failed(ItemFailure { file: path, reason })
    };

    let meta = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta,
        Err(err) => return fail(path, format!("stat failed: {err}")),
    };
    if !meta.is_file() {
        return fail(path, "not a regular file".to_string());
    }
    if meta.len() > max_file_bytes {
        return FileOutcome::Oversized(path);
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) => return fail(path, format!("read failed: {err}")),
    };
    if bytes.len() as u64 > max_file_bytes {
        return FileOutcome::Oversized(path);
    }

    let mined = tokio::task::spawn_blocking(move || miner.mine(id, &file_name, &bytes)).await;
    let mined = match mined {
        Ok(mined) => mined,
        Err(err) => return fail(path, format!("mining task failed: {err}")),
    };

    let candidate = RecoveredCandidate::from_mined(
        id,
        mined,
        display_date(created_or_modified(&meta)),
        path,
        epoch_secs(modified(&meta)),
    );
    FileOutcome::Recovered(Box::new(candidate))
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            miner: Arc::new(DocxMiner),
            progress: None,
        }
    }

    #[cfg(test)]
    pub fn with_miner(mut self, miner: Arc<dyn DocumentMiner>) -> Self {
        self.miner = miner;
        self
    }

    /// Called every `progress_every` files and once more at the end.
    pub fn on_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn options_mut(&mut self) -> &mut ScanOptions {
        &mut self.options
    }

    async fn enumerate(
        &self,
        dir: &Path,
        report: &mut ScanReport,
    ) -> Result<Vec<EligibleFile>, ScanError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ScanError::MissingDirectory(dir.to_path_buf()));
            }
            Err(source) => {
                return Err(ScanError::Enumerate {
                    dir: dir.to_path_buf(),
                    source,
                });
            }
        };

        let mut eligible = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(ScanError::Enumerate {
                        dir: dir.to_path_buf(),
                        source,
                    });
                }
            };
            let path = entry.path();
            match entry.file_type().await {
                Ok(ft) if ft.is_dir() => continue,
                Ok(_) => {}
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "skipping entry with unreadable type");
                    report.failed.push(ItemFailure {
                        file: path,
                        reason: format!("file type unavailable: {err}"),
                    });
                    continue;
                }
            }
            report.enumerated += 1;

            let Some(file_name) = entry.file_name().to_str().map(ToOwned::to_owned) else {
                debug!(file = %path.display(), "skipping non UTF-8 filename");
                continue;
            };
            if let Some(id) = eligible_id(&file_name, &self.options) {
                eligible.push(EligibleFile {
                    path,
                    file_name,
                    id,
                });
            }
        }
        Ok(eligible)
    }

    pub async fn scan(&self, dir: &Path) -> Result<ScanReport, ScanError> {
        let mut report = ScanReport::default();
        let eligible = self.enumerate(dir, &mut report).await?;
        let total = eligible.len();
        report.eligible = total;
        info!(
            dir = %dir.display(),
            enumerated = report.enumerated,
            eligible = total,
            concurrency = self.options.concurrency,
            "scan started"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for file in eligible {
            let semaphore = Arc::clone(&semaphore);
            let miner = Arc::clone(&self.miner);
            let max_file_bytes = self.options.max_file_bytes;
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return FileOutcome::Failed(ItemFailure {
                        file: file.path,
                        reason: "scan pool closed".to_string(),
                    });
                };
                process_file(file, max_file_bytes, miner).await
            });
        }

        let every = self.options.progress_every.max(1);
        while let Some(joined) = tasks.join_next().await {
            report.processed += 1;
            match joined {
                Ok(FileOutcome::Recovered(candidate)) => report.candidates.push(*candidate),
                Ok(FileOutcome::Oversized(path)) => {
                    debug!(file = %path.display(), "skipping oversized file");
                    report.skipped_oversized.push(path);
                }
                Ok(FileOutcome::Failed(failure)) => {
                    warn!(file = %failure.file.display(), reason = %failure.reason, "skipping file");
                    report.failed.push(failure);
                }
                Err(err) => {
                    warn!(error = %err, "scan task aborted");
                    report.failed.push(ItemFailure {
                        file: PathBuf::new(),
                        reason: format!("scan task aborted: {err}"),
                    });
                }
            }

            if report.processed % every == 0 || report.processed == total {
                let progress = ScanProgress {
                    processed: report.processed,
                    total,
                };
                info!(processed = progress.processed, total, "scan progress");
                if let Some(callback) = &self.progress {
                    callback(progress);
                }
            }
        }

        report.candidates.sort_by(|a, b| {
            a.id.cmp(&b.id)
                .then_with(|| a.source_file.cmp(&b.source_file))
        });
        info!(
            recovered = report.candidates.len(),
            failed = report.failed.len(),
            oversized = report.skipped_oversized.len(),
            "scan finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workorder::miner::testdoc::docx_with_paragraphs;
    use crate::workorder::model::{MinedDocument, PLACEHOLDER_CLIENT, PLACEHOLDER_PRICE};
    use std::fs;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[derive(Default)]
    struct CountingMiner {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl DocumentMiner for CountingMiner {
        fn mine(&self, _id: u32, file_name: &str, _bytes: &[u8]) -> MinedDocument {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            MinedDocument::fallback(file_name)
        }
    }

    struct PanickingMiner;

    impl DocumentMiner for PanickingMiner {
        fn mine(&self, id: u32, file_name: &str, _bytes: &[u8]) -> MinedDocument {
            if id == 2 {
                panic!("boom");
            }
            MinedDocument::fallback(file_name)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn recovers_readable_and_corrupted_documents() {
        let tmp = tempdir().expect("tempdir");
        fs::write(
            tmp.path().join("OS 3501 - Maria - HP.docx"),
            docx_with_paragraphs(&["Cliente: Maria Silva", "Valor: R$ 150,00"]),
        )
        .expect("write docx");
        fs::write(tmp.path().join("3502.docx"), b"\x00\x01corrupted").expect("write junk");

        let report = Scanner::new(ScanOptions::default())
            .scan(tmp.path())
            .await
            .expect("scan");

        assert_eq!(report.candidates.len(), 2);
        let first = &report.candidates[0];
        assert_eq!(first.id, 3501);
        assert_eq!(first.client.value, "Maria Silva");
        assert_eq!(first.price.value, "R$ 150,00");
        let second = &report.candidates[1];
        assert_eq!(second.id, 3502);
        assert_eq!(second.client.value, PLACEHOLDER_CLIENT);
        assert_eq!(second.price.value, PLACEHOLDER_PRICE);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn filters_ineligible_and_oversized_files() {
        let tmp = tempdir().expect("tempdir");
        let junk = vec![b'x'; 64];
        fs::write(tmp.path().join("~$3501.docx"), &junk).expect("write");
        fs::write(tmp.path().join("3503.txt"), &junk).expect("write");
        fs::write(tmp.path().join("Relatorio 2023.docx"), &junk).expect("write");
        fs::write(tmp.path().join("3504.DOCX"), &junk).expect("write");
        fs::write(tmp.path().join("3505.docx"), vec![b'x'; 4096]).expect("write");
        fs::create_dir(tmp.path().join("3506.docx")).expect("mkdir");

        let options = ScanOptions {
            max_file_bytes: 1024,
            ..ScanOptions::default()
        };
        let report = Scanner::new(options).scan(tmp.path()).await.expect("scan");

        let ids = report.candidates.iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![3504]);
        assert_eq!(report.enumerated, 5);
        assert_eq!(report.eligible, 2);
        assert_eq!(report.skipped_oversized, vec![tmp.path().join("3505.docx")]);
    }

    #[tokio::test]
    async fn loose_mode_accepts_numbers_inside_the_name() {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("Relatorio 2023.docx"), b"x").expect("write");
        let options = ScanOptions {
            id_mode: IdMode::Loose,
            ..ScanOptions::default()
        };
        let report = Scanner::new(options).scan(tmp.path()).await.expect("scan");
        assert_eq!(report.candidates[0].id, 2023);
    }

    #[tokio::test]
    async fn missing_directory_is_fatal() {
        let tmp = tempdir().expect("tempdir");
        let err = Scanner::new(ScanOptions::default())
            .scan(&tmp.path().join("absent"))
            .await
            .expect_err("must fail");
        assert!(matches!(err, ScanError::MissingDirectory(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_ceiling_holds_and_every_result_arrives() {
        let tmp = tempdir().expect("tempdir");
        for id in 1..=200u32 {
            fs::write(tmp.path().join(format!("{id}.docx")), b"x").expect("write");
        }
        let miner = Arc::new(CountingMiner::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);

        let options = ScanOptions {
            concurrency: 10,
            ..ScanOptions::default()
        };
        let report = Scanner::new(options)
            .with_miner(miner.clone())
            .on_progress(Arc::new(move |p: ScanProgress| seen_cb.lock().expect("lock").push(p)))
            .scan(tmp.path())
            .await
            .expect("scan");

        assert!(miner.peak.load(Ordering::SeqCst) <= 10);
        assert_eq!(report.candidates.len(), 200);
        assert_eq!(report.processed, 200);
        let ids = report.candidates.iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(ids, (1..=200).collect::<Vec<_>>());

        let progress = seen.lock().expect("lock").clone();
        let processed = progress.iter().map(|p| p.processed).collect::<Vec<_>>();
        assert_eq!(processed, vec![50, 100, 150, 200]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn a_failing_file_does_not_abort_the_scan() {
        let tmp = tempdir().expect("tempdir");
        for id in 1..=3u32 {
            fs::write(tmp.path().join(format!("{id}.docx")), b"x").expect("write");
        }
        let report = Scanner::new(ScanOptions::default())
            .with_miner(Arc::new(PanickingMiner))
            .scan(tmp.path())
            .await
            .expect("scan");

        let ids = report.candidates.iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].file, tmp.path().join("2.docx"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dangling_link_is_a_skippable_failure() {
        let tmp = tempdir().expect("tempdir");
        fs::write(tmp.path().join("1.docx"), b"x").expect("write");
        std::os::unix::fs::symlink(tmp.path().join("gone.docx"), tmp.path().join("2.docx"))
            .expect("symlink");

        let report = Scanner::new(ScanOptions::default())
            .scan(tmp.path())
            .await
            .expect("scan");
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].reason.starts_with("stat failed"));
    }

    #[tokio::test]
    async fn id_filter_restricts_scheduling() {
        let tmp = tempdir().expect("tempdir");
        for name in ["10.docx", "OS 11 - Ana.docx", "OS 11 - copia.docx", "12.docx"] {
            fs::write(tmp.path().join(name), b"x").expect("write");
        }
        let options = ScanOptions {
            only_id: Some(11),
            ..ScanOptions::default()
        };
        let report = Scanner::new(options).scan(tmp.path()).await.expect("scan");
        assert_eq!(report.eligible, 2);
        assert!(report.candidates.iter().all(|c| c.id == 11));
    }
}
