use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("document directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("failed to enumerate {}: {source}", dir.display())]
    Enumerate {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("store rejected: {0}")]
    Invalid(String),
    #[error(
        "anti-wipe guard: refusing to replace {existing} persisted records with an empty list (threshold {threshold})"
    )]
    AntiWipe { existing: usize, threshold: usize },
    #[error(
        "store file {} exists but cannot be parsed ({reason}); refusing to replace it",
        path.display()
    )]
    UnreadableExisting { path: PathBuf, reason: String },
    #[error("failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    E101ScanDirMissing,
    E102ScanEnumerate,
    E201StoreInvalid,
    E202AntiWipe,
    E203StoreWrite,
    E204StoreUnreadable,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E101ScanDirMissing => "E101_SCAN_DIR_MISSING",
            Self::E102ScanEnumerate => "E102_SCAN_ENUMERATE",
            Self::E201StoreInvalid => "E201_STORE_INVALID",
            Self::E202AntiWipe => "E202_ANTI_WIPE",
            Self::E203StoreWrite => "E203_STORE_WRITE",
            Self::E204StoreUnreadable => "E204_STORE_UNREADABLE",
        }
    }
}

impl ScanError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingDirectory(_) => ErrorCode::E101ScanDirMissing,
            Self::Enumerate { .. } => ErrorCode::E102ScanEnumerate,
        }
    }
}

impl PersistError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Invalid(_) => ErrorCode::E201StoreInvalid,
            Self::AntiWipe { .. } => ErrorCode::E202AntiWipe,
            Self::UnreadableExisting { .. } => ErrorCode::E204StoreUnreadable,
            Self::Serialize(_) | Self::Io { .. } => ErrorCode::E203StoreWrite,
        }
    }
}

impl RecoveryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Scan(err) => err.code(),
            Self::Persist(err) => err.code(),
        }
    }
}
