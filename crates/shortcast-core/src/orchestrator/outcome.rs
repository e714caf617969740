//! What one orchestrator step did, or why it failed.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::content_store::StoreError;
use crate::ledger::LedgerError;
use crate::segmenter::SegmentError;
use crate::transfer::{RemoteReceipt, TransferError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Backlog has no candidates.
    Idle,
    /// Item could not be processed and was marked; it stays in the backlog.
    Skipped { item: String, reason: String },
    Uploaded {
        item: String,
        part: u32,
        total: u32,
        receipt: RemoteReceipt,
    },
    Archived { item: String, dest: PathBuf },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Idle => write!(f, "idle: backlog is empty"),
            RunOutcome::Skipped { item, reason } => write!(f, "skipped {}: {}", item, reason),
            RunOutcome::Uploaded {
                item,
                part,
                total,
                receipt,
            } => write!(f, "uploaded {} part {}/{} as {}", item, part, total, receipt),
            RunOutcome::Archived { item, dest } => {
                write!(f, "archived {} to {}", item, dest.display())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("segmenting {item}: {source}")]
    Segmentation {
        item: String,
        #[source]
        source: SegmentError,
    },
    /// The ledger holds a part beyond the current plan, e.g. the source was
    /// replaced by a shorter file. Nothing is uploaded or archived.
    #[error("{item} is planned as {total} part(s) but the ledger records part {recorded}")]
    PlanMismatch {
        item: String,
        total: u32,
        recorded: u32,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("uploading {item} part {part}/{total}: {source}")]
    Transfer {
        item: String,
        part: u32,
        total: u32,
        #[source]
        source: TransferError,
    },
}

impl RunError {
    /// Operator-facing failure label.
    pub fn status(&self) -> &'static str {
        match self {
            RunError::Store(_) | RunError::Ledger(_) => "io-failure",
            RunError::Segmentation { .. } => "segmentation-failure",
            RunError::PlanMismatch { .. } => "plan-mismatch",
            RunError::Transfer { source, .. } => source.status(),
        }
    }
}
