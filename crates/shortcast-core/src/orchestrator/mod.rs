//! Run orchestrator: one bounded step of backlog progress per invocation.
//!
//! A step selects the first candidate item, plans its parts, looks up the
//! first part the ledger has not recorded and either uploads exactly that
//! part or, when every part is recorded, archives the item. The ledger is
//! only written after the endpoint confirmed an upload, and the item folder
//! is only moved after every part is recorded.

mod outcome;

pub use outcome::{RunError, RunOutcome};

use std::path::PathBuf;

use crate::content_store::{ContentStore, WorkItem};
use crate::ledger::Ledger;
use crate::metadata::{load_text, PublishDefaults};
use crate::segmenter::{MediaTool, Segmenter};
use crate::transfer::Publisher;

pub const NO_VIDEO_REASON: &str = "no video file found";

pub struct Orchestrator<M, P> {
    store: ContentStore,
    segmenter: Segmenter<M>,
    ledger_path: PathBuf,
    publisher: P,
    defaults: PublishDefaults,
}

impl<M: MediaTool, P: Publisher> Orchestrator<M, P> {
    pub fn new(
        store: ContentStore,
        segmenter: Segmenter<M>,
        ledger_path: PathBuf,
        publisher: P,
        defaults: PublishDefaults,
    ) -> Self {
        Self {
            store,
            segmenter,
            ledger_path,
            publisher,
            defaults,
        }
    }

    /// Performs one step.
    pub fn run_once(&self) -> Result<RunOutcome, RunError> {
        let Some(item) = self.store.list_candidates()?.into_iter().next() else {
            tracing::info!("backlog is empty");
            return Ok(RunOutcome::Idle);
        };
        let Some(video) = item.video.clone() else {
            tracing::warn!(item = %item.id, "no video file, marking unprocessable");
            self.store.mark_unprocessable(&item, NO_VIDEO_REASON)?;
            return Ok(RunOutcome::Skipped {
                item: item.id,
                reason: NO_VIDEO_REASON.to_string(),
            });
        };

        let mut ledger = Ledger::load(&self.ledger_path)?;
        // Once parts are recorded the plan must not change under us, so the
        // single-part fallback only applies to untouched items.
        let duration = if ledger.completed(&item.id).is_some() {
            self.segmenter
                .measured_duration(&video)
                .map_err(|source| RunError::Segmentation {
                    item: item.id.clone(),
                    source,
                })?
        } else {
            self.segmenter.duration(&video)
        };
        let parts = self
            .segmenter
            .compute_parts(&item.id, &video, duration)
            .map_err(|source| RunError::Segmentation {
                item: item.id.clone(),
                source,
            })?;
        let total = parts.len() as u32;

        if let Some(recorded) = ledger.highest_completed(&item.id).filter(|&i| i > total) {
            tracing::error!(
                item = %item.id,
                total,
                recorded,
                "ledger records more parts than planned, refusing to continue"
            );
            return Err(RunError::PlanMismatch {
                item: item.id,
                total,
                recorded,
            });
        }

        let Some(next) = ledger.first_incomplete(&item.id, total) else {
            return self.finish_item(&item, &mut ledger);
        };
        let part = &parts[(next - 1) as usize];
        tracing::info!(item = %item.id, part = next, total, "next part");

        self.segmenter
            .ensure_part(part)
            .map_err(|source| RunError::Segmentation {
                item: item.id.clone(),
                source,
            })?;

        let text = load_text(&video, item.sidecar.as_deref());
        let metadata = self.defaults.for_part(&text, next, total);
        let receipt = self
            .publisher
            .upload(&part.path, &metadata)
            .map_err(|source| RunError::Transfer {
                item: item.id.clone(),
                part: next,
                total,
                source,
            })?;

        ledger.commit(&item.id, next)?;
        tracing::info!(item = %item.id, part = next, total, id = %receipt.id, "part recorded");
        Ok(RunOutcome::Uploaded {
            item: item.id,
            part: next,
            total,
            receipt,
        })
    }

    /// Archive first, then forget: a crash in between leaves a stale ledger
    /// entry for an item that is no longer in the backlog, which is harmless.
    fn finish_item(&self, item: &WorkItem, ledger: &mut Ledger) -> Result<RunOutcome, RunError> {
        self.store.archive(item)?;
        ledger.remove(&item.id)?;
        self.segmenter.purge(&item.id);
        Ok(RunOutcome::Archived {
            item: item.id.clone(),
            dest: self.store.archive_dir().join(&item.id),
        })
    }
}
