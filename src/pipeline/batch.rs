//! Batch driver: one pass over the pending work queue.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::gateways::{MailProfile, StatusEntry, StatusReporter, WorkQueue};
use crate::pipeline::processor::CaseProcessor;
use crate::pipeline::types::{Outcome, WorkItem};

/// Summary of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<Outcome>,
    pub succeeded: usize,
    pub failed: usize,
    /// Entries confirmed by the bulk status update.
    pub status_updated: usize,
}

pub struct BatchDriver {
    queue: Arc<dyn WorkQueue>,
    status: Arc<dyn StatusReporter>,
    processor: CaseProcessor,
}

impl BatchDriver {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        status: Arc<dyn StatusReporter>,
        processor: CaseProcessor,
    ) -> Self {
        Self {
            queue,
            status,
            processor,
        }
    }

    /// Fetch pending items once and process them one after another.
    ///
    /// A failed fetch yields an empty report. Items missing a sender mailbox
    /// or credential are skipped without an outcome. An eligible item whose
    /// case label maps to no mail provider aborts the run before any item is
    /// processed.
    pub async fn run(&self) -> Result<BatchReport, Error> {
        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, "Batch started");

        let raw_items = match self.queue.pending_items().await {
            Ok(items) => items,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Failed to fetch pending items");
                return Ok(BatchReport::default());
            }
        };

        if raw_items.is_empty() {
            warn!(run_id = %run_id, "No pending items to process");
            return Ok(BatchReport::default());
        }

        let total = raw_items.len();
        let mut items = Vec::with_capacity(total);
        for (idx, raw) in raw_items.into_iter().enumerate() {
            let label = raw.case_label.clone().unwrap_or_default();
            match WorkItem::try_from(raw) {
                Ok(item) => items.push(item),
                Err(e) => {
                    warn!(run_id = %run_id, position = idx + 1, total, case = %label, reason = %e, "Skipping work item");
                }
            }
        }

        check_providers(&items).inspect_err(|e| {
            error!(run_id = %run_id, error = %e, "Mail provider check failed; nothing processed");
        })?;

        let mut report = BatchReport::default();
        let mut done: Vec<StatusEntry> = Vec::new();

        for (idx, item) in items.iter().enumerate() {
            debug!(run_id = %run_id, position = idx + 1, total = items.len(), case = %item.case_label, "Dispatching to processor");
            let processed = self.processor.process(item).await?;

            if processed.outcome.success {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            done.extend(processed.status_entry);
            report.outcomes.push(processed.outcome);
        }

        if done.is_empty() {
            info!(run_id = %run_id, "No successful items to mark done");
        } else {
            match self.status.mark_done(&done).await {
                Ok(()) => {
                    report.status_updated = done.len();
                    info!(run_id = %run_id, count = done.len(), "Bulk status update applied");
                }
                Err(e) => warn!(
                    run_id = %run_id,
                    count = done.len(),
                    error = %e,
                    "Bulk status update failed"
                ),
            }
        }

        info!(
            run_id = %run_id,
            succeeded = report.succeeded,
            failed = report.failed,
            "Batch finished"
        );
        Ok(report)
    }
}

/// Every eligible item must route to a mail provider.
fn check_providers(items: &[WorkItem]) -> Result<(), Error> {
    items
        .iter()
        .filter(|item| item.is_supported_process())
        .try_for_each(|item| MailProfile::for_case_label(&item.case_label).map(|_| ()))?;
    Ok(())
}
