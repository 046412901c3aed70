//! Case processor: turns one work item into one outcome.
//!
//! Flow (strictly ordered, first failure ends the item):
//! 1. Eligibility (process type) and mail provider resolution
//! 2. Case data, court contact, template lookups
//! 3. Attachment retrieval for kind-3 templates
//! 4. Defendant reference and mandatory-field checks
//! 5. Credential decryption and dispatch
//! 6. Attachment cleanup, then a best-effort status report
//!
//! The transient attachment is released in one place after step 5 returns,
//! whatever the result, including a panic inside the steps.

use std::any::Any;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info, warn};

use crate::crypto::decrypt_credential;
use crate::error::Error;
use crate::gateways::{
    AttachmentPayload, AttachmentSource, Dispatch, MailProfile, Mailer, StatusEntry,
    StatusReporter,
};
use crate::pipeline::attachment::TransientAttachment;
use crate::pipeline::types::{
    DefendantRef, FailureReason, Outcome, TemplateInfo, TemplateKind, TemplateKindError,
    WorkItem,
};
use crate::pipeline::validation::CourtContact;
use crate::store::CaseStore;

/// Collaborators the processor drives.
#[derive(Clone)]
pub struct ProcessorDeps {
    pub store: Arc<dyn CaseStore>,
    pub attachments: Arc<dyn AttachmentSource>,
    pub mailer: Arc<dyn Mailer>,
    pub status: Arc<dyn StatusReporter>,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub outcome: Outcome,
    /// Set on success; feeds the batch-level status update.
    pub status_entry: Option<StatusEntry>,
}

impl ProcessReport {
    fn failed(item: &WorkItem, reason: &FailureReason) -> Self {
        Self {
            outcome: Outcome::failed(&item.case_label, reason),
            status_entry: None,
        }
    }
}

/// Runs the notification pipeline for single work items.
pub struct CaseProcessor {
    deps: ProcessorDeps,
    shared_secret: SecretString,
}

fn unexpected(cause: impl Display) -> FailureReason {
    FailureReason::Unexpected(cause.to_string())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Whether a failure is an expected precondition miss rather than an error.
fn is_ineligibility(reason: &FailureReason) -> bool {
    matches!(
        reason,
        FailureReason::UnsupportedProcessType(_)
            | FailureReason::TemplateKind(TemplateKindError::Unsupported(_))
    )
}

impl CaseProcessor {
    pub fn new(deps: ProcessorDeps, shared_secret: SecretString) -> Self {
        Self {
            deps,
            shared_secret,
        }
    }

    /// Process one work item.
    ///
    /// Every per-item failure is reported through the returned outcome. `Err`
    /// is reserved for configuration faults that should stop the batch, such
    /// as a case label with no mail provider.
    pub async fn process(&self, item: &WorkItem) -> Result<ProcessReport, Error> {
        info!(
            case = %item.case_label,
            case_id = item.case_id,
            template_id = item.template_id,
            "Processing work item"
        );

        if !item.is_supported_process() {
            let reason = FailureReason::UnsupportedProcessType(item.process_type);
            self.log_failure(item, &reason);
            return Ok(ProcessReport::failed(item, &reason));
        }

        let profile = MailProfile::for_case_label(&item.case_label)?;

        let mut attachment: Option<TransientAttachment> = None;
        let result = AssertUnwindSafe(self.prepare_and_dispatch(item, profile, &mut attachment))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(unexpected(panic_message(panic))));

        if let Some(attachment) = attachment.take() {
            attachment.remove();
        }

        match result {
            Ok(defendant_ref) => {
                let entry = StatusEntry {
                    case_id: item.case_id.to_string(),
                    template_id: item.template_id.to_string(),
                    defendant_ref: defendant_ref.0,
                };
                self.report_status(item, &entry).await;
                info!(case = %item.case_label, "Work item processed");
                Ok(ProcessReport {
                    outcome: Outcome::succeeded(&item.case_label),
                    status_entry: Some(entry),
                })
            }
            Err(reason) => {
                self.log_failure(item, &reason);
                Ok(ProcessReport::failed(item, &reason))
            }
        }
    }

    fn log_failure(&self, item: &WorkItem, reason: &FailureReason) {
        if is_ineligibility(reason) {
            warn!(case = %item.case_label, case_id = item.case_id, reason = %reason, "Work item not eligible");
        } else {
            error!(case = %item.case_label, case_id = item.case_id, reason = %reason, "Work item failed");
        }
    }

    /// Steps 2 through dispatch. Any attachment fetched is parked in
    /// `attachment` so the caller can release it on every path.
    async fn prepare_and_dispatch(
        &self,
        item: &WorkItem,
        profile: MailProfile,
        attachment: &mut Option<TransientAttachment>,
    ) -> Result<DefendantRef, FailureReason> {
        let store = &self.deps.store;

        let case = store
            .case_data(item.case_id)
            .await
            .map_err(unexpected)?
            .ok_or(FailureReason::CaseNotFound(item.case_id))?;
        let defendant = case.primary_defendant();
        debug!(case = %item.case_label, defendant = %defendant.name, "Case data loaded");

        let raw_contact = store.court_email(item.case_id).await.map_err(unexpected)?;
        let court = CourtContact::parse(raw_contact.as_deref()).map_err(|cause| {
            FailureReason::InvalidCourtContact {
                case_id: item.case_id,
                cause,
            }
        })?;
        debug!(case = %item.case_label, court = %court.as_str(), "Court contact validated");

        let template_name = store
            .template_name(item.template_id)
            .await
            .map_err(unexpected)?
            .ok_or(FailureReason::TemplateNotFound(item.template_id))?;

        let raw_kind = store
            .template_kind(item.template_id, item.case_id)
            .await
            .map_err(unexpected)?;
        let kind = TemplateKind::parse(raw_kind.as_deref()).map_err(FailureReason::TemplateKind)?;
        debug!(case = %item.case_label, kind = kind.code(), "Template kind resolved");

        let mut template = TemplateInfo {
            name: template_name,
            kind,
            attachment_name: None,
            html_body: None,
        };

        if template.kind == TemplateKind::WithAttachment {
            let file_name = store
                .attachment_name(item.template_id, item.case_id)
                .await
                .map_err(unexpected)?
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .ok_or(FailureReason::NoAttachmentConfigured(item.case_id))?;

            info!(case = %item.case_label, file = %file_name, "Fetching attachment");
            let fetched = self.deps.attachments.fetch(&file_name).await.map_err(|e| {
                FailureReason::AttachmentDownloadFailed {
                    file: file_name.clone(),
                    cause: e.to_string(),
                }
            })?;
            *attachment = Some(fetched);
            template.attachment_name = Some(file_name);
        }

        let defendant_ref = store
            .defendant_ref(item.template_id, item.case_id)
            .await
            .map_err(unexpected)?
            .ok_or(FailureReason::DefendantRefNotFound(item.case_id))?;

        template.html_body = store
            .email_body(item.template_id, item.case_id)
            .await
            .map_err(unexpected)?;

        if item.encrypted_credential.trim().is_empty() {
            return Err(FailureReason::MissingCredential);
        }
        if item.sender_mailbox.trim().is_empty() {
            return Err(FailureReason::MissingSenderMailbox);
        }

        let password = decrypt_credential(&item.encrypted_credential, self.shared_secret.expose_secret())
            .map_err(unexpected)?;

        let payload = match attachment.as_ref() {
            Some(att) => Some(AttachmentPayload {
                file_name: att.file_name().to_string(),
                bytes: att.read().await.map_err(unexpected)?,
            }),
            None => None,
        };

        let dispatch = Dispatch {
            profile,
            case_label: item.case_label.clone(),
            defendant_document: defendant.document.clone(),
            defendant_name: defendant.name.clone(),
            docket_number: case.docket_number.clone(),
            template_name: template.name,
            from: item.sender_mailbox.clone(),
            password: SecretString::from(password),
            to: court.as_str().to_string(),
            cc: item.cc.clone(),
            bcc: item.bcc.clone(),
            html_body: template.html_body,
            attachment: payload,
        };

        info!(
            case = %item.case_label,
            to = %dispatch.to,
            with_attachment = dispatch.attachment.is_some(),
            "Dispatching notification"
        );
        self.deps.mailer.send(&dispatch).await.map_err(unexpected)?;

        Ok(defendant_ref)
    }

    /// Mark the item done upstream. Failures are logged and ignored.
    async fn report_status(&self, item: &WorkItem, entry: &StatusEntry) {
        match self.deps.status.mark_done(std::slice::from_ref(entry)).await {
            Ok(()) => info!(case = %item.case_label, "Status reported"),
            Err(e) => warn!(
                case = %item.case_label,
                error = %e,
                "Status report failed; upstream state not updated"
            ),
        }
    }
}
