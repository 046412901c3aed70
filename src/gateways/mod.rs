//! External collaborators the pipeline drives.
//!
//! Each collaborator is an async trait so the pipeline can be exercised
//! with in-process stubs; the concrete adapters live in the submodules.

pub mod api;
pub mod mail;
pub mod sftp;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Serialize;

use crate::error::{ApiError, MailError, TransferError};
use crate::pipeline::attachment::TransientAttachment;
use crate::pipeline::types::RawWorkItem;

pub use api::HttpWorkQueue;
pub use mail::{MailProfile, SmtpMailer};
pub use sftp::SftpAttachmentSource;

/// Source of pending work items.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Fetch every pending element.
    async fn pending_items(&self) -> Result<Vec<RawWorkItem>, ApiError>;
}

/// One processed (case, template, defendant) triple to mark done upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    #[serde(rename = "ExpedienteId")]
    pub case_id: String,
    #[serde(rename = "PlantillaId")]
    pub template_id: String,
    #[serde(rename = "DemandadoId")]
    pub defendant_ref: String,
}

/// Marks work items done upstream.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Mark one or many entries done.
    async fn mark_done(&self, entries: &[StatusEntry]) -> Result<(), ApiError>;
}

/// Retrieves generated documents by name.
#[async_trait]
pub trait AttachmentSource: Send + Sync {
    /// Download `file_name` into a fresh transient file owned by the caller.
    async fn fetch(&self, file_name: &str) -> Result<TransientAttachment, TransferError>;
}

/// Attachment content handed to the mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPayload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Everything needed to send one notification.
#[derive(Debug)]
pub struct Dispatch {
    pub profile: MailProfile,
    pub case_label: String,
    pub defendant_document: String,
    pub defendant_name: String,
    pub docket_number: String,
    pub template_name: String,
    pub from: String,
    pub password: SecretString,
    pub to: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub html_body: Option<String>,
    pub attachment: Option<AttachmentPayload>,
}

impl Dispatch {
    /// `{defendant_doc}_{defendant_name}_{docket}_{template_name}`
    pub fn subject(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.defendant_document, self.defendant_name, self.docket_number, self.template_name
        )
    }
}

/// Outbound notification transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, dispatch: &Dispatch) -> Result<(), MailError>;
}
