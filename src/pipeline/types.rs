//! Shared types for the case-notification pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pipeline::validation::ContactError;

/// The only process type the pipeline handles.
pub const SUPPORTED_PROCESS_TYPE: i64 = 1;

/// Number of defendant slots stored per case.
pub const MAX_DEFENDANTS: usize = 4;

// ── Work item ───────────────────────────────────────────────────────

/// Raw pending element as delivered by the work-queue API.
///
/// Missing fields default to zero or `None`; validation happens when the
/// element is converted into a [`WorkItem`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawWorkItem {
    #[serde(rename = "IdExpediente")]
    pub case_id: i64,
    #[serde(rename = "Expediente")]
    pub case_label: Option<String>,
    #[serde(rename = "IdTipoProceso")]
    pub process_type: i64,
    #[serde(rename = "IdPlantilla")]
    pub template_id: i64,
    #[serde(rename = "SubEtapaInicialId")]
    pub initial_substage_id: i64,
    #[serde(rename = "CorreoRemitente")]
    pub sender_mailbox: Option<String>,
    #[serde(rename = "CorreoCopia")]
    pub cc: Option<String>,
    #[serde(rename = "CorreoCopiaOculta")]
    pub bcc: Option<String>,
    #[serde(rename = "Contrasena")]
    pub encrypted_credential: Option<String>,
}

/// Why a raw element could not become a [`WorkItem`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkItemError {
    #[error("case label is empty")]
    MissingCaseLabel,
    #[error("sender mailbox is empty")]
    MissingSenderMailbox,
    #[error("encrypted credential is empty")]
    MissingCredential,
}

/// One notification task. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub case_id: i64,
    pub case_label: String,
    pub process_type: i64,
    pub template_id: i64,
    pub initial_substage_id: i64,
    pub sender_mailbox: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub encrypted_credential: String,
}

impl WorkItem {
    /// Whether the process type is one the pipeline handles.
    pub fn is_supported_process(&self) -> bool {
        self.process_type == SUPPORTED_PROCESS_TYPE
    }
}

impl TryFrom<RawWorkItem> for WorkItem {
    type Error = WorkItemError;

    fn try_from(raw: RawWorkItem) -> Result<Self, Self::Error> {
        let case_label = non_blank(raw.case_label).ok_or(WorkItemError::MissingCaseLabel)?;
        let sender_mailbox =
            non_blank(raw.sender_mailbox).ok_or(WorkItemError::MissingSenderMailbox)?;
        let encrypted_credential =
            non_blank(raw.encrypted_credential).ok_or(WorkItemError::MissingCredential)?;

        Ok(Self {
            case_id: raw.case_id,
            case_label,
            process_type: raw.process_type,
            template_id: raw.template_id,
            initial_substage_id: raw.initial_substage_id,
            sender_mailbox,
            cc: non_blank(raw.cc),
            bcc: non_blank(raw.bcc),
            encrypted_credential,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ── Enrichment data ─────────────────────────────────────────────────

/// A defendant name/document pair. NULL columns become empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Defendant {
    pub name: String,
    pub document: String,
}

/// Case data looked up by case id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichedCaseData {
    pub defendants: [Defendant; MAX_DEFENDANTS],
    pub docket_number: String,
}

impl EnrichedCaseData {
    /// The first defendant slot, used for the notification subject.
    pub fn primary_defendant(&self) -> &Defendant {
        &self.defendants[0]
    }
}

/// Identifier used when reporting a processed item upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefendantRef(pub String);

impl fmt::Display for DefendantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Templates ───────────────────────────────────────────────────────

/// Template kind: whether the notification carries an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Kind 2: HTML body only.
    BodyOnly,
    /// Kind 3: body plus a generated document.
    WithAttachment,
}

/// Why a raw template kind was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateKindError {
    #[error("unparseable template kind: {0:?}")]
    Unparseable(String),
    #[error("unsupported template kind: {0}")]
    Unsupported(i64),
}

impl TemplateKind {
    /// Numeric code used by the upstream schema.
    pub fn code(self) -> i64 {
        match self {
            TemplateKind::BodyOnly => 2,
            TemplateKind::WithAttachment => 3,
        }
    }

    /// Normalize the raw column value (trimmed, integer-parsed).
    pub fn parse(raw: Option<&str>) -> Result<Self, TemplateKindError> {
        let raw = raw.unwrap_or_default().trim();
        let code: i64 = raw
            .parse()
            .map_err(|_| TemplateKindError::Unparseable(raw.to_string()))?;
        match code {
            2 => Ok(TemplateKind::BodyOnly),
            3 => Ok(TemplateKind::WithAttachment),
            other => Err(TemplateKindError::Unsupported(other)),
        }
    }
}

/// Template data gathered for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInfo {
    pub name: String,
    pub kind: TemplateKind,
    pub attachment_name: Option<String>,
    pub html_body: Option<String>,
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Why a work item did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    UnsupportedProcessType(i64),
    CaseNotFound(i64),
    InvalidCourtContact { case_id: i64, cause: ContactError },
    TemplateNotFound(i64),
    TemplateKind(TemplateKindError),
    NoAttachmentConfigured(i64),
    AttachmentDownloadFailed { file: String, cause: String },
    DefendantRefNotFound(i64),
    MissingCredential,
    MissingSenderMailbox,
    Unexpected(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::UnsupportedProcessType(code) => {
                write!(f, "unsupported process type ({code})")
            }
            FailureReason::CaseNotFound(id) => write!(f, "no record for case {id}"),
            FailureReason::InvalidCourtContact { case_id, cause } => {
                write!(f, "invalid court contact for case {case_id}: {cause}")
            }
            FailureReason::TemplateNotFound(id) => write!(f, "no record for template {id}"),
            FailureReason::TemplateKind(e) => write!(f, "{e}"),
            FailureReason::NoAttachmentConfigured(id) => {
                write!(f, "no attachment document configured for case {id}")
            }
            FailureReason::AttachmentDownloadFailed { file, cause } => {
                write!(f, "attachment download failed: document {file} unavailable ({cause})")
            }
            FailureReason::DefendantRefNotFound(id) => {
                write!(f, "no defendant reference found for case {id}")
            }
            FailureReason::MissingCredential => f.write_str("encrypted credential is empty"),
            FailureReason::MissingSenderMailbox => f.write_str("sender mailbox is empty"),
            FailureReason::Unexpected(cause) => write!(f, "unexpected error: {cause}"),
        }
    }
}

/// Result record for one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub case_label: String,
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn succeeded(case_label: impl Into<String>) -> Self {
        Self {
            case_label: case_label.into(),
            success: true,
            message: "processed".to_string(),
        }
    }

    pub fn failed(case_label: impl Into<String>, reason: &FailureReason) -> Self {
        Self {
            case_label: case_label.into(),
            success: false,
            message: reason.to_string(),
        }
    }
}
