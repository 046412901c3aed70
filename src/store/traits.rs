//! `CaseStore` trait: read-only lookups against the case database.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::pipeline::types::{DefendantRef, EnrichedCaseData};

/// Backend-agnostic case store.
///
/// Every lookup returns `Ok(None)` when no row matches; `Err` is reserved
/// for connection and query failures.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Defendant pairs and docket number for a case.
    async fn case_data(&self, case_id: i64) -> Result<Option<EnrichedCaseData>, DatabaseError>;

    /// Raw email address of the court handling a case.
    async fn court_email(&self, case_id: i64) -> Result<Option<String>, DatabaseError>;

    /// Display name of a template.
    async fn template_name(&self, template_id: i64) -> Result<Option<String>, DatabaseError>;

    /// Raw template kind column, rendered as text.
    async fn template_kind(
        &self,
        template_id: i64,
        case_id: i64,
    ) -> Result<Option<String>, DatabaseError>;

    /// Name of the generated document to attach.
    async fn attachment_name(
        &self,
        template_id: i64,
        case_id: i64,
    ) -> Result<Option<String>, DatabaseError>;

    /// Defendant reference used for status reporting.
    async fn defendant_ref(
        &self,
        template_id: i64,
        case_id: i64,
    ) -> Result<Option<DefendantRef>, DatabaseError>;

    /// HTML body rendered for this template and case.
    async fn email_body(
        &self,
        template_id: i64,
        case_id: i64,
    ) -> Result<Option<String>, DatabaseError>;
}
