//! libSQL backend: async `CaseStore` implementation.
//!
//! Supports a remote libSQL/sqld server holding a mirror of the upstream
//! case tables, a local file mirror, and in-memory databases for tests.
//! The upstream system of record is SQL Server; querying it directly needs
//! its own `CaseStore` implementation.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::params::IntoParams;
use libsql::{Connection, Database as LibSqlDatabase, Row, Value, params};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::DatabaseError;
use crate::pipeline::types::{Defendant, DefendantRef, EnrichedCaseData, MAX_DEFENDANTS};
use crate::store::migrations;
use crate::store::traits::CaseStore;

/// libSQL case store.
///
/// Holds a single connection reused for every lookup.
pub struct LibSqlCaseStore {
    // Kept alive for the lifetime of `conn`.
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlCaseStore {
    /// Open the store described by the configuration.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        match config {
            DatabaseConfig::Remote { url, auth_token } => {
                use secrecy::ExposeSecret;
                Self::new_remote(url, auth_token.expose_secret()).await
            }
            DatabaseConfig::Local { path } => Self::new_local(path).await,
        }
    }

    /// Connect to a remote libSQL server. No schema changes are made.
    pub async fn new_remote(url: &str, auth_token: &str) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open remote database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        info!(url = %url, "Connected to remote case database");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Open (or create) a local database file and ensure the schema exists.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Case database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run a query and return its first row, if any.
    async fn first_row(
        &self,
        op: &str,
        sql: &str,
        params: impl IntoParams,
    ) -> Result<Option<Row>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        if row.is_none() {
            debug!(op, "No matching row");
        }
        Ok(row)
    }

    /// First column of the first row, rendered as text. NULL reads as `None`.
    async fn first_text(
        &self,
        op: &str,
        sql: &str,
        params: impl IntoParams,
    ) -> Result<Option<String>, DatabaseError> {
        match self.first_row(op, sql, params).await? {
            Some(row) => column_text(&row, 0, op),
            None => Ok(None),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Render a column as text regardless of its stored type.
fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

fn column_text(row: &Row, idx: i32, op: &str) -> Result<Option<String>, DatabaseError> {
    let value = row
        .get_value(idx)
        .map_err(|e| DatabaseError::Query(format!("{op} column {idx}: {e}")))?;
    Ok(value_to_text(value))
}

/// Map an INFORME_JURIDICO row to case data.
///
/// Column order: 0..8 defendant name/document pairs, 8: docket number.
fn row_to_case_data(row: &Row) -> Result<EnrichedCaseData, DatabaseError> {
    let mut data = EnrichedCaseData::default();
    for slot in 0..MAX_DEFENDANTS {
        let base = (slot * 2) as i32;
        data.defendants[slot] = Defendant {
            name: column_text(row, base, "case_data")?.unwrap_or_default(),
            document: column_text(row, base + 1, "case_data")?.unwrap_or_default(),
        };
    }
    data.docket_number = column_text(row, (MAX_DEFENDANTS * 2) as i32, "case_data")?
        .unwrap_or_default();
    Ok(data)
}

// ── CaseStore implementation ────────────────────────────────────────

#[async_trait]
impl CaseStore for LibSqlCaseStore {
    async fn case_data(&self, case_id: i64) -> Result<Option<EnrichedCaseData>, DatabaseError> {
        let row = self
            .first_row(
                "case_data",
                "SELECT DEMANDADO1_NOMBRE, DEMANDADO1_DOCUMENTO,
                        DEMANDADO2_NOMBRE, DEMANDADO2_DOCUMENTO,
                        DEMANDADO3_NOMBRE, DEMANDADO3_DOCUMENTO,
                        DEMANDADO4_NOMBRE, DEMANDADO4_DOCUMENTO,
                        RADICADO_LARGO
                   FROM INFORME_JURIDICO
                  WHERE ID_EXPEDIENTE = ?1
                  LIMIT 1",
                params![case_id],
            )
            .await?;

        row.as_ref().map(row_to_case_data).transpose()
    }

    async fn court_email(&self, case_id: i64) -> Result<Option<String>, DatabaseError> {
        self.first_text(
            "court_email",
            "SELECT j.correoElectronico
               FROM APLI_JUZGADOS j
               INNER JOIN APLI_JUZGADO_EXPEDIENTES je ON j.idJuzgado = je.juzgadoId
              WHERE je.expedienteId = ?1
              LIMIT 1",
            params![case_id],
        )
        .await
    }

    async fn template_name(&self, template_id: i64) -> Result<Option<String>, DatabaseError> {
        self.first_text(
            "template_name",
            "SELECT nombrePlantilla FROM BOFF_DOC_PLANTILLAS WHERE idPlantilla = ?1 LIMIT 1",
            params![template_id],
        )
        .await
    }

    async fn template_kind(
        &self,
        template_id: i64,
        _case_id: i64,
    ) -> Result<Option<String>, DatabaseError> {
        self.first_text(
            "template_kind",
            "SELECT tipoPlantillaId FROM BOFF_DOC_PLANTILLAS WHERE idPlantilla = ?1 LIMIT 1",
            params![template_id],
        )
        .await
    }

    async fn attachment_name(
        &self,
        template_id: i64,
        case_id: i64,
    ) -> Result<Option<String>, DatabaseError> {
        self.first_text(
            "attachment_name",
            "SELECT nombreDocAdjunto FROM APLI_EXP_DOCUMENTOS
              WHERE expedienteId = ?1 AND plantillaId = ?2
              LIMIT 1",
            params![case_id, template_id],
        )
        .await
    }

    async fn defendant_ref(
        &self,
        template_id: i64,
        case_id: i64,
    ) -> Result<Option<DefendantRef>, DatabaseError> {
        let raw = self
            .first_text(
                "defendant_ref",
                "SELECT demandadoId FROM APLI_EXP_DOCUMENTOS
                  WHERE expedienteId = ?1 AND plantillaId = ?2 AND tipoExpDocumentoId = 1
                  LIMIT 1",
                params![case_id, template_id],
            )
            .await?;
        Ok(raw.map(DefendantRef))
    }

    async fn email_body(
        &self,
        template_id: i64,
        case_id: i64,
    ) -> Result<Option<String>, DatabaseError> {
        self.first_text(
            "email_body",
            "SELECT correoPlantilla FROM APLI_EXPEDIENTES_PLANTILLA
              WHERE plantillaId = ?1 AND expedienteId = ?2
              LIMIT 1",
            params![template_id, case_id],
        )
        .await
    }
}
