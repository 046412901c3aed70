//! Version-tracked schema setup for local and in-memory case stores.
//!
//! The upstream SQL Server database is never written to. A libSQL mirror
//! file (or an in-memory database in tests) gets the same tables so the
//! lookups in `libsql_backend` run unchanged against it.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "case_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS INFORME_JURIDICO (
                ID_EXPEDIENTE INTEGER NOT NULL,
                DEMANDADO1_NOMBRE TEXT,
                DEMANDADO1_DOCUMENTO TEXT,
                DEMANDADO2_NOMBRE TEXT,
                DEMANDADO2_DOCUMENTO TEXT,
                DEMANDADO3_NOMBRE TEXT,
                DEMANDADO3_DOCUMENTO TEXT,
                DEMANDADO4_NOMBRE TEXT,
                DEMANDADO4_DOCUMENTO TEXT,
                RADICADO_LARGO TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_informe_expediente ON INFORME_JURIDICO(ID_EXPEDIENTE);

            CREATE TABLE IF NOT EXISTS APLI_JUZGADOS (
                idJuzgado INTEGER PRIMARY KEY,
                correoElectronico
            );

            CREATE TABLE IF NOT EXISTS APLI_JUZGADO_EXPEDIENTES (
                juzgadoId INTEGER NOT NULL,
                expedienteId INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_juzgado_expedientes ON APLI_JUZGADO_EXPEDIENTES(expedienteId);

            CREATE TABLE IF NOT EXISTS BOFF_DOC_PLANTILLAS (
                idPlantilla INTEGER PRIMARY KEY,
                nombrePlantilla TEXT,
                tipoPlantillaId
            );

            CREATE TABLE IF NOT EXISTS APLI_EXPEDIENTES_PLANTILLA (
                plantillaId INTEGER NOT NULL,
                expedienteId INTEGER NOT NULL,
                correoPlantilla TEXT
            );

            CREATE TABLE IF NOT EXISTS APLI_EXP_DOCUMENTOS (
                expedienteId INTEGER NOT NULL,
                plantillaId INTEGER NOT NULL,
                tipoExpDocumentoId INTEGER,
                demandadoId,
                nombreDocAdjunto TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_exp_documentos ON APLI_EXP_DOCUMENTOS(expedienteId, plantillaId);
        "#,
    },
];

/// Apply every migration newer than the recorded version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Schema(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Schema(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            conn.execute(
                "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
                libsql::params![migration.version, migration.name],
            )
            .await
            .map_err(|e| {
                DatabaseError::Schema(format!("Failed to record migration V{}: {e}", migration.version))
            })?;
        }
    }

    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Schema(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Schema(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Schema(format!("Failed to parse migration version: {e}"))),
        None => Ok(0),
    }
}
