//! Case store: read-only lookups over the case database.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlCaseStore;
pub use traits::CaseStore;
