//! Error types for the case notifier.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("{0}")]
    Decrypt(#[from] DecryptError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Relational store errors.
///
/// A missing row is not an error; lookups return `Ok(None)` for that.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Schema setup failed: {0}")]
    Schema(String),
}

/// Work-queue API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response payload: {0}")]
    InvalidPayload(String),

    #[error("API reported failure (code {code}): {message}")]
    Rejected { code: i64, message: String },
}

/// Attachment retrieval errors.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Remote file not found: {0}")]
    NotFound(String),

    #[error("Transfer session failed: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound mail errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Unrecognized mail provider for case label {label:?}: must start with 'L' or 'A'")]
    UnknownProvider { label: String },

    #[error("Invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP send failed: {0}")]
    Send(String),
}

/// Credential decryption errors.
///
/// Every variant renders as a "decryption failed" message; callers treat
/// them identically and only the logged cause differs.
#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("decryption failed: invalid base64 ({0})")]
    InvalidBase64(String),

    #[error("decryption failed: ciphertext length {len} is not a multiple of the block size")]
    InvalidLength { len: usize },

    #[error("decryption failed: invalid padding ({0})")]
    InvalidPadding(u8),

    #[error("decryption failed: plaintext is not valid UTF-8")]
    InvalidUtf8,
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
