//! Configuration types, built from `CASE_NOTIFIER_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

const ENV_PREFIX: &str = "CASE_NOTIFIER_";

// ── Sections ────────────────────────────────────────────────────────

/// Work-queue API endpoints.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub pending_path: String,
    pub status_path: String,
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rocketvel.ai/backend/api/Externo".to_string(),
            pending_path: "bot-plantillas-pendiente".to_string(),
            status_path: "expediente-estadobotplantilla".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    fn join(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// GET endpoint listing pending items.
    pub fn pending_url(&self) -> String {
        self.join(&self.pending_path)
    }

    /// PUT endpoint for status updates.
    pub fn status_url(&self) -> String {
        self.join(&self.status_path)
    }
}

/// Where the case database lives.
#[derive(Debug, Clone)]
pub enum DatabaseConfig {
    /// Remote libSQL server (`libsql://` or `https://`).
    Remote { url: String, auth_token: SecretString },
    /// Local database file.
    Local { path: PathBuf },
}

/// Document server connection.
#[derive(Debug, Clone)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub remote_dir: String,
    /// Local directory for transient downloads.
    pub download_dir: PathBuf,
}

/// One SMTP relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpEndpoint {
    pub host: String,
    pub port: u16,
}

/// SMTP relays per provider. Credentials come with each work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub gmail: SmtpEndpoint,
    pub office365: SmtpEndpoint,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            gmail: SmtpEndpoint {
                host: "smtp.gmail.com".to_string(),
                port: 587,
            },
            office365: SmtpEndpoint {
                host: "smtp.office365.com".to_string(),
                port: 587,
            },
        }
    }
}

/// Logging outputs and verbosity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub dir: PathBuf,
    pub debug_logs: bool,
    pub min_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./logs"),
            debug_logs: true,
            min_level: "info".to_string(),
        }
    }
}

/// Window in which the notifier is allowed to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessHoursConfig {
    pub enabled: bool,
    /// Inclusive.
    pub start_hour: u32,
    /// Exclusive.
    pub end_hour: u32,
    pub weekdays: Vec<chrono::Weekday>,
    pub utc_offset_hours: i32,
}

impl Default for BusinessHoursConfig {
    fn default() -> Self {
        use chrono::Weekday::*;
        Self {
            enabled: true,
            start_hour: 8,
            end_hour: 17,
            weekdays: vec![Mon, Tue, Wed, Thu, Fri],
            utc_offset_hours: -5,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub sftp: SftpConfig,
    pub mail: MailConfig,
    pub log: LogConfig,
    pub business_hours: BusinessHoursConfig,
    /// Key material for credential decryption.
    pub shared_secret: SecretString,
}

// ── Loading ─────────────────────────────────────────────────────────

fn env_key(name: &str) -> String {
    format!("{ENV_PREFIX}{name}")
}

/// Typed access to prefixed variables through a lookup function.
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(env_key(name).as_str())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name)
            .ok_or_else(|| ConfigError::MissingEnvVar(env_key(name)))
    }

    /// Secrets are taken verbatim; surrounding whitespace is part of the value.
    fn secret(&self, name: &str) -> Result<SecretString, ConfigError> {
        (self.lookup)(env_key(name).as_str())
            .filter(|v| !v.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(env_key(name)))
    }

    fn parsed<T>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: env_key(name),
                message: format!("{raw:?}: {e}"),
            }),
        }
    }

    fn flag(&self, name: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(name) {
            None => Ok(default),
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: env_key(name),
                message: format!("{raw:?} is not a boolean"),
            }),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let api_defaults = ApiConfig::default();
        let api = ApiConfig {
            base_url: env
                .optional("API_BASE_URL")
                .unwrap_or(api_defaults.base_url),
            timeout: Duration::from_secs(env.parsed("API_TIMEOUT_SECS", 30u64)?),
            ..api_defaults
        };

        let db_url = env.required("DB_URL")?;
        let database = if db_url.starts_with("libsql://") || db_url.starts_with("https://") {
            DatabaseConfig::Remote {
                url: db_url,
                auth_token: env.secret("DB_AUTH_TOKEN")?,
            }
        } else {
            DatabaseConfig::Local {
                path: PathBuf::from(db_url),
            }
        };

        let sftp = SftpConfig {
            host: env.required("SFTP_HOST")?,
            port: env.parsed("SFTP_PORT", 22u16)?,
            username: env.required("SFTP_USERNAME")?,
            password: env.secret("SFTP_PASSWORD")?,
            remote_dir: env
                .optional("SFTP_REMOTE_DIR")
                .unwrap_or_else(|| "/FilesRocket/documento-generados".to_string()),
            download_dir: env
                .optional("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        };

        let mail_defaults = MailConfig::default();
        let mail = MailConfig {
            gmail: SmtpEndpoint {
                host: env
                    .optional("SMTP_L_HOST")
                    .unwrap_or(mail_defaults.gmail.host),
                port: env.parsed("SMTP_L_PORT", mail_defaults.gmail.port)?,
            },
            office365: SmtpEndpoint {
                host: env
                    .optional("SMTP_A_HOST")
                    .unwrap_or(mail_defaults.office365.host),
                port: env.parsed("SMTP_A_PORT", mail_defaults.office365.port)?,
            },
        };

        let min_level = env
            .optional("MIN_LOG_LEVEL")
            .unwrap_or_else(|| "info".to_string())
            .to_ascii_lowercase();
        if !LOG_LEVELS.contains(&min_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: env_key("MIN_LOG_LEVEL"),
                message: format!("{min_level:?} is not one of {}", LOG_LEVELS.join(", ")),
            });
        }
        let log = LogConfig {
            dir: env
                .optional("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./logs")),
            debug_logs: env.flag("DEBUG_LOGS", true)?,
            min_level,
        };

        let business_hours = BusinessHoursConfig {
            enabled: env.flag("BUSINESS_HOURS", true)?,
            ..BusinessHoursConfig::default()
        };

        let shared_secret = env.secret("SHARED_SECRET")?;

        Ok(Self {
            api,
            database,
            sftp,
            mail,
            log,
            business_hours,
            shared_secret,
        })
    }
}
