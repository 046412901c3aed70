//! SFTP attachment retrieval via ssh2.
//!
//! Each fetch opens its own session, copies the remote document into a
//! fresh [`TransientAttachment`], and closes the session. ssh2 is blocking,
//! so the whole transfer runs on the blocking pool.

use std::fs::File;
use std::io;
use std::net::TcpStream;
use std::path::Path;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use ssh2::{ErrorCode, Session};
use tracing::{debug, info};

use crate::config::SftpConfig;
use crate::error::TransferError;
use crate::gateways::AttachmentSource;
use crate::pipeline::attachment::TransientAttachment;

/// `LIBSSH2_FX_NO_SUCH_FILE`.
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Session timeout for connect, auth, and reads.
const SESSION_TIMEOUT_MS: u32 = 30_000;

/// Remote location of a generated document.
pub fn remote_path(remote_dir: &str, file_name: &str) -> String {
    format!("{}/{}", remote_dir.trim_end_matches('/'), file_name)
}

/// Downloads generated documents from the document server.
pub struct SftpAttachmentSource {
    config: SftpConfig,
}

impl SftpAttachmentSource {
    pub fn new(config: SftpConfig) -> Self {
        Self { config }
    }
}

fn session_err(step: &str, e: impl std::fmt::Display) -> TransferError {
    TransferError::Session(format!("{step}: {e}"))
}

/// Blocking transfer of one document.
fn download(config: &SftpConfig, file_name: &str) -> Result<TransientAttachment, TransferError> {
    let tcp = TcpStream::connect((config.host.as_str(), config.port))
        .map_err(|e| session_err(&format!("connect {}:{}", config.host, config.port), e))?;

    let mut session = Session::new().map_err(|e| session_err("session init", e))?;
    session.set_timeout(SESSION_TIMEOUT_MS);
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|e| session_err("handshake", e))?;
    session
        .userauth_password(&config.username, config.password.expose_secret())
        .map_err(|e| session_err("authentication", e))?;

    let sftp = session.sftp().map_err(|e| session_err("sftp subsystem", e))?;
    let remote = remote_path(&config.remote_dir, file_name);
    debug!(remote = %remote, "Opening remote document");

    let mut source = sftp.open(Path::new(&remote)).map_err(|e| {
        if matches!(e.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) {
            TransferError::NotFound(remote.clone())
        } else {
            session_err(&format!("open {remote}"), e)
        }
    })?;

    let attachment = TransientAttachment::create_in(&config.download_dir, file_name)?;
    let mut target = File::create(attachment.path())?;
    let bytes = io::copy(&mut source, &mut target)?;

    // Best effort; the document is already on disk.
    let _ = session.disconnect(None, "done", None);

    info!(
        remote = %remote,
        local = %attachment.path().display(),
        bytes,
        "Attachment downloaded"
    );
    Ok(attachment)
}

#[async_trait]
impl AttachmentSource for SftpAttachmentSource {
    async fn fetch(&self, file_name: &str) -> Result<TransientAttachment, TransferError> {
        let config = self.config.clone();
        let file_name = file_name.to_string();
        tokio::task::spawn_blocking(move || download(&config, &file_name))
            .await
            .map_err(|e| TransferError::Session(format!("transfer task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn remote_path_joins_directory_and_name() {
        assert_eq!(
            remote_path("/FilesRocket/documento-generados", "memorial.pdf"),
            "/FilesRocket/documento-generados/memorial.pdf"
        );
        assert_eq!(remote_path("/docs/", "a.pdf"), "/docs/a.pdf");
    }

    #[tokio::test]
    async fn unreachable_server_is_session_error() {
        // Grab a free port, then release it so the connect is refused.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let dir = tempfile::tempdir().unwrap();
        let source = SftpAttachmentSource::new(SftpConfig {
            host: "127.0.0.1".into(),
            port,
            username: "bot".into(),
            password: SecretString::from("pw"),
            remote_dir: "/FilesRocket/documento-generados".into(),
            download_dir: dir.path().to_path_buf(),
        });

        let err = source.fetch("memorial.pdf").await.unwrap_err();
        assert!(matches!(err, TransferError::Session(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
