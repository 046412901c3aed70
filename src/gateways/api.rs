//! Work-queue HTTP client: pending items (GET) and status updates (PUT).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::gateways::{StatusEntry, StatusReporter, WorkQueue};
use crate::pipeline::types::RawWorkItem;

/// State reported for processed items.
const DONE_STATE: &str = "Terminado";

/// Pending-items envelope returned by the API.
#[derive(Debug, Deserialize)]
struct PendingEnvelope {
    #[serde(rename = "Success", default)]
    success: bool,
    #[serde(rename = "CodeResult", default = "default_code")]
    code: i64,
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "Element", default)]
    element: Option<ElementField>,
}

fn default_code() -> i64 {
    -1
}

/// `Element` may be a list or a single object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ElementField {
    Many(Vec<RawWorkItem>),
    One(RawWorkItem),
}

/// Status-update request body.
#[derive(Debug, Serialize)]
struct StatusUpdate<'a> {
    #[serde(rename = "ExpedientesPlantillas")]
    entries: &'a [StatusEntry],
    #[serde(rename = "Estado")]
    state: &'a str,
}

/// Parse the pending-items response body.
///
/// A null or absent `Element` yields an empty list; `Success: false` is an
/// error carrying the API's code and message.
pub fn parse_pending(body: &str) -> Result<Vec<RawWorkItem>, ApiError> {
    let envelope: PendingEnvelope =
        serde_json::from_str(body).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    if !envelope.success {
        return Err(ApiError::Rejected {
            code: envelope.code,
            message: envelope.message.unwrap_or_default(),
        });
    }

    let items = match envelope.element {
        None => Vec::new(),
        Some(ElementField::Many(items)) => items,
        Some(ElementField::One(item)) => vec![item],
    };
    debug!(code = envelope.code, count = items.len(), "Parsed pending-items response");
    Ok(items)
}

/// HTTP client for the upstream work queue.
pub struct HttpWorkQueue {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpWorkQueue {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::RequestFailed {
                url: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl WorkQueue for HttpWorkQueue {
    async fn pending_items(&self) -> Result<Vec<RawWorkItem>, ApiError> {
        let url = self.config.pending_url();
        debug!(url = %url, "Fetching pending items");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| ApiError::RequestFailed {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(ApiError::HttpStatus {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let items = parse_pending(&body)?;
        info!(count = items.len(), "Pending items fetched");
        Ok(items)
    }
}

#[async_trait]
impl StatusReporter for HttpWorkQueue {
    async fn mark_done(&self, entries: &[StatusEntry]) -> Result<(), ApiError> {
        if entries.is_empty() {
            return Ok(());
        }

        let url = self.config.status_url();
        let payload = StatusUpdate {
            entries,
            state: DONE_STATE,
        };
        debug!(url = %url, count = entries.len(), "Sending status update");

        let resp = self
            .client
            .put(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Status update rejected");
            return Err(ApiError::HttpStatus {
                url,
                status: status.as_u16(),
                body,
            });
        }

        info!(count = entries.len(), "Status updated upstream");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    // ── Payload parsing ─────────────────────────────────────────────

    #[test]
    fn parse_list_of_elements() {
        let body = r#"{
            "Success": true, "CodeResult": 200, "Message": "OK",
            "Element": [
                {"IdExpediente": 1, "Expediente": "L-1", "IdTipoProceso": 1, "IdPlantilla": 7},
                {"IdExpediente": 2, "Expediente": "A-2", "IdTipoProceso": 1, "IdPlantilla": 8}
            ]
        }"#;
        let items = parse_pending(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].case_label.as_deref(), Some("A-2"));
    }

    #[test]
    fn parse_single_element_object() {
        let body = r#"{"Success": true, "CodeResult": 200, "Element": {"IdExpediente": 5, "Expediente": "L-5"}}"#;
        let items = parse_pending(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].case_id, 5);
    }

    #[test]
    fn parse_null_element_is_empty() {
        let body = r#"{"Success": true, "CodeResult": 200, "Message": "sin datos", "Element": null}"#;
        assert!(parse_pending(body).unwrap().is_empty());
    }

    #[test]
    fn parse_unsuccessful_envelope() {
        let body = r#"{"Success": false, "CodeResult": 500, "Message": "fallo interno"}"#;
        match parse_pending(body).unwrap_err() {
            ApiError::Rejected { code, message } => {
                assert_eq!(code, 500);
                assert_eq!(message, "fallo interno");
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn parse_missing_success_is_rejection() {
        let err = parse_pending("{}").unwrap_err();
        assert!(matches!(err, ApiError::Rejected { code: -1, .. }));
    }

    #[test]
    fn parse_invalid_json() {
        assert!(matches!(
            parse_pending("not json").unwrap_err(),
            ApiError::InvalidPayload(_)
        ));
    }

    #[test]
    fn status_update_body_shape() {
        let entries = vec![StatusEntry {
            case_id: "42".into(),
            template_id: "7".into(),
            defendant_ref: "5501".into(),
        }];
        let json = serde_json::to_value(StatusUpdate {
            entries: &entries,
            state: DONE_STATE,
        })
        .unwrap();
        assert_eq!(json["Estado"], "Terminado");
        assert_eq!(json["ExpedientesPlantillas"][0]["ExpedienteId"], "42");
    }

    // ── HTTP round-trips against a one-shot local server ────────────

    /// Serve a single canned HTTP response; return the base URL and a
    /// handle yielding the raw request text.
    async fn one_shot_server(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let mut request = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .and_then(|v| v.trim().parse::<usize>().ok())
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://127.0.0.1:{port}"), handle)
    }

    fn config_for(base_url: String) -> ApiConfig {
        ApiConfig {
            base_url,
            timeout: Duration::from_secs(5),
            ..ApiConfig::default()
        }
    }

    #[tokio::test]
    async fn pending_items_over_http() {
        let (url, server) = one_shot_server(
            "200 OK",
            r#"{"Success": true, "CodeResult": 200, "Element": [{"IdExpediente": 3, "Expediente": "L-3"}]}"#,
        )
        .await;
        let queue = HttpWorkQueue::new(config_for(url)).unwrap();

        let items = queue.pending_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].case_id, 3);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /bot-plantillas-pendiente"));
    }

    #[tokio::test]
    async fn pending_items_http_error() {
        let (url, _server) = one_shot_server("503 Service Unavailable", "{}").await;
        let queue = HttpWorkQueue::new(config_for(url)).unwrap();

        let err = queue.pending_items().await.unwrap_err();
        assert!(matches!(err, ApiError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn mark_done_puts_payload() {
        let (url, server) = one_shot_server("200 OK", "true").await;
        let queue = HttpWorkQueue::new(config_for(url)).unwrap();

        let entries = vec![StatusEntry {
            case_id: "42".into(),
            template_id: "7".into(),
            defendant_ref: "5501".into(),
        }];
        queue.mark_done(&entries).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("PUT /expediente-estadobotplantilla"));
        assert!(request.contains("\"Estado\":\"Terminado\""));
        assert!(request.contains("\"DemandadoId\":\"5501\""));
    }

    #[tokio::test]
    async fn mark_done_non_200_is_error() {
        let (url, _server) = one_shot_server("400 Bad Request", "{}").await;
        let queue = HttpWorkQueue::new(config_for(url)).unwrap();

        let entries = vec![StatusEntry {
            case_id: "1".into(),
            template_id: "1".into(),
            defendant_ref: "1".into(),
        }];
        let err = queue.mark_done(&entries).await.unwrap_err();
        assert!(matches!(err, ApiError::HttpStatus { status: 400, .. }));
    }

    #[tokio::test]
    async fn mark_done_empty_is_noop() {
        let queue = HttpWorkQueue::new(config_for("http://127.0.0.1:1".into())).unwrap();
        queue.mark_done(&[]).await.unwrap();
    }
}
