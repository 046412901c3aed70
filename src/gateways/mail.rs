//! SMTP dispatch via lettre: provider routing, MIME assembly, and
//! attachment filename normalization.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::config::{MailConfig, SmtpEndpoint};
use crate::error::MailError;
use crate::gateways::{AttachmentPayload, Dispatch, Mailer};

/// Plain-text fallback sent alongside HTML bodies.
pub const PLAIN_FALLBACK: &str = "Este mensaje necesita un cliente que soporte HTML.";

/// Stem used when normalization leaves nothing.
const FALLBACK_STEM: &str = "archivo";

// ── Provider routing ────────────────────────────────────────────────

/// Outbound mail provider, selected by the case label's leading letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailProfile {
    /// Labels starting with `L`.
    Gmail,
    /// Labels starting with `A`.
    Office365,
}

impl MailProfile {
    /// Resolve the provider from a case label (first character, case-insensitive).
    pub fn for_case_label(label: &str) -> Result<Self, MailError> {
        match label.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('L') => Ok(MailProfile::Gmail),
            Some('A') => Ok(MailProfile::Office365),
            _ => Err(MailError::UnknownProvider {
                label: label.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MailProfile::Gmail => "gmail",
            MailProfile::Office365 => "office365",
        }
    }
}

// ── Attachment naming ───────────────────────────────────────────────

/// Decompose (NFKD) and drop combining marks: `ñ` → `n`, `ő` → `o`.
fn strip_diacritics(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Restrict one filename component to `[A-Za-z0-9_.()-]`.
fn sanitize_component(text: &str) -> String {
    let folded = strip_diacritics(text);
    let mut out = String::with_capacity(folded.len());
    for c in folded.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '(' | ')' | '-') {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches(|c| matches!(c, '.' | '_' | ' ')).to_string()
}

/// ASCII-only filename for MIME headers, extension preserved.
///
/// `"Notificación Año 2024.pdf"` becomes `"Notificacion_Ano_2024.pdf"`.
pub fn normalize_attachment_name(file_name: &str) -> String {
    let (stem, ext) = match file_name.rfind('.') {
        Some(idx) if idx > 0 => (&file_name[..idx], &file_name[idx..]),
        _ => (file_name, ""),
    };

    let stem = sanitize_component(stem);
    let ext = sanitize_component(ext);

    let stem = if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    };
    if ext.is_empty() {
        stem
    } else {
        format!("{stem}.{ext}")
    }
}

/// Content type guessed from the file extension.
pub fn guess_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

// ── Message assembly ────────────────────────────────────────────────

/// Split a delimited address list, dropping blanks.
pub fn split_addresses(list: &str, separator: char) -> Vec<String> {
    list.split(separator)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e| MailError::InvalidAddress {
        address: address.to_string(),
        reason: format!("{e}"),
    })
}

fn attachment_part(payload: &AttachmentPayload) -> Result<SinglePart, MailError> {
    let safe_name = normalize_attachment_name(&payload.file_name);
    let content_type = ContentType::parse(guess_mime(&safe_name))
        .map_err(|e| MailError::Build(format!("content type for {safe_name}: {e}")))?;
    debug!(
        original = %payload.file_name,
        sent_as = %safe_name,
        "Attaching document"
    );
    Ok(Attachment::new(safe_name).body(payload.bytes.clone(), content_type))
}

/// Build the MIME message for a dispatch.
///
/// To and CC (comma-separated) become headers; BCC (semicolon-separated)
/// reaches the envelope only.
pub fn build_message(dispatch: &Dispatch) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .from(mailbox(&dispatch.from)?)
        .subject(dispatch.subject());

    for to in split_addresses(&dispatch.to, ',') {
        builder = builder.to(mailbox(&to)?);
    }
    if let Some(cc) = &dispatch.cc {
        for addr in split_addresses(cc, ',') {
            builder = builder.cc(mailbox(&addr)?);
        }
    }
    if let Some(bcc) = &dispatch.bcc {
        for addr in split_addresses(bcc, ';') {
            builder = builder.bcc(mailbox(&addr)?);
        }
    }

    let body = match (&dispatch.html_body, &dispatch.attachment) {
        (Some(html), Some(att)) => MultiPart::mixed()
            .multipart(MultiPart::alternative_plain_html(
                PLAIN_FALLBACK.to_string(),
                html.clone(),
            ))
            .singlepart(attachment_part(att)?),
        (Some(html), None) => MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
            PLAIN_FALLBACK.to_string(),
            html.clone(),
        )),
        (None, Some(att)) => MultiPart::mixed().singlepart(attachment_part(att)?),
        (None, None) => MultiPart::mixed().singlepart(SinglePart::plain(String::new())),
    };

    builder
        .multipart(body)
        .map_err(|e| MailError::Build(e.to_string()))
}

// ── SMTP transport ──────────────────────────────────────────────────

/// Sends notifications over STARTTLS SMTP with per-item credentials.
pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self, profile: MailProfile) -> &SmtpEndpoint {
        match profile {
            MailProfile::Gmail => &self.config.gmail,
            MailProfile::Office365 => &self.config.office365,
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, dispatch: &Dispatch) -> Result<(), MailError> {
        let message = build_message(dispatch)?;
        let endpoint = self.endpoint(dispatch.profile).clone();
        let creds = Credentials::new(
            dispatch.from.clone(),
            dispatch.password.expose_secret().to_string(),
        );

        info!(
            case = %dispatch.case_label,
            provider = dispatch.profile.as_str(),
            host = %endpoint.host,
            port = endpoint.port,
            "Connecting to SMTP relay"
        );

        // lettre's SmtpTransport is synchronous.
        tokio::task::spawn_blocking(move || {
            let transport = SmtpTransport::starttls_relay(&endpoint.host)
                .map_err(|e| MailError::Send(format!("SMTP relay error: {e}")))?
                .port(endpoint.port)
                .credentials(creds)
                .build();
            transport
                .send(&message)
                .map(|_| ())
                .map_err(|e| MailError::Send(e.to_string()))
        })
        .await
        .map_err(|e| MailError::Send(format!("send task failed: {e}")))??;

        info!(
            case = %dispatch.case_label,
            to = %dispatch.to,
            attachment = dispatch.attachment.as_ref().map(|a| a.file_name.as_str()).unwrap_or("none"),
            "Notification sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn dispatch() -> Dispatch {
        Dispatch {
            profile: MailProfile::Gmail,
            case_label: "L-2024-0042".into(),
            defendant_document: "1020304050".into(),
            defendant_name: "ANA PEREZ".into(),
            docket_number: "110014003001".into(),
            template_name: "Impulso".into(),
            from: "notificaciones@firma.co".into(),
            password: SecretString::from("pw"),
            to: "juzgado01@cendoj.ramajudicial.gov.co".into(),
            cc: Some("socio@firma.co, analista@firma.co".into()),
            bcc: Some("auditoria@firma.co; archivo@firma.co".into()),
            html_body: Some("<p>Respetado juzgado</p>".into()),
            attachment: Some(AttachmentPayload {
                file_name: "Memorial Señor Juez.pdf".into(),
                bytes: b"%PDF-1.4 test".to_vec(),
            }),
        }
    }

    // ── Provider routing ────────────────────────────────────────────

    #[test]
    fn provider_from_leading_letter() {
        assert_eq!(MailProfile::for_case_label("L-1").unwrap(), MailProfile::Gmail);
        assert_eq!(MailProfile::for_case_label("l-1").unwrap(), MailProfile::Gmail);
        assert_eq!(MailProfile::for_case_label("A-9").unwrap(), MailProfile::Office365);
        assert_eq!(MailProfile::for_case_label("abc").unwrap(), MailProfile::Office365);
    }

    #[test]
    fn unknown_provider_is_error() {
        assert!(matches!(
            MailProfile::for_case_label("X-1"),
            Err(MailError::UnknownProvider { .. })
        ));
        assert!(matches!(
            MailProfile::for_case_label(""),
            Err(MailError::UnknownProvider { .. })
        ));
    }

    // ── Filename normalization ──────────────────────────────────────

    #[test]
    fn normalize_strips_diacritics_and_spaces() {
        assert_eq!(
            normalize_attachment_name("Notificación Año 2024.pdf"),
            "Notificacion_Ano_2024.pdf"
        );
        assert_eq!(normalize_attachment_name("pingüino.docx"), "pinguino.docx");
    }

    #[test]
    fn normalize_folds_letters_beyond_spanish() {
        assert_eq!(normalize_attachment_name("Győr Kayseri ş ǎ.pdf"), "Gyor_Kayseri_s_a.pdf");
        assert_eq!(normalize_attachment_name("ﬁrma.pdf"), "firma.pdf");
    }

    #[test]
    fn normalize_collapses_and_trims() {
        assert_eq!(normalize_attachment_name("  a  &&  b .pdf"), "a_b.pdf");
        assert_eq!(normalize_attachment_name("_memorial_.txt"), "memorial.txt");
        assert_eq!(normalize_attachment_name("auto (1).pdf"), "auto_(1).pdf");
    }

    #[test]
    fn normalize_falls_back_for_empty_stem() {
        assert_eq!(normalize_attachment_name("###.pdf"), "archivo.pdf");
        assert_eq!(normalize_attachment_name(""), "archivo");
    }

    #[test]
    fn normalize_without_extension() {
        assert_eq!(normalize_attachment_name("Resolución"), "Resolucion");
    }

    #[test]
    fn mime_guess_by_extension() {
        assert_eq!(guess_mime("a.pdf"), "application/pdf");
        assert_eq!(guess_mime("a.PDF"), "application/pdf");
        assert_eq!(guess_mime("a.jpeg"), "image/jpeg");
        assert_eq!(guess_mime("a.bin"), "application/octet-stream");
        assert_eq!(guess_mime("noext"), "application/octet-stream");
    }

    // ── Message assembly ────────────────────────────────────────────

    #[test]
    fn split_addresses_drops_blanks() {
        assert_eq!(
            split_addresses(" a@x.co ,, b@y.co ", ','),
            vec!["a@x.co".to_string(), "b@y.co".to_string()]
        );
        assert!(split_addresses(" ; ", ';').is_empty());
    }

    #[test]
    fn message_headers_and_envelope() {
        let message = build_message(&dispatch()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: 1020304050_ANA PEREZ_110014003001_Impulso"));
        assert!(raw.contains("socio@firma.co"));
        assert!(raw.contains("analista@firma.co"));
        assert!(!raw.contains("auditoria@firma.co"), "BCC must not appear in headers");
        assert!(raw.contains(PLAIN_FALLBACK));
        assert!(raw.contains("Memorial_Senor_Juez.pdf"));
        assert!(raw.contains("application/pdf"));

        let recipients: Vec<String> = message
            .envelope()
            .to()
            .iter()
            .map(|a| a.to_string())
            .collect();
        assert_eq!(recipients.len(), 5);
        assert!(recipients.contains(&"auditoria@firma.co".to_string()));
        assert!(recipients.contains(&"archivo@firma.co".to_string()));
    }

    #[test]
    fn message_without_html_or_attachment() {
        let mut d = dispatch();
        d.html_body = None;
        d.attachment = None;
        d.cc = None;
        d.bcc = None;
        let message = build_message(&d).unwrap();
        assert_eq!(message.envelope().to().len(), 1);
    }

    #[test]
    fn invalid_recipient_is_rejected() {
        let mut d = dispatch();
        d.to = "not an address".into();
        assert!(matches!(
            build_message(&d),
            Err(MailError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn mailer_picks_endpoint_by_profile() {
        let mailer = SmtpMailer::new(MailConfig::default());
        assert_eq!(mailer.endpoint(MailProfile::Gmail).host, "smtp.gmail.com");
        assert_eq!(mailer.endpoint(MailProfile::Office365).host, "smtp.office365.com");
        assert_eq!(mailer.endpoint(MailProfile::Office365).port, 587);
    }
}
