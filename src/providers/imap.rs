//! Email provider: raw IMAP over rustls for reading, SMTP via lettre for sending.

use std::io::Write as IoWrite;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use mail_parser::{MessageParser, MimeHeaders};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use super::EmailProvider;
use crate::error::ProviderError;

const PROVIDER: &str = "email";

// ── Configuration ───────────────────────────────────────────────────

/// Email provider configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    pub mailbox: String,
}

impl EmailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `EMAIL_IMAP_HOST` is not set (provider disabled).
    pub fn from_env() -> Option<Self> {
        let imap_host = std::env::var("EMAIL_IMAP_HOST").ok()?;

        let imap_port: u16 = std::env::var("EMAIL_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let smtp_host =
            std::env::var("EMAIL_SMTP_HOST").unwrap_or_else(|_| imap_host.replace("imap", "smtp"));

        let smtp_port: u16 = std::env::var("EMAIL_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("EMAIL_USERNAME").unwrap_or_default();
        let password = SecretString::from(std::env::var("EMAIL_PASSWORD").unwrap_or_default());
        let from_address = std::env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());
        let mailbox = std::env::var("EMAIL_MAILBOX").unwrap_or_else(|_| "INBOX".to_string());

        Some(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
            mailbox,
        })
    }
}

// ── Provider ────────────────────────────────────────────────────────

pub struct ImapEmailProvider {
    config: EmailConfig,
}

impl ImapEmailProvider {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn send_blocking(config: &EmailConfig, to: &str, subject: &str, body: &str) -> Result<(), ProviderError> {
        let send_failed = |reason: String| ProviderError::SendFailed {
            name: PROVIDER.into(),
            reason,
        };

        let creds = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let transport = SmtpTransport::starttls_relay(&config.smtp_host)
            .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        let to_mailbox: lettre::message::Mailbox =
            to.parse().map_err(|_| ProviderError::UnknownRecipient {
                name: PROVIDER.into(),
                recipient: to.to_string(),
            })?;

        let email = lettre::Message::builder()
            .from(
                config
                    .from_address
                    .parse()
                    .map_err(|e| send_failed(format!("Invalid from address: {e}")))?,
            )
            .to(to_mailbox)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| send_failed(format!("Failed to build email: {e}")))?;

        transport
            .send(&email)
            .map_err(|e| send_failed(format!("SMTP send failed: {e}")))?;

        tracing::info!(to, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for ImapEmailProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_latest(&self, limit: usize) -> Result<Vec<serde_json::Value>, ProviderError> {
        let cfg = self.config.clone();
        let fetched = tokio::task::spawn_blocking(move || fetch_latest_imap(&cfg, limit))
            .await
            .map_err(|e| ProviderError::FetchFailed {
                name: PROVIDER.into(),
                reason: format!("IMAP task panicked: {e}"),
            })?
            .map_err(|e| {
                if e.downcast_ref::<LoginRejected>().is_some() {
                    ProviderError::AuthFailed {
                        name: PROVIDER.into(),
                    }
                } else {
                    ProviderError::FetchFailed {
                        name: PROVIDER.into(),
                        reason: e.to_string(),
                    }
                }
            })?;

        tracing::info!(count = fetched.len(), host = %self.config.imap_host, "Fetched emails over IMAP");
        Ok(fetched.into_iter().map(FetchedEmail::into_record).collect())
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ProviderError> {
        let cfg = self.config.clone();
        let (to, subject, body) = (to.to_string(), subject.to_string(), body.to_string());
        tokio::task::spawn_blocking(move || Self::send_blocking(&cfg, &to, &subject, &body))
            .await
            .map_err(|e| ProviderError::SendFailed {
                name: PROVIDER.into(),
                reason: format!("SMTP task panicked: {e}"),
            })?
    }
}

// ── Helpers (public for testing) ────────────────────────────────────

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether the untagged FETCH lines report `\Seen`.
///
/// FLAGS may come before the literal (first line) or after it (closing
/// line), depending on the server.
pub fn has_seen_flag(lines: &[String]) -> bool {
    let first = lines.first().map(String::as_str).unwrap_or_default();
    let closing = lines.iter().skip(1).last().map(String::as_str).unwrap_or_default();
    [first, closing]
        .iter()
        .any(|l| l.contains("FLAGS") && l.contains("\\Seen"))
}

/// Message ids from `* SEARCH` lines, keeping the last `limit`.
pub fn latest_ids(search_lines: &[String], limit: usize) -> Vec<String> {
    let ids: Vec<String> = search_lines
        .iter()
        .filter(|l| l.starts_with("* SEARCH"))
        .flat_map(|l| l.split_whitespace().skip(2).map(str::to_string))
        .collect();
    let start = ids.len().saturating_sub(limit);
    ids[start..].to_vec()
}

fn extract_sender(parsed: &mail_parser::Message) -> Option<String> {
    let addr = parsed.from()?.first()?;
    match (addr.name(), addr.address()) {
        (Some(name), Some(address)) => Some(format!("{name} <{address}>")),
        (None, Some(address)) => Some(address.to_string()),
        (Some(name), None) => Some(name.to_string()),
        (None, None) => None,
    }
}

/// Extract readable text from a parsed email.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    for part in parsed.attachments() {
        let part: &mail_parser::MessagePart = part;
        if let Some(ct) = MimeHeaders::content_type(part)
            && ct.ctype() == "text"
            && let Ok(text) = std::str::from_utf8(part.contents())
        {
            return text.to_string();
        }
    }
    String::new()
}

#[derive(Debug)]
struct FetchedEmail {
    id: Option<String>,
    from: Option<String>,
    subject: String,
    body: String,
    unread: bool,
}

impl FetchedEmail {
    fn into_record(self) -> serde_json::Value {
        let mut record = json!({
            "subject": self.subject,
            "body": self.body,
            "unread": self.unread,
        });
        if let Some(from) = self.from {
            record["from"] = json!(from);
        }
        if let Some(id) = self.id {
            record["id"] = json!(id);
        }
        record
    }
}

type ImapError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
#[error("IMAP login rejected")]
struct LoginRejected;

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// One command's response: protocol lines plus any literals, kept as raw
/// bytes so 8-bit message bodies reach the MIME parser undecoded.
#[derive(Debug, Default)]
struct Response {
    lines: Vec<String>,
    literals: Vec<Vec<u8>>,
}

fn read_line_bytes<R: std::io::Read>(reader: &mut R) -> Result<Vec<u8>, ImapError> {
    let mut buf = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        match reader.read(&mut byte) {
            Ok(0) => return Err("IMAP connection closed".into()),
            Ok(_) => {
                buf.push(byte[0]);
                if buf.ends_with(b"\r\n") {
                    return Ok(buf);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Byte count announced by a line ending in `{N}`.
fn literal_len(line: &[u8]) -> Option<usize> {
    let rest = line.strip_suffix(b"\r\n")?.strip_suffix(b"}")?;
    let open = rest.iter().rposition(|&b| b == b'{')?;
    std::str::from_utf8(&rest[open + 1..]).ok()?.parse().ok()
}

fn read_response<R: std::io::Read>(reader: &mut R, tag: &str) -> Result<Response, ImapError> {
    let mut response = Response::default();
    loop {
        let raw = read_line_bytes(reader)?;
        if let Some(len) = literal_len(&raw) {
            let mut literal = vec![0u8; len];
            reader.read_exact(&mut literal)?;
            response.literals.push(literal);
        }
        let line = String::from_utf8_lossy(&raw).into_owned();
        let done = line.starts_with(tag);
        response.lines.push(line);
        if done {
            return Ok(response);
        }
    }
}

fn send_cmd(tls: &mut TlsStream, tag: &str, cmd: &str) -> Result<Response, ImapError> {
    let full = format!("{tag} {cmd}\r\n");
    IoWrite::write_all(tls, full.as_bytes())?;
    IoWrite::flush(tls)?;
    read_response(tls, tag)
}

/// Fetch the latest `limit` emails via raw IMAP over TLS (blocking; run in
/// spawn_blocking). The mailbox is opened read-only and bodies are fetched
/// with `BODY.PEEK[]`, so unread state is left untouched.
fn fetch_latest_imap(config: &EmailConfig, limit: usize) -> Result<Vec<FetchedEmail>, ImapError> {
    let tcp = TcpStream::connect((&*config.imap_host, config.imap_port))?;
    tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls::pki_types::ServerName::try_from(config.imap_host.clone())?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)?;
    let mut tls = rustls::StreamOwned::new(conn, tcp);

    let _greeting = read_line_bytes(&mut tls)?;

    let login_resp = send_cmd(
        &mut tls,
        "A1",
        &format!(
            "LOGIN \"{}\" \"{}\"",
            config.username,
            config.password.expose_secret()
        ),
    )?;
    if !login_resp.lines.last().is_some_and(|l| l.contains("OK")) {
        return Err(Box::new(LoginRejected));
    }

    let examine = send_cmd(&mut tls, "A2", &format!("EXAMINE \"{}\"", config.mailbox))?;
    if !examine.lines.last().is_some_and(|l| l.contains("OK")) {
        return Err(format!("cannot open mailbox {}", config.mailbox).into());
    }

    let search_resp = send_cmd(&mut tls, "A3", "SEARCH ALL")?;
    let ids = latest_ids(&search_resp.lines, limit);

    let parser = MessageParser::default();
    let mut results = Vec::with_capacity(ids.len());
    let mut tag_counter = 4_u32;

    for id in &ids {
        let fetch_tag = format!("A{tag_counter}");
        tag_counter += 1;
        let fetch_resp = send_cmd(&mut tls, &fetch_tag, &format!("FETCH {id} (FLAGS BODY.PEEK[])"))?;
        let untagged = &fetch_resp.lines[..fetch_resp.lines.len().saturating_sub(1)];

        let Some(parsed) = fetch_resp.literals.first().and_then(|raw| parser.parse(raw.as_slice())) else {
            tracing::warn!(id = %id, "Skipping unparsable email");
            continue;
        };

        results.push(FetchedEmail {
            id: parsed.message_id().map(str::to_string),
            from: extract_sender(&parsed),
            subject: parsed.subject().unwrap_or_default().to_string(),
            body: extract_text(&parsed),
            unread: !has_seen_flag(untagged),
        });
    }

    let logout_tag = format!("A{tag_counter}");
    let _ = send_cmd(&mut tls, &logout_tag, "LOGOUT");

    Ok(results)
}

// ── Tests ───────────────────────────────────────────────────────────
