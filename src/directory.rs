//! QRZ.com XML directory client.
//!
//! A lookup is two sequential HTTP GETs against the same endpoint:
//!
//! 1. `?username=..&password=..&agent=..` returns a `<Session>` carrying a
//!    `<Key>` (or an `<Error>`).
//! 2. `?s=KEY&callsign=CALL` returns a `<Callsign>` element whose children
//!    are the station's public fields.
//!
//! Session keys are not cached; every lookup authenticates afresh.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// QRZ.com XML data service endpoint.
pub const QRZ_XML_URL: &str = "https://xmldata.qrz.com/xml/current/";

/// Agent string reported to the directory service.
pub const DEFAULT_AGENT: &str = concat!("qso-relay-", env!("CARGO_PKG_VERSION"));

/// Timeout for each HTTP request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest biography shown in the station summary.
const BIO_SUMMARY_CHARS: usize = 200;

/// Errors that can end a directory lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The service rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The response was not well-formed XML.
    #[error("Malformed response: {0}")]
    Protocol(String),

    /// HTTP or network failure. `status` is set for non-success responses.
    #[error("{message}")]
    Transport { status: Option<u16>, message: String },

    /// No record exists for the callsign.
    #[error("{0}")]
    NotFound(String),

    /// Informational text from the service in place of a record.
    #[error("{0}")]
    ServiceMessage(String),
}

/// Progress of a single lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupState {
    Idle,
    Authenticating,
    Querying,
    Succeeded,
    Failed,
}

/// Public station details returned by the directory.
///
/// Field names are the service's tag names (`fname`, `addr2`, `grid`, ...).
/// Fields the service did not return are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DirectoryRecord {
    fields: BTreeMap<String, String>,
}

impl DirectoryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// First and last name joined, if either is present.
    pub fn name(&self) -> Option<String> {
        self.joined(&["fname", "name"], " ")
    }

    /// Mailing address lines joined with commas.
    pub fn address(&self) -> Option<String> {
        self.joined(&["addr1", "addr2", "state", "zip"], ", ")
    }

    pub fn country(&self) -> Option<&str> {
        self.get("country")
    }

    /// Maidenhead grid locator.
    pub fn grid(&self) -> Option<&str> {
        self.get("grid")
    }

    pub fn email(&self) -> Option<&str> {
        self.get("email")
    }

    pub fn bio(&self) -> Option<&str> {
        self.get("bio")
    }

    /// URL of the station photo.
    pub fn image(&self) -> Option<&str> {
        self.get("image").filter(|url| !url.is_empty())
    }

    fn joined(&self, names: &[&str], separator: &str) -> Option<String> {
        let parts: Vec<&str> = names.iter().filter_map(|n| self.get(n)).collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(separator))
        }
    }

    /// Human-readable lines for a station panel.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(name) = self.name() {
            lines.push(format!("Name: {}", name));
        }
        if let Some(address) = self.address() {
            lines.push(format!("Address: {}", address));
        }
        if let Some(country) = self.country() {
            lines.push(format!("Country: {}", country));
        }
        if let Some(grid) = self.grid() {
            lines.push(format!("Grid: {}", grid));
        }
        if let Some(email) = self.email() {
            lines.push(format!("Email: {}", email));
        }
        if let Some(bio) = self.bio().filter(|b| !b.is_empty()) {
            if bio.chars().count() > BIO_SUMMARY_CHARS {
                let short: String = bio.chars().take(BIO_SUMMARY_CHARS).collect();
                lines.push(format!("Bio: {}...", short));
            } else {
                lines.push(format!("Bio: {}", bio));
            }
        }

        lines
    }
}

/// A source of station records, keyed by callsign.
pub trait Directory: Send + Sync + 'static {
    /// Whether credentials are configured so that a lookup can be attempted.
    fn is_configured(&self) -> bool;

    /// Resolve a callsign to its station record.
    fn lookup(
        &self,
        callsign: &str,
    ) -> impl Future<Output = Result<DirectoryRecord, LookupError>> + Send;
}

/// Configuration for the directory client.
#[derive(Clone)]
pub struct DirectoryConfig {
    /// Endpoint URL; both requests go to the same URL.
    pub base_url: String,

    pub username: String,

    pub password: String,

    /// Client identifier sent with the login request.
    pub agent: String,

    /// Timeout for each HTTP request.
    pub request_timeout: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: QRZ_XML_URL.to_string(),
            username: String::new(),
            password: String::new(),
            agent: DEFAULT_AGENT.to_string(),
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

impl DirectoryConfig {
    /// Create a configuration with the given credentials.
    pub fn with_credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into().trim().to_string(),
            password: password.into().trim().to_string(),
            ..Default::default()
        }
    }

    /// Point the client at a different endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// The password must never reach a log line.
impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("agent", &self.agent)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// HTTP client for the QRZ.com XML service.
#[derive(Debug)]
pub struct DirectoryClient {
    config: DirectoryConfig,
    http: reqwest::Client,
}

impl DirectoryClient {
    pub fn new(config: DirectoryConfig) -> Result<Self, LookupError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LookupError::Transport {
                status: None,
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { config, http })
    }

    /// Obtain a session key.
    pub async fn authenticate(&self) -> Result<String, LookupError> {
        info!("Authenticating with directory as {}", self.config.username);
        let body = self
            .fetch(&[
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
                ("agent", self.config.agent.as_str()),
            ])
            .await?;
        parse_session_response(&body)
    }

    /// Fetch the record for `callsign` using an existing session key.
    pub async fn query(
        &self,
        session_key: &str,
        callsign: &str,
    ) -> Result<DirectoryRecord, LookupError> {
        debug!("Querying directory for {}", callsign);
        let body = self
            .fetch(&[("s", session_key), ("callsign", callsign)])
            .await?;
        parse_callsign_response(&body, callsign)
    }

    /// Run a full lookup, reporting each state transition to `observe`.
    pub async fn lookup_observed<F>(
        &self,
        callsign: &str,
        mut observe: F,
    ) -> Result<DirectoryRecord, LookupError>
    where
        F: FnMut(LookupState) + Send,
    {
        let callsign = callsign.trim().to_uppercase();

        observe(LookupState::Authenticating);
        let session_key = match self.authenticate().await {
            Ok(key) => key,
            Err(e) => {
                warn!("Directory login failed: {}", e);
                observe(LookupState::Failed);
                return Err(e);
            }
        };

        observe(LookupState::Querying);
        match self.query(&session_key, &callsign).await {
            Ok(record) => {
                info!("Directory returned {} fields for {}", record.len(), callsign);
                observe(LookupState::Succeeded);
                Ok(record)
            }
            Err(e) => {
                debug!("Directory query for {} failed: {}", callsign, e);
                observe(LookupState::Failed);
                Err(e)
            }
        }
    }

    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, LookupError> {
        let response = self
            .http
            .get(&self.config.base_url)
            .query(params)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Transport {
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status),
            });
        }

        response.text().await.map_err(transport_error)
    }
}

impl Directory for DirectoryClient {
    fn is_configured(&self) -> bool {
        !self.config.username.is_empty() && !self.config.password.is_empty()
    }

    async fn lookup(&self, callsign: &str) -> Result<DirectoryRecord, LookupError> {
        self.lookup_observed(callsign, |_| {}).await
    }
}

/// Convert a reqwest error, dropping the URL since it carries credentials.
fn transport_error(e: reqwest::Error) -> LookupError {
    let message = if e.is_timeout() {
        "Request timed out".to_string()
    } else {
        format!("Network error: {}", e.without_url())
    };
    LookupError::Transport {
        status: None,
        message,
    }
}

fn is_named(node: &roxmltree::Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child_text<'a>(node: &roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|child| is_named(child, name))
        .map(|child| child.text().unwrap_or("").trim())
}

fn parse_document(body: &str) -> Result<roxmltree::Document<'_>, LookupError> {
    roxmltree::Document::parse(body).map_err(|e| LookupError::Protocol(e.to_string()))
}

/// Extract the session key from a login response.
pub fn parse_session_response(body: &str) -> Result<String, LookupError> {
    let doc = parse_document(body)?;

    let Some(session) = doc.descendants().find(|n| is_named(n, "Session")) else {
        return Err(LookupError::Authentication(
            "No session element in response".to_string(),
        ));
    };

    if let Some(key) = child_text(&session, "Key").filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    if let Some(error) = child_text(&session, "Error") {
        return Err(LookupError::Authentication(error.to_string()));
    }
    let message = child_text(&session, "Message").unwrap_or("No session key found in response");
    Err(LookupError::Authentication(message.to_string()))
}

/// Flatten the `<Callsign>` element of a query response into a record.
pub fn parse_callsign_response(body: &str, callsign: &str) -> Result<DirectoryRecord, LookupError> {
    let doc = parse_document(body)?;
    let mut record = DirectoryRecord::new();

    if let Some(element) = doc.descendants().find(|n| is_named(n, "Callsign")) {
        for child in element.children().filter(|c| c.is_element()) {
            let text = child.text().unwrap_or("").trim();
            if !text.is_empty() {
                record.insert(child.tag_name().name(), text);
            }
        }
    }

    if !record.is_empty() {
        return Ok(record);
    }

    let find_text = |name: &str| {
        doc.descendants()
            .find(|n| is_named(n, name))
            .map(|n| n.text().unwrap_or("").trim().to_string())
    };
    if let Some(error) = find_text("Error") {
        return Err(LookupError::NotFound(error));
    }
    if let Some(message) = find_text("Message") {
        return Err(LookupError::ServiceMessage(message));
    }
    Err(LookupError::NotFound(format!("No data found for {}", callsign)))
}
