// SPDX-License-Identifier: GPL-3.0-only

//! Product lookup against the ean-search.org API
//!
//! Every request resolves to exactly one [`LookupOutcome`]; failures are
//! outcomes too, nothing here is fatal and nothing is retried.

use crate::config::{Config, Credential};
use crate::constants::{api, app_info};
use crate::errors::{AppError, AppResult};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// One product code to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub code: String,
    /// Token at the time the request was issued, `None` when unset
    pub credential: Option<String>,
}

impl LookupRequest {
    pub fn new(code: impl Into<String>, credential: Option<String>) -> Self {
        Self {
            code: code.into(),
            credential: credential.filter(|token| !token.trim().is_empty()),
        }
    }
}

/// Classified result of a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// No token configured, nothing was sent
    NoCredential,
    /// Product name from the first record
    Found(String),
    /// The service rejected the token
    InvalidCredential,
    /// Well-formed answer without a usable record
    NotFound,
    /// Network failure or unparseable answer
    TransportError(String),
}

impl LookupOutcome {
    /// Single line description, prefixed with the code
    pub fn describe(&self, code: &str) -> String {
        match self {
            LookupOutcome::NoCredential => {
                format!("EAN {}: No API token for name lookup", code)
            }
            LookupOutcome::Found(name) => {
                format!("EAN {}: {} <{}>", code, name, api::product_page_url(code))
            }
            LookupOutcome::InvalidCredential => format!(
                "EAN {}: Invalid API token (get one at {})",
                code,
                api::TOKEN_SIGNUP_URL
            ),
            LookupOutcome::NotFound => format!("EAN {}: Product not found", code),
            LookupOutcome::TransportError(message) => {
                format!("EAN {}: Lookup failed: {}", code, message)
            }
        }
    }
}

/// A completed lookup, tagged with its code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub code: String,
    pub outcome: LookupOutcome,
}

/// Classify a raw response body
///
/// Checked in order: the service's textual token error, then the first
/// record's `name`. A body that is not JSON is a transport error.
pub fn classify_body(body: &str) -> LookupOutcome {
    if body.contains("error") && body.contains("Invalid token") {
        return LookupOutcome::InvalidCredential;
    }

    match serde_json::from_str::<Value>(body) {
        Ok(doc) => match first_product_name(&doc) {
            Some(name) => LookupOutcome::Found(name),
            None => LookupOutcome::NotFound,
        },
        Err(e) => LookupOutcome::TransportError(format!("Malformed response: {}", e)),
    }
}

fn first_product_name(doc: &Value) -> Option<String> {
    let name = doc.as_array()?.first()?.get("name")?.as_str()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Asynchronous lookup client
///
/// Cheap to clone; clones share the HTTP connection pool and the credential.
#[derive(Debug, Clone)]
pub struct LookupClient {
    http: reqwest::Client,
    base_url: String,
    credential: Credential,
}

impl LookupClient {
    pub fn new(base_url: &str, timeout: Duration, credential: Credential) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(app_info::user_agent())
            .build()
            .map_err(|e| AppError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
        })
    }

    pub fn from_config(config: &Config, credential: Credential) -> AppResult<Self> {
        Self::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
            credential,
        )
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Build a request for `code` with the current token
    pub fn request(&self, code: &str) -> LookupRequest {
        LookupRequest::new(code, self.credential.request_value())
    }

    /// Resolve one request
    ///
    /// Clears the shared credential when the service reports it invalid.
    pub async fn lookup(&self, request: &LookupRequest) -> LookupOutcome {
        let Some(token) = request.credential.as_deref() else {
            debug!(code = %request.code, "No API token, skipping lookup");
            return LookupOutcome::NoCredential;
        };

        let outcome = self.fetch(&request.code, token).await;

        match &outcome {
            LookupOutcome::InvalidCredential => {
                if self.credential.clear_if_matches(token) {
                    warn!(code = %request.code, "API token rejected, cleared stored token");
                } else {
                    warn!(code = %request.code, "API token rejected, token was already replaced");
                }
            }
            LookupOutcome::Found(name) => info!(code = %request.code, name = %name, "Product found"),
            LookupOutcome::TransportError(message) => {
                warn!(code = %request.code, error = %message, "Lookup failed")
            }
            other => debug!(code = %request.code, outcome = ?other, "Lookup complete"),
        }

        outcome
    }

    async fn fetch(&self, code: &str, token: &str) -> LookupOutcome {
        let url = format!("{}{}", self.base_url, api::LOOKUP_PATH);
        debug!(url = %url, code, "Sending lookup request");

        let response = match self
            .http
            .get(&url)
            .query(&[
                ("token", token),
                ("format", "json"),
                ("op", api::LOOKUP_OP),
                ("ean", code),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return LookupOutcome::TransportError(describe_error(e)),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return LookupOutcome::TransportError(describe_error(e)),
        };

        match classify_body(&body) {
            LookupOutcome::TransportError(message) if !status.is_success() => {
                LookupOutcome::TransportError(format!("HTTP {}: {}", status, message))
            }
            outcome => outcome,
        }
    }

    /// Run a lookup on `runtime` and send the result to `reply` exactly once
    pub fn spawn(
        &self,
        runtime: &tokio::runtime::Handle,
        request: LookupRequest,
        reply: UnboundedSender<LookupResult>,
    ) {
        let client = self.clone();
        runtime.spawn(async move {
            let outcome = client.lookup(&request).await;
            let result = LookupResult {
                code: request.code,
                outcome,
            };
            if reply.send(result).is_err() {
                debug!("Scan session gone, dropping lookup result");
            }
        });
    }
}

/// Render a reqwest error with its causes, without the URL carrying the token
fn describe_error(err: reqwest::Error) -> String {
    let err = err.without_url();
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
