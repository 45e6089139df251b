use std::{collections::HashMap, error::Error as _, io, time::Duration};

use reqwest::{
    Client,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;

use crate::error::Error;

pub const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);
pub const BODY_PREVIEW_LIMIT: usize = 500;
pub const FORWARDED_BY: &str = "HookVerify-CLI";

const X_FORWARDED_BY: HeaderName = HeaderName::from_static("x-forwarded-by");

/// Inbound headers that describe the relay's request framing, not the webhook.
const STRIPPED_HEADERS: [&str; 4] = ["host", "content-length", "transfer-encoding", "connection"];

/// Outcome of replaying one webhook against the local server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardResult {
    /// The local server answered, whatever the status code.
    Delivered { status_code: u16, body_preview: String },
    Failed { error_message: String },
}

impl ForwardResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Client used for forwarding, bounded by [`FORWARD_TIMEOUT`].
pub fn http_client() -> Result<Client, Error> {
    Ok(Client::builder()
        .use_rustls_tls()
        .timeout(FORWARD_TIMEOUT)
        .build()?)
}

#[derive(Debug, Clone)]
pub struct WebhookForwarder {
    port: u16,
    target: String,
    http_client: Client,
}

impl WebhookForwarder {
    pub fn new(port: u16, path: &str, http_client: Client) -> Self {
        let target = if path.starts_with('/') {
            format!("http://localhost:{port}{path}")
        } else {
            format!("http://localhost:{port}/{path}")
        };

        Self {
            port,
            target,
            http_client,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// POSTs `payload` to the local target. Never fails: every outcome,
    /// including transport errors, is folded into the returned [`ForwardResult`].
    pub async fn forward(&self, payload: &Value, headers: &HashMap<String, String>) -> ForwardResult {
        let response = self
            .http_client
            .post(&self.target)
            .headers(forward_headers(headers))
            .json(payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) if is_connection_refused(&err) => {
                tracing::debug!("request to {} refused: {err}", self.target);
                return ForwardResult::Failed {
                    error_message: format!(
                        "connection refused: target server likely not running on port {}",
                        self.port
                    ),
                };
            }
            Err(err) => {
                tracing::debug!("request to {} failed: {err:?}", self.target);
                return ForwardResult::Failed {
                    error_message: describe(&err),
                };
            }
        };

        let status_code = response.status().as_u16();
        match response.text().await {
            Ok(body) => ForwardResult::Delivered {
                status_code,
                body_preview: body_preview(&body),
            },
            Err(err) => ForwardResult::Failed {
                error_message: describe(&err),
            },
        }
    }
}

/// Builds the outbound header set: inbound headers minus framing headers,
/// plus the JSON content type and the forwarding marker.
pub fn forward_headers(headers: &HashMap<String, String>) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len() + 2);
    for (name, value) in headers {
        if STRIPPED_HEADERS
            .iter()
            .any(|stripped| name.eq_ignore_ascii_case(stripped))
        {
            continue;
        }

        match (name.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
            (Ok(name), Ok(value)) => {
                forwarded.append(name, value);
            }
            _ => tracing::debug!("skipping header that is not valid HTTP: {name}"),
        }
    }

    forwarded.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    forwarded.insert(X_FORWARDED_BY, HeaderValue::from_static(FORWARDED_BY));
    forwarded
}

pub fn body_preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_LIMIT).collect()
}

fn is_connection_refused(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return format!("request timed out: {err}");
    }

    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {cause}"));
        source = cause.source();
    }
    message
}
