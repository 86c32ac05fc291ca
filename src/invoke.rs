//! Sending a test message to a running function
//!
//! Two wire formats are supported: a plain HTTP POST of the message data,
//! and a binary-mode CloudEvent where the event attributes travel as
//! `ce-*` headers.

use crate::error::{FunctionError, Result};
use crate::function::{Function, DEFAULT_INVOKE};
use crate::instances::{Instances, ENVIRONMENT_LOCAL, ENVIRONMENT_REMOTE};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const DEFAULT_INVOKE_SOURCE: &str = "/boson/fn";
pub const DEFAULT_INVOKE_TYPE: &str = "boson.fn";
pub const DEFAULT_INVOKE_CONTENT_TYPE: &str = "application/json";
pub const DEFAULT_INVOKE_DATA: &str = r#"{"message":"Hello World"}"#;

const CLOUDEVENTS_SPEC_VERSION: &str = "1.0";
/// How long to wait for a function's answer unless the client sets its own
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Message sent by [`crate::Client::invoke`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeMessage {
    pub id: String,
    pub source: String,
    pub kind: String,
    pub content_type: String,
    pub data: String,
    /// Overrides the function's own invocation format when set
    pub format: Option<String>,
}

impl Default for InvokeMessage {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: DEFAULT_INVOKE_SOURCE.to_string(),
            kind: DEFAULT_INVOKE_TYPE.to_string(),
            content_type: DEFAULT_INVOKE_CONTENT_TYPE.to_string(),
            data: DEFAULT_INVOKE_DATA.to_string(),
            format: None,
        }
    }
}

/// What the function answered with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvokeResponse {
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

/// Resolve the URL to invoke.
///
/// `local` and `remote` name environments; an empty target tries local and
/// falls back to remote; anything else is used verbatim as the URL.
pub async fn route(
    cancel: &CancellationToken,
    instances: &Instances,
    f: &Function,
    target: &str,
) -> Result<String> {
    let instance = match target {
        ENVIRONMENT_LOCAL => instances.local(f)?,
        ENVIRONMENT_REMOTE => instances.remote(cancel, &f.name, Some(&f.root)).await?,
        "" => match instances.local(f) {
            Ok(instance) => instance,
            Err(FunctionError::NotRunning) => {
                debug!(function = %f.name, "not running locally, trying remote");
                instances.remote(cancel, &f.name, Some(&f.root)).await?
            }
            Err(e) => return Err(e),
        },
        url => return Ok(url.to_string()),
    };
    if instance.route.is_empty() {
        return Err(FunctionError::NotRunning);
    }
    Ok(instance.route)
}

/// Message format: the message override, else the function's own, else
/// `http`
pub fn format_for<'a>(f: &'a Function, m: &'a InvokeMessage) -> &'a str {
    match m.format.as_deref() {
        Some(format) if !format.is_empty() => format,
        _ if !f.invoke.is_empty() => f.invoke.as_str(),
        _ => DEFAULT_INVOKE,
    }
}

/// Send `m` to `route` in the given format, giving up after `timeout`
pub async fn send(
    http: &reqwest::Client,
    route: &str,
    format: &str,
    m: &InvokeMessage,
    timeout: Duration,
) -> Result<InvokeResponse> {
    info!(route, format, "invoking function");
    let request = http
        .post(route)
        .timeout(timeout)
        .header(CONTENT_TYPE, &m.content_type)
        .body(m.data.clone());

    let request = match format {
        "http" => request,
        "cloudevent" => request
            .header("ce-id", &m.id)
            .header("ce-source", &m.source)
            .header("ce-type", &m.kind)
            .header("ce-specversion", CLOUDEVENTS_SPEC_VERSION),
        other => {
            return Err(FunctionError::Invoke {
                route: route.to_string(),
                message: format!("format '{}' not supported", other),
            })
        }
    };

    let invoke_error = |message: String| FunctionError::Invoke {
        route: route.to_string(),
        message,
    };
    let response = request
        .send()
        .await
        .map_err(|e| invoke_error(e.to_string()))?;

    let status = response.status();
    if status.as_u16() > 299 {
        return Err(invoke_error(format!("HTTP {}", status)));
    }
    let headers = collect_headers(response.headers());
    let body = response
        .text()
        .await
        .map_err(|e| invoke_error(format!("failed to read response body: {}", e)))?;
    Ok(InvokeResponse { headers, body })
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        out.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_message() {
        let m = InvokeMessage::default();
        assert_eq!(m.source, "/boson/fn");
        assert_eq!(m.kind, "boson.fn");
        assert_eq!(m.content_type, "application/json");
        assert_eq!(m.data, r#"{"message":"Hello World"}"#);
        assert!(uuid::Uuid::parse_str(&m.id).is_ok());
        assert_ne!(m.id, InvokeMessage::default().id);
    }

    #[test]
    fn test_format_precedence() {
        let mut f = Function::default();
        let mut m = InvokeMessage::default();
        assert_eq!(format_for(&f, &m), "http");

        f.invoke = "cloudevent".into();
        assert_eq!(format_for(&f, &m), "cloudevent");

        m.format = Some("http".into());
        assert_eq!(format_for(&f, &m), "http");
    }

    #[tokio::test]
    async fn test_explicit_url_is_used_verbatim() {
        let instances = Instances::new(None, String::new());
        let url = route(
            &CancellationToken::new(),
            &instances,
            &Function::default(),
            "http://example.com:8080/",
        )
        .await
        .unwrap();
        assert_eq!(url, "http://example.com:8080/");
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let http = reqwest::Client::new();
        let result = send(
            &http,
            "http://127.0.0.1:9/",
            "grpc",
            &InvokeMessage::default(),
            DEFAULT_INVOKE_TIMEOUT,
        )
        .await;
        assert!(matches!(result, Err(FunctionError::Invoke { .. })));
    }
}
