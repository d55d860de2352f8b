use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Supported service call protocols. Closed enum: adding a protocol means
/// adding a variant here plus a detail shape and an executor arm, and the
/// compiler flags every match that needs updating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Http,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "HTTP" => Ok(Protocol::Http),
            other => bail!("Unsupported protocol: {}", other),
        }
    }
}

/// Service call lifecycle. PENDING is set at creation; EXECUTED and FAILED
/// are terminal. EXECUTED means a response was received, regardless of its
/// HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceCallStatus {
    Pending,
    Executed,
    Failed,
}

impl ServiceCallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceCallStatus::Pending => "PENDING",
            ServiceCallStatus::Executed => "EXECUTED",
            ServiceCallStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(ServiceCallStatus::Pending),
            "EXECUTED" => Ok(ServiceCallStatus::Executed),
            "FAILED" => Ok(ServiceCallStatus::Failed),
            other => bail!("Unknown service call status: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => bail!("Unknown HTTP method: {}", other),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// ServiceCall base record, shared by all protocols
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCall {
    pub id: i64,
    pub tenant_id: String,
    pub name: String,
    pub protocol: Protocol,
    pub status: ServiceCallStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

/// HTTP extension record, one-to-one with its parent ServiceCall.
/// Request fields are immutable; response fields are written once, together
/// with the status transition.
#[derive(Debug, Clone)]
pub struct HttpServiceCallDetails {
    pub service_call_id: i64,
    pub url: String,
    pub method: HttpMethod,
    pub request_headers: Option<HashMap<String, String>>,
    pub request_body: Option<String>,
    pub response_code: Option<i64>,
    pub response_headers: Option<HashMap<String, String>>,
    pub response_body: Option<String>,
}

/// Protocol-specific detail record attached to a created service call
#[derive(Debug, Clone)]
pub enum ProtocolDetails {
    Http(HttpServiceCallDetails),
}

/// A created service call together with its protocol detail record.
/// This is the unit handed to the executor registry.
#[derive(Debug, Clone)]
pub struct ServiceCallWithDetails {
    pub service_call: ServiceCall,
    pub details: ProtocolDetails,
}

/// Protocol-specific request payload for service call creation
#[derive(Debug, Clone)]
pub enum ProtocolRequest {
    Http(HttpRequestPayload),
}

impl ProtocolRequest {
    pub fn protocol(&self) -> Protocol {
        match self {
            ProtocolRequest::Http(_) => Protocol::Http,
        }
    }
}

/// Inbound HTTP request detail. Header values that are not plain JSON
/// strings are dropped silently rather than rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpRequestPayload {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub body: Option<String>,
}

impl HttpRequestPayload {
    /// Flatten inbound headers to string values, dropping everything else
    pub fn sanitized_headers(&self) -> Option<HashMap<String, String>> {
        self.headers.as_ref().map(|headers| {
            headers
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
    }
}

/// CreateHttpServiceCallRequest submits a new HTTP service call, optionally
/// deferred to `scheduled_at`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHttpServiceCallRequest {
    pub name: String,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    pub request: HttpRequestPayload,
}

/// Captured HTTP response, as returned by the executor and persisted on the
/// detail record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub response_code: u16,
    pub response_headers: HashMap<String, String>,
    pub response_body: String,
}

/// Patch applied by the executor when a call reaches a terminal status.
/// Status, executed_at, and the optional response detail are written as one
/// atomic update.
#[derive(Debug, Clone)]
pub struct ServiceCallUpdate {
    pub status: ServiceCallStatus,
    pub executed_at: DateTime<Utc>,
    pub response: Option<HttpResponse>,
}

/// List item for tenant-scoped service call listings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCallSummary {
    pub id: i64,
    pub name: String,
    pub protocol: Protocol,
    pub status: ServiceCallStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    pub is_favorite: bool,
}

impl ServiceCallSummary {
    pub fn from_call(call: &ServiceCall, is_favorite: bool) -> Self {
        Self {
            id: call.id,
            name: call.name.clone(),
            protocol: call.protocol,
            status: call.status,
            submitted_at: call.submitted_at,
            scheduled_at: call.scheduled_at,
            executed_at: call.executed_at,
            is_favorite,
        }
    }
}

/// Request side of an HTTP service call, as returned by get-one
#[derive(Debug, Clone, Serialize)]
pub struct HttpRequestView {
    pub url: String,
    pub method: HttpMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Full HTTP service call view: base record plus request and, once the call
/// reached a terminal status with a response, the captured response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpServiceCallView {
    pub id: i64,
    pub name: String,
    pub protocol: Protocol,
    pub status: ServiceCallStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    pub request: HttpRequestView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<HttpResponse>,
}

impl HttpServiceCallView {
    pub fn from_parts(call: &ServiceCall, details: &HttpServiceCallDetails) -> Self {
        let response = details.response_code.map(|code| HttpResponse {
            response_code: code as u16,
            response_headers: details.response_headers.clone().unwrap_or_default(),
            response_body: details.response_body.clone().unwrap_or_default(),
        });
        Self {
            id: call.id,
            name: call.name.clone(),
            protocol: call.protocol,
            status: call.status,
            submitted_at: call.submitted_at,
            scheduled_at: call.scheduled_at,
            executed_at: call.executed_at,
            request: HttpRequestView {
                url: details.url.clone(),
                method: details.method,
                headers: details.request_headers.clone(),
                body: details.request_body.clone(),
            },
            response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitized_headers_drops_non_string_values() {
        let payload = HttpRequestPayload {
            url: "http://example.com".to_string(),
            method: HttpMethod::Get,
            headers: Some(HashMap::from([
                ("x-token".to_string(), json!("abc")),
                ("x-count".to_string(), json!(42)),
                ("x-flags".to_string(), json!(["a", "b"])),
            ])),
            body: None,
        };

        let sanitized = payload.sanitized_headers().unwrap();
        assert_eq!(sanitized.len(), 1);
        assert_eq!(sanitized.get("x-token").map(String::as_str), Some("abc"));
    }

    #[test]
    fn sanitized_headers_absent_when_no_headers_submitted() {
        let payload = HttpRequestPayload {
            url: "http://example.com".to_string(),
            method: HttpMethod::Get,
            headers: None,
            body: None,
        };
        assert!(payload.sanitized_headers().is_none());
    }

    #[test]
    fn status_round_trips_through_db_strings() {
        for status in [
            ServiceCallStatus::Pending,
            ServiceCallStatus::Executed,
            ServiceCallStatus::Failed,
        ] {
            assert_eq!(ServiceCallStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ServiceCallStatus::parse("DONE").is_err());
    }
}
