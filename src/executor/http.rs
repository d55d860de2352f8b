use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;

use crate::db::Store;
use crate::models::*;

/// Requests to this host are answered with a canned response instead of
/// touching the network, so demo submissions always succeed.
const SIMULATED_HOST: &str = "example.com";

/// Perform the outbound HTTP request for a call and persist the outcome.
///
/// Any received response, whatever its status code, transitions the call to
/// EXECUTED with the response detail captured. A transport failure
/// (connection error, DNS failure, timeout) transitions it to FAILED with no
/// response detail; the error is logged and swallowed. Exactly one store
/// update happens per execution.
pub(super) async fn execute_http_service_call(
    store: &Store,
    client: &reqwest::Client,
    call: &ServiceCall,
    details: &HttpServiceCallDetails,
) -> Option<HttpResponse> {
    tracing::info!(
        "Executing HTTP service call {} ({} {})",
        call.id,
        details.method.as_str(),
        details.url
    );

    match perform_request(client, details).await {
        Ok(response) => {
            let patch = ServiceCallUpdate {
                status: ServiceCallStatus::Executed,
                executed_at: Utc::now(),
                response: Some(response.clone()),
            };
            if let Err(e) = store.update_service_call(call.id, &patch).await {
                tracing::error!("Failed to record execution of service call {}: {}", call.id, e);
            }
            Some(response)
        }
        Err(e) => {
            tracing::warn!("HTTP service call {} failed: {}", call.id, e);
            let patch = ServiceCallUpdate {
                status: ServiceCallStatus::Failed,
                executed_at: Utc::now(),
                response: None,
            };
            if let Err(e) = store.update_service_call(call.id, &patch).await {
                tracing::error!("Failed to record failure of service call {}: {}", call.id, e);
            }
            None
        }
    }
}

async fn perform_request(
    client: &reqwest::Client,
    details: &HttpServiceCallDetails,
) -> Result<HttpResponse> {
    if is_simulated_host(&details.url) {
        return Ok(simulated_response());
    }

    let mut request = client.request(details.method.into(), &details.url);
    if let Some(headers) = &details.request_headers {
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
    }
    if let Some(body) = &details.request_body {
        request = request.body(body.clone());
    }

    // No retries: a transport failure leaves the call FAILED permanently.
    let response = request.send().await?;
    let response_code = response.status().as_u16();
    let response_headers = flatten_headers(response.headers());
    let response_body = response.text().await?;

    Ok(HttpResponse {
        response_code,
        response_headers,
        response_body,
    })
}

fn is_simulated_host(url: &str) -> bool {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .map(|host| host == SIMULATED_HOST || host.ends_with(&format!(".{}", SIMULATED_HOST)))
        .unwrap_or(false)
}

fn simulated_response() -> HttpResponse {
    HttpResponse {
        response_code: 200,
        response_headers: HashMap::from([(
            "Content-Type".to_string(),
            "application/json".to_string(),
        )]),
        response_body: r#"{"message": "Success"}"#.to_string(),
    }
}

/// Flatten response headers to a string-to-string mapping. Values that are
/// not valid strings are dropped; for duplicate header names the last value
/// wins.
fn flatten_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_store;
    use crate::executor::ServiceCallExecutor;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn submit_call(store: &crate::db::Store, url: &str) -> ServiceCallWithDetails {
        store.create_tenant("t1").await.ok();
        store
            .create_service_call(
                "t1",
                "test-call",
                None,
                &ProtocolRequest::Http(HttpRequestPayload {
                    url: url.to_string(),
                    method: HttpMethod::Get,
                    headers: None,
                    body: None,
                }),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn simulated_host_yields_canned_executed_response() {
        let store = test_store().await;
        let executor = ServiceCallExecutor::new(store.clone(), Duration::from_secs(5)).unwrap();
        let call = submit_call(&store, "http://example.com/api").await;

        let response = executor.dispatch(&call).await.unwrap();
        assert_eq!(response.response_code, 200);
        assert_eq!(response.response_body, r#"{"message": "Success"}"#);
        assert_eq!(
            response.response_headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );

        let fetched = store
            .get_http_service_call("t1", call.service_call.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.service_call.status, ServiceCallStatus::Executed);
        assert!(fetched.service_call.executed_at.is_some());
        let ProtocolDetails::Http(details) = fetched.details;
        assert_eq!(details.response_code, Some(200));
    }

    #[tokio::test]
    async fn unreachable_endpoint_records_failed_without_response_detail() {
        let store = test_store().await;
        let executor = ServiceCallExecutor::new(store.clone(), Duration::from_secs(2)).unwrap();
        let call = submit_call(&store, "http://127.0.0.1:9/unreachable").await;

        assert!(executor.dispatch(&call).await.is_none());

        let fetched = store
            .get_http_service_call("t1", call.service_call.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.service_call.status, ServiceCallStatus::Failed);
        assert!(fetched.service_call.executed_at.is_some());
        let ProtocolDetails::Http(details) = fetched.details;
        assert!(details.response_code.is_none());
        assert!(details.response_headers.is_none());
        assert!(details.response_body.is_none());
    }

    #[tokio::test]
    async fn bare_204_yields_executed_with_empty_headers_and_body() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 204 No Content\r\n\r\n")
                    .await;
                let _ = socket.shutdown().await;
            }
        });

        let store = test_store().await;
        let executor = ServiceCallExecutor::new(store.clone(), Duration::from_secs(5)).unwrap();
        let call = submit_call(&store, &format!("http://{}/", addr)).await;

        let response = executor.dispatch(&call).await.unwrap();
        assert_eq!(response.response_code, 204);
        assert!(response.response_headers.is_empty());
        assert!(response.response_body.is_empty());

        let fetched = store
            .get_http_service_call("t1", call.service_call.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.service_call.status, ServiceCallStatus::Executed);
        let ProtocolDetails::Http(details) = fetched.details;
        assert_eq!(details.response_code, Some(204));
        assert_eq!(details.response_headers, Some(HashMap::new()));
        assert_eq!(details.response_body.as_deref(), Some(""));
    }

    #[test]
    fn simulated_host_matching_is_host_based_not_substring() {
        assert!(is_simulated_host("http://example.com/api"));
        assert!(is_simulated_host("https://www.example.com/"));
        assert!(!is_simulated_host("http://example.com.evil.net/"));
        assert!(!is_simulated_host("http://other.com/example.com"));
        assert!(!is_simulated_host("not a url"));
    }
}
