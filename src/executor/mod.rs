mod http;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::db::Store;
use crate::models::*;

/// ServiceCallExecutor dispatches created service calls to the executor for
/// their protocol and reports the outcome back to the store.
///
/// The protocol registry is the `ProtocolDetails` enum: adding a protocol
/// means adding a variant and a match arm here, checked for exhaustiveness
/// at compile time.
pub struct ServiceCallExecutor {
    store: Store,
    client: reqwest::Client,
}

impl ServiceCallExecutor {
    pub fn new(store: Store, request_timeout: Duration) -> Result<Arc<Self>> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Arc::new(Self { store, client }))
    }

    /// Execute a created call. Returns the captured response when one was
    /// received; `None` when the call failed in transport. The terminal
    /// status is persisted either way — transport errors are recorded as
    /// data, never propagated to the caller.
    pub async fn dispatch(&self, call: &ServiceCallWithDetails) -> Option<HttpResponse> {
        match &call.details {
            ProtocolDetails::Http(details) => {
                http::execute_http_service_call(
                    &self.store,
                    &self.client,
                    &call.service_call,
                    details,
                )
                .await
            }
        }
    }
}
