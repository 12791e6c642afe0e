//! Typed request layer over [`SessionClient`].

use crate::client::SessionClient;
use crate::descriptor::RequestDescriptor;
use crate::error::{ApiError, ApiResult};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Decodes raw session-client responses into typed values.
#[derive(Clone)]
pub struct ApiClient {
    client: SessionClient,
}

impl ApiClient {
    /// Create a typed layer over the given client.
    pub fn new(client: SessionClient) -> Self {
        Self { client }
    }

    /// Access the underlying session client.
    pub fn session(&self) -> &SessionClient {
        &self.client
    }

    /// Execute a call and decode the JSON body into `T`.
    ///
    /// A body that does not decode maps to [`ApiError::Decoding`]
    /// regardless of HTTP status; decode failures are never retried.
    pub async fn call<T: DeserializeOwned>(&self, descriptor: &RequestDescriptor) -> ApiResult<T> {
        let (status, body) = self.client.execute(descriptor).await?;
        debug!(status, path = %descriptor.path, "Decoding response body");
        serde_json::from_slice(&body).map_err(ApiError::Decoding)
    }

    /// Execute a call and discard the body.
    pub async fn call_unit(&self, descriptor: &RequestDescriptor) -> ApiResult<()> {
        self.client.execute(descriptor).await?;
        Ok(())
    }
}
