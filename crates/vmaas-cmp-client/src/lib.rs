// # Cloud-Management API Client
//
// HTTP implementation of the `InstanceApi` and `CloudApi` traits of
// vmaas-core, talking to the cloud-management REST API.
//
// ## Implementation Status
//
// - ✅ One HTTP request per trait call
// - ✅ Full error propagation (the caller's RetryPolicy decides what to retry)
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Status codes classified into transient and terminal errors
// - ✅ Location and space scoping on every request
// - ❌ NO retry logic (owned by RetryPolicy)
// - ❌ NO identity polling (owned by poll_unique)
// - ❌ NO caching (state owned by StateStore)
// - ❌ NO background tasks
//
// ## Trust Level: Untrusted (Remote API)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS calls to the configured API endpoint only
// - ✅ Decode API-specific responses
//
// **Forbidden Capabilities**:
// - ❌ Retry, sleep or poll
// - ❌ Access the state store
// - ❌ Interpret `success: false` answers (the lifecycle surfaces them)
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Client construction fails fast if the token is empty
//
// ## API Reference
//
// - Create instance: POST `/api/instances`
// - Clone instance: POST `/api/instances/:id/clone`
// - List instances: GET `/api/instances?name=...`
// - Get instance: GET `/api/instances/:id`
// - Update instance: PUT `/api/instances/:id`
// - Resize instance: PUT `/api/instances/:id/resize`
// - Delete instance: DELETE `/api/instances/:id`
// - List datastores: GET `/api/zones/:cloud_id/data-stores?name=...`
// - List SSL server profiles: GET `/api/networks/load-balancers/:lb_id/profiles?name=...`

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};
use vmaas_core::config::ProviderConfig;
use vmaas_core::models::{
    CreateInstanceBody, Datastore, DatastoresResponse, GetInstanceResponse, Instance,
    InstancesResponse, LoadBalancerProfile, LoadBalancerProfilesResponse, ResizeInstanceBody,
    SuccessOrErrorMessage, UpdateInstanceBody,
};
use vmaas_core::traits::{CloudApi, InstanceApi};
use vmaas_core::{Error, Result};

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloud-management API client
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. Wrap every call in a `RetryPolicy`.
pub struct CmpClient {
    /// Base URL without a trailing slash
    base_url: String,

    /// API token
    /// ⚠️ NEVER log this value
    api_token: String,

    location: Option<String>,
    space: Option<String>,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CmpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmpClient")
            .field("base_url", &self.base_url)
            .field("api_token", &"<REDACTED>")
            .field("location", &self.location)
            .field("space", &self.space)
            .finish()
    }
}

impl CmpClient {
    /// Create a client from validated provider settings
    ///
    /// # Errors
    ///
    /// - `Error::Config`: invalid settings or an HTTP client that cannot be built
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            location: config.location.clone(),
            space: config.space.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Scoping parameters sent with every request
    fn scope(&self) -> Vec<(&'static str, &str)> {
        let mut params = Vec::new();
        if let Some(location) = &self.location {
            params.push(("location", location.as_str()));
        }
        if let Some(space) = &self.space {
            params.push(("space", space.as_str()));
        }
        params
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .query(&self.scope())
    }

    fn request_with_body<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> RequestBuilder {
        self.request(method, path).json(body)
    }

    /// Send a request and decode a successful answer
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| classify_send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(classify_status(status, &error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::transient(format!("Failed to read response: {}", e)))?;
        trace!("API answered {} with {} byte(s)", status, body.len());

        serde_json::from_str(&body)
            .map_err(|e| Error::protocol(format!("Failed to parse response: {}", e)))
    }
}

/// Map a failure to send a request
///
/// A request that cannot be built is a configuration error. Anything else
/// failed on the wire and may be retried.
pub fn classify_send_error(e: &reqwest::Error) -> Error {
    if e.is_builder() {
        Error::config(format!("Invalid HTTP request: {}", e))
    } else {
        Error::transient(format!("HTTP request failed: {}", e))
    }
}

/// Map an unsuccessful HTTP status to the error the retry loop classifies
pub fn classify_status(status: StatusCode, body: &str) -> Error {
    let detail = format!("{} - {}", status, body);
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(detail),
        409 => Error::transient(format!("Conflicting operation in progress: {}", detail)),
        429 => Error::rate_limited(format!("Rate limit exceeded. Status: {}", status)),
        500..=599 => Error::transient(format!("Server error: {}", detail)),
        _ => Error::validation(detail),
    }
}

#[async_trait]
impl InstanceApi for CmpClient {
    async fn create_instance(&self, body: &CreateInstanceBody) -> Result<GetInstanceResponse> {
        debug!("POST /api/instances");
        self.send(self.request_with_body(Method::POST, "/api/instances", body))
            .await
    }

    async fn clone_instance(
        &self,
        source_id: i64,
        body: &CreateInstanceBody,
    ) -> Result<SuccessOrErrorMessage> {
        let path = format!("/api/instances/{}/clone", source_id);
        debug!("POST {}", path);
        self.send(self.request_with_body(Method::POST, &path, body))
            .await
    }

    async fn list_instances(&self, name: &str) -> Result<Vec<Instance>> {
        debug!("GET /api/instances?name={}", name);
        let answer: InstancesResponse = self
            .send(
                self.request(Method::GET, "/api/instances")
                    .query(&[("name", name)]),
            )
            .await?;
        Ok(answer.instances)
    }

    async fn get_instance(&self, id: i64) -> Result<GetInstanceResponse> {
        let path = format!("/api/instances/{}", id);
        debug!("GET {}", path);
        self.send(self.request(Method::GET, &path)).await
    }

    async fn update_instance(
        &self,
        id: i64,
        body: &UpdateInstanceBody,
    ) -> Result<GetInstanceResponse> {
        let path = format!("/api/instances/{}", id);
        debug!("PUT {}", path);
        self.send(self.request_with_body(Method::PUT, &path, body))
            .await
    }

    async fn resize_instance(
        &self,
        id: i64,
        body: &ResizeInstanceBody,
    ) -> Result<GetInstanceResponse> {
        let path = format!("/api/instances/{}/resize", id);
        debug!("PUT {}", path);
        self.send(self.request_with_body(Method::PUT, &path, body))
            .await
    }

    async fn delete_instance(&self, id: i64) -> Result<SuccessOrErrorMessage> {
        let path = format!("/api/instances/{}", id);
        debug!("DELETE {}", path);
        self.send(self.request(Method::DELETE, &path)).await
    }
}

#[async_trait]
impl CloudApi for CmpClient {
    async fn list_datastores(&self, cloud_id: i64, name: &str) -> Result<Vec<Datastore>> {
        let path = format!("/api/zones/{}/data-stores", cloud_id);
        debug!("GET {}?name={}", path, name);
        let answer: DatastoresResponse = self
            .send(self.request(Method::GET, &path).query(&[("name", name)]))
            .await?;
        Ok(answer.datastores)
    }

    async fn list_ssl_server_profiles(
        &self,
        lb_id: i64,
        name: &str,
    ) -> Result<Vec<LoadBalancerProfile>> {
        let path = format!("/api/networks/load-balancers/{}/profiles", lb_id);
        debug!("GET {}?name={}", path, name);
        let answer: LoadBalancerProfilesResponse = self
            .send(self.request(Method::GET, &path).query(&[("name", name)]))
            .await?;
        Ok(answer.load_balancer_profiles)
    }
}
