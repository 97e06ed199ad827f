// # Remote Operation Traits
//
// Defines the interface to the cloud-management API.
//
// ## Implementations
//
// - HTTP: `vmaas-cmp-client` crate
// - Tests: scripted doubles in `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use vmaas_core::InstanceApi;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let api = /* InstanceApi implementation */;
//
//     // One call, no retry. Callers wrap it in a RetryPolicy.
//     let found = api.list_instances("web-1").await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::models::{
    CreateInstanceBody, Datastore, GetInstanceResponse, Instance, LoadBalancerProfile,
    ResizeInstanceBody, SuccessOrErrorMessage, UpdateInstanceBody,
};

/// Instance operations of the cloud-management API
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Trust Level: Untrusted
///
/// API clients are **untrusted** components with strict limitations:
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS calls to the configured endpoint only
/// - ✅ Decode responses into the wire models
/// - ✅ Classify failures by the [`Error`](crate::Error) variant they return
///
/// ## Forbidden Capabilities
/// - ❌ Implement retry logic, polling or backoff (owned by the resources'
///   `RetryPolicy`)
/// - ❌ Spawn tasks or threads
/// - ❌ Access the state store (owned by `Reconciler`)
/// - ❌ Cache remote state beyond a single request
/// - ❌ Decide whether a change is needed (owned by the resources)
///
/// ## Failure Classification
///
/// The returned variant decides what the caller's retry loop does:
///
/// - `Transient` / `RateLimited`: retried
/// - `Validation`, `Authentication`, `NotFound`, `Protocol`: returned at once
///
/// A call whose HTTP status is a success but whose body reports
/// `success: false` is not an error here; the resource inspects the body.
///
/// ❌ **WRONG**: Client with retry logic
/// ```rust,ignore
/// async fn get_instance(&self, id: i64) -> Result<GetInstanceResponse> {
///     loop {
///         match self.fetch(id).await {
///             Err(e) if e.is_transient() => sleep(Duration::from_secs(2)).await, // WRONG!
///             other => return other,
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait InstanceApi: Send + Sync {
    /// Provision a new instance
    async fn create_instance(
        &self,
        body: &CreateInstanceBody,
    ) -> Result<GetInstanceResponse, crate::Error>;

    /// Ask for a clone of `source_id`
    ///
    /// The clone is created asynchronously; the answer carries no identity.
    async fn clone_instance(
        &self,
        source_id: i64,
        body: &CreateInstanceBody,
    ) -> Result<SuccessOrErrorMessage, crate::Error>;

    /// Search instances by exact name
    async fn list_instances(&self, name: &str) -> Result<Vec<Instance>, crate::Error>;

    /// Fetch one instance
    ///
    /// # Returns
    ///
    /// - `Err(Error::NotFound)`: the instance does not exist
    async fn get_instance(&self, id: i64) -> Result<GetInstanceResponse, crate::Error>;

    /// Change identity-level attributes (name, group, tags, labels, schedule)
    async fn update_instance(
        &self,
        id: i64,
        body: &UpdateInstanceBody,
    ) -> Result<GetInstanceResponse, crate::Error>;

    /// Change plan and volumes
    async fn resize_instance(
        &self,
        id: i64,
        body: &ResizeInstanceBody,
    ) -> Result<GetInstanceResponse, crate::Error>;

    /// Delete an instance
    async fn delete_instance(&self, id: i64) -> Result<SuccessOrErrorMessage, crate::Error>;
}

/// Cloud-level lookups
///
/// Same trust level and rules as [`InstanceApi`].
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Datastores of `cloud_id` whose name is exactly `name`
    async fn list_datastores(
        &self,
        cloud_id: i64,
        name: &str,
    ) -> Result<Vec<Datastore>, crate::Error>;

    /// SSL server profiles of load balancer `lb_id` whose name is exactly `name`
    async fn list_ssl_server_profiles(
        &self,
        lb_id: i64,
        name: &str,
    ) -> Result<Vec<LoadBalancerProfile>, crate::Error>;
}
