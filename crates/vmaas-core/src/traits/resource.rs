// # Resource Lifecycle Traits
//
// A managed resource answers four operations against one remote object.
// Each operation receives the single-owner `ResourceData` for this
// invocation and follows the same shape:
//
// 1. read every input through the accessor (errors are deferred)
// 2. pre-check: `data.error()?` before any remote call
// 3. remote calls, each wrapped in a `RetryPolicy`
// 4. write identity and computed attributes
// 5. post-check: `data.error()` surfaces any failed write
//
// Update is split into independent facets checked with
// `has_changed_element`; the first failing facet ends the operation.

use async_trait::async_trait;

use crate::data::ResourceData;

/// A managed remote object
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Call the remote API through the injected traits
/// - ✅ Retry and poll through `RetryPolicy` and `poll_unique`
/// - ✅ Read and write the invocation's `ResourceData`
///
/// ## Forbidden Capabilities
/// - ❌ Access the state store (owned by `Reconciler`)
/// - ❌ Share state between invocations
/// - ❌ Spawn background tasks
#[async_trait]
pub trait Resource: Send + Sync {
    /// Create the remote object and record its identity
    async fn create(&self, data: &mut ResourceData) -> Result<(), crate::Error>;

    /// Refresh the document from the remote object
    async fn read(&self, data: &mut ResourceData) -> Result<(), crate::Error>;

    /// Apply the changed facets of the declaration
    async fn update(&self, data: &mut ResourceData) -> Result<(), crate::Error>;

    /// Delete the remote object and clear the identity
    async fn delete(&self, data: &mut ResourceData) -> Result<(), crate::Error>;

    /// Type name, e.g. `"instance"`
    fn resource_type(&self) -> &'static str;

    /// Attributes written by `read` that a declaration normally omits
    ///
    /// `*` stands for every index of a sequence.
    fn computed_fields(&self) -> &'static [&'static str] {
        &[]
    }
}

/// A read-only lookup of an existing remote object
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn read(&self, data: &mut ResourceData) -> Result<(), crate::Error>;

    fn data_source_type(&self) -> &'static str;
}
