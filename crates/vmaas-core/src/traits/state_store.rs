// # State Store Trait
//
// Defines the interface for the per-resource document store.
//
// ## Purpose
//
// Between two invocations the reconciler needs, for each managed resource:
// - The remote identity
// - The last declared document (the "previous" side of change detection)
// - The last observed document (what Read reported)
//
// The store does not cache remote state for reuse within an invocation;
// every operation talks to the API.
//
// ## Implementations
//
// - `MemoryStateStore`: tests and one-shot runs
// - `FileStateStore`: JSON file with backup and recovery

use async_trait::async_trait;
use serde_json::Value;

/// Stored state of one managed resource
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StateRecord {
    /// Type the resource was registered under, e.g. `"instance"`
    pub resource_type: String,
    /// Remote identity, absent until a create succeeded
    pub id: Option<i64>,
    /// Declaration of the last successful apply
    pub declared: Value,
    /// Document as refreshed by the last Read
    pub observed: Value,
    /// Timestamp of the last successful apply or refresh
    pub last_applied: chrono::DateTime<chrono::Utc>,
}

impl StateRecord {
    /// Create a new state record
    ///
    /// This is `pub(crate)`: records are written by the `Reconciler` or a
    /// `StateStore` implementation, never assembled by callers.
    pub(crate) fn new(
        resource_type: impl Into<String>,
        id: Option<i64>,
        declared: Value,
        observed: Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id,
            declared,
            observed,
            last_applied: chrono::Utc::now(),
        }
    }
}

/// Trait for state store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage (files, databases, etc.)
/// - ✅ Implement locking/concurrency control for thread safety
/// - ✅ Cache records in memory (with explicit flush)
///
/// ## Forbidden Capabilities
/// - ❌ Call the remote API (owned by the resources)
/// - ❌ Decide what to apply (owned by `Reconciler`)
/// - ❌ Spawn background tasks
///
/// ## Implementation Guidelines
///
/// - **Async I/O only**: Use async file/database operations, never blocking I/O
/// - **Explicit flush**: `flush()` must persist all pending changes
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the stored record of a resource
    ///
    /// # Returns
    ///
    /// - `Ok(Some(StateRecord))`: The record
    /// - `Ok(None)`: The resource is not managed yet
    /// - `Err(Error)`: Storage error
    async fn get_record(&self, key: &str) -> Result<Option<StateRecord>, crate::Error>;

    /// Create or replace the record of a resource
    async fn set_record(&self, key: &str, record: &StateRecord) -> Result<(), crate::Error>;

    /// Delete a record
    ///
    /// Deleting a record that does not exist is not an error.
    async fn delete_record(&self, key: &str) -> Result<(), crate::Error>;

    /// List all keys in the store
    async fn list_records(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
