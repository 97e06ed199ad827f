// # vmaas-core
//
// Core library for reconciling virtual machine resources against a
// cloud-management API.
//
// ## Architecture Overview
//
// - **ResourceData**: Typed access to the declared document with deferred errors
// - **diff**: Change sets for maps and named collections
// - **RetryPolicy / poll_unique**: Bounded retry and identity polling
// - **InstanceApi / CloudApi**: Traits for single-shot remote calls
// - **Resource / DataSource**: Lifecycle contract of managed objects
// - **StateStore**: Trait for persisting documents between invocations
// - **Reconciler**: Plans and runs lifecycle operations, persists results
// - **ResourceRegistry**: Plugin-based registry for resource types
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Remote transport lives outside this crate
// 2. **Deferred Validation**: Field errors surface together at checkpoints
// 3. **Single Retry Loop**: Every retry and poll goes through one executor
// 4. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod data;
pub mod diff;
pub mod engine;
pub mod error;
pub mod models;
pub mod poll;
pub mod registry;
pub mod resources;
pub mod retry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{ProviderConfig, RetryConfig};
pub use data::{Entry, ResourceData};
pub use engine::{Action, ReconcileEvent, Reconciler};
pub use error::{Error, ExtractionErrors, FieldError, FieldErrorKind, Result};
pub use poll::poll_unique;
pub use registry::{ProviderContext, ResourceRegistry};
pub use retry::{Attempt, RetryPolicy, retry};
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{CloudApi, DataSource, InstanceApi, Resource, StateRecord, StateStore};
