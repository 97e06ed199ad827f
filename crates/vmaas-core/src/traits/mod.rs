//! Core traits of the provider
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`InstanceApi`], [`CloudApi`]: Single-shot remote calls
//! - [`Resource`], [`DataSource`]: Lifecycle of a managed or looked-up object
//! - [`StateStore`]: Persistent per-resource documents

pub mod instance_api;
pub mod resource;
pub mod state_store;

pub use instance_api::{CloudApi, InstanceApi};
pub use resource::{DataSource, Resource};
pub use state_store::{StateRecord, StateStore};
