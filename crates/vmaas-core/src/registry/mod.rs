//! Plugin-based resource registry
//!
//! The registry maps resource and data source type names to factories, so
//! callers pick an implementation by the type named in a declaration rather
//! than through hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vmaas_core::registry::{ProviderContext, ResourceRegistry};
//!
//! let registry = ResourceRegistry::with_builtin();
//! let ctx = ProviderContext::new(instances, clouds, config.retry.clone());
//!
//! let resource = registry.create_resource("instance", &ctx)?;
//! ```
//!
//! ## Registration
//!
//! Additional types register a factory before the registry is shared:
//!
//! ```rust,ignore
//! registry.register_resource("instance_snapshot", Box::new(SnapshotFactory));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::resources::{DatastoreDataSource, InstanceResource, SslServerProfileDataSource};
use crate::traits::{CloudApi, DataSource, InstanceApi, Resource};

/// Everything a factory may hand to the object it builds
#[derive(Clone)]
pub struct ProviderContext {
    pub instances: Arc<dyn InstanceApi>,
    pub clouds: Arc<dyn CloudApi>,
    pub retry: RetryConfig,
}

impl ProviderContext {
    pub fn new(
        instances: Arc<dyn InstanceApi>,
        clouds: Arc<dyn CloudApi>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            instances,
            clouds,
            retry,
        }
    }
}

/// Helper trait for constructing resources from the provider context
pub trait ResourceFactory: Send + Sync {
    fn create(&self, ctx: &ProviderContext) -> Result<Box<dyn Resource>>;
}

/// Helper trait for constructing data sources from the provider context
pub trait DataSourceFactory: Send + Sync {
    fn create(&self, ctx: &ProviderContext) -> Result<Box<dyn DataSource>>;
}

struct InstanceFactory;

impl ResourceFactory for InstanceFactory {
    fn create(&self, ctx: &ProviderContext) -> Result<Box<dyn Resource>> {
        Ok(Box::new(InstanceResource::with_policies(
            ctx.instances.clone(),
            ctx.retry.standard_policy(),
            ctx.retry.poll_policy(),
        )))
    }
}

struct DatastoreFactory;

impl DataSourceFactory for DatastoreFactory {
    fn create(&self, ctx: &ProviderContext) -> Result<Box<dyn DataSource>> {
        Ok(Box::new(DatastoreDataSource::with_policy(
            ctx.clouds.clone(),
            ctx.retry.standard_policy(),
        )))
    }
}

struct SslServerProfileFactory;

impl DataSourceFactory for SslServerProfileFactory {
    fn create(&self, ctx: &ProviderContext) -> Result<Box<dyn DataSource>> {
        Ok(Box::new(SslServerProfileDataSource::with_policy(
            ctx.clouds.clone(),
            ctx.retry.standard_policy(),
        )))
    }
}

/// Registry of resource and data source factories
///
/// Registration takes `&mut self`; once built, the registry is read-only
/// and can be shared freely.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<String, Box<dyn ResourceFactory>>,
    data_sources: BTreeMap<String, Box<dyn DataSourceFactory>>,
}

impl ResourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `instance` resource and the `datastore` and
    /// `lb_ssl_server_profile` data sources
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_resource(InstanceResource::TYPE, Box::new(InstanceFactory));
        registry.register_data_source(DatastoreDataSource::TYPE, Box::new(DatastoreFactory));
        registry.register_data_source(
            SslServerProfileDataSource::TYPE,
            Box::new(SslServerProfileFactory),
        );
        registry
    }

    /// Register a resource factory, replacing any factory of the same name
    pub fn register_resource(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn ResourceFactory>,
    ) {
        self.resources.insert(name.into(), factory);
    }

    /// Register a data source factory, replacing any factory of the same name
    pub fn register_data_source(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn DataSourceFactory>,
    ) {
        self.data_sources.insert(name.into(), factory);
    }

    /// Create a resource by type name
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: If the type is not registered
    pub fn create_resource(&self, name: &str, ctx: &ProviderContext) -> Result<Box<dyn Resource>> {
        self.resources
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown resource type: {}", name)))?
            .create(ctx)
    }

    /// Create a data source by type name
    pub fn create_data_source(
        &self,
        name: &str,
        ctx: &ProviderContext,
    ) -> Result<Box<dyn DataSource>> {
        self.data_sources
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown data source type: {}", name)))?
            .create(ctx)
    }

    /// Registered resource types, sorted
    pub fn list_resources(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }

    /// Registered data source types, sorted
    pub fn list_data_sources(&self) -> Vec<String> {
        self.data_sources.keys().cloned().collect()
    }

    pub fn has_resource(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    pub fn has_data_source(&self, name: &str) -> bool {
        self.data_sources.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ResourceData;
    use crate::models::{
        CreateInstanceBody, Datastore, GetInstanceResponse, Instance, LoadBalancerProfile,
        ResizeInstanceBody, SuccessOrErrorMessage, UpdateInstanceBody,
    };
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl InstanceApi for Unreachable {
        async fn create_instance(&self, _: &CreateInstanceBody) -> Result<GetInstanceResponse> {
            Err(Error::transient("unreachable"))
        }
        async fn clone_instance(
            &self,
            _: i64,
            _: &CreateInstanceBody,
        ) -> Result<SuccessOrErrorMessage> {
            Err(Error::transient("unreachable"))
        }
        async fn list_instances(&self, _: &str) -> Result<Vec<Instance>> {
            Err(Error::transient("unreachable"))
        }
        async fn get_instance(&self, _: i64) -> Result<GetInstanceResponse> {
            Err(Error::transient("unreachable"))
        }
        async fn update_instance(
            &self,
            _: i64,
            _: &UpdateInstanceBody,
        ) -> Result<GetInstanceResponse> {
            Err(Error::transient("unreachable"))
        }
        async fn resize_instance(
            &self,
            _: i64,
            _: &ResizeInstanceBody,
        ) -> Result<GetInstanceResponse> {
            Err(Error::transient("unreachable"))
        }
        async fn delete_instance(&self, _: i64) -> Result<SuccessOrErrorMessage> {
            Err(Error::transient("unreachable"))
        }
    }

    #[async_trait]
    impl CloudApi for Unreachable {
        async fn list_datastores(&self, _: i64, _: &str) -> Result<Vec<Datastore>> {
            Err(Error::transient("unreachable"))
        }
        async fn list_ssl_server_profiles(
            &self,
            _: i64,
            _: &str,
        ) -> Result<Vec<LoadBalancerProfile>> {
            Err(Error::transient("unreachable"))
        }
    }

    struct NoopResource;

    #[async_trait]
    impl Resource for NoopResource {
        async fn create(&self, _: &mut ResourceData) -> Result<()> {
            Ok(())
        }
        async fn read(&self, _: &mut ResourceData) -> Result<()> {
            Ok(())
        }
        async fn update(&self, _: &mut ResourceData) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _: &mut ResourceData) -> Result<()> {
            Ok(())
        }
        fn resource_type(&self) -> &'static str {
            "noop"
        }
    }

    struct NoopFactory;

    impl ResourceFactory for NoopFactory {
        fn create(&self, _: &ProviderContext) -> Result<Box<dyn Resource>> {
            Ok(Box::new(NoopResource))
        }
    }

    fn context() -> ProviderContext {
        let api = Arc::new(Unreachable);
        ProviderContext::new(api.clone(), api, RetryConfig::default())
    }

    #[test]
    fn test_builtin_registration() {
        let registry = ResourceRegistry::with_builtin();

        assert!(registry.has_resource("instance"));
        assert!(registry.has_data_source("datastore"));
        assert_eq!(registry.list_resources(), vec!["instance".to_string()]);

        let resource = registry.create_resource("instance", &context()).unwrap();
        assert_eq!(resource.resource_type(), "instance");
        assert_eq!(resource.computed_fields(), &["status", "volume.*.id"]);

        let source = registry.create_data_source("datastore", &context()).unwrap();
        assert_eq!(source.data_source_type(), "datastore");

        assert_eq!(
            registry.list_data_sources(),
            vec!["datastore".to_string(), "lb_ssl_server_profile".to_string()]
        );
        let source = registry
            .create_data_source("lb_ssl_server_profile", &context())
            .unwrap();
        assert_eq!(source.data_source_type(), "lb_ssl_server_profile");
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let registry = ResourceRegistry::with_builtin();
        assert!(matches!(
            registry.create_resource("network", &context()),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            registry.create_data_source("instance", &context()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = ResourceRegistry::new();
        assert!(!registry.has_resource("noop"));

        registry.register_resource("noop", Box::new(NoopFactory));
        assert!(registry.has_resource("noop"));

        let resource = registry.create_resource("noop", &context()).unwrap();
        assert!(resource.computed_fields().is_empty());
    }
}
