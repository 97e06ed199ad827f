//! Datastore lookup by name within a cloud

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::data::ResourceData;
use crate::retry::RetryPolicy;
use crate::traits::{CloudApi, DataSource};
use crate::{Error, Result};

pub struct DatastoreDataSource {
    api: Arc<dyn CloudApi>,
    policy: RetryPolicy,
}

impl DatastoreDataSource {
    pub const TYPE: &'static str = "datastore";

    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self::with_policy(api, RetryPolicy::standard())
    }

    pub fn with_policy(api: Arc<dyn CloudApi>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }
}

#[async_trait]
impl DataSource for DatastoreDataSource {
    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let cloud_id = data.get_int("cloud_id");
        let name = data.get_string("name");
        debug!("Get datastore '{}' of cloud {}", name, cloud_id);
        data.error()?;

        let datastores = self
            .policy
            .run(|| self.api.list_datastores(cloud_id, &name))
            .await?;

        let [datastore] = datastores.as_slice() else {
            return Err(Error::not_found(
                "could not find the datastore with the specified name. \
                 Please verify the name and try again",
            ));
        };
        data.set_id(datastore.id);

        data.error()
    }

    fn data_source_type(&self) -> &'static str {
        Self::TYPE
    }
}
