//! SSL server profile lookup by name within a load balancer

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::data::ResourceData;
use crate::retry::RetryPolicy;
use crate::traits::{CloudApi, DataSource};
use crate::{Error, Result};

pub struct SslServerProfileDataSource {
    api: Arc<dyn CloudApi>,
    policy: RetryPolicy,
}

impl SslServerProfileDataSource {
    pub const TYPE: &'static str = "lb_ssl_server_profile";

    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self::with_policy(api, RetryPolicy::standard())
    }

    pub fn with_policy(api: Arc<dyn CloudApi>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }
}

#[async_trait]
impl DataSource for SslServerProfileDataSource {
    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let lb_id = data.get_int("lb_id");
        let name = data.get_string("name");
        debug!("Get SSL server profile '{}' of load balancer {}", name, lb_id);
        data.error()?;

        let profiles = self
            .policy
            .run(|| self.api.list_ssl_server_profiles(lb_id, &name))
            .await?;

        let [profile] = profiles.as_slice() else {
            return Err(Error::not_found(
                "could not find the SSL server profile with the specified name. \
                 Please verify the name and try again",
            ));
        };
        data.set_id(profile.id);

        data.error()
    }

    fn data_source_type(&self) -> &'static str {
        Self::TYPE
    }
}
