//! Virtual machine instance resource
//!
//! Declared document:
//!
//! ```json
//! {
//!   "name": "web-1",
//!   "cloud_id": 1, "group_id": 2, "plan_id": 3, "layout_id": 4,
//!   "instance_code": "vmware",
//!   "hostname": "web-1", "scale": 1, "power_schedule_id": 5,
//!   "labels": ["web"],
//!   "tags": { "env": "prod" },
//!   "evars": { "ROLE": "web" },
//!   "network": [{ "id": 10 }],
//!   "volume": [{ "name": "root", "size": 20, "datastore_id": "auto", "root": true }],
//!   "config": { "resource_pool_id": 6, "template": 7, "no_agent": true,
//!               "vm_folder": "group-v1", "create_user": false, "asset_tag": "" },
//!   "clone_source_id": 99
//! }
//! ```
//!
//! Read writes back `status` and the identity of each declared volume, by
//! position.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::data::{Entry, ResourceData};
use crate::diff::{NEW_ENTITY_ID, compare_maps, compare_named_collections};
use crate::models::{
    CreateInstanceBody, Evar, IdRef, Instance, InstanceConfig, InstanceSpec, InstanceTypeRef,
    NetworkInterface, ResizeInstanceBody, ResizeInstanceSpec, Tag, UpdateInstanceBody,
    UpdateInstanceSpec, Volume,
};
use crate::poll::poll_unique;
use crate::retry::RetryPolicy;
use crate::traits::{InstanceApi, Resource};
use crate::{Error, Result};

/// Instance code whose create request must name a template
const VMWARE: &str = "vmware";

/// Fields of the identity facet of an update
const IDENTITY_FIELDS: &[&str] = &["name", "group_id", "tags", "labels", "power_schedule_id"];

/// Fields of the sizing facet of an update
const SIZING_FIELDS: &[&str] = &["volume", "plan_id"];

/// Fields no update call carries; changing one needs a new instance
const FIXED_FIELDS: &[&str] = &[
    "hostname",
    "evars",
    "config",
    "network",
    "layout_id",
    "cloud_id",
    "instance_code",
    "scale",
    "clone_source_id",
];

pub struct InstanceResource {
    api: Arc<dyn InstanceApi>,
    policy: RetryPolicy,
    poll_policy: RetryPolicy,
}

impl InstanceResource {
    pub const TYPE: &'static str = "instance";

    pub fn new(api: Arc<dyn InstanceApi>) -> Self {
        Self::with_policies(api, RetryPolicy::standard(), RetryPolicy::clone_poll())
    }

    /// `policy` wraps every remote call, `poll_policy` the search for a clone
    pub fn with_policies(
        api: Arc<dyn InstanceApi>,
        policy: RetryPolicy,
        poll_policy: RetryPolicy,
    ) -> Self {
        Self {
            api,
            policy,
            poll_policy,
        }
    }

    /// Body shared by the create and clone calls
    fn build_create_body(data: &mut ResourceData) -> CreateInstanceBody {
        let instance_code = data.get_string("instance_code");

        // A missing template is reported with the other field errors
        let template = if instance_code == VMWARE {
            Some(data.get_int("config.template"))
        } else {
            data.get_optional("config.template")
        };

        let config = InstanceConfig {
            template,
            resource_pool_id: data.get_int("config.resource_pool_id"),
            no_agent: data
                .get_optional::<bool>("config.no_agent")
                .unwrap_or_default()
                .to_string(),
            vmware_folder_id: data.get_optional("config.vm_folder").unwrap_or_default(),
            create_user: data.get_optional("config.create_user").unwrap_or_default(),
            smbios_asset_tag: data.get_optional("config.asset_tag").unwrap_or_default(),
        };

        // Every volume of a new instance is new
        let volumes: Vec<Entry> = data
            .get_optional::<Vec<Entry>>("volume")
            .unwrap_or_default()
            .into_iter()
            .map(|mut entry| {
                entry.remove("id");
                entry
            })
            .collect();
        let networks = data.get_optional::<Vec<Entry>>("network").unwrap_or_default();

        CreateInstanceBody {
            zone_id: data.get_int("cloud_id"),
            instance: InstanceSpec {
                name: data.get_string("name"),
                site: IdRef::new(data.get_int("group_id")),
                instance_type: InstanceTypeRef {
                    code: instance_code.clone(),
                },
                layout: IdRef::new(data.get_int("layout_id")),
                plan: IdRef::new(data.get_int("plan_id")),
                kind: instance_code,
                host_name: data.get_optional("hostname").unwrap_or_default(),
            },
            volumes: volume_models(data, volumes),
            network_interfaces: networks
                .iter()
                .enumerate()
                .map(|(i, n)| NetworkInterface {
                    network: IdRef::new(data.get_entry_field(n, &format!("network.{}", i), "id")),
                })
                .collect(),
            config,
            tags: data
                .get_optional::<BTreeMap<String, String>>("tags")
                .unwrap_or_default()
                .into_iter()
                .map(|(name, value)| Tag::new(name, value))
                .collect(),
            evars: data
                .get_optional::<BTreeMap<String, String>>("evars")
                .unwrap_or_default()
                .into_iter()
                .map(|(name, value)| Evar {
                    name,
                    value,
                    export: true,
                    masked: false,
                })
                .collect(),
            labels: data.get_optional("labels").unwrap_or_default(),
            layout_size: data.get_optional("scale").unwrap_or(1),
            power_schedule_type: data.get_optional("power_schedule_id"),
            clone_name: None,
        }
    }

    async fn clone_from(&self, source_id: i64, mut body: CreateInstanceBody) -> Result<Instance> {
        let clone_name = std::mem::take(&mut body.instance.name);
        body.clone_name = Some(clone_name.clone());

        info!("Cloning instance {} as '{}'", source_id, clone_name);
        let answer = self
            .policy
            .run(|| self.api.clone_instance(source_id, &body))
            .await?;
        if !answer.success {
            return Err(Error::protocol(answer.message));
        }

        poll_unique(&self.poll_policy, &clone_name, || {
            self.api.list_instances(&clone_name)
        })
        .await
    }

    fn has_changed_any(data: &ResourceData, fields: &[&str]) -> bool {
        fields.iter().any(|f| data.has_changed_element(f))
    }
}

#[async_trait]
impl Resource for InstanceResource {
    async fn create(&self, data: &mut ResourceData) -> Result<()> {
        debug!("Creating new instance");

        let body = Self::build_create_body(data);
        let clone_source = data.get_optional::<i64>("clone_source_id");
        data.error()?;

        let instance = match clone_source {
            Some(source_id) => self.clone_from(source_id, body).await?,
            None => self
                .policy
                .run(|| self.api.create_instance(&body))
                .await?
                .instance
                .ok_or_else(|| Error::protocol("create answer carries no instance"))?,
        };

        info!("Instance '{}' has id {}", instance.name, instance.id);
        data.set_id(instance.id);

        data.error()
    }

    async fn read(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id();
        debug!("Get instance with ID {}", id);
        data.error()?;

        let instance = self
            .policy
            .run(|| self.api.get_instance(id))
            .await?
            .instance
            .ok_or_else(|| Error::protocol(format!("instance {} missing from answer", id)))?;

        let declared = data.get_optional::<Vec<Entry>>("volume").unwrap_or_default();
        if declared.len() > instance.volumes.len() {
            warn!(
                "Instance {} reports {} volume(s) for {} declared",
                id,
                instance.volumes.len(),
                declared.len()
            );
        }
        for (i, volume) in instance.volumes.iter().take(declared.len()).enumerate() {
            data.set(&format!("volume.{}.id", i), volume.id);
        }
        data.set_id(instance.id);
        data.set("status", instance.status);

        data.error()
    }

    async fn update(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id();
        debug!("Updating instance {}", id);

        let fixed: Vec<&str> = FIXED_FIELDS
            .iter()
            .copied()
            .filter(|field| data.has_changed_element(field))
            .collect();
        if !fixed.is_empty() {
            return Err(Error::validation(format!(
                "{} cannot be changed in place",
                fixed.join(", ")
            )));
        }

        if Self::has_changed_any(data, IDENTITY_FIELDS) {
            let (previous_tags, new_tags) = data.get_changed_string_map("tags");
            let tags = compare_maps(&previous_tags, &new_tags);

            let body = UpdateInstanceBody {
                instance: UpdateInstanceSpec {
                    name: data.get_string("name"),
                    site: IdRef::new(data.get_int("group_id")),
                    add_tags: tags
                        .additions
                        .into_iter()
                        .map(|(name, value)| Tag::new(name, value))
                        .collect(),
                    remove_tags: tags
                        .removals
                        .into_iter()
                        .map(|(name, value)| Tag::new(name, value))
                        .collect(),
                    labels: data.get_optional("labels").unwrap_or_default(),
                    power_schedule_type: data.get_optional("power_schedule_id"),
                },
            };
            data.error()?;

            self.policy
                .run(|| self.api.update_instance(id, &body))
                .await?;
            info!("Updated identity of instance {}", id);
        }

        if Self::has_changed_any(data, SIZING_FIELDS) {
            let (previous, declared) = data.get_changed_list_of_maps("volume");
            let volumes = compare_named_collections(&previous, declared);

            let body = ResizeInstanceBody {
                instance: ResizeInstanceSpec {
                    plan: IdRef::new(data.get_int("plan_id")),
                },
                volumes: volume_models(data, volumes),
            };
            data.error()?;

            self.policy
                .run(|| self.api.resize_instance(id, &body))
                .await?;
            info!("Resized instance {}", id);
        }

        data.error()
    }

    async fn delete(&self, data: &mut ResourceData) -> Result<()> {
        let id = data.require_id();
        debug!("Deleting instance with ID {}", id);
        data.error()?;

        let answer = self.policy.run(|| self.api.delete_instance(id)).await?;
        if !answer.success {
            return Err(Error::protocol(answer.message));
        }
        data.clear_id();

        data.error()
    }

    fn resource_type(&self) -> &'static str {
        Self::TYPE
    }

    fn computed_fields(&self) -> &'static [&'static str] {
        &["status", "volume.*.id"]
    }
}

/// Volume entries as sent to the API. Entries without an `id` are new.
fn volume_models(data: &mut ResourceData, entries: Vec<Entry>) -> Vec<Volume> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let prefix = format!("volume.{}", i);
            Volume {
                id: match entry.get("id") {
                    Some(_) => data.get_entry_field(entry, &prefix, "id"),
                    None => NEW_ENTITY_ID,
                },
                root_volume: data
                    .get_optional(&format!("{}.root", prefix))
                    .unwrap_or_default(),
                name: data.get_entry_field(entry, &prefix, "name"),
                size: data.get_entry_field(entry, &prefix, "size"),
                datastore_id: entry.get("datastore_id").cloned().unwrap_or(Value::Null),
            }
        })
        .collect()
}
