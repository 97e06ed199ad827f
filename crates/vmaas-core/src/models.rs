//! Request and response bodies of the cloud-management API
//!
//! Field names follow the API's camelCase wire format. Only the fields the
//! built-in resources read or write are modelled; unknown response fields are
//! ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to another remote object by identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: i64,
}

impl IdRef {
    pub fn new(id: i64) -> Self {
        Self { id }
    }
}

/// Body of `POST /api/instances` and `POST /api/instances/{id}/clone`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceBody {
    /// Cloud (zone) the instance is placed in
    pub zone_id: i64,
    pub instance: InstanceSpec,
    pub volumes: Vec<Volume>,
    pub network_interfaces: Vec<NetworkInterface>,
    pub config: InstanceConfig,
    pub tags: Vec<Tag>,
    pub evars: Vec<Evar>,
    pub labels: Vec<String>,
    pub layout_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_schedule_type: Option<i64>,
    /// Name of the clone; set only on clone requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    pub name: String,
    /// Group the instance belongs to
    pub site: IdRef,
    pub instance_type: InstanceTypeRef,
    pub layout: IdRef,
    pub plan: IdRef,
    #[serde(rename = "type")]
    pub kind: String,
    pub host_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTypeRef {
    pub code: String,
}

/// A volume in create and resize requests.
///
/// `id` is [`NEW_ENTITY_ID`](crate::diff::NEW_ENTITY_ID) for a volume the
/// request asks to create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: i64,
    pub root_volume: bool,
    pub name: String,
    pub size: i64,
    /// Datastore identity, or a selector such as `"auto"`
    pub datastore_id: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub network: IdRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    /// Virtual image; required for the `vmware` instance type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<i64>,
    pub resource_pool_id: i64,
    pub no_agent: String,
    #[serde(rename = "vmwareFolderId")]
    pub vmware_folder_id: String,
    pub create_user: bool,
    pub smbios_asset_tag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Environment variable exported into the instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evar {
    pub name: String,
    pub value: String,
    pub export: bool,
    pub masked: bool,
}

/// Body of `PUT /api/instances/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateInstanceBody {
    pub instance: UpdateInstanceSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInstanceSpec {
    pub name: String,
    pub site: IdRef,
    pub add_tags: Vec<Tag>,
    pub remove_tags: Vec<Tag>,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_schedule_type: Option<i64>,
}

/// Body of `PUT /api/instances/{id}/resize`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResizeInstanceBody {
    pub instance: ResizeInstanceSpec,
    pub volumes: Vec<Volume>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeInstanceSpec {
    pub plan: IdRef,
}

/// An instance as reported by the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Instance {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub volumes: Vec<InstanceVolume>,
    pub labels: Vec<String>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceVolume {
    pub id: i64,
    pub name: String,
    pub size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetInstanceResponse {
    pub instance: Option<Instance>,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstancesResponse {
    pub instances: Vec<Instance>,
}

/// Answer of calls that report failure in the body rather than the status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuccessOrErrorMessage {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Datastore {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoresResponse {
    pub datastores: Vec<Datastore>,
}

/// SSL server profile of a load balancer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancerProfile {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadBalancerProfilesResponse {
    pub load_balancer_profiles: Vec<LoadBalancerProfile>,
}
