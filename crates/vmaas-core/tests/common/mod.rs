//! Test doubles and common utilities for lifecycle contract tests
//!
//! [`ScriptedApi`] answers each remote call from a per-operation script and
//! records every call in order, so tests can assert exactly which calls a
//! lifecycle operation issued.

#![allow(dead_code)]

use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vmaas_core::error::Result;
use vmaas_core::models::{
    CreateInstanceBody, Datastore, GetInstanceResponse, Instance, InstanceVolume,
    LoadBalancerProfile, ResizeInstanceBody, SuccessOrErrorMessage, UpdateInstanceBody,
};
use vmaas_core::resources::{DatastoreDataSource, InstanceResource, SslServerProfileDataSource};
use vmaas_core::retry::RetryPolicy;
use vmaas_core::traits::{CloudApi, InstanceApi};

type Script<T> = Mutex<VecDeque<Result<T>>>;

/// A scripted InstanceApi and CloudApi that records calls
///
/// Unscripted calls succeed with the instance set by [`ScriptedApi::new`].
pub struct ScriptedApi {
    /// Calls in the order they were issued, e.g. `"resize:42"`
    calls: Arc<Mutex<Vec<String>>>,
    /// Total number of calls
    call_count: Arc<AtomicUsize>,

    instance: Instance,

    create_answers: Script<GetInstanceResponse>,
    clone_answers: Script<SuccessOrErrorMessage>,
    list_answers: Script<Vec<Instance>>,
    get_answers: Script<GetInstanceResponse>,
    update_answers: Script<GetInstanceResponse>,
    resize_answers: Script<GetInstanceResponse>,
    delete_answers: Script<SuccessOrErrorMessage>,
    datastore_answers: Script<Vec<Datastore>>,
    ssl_profile_answers: Script<Vec<LoadBalancerProfile>>,

    created: Mutex<Vec<CreateInstanceBody>>,
    cloned: Mutex<Vec<CreateInstanceBody>>,
    updated: Mutex<Vec<UpdateInstanceBody>>,
    resized: Mutex<Vec<ResizeInstanceBody>>,
}

impl ScriptedApi {
    pub fn new(instance: Instance) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            instance,
            create_answers: Mutex::default(),
            clone_answers: Mutex::default(),
            list_answers: Mutex::default(),
            get_answers: Mutex::default(),
            update_answers: Mutex::default(),
            resize_answers: Mutex::default(),
            delete_answers: Mutex::default(),
            datastore_answers: Mutex::default(),
            ssl_profile_answers: Mutex::default(),
            created: Mutex::default(),
            cloned: Mutex::default(),
            updated: Mutex::default(),
            resized: Mutex::default(),
        }
    }

    /// Get the calls issued so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Get the number of calls issued so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn push_create(&self, answer: Result<GetInstanceResponse>) {
        self.create_answers.lock().unwrap().push_back(answer);
    }

    pub fn push_clone(&self, answer: Result<SuccessOrErrorMessage>) {
        self.clone_answers.lock().unwrap().push_back(answer);
    }

    pub fn push_list(&self, answer: Result<Vec<Instance>>) {
        self.list_answers.lock().unwrap().push_back(answer);
    }

    pub fn push_get(&self, answer: Result<GetInstanceResponse>) {
        self.get_answers.lock().unwrap().push_back(answer);
    }

    pub fn push_update(&self, answer: Result<GetInstanceResponse>) {
        self.update_answers.lock().unwrap().push_back(answer);
    }

    pub fn push_resize(&self, answer: Result<GetInstanceResponse>) {
        self.resize_answers.lock().unwrap().push_back(answer);
    }

    pub fn push_delete(&self, answer: Result<SuccessOrErrorMessage>) {
        self.delete_answers.lock().unwrap().push_back(answer);
    }

    pub fn push_datastores(&self, answer: Result<Vec<Datastore>>) {
        self.datastore_answers.lock().unwrap().push_back(answer);
    }

    pub fn push_ssl_profiles(&self, answer: Result<Vec<LoadBalancerProfile>>) {
        self.ssl_profile_answers.lock().unwrap().push_back(answer);
    }

    pub fn created(&self) -> Vec<CreateInstanceBody> {
        self.created.lock().unwrap().clone()
    }

    pub fn cloned(&self) -> Vec<CreateInstanceBody> {
        self.cloned.lock().unwrap().clone()
    }

    pub fn updated(&self) -> Vec<UpdateInstanceBody> {
        self.updated.lock().unwrap().clone()
    }

    pub fn resized(&self) -> Vec<ResizeInstanceBody> {
        self.resized.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(call);
    }

    fn answer<T>(script: &Script<T>, default: impl FnOnce() -> T) -> Result<T> {
        script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(default()))
    }

    fn instance_answer(&self) -> GetInstanceResponse {
        found(self.instance.clone())
    }
}

#[async_trait::async_trait]
impl InstanceApi for ScriptedApi {
    async fn create_instance(&self, body: &CreateInstanceBody) -> Result<GetInstanceResponse> {
        self.record("create".to_string());
        self.created.lock().unwrap().push(body.clone());
        Self::answer(&self.create_answers, || self.instance_answer())
    }

    async fn clone_instance(
        &self,
        source_id: i64,
        body: &CreateInstanceBody,
    ) -> Result<SuccessOrErrorMessage> {
        self.record(format!("clone:{}", source_id));
        self.cloned.lock().unwrap().push(body.clone());
        Self::answer(&self.clone_answers, succeeded)
    }

    async fn list_instances(&self, name: &str) -> Result<Vec<Instance>> {
        self.record(format!("list:{}", name));
        Self::answer(&self.list_answers, Vec::new)
    }

    async fn get_instance(&self, id: i64) -> Result<GetInstanceResponse> {
        self.record(format!("get:{}", id));
        Self::answer(&self.get_answers, || self.instance_answer())
    }

    async fn update_instance(
        &self,
        id: i64,
        body: &UpdateInstanceBody,
    ) -> Result<GetInstanceResponse> {
        self.record(format!("update:{}", id));
        self.updated.lock().unwrap().push(body.clone());
        Self::answer(&self.update_answers, || self.instance_answer())
    }

    async fn resize_instance(
        &self,
        id: i64,
        body: &ResizeInstanceBody,
    ) -> Result<GetInstanceResponse> {
        self.record(format!("resize:{}", id));
        self.resized.lock().unwrap().push(body.clone());
        Self::answer(&self.resize_answers, || self.instance_answer())
    }

    async fn delete_instance(&self, id: i64) -> Result<SuccessOrErrorMessage> {
        self.record(format!("delete:{}", id));
        Self::answer(&self.delete_answers, succeeded)
    }
}

#[async_trait::async_trait]
impl CloudApi for ScriptedApi {
    async fn list_datastores(&self, cloud_id: i64, name: &str) -> Result<Vec<Datastore>> {
        self.record(format!("datastores:{}:{}", cloud_id, name));
        Self::answer(&self.datastore_answers, Vec::new)
    }

    async fn list_ssl_server_profiles(
        &self,
        lb_id: i64,
        name: &str,
    ) -> Result<Vec<LoadBalancerProfile>> {
        self.record(format!("ssl_profiles:{}:{}", lb_id, name));
        Self::answer(&self.ssl_profile_answers, Vec::new)
    }
}

/// An instance as the API reports it
pub fn instance(id: i64, name: &str, status: &str, volume_ids: &[i64]) -> Instance {
    Instance {
        id,
        name: name.to_string(),
        status: status.to_string(),
        volumes: volume_ids
            .iter()
            .map(|&id| InstanceVolume {
                id,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

pub fn found(instance: Instance) -> GetInstanceResponse {
    GetInstanceResponse {
        instance: Some(instance),
        success: true,
    }
}

pub fn succeeded() -> SuccessOrErrorMessage {
    SuccessOrErrorMessage {
        success: true,
        message: String::new(),
    }
}

pub fn failed(message: &str) -> SuccessOrErrorMessage {
    SuccessOrErrorMessage {
        success: false,
        message: message.to_string(),
    }
}

/// Standard policy with millisecond delays
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::standard()
        .with_delay(Duration::from_millis(1))
        .with_deadline(Duration::from_secs(5))
}

/// Clone poll policy with millisecond delays
pub fn fast_poll_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::custom(Duration::from_millis(1), Duration::from_secs(1), max_attempts)
}

pub fn instance_resource(api: &Arc<ScriptedApi>) -> InstanceResource {
    InstanceResource::with_policies(api.clone(), fast_policy(), fast_poll_policy(10))
}

pub fn datastore_source(api: &Arc<ScriptedApi>) -> DatastoreDataSource {
    DatastoreDataSource::with_policy(api.clone(), fast_policy())
}

pub fn ssl_profile_source(api: &Arc<ScriptedApi>) -> SslServerProfileDataSource {
    SslServerProfileDataSource::with_policy(api.clone(), fast_policy())
}

/// A complete, valid instance declaration
pub fn web_declaration() -> Value {
    json!({
        "name": "web-1",
        "cloud_id": 1,
        "group_id": 2,
        "plan_id": 3,
        "layout_id": 4,
        "instance_code": "vmware",
        "labels": ["web"],
        "tags": { "env": "prod", "team": "core" },
        "network": [{ "id": 10 }],
        "volume": [
            { "name": "root", "size": 20, "datastore_id": "auto", "root": true }
        ],
        "config": { "resource_pool_id": 6, "template": 7 }
    })
}
