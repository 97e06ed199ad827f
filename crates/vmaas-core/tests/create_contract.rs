//! Contract Test: Create and Clone
//!
//! Constraints verified:
//! - Every malformed field is reported at once, before any remote call
//! - A plain create records the identity from the create answer
//! - A clone resolves its identity by polling for the declared name
//! - A clone reported as failed surfaces the API message verbatim
//! - An ambiguous poll stops at once; an empty poll gives up after its budget

mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;
use vmaas_core::data::ResourceData;
use vmaas_core::diff::NEW_ENTITY_ID;
use vmaas_core::resources::InstanceResource;
use vmaas_core::traits::Resource;
use vmaas_core::{Error, FieldErrorKind};

#[tokio::test]
async fn create_records_identity_from_answer() {
    let api = Arc::new(ScriptedApi::new(instance(42, "web-1", "provisioning", &[])));
    let resource = instance_resource(&api);

    let mut data = ResourceData::new(web_declaration());
    tokio_test::assert_ok!(resource.create(&mut data).await);

    assert_eq!(data.id(), Some(42));
    assert_eq!(api.calls(), vec!["create"]);

    let body = &api.created()[0];
    assert_eq!(body.zone_id, 1);
    assert_eq!(body.instance.name, "web-1");
    assert_eq!(body.instance.kind, "vmware");
    assert_eq!(body.instance.instance_type.code, "vmware");
    assert_eq!(body.instance.plan.id, 3);
    assert_eq!(body.config.template, Some(7));
    assert_eq!(body.layout_size, 1);
    assert_eq!(body.network_interfaces[0].network.id, 10);
    assert_eq!(body.volumes[0].id, NEW_ENTITY_ID);
    assert!(body.volumes[0].root_volume);
    assert_eq!(body.tags.len(), 2);
    assert!(body.clone_name.is_none());
}

#[tokio::test]
async fn every_malformed_field_is_reported_before_any_call() {
    let api = Arc::new(ScriptedApi::new(instance(42, "web-1", "running", &[])));
    let resource = instance_resource(&api);

    let mut declared = web_declaration();
    let doc = declared.as_object_mut().unwrap();
    doc.remove("cloud_id");
    doc.insert("plan_id".into(), json!("large"));
    doc.insert("config".into(), json!({ "resource_pool_id": 6 }));

    let mut data = ResourceData::new(declared);
    let err = resource.create(&mut data).await.unwrap_err();

    let Error::Extraction(errors) = err else {
        panic!("expected extraction errors, got {:?}", err);
    };
    let mut paths: Vec<&str> = errors.fields().iter().map(|e| e.path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["cloud_id", "config.template", "plan_id"]);
    assert!(errors.fields().iter().any(|e| matches!(
        e.kind,
        FieldErrorKind::WrongType {
            expected: "integer",
            found: "string"
        }
    )));
    assert_eq!(api.call_count(), 0, "no remote call before the pre-check");
}

#[tokio::test]
async fn template_is_optional_for_other_instance_types() {
    let api = Arc::new(ScriptedApi::new(instance(43, "web-1", "running", &[])));
    let resource = instance_resource(&api);

    let mut declared = web_declaration();
    declared["instance_code"] = json!("kvm");
    declared["config"] = json!({ "resource_pool_id": 6 });

    let mut data = ResourceData::new(declared);
    tokio_test::assert_ok!(resource.create(&mut data).await);
    assert_eq!(api.created()[0].config.template, None);
}

#[tokio::test]
async fn clone_resolves_identity_after_empty_polls() {
    let api = Arc::new(ScriptedApi::new(instance(0, "", "", &[])));
    api.push_clone(Ok(succeeded()));
    api.push_list(Ok(vec![]));
    api.push_list(Ok(vec![]));
    api.push_list(Ok(vec![instance(77, "web-1", "provisioning", &[])]));
    let resource = instance_resource(&api);

    let mut declared = web_declaration();
    declared["clone_source_id"] = json!(99);
    let mut data = ResourceData::new(declared);

    tokio_test::assert_ok!(resource.create(&mut data).await);

    assert_eq!(data.id(), Some(77));
    assert_eq!(
        api.calls(),
        vec!["clone:99", "list:web-1", "list:web-1", "list:web-1"]
    );

    let body = &api.cloned()[0];
    assert_eq!(body.clone_name.as_deref(), Some("web-1"));
    assert_eq!(body.instance.name, "");
    assert!(api.created().is_empty());
}

#[tokio::test]
async fn failed_clone_surfaces_message_verbatim() {
    let api = Arc::new(ScriptedApi::new(instance(0, "", "", &[])));
    api.push_clone(Ok(failed("source instance is locked")));
    let resource = instance_resource(&api);

    let mut declared = web_declaration();
    declared["clone_source_id"] = json!(99);
    let mut data = ResourceData::new(declared);

    let err = resource.create(&mut data).await.unwrap_err();

    assert!(matches!(err, Error::Protocol(_)));
    assert_eq!(err.to_string(), "source instance is locked");
    assert_eq!(api.calls(), vec!["clone:99"]);
    assert_eq!(data.id(), None);
}

#[tokio::test]
async fn ambiguous_clone_poll_is_terminal() {
    let api = Arc::new(ScriptedApi::new(instance(0, "", "", &[])));
    api.push_list(Ok(vec![
        instance(77, "web-1", "running", &[]),
        instance(78, "web-1", "running", &[]),
    ]));
    let resource = instance_resource(&api);

    let mut declared = web_declaration();
    declared["clone_source_id"] = json!(99);
    let mut data = ResourceData::new(declared);

    let err = resource.create(&mut data).await.unwrap_err();

    assert!(matches!(err, Error::AmbiguousMatch { count: 2, .. }));
    assert_eq!(api.calls(), vec!["clone:99", "list:web-1"]);
}

#[tokio::test]
async fn clone_that_never_appears_is_distinguished() {
    let api = Arc::new(ScriptedApi::new(instance(0, "", "", &[])));
    let resource =
        InstanceResource::with_policies(api.clone(), fast_policy(), fast_poll_policy(3));

    let mut declared = web_declaration();
    declared["clone_source_id"] = json!(99);
    let mut data = ResourceData::new(declared);

    let err = resource.create(&mut data).await.unwrap_err();

    match err {
        Error::NotVisible { key, attempts } => {
            assert_eq!(key, "web-1");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected not visible, got {:?}", other),
    }
    assert_eq!(api.call_count(), 4);
}

#[tokio::test]
async fn mistyped_clone_source_blocks_the_clone() {
    let api = Arc::new(ScriptedApi::new(instance(0, "", "", &[])));
    let resource = instance_resource(&api);

    let mut declared = web_declaration();
    declared["clone_source_id"] = json!("ninety-nine");
    let mut data = ResourceData::new(declared);

    let err = resource.create(&mut data).await.unwrap_err();
    assert!(matches!(err, Error::Extraction(_)));
    assert_eq!(api.call_count(), 0);
}
