//! # LRP Reconciler Tests
//!
//! Drives the LRP reconciler, desirer, updater and PDB updater against the
//! in-memory store.

mod common;

use common::{lrp_spec, seed_lrp, FakeStore, Failure};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use korifi_workload_runner::config::WorkloadConfig;
use korifi_workload_runner::crd::{Lrp, PrivateRegistry};
use korifi_workload_runner::runtime::initialization::lrp_reconciler;
use korifi_workload_runner::store::KubeStore;
use korifi_workload_runner::workload::naming::statefulset_name;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use serde_json::json;
use std::sync::Arc;

const NAMESPACE: &str = "workloads";

fn setup() -> Arc<FakeStore> {
    Arc::new(FakeStore::new())
}

#[tokio::test]
async fn test_missing_lrp_is_ignored() {
    let store = setup();
    let reconciler = lrp_reconciler(Arc::clone(&store), &WorkloadConfig::default());

    let action = reconciler.reconcile(NAMESPACE, "gone").await.expect("reconcile");

    assert_eq!(action, Action::await_change());
    assert_eq!(store.count("create", "StatefulSet"), 0);
}

#[tokio::test]
async fn test_lrp_without_statefulset_is_desired() {
    let store = setup();
    let lrp = seed_lrp(&store, NAMESPACE, lrp_spec());
    let reconciler = lrp_reconciler(Arc::clone(&store), &WorkloadConfig::default());

    reconciler.reconcile(NAMESPACE, "my-lrp").await.expect("reconcile");

    let stset: StatefulSet = store
        .object(NAMESPACE, &statefulset_name(&lrp.spec))
        .expect("statefulset created");
    let owner = &stset.owner_references()[0];
    assert_eq!(owner.kind, "LRP");
    assert_eq!(owner.name, "my-lrp");
    assert_eq!(Some(&owner.uid), lrp.uid().as_ref());
    assert_eq!(owner.controller, Some(true));
    assert_eq!(stset.spec.as_ref().and_then(|s| s.replicas), Some(1));

    assert!(
        store.objects::<PodDisruptionBudget>(NAMESPACE).is_empty(),
        "single instance LRPs get no disruption budget"
    );
}

#[tokio::test]
async fn test_multi_instance_lrp_gets_disruption_budget() {
    let store = setup();
    let mut spec = lrp_spec();
    spec.instances = 3;
    let lrp = seed_lrp(&store, NAMESPACE, spec);
    let reconciler = lrp_reconciler(Arc::clone(&store), &WorkloadConfig::default());

    reconciler.reconcile(NAMESPACE, "my-lrp").await.expect("reconcile");

    let name = statefulset_name(&lrp.spec);
    let pdb: PodDisruptionBudget = store.object(NAMESPACE, &name).expect("pdb created");
    let spec = pdb.spec.as_ref().expect("pdb spec");
    assert_eq!(
        serde_json::to_value(&spec.min_available).expect("serializable"),
        json!("50%")
    );
    assert_eq!(pdb.owner_references()[0].kind, "StatefulSet");
    assert_eq!(pdb.owner_references()[0].name, name);
}

#[tokio::test]
async fn test_private_registry_secret_is_owned_by_statefulset() {
    let store = setup();
    let mut spec = lrp_spec();
    spec.image = "private-registry.io/user/repo".to_string();
    spec.private_registry = Some(PrivateRegistry {
        username: "docker-user".to_string(),
        password: "docker-password".to_string(),
    });
    let lrp = seed_lrp(&store, NAMESPACE, spec);
    let reconciler = lrp_reconciler(Arc::clone(&store), &WorkloadConfig::default());

    reconciler.reconcile(NAMESPACE, "my-lrp").await.expect("reconcile");

    let secrets = store.objects::<Secret>(NAMESPACE);
    assert_eq!(secrets.len(), 1);
    let secret = &secrets[0];
    assert!(secret.name_any().starts_with("private-registry-"));
    assert_eq!(secret.owner_references()[0].kind, "StatefulSet");
    assert_eq!(secret.owner_references()[0].name, statefulset_name(&lrp.spec));

    let stset: StatefulSet = store
        .object(NAMESPACE, &statefulset_name(&lrp.spec))
        .expect("statefulset created");
    let pull_secrets: Vec<String> = stset
        .spec
        .and_then(|s| s.template.spec)
        .and_then(|s| s.image_pull_secrets)
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(pull_secrets, vec!["app-registry-credentials".to_string(), secret.name_any()]);
}

#[tokio::test]
async fn test_failed_statefulset_creation_removes_registry_secret() {
    let store = setup();
    let mut spec = lrp_spec();
    spec.private_registry = Some(PrivateRegistry {
        username: "docker-user".to_string(),
        password: "docker-password".to_string(),
    });
    seed_lrp(&store, NAMESPACE, spec);
    store.fail_on("create", "StatefulSet", Failure::Internal);
    let reconciler = lrp_reconciler(Arc::clone(&store), &WorkloadConfig::default());

    let err = reconciler
        .reconcile(NAMESPACE, "my-lrp")
        .await
        .expect_err("creation must fail");

    let message = err.to_string();
    assert!(message.contains("failed to desire lrp"), "{message}");
    assert!(message.contains("failed to create statefulset"), "{message}");
    assert!(store.objects::<Secret>(NAMESPACE).is_empty(), "secret must be rolled back");
    assert_eq!(store.count("delete", "Secret"), 1);
}

#[tokio::test]
async fn test_failed_rollback_reports_both_errors() {
    let store = setup();
    let mut spec = lrp_spec();
    spec.private_registry = Some(PrivateRegistry {
        username: "docker-user".to_string(),
        password: "docker-password".to_string(),
    });
    seed_lrp(&store, NAMESPACE, spec);
    store.fail_on("create", "StatefulSet", Failure::Internal);
    store.fail_on("delete", "Secret", Failure::Internal);
    let reconciler = lrp_reconciler(Arc::clone(&store), &WorkloadConfig::default());

    let err = reconciler
        .reconcile(NAMESPACE, "my-lrp")
        .await
        .expect_err("creation must fail");

    let message = err.to_string();
    assert!(message.contains("failed to create statefulset"), "{message}");
    assert!(message.contains("failed to cleanup registry secret"), "{message}");
    assert_eq!(store.count("delete", "Secret"), 1);
}

#[tokio::test]
async fn test_statefulset_that_already_exists_is_not_an_error() {
    let store = setup();
    let mut spec = lrp_spec();
    spec.private_registry = Some(PrivateRegistry {
        username: "docker-user".to_string(),
        password: "docker-password".to_string(),
    });
    seed_lrp(&store, NAMESPACE, spec);
    store.fail_on("create", "StatefulSet", Failure::AlreadyExists);
    let reconciler = lrp_reconciler(Arc::clone(&store), &WorkloadConfig::default());

    reconciler.reconcile(NAMESPACE, "my-lrp").await.expect("reconcile");

    assert_eq!(store.count("create", "StatefulSet"), 1);
    assert_eq!(store.count("delete", "Secret"), 0);
    assert_eq!(store.objects::<Secret>(NAMESPACE).len(), 1);
}

#[tokio::test]
async fn test_existing_statefulset_is_not_recreated() {
    let store = setup();
    let lrp = seed_lrp(&store, NAMESPACE, lrp_spec());
    let reconciler = lrp_reconciler(Arc::clone(&store), &WorkloadConfig::default());

    reconciler.reconcile(NAMESPACE, "my-lrp").await.expect("first reconcile");
    reconciler.reconcile(NAMESPACE, "my-lrp").await.expect("second reconcile");

    assert_eq!(store.count("create", "StatefulSet"), 1);
    assert_eq!(store.objects::<StatefulSet>(NAMESPACE).len(), 1);
    assert!(store.object::<StatefulSet>(NAMESPACE, &statefulset_name(&lrp.spec)).is_some());
}

#[tokio::test]
async fn test_ready_replicas_are_copied_to_lrp_status() {
    let store = setup();
    let lrp = seed_lrp(&store, NAMESPACE, lrp_spec());
    let reconciler = lrp_reconciler(Arc::clone(&store), &WorkloadConfig::default());
    reconciler.reconcile(NAMESPACE, "my-lrp").await.expect("desire");

    let _: StatefulSet = store
        .patch_status(
            NAMESPACE,
            &statefulset_name(&lrp.spec),
            &json!({ "status": { "replicas": 1, "readyReplicas": 1 } }),
        )
        .await
        .expect("status patched");

    reconciler.reconcile(NAMESPACE, "my-lrp").await.expect("reconcile");

    let lrp: Lrp = store.object(NAMESPACE, "my-lrp").expect("lrp");
    assert_eq!(lrp.status.map(|s| s.replicas), Some(1));
}

#[tokio::test]
async fn test_scaling_and_new_image_patch_statefulset() {
    let store = setup();
    let lrp = seed_lrp(&store, NAMESPACE, lrp_spec());
    let reconciler = lrp_reconciler(Arc::clone(&store), &WorkloadConfig::default());
    reconciler.reconcile(NAMESPACE, "my-lrp").await.expect("desire");

    let _: Lrp = store
        .patch(
            NAMESPACE,
            "my-lrp",
            &json!({ "spec": { "instances": 4, "image": "gcr.io/foo/bar:v2" } }),
        )
        .await
        .expect("lrp patched");

    reconciler.reconcile(NAMESPACE, "my-lrp").await.expect("reconcile");

    let name = statefulset_name(&lrp.spec);
    let stset: StatefulSet = store.object(NAMESPACE, &name).expect("statefulset");
    let spec = stset.spec.expect("spec");
    assert_eq!(spec.replicas, Some(4));
    let containers = spec.template.spec.expect("pod spec").containers;
    assert_eq!(containers[0].name, "opi");
    assert_eq!(containers[0].image.as_deref(), Some("gcr.io/foo/bar:v2"));

    assert!(
        store.object::<PodDisruptionBudget>(NAMESPACE, &name).is_some(),
        "scaling above one instance creates a disruption budget"
    );
}

#[tokio::test]
async fn test_scaling_down_to_one_instance_removes_disruption_budget() {
    let store = setup();
    let mut spec = lrp_spec();
    spec.instances = 2;
    let lrp = seed_lrp(&store, NAMESPACE, spec);
    let reconciler = lrp_reconciler(Arc::clone(&store), &WorkloadConfig::default());
    reconciler.reconcile(NAMESPACE, "my-lrp").await.expect("desire");
    let name = statefulset_name(&lrp.spec);
    assert!(store.object::<PodDisruptionBudget>(NAMESPACE, &name).is_some());

    let _: Lrp = store
        .patch(NAMESPACE, "my-lrp", &json!({ "spec": { "instances": 1 } }))
        .await
        .expect("lrp patched");
    reconciler.reconcile(NAMESPACE, "my-lrp").await.expect("reconcile");

    assert!(store.object::<PodDisruptionBudget>(NAMESPACE, &name).is_none());
}

#[tokio::test]
async fn test_failing_statefulset_lookup_is_reported() {
    let store = setup();
    seed_lrp(&store, NAMESPACE, lrp_spec());
    store.fail_on("get", "StatefulSet", Failure::Internal);
    let reconciler = lrp_reconciler(Arc::clone(&store), &WorkloadConfig::default());

    let err = reconciler
        .reconcile(NAMESPACE, "my-lrp")
        .await
        .expect_err("lookup must fail");

    assert!(err.to_string().contains("failed to get statefulSet"), "{err}");
    assert_eq!(store.count("create", "StatefulSet"), 0);
}

#[tokio::test]
async fn test_status_and_update_errors_are_both_reported() {
    let store = setup();
    let mut spec = lrp_spec();
    spec.instances = 1;
    seed_lrp(&store, NAMESPACE, spec);
    let reconciler = lrp_reconciler(Arc::clone(&store), &WorkloadConfig::default());
    reconciler.reconcile(NAMESPACE, "my-lrp").await.expect("desire");

    let _: Lrp = store
        .patch(NAMESPACE, "my-lrp", &json!({ "spec": { "instances": 2 } }))
        .await
        .expect("lrp patched");
    store.fail_on("patch_status", "LRP", Failure::Internal);
    store.fail_on("patch", "StatefulSet", Failure::Internal);

    let err = reconciler
        .reconcile(NAMESPACE, "my-lrp")
        .await
        .expect_err("both steps fail");

    let message = err.to_string();
    assert!(message.contains("failed to update lrp status"), "{message}");
    assert!(message.contains("failed to update app"), "{message}");
}
