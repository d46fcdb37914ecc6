//! Common test utilities for the integration tests
//!
//! Provides an in-memory [`KubeStore`] that behaves like the API server closely
//! enough for the desirers and reconcilers: generated names and UIDs, equality
//! label and field selectors, merge patches, and injectable failures.

#![allow(dead_code, reason = "each test binary uses a different subset of the helpers")]

use async_trait::async_trait;
use korifi_workload_runner::crd::{Lrp, LrpSpec, Task, TaskSpec};
use korifi_workload_runner::store::{KubeStore, ListSelector, StoreError, StoreObject};
use kube::api::ObjectMeta;
use kube::Resource;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Once};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests that start TLS servers
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

/// A recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub verb: &'static str,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

/// Error returned by an injected failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Internal,
    NotFound,
    AlreadyExists,
}

impl Failure {
    fn to_error(self, verb: &str, kind: &str) -> StoreError {
        match self {
            Failure::Internal => StoreError::Api {
                code: 500,
                reason: "InternalError".to_string(),
                message: format!("boom: {verb} {kind}"),
            },
            Failure::NotFound => StoreError::NotFound(format!("{kind} not found")),
            Failure::AlreadyExists => StoreError::AlreadyExists(format!("{kind} already exists")),
        }
    }
}

type Key = (String, String, String);

#[derive(Debug, Default)]
pub struct FakeStore {
    objects: Mutex<BTreeMap<Key, Value>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<Vec<(&'static str, String, Failure)>>,
    counter: AtomicU64,
}

fn kind_of<K: StoreObject>() -> String {
    K::kind(&()).to_string()
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `verb` call on `kind` fail
    pub fn fail_on(&self, verb: &'static str, kind: &str, failure: Failure) {
        self.failures
            .lock()
            .unwrap()
            .push((verb, kind.to_string(), failure));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, verb: &str, kind: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.verb == verb && c.kind == kind)
            .count()
    }

    /// Seed an object directly, assigning a UID when it has none
    pub fn insert<K: StoreObject>(&self, mut obj: K) -> K {
        let meta = obj.meta_mut();
        if meta.uid.is_none() {
            meta.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        let key = (
            kind_of::<K>(),
            meta.namespace.clone().unwrap_or_default(),
            meta.name.clone().unwrap_or_default(),
        );
        let value = serde_json::to_value(&obj).unwrap();
        self.objects.lock().unwrap().insert(key, value);
        obj
    }

    pub fn object<K: StoreObject>(&self, namespace: &str, name: &str) -> Option<K> {
        let key = (kind_of::<K>(), namespace.to_string(), name.to_string());
        self.objects
            .lock()
            .unwrap()
            .get(&key)
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    pub fn objects<K: StoreObject>(&self, namespace: &str) -> Vec<K> {
        let kind = kind_of::<K>();
        self.objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && ns == namespace)
            .map(|(_, v)| serde_json::from_value(v.clone()).unwrap())
            .collect()
    }

    fn record<K: StoreObject>(&self, verb: &'static str, namespace: &str, name: &str) -> Result<(), StoreError> {
        let kind = kind_of::<K>();
        self.calls.lock().unwrap().push(Call {
            verb,
            kind: kind.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        let failure = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|(v, k, _)| *v == verb && *k == kind)
            .map(|(_, _, f)| *f);
        match failure {
            Some(failure) => Err(failure.to_error(verb, &kind)),
            None => Ok(()),
        }
    }

    fn matching(&self, kind: &str, namespace: &str, selector: &ListSelector) -> Vec<(Key, Value)> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((k, ns, _), _)| k == kind && ns == namespace)
            .filter(|(_, v)| matches_selector(v, selector))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn apply_patch<K: StoreObject>(&self, namespace: &str, name: &str, patch: &Value) -> Result<K, StoreError> {
        let key = (kind_of::<K>(), namespace.to_string(), name.to_string());
        let mut objects = self.objects.lock().unwrap();
        let Some(current) = objects.get_mut(&key) else {
            return Err(StoreError::NotFound(format!("{} \"{name}\" not found", key.0)));
        };
        json_patch::merge(current, patch);
        Ok(serde_json::from_value(current.clone())?)
    }
}

fn matches_selector(obj: &Value, selector: &ListSelector) -> bool {
    let labels_match = selector.labels.iter().all(|(key, value)| {
        obj.pointer("/metadata/labels")
            .and_then(|labels| labels.get(key))
            .and_then(Value::as_str)
            == Some(value.as_str())
    });
    let fields_match = selector.fields.iter().all(|(path, value)| {
        let found = path
            .split('.')
            .try_fold(obj, |current, segment| current.get(segment));
        match found {
            Some(Value::String(s)) => s == value,
            Some(other) => other.to_string() == *value,
            None => false,
        }
    });
    labels_match && fields_match
}

#[async_trait]
impl KubeStore for FakeStore {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        self.record::<K>("get", namespace, name)?;
        self.object(namespace, name)
            .ok_or_else(|| StoreError::NotFound(format!("{} \"{name}\" not found", kind_of::<K>())))
    }

    async fn list<K: StoreObject>(&self, namespace: &str, selector: &ListSelector) -> Result<Vec<K>, StoreError> {
        self.record::<K>("list", namespace, "")?;
        self.matching(&kind_of::<K>(), namespace, selector)
            .into_iter()
            .map(|(_, v)| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }

    async fn create<K: StoreObject>(&self, namespace: &str, obj: &K) -> Result<K, StoreError> {
        let mut obj = obj.clone();
        let meta: &mut ObjectMeta = obj.meta_mut();
        if meta.name.as_deref().unwrap_or_default().is_empty() {
            if let Some(prefix) = meta.generate_name.clone() {
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                meta.name = Some(format!("{prefix}{n:05}"));
            }
        }
        meta.namespace = Some(namespace.to_string());
        meta.uid = Some(uuid::Uuid::new_v4().to_string());
        meta.resource_version = Some("1".to_string());
        let name = meta.name.clone().unwrap_or_default();

        self.record::<K>("create", namespace, &name)?;
        if self.object::<K>(namespace, &name).is_some() {
            return Err(StoreError::AlreadyExists(format!(
                "{} \"{name}\" already exists",
                kind_of::<K>()
            )));
        }
        Ok(self.insert(obj))
    }

    async fn replace<K: StoreObject>(&self, namespace: &str, name: &str, obj: &K) -> Result<K, StoreError> {
        self.record::<K>("replace", namespace, name)?;
        if self.object::<K>(namespace, name).is_none() {
            return Err(StoreError::NotFound(format!("{} \"{name}\" not found", kind_of::<K>())));
        }
        Ok(self.insert(obj.clone()))
    }

    async fn patch<K: StoreObject>(&self, namespace: &str, name: &str, patch: &Value) -> Result<K, StoreError> {
        self.record::<K>("patch", namespace, name)?;
        self.apply_patch(namespace, name, patch)
    }

    async fn patch_status<K: StoreObject>(&self, namespace: &str, name: &str, patch: &Value) -> Result<K, StoreError> {
        self.record::<K>("patch_status", namespace, name)?;
        self.apply_patch(namespace, name, patch)
    }

    async fn delete<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.record::<K>("delete", namespace, name)?;
        let key = (kind_of::<K>(), namespace.to_string(), name.to_string());
        match self.objects.lock().unwrap().remove(&key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("{} \"{name}\" not found", key.0))),
        }
    }

    async fn delete_collection<K: StoreObject>(&self, namespace: &str, selector: &ListSelector) -> Result<(), StoreError> {
        self.record::<K>("delete_collection", namespace, "")?;
        let doomed = self.matching(&kind_of::<K>(), namespace, selector);
        let mut objects = self.objects.lock().unwrap();
        for (key, _) in doomed {
            objects.remove(&key);
        }
        Ok(())
    }
}

pub fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(namespace.to_string()),
        name: Some(name.to_string()),
        ..ObjectMeta::default()
    }
}

pub fn lrp_spec() -> LrpSpec {
    LrpSpec {
        guid: "guid_1234".to_string(),
        version: "version_1234".to_string(),
        process_type: "web".to_string(),
        app_guid: "premium_app_guid_1234".to_string(),
        app_name: "Dora".to_string(),
        space_guid: "space-guid".to_string(),
        space_name: "space-foo".to_string(),
        org_guid: "org-guid".to_string(),
        org_name: "org-foo".to_string(),
        command: vec!["/bin/sh".to_string(), "-c".to_string(), "echo hello".to_string()],
        image: "gcr.io/foo/bar".to_string(),
        ports: vec![8888, 9999],
        instances: 1,
        memory_mb: 1024,
        disk_mb: 2048,
        cpu_weight: 2,
        ..LrpSpec::default()
    }
}

/// An LRP in `namespace`, seeded into the store with a UID
pub fn seed_lrp(store: &FakeStore, namespace: &str, spec: LrpSpec) -> Lrp {
    let mut lrp = Lrp::new("my-lrp", spec);
    lrp.metadata.namespace = Some(namespace.to_string());
    store.insert(lrp)
}

pub fn task_spec() -> TaskSpec {
    TaskSpec {
        guid: "task-guid".to_string(),
        name: "migrate".to_string(),
        image: "eirini/dorini".to_string(),
        command: vec!["/bin/sh".to_string(), "-c".to_string(), "rake db:migrate".to_string()],
        app_name: "my-app".to_string(),
        app_guid: "app-guid".to_string(),
        org_name: "my-org".to_string(),
        org_guid: "org-guid".to_string(),
        space_name: "my-space".to_string(),
        space_guid: "space-guid".to_string(),
        memory_mb: 256,
        disk_mb: 512,
        cpu_weight: 1,
        ..TaskSpec::default()
    }
}

pub fn seed_task(store: &FakeStore, namespace: &str, spec: TaskSpec) -> Task {
    let mut task = Task::new("my-task", spec);
    task.metadata.namespace = Some(namespace.to_string());
    store.insert(task)
}
