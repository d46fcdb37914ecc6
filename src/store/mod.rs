//! # Store
//!
//! The slice of the Kubernetes API the workload runner needs, behind a trait
//! so reconcilers can be exercised against an in-memory store in tests.
//!
//! All objects handled here are namespaced. Patches are JSON merge patches.

mod error;
mod kube_api;

pub use error::StoreError;
pub use kube_api::KubeApiStore;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// Namespaced Kubernetes object the store can read and write
pub trait StoreObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> StoreObject for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Label and field selector used by list and delete-collection calls
///
/// Only equality requirements are supported, which is all the runner uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSelector {
    pub labels: Vec<(String, String)>,
    pub fields: Vec<(String, String)>,
}

impl ListSelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Label selector in API query syntax, `None` when empty
    #[must_use]
    pub fn label_selector(&self) -> Option<String> {
        join_requirements(&self.labels)
    }

    /// Field selector in API query syntax, `None` when empty
    #[must_use]
    pub fn field_selector(&self) -> Option<String> {
        join_requirements(&self.fields)
    }
}

fn join_requirements(requirements: &[(String, String)]) -> Option<String> {
    if requirements.is_empty() {
        return None;
    }
    Some(
        requirements
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Kubernetes API operations used by desirers, updaters and reconcilers
#[async_trait]
pub trait KubeStore: Send + Sync + 'static {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError>;

    async fn list<K: StoreObject>(
        &self,
        namespace: &str,
        selector: &ListSelector,
    ) -> Result<Vec<K>, StoreError>;

    /// Create an object; the returned copy carries the server-assigned name and UID
    async fn create<K: StoreObject>(&self, namespace: &str, obj: &K) -> Result<K, StoreError>;

    /// Full update, subject to resource version checks
    async fn replace<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        obj: &K,
    ) -> Result<K, StoreError>;

    async fn patch<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError>;

    async fn patch_status<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError>;

    async fn delete<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    /// Delete every object in the namespace matching the selector, dependents in the background
    async fn delete_collection<K: StoreObject>(
        &self,
        namespace: &str,
        selector: &ListSelector,
    ) -> Result<(), StoreError>;
}
