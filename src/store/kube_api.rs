//! [`KubeStore`] backed by the Kubernetes API server through `kube::Api`.

use super::{KubeStore, ListSelector, StoreError, StoreObject};
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;

#[derive(Clone)]
pub struct KubeApiStore {
    client: Client,
}

impl std::fmt::Debug for KubeApiStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeApiStore").finish_non_exhaustive()
    }
}

impl KubeApiStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: StoreObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn list_params(selector: &ListSelector) -> ListParams {
    let mut params = ListParams::default();
    if let Some(labels) = selector.label_selector() {
        params = params.labels(&labels);
    }
    if let Some(fields) = selector.field_selector() {
        params = params.fields(&fields);
    }
    params
}

#[async_trait]
impl KubeStore for KubeApiStore {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        Ok(self.api::<K>(namespace).get(name).await?)
    }

    async fn list<K: StoreObject>(
        &self,
        namespace: &str,
        selector: &ListSelector,
    ) -> Result<Vec<K>, StoreError> {
        let list = self
            .api::<K>(namespace)
            .list(&list_params(selector))
            .await?;
        Ok(list.items)
    }

    async fn create<K: StoreObject>(&self, namespace: &str, obj: &K) -> Result<K, StoreError> {
        Ok(self
            .api::<K>(namespace)
            .create(&PostParams::default(), obj)
            .await?)
    }

    async fn replace<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        obj: &K,
    ) -> Result<K, StoreError> {
        Ok(self
            .api::<K>(namespace)
            .replace(name, &PostParams::default(), obj)
            .await?)
    }

    async fn patch<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError> {
        Ok(self
            .api::<K>(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?)
    }

    async fn patch_status<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError> {
        Ok(self
            .api::<K>(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?)
    }

    async fn delete<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn delete_collection<K: StoreObject>(
        &self,
        namespace: &str,
        selector: &ListSelector,
    ) -> Result<(), StoreError> {
        self.api::<K>(namespace)
            .delete_collection(&DeleteParams::background(), &list_params(selector))
            .await?;
        Ok(())
    }
}
