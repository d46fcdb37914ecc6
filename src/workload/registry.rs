//! # Private Registry Secrets
//!
//! Image pull secrets generated for workloads that pull from a private registry.
//!
//! The secret is created before the workload with a generated name so the
//! workload can reference it. Its owner is only known once the workload exists
//! (the UID is server-assigned), so ownership is patched in as a second step.
//! If the workload cannot be created the secret is deleted again.

use super::docker::{docker_config_json, registry_host};
use crate::constants::{
    DOCKER_CONFIG_KEY, DOCKER_CONFIG_SECRET_TYPE, PRIVATE_REGISTRY_SECRET_GENERATE_NAME,
};
use crate::crd::PrivateRegistry;
use crate::errors::ErrorList;
use crate::store::{KubeStore, StoreObject};
use anyhow::{anyhow, Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Unsaved docker config secret for pulling `image` with `registry` credentials
pub fn registry_secret(namespace: &str, image: &str, registry: &PrivateRegistry) -> Result<Secret> {
    let config = docker_config_json(&registry_host(image), &registry.username, &registry.password)
        .context("failed to generate private registry config")?;

    Ok(Secret {
        metadata: ObjectMeta {
            namespace: Some(namespace.to_string()),
            generate_name: Some(PRIVATE_REGISTRY_SECRET_GENERATE_NAME.to_string()),
            ..ObjectMeta::default()
        },
        type_: Some(DOCKER_CONFIG_SECRET_TYPE.to_string()),
        string_data: Some(BTreeMap::from([(DOCKER_CONFIG_KEY.to_string(), config)])),
        ..Secret::default()
    })
}

/// Create the pull secret when the workload uses a private registry
///
/// `workload` names the kind of object the secret is for and only shows up
/// in error messages.
pub async fn create_registry_secret_if_required<S: KubeStore>(
    store: &S,
    namespace: &str,
    image: &str,
    registry: Option<&PrivateRegistry>,
    workload: &str,
) -> Result<Option<Secret>> {
    let Some(registry) = registry else {
        return Ok(None);
    };

    let secret = registry_secret(namespace, image, registry)
        .with_context(|| format!("failed to generate private registry secret for {workload}"))?;
    let created = store
        .create(namespace, &secret)
        .await
        .with_context(|| format!("failed to create private registry secret for {workload}"))?;

    debug!(
        secret = %created.name_any(),
        namespace = %namespace,
        "Created private registry secret"
    );
    Ok(Some(created))
}

/// Make `owner` an (non-controller) owner of the pull secret
pub async fn set_secret_owner<S: KubeStore, K: StoreObject>(
    store: &S,
    secret: Option<&Secret>,
    owner: &K,
) -> Result<()> {
    let Some(secret) = secret else {
        return Ok(());
    };

    let owner_ref = owner
        .owner_ref(&())
        .ok_or_else(|| anyhow!("{} {} has no uid yet", K::kind(&()), owner.name_any()))?;
    let patch = json!({
        "metadata": {
            "ownerReferences": [owner_ref]
        }
    });

    store
        .patch::<Secret>(
            secret.namespace().as_deref().unwrap_or_default(),
            &secret.name_any(),
            &patch,
        )
        .await?;
    Ok(())
}

/// Delete the pull secret after a failed workload create, keeping both failures
pub async fn cleanup_and_error<S: KubeStore>(
    store: &S,
    creation_error: anyhow::Error,
    secret: Option<&Secret>,
) -> anyhow::Error {
    let mut errors = ErrorList::new();
    errors.push(creation_error);

    if let Some(secret) = secret {
        let namespace = secret.namespace().unwrap_or_default();
        let name = secret.name_any();
        if let Err(err) = store.delete::<Secret>(&namespace, &name).await {
            warn!(secret = %name, namespace = %namespace, error = %err, "Failed to clean up private registry secret");
            errors.push(anyhow::Error::new(err).context("failed to cleanup registry secret"));
        }
    }

    errors.into_error()
}
