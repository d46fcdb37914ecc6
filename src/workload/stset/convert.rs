//! # LRP to StatefulSet
//!
//! Pure mapping from an LRP to the StatefulSet that runs its instances.
//!
//! Every instance gets the application container `opi` plus one container per
//! sidecar. Instances are spread across nodes with a soft anti-affinity on the
//! selector labels, so scheduling never blocks when spreading is impossible.

use super::probe::ProbeCreator;
use crate::config::WorkloadConfig;
use crate::constants::{
    ANNOTATION_APP_ID, ANNOTATION_APP_NAME, ANNOTATION_ORG_GUID, ANNOTATION_ORG_NAME,
    ANNOTATION_PROCESS_GUID, ANNOTATION_SPACE_GUID, ANNOTATION_SPACE_NAME, ANNOTATION_VERSION,
    APPLICATION_CONTAINER_NAME, APP_SOURCE_TYPE, HOSTNAME_TOPOLOGY_KEY, LABEL_APP_GUID,
    LABEL_GUID, LABEL_ORG_GUID, LABEL_ORG_NAME, LABEL_PROCESS_TYPE, LABEL_SOURCE_TYPE,
    LABEL_SPACE_GUID, LABEL_SPACE_NAME, LABEL_VERSION, POD_AFFINITY_TERM_WEIGHT,
    SECCOMP_POD_ANNOTATION, SECCOMP_PROFILE_RUNTIME_DEFAULT,
};
use crate::crd::{Lrp, LrpSpec, VolumeMount};
use crate::workload::env::{map_to_env_vars, workload_env_vars};
use crate::workload::resources::container_resources;
use anyhow::Result;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Affinity, Container, ContainerPort, LocalObjectReference, PersistentVolumeClaimVolumeSource,
    PodAffinityTerm, PodAntiAffinity, PodSecurityContext, PodSpec, PodTemplateSpec, Secret,
    SecurityContext, Volume, VolumeMount as ContainerVolumeMount, WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Converts an LRP into a StatefulSet named `name`
///
/// The private registry secret, when given, is referenced as an additional
/// image pull secret.
pub trait LrpToStatefulSetConverter: Send + Sync {
    fn convert(&self, name: &str, lrp: &Lrp, private_registry_secret: Option<&Secret>) -> Result<StatefulSet>;
}

pub struct LrpToStatefulSet {
    config: WorkloadConfig,
    liveness_probe_creator: ProbeCreator,
    readiness_probe_creator: ProbeCreator,
}

impl std::fmt::Debug for LrpToStatefulSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LrpToStatefulSet")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LrpToStatefulSet {
    #[must_use]
    pub fn new(
        config: WorkloadConfig,
        liveness_probe_creator: ProbeCreator,
        readiness_probe_creator: ProbeCreator,
    ) -> Self {
        Self {
            config,
            liveness_probe_creator,
            readiness_probe_creator,
        }
    }

    fn image_pull_secrets(&self, private_registry_secret: Option<&Secret>) -> Vec<LocalObjectReference> {
        let mut secrets = vec![LocalObjectReference {
            name: self.config.registry_secret_name.clone(),
        }];
        if let Some(secret) = private_registry_secret {
            secrets.push(LocalObjectReference {
                name: secret.name_any(),
            });
        }
        secrets
    }

    fn pod_security_context(&self) -> Option<PodSecurityContext> {
        if self.config.allow_run_image_as_root {
            return None;
        }
        Some(PodSecurityContext {
            run_as_non_root: Some(true),
            ..PodSecurityContext::default()
        })
    }
}

impl LrpToStatefulSetConverter for LrpToStatefulSet {
    fn convert(&self, name: &str, lrp: &Lrp, private_registry_secret: Option<&Secret>) -> Result<StatefulSet> {
        let spec = &lrp.spec;
        let (volumes, volume_mounts) = volume_specs(&spec.volume_mounts);

        let application_container = Container {
            name: APPLICATION_CONTAINER_NAME.to_string(),
            image: Some(spec.image.clone()),
            image_pull_policy: Some("Always".to_string()),
            command: Some(spec.command.clone()),
            env: Some(workload_env_vars(&spec.env, &spec.environment)),
            ports: Some(
                spec.ports
                    .iter()
                    .map(|port| ContainerPort {
                        container_port: *port,
                        ..ContainerPort::default()
                    })
                    .collect(),
            ),
            security_context: Some(SecurityContext {
                allow_privilege_escalation: Some(false),
                ..SecurityContext::default()
            }),
            resources: Some(container_resources(spec.cpu_weight, spec.memory_mb, spec.disk_mb)),
            liveness_probe: (self.liveness_probe_creator)(spec),
            readiness_probe: (self.readiness_probe_creator)(spec),
            volume_mounts: Some(volume_mounts),
            ..Container::default()
        };

        let mut containers = vec![application_container];
        containers.extend(sidecar_containers(spec));

        let selector = statefulset_label_selector(spec);
        let affinity = Affinity {
            pod_anti_affinity: Some(PodAntiAffinity {
                preferred_during_scheduling_ignored_during_execution: Some(vec![
                    WeightedPodAffinityTerm {
                        weight: POD_AFFINITY_TERM_WEIGHT,
                        pod_affinity_term: PodAffinityTerm {
                            topology_key: HOSTNAME_TOPOLOGY_KEY.to_string(),
                            label_selector: Some(LabelSelector {
                                match_expressions: Some(label_selector_requirements(&selector)),
                                ..LabelSelector::default()
                            }),
                            ..PodAffinityTerm::default()
                        },
                    },
                ]),
                ..PodAntiAffinity::default()
            }),
            ..Affinity::default()
        };

        let labels = statefulset_labels(spec);
        let annotations = statefulset_annotations(spec);
        let mut template_annotations = annotations.clone();
        template_annotations.insert(
            SECCOMP_POD_ANNOTATION.to_string(),
            SECCOMP_PROFILE_RUNTIME_DEFAULT.to_string(),
        );

        let automount_service_account_token =
            (!self.config.allow_automount_service_account_token).then_some(false);

        Ok(StatefulSet {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels.clone()),
                annotations: Some(annotations),
                ..ObjectMeta::default()
            },
            spec: Some(StatefulSetSpec {
                pod_management_policy: Some("Parallel".to_string()),
                replicas: Some(spec.instances),
                selector: LabelSelector {
                    match_labels: Some(selector),
                    ..LabelSelector::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        annotations: Some(template_annotations),
                        ..ObjectMeta::default()
                    }),
                    spec: Some(PodSpec {
                        containers,
                        image_pull_secrets: Some(self.image_pull_secrets(private_registry_secret)),
                        security_context: self.pod_security_context(),
                        service_account_name: Some(self.config.application_service_account.clone()),
                        automount_service_account_token,
                        volumes: Some(volumes),
                        affinity: Some(affinity),
                        ..PodSpec::default()
                    }),
                },
                ..StatefulSetSpec::default()
            }),
            ..StatefulSet::default()
        })
    }
}

/// Labels selecting the pods of one LRP version
#[must_use]
pub fn statefulset_label_selector(spec: &LrpSpec) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_GUID.to_string(), spec.guid.clone()),
        (LABEL_VERSION.to_string(), spec.version.clone()),
        (LABEL_SOURCE_TYPE.to_string(), APP_SOURCE_TYPE.to_string()),
    ])
}

fn statefulset_labels(spec: &LrpSpec) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_ORG_GUID.to_string(), spec.org_guid.clone()),
        (LABEL_ORG_NAME.to_string(), spec.org_name.clone()),
        (LABEL_SPACE_GUID.to_string(), spec.space_guid.clone()),
        (LABEL_SPACE_NAME.to_string(), spec.space_name.clone()),
        (LABEL_GUID.to_string(), spec.guid.clone()),
        (LABEL_PROCESS_TYPE.to_string(), spec.process_type.clone()),
        (LABEL_VERSION.to_string(), spec.version.clone()),
        (LABEL_APP_GUID.to_string(), spec.app_guid.clone()),
        (LABEL_SOURCE_TYPE.to_string(), APP_SOURCE_TYPE.to_string()),
    ])
}

// User annotations are applied last and may override the built-in keys.
fn statefulset_annotations(spec: &LrpSpec) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::from([
        (ANNOTATION_SPACE_NAME.to_string(), spec.space_name.clone()),
        (ANNOTATION_SPACE_GUID.to_string(), spec.space_guid.clone()),
        (ANNOTATION_APP_ID.to_string(), spec.app_guid.clone()),
        (ANNOTATION_VERSION.to_string(), spec.version.clone()),
        (ANNOTATION_PROCESS_GUID.to_string(), spec.process_guid()),
        (ANNOTATION_APP_NAME.to_string(), spec.app_name.clone()),
        (ANNOTATION_ORG_NAME.to_string(), spec.org_name.clone()),
        (ANNOTATION_ORG_GUID.to_string(), spec.org_guid.clone()),
    ]);
    annotations.extend(
        spec.user_defined_annotations
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    annotations
}

fn label_selector_requirements(labels: &BTreeMap<String, String>) -> Vec<LabelSelectorRequirement> {
    labels
        .iter()
        .map(|(key, value)| LabelSelectorRequirement {
            key: key.clone(),
            operator: "In".to_string(),
            values: Some(vec![value.clone()]),
        })
        .collect()
}

fn volume_specs(mounts: &[VolumeMount]) -> (Vec<Volume>, Vec<ContainerVolumeMount>) {
    mounts
        .iter()
        .map(|mount| {
            let volume = Volume {
                name: mount.claim_name.clone(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: mount.claim_name.clone(),
                    ..PersistentVolumeClaimVolumeSource::default()
                }),
                ..Volume::default()
            };
            let volume_mount = ContainerVolumeMount {
                name: mount.claim_name.clone(),
                mount_path: mount.mount_path.clone(),
                ..ContainerVolumeMount::default()
            };
            (volume, volume_mount)
        })
        .unzip()
}

fn sidecar_containers(spec: &LrpSpec) -> Vec<Container> {
    spec.sidecars
        .iter()
        .map(|sidecar| Container {
            name: sidecar.name.clone(),
            command: Some(sidecar.command.clone()),
            image: Some(spec.image.clone()),
            env: Some(map_to_env_vars(&sidecar.env)),
            resources: Some(container_resources(spec.cpu_weight, sidecar.memory_mb, spec.disk_mb)),
            ..Container::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Healthcheck, Sidecar};
    use crate::workload::stset::probe::{create_liveness_probe, create_readiness_probe};
    use k8s_openapi::api::core::v1::EnvVar;

    fn converter(config: WorkloadConfig) -> LrpToStatefulSet {
        LrpToStatefulSet::new(config, create_liveness_probe, create_readiness_probe)
    }

    fn config() -> WorkloadConfig {
        WorkloadConfig {
            application_service_account: "eirini".to_string(),
            registry_secret_name: "registry-secret".to_string(),
            allow_automount_service_account_token: false,
            allow_run_image_as_root: false,
        }
    }

    fn lrp() -> Lrp {
        Lrp::new(
            "dora",
            LrpSpec {
                guid: "guid_1234".to_string(),
                version: "version_1234".to_string(),
                process_type: "web".to_string(),
                app_guid: "premium_app_guid_1234".to_string(),
                app_name: "baldur".to_string(),
                space_guid: "space-guid".to_string(),
                space_name: "space-foo".to_string(),
                org_guid: "org-guid".to_string(),
                org_name: "org-foo".to_string(),
                env: BTreeMap::from([("MY_ENV".to_string(), "value".to_string())]),
                environment: vec![EnvVar {
                    name: "FROM_SECRET".to_string(),
                    value: Some("secret-value".to_string()),
                    ..EnvVar::default()
                }],
                command: vec!["/bin/sh".to_string(), "-c".to_string(), "start".to_string()],
                image: "gcr.io/foo/bar".to_string(),
                ports: vec![8888, 9999],
                instances: 3,
                memory_mb: 1024,
                disk_mb: 2048,
                cpu_weight: 2,
                health: Healthcheck {
                    type_: "http".to_string(),
                    port: 8080,
                    endpoint: "/heat".to_string(),
                    timeout_ms: 1000,
                },
                sidecars: vec![Sidecar {
                    name: "first-sidecar".to_string(),
                    command: vec!["echo".to_string(), "hello".to_string()],
                    memory_mb: 101,
                    env: BTreeMap::from([("FOO".to_string(), "BAR".to_string())]),
                }],
                volume_mounts: vec![VolumeMount {
                    claim_name: "some-claim".to_string(),
                    mount_path: "/some/path".to_string(),
                }],
                user_defined_annotations: BTreeMap::from([(
                    "prometheus.io/scrape".to_string(),
                    "yes, please".to_string(),
                )]),
                ..LrpSpec::default()
            },
        )
    }

    fn pod_spec(stset: &StatefulSet) -> &PodSpec {
        stset
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .expect("pod spec set")
    }

    #[test]
    fn test_convert_sets_name_replicas_and_policy() {
        let stset = converter(config()).convert("the-name", &lrp(), None).expect("convert");
        let spec = stset.spec.as_ref().expect("spec");

        assert_eq!(stset.metadata.name.as_deref(), Some("the-name"));
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(spec.pod_management_policy.as_deref(), Some("Parallel"));
        assert_eq!(
            spec.selector.match_labels.as_ref().map(BTreeMap::len),
            Some(3),
            "selector should match guid, version and source type"
        );
    }

    #[test]
    fn test_convert_builds_application_container() {
        let stset = converter(config()).convert("the-name", &lrp(), None).expect("convert");
        let containers = &pod_spec(&stset).containers;
        let app = &containers[0];

        assert_eq!(containers.len(), 2, "application container plus one sidecar");
        assert_eq!(app.name, "opi");
        assert_eq!(app.image.as_deref(), Some("gcr.io/foo/bar"));
        assert_eq!(app.image_pull_policy.as_deref(), Some("Always"));
        assert_eq!(
            app.security_context.as_ref().and_then(|c| c.allow_privilege_escalation),
            Some(false)
        );

        let env_names: Vec<&str> = app
            .env
            .iter()
            .flatten()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(
            env_names,
            vec!["MY_ENV", "FROM_SECRET", "POD_NAME", "CF_INSTANCE_GUID", "CF_INSTANCE_IP", "CF_INSTANCE_INTERNAL_IP"]
        );

        let ports: Vec<i32> = app.ports.iter().flatten().map(|p| p.container_port).collect();
        assert_eq!(ports, vec![8888, 9999]);

        let resources = app.resources.as_ref().expect("resources");
        let limits = resources.limits.as_ref().expect("limits");
        let requests = resources.requests.as_ref().expect("requests");
        assert_eq!(limits["memory"].0, "1Gi");
        assert_eq!(limits["ephemeral-storage"].0, "2Gi");
        assert_eq!(requests["cpu"].0, "2m");

        assert!(app.liveness_probe.is_some());
        assert!(app.readiness_probe.is_some());
    }

    #[test]
    fn test_convert_builds_sidecars_with_lrp_image_and_disk() {
        let stset = converter(config()).convert("the-name", &lrp(), None).expect("convert");
        let sidecar = &pod_spec(&stset).containers[1];

        assert_eq!(sidecar.name, "first-sidecar");
        assert_eq!(sidecar.image.as_deref(), Some("gcr.io/foo/bar"));
        let resources = sidecar.resources.as_ref().expect("resources");
        assert_eq!(resources.limits.as_ref().expect("limits")["memory"].0, "101Mi");
        assert_eq!(resources.limits.as_ref().expect("limits")["ephemeral-storage"].0, "2Gi");
    }

    #[test]
    fn test_convert_mounts_claims_as_volumes() {
        let stset = converter(config()).convert("the-name", &lrp(), None).expect("convert");
        let pod = pod_spec(&stset);
        let volume = &pod.volumes.as_ref().expect("volumes")[0];
        let mount = &pod.containers[0].volume_mounts.as_ref().expect("mounts")[0];

        assert_eq!(volume.name, "some-claim");
        assert_eq!(
            volume.persistent_volume_claim.as_ref().map(|c| c.claim_name.as_str()),
            Some("some-claim")
        );
        assert_eq!(mount.name, "some-claim");
        assert_eq!(mount.mount_path, "/some/path");
    }

    #[test]
    fn test_convert_sets_soft_anti_affinity_on_selector() {
        let stset = converter(config()).convert("the-name", &lrp(), None).expect("convert");
        let terms = pod_spec(&stset)
            .affinity
            .as_ref()
            .and_then(|a| a.pod_anti_affinity.as_ref())
            .and_then(|a| a.preferred_during_scheduling_ignored_during_execution.as_ref())
            .expect("preferred anti-affinity");

        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].weight, 100);
        assert_eq!(terms[0].pod_affinity_term.topology_key, "kubernetes.io/hostname");
        let expressions = terms[0]
            .pod_affinity_term
            .label_selector
            .as_ref()
            .and_then(|s| s.match_expressions.as_ref())
            .expect("match expressions");
        let keys: Vec<&str> = expressions.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "korifi.cloudfoundry.org/guid",
                "korifi.cloudfoundry.org/source-type",
                "korifi.cloudfoundry.org/version"
            ]
        );
        assert!(expressions.iter().all(|e| e.operator == "In"));
    }

    #[test]
    fn test_convert_sets_labels_and_annotations() {
        let stset = converter(config()).convert("the-name", &lrp(), None).expect("convert");
        let labels = stset.labels();
        let annotations = stset.annotations();

        assert_eq!(labels["korifi.cloudfoundry.org/source-type"], "APP");
        assert_eq!(labels["korifi.cloudfoundry.org/process-type"], "web");
        assert_eq!(labels["korifi.cloudfoundry.org/app-guid"], "premium_app_guid_1234");
        assert_eq!(annotations["korifi.cloudfoundry.org/process-guid"], "guid_1234-version_1234");
        assert_eq!(annotations["korifi.cloudfoundry.org/application-name"], "baldur");
        assert_eq!(annotations["prometheus.io/scrape"], "yes, please");
        assert!(
            !annotations.contains_key("seccomp.security.alpha.kubernetes.io/pod"),
            "seccomp belongs on the pod template only"
        );

        let template_annotations = stset
            .spec
            .as_ref()
            .and_then(|s| s.template.metadata.as_ref())
            .and_then(|m| m.annotations.as_ref())
            .expect("template annotations");
        assert_eq!(
            template_annotations["seccomp.security.alpha.kubernetes.io/pod"],
            "runtime/default"
        );
    }

    #[test]
    fn test_user_annotations_override_builtin_keys() {
        let mut lrp = lrp();
        lrp.spec
            .user_defined_annotations
            .insert(ANNOTATION_APP_NAME.to_string(), "overridden".to_string());
        let stset = converter(config()).convert("the-name", &lrp, None).expect("convert");
        assert_eq!(stset.annotations()[ANNOTATION_APP_NAME], "overridden");
    }

    #[test]
    fn test_convert_secures_pod_by_default() {
        let stset = converter(config()).convert("the-name", &lrp(), None).expect("convert");
        let pod = pod_spec(&stset);

        assert_eq!(pod.automount_service_account_token, Some(false));
        assert_eq!(
            pod.security_context.as_ref().and_then(|c| c.run_as_non_root),
            Some(true)
        );
        assert_eq!(pod.service_account_name.as_deref(), Some("eirini"));
    }

    #[test]
    fn test_convert_honours_permissive_config() {
        let permissive = WorkloadConfig {
            allow_automount_service_account_token: true,
            allow_run_image_as_root: true,
            ..config()
        };
        let stset = converter(permissive).convert("the-name", &lrp(), None).expect("convert");
        let pod = pod_spec(&stset);

        assert_eq!(pod.automount_service_account_token, None);
        assert!(pod.security_context.is_none());
    }

    #[test]
    fn test_convert_references_private_registry_secret() {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some("private-registry-1234".to_string()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        };
        let stset = converter(config())
            .convert("the-name", &lrp(), Some(&secret))
            .expect("convert");
        let names: Vec<&str> = pod_spec(&stset)
            .image_pull_secrets
            .iter()
            .flatten()
            .map(|s| s.name.as_str())
            .collect();

        assert_eq!(names, vec!["registry-secret", "private-registry-1234"]);
    }

    #[test]
    fn test_convert_without_health_check_has_no_probes() {
        let mut lrp = lrp();
        lrp.spec.health = Healthcheck::default();
        let stset = converter(config()).convert("the-name", &lrp, None).expect("convert");
        let app = &pod_spec(&stset).containers[0];

        assert!(app.liveness_probe.is_none());
        assert!(app.readiness_probe.is_none());
    }
}
