//! Task to Job mapping.
//!
//! A task runs exactly once: one pod, no retries, never restarted.

use crate::config::WorkloadConfig;
use crate::constants::{
    ANNOTATION_APP_ID, ANNOTATION_APP_NAME, ANNOTATION_GUID, ANNOTATION_ORG_GUID,
    ANNOTATION_ORG_NAME, ANNOTATION_SPACE_GUID, ANNOTATION_SPACE_NAME,
    ANNOTATION_TASK_CONTAINER_NAME, ENV_CF_INSTANCE_ADDR, ENV_CF_INSTANCE_PORT,
    ENV_CF_INSTANCE_PORTS, LABEL_APP_GUID, LABEL_GUID, LABEL_SOURCE_TYPE, LABEL_TASK_NAME,
    SECCOMP_POD_ANNOTATION, SECCOMP_PROFILE_RUNTIME_DEFAULT, TASK_CONTAINER_NAME,
    TASK_SOURCE_TYPE,
};
use crate::crd::{Task, TaskSpec};
use crate::workload::env::{value_env_var, workload_env_vars};
use crate::workload::naming::job_name;
use crate::workload::resources::container_resources;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, LocalObjectReference, PodSecurityContext, PodSpec, PodTemplateSpec, Secret,
    SecurityContext,
};
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

pub trait TaskToJobConverter: Send + Sync {
    fn convert(&self, task: &Task, private_registry_secret: Option<&Secret>) -> Job;
}

#[derive(Debug, Clone)]
pub struct TaskToJob {
    config: WorkloadConfig,
}

impl TaskToJob {
    #[must_use]
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }
}

impl TaskToJobConverter for TaskToJob {
    fn convert(&self, task: &Task, private_registry_secret: Option<&Secret>) -> Job {
        let spec = &task.spec;

        let mut env = workload_env_vars(&spec.env, &spec.environment);
        env.extend([
            value_env_var(ENV_CF_INSTANCE_ADDR, ""),
            value_env_var(ENV_CF_INSTANCE_PORT, ""),
            value_env_var(ENV_CF_INSTANCE_PORTS, "[]"),
        ]);

        let container = Container {
            name: TASK_CONTAINER_NAME.to_string(),
            image: Some(spec.image.clone()),
            image_pull_policy: Some("Always".to_string()),
            command: Some(spec.command.clone()),
            env: Some(env),
            security_context: Some(SecurityContext {
                allow_privilege_escalation: Some(false),
                ..SecurityContext::default()
            }),
            resources: Some(container_resources(spec.cpu_weight, spec.memory_mb, spec.disk_mb)),
            ..Container::default()
        };

        let mut image_pull_secrets = vec![LocalObjectReference {
            name: self.config.registry_secret_name.clone(),
        }];
        if let Some(secret) = private_registry_secret {
            image_pull_secrets.push(LocalObjectReference {
                name: secret.name_any(),
            });
        }

        let labels = job_labels(spec);
        let annotations = job_annotations(spec);
        let mut template_annotations = annotations.clone();
        template_annotations.extend([
            (
                ANNOTATION_TASK_CONTAINER_NAME.to_string(),
                TASK_CONTAINER_NAME.to_string(),
            ),
            (ANNOTATION_GUID.to_string(), spec.guid.clone()),
        ]);

        Job {
            metadata: ObjectMeta {
                name: Some(job_name(spec)),
                labels: Some(labels.clone()),
                annotations: Some(annotations),
                ..ObjectMeta::default()
            },
            spec: Some(JobSpec {
                parallelism: Some(1),
                completions: Some(1),
                backoff_limit: Some(0),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        annotations: Some(template_annotations),
                        ..ObjectMeta::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        restart_policy: Some("Never".to_string()),
                        service_account_name: Some(self.config.application_service_account.clone()),
                        automount_service_account_token: (!self
                            .config
                            .allow_automount_service_account_token)
                            .then_some(false),
                        image_pull_secrets: Some(image_pull_secrets),
                        security_context: Some(PodSecurityContext {
                            run_as_non_root: Some(true),
                            ..PodSecurityContext::default()
                        }),
                        ..PodSpec::default()
                    }),
                },
                ..JobSpec::default()
            }),
            ..Job::default()
        }
    }
}

fn job_labels(spec: &TaskSpec) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_APP_GUID.to_string(), spec.app_guid.clone()),
        (LABEL_GUID.to_string(), spec.guid.clone()),
        (LABEL_SOURCE_TYPE.to_string(), TASK_SOURCE_TYPE.to_string()),
        (LABEL_TASK_NAME.to_string(), spec.name.clone()),
    ])
}

fn job_annotations(spec: &TaskSpec) -> BTreeMap<String, String> {
    BTreeMap::from([
        (ANNOTATION_APP_NAME.to_string(), spec.app_name.clone()),
        (ANNOTATION_APP_ID.to_string(), spec.app_guid.clone()),
        (ANNOTATION_ORG_NAME.to_string(), spec.org_name.clone()),
        (ANNOTATION_ORG_GUID.to_string(), spec.org_guid.clone()),
        (ANNOTATION_SPACE_NAME.to_string(), spec.space_name.clone()),
        (ANNOTATION_SPACE_GUID.to_string(), spec.space_guid.clone()),
        (
            SECCOMP_POD_ANNOTATION.to_string(),
            SECCOMP_PROFILE_RUNTIME_DEFAULT.to_string(),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::EnvVar;

    fn config() -> WorkloadConfig {
        WorkloadConfig {
            application_service_account: "service-account".to_string(),
            registry_secret_name: "registry-secret".to_string(),
            allow_automount_service_account_token: false,
            allow_run_image_as_root: true,
        }
    }

    fn task() -> Task {
        Task::new(
            "the-task",
            TaskSpec {
                guid: "task-123".to_string(),
                name: "task-name".to_string(),
                image: "docker.png".to_string(),
                command: vec!["/lifecycle/launch".to_string()],
                app_name: "my-app".to_string(),
                app_guid: "my-app-guid".to_string(),
                org_name: "my-org".to_string(),
                org_guid: "org-id".to_string(),
                space_name: "my-space".to_string(),
                space_guid: "space-id".to_string(),
                env: BTreeMap::from([("my-env-var".to_string(), "env".to_string())]),
                memory_mb: 1,
                cpu_weight: 2,
                disk_mb: 3,
                ..TaskSpec::default()
            },
        )
    }

    fn pod_spec(job: &Job) -> &PodSpec {
        job.spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .expect("pod spec set")
    }

    #[test]
    fn test_convert_runs_task_exactly_once() {
        let job = TaskToJob::new(config()).convert(&task(), None);
        let spec = job.spec.as_ref().expect("job spec");
        let pod = pod_spec(&job);

        assert_eq!(job.metadata.name.as_deref(), Some("my-app-my-space-task-name"));
        assert_eq!(spec.parallelism, Some(1));
        assert_eq!(spec.completions, Some(1));
        assert_eq!(spec.backoff_limit, Some(0));
        assert_eq!(pod.restart_policy.as_deref(), Some("Never"));
        assert_eq!(pod.automount_service_account_token, Some(false));
        assert_eq!(
            pod.security_context.as_ref().and_then(|c| c.run_as_non_root),
            Some(true),
            "tasks run as non-root even when root images are allowed for LRPs"
        );
        assert_eq!(pod.service_account_name.as_deref(), Some("service-account"));
    }

    #[test]
    fn test_convert_builds_task_container() {
        let job = TaskToJob::new(config()).convert(&task(), None);
        let containers = &pod_spec(&job).containers;
        assert_eq!(containers.len(), 1);

        let container = &containers[0];
        assert_eq!(container.name, "opi-task");
        assert_eq!(container.image.as_deref(), Some("docker.png"));
        assert_eq!(container.image_pull_policy.as_deref(), Some("Always"));
        assert_eq!(container.command, Some(vec!["/lifecycle/launch".to_string()]));

        let env = container.env.as_ref().expect("env");
        let plain = |name: &str| env.iter().find(|e| e.name == name).and_then(|e| e.value.clone());
        assert_eq!(plain("my-env-var").as_deref(), Some("env"));
        assert_eq!(plain("CF_INSTANCE_ADDR").as_deref(), Some(""));
        assert_eq!(plain("CF_INSTANCE_PORT").as_deref(), Some(""));
        assert_eq!(plain("CF_INSTANCE_PORTS").as_deref(), Some("[]"));
        for name in ["POD_NAME", "CF_INSTANCE_GUID", "CF_INSTANCE_IP", "CF_INSTANCE_INTERNAL_IP"] {
            assert!(
                env.iter().any(|e| e.name == name && e.value_from.is_some()),
                "{name} should be a field reference"
            );
        }
    }

    #[test]
    fn test_convert_sets_labels_and_annotations() {
        let job = TaskToJob::new(config()).convert(&task(), None);

        let labels = job.labels();
        assert_eq!(labels["korifi.cloudfoundry.org/app-guid"], "my-app-guid");
        assert_eq!(labels["korifi.cloudfoundry.org/guid"], "task-123");
        assert_eq!(labels["korifi.cloudfoundry.org/source-type"], "TASK");
        assert_eq!(labels["korifi.cloudfoundry.org/name"], "task-name");

        let annotations = job.annotations();
        assert_eq!(annotations["korifi.cloudfoundry.org/application-name"], "my-app");
        assert_eq!(annotations["korifi.cloudfoundry.org/application-id"], "my-app-guid");
        assert_eq!(annotations["korifi.cloudfoundry.org/org-guid"], "org-id");
        assert_eq!(annotations["korifi.cloudfoundry.org/space-name"], "my-space");
        assert_eq!(annotations["seccomp.security.alpha.kubernetes.io/pod"], "runtime/default");

        let template = job
            .spec
            .as_ref()
            .and_then(|s| s.template.metadata.as_ref())
            .expect("template metadata");
        let template_annotations = template.annotations.as_ref().expect("template annotations");
        assert_eq!(
            template_annotations["korifi.cloudfoundry.org/opi-task-container-name"],
            "opi-task"
        );
        assert_eq!(template_annotations["korifi.cloudfoundry.org/guid"], "task-123");
        assert_eq!(
            template.labels.as_ref().expect("template labels")["korifi.cloudfoundry.org/source-type"],
            "TASK"
        );
    }

    #[test]
    fn test_convert_includes_structured_environment() {
        let mut task = task();
        task.spec.environment = vec![EnvVar {
            name: "SECRET_ENV".to_string(),
            value: Some("from-secret".to_string()),
            ..EnvVar::default()
        }];
        let job = TaskToJob::new(config()).convert(&task, None);
        let env = pod_spec(&job).containers[0].env.as_ref().expect("env");

        assert!(env.iter().any(|e| e.name == "SECRET_ENV"));
    }

    #[test]
    fn test_convert_leaves_token_automount_alone_when_allowed() {
        let permissive = WorkloadConfig {
            allow_automount_service_account_token: true,
            ..config()
        };
        let job = TaskToJob::new(permissive).convert(&task(), None);
        assert_eq!(pod_spec(&job).automount_service_account_token, None);
    }

    #[test]
    fn test_convert_truncates_long_names() {
        let mut task = task();
        task.spec.app_name = "app-with-very-long-name".to_string();
        task.spec.space_name = "space-with-a-very-very-very-very-very-very-long-name".to_string();
        let job = TaskToJob::new(config()).convert(&task, None);

        assert_eq!(
            job.metadata.name.as_deref(),
            Some("app-with-very-long-name-space-with-a-ver-task-name")
        );
    }

    #[test]
    fn test_convert_falls_back_to_guid_prefix() {
        let mut task = task();
        task.spec.app_name = "Ω".to_string();
        let job = TaskToJob::new(config()).convert(&task, None);
        assert_eq!(job.metadata.name.as_deref(), Some("task-123-task-name"));
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
        let job = TaskToJob::new(config()).convert(&task(), Some(&secret));
        let names: Vec<&str> = pod_spec(&job)
            .image_pull_secrets
            .iter()
            .flatten()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["registry-secret", "private-registry-1234"]);
    }
}
