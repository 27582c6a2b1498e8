use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Event, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod,
    Secret, Service,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::ClusterRole;
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, Config, ResourceExt};
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::model::{ResourceKind, ResourceRecord, Scope};

/// The Resource Provider. All calls are reached through the command
/// scheduler; nothing here is invoked synchronously from the
/// interaction loop.
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    default_namespace: String,
    known_contexts: Vec<String>,
    openshift: bool,
}

impl KubeGateway {
    pub async fn new() -> Result<Self> {
        Self::from_kube_selection(None).await
    }

    async fn from_kube_selection(context: Option<String>) -> Result<Self> {
        let kubeconfig = Kubeconfig::read().ok();

        let config = if let Some(kubeconfig_value) = kubeconfig.clone() {
            let options = KubeConfigOptions {
                context: context.clone(),
                cluster: None,
                user: None,
            };
            Config::from_custom_kubeconfig(kubeconfig_value, &options)
                .await
                .context("failed to infer Kubernetes configuration")?
        } else {
            if context.is_some() {
                anyhow::bail!("kubeconfig not found; context switching is unavailable");
            }
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;

        let known_contexts = kubeconfig
            .as_ref()
            .map(|cfg| {
                let mut names = cfg
                    .contexts
                    .iter()
                    .map(|entry| entry.name.clone())
                    .collect::<Vec<_>>();
                names.sort();
                names.dedup();
                names
            })
            .unwrap_or_default();
        let active_context = context
            .or_else(|| kubeconfig.and_then(|cfg| cfg.current_context))
            .unwrap_or_else(|| "in-cluster".to_string());

        let openshift = detect_openshift(&client).await;

        Ok(Self {
            client,
            context: active_context,
            default_namespace,
            known_contexts,
            openshift,
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub fn openshift(&self) -> bool {
        self.openshift
    }

    pub async fn switch_context(&mut self, context: &str) -> Result<()> {
        let switched = Self::from_kube_selection(Some(context.to_string())).await?;
        *self = switched;
        Ok(())
    }

    /// Cheap pre-flight for a context switch, runnable off the
    /// interaction loop; the actual client rebuild happens when the
    /// result is applied.
    pub async fn validate_context(&self, context: &str) -> Result<()> {
        if !self.known_contexts.iter().any(|name| name == context) {
            anyhow::bail!("context '{context}' was not found in kubeconfig");
        }
        Ok(())
    }

    pub async fn list_contexts(&self) -> Result<(Vec<String>, String)> {
        Ok((self.known_contexts.clone(), self.context.clone()))
    }

    pub async fn list_namespaces(&self) -> Result<Vec<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let list = namespaces
            .list(&list_params())
            .await
            .context("failed to list namespaces")?;
        let mut names = list
            .into_iter()
            .map(|namespace| namespace.name_any())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    /// Records the new namespace in the active kubeconfig context so it
    /// survives restarts, the way kubectl users expect.
    pub async fn switch_namespace(&self, namespace: &str) -> Result<()> {
        run_kubectl(&[
            "config",
            "set-context",
            "--current",
            &format!("--namespace={namespace}"),
        ])
        .await
        .map(|_| ())
        .with_context(|| format!("failed to switch namespace to '{namespace}'"))
    }

    pub async fn list_resources(
        &self,
        scope: Scope,
        namespace: Option<&str>,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceRecord>> {
        let namespace = match scope {
            Scope::Cluster => None,
            Scope::Namespaced => Some(namespace.unwrap_or(self.default_namespace.as_str())),
        };
        match kind {
            ResourceKind::Pods => self.list_pods(namespace).await,
            ResourceKind::Services => self.list_services(namespace).await,
            ResourceKind::Deployments => self.list_deployments(namespace).await,
            ResourceKind::ConfigMaps => self.list_configmaps(namespace).await,
            ResourceKind::Secrets => self.list_secrets(namespace).await,
            ResourceKind::Ingresses => self.list_ingresses(namespace).await,
            ResourceKind::PersistentVolumeClaims => self.list_pvcs(namespace).await,
            ResourceKind::ReplicaSets => self.list_replicasets(namespace).await,
            ResourceKind::DaemonSets => self.list_daemonsets(namespace).await,
            ResourceKind::StatefulSets => self.list_statefulsets(namespace).await,
            ResourceKind::Jobs => self.list_jobs(namespace).await,
            ResourceKind::CronJobs => self.list_cronjobs(namespace).await,
            ResourceKind::Events => self.list_events(namespace).await,
            ResourceKind::Nodes => self.list_nodes().await,
            ResourceKind::PersistentVolumes => self.list_pvs().await,
            ResourceKind::StorageClasses => self.list_storage_classes().await,
            ResourceKind::ClusterRoles => self.list_cluster_roles().await,
            ResourceKind::ImageStreams => self.list_imagestreams(namespace).await,
        }
    }

    pub async fn describe(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<String> {
        let mut args = vec!["describe", kind.kubectl_name(), name];
        if let Some(namespace) = namespace {
            args.extend(["-n", namespace]);
        }
        run_kubectl(&args)
            .await
            .with_context(|| format!("failed to describe {} {name}", kind.title()))
    }

    pub async fn fetch_yaml(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<String> {
        let object = self.get_dynamic(kind, namespace, name).await?;
        serde_yaml::to_string(&object)
            .with_context(|| format!("failed to render YAML for {} {name}", kind.title()))
    }

    pub async fn fetch_tags(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<String> {
        let object = self.get_dynamic(kind, namespace, name).await?;
        let mut out = String::new();

        out.push_str("Labels:\n");
        match object.metadata.labels.as_ref().filter(|set| !set.is_empty()) {
            Some(labels) => {
                for (key, value) in labels {
                    out.push_str(&format!("  {key}: {value}\n"));
                }
            }
            None => out.push_str("  (none)\n"),
        }
        out.push_str("\nAnnotations:\n");
        match object
            .metadata
            .annotations
            .as_ref()
            .filter(|set| !set.is_empty())
        {
            Some(annotations) => {
                for (key, value) in annotations {
                    out.push_str(&format!("  {key}: {value}\n"));
                }
            }
            None => out.push_str("  (none)\n"),
        }
        Ok(out)
    }

    pub async fn fetch_logs(&self, namespace: Option<&str>, name: &str) -> Result<String> {
        let namespace = namespace.unwrap_or(self.default_namespace.as_str());
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            tail_lines: Some(500),
            timestamps: true,
            ..LogParams::default()
        };
        let logs = pods
            .logs(name, &params)
            .await
            .with_context(|| format!("failed to load logs for {namespace}/{name}"))?;
        if logs.is_empty() {
            return Ok("(no log output)".to_string());
        }
        Ok(logs)
    }

    pub async fn fetch_events(&self, namespace: Option<&str>, name: &str) -> Result<String> {
        let events: Api<Event> = match namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };
        let params = ListParams::default()
            .fields(&format!("involvedObject.name={name}"))
            .limit(500);
        let list = events
            .list(&params)
            .await
            .with_context(|| format!("failed to load events for {name}"))?;

        let mut entries = list.items;
        entries.sort_by_key(|event| std::cmp::Reverse(event_seconds(event)));

        if entries.is_empty() {
            return Ok(format!("No events recorded for {name}"));
        }

        let mut out = String::new();
        for event in entries {
            let age = crate::model::format_age(
                now_seconds().saturating_sub(event_seconds(&event)),
            );
            let kind = event.type_.unwrap_or_else(|| "-".to_string());
            let reason = event.reason.unwrap_or_else(|| "-".to_string());
            let message = event.message.unwrap_or_else(|| "-".to_string());
            let count = event.count.unwrap_or(1);
            out.push_str(&format!("{age:>6}  {kind:<8} {reason:<24} {message}"));
            if count > 1 {
                out.push_str(&format!(" (x{count})"));
            }
            out.push('\n');
        }
        Ok(out)
    }

    /// The diagram pane renders from the manifest; the provider's job
    /// is only to hand over the source text.
    pub async fn fetch_diagram_source(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<String> {
        self.fetch_yaml(kind, namespace, name).await
    }

    pub async fn fetch_memory(&self, namespace: Option<&str>, name: &str) -> Result<String> {
        let mut args = vec!["top", "pod", name, "--containers"];
        if let Some(namespace) = namespace {
            args.extend(["-n", namespace]);
        }
        run_kubectl(&args)
            .await
            .with_context(|| format!("failed to read memory usage for {name}"))
    }

    fn namespaced_or_all<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        match namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    async fn get_dynamic(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject> {
        let (gvk, plural) = gvk_for(kind);
        let resource = ApiResource::from_gvk_with_plural(&gvk, plural);
        let api: Api<DynamicObject> = match (kind.scope(), namespace) {
            (Scope::Namespaced, Some(namespace)) => {
                Api::namespaced_with(self.client.clone(), namespace, &resource)
            }
            (Scope::Namespaced, None) => {
                Api::namespaced_with(self.client.clone(), &self.default_namespace, &resource)
            }
            (Scope::Cluster, _) => Api::all_with(self.client.clone(), &resource),
        };
        api.get(name)
            .await
            .with_context(|| format!("failed to fetch {} {name}", kind.title()))
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let pods: Api<Pod> = self.namespaced_or_all(namespace);
        let list = pods.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|pod| {
                let mut record = ResourceRecord::new(ResourceKind::Pods, pod.name_any());
                record.namespace = pod.namespace();
                record.age_seconds = age_seconds(pod.metadata.creation_timestamp.as_ref());
                record.status = pod
                    .status
                    .as_ref()
                    .and_then(|status| status.phase.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                let (ready, total, restarts) = pod
                    .status
                    .as_ref()
                    .map(pod_readiness)
                    .unwrap_or((0, 0, 0));
                record.ready_ratio = format!("{ready}/{total}");
                record.restart_count = restarts.max(0) as u32;
                if let Some(spec) = pod.spec.as_ref() {
                    if let Some(node) = spec.node_name.clone() {
                        record.attributes.push(("node".to_string(), node));
                    }
                }
                if let Some(status) = pod.status.as_ref() {
                    if let Some(ip) = status.pod_ip.clone() {
                        record.attributes.push(("ip".to_string(), ip));
                    }
                    if let Some(qos) = status.qos_class.clone() {
                        record.attributes.push(("qos".to_string(), qos));
                    }
                }
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_services(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let services: Api<Service> = self.namespaced_or_all(namespace);
        let endpoints: Api<Endpoints> = self.namespaced_or_all(namespace);

        let list = services.list(&list_params()).await?;
        let endpoint_counts = endpoints
            .list(&list_params())
            .await
            .map(|list| {
                list.into_iter()
                    .map(|endpoint| {
                        let addresses = endpoint
                            .subsets
                            .as_deref()
                            .unwrap_or(&[])
                            .iter()
                            .map(|subset| subset.addresses.as_deref().unwrap_or(&[]).len())
                            .sum::<usize>();
                        (
                            (endpoint.namespace(), endpoint.name_any()),
                            addresses,
                        )
                    })
                    .collect::<HashMap<_, _>>()
            })
            .unwrap_or_default();

        let records = list
            .into_iter()
            .map(|service| {
                let mut record = ResourceRecord::new(ResourceKind::Services, service.name_any());
                record.namespace = service.namespace();
                record.age_seconds = age_seconds(service.metadata.creation_timestamp.as_ref());
                record.status = service
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.type_.clone())
                    .unwrap_or_else(|| "ClusterIP".to_string());
                let count = endpoint_counts
                    .get(&(record.namespace.clone(), record.name.clone()))
                    .copied()
                    .unwrap_or(0);
                record
                    .attributes
                    .push(("endpoints".to_string(), count.to_string()));
                if let Some(spec) = service.spec.as_ref() {
                    if let Some(cluster_ip) = spec.cluster_ip.clone() {
                        record
                            .attributes
                            .push(("cluster-ip".to_string(), cluster_ip));
                    }
                    let ports = spec
                        .ports
                        .as_deref()
                        .unwrap_or(&[])
                        .iter()
                        .map(|port| {
                            let protocol =
                                port.protocol.clone().unwrap_or_else(|| "TCP".to_string());
                            format!("{}/{}", port.port, protocol)
                        })
                        .collect::<Vec<_>>();
                    if !ports.is_empty() {
                        record
                            .attributes
                            .push(("ports".to_string(), ports.join(",")));
                    }
                }
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_deployments(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let deployments: Api<Deployment> = self.namespaced_or_all(namespace);
        let list = deployments.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|deployment| {
                let mut record =
                    ResourceRecord::new(ResourceKind::Deployments, deployment.name_any());
                record.namespace = deployment.namespace();
                record.age_seconds = age_seconds(deployment.metadata.creation_timestamp.as_ref());
                let (ready, desired) = deployment
                    .status
                    .as_ref()
                    .map(|status| {
                        (
                            status.ready_replicas.unwrap_or(0),
                            status.replicas.unwrap_or(0),
                        )
                    })
                    .unwrap_or((0, 0));
                record.ready_ratio = format!("{ready}/{desired}");
                record.status = if ready >= desired {
                    "Running".to_string()
                } else {
                    "NotReady".to_string()
                };
                if let Some(strategy) = deployment
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.strategy.as_ref())
                    .and_then(|strategy| strategy.type_.clone())
                {
                    record.attributes.push(("strategy".to_string(), strategy));
                }
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_replicasets(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let replicasets: Api<ReplicaSet> = self.namespaced_or_all(namespace);
        let list = replicasets.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|replicaset| {
                let mut record =
                    ResourceRecord::new(ResourceKind::ReplicaSets, replicaset.name_any());
                record.namespace = replicaset.namespace();
                record.age_seconds = age_seconds(replicaset.metadata.creation_timestamp.as_ref());
                let (ready, desired) = replicaset
                    .status
                    .as_ref()
                    .map(|status| (status.ready_replicas.unwrap_or(0), status.replicas))
                    .unwrap_or((0, 0));
                record.ready_ratio = format!("{ready}/{desired}");
                record.status = if ready >= desired {
                    "Running".to_string()
                } else {
                    "NotReady".to_string()
                };
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_daemonsets(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let daemonsets: Api<DaemonSet> = self.namespaced_or_all(namespace);
        let list = daemonsets.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|daemonset| {
                let mut record =
                    ResourceRecord::new(ResourceKind::DaemonSets, daemonset.name_any());
                record.namespace = daemonset.namespace();
                record.age_seconds = age_seconds(daemonset.metadata.creation_timestamp.as_ref());
                let (ready, desired) = daemonset
                    .status
                    .as_ref()
                    .map(|status| (status.number_ready, status.desired_number_scheduled))
                    .unwrap_or((0, 0));
                record.ready_ratio = format!("{ready}/{desired}");
                record.status = if ready >= desired {
                    "Running".to_string()
                } else {
                    "NotReady".to_string()
                };
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_statefulsets(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let statefulsets: Api<StatefulSet> = self.namespaced_or_all(namespace);
        let list = statefulsets.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|statefulset| {
                let mut record =
                    ResourceRecord::new(ResourceKind::StatefulSets, statefulset.name_any());
                record.namespace = statefulset.namespace();
                record.age_seconds = age_seconds(statefulset.metadata.creation_timestamp.as_ref());
                let (ready, desired) = statefulset
                    .status
                    .as_ref()
                    .map(|status| (status.ready_replicas.unwrap_or(0), status.replicas))
                    .unwrap_or((0, 0));
                record.ready_ratio = format!("{ready}/{desired}");
                record.status = if ready >= desired {
                    "Running".to_string()
                } else {
                    "NotReady".to_string()
                };
                if let Some(current) = statefulset
                    .status
                    .as_ref()
                    .and_then(|status| status.current_replicas)
                {
                    record
                        .attributes
                        .push(("current".to_string(), current.to_string()));
                }
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_jobs(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let jobs: Api<Job> = self.namespaced_or_all(namespace);
        let list = jobs.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|job| {
                let mut record = ResourceRecord::new(ResourceKind::Jobs, job.name_any());
                record.namespace = job.namespace();
                record.age_seconds = age_seconds(job.metadata.creation_timestamp.as_ref());
                let succeeded = job
                    .status
                    .as_ref()
                    .and_then(|status| status.succeeded)
                    .unwrap_or(0);
                let failed = job
                    .status
                    .as_ref()
                    .and_then(|status| status.failed)
                    .unwrap_or(0);
                let completions = job
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.completions)
                    .unwrap_or(1);
                record.ready_ratio = format!("{succeeded}/{completions}");
                record.status = if failed > 0 {
                    "Failed".to_string()
                } else if succeeded >= completions {
                    "Complete".to_string()
                } else {
                    "Running".to_string()
                };
                if failed > 0 {
                    record
                        .attributes
                        .push(("failed".to_string(), failed.to_string()));
                }
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_cronjobs(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let cronjobs: Api<CronJob> = self.namespaced_or_all(namespace);
        let list = cronjobs.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|cronjob| {
                let mut record = ResourceRecord::new(ResourceKind::CronJobs, cronjob.name_any());
                record.namespace = cronjob.namespace();
                record.age_seconds = age_seconds(cronjob.metadata.creation_timestamp.as_ref());
                let suspended = cronjob
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.suspend)
                    .unwrap_or(false);
                record.status = if suspended {
                    "Suspended".to_string()
                } else {
                    "Active".to_string()
                };
                if let Some(schedule) = cronjob.spec.as_ref().map(|spec| spec.schedule.clone()) {
                    record.attributes.push(("schedule".to_string(), schedule));
                }
                if let Some(last) = cronjob
                    .status
                    .as_ref()
                    .and_then(|status| status.last_schedule_time.as_ref())
                {
                    record.attributes.push((
                        "last-schedule".to_string(),
                        crate::model::format_age(age_seconds(Some(last))),
                    ));
                }
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_configmaps(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let configmaps: Api<ConfigMap> = self.namespaced_or_all(namespace);
        let list = configmaps.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|configmap| {
                let mut record =
                    ResourceRecord::new(ResourceKind::ConfigMaps, configmap.name_any());
                record.namespace = configmap.namespace();
                record.age_seconds = age_seconds(configmap.metadata.creation_timestamp.as_ref());
                record.status = "Active".to_string();
                let keys = configmap.data.as_ref().map(|data| data.len()).unwrap_or(0);
                record
                    .attributes
                    .push(("data-keys".to_string(), keys.to_string()));
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_secrets(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let secrets: Api<Secret> = self.namespaced_or_all(namespace);
        let list = secrets.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|secret| {
                let mut record = ResourceRecord::new(ResourceKind::Secrets, secret.name_any());
                record.namespace = secret.namespace();
                record.age_seconds = age_seconds(secret.metadata.creation_timestamp.as_ref());
                record.status = "Active".to_string();
                if let Some(type_) = secret.type_.clone() {
                    record.attributes.push(("type".to_string(), type_));
                }
                let keys = secret.data.as_ref().map(|data| data.len()).unwrap_or(0);
                record
                    .attributes
                    .push(("data-keys".to_string(), keys.to_string()));
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_ingresses(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let ingresses: Api<Ingress> = self.namespaced_or_all(namespace);
        let list = ingresses.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|ingress| {
                let mut record = ResourceRecord::new(ResourceKind::Ingresses, ingress.name_any());
                record.namespace = ingress.namespace();
                record.age_seconds = age_seconds(ingress.metadata.creation_timestamp.as_ref());
                record.status = "Active".to_string();
                if let Some(spec) = ingress.spec.as_ref() {
                    let hosts = spec
                        .rules
                        .as_deref()
                        .unwrap_or(&[])
                        .iter()
                        .filter_map(|rule| rule.host.clone())
                        .collect::<Vec<_>>();
                    if !hosts.is_empty() {
                        record
                            .attributes
                            .push(("hosts".to_string(), hosts.join(",")));
                    }
                    if let Some(class) = spec.ingress_class_name.clone() {
                        record.attributes.push(("class".to_string(), class));
                    }
                }
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_pvcs(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let claims: Api<PersistentVolumeClaim> = self.namespaced_or_all(namespace);
        let list = claims.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|claim| {
                let mut record =
                    ResourceRecord::new(ResourceKind::PersistentVolumeClaims, claim.name_any());
                record.namespace = claim.namespace();
                record.age_seconds = age_seconds(claim.metadata.creation_timestamp.as_ref());
                record.status = claim
                    .status
                    .as_ref()
                    .and_then(|status| status.phase.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                if let Some(spec) = claim.spec.as_ref() {
                    if let Some(volume) = spec.volume_name.clone() {
                        record.attributes.push(("volume".to_string(), volume));
                    }
                    if let Some(class) = spec.storage_class_name.clone() {
                        record
                            .attributes
                            .push(("storage-class".to_string(), class));
                    }
                }
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let events: Api<Event> = self.namespaced_or_all(namespace);
        let list = events.list(&list_params()).await?;
        let mut items = list.items;
        items.sort_by_key(|event| std::cmp::Reverse(event_seconds(event)));

        let records = items
            .into_iter()
            .map(|event| {
                let kind = event
                    .involved_object
                    .kind
                    .clone()
                    .unwrap_or_else(|| "-".to_string());
                let object = event
                    .involved_object
                    .name
                    .clone()
                    .unwrap_or_else(|| "-".to_string());
                let mut record =
                    ResourceRecord::new(ResourceKind::Events, format!("{kind}/{object}"));
                record.namespace = event.namespace();
                record.age_seconds = now_seconds().saturating_sub(event_seconds(&event));
                record.status = event.type_.clone().unwrap_or_else(|| "Normal".to_string());
                if let Some(reason) = event.reason.clone() {
                    record.attributes.push(("reason".to_string(), reason));
                }
                if let Some(message) = event.message.clone() {
                    record
                        .attributes
                        .push(("message".to_string(), truncate(&message, 96)));
                }
                if let Some(count) = event.count {
                    record
                        .attributes
                        .push(("count".to_string(), count.to_string()));
                }
                record
            })
            .collect::<Vec<_>>();
        // Events stay in recency order rather than name order.
        Ok(records)
    }

    async fn list_nodes(&self) -> Result<Vec<ResourceRecord>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|node| {
                let mut record = ResourceRecord::new(ResourceKind::Nodes, node.name_any());
                record.age_seconds = age_seconds(node.metadata.creation_timestamp.as_ref());
                record.status = "Unknown".to_string();

                if let Some(status) = node.status.as_ref() {
                    for condition in status.conditions.as_deref().unwrap_or(&[]) {
                        match condition.type_.as_str() {
                            "Ready" => {
                                record.status = if condition.status == "True" {
                                    "Ready".to_string()
                                } else {
                                    "NotReady".to_string()
                                };
                            }
                            "MemoryPressure" if condition.status == "True" => {
                                record
                                    .attributes
                                    .push(("memory-pressure".to_string(), "true".to_string()));
                            }
                            "DiskPressure" if condition.status == "True" => {
                                record
                                    .attributes
                                    .push(("disk-pressure".to_string(), "true".to_string()));
                            }
                            "PIDPressure" if condition.status == "True" => {
                                record
                                    .attributes
                                    .push(("pid-pressure".to_string(), "true".to_string()));
                            }
                            _ => {}
                        }
                    }
                    if let Some(info) = status.node_info.as_ref() {
                        record
                            .attributes
                            .push(("kubelet".to_string(), info.kubelet_version.clone()));
                        record
                            .attributes
                            .push(("os".to_string(), info.operating_system.clone()));
                    }
                }
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_pvs(&self) -> Result<Vec<ResourceRecord>> {
        let volumes: Api<PersistentVolume> = Api::all(self.client.clone());
        let list = volumes.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|volume| {
                let mut record =
                    ResourceRecord::new(ResourceKind::PersistentVolumes, volume.name_any());
                record.age_seconds = age_seconds(volume.metadata.creation_timestamp.as_ref());
                record.status = volume
                    .status
                    .as_ref()
                    .and_then(|status| status.phase.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                if let Some(spec) = volume.spec.as_ref() {
                    if let Some(class) = spec.storage_class_name.clone() {
                        record
                            .attributes
                            .push(("storage-class".to_string(), class));
                    }
                    if let Some(claim) = spec.claim_ref.as_ref().and_then(|r| r.name.clone()) {
                        record.attributes.push(("claim".to_string(), claim));
                    }
                }
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_storage_classes(&self) -> Result<Vec<ResourceRecord>> {
        let classes: Api<StorageClass> = Api::all(self.client.clone());
        let list = classes.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|class| {
                let mut record =
                    ResourceRecord::new(ResourceKind::StorageClasses, class.name_any());
                record.age_seconds = age_seconds(class.metadata.creation_timestamp.as_ref());
                record.status = "Active".to_string();
                record
                    .attributes
                    .push(("provisioner".to_string(), class.provisioner.clone()));
                if let Some(policy) = class.reclaim_policy.clone() {
                    record.attributes.push(("reclaim".to_string(), policy));
                }
                record
            })
            .collect();
        Ok(sorted(records))
    }

    async fn list_cluster_roles(&self) -> Result<Vec<ResourceRecord>> {
        let roles: Api<ClusterRole> = Api::all(self.client.clone());
        let list = roles.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|role| {
                let mut record = ResourceRecord::new(ResourceKind::ClusterRoles, role.name_any());
                record.age_seconds = age_seconds(role.metadata.creation_timestamp.as_ref());
                record.status = "Active".to_string();
                let rules = role.rules.as_ref().map(|rules| rules.len()).unwrap_or(0);
                record
                    .attributes
                    .push(("rules".to_string(), rules.to_string()));
                record
            })
            .collect();
        Ok(sorted(records))
    }

    /// OpenShift image streams have no typed API in k8s-openapi, so
    /// they go through the dynamic client.
    async fn list_imagestreams(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let (gvk, plural) = gvk_for(ResourceKind::ImageStreams);
        let resource = ApiResource::from_gvk_with_plural(&gvk, plural);
        let streams: Api<DynamicObject> = match namespace {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        };
        let list = streams.list(&list_params()).await?;
        let records = list
            .into_iter()
            .map(|stream| {
                let mut record =
                    ResourceRecord::new(ResourceKind::ImageStreams, stream.name_any());
                record.namespace = stream.namespace();
                record.age_seconds = age_seconds(stream.metadata.creation_timestamp.as_ref());
                record.status = "Active".to_string();
                let tags = stream
                    .data
                    .get("status")
                    .and_then(|status| status.get("tags"))
                    .and_then(|tags| tags.as_array())
                    .map(|tags| tags.len())
                    .unwrap_or(0);
                record
                    .attributes
                    .push(("tags".to_string(), tags.to_string()));
                if let Some(repo) = stream
                    .data
                    .get("status")
                    .and_then(|status| status.get("dockerImageRepository"))
                    .and_then(|repo| repo.as_str())
                {
                    record
                        .attributes
                        .push(("repository".to_string(), repo.to_string()));
                }
                record
            })
            .collect();
        Ok(sorted(records))
    }
}

async fn detect_openshift(client: &Client) -> bool {
    match client.list_api_groups().await {
        Ok(groups) => groups
            .groups
            .iter()
            .any(|group| group.name == "image.openshift.io"),
        Err(error) => {
            debug!("api group discovery failed: {error}");
            false
        }
    }
}

async fn run_kubectl(args: &[&str]) -> Result<String> {
    let output = TokioCommand::new("kubectl")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .context("failed to execute kubectl")?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.status.success() {
        Ok(stdout.to_string())
    } else if stderr.trim().is_empty() {
        anyhow::bail!("kubectl exited with {}", output.status)
    } else {
        anyhow::bail!("{}", stderr.trim())
    }
}

fn gvk_for(kind: ResourceKind) -> (GroupVersionKind, &'static str) {
    match kind {
        ResourceKind::Pods => (GroupVersionKind::gvk("", "v1", "Pod"), "pods"),
        ResourceKind::Services => (GroupVersionKind::gvk("", "v1", "Service"), "services"),
        ResourceKind::ConfigMaps => (GroupVersionKind::gvk("", "v1", "ConfigMap"), "configmaps"),
        ResourceKind::Secrets => (GroupVersionKind::gvk("", "v1", "Secret"), "secrets"),
        ResourceKind::PersistentVolumeClaims => (
            GroupVersionKind::gvk("", "v1", "PersistentVolumeClaim"),
            "persistentvolumeclaims",
        ),
        ResourceKind::Events => (GroupVersionKind::gvk("", "v1", "Event"), "events"),
        ResourceKind::Nodes => (GroupVersionKind::gvk("", "v1", "Node"), "nodes"),
        ResourceKind::PersistentVolumes => (
            GroupVersionKind::gvk("", "v1", "PersistentVolume"),
            "persistentvolumes",
        ),
        ResourceKind::Deployments => (
            GroupVersionKind::gvk("apps", "v1", "Deployment"),
            "deployments",
        ),
        ResourceKind::ReplicaSets => (
            GroupVersionKind::gvk("apps", "v1", "ReplicaSet"),
            "replicasets",
        ),
        ResourceKind::DaemonSets => (
            GroupVersionKind::gvk("apps", "v1", "DaemonSet"),
            "daemonsets",
        ),
        ResourceKind::StatefulSets => (
            GroupVersionKind::gvk("apps", "v1", "StatefulSet"),
            "statefulsets",
        ),
        ResourceKind::Jobs => (GroupVersionKind::gvk("batch", "v1", "Job"), "jobs"),
        ResourceKind::CronJobs => (GroupVersionKind::gvk("batch", "v1", "CronJob"), "cronjobs"),
        ResourceKind::Ingresses => (
            GroupVersionKind::gvk("networking.k8s.io", "v1", "Ingress"),
            "ingresses",
        ),
        ResourceKind::StorageClasses => (
            GroupVersionKind::gvk("storage.k8s.io", "v1", "StorageClass"),
            "storageclasses",
        ),
        ResourceKind::ClusterRoles => (
            GroupVersionKind::gvk("rbac.authorization.k8s.io", "v1", "ClusterRole"),
            "clusterroles",
        ),
        ResourceKind::ImageStreams => (
            GroupVersionKind::gvk("image.openshift.io", "v1", "ImageStream"),
            "imagestreams",
        ),
    }
}

fn list_params() -> ListParams {
    ListParams::default().limit(500)
}

fn sorted(mut records: Vec<ResourceRecord>) -> Vec<ResourceRecord> {
    records.sort_by(|left, right| {
        left.namespace
            .cmp(&right.namespace)
            .then_with(|| left.name.cmp(&right.name))
    });
    records
}

fn pod_readiness(status: &k8s_openapi::api::core::v1::PodStatus) -> (usize, usize, i32) {
    let container_statuses = status.container_statuses.as_deref().unwrap_or(&[]);
    let total = container_statuses.len();
    let ready = container_statuses
        .iter()
        .filter(|container| container.ready)
        .count();
    let restarts = container_statuses
        .iter()
        .map(|container| container.restart_count)
        .sum();
    (ready, total, restarts)
}

fn now_seconds() -> i64 {
    k8s_openapi::jiff::Timestamp::now().as_second()
}

fn age_seconds(timestamp: Option<&Time>) -> i64 {
    let Some(timestamp) = timestamp else {
        return 0;
    };
    (now_seconds() - timestamp.0.as_second()).max(0)
}

fn event_seconds(event: &Event) -> i64 {
    event
        .last_timestamp
        .as_ref()
        .map(|time| time.0.as_second())
        .or_else(|| {
            event
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|time| time.0.as_second())
        })
        .unwrap_or(0)
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut out = value
        .chars()
        .take(max.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}
