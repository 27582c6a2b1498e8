use std::fmt::{Display, Formatter};

/// Every screen the application can show. Exactly one is current at any
/// time; previously active views live on the navigation stack.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ViewKind {
    ScopeSelect,
    NamespaceSelect,
    ResourceTypeSelect,
    ResourceDetail,
    Logs,
    Events,
    Describe,
    Tags,
    Yaml,
    Diagram,
    Memory,
    ContextSelect,
    NamespaceSwitch,
    Help,
    Feedback,
}

impl ViewKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::ScopeSelect => "Scope",
            Self::NamespaceSelect => "Namespaces",
            Self::ResourceTypeSelect => "Resource Types",
            Self::ResourceDetail => "Resources",
            Self::Logs => "Logs",
            Self::Events => "Events",
            Self::Describe => "Describe",
            Self::Tags => "Labels & Annotations",
            Self::Yaml => "YAML",
            Self::Diagram => "Diagram",
            Self::Memory => "Memory",
            Self::ContextSelect => "Contexts",
            Self::NamespaceSwitch => "Switch Namespace",
            Self::Help => "Help",
            Self::Feedback => "Feedback",
        }
    }

    /// The scrollable pane backing this view, when it has one.
    pub fn pane(self) -> Option<PaneId> {
        match self {
            Self::ResourceDetail => Some(PaneId::Resources),
            Self::Logs => Some(PaneId::Logs),
            Self::Events => Some(PaneId::Events),
            Self::Describe => Some(PaneId::Describe),
            Self::Tags => Some(PaneId::Tags),
            Self::Yaml => Some(PaneId::Yaml),
            Self::Diagram => Some(PaneId::Diagram),
            Self::Memory => Some(PaneId::Memory),
            _ => None,
        }
    }

    /// Views refreshed by the auto-refresh timer. Everything else is
    /// exempt so a background tick never moves a cursor under the user.
    pub fn is_live(self) -> bool {
        matches!(self, Self::ResourceDetail | Self::Logs | Self::Events)
    }
}

/// Cluster-wide vs namespace-scoped resource listing mode.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Scope {
    Cluster,
    Namespaced,
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cluster => write!(f, "cluster"),
            Self::Namespaced => write!(f, "namespace"),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Nodes,
    PersistentVolumes,
    StorageClasses,
    ClusterRoles,
    Pods,
    Services,
    Deployments,
    ConfigMaps,
    Secrets,
    Ingresses,
    PersistentVolumeClaims,
    ReplicaSets,
    DaemonSets,
    StatefulSets,
    Jobs,
    CronJobs,
    Events,
    ImageStreams,
}

impl ResourceKind {
    pub const CLUSTER: [Self; 4] = [
        Self::Nodes,
        Self::PersistentVolumes,
        Self::StorageClasses,
        Self::ClusterRoles,
    ];

    pub const NAMESPACED: [Self; 13] = [
        Self::Pods,
        Self::Services,
        Self::Deployments,
        Self::ConfigMaps,
        Self::Secrets,
        Self::Ingresses,
        Self::PersistentVolumeClaims,
        Self::ReplicaSets,
        Self::DaemonSets,
        Self::StatefulSets,
        Self::Jobs,
        Self::CronJobs,
        Self::Events,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Nodes => "Nodes",
            Self::PersistentVolumes => "PersistentVolumes",
            Self::StorageClasses => "StorageClasses",
            Self::ClusterRoles => "ClusterRoles",
            Self::Pods => "Pods",
            Self::Services => "Services",
            Self::Deployments => "Deployments",
            Self::ConfigMaps => "ConfigMaps",
            Self::Secrets => "Secrets",
            Self::Ingresses => "Ingresses",
            Self::PersistentVolumeClaims => "PVC",
            Self::ReplicaSets => "ReplicaSets",
            Self::DaemonSets => "DaemonSets",
            Self::StatefulSets => "StatefulSets",
            Self::Jobs => "Jobs",
            Self::CronJobs => "CronJobs",
            Self::Events => "Events",
            Self::ImageStreams => "ImageStreams",
        }
    }

    /// Name accepted by kubectl for this kind.
    pub fn kubectl_name(self) -> &'static str {
        match self {
            Self::Nodes => "node",
            Self::PersistentVolumes => "pv",
            Self::StorageClasses => "storageclass",
            Self::ClusterRoles => "clusterrole",
            Self::Pods => "pod",
            Self::Services => "service",
            Self::Deployments => "deployment",
            Self::ConfigMaps => "configmap",
            Self::Secrets => "secret",
            Self::Ingresses => "ingress",
            Self::PersistentVolumeClaims => "pvc",
            Self::ReplicaSets => "replicaset",
            Self::DaemonSets => "daemonset",
            Self::StatefulSets => "statefulset",
            Self::Jobs => "job",
            Self::CronJobs => "cronjob",
            Self::Events => "event",
            Self::ImageStreams => "imagestream",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "no" | "node" | "nodes" => Some(Self::Nodes),
            "pv" | "persistentvolume" | "persistentvolumes" => Some(Self::PersistentVolumes),
            "sc" | "storageclass" | "storageclasses" => Some(Self::StorageClasses),
            "crole" | "clusterrole" | "clusterroles" => Some(Self::ClusterRoles),
            "po" | "pod" | "pods" => Some(Self::Pods),
            "svc" | "service" | "services" => Some(Self::Services),
            "deploy" | "deployment" | "deployments" => Some(Self::Deployments),
            "cm" | "configmap" | "configmaps" => Some(Self::ConfigMaps),
            "secret" | "secrets" => Some(Self::Secrets),
            "ing" | "ingress" | "ingresses" => Some(Self::Ingresses),
            "pvc" | "persistentvolumeclaim" | "persistentvolumeclaims" => {
                Some(Self::PersistentVolumeClaims)
            }
            "rs" | "replicaset" | "replicasets" => Some(Self::ReplicaSets),
            "ds" | "daemonset" | "daemonsets" => Some(Self::DaemonSets),
            "sts" | "statefulset" | "statefulsets" => Some(Self::StatefulSets),
            "job" | "jobs" => Some(Self::Jobs),
            "cj" | "cronjob" | "cronjobs" => Some(Self::CronJobs),
            "ev" | "event" | "events" => Some(Self::Events),
            "is" | "imagestream" | "imagestreams" => Some(Self::ImageStreams),
            _ => None,
        }
    }

    pub fn scope(self) -> Scope {
        if Self::CLUSTER.contains(&self) {
            Scope::Cluster
        } else {
            Scope::Namespaced
        }
    }

    pub fn supports_logs(self) -> bool {
        matches!(self, Self::Pods)
    }

    pub fn supports_events(self) -> bool {
        !matches!(
            self,
            Self::Events | Self::StorageClasses | Self::ClusterRoles
        )
    }

    pub fn supports_diagram(self) -> bool {
        matches!(self, Self::Deployments)
    }

    pub fn supports_memory(self) -> bool {
        matches!(self, Self::Pods)
    }

    /// The kinds currently reachable via numeric quick-select. The set
    /// depends on the active scope and on detected cluster capabilities,
    /// so callers must invoke this fresh on every use.
    pub fn valid_for(scope: Scope, openshift: bool) -> Vec<Self> {
        match scope {
            Scope::Cluster => Self::CLUSTER.to_vec(),
            Scope::Namespaced => {
                let mut kinds = Self::NAMESPACED.to_vec();
                if openshift {
                    kinds.push(Self::ImageStreams);
                }
                kinds
            }
        }
    }
}

/// One independently scrollable content region.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PaneId {
    Logs,
    Events,
    Describe,
    Tags,
    Yaml,
    Diagram,
    Memory,
    Resources,
}

impl PaneId {
    pub const ALL: [Self; 8] = [
        Self::Logs,
        Self::Events,
        Self::Describe,
        Self::Tags,
        Self::Yaml,
        Self::Diagram,
        Self::Memory,
        Self::Resources,
    ];

    /// Screen row where this pane's first content line lands. Text panes
    /// sit below a title and padding; the resource table sits below the
    /// header block.
    pub fn origin_y(self) -> u16 {
        match self {
            Self::Resources => 9,
            _ => 3,
        }
    }
}

/// Immutable snapshot of one listed resource. Replaced wholesale on
/// every successful fetch; never patched in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub name: String,
    pub namespace: Option<String>,
    pub kind: ResourceKind,
    pub status: String,
    pub ready_ratio: String,
    pub restart_count: u32,
    pub age_seconds: i64,
    pub attributes: Vec<(String, String)>,
    pub synthetic: bool,
}

impl ResourceRecord {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            kind,
            status: String::new(),
            ready_ratio: "-".to_string(),
            restart_count: 0,
            age_seconds: 0,
            attributes: Vec::new(),
            synthetic: false,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Stand-in row shown when a fetch returns nothing, so downstream
    /// rendering never has to special-case an empty table.
    pub fn placeholder(kind: ResourceKind) -> Self {
        let mut record = Self::new(kind, format!("No {} found", kind.title()));
        record.status = "Empty".to_string();
        record.synthetic = true;
        record
    }
}

pub fn format_age(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }
    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }
    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }
    format!("{seconds}s")
}

#[cfg(test)]
mod tests {
    use super::{PaneId, ResourceKind, ResourceRecord, Scope, ViewKind, format_age};

    #[test]
    fn kind_aliases_map_to_expected_kinds() {
        assert_eq!(ResourceKind::from_token("po"), Some(ResourceKind::Pods));
        assert_eq!(
            ResourceKind::from_token("deploy"),
            Some(ResourceKind::Deployments)
        );
        assert_eq!(
            ResourceKind::from_token("svc"),
            Some(ResourceKind::Services)
        );
        assert_eq!(
            ResourceKind::from_token("PVC"),
            Some(ResourceKind::PersistentVolumeClaims)
        );
        assert_eq!(
            ResourceKind::from_token("is"),
            Some(ResourceKind::ImageStreams)
        );
        assert_eq!(ResourceKind::from_token("bogus"), None);
    }

    #[test]
    fn scope_partition_is_exhaustive() {
        for kind in ResourceKind::CLUSTER {
            assert_eq!(kind.scope(), Scope::Cluster);
        }
        for kind in ResourceKind::NAMESPACED {
            assert_eq!(kind.scope(), Scope::Namespaced);
        }
    }

    #[test]
    fn valid_kinds_depend_on_scope_and_capability() {
        let cluster = ResourceKind::valid_for(Scope::Cluster, false);
        assert_eq!(cluster, ResourceKind::CLUSTER.to_vec());

        let plain = ResourceKind::valid_for(Scope::Namespaced, false);
        assert!(!plain.contains(&ResourceKind::ImageStreams));

        let openshift = ResourceKind::valid_for(Scope::Namespaced, true);
        assert!(openshift.contains(&ResourceKind::ImageStreams));
        assert_eq!(openshift.len(), plain.len() + 1);
    }

    #[test]
    fn only_pods_support_logs_and_memory() {
        for kind in ResourceKind::CLUSTER
            .into_iter()
            .chain(ResourceKind::NAMESPACED)
        {
            assert_eq!(kind.supports_logs(), kind == ResourceKind::Pods);
            assert_eq!(kind.supports_memory(), kind == ResourceKind::Pods);
        }
        assert!(ResourceKind::Deployments.supports_diagram());
        assert!(!ResourceKind::Pods.supports_diagram());
    }

    #[test]
    fn live_views_are_detail_logs_events() {
        assert!(ViewKind::ResourceDetail.is_live());
        assert!(ViewKind::Logs.is_live());
        assert!(ViewKind::Events.is_live());
        assert!(!ViewKind::Describe.is_live());
        assert!(!ViewKind::Yaml.is_live());
        assert!(!ViewKind::Help.is_live());
    }

    #[test]
    fn text_views_map_to_their_panes() {
        assert_eq!(ViewKind::Logs.pane(), Some(PaneId::Logs));
        assert_eq!(ViewKind::ResourceDetail.pane(), Some(PaneId::Resources));
        assert_eq!(ViewKind::ScopeSelect.pane(), None);
        assert_eq!(ViewKind::Feedback.pane(), None);
    }

    #[test]
    fn placeholder_record_is_marked_synthetic() {
        let record = ResourceRecord::placeholder(ResourceKind::Pods);
        assert!(record.synthetic);
        assert_eq!(record.kind, ResourceKind::Pods);
        assert_eq!(record.name, "No Pods found");
        assert_eq!(record.status, "Empty");
    }

    #[test]
    fn ages_render_in_largest_unit() {
        assert_eq!(format_age(42), "42s");
        assert_eq!(format_age(180), "3m");
        assert_eq!(format_age(7_200), "2h");
        assert_eq!(format_age(200_000), "2d");
        assert_eq!(format_age(-5), "0s");
    }
}
