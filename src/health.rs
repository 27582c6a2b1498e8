use crate::model::{ResourceKind, ResourceRecord};

/// Restarts above this count raise a warning.
const RESTART_WARN_THRESHOLD: u32 = 5;
/// A pod pending longer than this is considered stuck.
const PENDING_WARN_SECONDS: i64 = 300;

/// Errors and warnings derived from one record. Never persisted;
/// recomputed whenever the record is (re)loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthAnnotation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl HealthAnnotation {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Maps a record to its health annotations, keyed by the record's kind.
/// Rules are additive: several warnings and errors may co-occur.
pub fn classify(record: &ResourceRecord) -> HealthAnnotation {
    let mut health = HealthAnnotation::default();
    if record.synthetic {
        return health;
    }

    match record.kind {
        ResourceKind::Pods => {
            if matches!(record.status.as_str(), "Failed" | "Error") {
                health.errors.push("pod is in a failed state".to_string());
            }
            if record.status == "Pending" && record.age_seconds > PENDING_WARN_SECONDS {
                health
                    .warnings
                    .push("pod stuck in pending state".to_string());
            }
            if record.restart_count > RESTART_WARN_THRESHOLD {
                health
                    .warnings
                    .push(format!("high restart count: {}", record.restart_count));
            }
        }
        ResourceKind::Deployments
        | ResourceKind::ReplicaSets
        | ResourceKind::StatefulSets
        | ResourceKind::DaemonSets => {
            if !ready_matches_desired(&record.ready_ratio) {
                health.errors.push("not all replicas are ready".to_string());
            }
        }
        ResourceKind::Services => {
            if record.attribute("endpoints") == Some("0") {
                health
                    .warnings
                    .push("service has no endpoints".to_string());
            }
        }
        ResourceKind::Jobs => {
            if record.status == "Failed" {
                health.errors.push("job failed to complete".to_string());
            }
        }
        ResourceKind::PersistentVolumeClaims => {
            if record.status == "Pending" {
                health
                    .warnings
                    .push("claim stuck in pending state".to_string());
            }
        }
        ResourceKind::PersistentVolumes => {
            if record.status == "Failed" {
                health
                    .errors
                    .push("persistent volume is in a failed state".to_string());
            }
        }
        ResourceKind::Nodes => {
            if record.status == "NotReady" {
                health.errors.push("node is not ready".to_string());
            }
            for (condition, message) in [
                ("memory-pressure", "node under memory pressure"),
                ("disk-pressure", "node under disk pressure"),
                ("pid-pressure", "node under PID pressure"),
            ] {
                if record.attribute(condition) == Some("true") {
                    health.warnings.push(message.to_string());
                }
            }
        }
        ResourceKind::StorageClasses
        | ResourceKind::ClusterRoles
        | ResourceKind::ConfigMaps
        | ResourceKind::Secrets
        | ResourceKind::Ingresses
        | ResourceKind::CronJobs
        | ResourceKind::Events
        | ResourceKind::ImageStreams => {}
    }

    health
}

/// "2/3" style ratios; anything unparsable counts as healthy so odd
/// provider output never raises a false alarm.
fn ready_matches_desired(ratio: &str) -> bool {
    let Some((ready, desired)) = ratio.split_once('/') else {
        return true;
    };
    match (ready.trim().parse::<u32>(), desired.trim().parse::<u32>()) {
        (Ok(ready), Ok(desired)) => ready >= desired,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::{HealthAnnotation, classify};
    use crate::model::{ResourceKind, ResourceRecord};

    fn record(kind: ResourceKind, status: &str) -> ResourceRecord {
        let mut record = ResourceRecord::new(kind, "web-0");
        record.namespace = Some("default".to_string());
        record.status = status.to_string();
        record.ready_ratio = "1/1".to_string();
        record
    }

    #[test]
    fn failed_pod_with_high_restarts_gets_error_and_warning() {
        let mut pod = record(ResourceKind::Pods, "Failed");
        pod.restart_count = 7;

        let health = classify(&pod);
        assert_eq!(health.errors, vec!["pod is in a failed state"]);
        assert_eq!(health.warnings, vec!["high restart count: 7"]);
    }

    #[test]
    fn pending_pod_warns_only_after_threshold() {
        let mut pod = record(ResourceKind::Pods, "Pending");
        pod.age_seconds = 30;
        assert!(classify(&pod).warnings.is_empty());

        pod.age_seconds = 600;
        assert_eq!(classify(&pod).warnings, vec!["pod stuck in pending state"]);
    }

    #[test]
    fn healthy_pod_is_clean() {
        let pod = record(ResourceKind::Pods, "Running");
        assert!(classify(&pod).is_clean());
    }

    #[test]
    fn unready_workloads_raise_errors() {
        for kind in [
            ResourceKind::Deployments,
            ResourceKind::ReplicaSets,
            ResourceKind::StatefulSets,
            ResourceKind::DaemonSets,
        ] {
            let mut workload = record(kind, "Running");
            workload.ready_ratio = "1/3".to_string();
            assert_eq!(
                classify(&workload).errors,
                vec!["not all replicas are ready"]
            );

            workload.ready_ratio = "3/3".to_string();
            assert!(classify(&workload).is_clean());
        }
    }

    #[test]
    fn endpointless_service_warns() {
        let mut service = record(ResourceKind::Services, "ClusterIP");
        service
            .attributes
            .push(("endpoints".to_string(), "0".to_string()));
        assert_eq!(
            classify(&service).warnings,
            vec!["service has no endpoints"]
        );

        service.attributes[0].1 = "3".to_string();
        assert!(classify(&service).is_clean());
    }

    #[test]
    fn node_pressure_conditions_accumulate() {
        let mut node = record(ResourceKind::Nodes, "NotReady");
        node.attributes
            .push(("memory-pressure".to_string(), "true".to_string()));
        node.attributes
            .push(("disk-pressure".to_string(), "true".to_string()));

        let health = classify(&node);
        assert_eq!(health.errors, vec!["node is not ready"]);
        assert_eq!(health.warnings.len(), 2);
    }

    #[test]
    fn synthetic_rows_are_never_flagged() {
        let placeholder = ResourceRecord::placeholder(ResourceKind::Pods);
        assert_eq!(classify(&placeholder), HealthAnnotation::default());
    }

    #[test]
    fn unparsable_ready_ratio_counts_as_healthy() {
        let mut workload = record(ResourceKind::Deployments, "Running");
        workload.ready_ratio = "-".to_string();
        assert!(classify(&workload).is_clean());
    }
}
