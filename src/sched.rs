use anyhow::Result;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::trace;

use crate::model::{PaneId, ResourceKind, ResourceRecord, Scope, ViewKind};

/// What the interaction layer asks the provider for. The shell layer
/// turns a spec into a gateway future; the engine never calls the
/// provider directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSpec {
    List {
        scope: Scope,
        namespace: Option<String>,
        kind: ResourceKind,
    },
    PaneText {
        pane: PaneId,
        kind: ResourceKind,
        namespace: Option<String>,
        name: String,
    },
    Namespaces,
    Contexts,
    SwitchContext {
        name: String,
    },
    SwitchNamespace {
        name: String,
    },
    SubmitFeedback {
        body: String,
    },
}

impl FetchSpec {
    /// The supersession slot: at most one command is outstanding per
    /// slot; a newer dispatch for the same slot wins at delivery time.
    pub fn slot(&self) -> TargetSlot {
        match self {
            Self::List { .. } => TargetSlot::ResourceList,
            Self::PaneText { pane, .. } => TargetSlot::Pane(*pane),
            Self::Namespaces => TargetSlot::Namespaces,
            Self::Contexts => TargetSlot::Contexts,
            Self::SwitchContext { .. } | Self::SwitchNamespace { .. } => TargetSlot::Session,
            Self::SubmitFeedback { .. } => TargetSlot::Feedback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetSlot {
    ResourceList,
    Pane(PaneId),
    Namespaces,
    Contexts,
    Session,
    Feedback,
}

/// The (view, kind, namespace, record) tuple a command was issued for.
/// The state machine drops results whose target no longer matches the
/// live one, independently of slot supersession.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTarget {
    pub view: ViewKind,
    pub kind: Option<ResourceKind>,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub spec: FetchSpec,
    pub target: FetchTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchPayload {
    Records(Vec<ResourceRecord>),
    PaneText { pane: PaneId, text: String },
    Namespaces(Vec<String>),
    Contexts { names: Vec<String>, current: String },
    ContextSwitched(String),
    NamespaceSwitched(String),
    FeedbackSent,
}

/// Exactly one outcome is delivered per dispatched command, success or
/// failure.
#[derive(Debug)]
pub struct FetchOutcome {
    pub seq: u64,
    pub target: FetchTarget,
    pub slot: TargetSlot,
    pub result: Result<FetchPayload>,
}

/// Runs provider futures off the interaction loop and serializes their
/// results back into it. There is no transport-level cancellation: a
/// superseded command keeps running, its result is simply dropped on
/// arrival.
pub struct Scheduler {
    tx: mpsc::UnboundedSender<FetchOutcome>,
    rx: mpsc::UnboundedReceiver<FetchOutcome>,
    next_seq: u64,
    latest: HashMap<TargetSlot, u64>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            next_seq: 0,
            latest: HashMap::new(),
        }
    }

    /// Spawns `future` and records it as the newest command for its
    /// slot. Returns the sequence number assigned to it.
    pub fn dispatch<F>(&mut self, request: FetchRequest, future: F) -> u64
    where
        F: Future<Output = Result<FetchPayload>> + Send + 'static,
    {
        self.next_seq += 1;
        let seq = self.next_seq;
        let slot = request.spec.slot();
        self.latest.insert(slot, seq);

        let tx = self.tx.clone();
        let target = request.target;
        tokio::spawn(async move {
            let result = future.await;
            // The receiver only closes on shutdown; a failed send just
            // means nobody is listening anymore.
            let _ = tx.send(FetchOutcome {
                seq,
                target,
                slot,
                result,
            });
        });
        seq
    }

    /// Waits for the next delivered outcome.
    pub async fn next(&mut self) -> Option<FetchOutcome> {
        self.rx.recv().await
    }

    /// Drains whatever has completed without waiting.
    pub fn poll(&mut self) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(outcome) = self.rx.try_recv() {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Last-writer-wins at the delivery boundary: an outcome is accepted
    /// only while it is still the newest command for its slot. Accepted
    /// outcomes clear the slot so the loading state can settle.
    pub fn accept(&mut self, outcome: &FetchOutcome) -> bool {
        if self.latest.get(&outcome.slot) == Some(&outcome.seq) {
            self.latest.remove(&outcome.slot);
            true
        } else {
            trace!(seq = outcome.seq, "dropping superseded fetch result");
            false
        }
    }

    pub fn has_outstanding(&self, slot: TargetSlot) -> bool {
        self.latest.contains_key(&slot)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{FetchPayload, FetchRequest, FetchSpec, FetchTarget, Scheduler, TargetSlot};
    use crate::model::{PaneId, ResourceKind, Scope, ViewKind};

    fn list_request(kind: ResourceKind) -> FetchRequest {
        FetchRequest {
            spec: FetchSpec::List {
                scope: Scope::Namespaced,
                namespace: Some("default".to_string()),
                kind,
            },
            target: FetchTarget {
                view: ViewKind::ResourceDetail,
                kind: Some(kind),
                namespace: Some("default".to_string()),
                name: None,
            },
        }
    }

    #[tokio::test]
    async fn newest_dispatch_supersedes_older_one() {
        let mut scheduler = Scheduler::new();

        let first = scheduler.dispatch(list_request(ResourceKind::Pods), async {
            Ok(FetchPayload::Records(Vec::new()))
        });
        let second = scheduler.dispatch(list_request(ResourceKind::Services), async {
            Ok(FetchPayload::Records(Vec::new()))
        });
        assert_ne!(first, second);

        let mut accepted = Vec::new();
        for _ in 0..2 {
            let outcome = scheduler.next().await.expect("outcome");
            if scheduler.accept(&outcome) {
                accepted.push(outcome.seq);
            }
        }
        assert_eq!(accepted, vec![second]);
    }

    #[tokio::test]
    async fn different_slots_do_not_supersede_each_other() {
        let mut scheduler = Scheduler::new();

        scheduler.dispatch(list_request(ResourceKind::Pods), async {
            Ok(FetchPayload::Records(Vec::new()))
        });
        let pane_request = FetchRequest {
            spec: FetchSpec::PaneText {
                pane: PaneId::Logs,
                kind: ResourceKind::Pods,
                namespace: Some("default".to_string()),
                name: "web-0".to_string(),
            },
            target: FetchTarget {
                view: ViewKind::Logs,
                kind: Some(ResourceKind::Pods),
                namespace: Some("default".to_string()),
                name: Some("web-0".to_string()),
            },
        };
        scheduler.dispatch(pane_request, async {
            Ok(FetchPayload::PaneText {
                pane: PaneId::Logs,
                text: "line".to_string(),
            })
        });

        let mut accepted = 0;
        for _ in 0..2 {
            let outcome = scheduler.next().await.expect("outcome");
            if scheduler.accept(&outcome) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 2);
    }

    #[tokio::test]
    async fn failures_are_delivered_not_swallowed() {
        let mut scheduler = Scheduler::new();
        scheduler.dispatch(list_request(ResourceKind::Pods), async {
            anyhow::bail!("connection refused")
        });

        let outcome = scheduler.next().await.expect("outcome");
        assert!(scheduler.accept(&outcome));
        let error = outcome.result.expect_err("should be an error");
        assert!(error.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn poll_drains_without_blocking() {
        let mut scheduler = Scheduler::new();
        assert!(scheduler.poll().is_empty());

        scheduler.dispatch(list_request(ResourceKind::Pods), async {
            Ok(FetchPayload::Records(Vec::new()))
        });
        // Give the spawned task a chance to complete.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(scheduler.poll().len(), 1);
    }

    #[tokio::test]
    async fn outstanding_flag_tracks_slot_lifecycle() {
        let mut scheduler = Scheduler::new();
        assert!(!scheduler.has_outstanding(TargetSlot::ResourceList));

        scheduler.dispatch(list_request(ResourceKind::Pods), async {
            Ok(FetchPayload::Records(Vec::new()))
        });
        assert!(scheduler.has_outstanding(TargetSlot::ResourceList));

        let outcome = scheduler.next().await.expect("outcome");
        assert!(scheduler.accept(&outcome));
        assert!(!scheduler.has_outstanding(TargetSlot::ResourceList));
    }
}
