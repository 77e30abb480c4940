//! Ambient status polling
//!
//! Refreshes the status bar snapshot on a fixed interval and on demand
//! (after every answered question). The three underlying fetches are
//! independent: one failing leaves the others' fields intact. Failures
//! are logged, never surfaced to the user.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};

use crate::backend::Backend;

/// Display snapshot for the status bar
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    /// Kubernetes node count
    pub k8s: String,
    /// Running pods
    pub pods: String,
    /// CPU usage
    pub cpu: String,
    /// Tailscale online/total
    pub tailscale: String,
    /// Proxmox running VMs
    pub proxmox: String,
    /// Health score and emoji
    pub health: String,
    /// Current personality
    pub personality: String,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        let dash = || "-".to_string();
        Self {
            k8s: dash(),
            pods: dash(),
            cpu: dash(),
            tailscale: dash(),
            proxmox: dash(),
            health: dash(),
            personality: "auto".to_string(),
        }
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "K8s: {} | Pods: {} | CPU: {} | Tailscale: {} | Proxmox: {} | Health: {} | Personality: {}",
            self.k8s, self.pods, self.cpu, self.tailscale, self.proxmox, self.health, self.personality
        )
    }
}

/// Polls the backend for ambient display state
pub struct StatusPoller {
    backend: Arc<dyn Backend>,
    snapshot: RwLock<StatusSnapshot>,
}

impl StatusPoller {
    /// Create a poller over the given backend
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            snapshot: RwLock::new(StatusSnapshot::default()),
        }
    }

    /// Current snapshot
    pub async fn snapshot(&self) -> StatusSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Mirror a personality reported outside the poll cycle
    ///
    /// Answers can carry the personality they were produced with; the
    /// backend stays authoritative on the next refresh.
    pub async fn set_personality_mirror(&self, personality: &str) {
        self.snapshot.write().await.personality = personality.to_string();
    }

    /// Refresh all three status sources
    ///
    /// Each fetch is independent; a failure is logged and skips only its
    /// own fields.
    pub async fn refresh(&self) {
        match self.backend.cluster_summary().await {
            Ok(summary) => {
                let mut snapshot = self.snapshot.write().await;
                snapshot.k8s = summary
                    .node_count
                    .map_or_else(|| "0".to_string(), |n| n.to_string());
                snapshot.pods = summary
                    .pods
                    .map_or_else(|| "0".to_string(), |p| p.running.to_string());
                snapshot.cpu = summary
                    .cpu_usage
                    .map_or_else(|| "-".to_string(), |c| format!("{c}%"));
                snapshot.tailscale = summary
                    .tailscale
                    .map_or_else(|| "-".to_string(), |t| format!("{}/{}", t.online, t.total));
                snapshot.proxmox = summary
                    .proxmox
                    .and_then(|p| p.vms)
                    .map_or_else(|| "-".to_string(), |v| format!("{} VMs", v.running));
            }
            Err(e) => tracing::warn!(error = %e, "failed to load cluster summary"),
        }

        match self.backend.personality().await {
            Ok(info) => self.snapshot.write().await.personality = info.current,
            Err(e) => tracing::warn!(error = %e, "failed to load personality"),
        }

        match self.backend.health_report().await {
            Ok(report) => {
                self.snapshot.write().await.health =
                    format!("{}/100 {}", report.health_score, report.emoji);
            }
            Err(e) => tracing::warn!(error = %e, "failed to load health score"),
        }

        let snapshot = self.snapshot().await;
        tracing::debug!(%snapshot, "status refreshed");
    }

    /// Run the poll loop until the poke channel closes
    ///
    /// Refreshes immediately, then on every interval tick and every poke.
    pub async fn run(self: Arc<Self>, interval: Duration, mut poke: mpsc::Receiver<()>) {
        self.refresh().await;
        let mut ticker = tokio::time::interval(interval);
        ticker.reset();

        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh().await,
                poked = poke.recv() => match poked {
                    Some(()) => self.refresh().await,
                    None => break,
                },
            }
        }
    }
}
