//! Backend collaborator API
//!
//! The console consumes four abstract operations: question answering,
//! speech synthesis, ambient status, and personality control. [`Backend`]
//! is the seam; [`HttpBackend`] talks to the real Stewie backend over
//! HTTP. Everything behind the seam (reasoning, history, codecs) is the
//! backend's business.

use async_trait::async_trait;
use serde::Deserialize;

use crate::{Error, Result};

/// Answer to a dispatched question
#[derive(Debug, Clone, Deserialize)]
pub struct Answer {
    /// Answer text to render and speak
    pub answer: String,
    /// Personality the backend answered with, when it changed
    #[serde(default)]
    pub personality: Option<String>,
}

/// Which provider produced synthesized speech
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisProvider {
    /// Premium provider returned ready-to-play audio
    Premium,
    /// No premium audio; caller must use the local fallback
    None,
}

/// Result of a speech synthesis request
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Provider that handled the request
    pub provider: SynthesisProvider,
    /// Base64-encoded MP3 payload (premium only)
    pub audio: Option<String>,
}

/// Ambient cluster summary for the status bar
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterSummary {
    /// Kubernetes node count
    #[serde(default)]
    pub node_count: Option<u32>,
    /// Pod counts
    #[serde(default)]
    pub pods: Option<PodCounts>,
    /// Cluster CPU usage percentage
    #[serde(default)]
    pub cpu_usage: Option<f64>,
    /// Tailscale mesh summary
    #[serde(default)]
    pub tailscale: Option<TailscaleSummary>,
    /// Proxmox summary
    #[serde(default)]
    pub proxmox: Option<ProxmoxSummary>,
}

/// Pod counts by phase
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodCounts {
    /// Running pods
    #[serde(default)]
    pub running: u32,
}

/// Tailscale node availability
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TailscaleSummary {
    /// Nodes currently online
    #[serde(default)]
    pub online: u32,
    /// Total nodes
    #[serde(default)]
    pub total: u32,
}

/// Proxmox VM availability
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxmoxSummary {
    /// VM counts
    #[serde(default)]
    pub vms: Option<VmCounts>,
}

/// VM counts by state
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VmCounts {
    /// Running VMs
    #[serde(default)]
    pub running: u32,
}

/// Current personality as reported by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct PersonalityInfo {
    /// Current mode wire name
    pub current: String,
}

/// Backend acknowledgement of a personality change
#[derive(Debug, Clone, Deserialize)]
pub struct PersonalityChange {
    /// Whether the change was applied
    #[serde(default)]
    pub success: bool,
    /// Human-readable description of the new mode
    #[serde(default)]
    pub description: String,
}

/// Cluster health analysis
#[derive(Debug, Clone, Deserialize)]
pub struct HealthReport {
    /// Score out of 100
    pub health_score: u32,
    /// Mood emoji for the score
    #[serde(default)]
    pub emoji: String,
    /// One-word status
    #[serde(default)]
    pub status: String,
    /// Active warnings
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Observations
    #[serde(default)]
    pub insights: Vec<String>,
    /// Suggested actions
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Abstract backend operations consumed by the console
#[async_trait]
pub trait Backend: Send + Sync {
    /// Ask a free-text question
    ///
    /// # Errors
    ///
    /// Returns error on network failure or a backend-reported error.
    async fn ask(&self, question: &str) -> Result<Answer>;

    /// Request speech synthesis for an answer
    ///
    /// # Errors
    ///
    /// Returns error on network failure or a backend-reported error.
    async fn synthesize(&self, text: &str) -> Result<Synthesis>;

    /// Fetch the ambient cluster summary
    ///
    /// # Errors
    ///
    /// Returns error on network failure or a backend-reported error.
    async fn cluster_summary(&self) -> Result<ClusterSummary>;

    /// Fetch the current personality
    ///
    /// # Errors
    ///
    /// Returns error on network failure or a backend-reported error.
    async fn personality(&self) -> Result<PersonalityInfo>;

    /// Request a personality change
    ///
    /// # Errors
    ///
    /// Returns error on network failure or a backend-reported error.
    async fn set_personality(&self, mode: &str) -> Result<PersonalityChange>;

    /// Fetch the cluster health analysis
    ///
    /// # Errors
    ///
    /// Returns error on network failure or a backend-reported error.
    async fn health_report(&self) -> Result<HealthReport>;
}

/// Error payload returned by the backend on failed requests
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Raw TTS response wire shape
#[derive(Debug, Deserialize)]
struct TtsBody {
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    audio: Option<String>,
}

/// HTTP client for the Stewie backend API
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client for the given base URL
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Parse a JSON response, mapping non-success statuses to
    /// [`Error::Backend`] with the backend's error message when present.
    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or(body);
            tracing::debug!(status = %status, message = %message, "backend error response");
            return Err(Error::Backend(format!("{status}: {message}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn ask(&self, question: &str) -> Result<Answer> {
        #[derive(serde::Serialize)]
        struct AskRequest<'a> {
            question: &'a str,
        }

        let response = self
            .client
            .post(self.url("/api/ask"))
            .json(&AskRequest { question })
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn synthesize(&self, text: &str) -> Result<Synthesis> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            text: &'a str,
        }

        let response = self
            .client
            .post(self.url("/api/tts"))
            .json(&TtsRequest { text })
            .send()
            .await?;

        let body: TtsBody = Self::parse(response).await?;
        Ok(synthesis_from_body(body))
    }

    async fn cluster_summary(&self) -> Result<ClusterSummary> {
        #[derive(Deserialize)]
        struct StatusBody {
            cluster: ClusterSummary,
        }

        let response = self.client.get(self.url("/api/status")).send().await?;
        let body: StatusBody = Self::parse(response).await?;
        Ok(body.cluster)
    }

    async fn personality(&self) -> Result<PersonalityInfo> {
        let response = self.client.get(self.url("/api/personality")).send().await?;
        Self::parse(response).await
    }

    async fn set_personality(&self, mode: &str) -> Result<PersonalityChange> {
        #[derive(serde::Serialize)]
        struct ModeRequest<'a> {
            mode: &'a str,
        }

        let response = self
            .client
            .post(self.url("/api/personality"))
            .json(&ModeRequest { mode })
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn health_report(&self) -> Result<HealthReport> {
        let response = self
            .client
            .get(self.url("/api/health-report"))
            .send()
            .await?;
        Self::parse(response).await
    }
}

/// Map the wire TTS body onto the provider enum
///
/// Anything without a premium audio payload falls back locally.
fn synthesis_from_body(body: TtsBody) -> Synthesis {
    let premium = body.provider.as_deref() == Some("elevenlabs") && body.audio.is_some();
    if premium {
        Synthesis {
            provider: SynthesisProvider::Premium,
            audio: body.audio,
        }
    } else {
        Synthesis {
            provider: SynthesisProvider::None,
            audio: None,
        }
    }
}
