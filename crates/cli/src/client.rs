//! API client for the scorerd HTTP API

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use url::Url;

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// Send a request, turning non-2xx answers into errors that carry the
    /// server's message
    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        Ok(response)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = Self::send(self.client.get(self.url(path)?)).await?;
        response.json().await.context("Failed to parse response")
    }

    /// GET that tolerates 503, used for health probes
    pub async fn probe<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .context("Failed to send request")?;
        response.json().await.context("Failed to parse response")
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = Self::send(self.client.post(self.url(path)?).json(body)).await?;
        response.json().await.context("Failed to parse response")
    }

    /// POST for endpoints that answer without a body
    pub async fn post_no_content<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        Self::send(self.client.post(self.url(path)?).json(body)).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        Self::send(self.client.delete(self.url(path)?)).await?;
        Ok(())
    }
}

// API types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketScore {
    pub socket: u32,
    pub cores: usize,
    pub base_score: f64,
    pub c6res: Option<f64>,
    pub gated_score: f64,
    pub eligible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringResult {
    pub node: String,
    pub score: f64,
    pub socket: Option<u32>,
    pub core_count: usize,
    pub final_score: f64,
    pub window_secs: u64,
    pub sockets: Vec<SocketScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrioritizeRequest {
    pub workload: Workload,
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostPriority {
    pub host: String,
    pub socket: Option<u32>,
    pub score: f64,
    pub num_cores: usize,
    pub final_score: f64,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeFailure {
    pub host: String,
    pub reason: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityList {
    pub workload: String,
    pub priorities: Vec<HostPriority>,
    pub failures: Vec<NodeFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    pub node: String,
    pub socket: u32,
    pub profile: String,
    pub counts_toward_idle: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleCapacity {
    pub node: String,
    pub idle_core_equivalent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSocket {
    pub node: String,
    pub socket: u32,
    pub ipc: f64,
    pub mem_read: f64,
    pub mem_write: f64,
    pub c6res: f64,
    pub fresh: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppProfile {
    pub ipc: f64,
    pub mem_read: f64,
    pub mem_write: f64,
    pub c6res: f64,
    pub duration_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileList {
    pub profiles: BTreeMap<String, AppProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub consecutive_failures: u32,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_parses_scoring_result() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/nodes/kube-01/score")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"node":"kube-01","score":1.0,"socket":1,"core_count":8,
                    "final_score":68.64,"window_secs":20,
                    "sockets":[{"socket":0,"cores":8,"base_score":10.0,"c6res":0.02,
                                "gated_score":0.2,"eligible":true}]}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result: ScoringResult = client.get("api/v1/nodes/kube-01/score").await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.socket, Some(1));
        assert_eq!(result.sockets[0].gated_score, 0.2);
    }

    #[tokio::test]
    async fn test_error_body_message_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/nodes/ghost/score")
            .with_status(404)
            .with_body(r#"{"error":"node not found in topology: ghost","code":"topology_not_found"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .get::<ScoringResult>("api/v1/nodes/ghost/score")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("404"));
        assert!(message.contains("node not found in topology: ghost"));
    }

    #[tokio::test]
    async fn test_post_no_content_and_delete() {
        let mut server = mockito::Server::new_async().await;
        let placement = server
            .mock("POST", "/api/v1/placements")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "node": "kube-01",
                "socket": 0,
                "profile": "spec-leslie"
            })))
            .with_status(204)
            .create_async()
            .await;
        let flush = server
            .mock("DELETE", "/api/v1/cache")
            .with_status(204)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        client
            .post_no_content(
                "api/v1/placements",
                &Placement {
                    node: "kube-01".into(),
                    socket: 0,
                    profile: "spec-leslie".into(),
                    counts_toward_idle: true,
                },
            )
            .await
            .unwrap();
        client.delete("api/v1/cache").await.unwrap();

        placement.assert_async().await;
        flush.assert_async().await;
    }

    #[tokio::test]
    async fn test_probe_accepts_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/readyz")
            .with_status(503)
            .with_body(r#"{"ready":false,"reason":"Scorer not yet initialized"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let readiness: ReadinessResponse = client.probe("readyz").await.unwrap();
        assert!(!readiness.ready);
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
