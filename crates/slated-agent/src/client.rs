//! HTTP client for the remote agent service
//!
//! Wraps the agents / files / vector-store / responses surface of the
//! service behind the [`AgentApi`] trait so the provisioning supervisor and
//! the pipeline can run against fakes in tests.

use crate::auth::{EnvTokenProvider, TokenCache, TokenProvider};
use crate::types::AgentDefinition;
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use slated_core::{Result, SlatedError};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

// Retry configuration
const MAX_ATTEMPTS: u32 = 6;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Poll interval while waiting for a vector store to index
const VECTOR_STORE_POLL: Duration = Duration::from_secs(2);

/// Operations the rest of the system needs from the agent service
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Invoke the `responses` endpoint with a prepared body
    async fn create_response(&self, body: Value) -> Result<Value>;

    /// Existing agents, keyed by lowercased name
    async fn list_agents_by_name(&self) -> Result<HashMap<String, String>>;

    /// Create an agent, returning its id
    async fn create_agent(&self, def: &AgentDefinition) -> Result<String>;

    /// Update an existing agent in place
    async fn update_agent(&self, id: &str, def: &AgentDefinition) -> Result<()>;

    /// Upload a file for indexing, returning its id
    async fn upload_file(&self, path: &Path) -> Result<String>;

    /// Create a vector store over the given file ids, returning its id
    async fn create_vector_store(&self, name: &str, file_ids: &[String]) -> Result<String>;

    /// Poll until the vector store reports `completed`, bounded by `timeout`
    async fn wait_vector_store_ready(&self, id: &str, timeout: Duration) -> Result<()>;
}

/// Production client for the agent service
pub struct FoundryClient {
    http: reqwest::Client,
    base: String,
    api_version: String,
    timeout: Duration,
    tokens: TokenCache,
}

impl FoundryClient {
    pub fn new(endpoint: &str, api_version: &str, timeout: Duration) -> Self {
        Self::with_token_provider(endpoint, api_version, timeout, Box::new(EnvTokenProvider))
    }

    pub fn with_token_provider(
        endpoint: &str,
        api_version: &str,
        timeout: Duration,
        provider: Box<dyn TokenProvider>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: endpoint.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
            timeout,
            tokens: TokenCache::new(provider),
        }
    }

    /// Join the base endpoint with a relative path.
    ///
    /// The base is tolerated whether or not it already ends in the `openai`
    /// segment; a duplicated segment is collapsed. The configured api-version
    /// query parameter is appended when missing.
    fn endpoint_url(&self, rel: &str) -> String {
        let mut base = self.base.clone();
        let rel = rel.trim_start_matches('/');

        if base.ends_with("/openai") && rel.starts_with("openai/") {
            base.truncate(base.len() - "/openai".len());
        }

        let mut url = format!("{}/{}", base, rel);
        if !url.contains("api-version=") {
            let sep = if url.contains('?') { '&' } else { '?' };
            url.push(sep);
            url.push_str("api-version=");
            url.push_str(&self.api_version);
        }
        url
    }

    /// Send a request, retrying transport failures and 429/5xx responses.
    ///
    /// Up to six attempts. Delay starts at 500 ms and doubles per attempt
    /// with uniform jitter in `[delay, 1.2 * delay]`; a `Retry-After` delta
    /// on the response replaces the computed delay for the next wait.
    /// Any other status is returned untouched for the caller to classify.
    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        file_part: Option<(&str, Vec<u8>)>,
    ) -> Result<reqwest::Response> {
        let mut delay = INITIAL_BACKOFF;

        for attempt in 1..=MAX_ATTEMPTS {
            let token = self.tokens.bearer().await?;
            let mut request = self
                .http
                .request(method.clone(), url)
                .bearer_auth(token)
                .timeout(self.timeout);
            if let Some(body) = body {
                request = request.json(body);
            }
            if let Some((filename, bytes)) = &file_part {
                let form = reqwest::multipart::Form::new()
                    .text("purpose", "assistants")
                    .part(
                        "file",
                        reqwest::multipart::Part::bytes(bytes.clone())
                            .file_name(filename.to_string()),
                    );
                request = request.multipart(form);
            }

            debug!("{} {} (attempt {})", method, url, attempt);

            let wait = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status != StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
                        return Ok(response);
                    }
                    if attempt == MAX_ATTEMPTS {
                        let text = response.text().await.unwrap_or_default();
                        return Err(SlatedError::UpstreamTransient(format!(
                            "{} after {} attempts: {}",
                            status, MAX_ATTEMPTS, text
                        )));
                    }
                    // Retry-After replaces the computed delay when present
                    response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| jitter(delay))
                }
                Err(e) => {
                    if attempt == MAX_ATTEMPTS {
                        return Err(SlatedError::UpstreamTransient(format!(
                            "transport error after {} attempts: {}",
                            MAX_ATTEMPTS, e
                        )));
                    }
                    jitter(delay)
                }
            };

            warn!(
                "Request to {} failed, retrying in {:?} ({}/{})",
                url, wait, attempt, MAX_ATTEMPTS
            );
            tokio::time::sleep(wait).await;
            delay *= 2;
        }

        unreachable!("retry loop returns on the final attempt")
    }

    /// Classify a non-retried response and decode the JSON body
    async fn expect_json(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SlatedError::Upstream(format!("{}: {}", status, text)));
        }
        response
            .json()
            .await
            .map_err(|e| SlatedError::Upstream(format!("invalid JSON body: {}", e)))
    }

    async fn post_json(&self, rel: &str, body: Value) -> Result<Value> {
        let url = self.endpoint_url(rel);
        let response = self
            .send_with_retry(Method::POST, &url, Some(&body), None)
            .await?;
        self.expect_json(response).await
    }

    async fn get_json(&self, rel: &str) -> Result<Value> {
        let url = self.endpoint_url(rel);
        let response = self.send_with_retry(Method::GET, &url, None, None).await?;
        self.expect_json(response).await
    }
}

/// Uniform jitter in `[delay, 1.2 * delay]`
fn jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(1.0..=1.2);
    delay.mul_f64(factor)
}

/// Read a string `id` field out of a service response
fn expect_id(value: &Value, context: &str) -> Result<String> {
    value["id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SlatedError::Upstream(format!("{} response carried no id", context)))
}

#[async_trait]
impl AgentApi for FoundryClient {
    async fn create_response(&self, body: Value) -> Result<Value> {
        self.post_json("openai/responses", body).await
    }

    async fn list_agents_by_name(&self) -> Result<HashMap<String, String>> {
        let value = self.get_json("openai/agents").await?;

        // The service answers with either an envelope holding a `data`
        // array or a bare array. Items missing an id or a name are skipped.
        let items = match &value {
            Value::Array(items) => items.as_slice(),
            _ => value["data"].as_array().map(Vec::as_slice).unwrap_or(&[]),
        };

        let mut agents = HashMap::new();
        for item in items {
            let Some(id) = item["id"].as_str() else {
                continue;
            };
            let name = item["name"]
                .as_str()
                .or_else(|| item["definition"]["name"].as_str());
            let Some(name) = name else {
                continue;
            };
            agents.insert(name.to_lowercase(), id.to_string());
        }
        Ok(agents)
    }

    async fn create_agent(&self, def: &AgentDefinition) -> Result<String> {
        let body = serde_json::to_value(def)?;
        let value = self.post_json("openai/agents", body).await?;
        expect_id(&value, "create_agent")
    }

    async fn update_agent(&self, id: &str, def: &AgentDefinition) -> Result<()> {
        let body = serde_json::to_value(def)?;
        self.post_json(&format!("openai/agents/{}", id), body)
            .await?;
        Ok(())
    }

    async fn upload_file(&self, path: &Path) -> Result<String> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("seed")
            .to_string();
        let bytes = tokio::fs::read(path).await?;

        let url = self.endpoint_url("openai/files");
        let response = self
            .send_with_retry(Method::POST, &url, None, Some((&filename, bytes)))
            .await?;
        let value = self.expect_json(response).await?;
        expect_id(&value, "upload_file")
    }

    async fn create_vector_store(&self, name: &str, file_ids: &[String]) -> Result<String> {
        let value = self
            .post_json(
                "openai/vector_stores",
                json!({ "name": name, "file_ids": file_ids }),
            )
            .await?;
        expect_id(&value, "create_vector_store")
    }

    async fn wait_vector_store_ready(&self, id: &str, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let value = self.get_json(&format!("openai/vector_stores/{}", id)).await?;
            match value["status"].as_str() {
                Some("completed") => return Ok(()),
                Some("failed") | Some("expired") => {
                    return Err(SlatedError::Upstream(format!(
                        "vector store {} entered status {}",
                        id, value["status"]
                    )));
                }
                other => {
                    debug!("Vector store {} status: {:?}", id, other);
                }
            }

            if tokio::time::Instant::now() + VECTOR_STORE_POLL > deadline {
                return Err(SlatedError::Upstream(format!(
                    "vector store {} not ready within {:?}",
                    id, timeout
                )));
            }
            tokio::time::sleep(VECTOR_STORE_POLL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with_base(base: &str) -> FoundryClient {
        FoundryClient::new(base, "2025-11-15-preview", Duration::from_secs(30))
    }

    #[test]
    fn test_endpoint_url_plain_base() {
        let client = client_with_base("https://proj.example.com");
        assert_eq!(
            client.endpoint_url("openai/responses"),
            "https://proj.example.com/openai/responses?api-version=2025-11-15-preview"
        );
    }

    #[test]
    fn test_endpoint_url_collapses_duplicate_segment() {
        // Base already carries the `openai` segment, with and without a slash
        for base in [
            "https://proj.example.com/openai",
            "https://proj.example.com/openai/",
        ] {
            let client = client_with_base(base);
            assert_eq!(
                client.endpoint_url("openai/responses"),
                "https://proj.example.com/openai/responses?api-version=2025-11-15-preview"
            );
        }
    }

    #[test]
    fn test_endpoint_url_keeps_existing_api_version() {
        let client = client_with_base("https://proj.example.com");
        let url = client.endpoint_url("openai/agents?api-version=v1");
        assert_eq!(
            url,
            "https://proj.example.com/openai/agents?api-version=v1"
        );
    }

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_millis(500);
        for _ in 0..100 {
            let jittered = jitter(base);
            assert!(jittered >= base);
            assert!(jittered <= base.mul_f64(1.2001));
        }
    }

    #[test]
    fn test_expect_id() {
        assert_eq!(
            expect_id(&json!({"id": "agent_1"}), "create_agent").unwrap(),
            "agent_1"
        );
        assert!(expect_id(&json!({"name": "x"}), "create_agent").is_err());
    }
}
