//! HTTP client for communicating with beacond.

use anyhow::{anyhow, Result};
use beacon_common::{
    ChatRequest, ConversationResponse, ErrorResponse, Fact, HealthResponse, Step,
};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Client for the beacond HTTP API.
pub struct BeacondClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl BeacondClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http_client.get(&url).send().await.map_err(|e| {
            connection_error(&self.base_url, e)
        })?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("daemon returned {status}"));
        Err(anyhow!("{message}"))
    }

    /// Ask a question and get a cited answer.
    pub async fn ask(&self, message: &str) -> Result<ConversationResponse> {
        let url = format!("{}/v1/chat/message", self.base_url);
        let request = ChatRequest {
            message: message.to_string(),
            session_id: None,
        };
        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| connection_error(&self.base_url, e))?;
        Self::decode(response).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_json("/v1/health").await
    }

    pub async fn fact(&self, fact_id: &str) -> Result<Fact> {
        self.get_json(&format!("/v1/facts/{fact_id}")).await
    }

    pub async fn search_facts(&self, prefix: &str) -> Result<Vec<Fact>> {
        self.get_json(&format!("/v1/facts/search?prefix={prefix}"))
            .await
    }

    pub async fn process_steps(&self, process_id: &str) -> Result<Vec<Step>> {
        self.get_json(&format!("/v1/processes/{process_id}/steps"))
            .await
    }
}

fn connection_error(base_url: &str, err: reqwest::Error) -> anyhow::Error {
    if err.is_connect() {
        anyhow!(
            "Cannot reach the Beacon daemon at {}.\n\
             Is beacond running? Start it with:\n\
             beacond --config /etc/beacon/beacond.toml",
            base_url
        )
    } else {
        anyhow!("Request to Beacon daemon failed: {}", err)
    }
}
