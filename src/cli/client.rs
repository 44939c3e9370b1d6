//! HTTP client for a running meetbots service.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::routes::bots::{AddBotsRequest, AdjustBotsRequest};
use crate::fleet::{MeetingDetail, MeetingStatus};

pub struct FleetClient {
    client: reqwest::Client,
    base_url: String,
}

impl FleetClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn add_bots(&self, request: &AddBotsRequest) -> Result<Value> {
        self.post("/add-bots", request).await
    }

    pub async fn adjust_bots(&self, request: &AdjustBotsRequest) -> Result<Value> {
        self.post("/adjust-bots", request).await
    }

    pub async fn status(&self) -> Result<BTreeMap<String, MeetingStatus>> {
        self.get("/meeting-status").await
    }

    pub async fn meeting(&self, meeting_id: &str) -> Result<MeetingDetail> {
        self.get(&format!("/meeting-status/{meeting_id}")).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .with_context(|| format!("Failed to reach meetbots at {}", self.base_url))?;
        Self::decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach meetbots at {}", self.base_url))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no details");
            bail!("Request failed with {}: {}", status, message);
        }
        response
            .json()
            .await
            .context("Failed to parse meetbots response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let client = FleetClient::new("http://127.0.0.1:3838/");
        assert_eq!(client.base_url, "http://127.0.0.1:3838");
    }
}
