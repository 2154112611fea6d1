// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! reqwest implementation of the backend contract

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    Backend, BackendError, CommandsResponse, RegistrationRequest, RegistrationResponse,
    RemoteCommand,
};

/// Backup uploads get a generous fixed timeout
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP backend with bearer auth
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    upload_client: reqwest::Client,
}

impl HttpBackend {
    /// `timeout` applies to every call except uploads.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::from)?;
        let upload_client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(BackendError::from)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
            upload_client,
        })
    }

    fn configured(&self) -> Result<(), BackendError> {
        if self.base_url.is_empty() || self.api_key.is_empty() {
            return Err(BackendError::NotConfigured);
        }
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check(response: &reqwest::Response) -> Result<(), BackendError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::from_status(status.as_u16()))
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn health(&self) -> Result<(), BackendError> {
        if self.base_url.is_empty() {
            return Err(BackendError::NotConfigured);
        }
        let response = self.client.get(self.url("/api/health")).send().await?;
        Self::check(&response)
    }

    async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, BackendError> {
        self.configured()?;
        let response = self
            .client
            .post(self.url("/api/devices/register"))
            .json(request)
            .send()
            .await?;
        Self::check(&response)?;
        response
            .json::<RegistrationResponse>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn heartbeat(&self, sample: &Value) -> Result<(), BackendError> {
        self.configured()?;
        let response = self
            .client
            .post(self.url("/api/devices/heartbeat"))
            .bearer_auth(&self.api_key)
            .json(sample)
            .send()
            .await?;
        Self::check(&response)
    }

    async fn telemetry_batch(&self, device_id: &str, batch: &[Value]) -> Result<(), BackendError> {
        self.configured()?;
        let payload = json!({
            "device_id": device_id,
            "telemetry_batch": batch,
            "batch_size": batch.len(),
        });
        let response = self
            .client
            .post(self.url("/api/devices/telemetry-batch"))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        Self::check(&response)
    }

    async fn security_events_batch(
        &self,
        device_id: &str,
        batch: &[Value],
    ) -> Result<(), BackendError> {
        self.configured()?;
        let payload = json!({
            "device_id": device_id,
            "events_batch": batch,
            "batch_size": batch.len(),
        });
        let response = self
            .client
            .post(self.url("/api/devices/security-events-batch"))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        Self::check(&response)
    }

    async fn fetch_commands(&self, device_id: &str) -> Result<Vec<RemoteCommand>, BackendError> {
        self.configured()?;
        let response = self
            .client
            .get(self.url(&format!("/api/devices/{device_id}/commands")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::check(&response)?;
        let body = response
            .json::<CommandsResponse>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        debug!(count = body.commands.len(), "polled commands");
        Ok(body.commands)
    }

    async fn post_command_result(
        &self,
        device_id: &str,
        command_id: &str,
        result: &Value,
    ) -> Result<(), BackendError> {
        self.configured()?;
        let payload = json!({
            "command_id": command_id,
            "result": result,
            "completed_at": Utc::now().to_rfc3339(),
        });
        let response = self
            .client
            .post(self.url(&format!("/api/devices/{device_id}/command-result")))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        Self::check(&response)
    }

    async fn upload_backup(&self, upload_url: &str, artifact: &Path) -> Result<(), BackendError> {
        let bytes = tokio::fs::read(artifact).await?;
        let response = self.upload_client.put(upload_url).body(bytes).send().await?;
        Self::check(&response)
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
