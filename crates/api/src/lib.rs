// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pk-api: the SaaS wire contract.
//!
//! Everything the agent says to the backend goes through the [`Backend`]
//! trait: registration, heartbeats, queue drains, command polling and
//! signed-URL uploads. The trait keeps every subsystem testable against
//! [`FakeBackend`] without a network.

mod http;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use http::HttpBackend;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeBackend;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Backend call errors, bucketed by how the caller should react
#[derive(Debug, Error)]
pub enum BackendError {
    /// No base URL / API key configured; queue-for-offline territory
    #[error("backend not configured")]
    NotConfigured,

    /// DNS, timeout, connection reset; retryable
    #[error("transport error: {0}")]
    Transport(String),

    /// 401/403; do not retry this tick
    #[error("authentication rejected ({status})")]
    AuthRejected { status: u16 },

    /// Any other non-2xx
    #[error("unexpected status {status}")]
    Status { status: u16 },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => BackendError::AuthRejected { status },
            _ => BackendError::Status { status },
        }
    }

    /// Worth retrying later (network trouble or server-side failure).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Transport(_) | BackendError::Status { status: 500..=599 }
        )
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Transport(e.to_string())
    }
}

/// Body of `POST /api/devices/register`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    pub org_id: String,
    pub api_key: String,
}

/// Response of `POST /api/devices/register`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub device_id: String,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub registered_at: Option<String>,
}

/// One command from `GET /api/devices/{id}/commands`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub id: String,
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommandsResponse {
    #[serde(default)]
    pub commands: Vec<RemoteCommand>,
}

/// The SaaS backend as the agent sees it
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// `GET /api/health`, the liveness probe before a drain.
    async fn health(&self) -> Result<(), BackendError>;

    async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, BackendError>;

    /// `POST /api/devices/heartbeat` with one telemetry sample.
    async fn heartbeat(&self, sample: &Value) -> Result<(), BackendError>;

    async fn telemetry_batch(&self, device_id: &str, batch: &[Value]) -> Result<(), BackendError>;

    async fn security_events_batch(
        &self,
        device_id: &str,
        batch: &[Value],
    ) -> Result<(), BackendError>;

    async fn fetch_commands(&self, device_id: &str) -> Result<Vec<RemoteCommand>, BackendError>;

    async fn post_command_result(
        &self,
        device_id: &str,
        command_id: &str,
        result: &Value,
    ) -> Result<(), BackendError>;

    /// `PUT` the raw ciphertext to a signed upload URL.
    async fn upload_backup(&self, upload_url: &str, artifact: &Path) -> Result<(), BackendError>;
}
