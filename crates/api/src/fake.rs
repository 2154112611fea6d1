// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable in-memory backend for tests

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::{Backend, BackendError, RegistrationRequest, RegistrationResponse, RemoteCommand};

#[derive(Default)]
struct Inner {
    offline: AtomicBool,
    reject_auth: AtomicBool,
    heartbeats: Mutex<Vec<Value>>,
    telemetry_batches: Mutex<Vec<Vec<Value>>>,
    event_batches: Mutex<Vec<Vec<Value>>>,
    command_results: Mutex<Vec<(String, Value)>>,
    uploads: Mutex<Vec<String>>,
    registrations: Mutex<Vec<RegistrationRequest>>,
    register_response: Mutex<Option<RegistrationResponse>>,
    poll_responses: Mutex<VecDeque<Vec<RemoteCommand>>>,
}

/// Fake backend: scripted responses, recorded calls.
///
/// Starts online; `set_offline(true)` turns every call into a transport
/// error, `set_reject_auth(true)` into a 401.
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Inner>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_reject_auth(&self, reject: bool) {
        self.inner.reject_auth.store(reject, Ordering::SeqCst);
    }

    /// Queue one poll response; each `fetch_commands` pops one.
    pub fn push_poll_response(&self, commands: Vec<RemoteCommand>) {
        self.inner.poll_responses.lock().push_back(commands);
    }

    pub fn set_register_response(&self, response: RegistrationResponse) {
        *self.inner.register_response.lock() = Some(response);
    }

    pub fn heartbeats(&self) -> Vec<Value> {
        self.inner.heartbeats.lock().clone()
    }

    pub fn telemetry_batches(&self) -> Vec<Vec<Value>> {
        self.inner.telemetry_batches.lock().clone()
    }

    pub fn event_batches(&self) -> Vec<Vec<Value>> {
        self.inner.event_batches.lock().clone()
    }

    pub fn command_results(&self) -> Vec<(String, Value)> {
        self.inner.command_results.lock().clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.inner.uploads.lock().clone()
    }

    pub fn registrations(&self) -> Vec<RegistrationRequest> {
        self.inner.registrations.lock().clone()
    }

    fn gate(&self) -> Result<(), BackendError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("fake backend offline".to_string()));
        }
        if self.inner.reject_auth.load(Ordering::SeqCst) {
            return Err(BackendError::AuthRejected { status: 401 });
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn health(&self) -> Result<(), BackendError> {
        self.gate()
    }

    async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, BackendError> {
        self.gate()?;
        self.inner.registrations.lock().push(request.clone());
        Ok(self.inner.register_response.lock().clone().unwrap_or(
            RegistrationResponse {
                device_id: request.device_id.clone(),
                org_id: Some(request.org_id.clone()),
                api_key: Some(request.api_key.clone()),
                status: Some("active".to_string()),
                registered_at: None,
            },
        ))
    }

    async fn heartbeat(&self, sample: &Value) -> Result<(), BackendError> {
        self.gate()?;
        self.inner.heartbeats.lock().push(sample.clone());
        Ok(())
    }

    async fn telemetry_batch(&self, _device_id: &str, batch: &[Value]) -> Result<(), BackendError> {
        self.gate()?;
        self.inner.telemetry_batches.lock().push(batch.to_vec());
        Ok(())
    }

    async fn security_events_batch(
        &self,
        _device_id: &str,
        batch: &[Value],
    ) -> Result<(), BackendError> {
        self.gate()?;
        self.inner.event_batches.lock().push(batch.to_vec());
        Ok(())
    }

    async fn fetch_commands(&self, _device_id: &str) -> Result<Vec<RemoteCommand>, BackendError> {
        self.gate()?;
        Ok(self.inner.poll_responses.lock().pop_front().unwrap_or_default())
    }

    async fn post_command_result(
        &self,
        _device_id: &str,
        command_id: &str,
        result: &Value,
    ) -> Result<(), BackendError> {
        self.gate()?;
        self.inner
            .command_results
            .lock()
            .push((command_id.to_string(), result.clone()));
        Ok(())
    }

    async fn upload_backup(&self, upload_url: &str, artifact: &Path) -> Result<(), BackendError> {
        self.gate()?;
        if !artifact.exists() {
            return Err(BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "artifact missing",
            )));
        }
        self.inner.uploads.lock().push(upload_url.to_string());
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
