// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registration state machine: online when possible, offline fallback
//! otherwise. The device id is always locally generated and stable.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pk_api::{Backend, RegistrationRequest};
use pk_core::{Config, Registration, RegistrationStatus};
use pk_storage::Store;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::AgentError;

/// Shape of `<data_dir>/offline_registration.json`
#[derive(Debug, Deserialize)]
struct OfflineRegistration {
    #[serde(default)]
    org_id: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Ensure an active registration row exists, registering online when the
/// backend is configured and reachable, otherwise falling back to the
/// offline identity.
pub async fn ensure_registered<B: Backend>(
    store: &Store,
    backend: &B,
    config: &Arc<Mutex<Config>>,
) -> Result<Registration, AgentError> {
    let (device_id, device_name, org_id, api_key, base_url, data_dir) = {
        let config = config.lock();
        (
            config.agent.device_id.clone(),
            config.agent.name.clone(),
            config.saas.org_id.clone(),
            config.saas.api_key.clone(),
            config.saas.base_url.clone(),
            config.agent.data_dir.clone(),
        )
    };

    if let Some(existing) = store.registration(&device_id)? {
        if existing.status == RegistrationStatus::Active {
            return Ok(existing);
        }
    }

    if !base_url.is_empty() && !api_key.is_empty() {
        let request = RegistrationRequest {
            device_id: device_id.clone(),
            device_name,
            device_type: std::env::consts::OS.to_string(),
            org_id: org_id.clone(),
            api_key: api_key.clone(),
        };
        match backend.register(&request).await {
            Ok(response) => {
                let registration = Registration {
                    device_id: device_id.clone(),
                    org_id: response.org_id.clone().or(Some(org_id)),
                    api_key: response.api_key.clone().or(Some(api_key)),
                    registered_at: response
                        .registered_at
                        .as_deref()
                        .and_then(parse_timestamp)
                        .or_else(|| Some(Utc::now())),
                    last_heartbeat: None,
                    status: RegistrationStatus::Active,
                };
                store.save_registration(&registration)?;

                // Persist server-assigned credentials for the next start
                let mut config = config.lock();
                if let Some(org_id) = &response.org_id {
                    config.set("saas", "org_id", org_id)?;
                }
                if let Some(api_key) = &response.api_key {
                    config.set("saas", "api_key", api_key)?;
                }

                info!(device_id, "device registered online");
                return Ok(registration);
            }
            Err(e) => {
                warn!(error = %e, "online registration failed, falling back to offline");
            }
        }
    } else {
        info!("backend not configured, registering offline");
    }

    let registration = offline_registration(&device_id, &data_dir);
    store.save_registration(&registration)?;
    info!(device_id, status = %registration.status, "device registered offline");
    Ok(registration)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn offline_registration(device_id: &str, data_dir: &Path) -> Registration {
    let fallback_file = data_dir.join("offline_registration.json");
    let from_file = std::fs::read_to_string(&fallback_file)
        .ok()
        .and_then(|raw| serde_json::from_str::<OfflineRegistration>(&raw).ok());

    match from_file {
        Some(offline) => Registration {
            device_id: device_id.to_string(),
            org_id: offline.org_id.or_else(|| Some("offline".to_string())),
            api_key: offline.api_key,
            registered_at: Some(Utc::now()),
            last_heartbeat: None,
            status: offline
                .status
                .as_deref()
                .and_then(RegistrationStatus::parse)
                .unwrap_or(RegistrationStatus::Offline),
        },
        None => Registration {
            device_id: device_id.to_string(),
            org_id: Some("offline".to_string()),
            api_key: None,
            registered_at: Some(Utc::now()),
            last_heartbeat: None,
            status: RegistrationStatus::Offline,
        },
    }
}

#[cfg(test)]
#[path = "registration_tests.rs"]
mod tests;
