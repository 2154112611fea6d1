// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-level error type.
//!
//! Subsystem loops catch this at the top of each iteration, log it, and
//! move on; only store initialization failures are fatal to the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Store(#[from] pk_storage::StoreError),

    #[error(transparent)]
    Sensor(#[from] pk_sensors::SensorError),

    #[error(transparent)]
    Backend(#[from] pk_api::BackendError),

    #[error(transparent)]
    Vault(#[from] pk_vault::VaultError),

    #[error(transparent)]
    Config(#[from] pk_core::ConfigError),

    #[error(transparent)]
    Detect(#[from] pk_detect::DetectError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
