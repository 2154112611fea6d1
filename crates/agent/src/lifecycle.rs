// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator: builds the context, spawns the subsystems, and owns the
//! cancellation token. Shutdown is signaled once; each subsystem gets five
//! seconds to finish its current iteration before the process stops
//! waiting.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pk_alerts::{AlertTransport, EmailConfig, EmailTransport, WebhookTransport};
use pk_api::HttpBackend;
use pk_core::{Config, SystemClock};
use pk_sensors::SysinfoHost;
use pk_storage::Store;
use pk_vault::{BackupEngine, EngineConfig};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::CommandLoop;
use crate::context::AgentContext;
use crate::dispatch::AlertDispatcher;
use crate::registration;
use crate::sampler::Sampler;
use crate::sweep::RetentionSweeper;
use crate::sync::SyncWorker;
use crate::watcher::{FileWatcher, ProcessWatcher};

/// Deadline for subsystems to exit after cancellation
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] pk_core::ConfigError),

    #[error(transparent)]
    Store(#[from] pk_storage::StoreError),

    #[error(transparent)]
    Vault(#[from] pk_vault::VaultError),

    #[error(transparent)]
    Backend(#[from] pk_api::BackendError),

    #[error(transparent)]
    Agent(#[from] crate::error::AgentError),
}

/// Running daemon: subsystem tasks plus their cancellation token
pub struct Daemon {
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl Daemon {
    /// Open the store, ensure registration, and launch every subsystem.
    ///
    /// Store initialization errors are the only fatal ones; everything
    /// downstream degrades to offline behavior.
    pub async fn start(config: Config) -> Result<Self, StartupError> {
        let device_id = config.agent.device_id.clone();
        let data_dir = config.agent.data_dir.clone();

        let store = Store::open(data_dir.join("agent.db"))?.with_log_dir(config.logs_dir());

        let backend = Arc::new(HttpBackend::new(
            config.saas.base_url.clone(),
            config.saas.api_key.clone(),
            Duration::from_secs(config.saas.timeout),
        )?);

        let vault = Arc::new(BackupEngine::new(
            store.clone(),
            EngineConfig {
                backup_dir: config.agent.backup_dir.clone(),
                encryption_key_hex: config.backup.encryption_key.clone(),
                compression_level: config.backup.compression_level,
                max_backup_size: config.backup.max_backup_size,
                retention_days: config.backup.retention_days,
            },
        )?);

        let backup_enabled = config.backup.enabled;
        let sync_interval = Duration::from_secs(config.saas.sync_interval);
        let transports = build_transports(&config);

        let config = Arc::new(Mutex::new(config));
        registration::ensure_registered(&store, backend.as_ref(), &config).await?;

        let ctx = AgentContext {
            config: Arc::clone(&config),
            store: store.clone(),
            backend: Arc::clone(&backend),
            host: Arc::new(SysinfoHost::new()),
            vault: Arc::clone(&vault),
            device_id: device_id.clone(),
            data_dir: data_dir.clone(),
        };

        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        tasks.spawn(Sampler::new(ctx.clone()).run(cancel.clone()));
        tasks.spawn(FileWatcher::new(store.clone(), &config).run(cancel.clone()));
        tasks.spawn(
            ProcessWatcher::new(store.clone(), Arc::clone(&ctx.host)).run(cancel.clone()),
        );
        tasks.spawn(crate::AnomalyLoop::new(store.clone(), &data_dir).run(cancel.clone()));
        tasks.spawn(RetentionSweeper::new(vault, backup_enabled).run(cancel.clone()));
        tasks.spawn(CommandLoop::new(ctx.clone()).run(cancel.clone()));
        tasks.spawn(
            SyncWorker::new(store.clone(), backend, device_id, sync_interval).run(cancel.clone()),
        );
        tasks.spawn(
            AlertDispatcher::new(store, Arc::clone(&config), transports, SystemClock)
                .run(cancel.clone()),
        );

        info!("all subsystems started");
        Ok(Self { cancel, tasks })
    }

    /// Signal shutdown and wait for the subsystems, bounded by the
    /// 5-second deadline.
    pub async fn shutdown(mut self) {
        info!("shutting down subsystems");
        self.cancel.cancel();

        let deadline = tokio::time::Instant::now() + SHUTDOWN_DEADLINE;
        loop {
            match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                Ok(Some(Ok(()))) => {}
                Ok(Some(Err(e))) => warn!(error = %e, "subsystem task panicked"),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        remaining = self.tasks.len(),
                        "shutdown deadline reached, abandoning remaining tasks"
                    );
                    self.tasks.abort_all();
                    break;
                }
            }
        }
        info!("daemon stopped");
    }
}

fn build_transports(config: &Config) -> Vec<Arc<dyn AlertTransport>> {
    let mut transports: Vec<Arc<dyn AlertTransport>> = Vec::new();

    if !config.alerts.whatsapp_webhook.is_empty() {
        match WebhookTransport::new(
            config.alerts.whatsapp_webhook.clone(),
            Duration::from_secs(config.saas.timeout),
        ) {
            Ok(transport) => transports.push(Arc::new(transport)),
            Err(e) => warn!(error = %e, "could not build webhook transport"),
        }
    }

    if !config.alerts.email_smtp_server.is_empty() && !config.alerts.email_username.is_empty() {
        let recipient = if config.alerts.email_recipient.is_empty() {
            config.alerts.email_username.clone()
        } else {
            config.alerts.email_recipient.clone()
        };
        transports.push(Arc::new(EmailTransport::new(EmailConfig {
            smtp_server: config.alerts.email_smtp_server.clone(),
            smtp_port: config.alerts.email_smtp_port,
            username: config.alerts.email_username.clone(),
            password: config.alerts.email_password.clone(),
            recipient,
        })));
    }

    if transports.is_empty() {
        info!("no alert transports configured, alerts will only be audited");
    }
    transports
}
