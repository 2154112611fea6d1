// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::test_context;
use pk_api::RegistrationResponse;

fn configure_backend(fixture: &crate::test_support::TestCtx) {
    let mut config = fixture.ctx.config.lock();
    config.set("saas", "base_url", "https://api.example.com").unwrap();
    config.set("saas", "api_key", "initial-key").unwrap();
    config.set("saas", "org_id", "org-1").unwrap();
}

#[tokio::test]
async fn registers_online_and_persists_server_credentials() {
    let fixture = test_context();
    configure_backend(&fixture);
    fixture.backend.set_register_response(RegistrationResponse {
        device_id: fixture.ctx.device_id.clone(),
        org_id: Some("org-assigned".to_string()),
        api_key: Some("server-key".to_string()),
        status: Some("active".to_string()),
        registered_at: Some("2026-08-01T00:00:00Z".to_string()),
    });

    let registration =
        ensure_registered(&fixture.store, fixture.backend.as_ref(), &fixture.ctx.config)
            .await
            .unwrap();

    assert_eq!(registration.status, RegistrationStatus::Active);
    assert_eq!(registration.org_id.as_deref(), Some("org-assigned"));
    assert_eq!(fixture.backend.registrations().len(), 1);

    // Server-assigned values written through to config
    let config = fixture.ctx.config.lock();
    assert_eq!(config.saas.org_id, "org-assigned");
    assert_eq!(config.saas.api_key, "server-key");
}

#[tokio::test]
async fn existing_active_registration_short_circuits() {
    let fixture = test_context();
    configure_backend(&fixture);
    fixture
        .store
        .save_registration(&Registration {
            device_id: fixture.ctx.device_id.clone(),
            org_id: Some("org-1".to_string()),
            api_key: Some("key".to_string()),
            registered_at: Some(Utc::now()),
            last_heartbeat: None,
            status: RegistrationStatus::Active,
        })
        .unwrap();

    ensure_registered(&fixture.store, fixture.backend.as_ref(), &fixture.ctx.config)
        .await
        .unwrap();

    // No register call went out
    assert!(fixture.backend.registrations().is_empty());
}

#[tokio::test]
async fn unreachable_backend_falls_back_to_offline() {
    let fixture = test_context();
    configure_backend(&fixture);
    fixture.backend.set_offline(true);

    let registration =
        ensure_registered(&fixture.store, fixture.backend.as_ref(), &fixture.ctx.config)
            .await
            .unwrap();

    assert_eq!(registration.status, RegistrationStatus::Offline);
    assert_eq!(registration.org_id.as_deref(), Some("offline"));
    assert!(fixture
        .store
        .registration(&fixture.ctx.device_id)
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn unconfigured_backend_registers_offline_without_calling_out() {
    let fixture = test_context();

    let registration =
        ensure_registered(&fixture.store, fixture.backend.as_ref(), &fixture.ctx.config)
            .await
            .unwrap();

    assert_eq!(registration.status, RegistrationStatus::Offline);
    assert!(fixture.backend.registrations().is_empty());
}

#[tokio::test]
async fn offline_file_supplies_identity() {
    let fixture = test_context();
    let data_dir = fixture.ctx.data_dir.clone();
    std::fs::write(
        data_dir.join("offline_registration.json"),
        r#"{"org_id": "org-from-file", "api_key": "file-key", "status": "active"}"#,
    )
    .unwrap();

    let registration =
        ensure_registered(&fixture.store, fixture.backend.as_ref(), &fixture.ctx.config)
            .await
            .unwrap();

    assert_eq!(registration.org_id.as_deref(), Some("org-from-file"));
    assert_eq!(registration.api_key.as_deref(), Some("file-key"));
    assert_eq!(registration.status, RegistrationStatus::Active);
}
