// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn fake_transport_records_sends() {
    let fake = FakeTransport::new();
    fake.send("threshold_violation", Severity::Medium, "CPU high")
        .await
        .unwrap();

    let sent = fake.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].alert_type, "threshold_violation");
    assert_eq!(sent[0].severity, Severity::Medium);
}

#[tokio::test]
async fn fake_transport_scripted_failure() {
    let fake = FakeTransport::new();
    fake.set_fail(true);
    assert!(fake.send("x", Severity::Low, "m").await.is_err());
    assert!(fake.sent().is_empty());
}

#[tokio::test]
async fn webhook_transport_fails_cleanly_when_unreachable() {
    let transport =
        WebhookTransport::new("http://192.0.2.1:9/hook", std::time::Duration::from_millis(200))
            .unwrap();
    let err = transport
        .send("test_alert", Severity::Low, "body")
        .await
        .unwrap_err();
    assert!(matches!(err, AlertError::Webhook(_)));
}

#[tokio::test]
async fn email_transport_rejects_bad_addresses() {
    let transport = EmailTransport::new(EmailConfig {
        smtp_server: "smtp.example.com".to_string(),
        smtp_port: 587,
        username: "not an address".to_string(),
        password: "secret".to_string(),
        recipient: "ops@example.com".to_string(),
    });

    let err = transport
        .send("test_alert", Severity::Low, "body")
        .await
        .unwrap_err();
    assert!(matches!(err, AlertError::BadAddress(_)));
}
