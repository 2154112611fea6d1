// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency: a command id served twice executes once.

use crate::prelude::{fixture, snapshot};
use pk_agent::CommandLoop;
use pk_api::RemoteCommand;
use pk_core::CommandStatus;

#[tokio::test]
async fn same_command_in_two_polls_runs_once() {
    let fx = fixture();
    fx.host.set_snapshot(snapshot(15.0, 30.0, 45.0));

    let command = RemoteCommand {
        id: "c1".to_string(),
        command_type: "get_status".to_string(),
        parameters: serde_json::Value::Null,
    };
    fx.backend.push_poll_response(vec![command.clone()]);
    fx.backend.push_poll_response(vec![command]);

    let command_loop = CommandLoop::new(fx.ctx.clone());
    let first = command_loop.poll_once().await.unwrap();
    let second = command_loop.poll_once().await.unwrap();
    assert_eq!((first, second), (1, 0));

    // One record, completed, and exactly one result POST
    let record = fx.store.command("c1").unwrap().unwrap();
    assert_eq!(record.status, CommandStatus::Completed);
    let results = fx.backend.command_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "c1");
    assert_eq!(results[0].1["status"]["cpu_percent"], 15.0);
}

#[tokio::test]
async fn duplicate_within_one_poll_response_also_runs_once() {
    let fx = fixture();
    fx.host.set_snapshot(snapshot(15.0, 30.0, 45.0));

    let command = RemoteCommand {
        id: "c1".to_string(),
        command_type: "get_status".to_string(),
        parameters: serde_json::Value::Null,
    };
    fx.backend.push_poll_response(vec![command.clone(), command]);

    let executed = CommandLoop::new(fx.ctx.clone()).poll_once().await.unwrap();
    assert_eq!(executed, 1);
    assert_eq!(fx.backend.command_results().len(), 1);
}
