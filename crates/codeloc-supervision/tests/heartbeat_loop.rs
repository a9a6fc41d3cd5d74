//! ---
//! codeloc_section: "05-supervision"
//! codeloc_subsection: "tests"
//! codeloc_type: "source"
//! codeloc_scope: "test"
//! codeloc_description: "Heartbeat loop keep-alive and cancellation tests."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use codeloc_common::HeartbeatConfig;
use codeloc_metrics::{new_registry, LocationMetrics};
use codeloc_rpc::{ConnectionParams, RpcError};
use codeloc_supervision::spawn_heartbeat_loop;
use codeloc_testharness::{StubLocationServer, StubMethod};

fn fast_heartbeat() -> HeartbeatConfig {
    HeartbeatConfig {
        interval: Duration::from_millis(5),
        timeout: Duration::from_millis(200),
    }
}

async fn wait_for_calls(server: &StubLocationServer, method: StubMethod, count: usize) -> bool {
    for _ in 0..400 {
        if server.calls(method) >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[tokio::test]
async fn heartbeats_are_sent_until_stopped() {
    let server = Arc::new(StubLocationServer::new(ConnectionParams::tcp("localhost", 4300)));
    let metrics = LocationMetrics::new(new_registry()).unwrap();
    let handle = spawn_heartbeat_loop("beating", server.clone(), &fast_heartbeat(), Some(metrics.clone()));

    assert!(wait_for_calls(&server, StubMethod::Heartbeat, 3).await);
    assert_eq!(metrics.active_loops("beating"), 1);
    handle.stop().await;

    let sent = server.calls(StubMethod::Heartbeat);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(server.calls(StubMethod::Heartbeat), sent);
    assert!(metrics.heartbeats("beating", true) >= 3);
    assert_eq!(metrics.active_loops("beating"), 0);
}

#[tokio::test]
async fn failures_are_swallowed() {
    let server = Arc::new(StubLocationServer::new(ConnectionParams::tcp("localhost", 4301)));
    server.fail(
        StubMethod::Heartbeat,
        RpcError::Status {
            method: "Heartbeat",
            code: 13,
            message: "internal".into(),
        },
    );
    let metrics = LocationMetrics::new(new_registry()).unwrap();
    let handle = spawn_heartbeat_loop("flaky", server.clone(), &fast_heartbeat(), Some(metrics.clone()));

    assert!(wait_for_calls(&server, StubMethod::Heartbeat, 3).await);
    assert!(!handle.is_finished());
    server.clear_failure(StubMethod::Heartbeat);
    assert!(wait_for_calls(&server, StubMethod::Heartbeat, 5).await);
    handle.stop().await;

    assert!(metrics.heartbeats("flaky", false) >= 3);
    assert!(metrics.heartbeats("flaky", true) >= 1);
}

#[tokio::test]
async fn unanswered_heartbeats_time_out_and_the_loop_keeps_going() {
    let server = Arc::new(StubLocationServer::new(ConnectionParams::tcp("localhost", 4303)));
    server.stall(StubMethod::Heartbeat, None);
    let metrics = LocationMetrics::new(new_registry()).unwrap();
    let config = HeartbeatConfig {
        timeout: Duration::from_millis(20),
        ..fast_heartbeat()
    };
    let handle = spawn_heartbeat_loop("silent", server.clone(), &config, Some(metrics.clone()));

    assert!(wait_for_calls(&server, StubMethod::Heartbeat, 3).await);
    assert!(!handle.is_finished());
    assert!(metrics.heartbeats("silent", false) >= 2);
    assert_eq!(metrics.heartbeats("silent", true), 0);

    server.clear_stall(StubMethod::Heartbeat);
    let sent = server.calls(StubMethod::Heartbeat);
    assert!(wait_for_calls(&server, StubMethod::Heartbeat, sent + 2).await);
    handle.stop().await;
    assert!(metrics.heartbeats("silent", true) >= 1);
}

#[tokio::test]
async fn stop_interrupts_a_long_interval() {
    let server = Arc::new(StubLocationServer::new(ConnectionParams::tcp("localhost", 4302)));
    let config = HeartbeatConfig {
        interval: Duration::from_secs(3600),
        ..fast_heartbeat()
    };
    let handle = spawn_heartbeat_loop("idle", server.clone(), &config, None);
    assert!(wait_for_calls(&server, StubMethod::Heartbeat, 1).await);

    tokio::time::timeout(Duration::from_secs(1), handle.stop())
        .await
        .expect("heartbeat loop honours shutdown mid-interval");
    assert_eq!(server.calls(StubMethod::Heartbeat), 1);
}
