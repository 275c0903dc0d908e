//! Polling-path integration tests: round-robin fairness, retry budget,
//! liveness, staleness, detail focus, failure isolation, and lifecycle.

mod common;

use common::{build, setup, test_config, wait_until, PATIENCE};
use valvelink_model::{DeviceStatus, REG_SAMPLE_VALUE, REG_STATUS};
use valvesrv::core::modbus::BusOperation;
use valvesrv::core::transport::{BusRecord, MockBusTransport};
use valvesrv::SchedulerPhase;

fn reads_to(history: &[BusRecord], id: u8) -> Vec<&BusRecord> {
    history
        .iter()
        .filter(|r| r.addr == id && matches!(r.op, BusOperation::ReadRegisters { .. }))
        .collect()
}

#[tokio::test]
async fn poll_updates_cache_and_status() {
    let (manager, transport, handle) = build(test_config(), &[1]);
    handle.set_register(1, REG_STATUS, 1);
    handle.set_register(1, 2, 0x05);
    manager
        .connect_with_transport(Box::new(transport))
        .await
        .unwrap();

    wait_until(PATIENCE, || {
        manager.snapshot(1).is_some_and(|s| s.success_count >= 1)
    })
    .await;
    manager.disconnect().await;

    let snapshot = manager.snapshot(1).unwrap();
    assert_eq!(snapshot.status, DeviceStatus::Open);
    assert_eq!(snapshot.cache.get(&2), Some(&0x05));
    assert!(snapshot.online);
    assert!(snapshot.last_update.is_some());
}

#[tokio::test]
async fn read_retry_budget_is_exactly_two_attempts() {
    let (manager, handle) = setup(&[1]).await;
    handle.fail_reads(1, 1);

    wait_until(PATIENCE, || {
        manager.snapshot(1).is_some_and(|s| s.success_count >= 1)
    })
    .await;
    manager.disconnect().await;

    // First cycle: attempt one swallowed, attempt two answered
    let history = handle.history();
    let reads = reads_to(&history, 1);
    assert!(!reads[0].replied);
    assert!(reads[1].replied);

    // In-cycle recovery leaves no trace on liveness
    let snapshot = manager.snapshot(1).unwrap();
    assert!(snapshot.online);
    assert_eq!(snapshot.consecutive_errors, 0);
}

#[tokio::test]
async fn consecutive_failed_reads_mark_offline_until_next_success() {
    let (manager, handle) = setup(&[5]).await;

    wait_until(PATIENCE, || {
        manager.snapshot(5).is_some_and(|s| s.success_count >= 1)
    })
    .await;

    // Device goes dark: cycles exhaust their two attempts and liveness flips
    handle.set_silent(5, true);
    wait_until(PATIENCE, || {
        manager
            .snapshot(5)
            .is_some_and(|s| !s.online && s.consecutive_errors >= 3)
    })
    .await;

    // Power back: the very next successful exchange restores liveness
    handle.set_silent(5, false);
    wait_until(PATIENCE, || {
        manager
            .snapshot(5)
            .is_some_and(|s| s.online && s.consecutive_errors == 0)
    })
    .await;
    manager.disconnect().await;
}

#[tokio::test]
async fn corrupt_replies_consume_the_retry_budget_too() {
    let (manager, handle) = setup(&[1]).await;

    wait_until(PATIENCE, || {
        manager.snapshot(1).is_some_and(|s| s.success_count >= 1)
    })
    .await;

    // Two corrupted replies exhaust one cycle at the framing layer
    handle.corrupt_replies(1, 2);
    wait_until(PATIENCE, || {
        manager
            .snapshot(1)
            .is_some_and(|s| s.consecutive_errors >= 1 || s.success_count >= 3)
    })
    .await;

    // The device heals on the following cycle
    wait_until(PATIENCE, || {
        manager
            .snapshot(1)
            .is_some_and(|s| s.online && s.consecutive_errors == 0)
    })
    .await;
    manager.disconnect().await;
}

#[tokio::test]
async fn round_robin_is_fair_without_command_traffic() {
    let (manager, handle) = setup(&[3, 7, 11]).await;

    wait_until(PATIENCE, || handle.history().len() >= 25).await;
    manager.disconnect().await;

    let history = handle.history();
    let counts: Vec<usize> = [3u8, 7, 11]
        .iter()
        .map(|id| reads_to(&history, *id).len())
        .collect();
    let max = *counts.iter().max().unwrap();
    let min = *counts.iter().min().unwrap();
    // floor(N/M) or ceil(N/M) polls each
    assert!(max - min <= 1, "unfair counts: {counts:?}");

    // And the order cycles through the registry order
    let order: Vec<u8> = history.iter().take(6).map(|r| r.addr).collect();
    assert_eq!(order, vec![3, 7, 11, 3, 7, 11]);
}

#[tokio::test]
async fn detail_focus_widens_the_read_window() {
    let (manager, handle) = setup(&[1]).await;
    handle.set_register(1, REG_SAMPLE_VALUE, 888);

    manager.set_detail_focus(Some(1));
    wait_until(PATIENCE, || {
        manager
            .snapshot(1)
            .is_some_and(|s| s.cache.get(&REG_SAMPLE_VALUE) == Some(&888))
    })
    .await;

    let history = handle.history();
    let wide = history
        .iter()
        .rev()
        .find(|r| matches!(r.op, BusOperation::ReadRegisters { count: 9, .. }));
    assert!(wide.is_some(), "no 9-register read observed");

    // Dropping the hint narrows the poll back to the status words. Let a
    // couple of passes absorb the change before sampling fresh traffic.
    manager.set_detail_focus(None);
    let seen = handle.history().len();
    wait_until(PATIENCE, || handle.history().len() >= seen + 2).await;
    handle.clear_history();
    wait_until(PATIENCE, || !handle.history().is_empty()).await;
    manager.disconnect().await;

    assert!(handle
        .history()
        .iter()
        .all(|r| matches!(r.op, BusOperation::ReadRegisters { count: 3, .. })));
}

#[tokio::test]
async fn staleness_is_derived_while_active_and_cleared_by_success() {
    let mut config = test_config();
    config.scheduler.stale_after_ms = 120;
    let (manager, transport, handle) = build(config, &[1]);
    manager
        .connect_with_transport(Box::new(transport))
        .await
        .unwrap();

    wait_until(PATIENCE, || {
        manager.snapshot(1).is_some_and(|s| s.success_count >= 1 && !s.stale)
    })
    .await;

    // No successful exchange for longer than the window: stale flips on
    handle.set_silent(1, true);
    wait_until(PATIENCE, || manager.snapshot(1).is_some_and(|s| s.stale)).await;

    // The next success clears it immediately
    handle.set_silent(1, false);
    wait_until(PATIENCE, || manager.snapshot(1).is_some_and(|s| !s.stale)).await;

    // Staleness only applies while the scheduler runs
    handle.set_silent(1, true);
    wait_until(PATIENCE, || manager.snapshot(1).is_some_and(|s| s.stale)).await;
    manager.disconnect().await;
    assert!(!manager.snapshot(1).unwrap().stale);
}

#[tokio::test]
async fn one_dark_device_never_stalls_the_others() {
    let (manager, handle) = setup(&[1, 2]).await;
    handle.set_silent(2, true);

    wait_until(PATIENCE, || manager.snapshot(2).is_some_and(|s| !s.online)).await;

    // Device 1 keeps making progress while device 2 burns its retry budget
    let before = manager.snapshot(1).unwrap().success_count;
    wait_until(PATIENCE, || {
        manager
            .snapshot(1)
            .is_some_and(|s| s.success_count >= before + 3)
    })
    .await;
    manager.disconnect().await;

    assert!(manager.snapshot(1).unwrap().online);
    assert!(!manager.snapshot(2).unwrap().online);
}

#[tokio::test]
async fn lifecycle_phases_and_reconnect() {
    let (manager, handle) = setup(&[1]).await;
    assert!(manager.is_connected());

    // A second connect is rejected while the scheduler runs
    let (other, _other_handle) = MockBusTransport::new();
    assert!(manager
        .connect_with_transport(Box::new(other))
        .await
        .is_err());

    manager.disconnect().await;
    assert!(!manager.is_connected());
    assert_eq!(manager.phase(), SchedulerPhase::Stopped);

    // Stopped is re-entrant: a fresh transport brings the loop back
    let (transport, handle2) = MockBusTransport::new();
    handle2.add_slave(1);
    drop(handle);
    manager
        .connect_with_transport(Box::new(transport))
        .await
        .unwrap();
    assert!(manager.is_connected());

    wait_until(PATIENCE, || !handle2.history().is_empty()).await;
    manager.disconnect().await;
}
