//! S3/S4/S6: sweep-driven finalization, exercised with a paused clock so
//! the 10s/5s sweep periods don't make the test suite slow.

use chrono::Utc;
use ocpp_csms::domain::transaction::FinalizeReason;
use ocpp_csms::support::shutdown::ShutdownSignal;
use ocpp_csms::AppState;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn s3_heartbeat_timeout_finalizes_active_transaction() {
    let state = AppState::new(None, None);
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let stale = Utc::now() - chrono::Duration::seconds(120);
    state.stations.register("CP03", tx, stale);
    state.transactions.open("1".into(), "CP03".into(), 1, stale);

    let shutdown = ShutdownSignal::new();
    ocpp_csms::liveness::spawn_sweeps(state.clone(), shutdown.clone());

    tokio::time::advance(Duration::from_secs(11)).await;
    tokio::task::yield_now().await;

    assert!(!state.stations.lookup("CP03").unwrap().is_online());
    assert_eq!(state.transactions.active_count(), 0);
    let completed = state.transactions.snapshot_completed();
    assert_eq!(completed[0].reason, FinalizeReason::HeartbeatTimeout);

    shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn s4_ghost_zero_power_finalizes_then_stop_is_idempotent() {
    let state = AppState::new(None, None);
    let start = Utc::now() - chrono::Duration::seconds(40);
    state.transactions.open("1".into(), "CP05".into(), 1, start);

    let shutdown = ShutdownSignal::new();
    ocpp_csms::liveness::spawn_sweeps(state.clone(), shutdown.clone());

    tokio::time::advance(Duration::from_secs(6)).await;
    tokio::task::yield_now().await;

    assert_eq!(state.transactions.active_count(), 0);
    assert_eq!(state.transactions.snapshot_completed()[0].reason, FinalizeReason::GhostZeroPower);

    // A subsequent StopTransaction on the same id is a no-op, not an error.
    let second = state.transactions.finalize("1", FinalizeReason::Stop, Utc::now(), None);
    assert!(second.is_none());
    assert_eq!(state.transactions.snapshot_completed().len(), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn s6_idempotent_finalization_under_concurrent_race() {
    let state = AppState::new(None, None);
    state.transactions.open("1".into(), "CP06".into(), 1, Utc::now());

    let a = {
        let state = state.clone();
        tokio::spawn(async move { state.transactions.finalize("1", FinalizeReason::Stop, Utc::now(), None) })
    };
    let b = {
        let state = state.clone();
        tokio::spawn(async move {
            state
                .transactions
                .finalize("1", FinalizeReason::GhostZeroPower, Utc::now(), None)
        })
    };

    let (a, b) = tokio::join!(a, b);
    let winners = [a.unwrap(), b.unwrap()].into_iter().filter(Option::is_some).count();

    assert_eq!(winners, 1);
    assert_eq!(state.transactions.snapshot_completed().len(), 1);
    assert_eq!(state.transactions.active_count(), 0);
}
