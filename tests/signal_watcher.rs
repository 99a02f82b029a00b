//! Termination requests driving the coordinator.

use std::sync::Arc;
use std::time::Duration;

use graceful_drain::lifecycle::{termination_channel, ShutdownState, Termination};
use graceful_drain::{ShutdownCoordinator, ShutdownError, SignalWatcher};

mod common;

use common::{test_policy, RecordingLogger, StubModule};

#[tokio::test(start_paused = true)]
async fn termination_runs_shutdown_once() {
    let logger = RecordingLogger::new();
    let server = StubModule::success();
    let module = StubModule::success();
    let coordinator = Arc::new(
        ShutdownCoordinator::new(test_policy(), server.clone())
            .with_module("cache", module.clone())
            .with_logger(logger.clone()),
    );

    let (trigger, signal) = termination_channel();
    let mut complete = SignalWatcher::new(Arc::clone(&coordinator)).watch(signal);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!complete.is_complete());
    assert!(!server.was_invoked());

    trigger.send(Termination::Terminate).unwrap();
    complete.wait().await;

    assert!(complete.is_complete());
    assert!(module.was_invoked());
    assert!(server.was_invoked());
    assert_eq!(coordinator.state(), ShutdownState::Done);
    assert_eq!(logger.infos()[0], "signal type: SIGTERM");
    assert!(matches!(
        coordinator.shutdown().await,
        Err(ShutdownError::AlreadyInvoked)
    ));
}

#[tokio::test(start_paused = true)]
async fn dropped_trigger_still_shuts_down() {
    let server = StubModule::success();
    let coordinator = Arc::new(ShutdownCoordinator::new(test_policy(), server.clone()));

    let (trigger, signal) = termination_channel();
    let mut complete = SignalWatcher::new(coordinator).watch(signal);
    drop(trigger);

    complete.wait().await;
    assert!(server.was_invoked());
}

#[tokio::test(start_paused = true)]
async fn failed_shutdown_still_completes() {
    let coordinator = Arc::new(ShutdownCoordinator::new(
        test_policy(),
        StubModule::failing("server stuck"),
    ));

    let (trigger, signal) = termination_channel();
    let mut complete = SignalWatcher::new(Arc::clone(&coordinator)).watch(signal);
    trigger.send(Termination::Interrupt).unwrap();

    complete.wait().await;
    assert!(complete.is_complete());
    assert_eq!(coordinator.state(), ShutdownState::Done);
}
