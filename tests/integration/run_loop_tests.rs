use super::*;
use stock_watcher::plugins::reporters::ChannelReporter;
use stock_watcher::scheduler::LoopState;
use stock_watcher::{RunLoop, StockStatus};

const ITEM_URL: &str = "https://shop.example.com/item/1";

fn run_loop_with(
    checker: ScriptedChecker,
    cancel: CancellationToken,
    cancel_after: usize,
) -> (RunLoop, Arc<RecordingSleeper>, UnboundedReceiver<MonitorEvent>) {
    let (reporter, receiver) = ChannelReporter::channel();
    let sleeper = RecordingSleeper::new(cancel_after, cancel.clone());
    let run_loop = RunLoop::new(
        test_monitor_config(ITEM_URL, Strategy::Http),
        Box::new(checker),
        Arc::new(reporter),
        cancel,
    )
    .with_sleeper(sleeper.clone());
    (run_loop, sleeper, receiver)
}

#[tokio::test]
async fn test_rate_limit_backs_off_then_resumes() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let checker = ScriptedChecker::new(vec![
        Ok(product_page("https://schema.org/InStock")),
        Err(CheckError::RateLimited { retry_after: None }),
        Ok(product_page("https://schema.org/OutOfStock")),
    ]);
    let shutdowns = checker.shutdowns.clone();
    let fetches = checker.fetches.clone();

    let (run_loop, sleeper, mut receiver) = run_loop_with(checker, cancel, 3);
    assert_eq!(run_loop.state(), LoopState::Idle);
    let stats = run_loop.run().await;

    assert_eq!(
        drain_events(&mut receiver),
        vec![
            MonitorEvent::Checking,
            MonitorEvent::InStock,
            MonitorEvent::Checking,
            MonitorEvent::RateLimited,
            MonitorEvent::Checking,
            MonitorEvent::OutOfStock,
            MonitorEvent::ShuttingDown,
        ]
    );
    assert_eq!(sleeper.sleeps(), vec![POLL_INTERVAL, COOLDOWN, POLL_INTERVAL]);
    assert_eq!(fetches.load(Ordering::SeqCst), 3);
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

    assert_eq!(stats.state, LoopState::Stopped);
    assert_eq!(stats.run_count, 3);
    assert_eq!(stats.success_count, 2);
    assert_eq!(stats.rate_limited_count, 1);
    assert_eq!(stats.last_status, Some(StockStatus::OutOfStock));

    Ok(())
}

#[tokio::test]
async fn test_faults_do_not_stop_the_loop() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let checker = ScriptedChecker::new(vec![
        Err(CheckError::Network("connection refused".to_string())),
        Err(CheckError::Timeout("30s".to_string())),
        Err(CheckError::UnexpectedStatus(503)),
        Ok("<html><body>no structured data</body></html>".to_string()),
        Ok(product_page("https://schema.org/InStock")),
    ]);

    let (run_loop, sleeper, mut receiver) = run_loop_with(checker, cancel, 5);
    let stats = run_loop.run().await;

    let outcomes: Vec<MonitorEvent> = drain_events(&mut receiver)
        .into_iter()
        .filter(|event| *event != MonitorEvent::Checking)
        .collect();
    assert_eq!(
        outcomes,
        vec![
            MonitorEvent::NetworkError("connection refused".to_string()),
            MonitorEvent::Timeout,
            MonitorEvent::UnexpectedStatus(503),
            MonitorEvent::Unknown,
            MonitorEvent::InStock,
            MonitorEvent::ShuttingDown,
        ]
    );

    // Errors wait the normal interval, never the cooldown
    assert!(sleeper.sleeps().iter().all(|sleep| *sleep == POLL_INTERVAL));
    assert_eq!(stats.error_count, 3);
    assert_eq!(stats.success_count, 2);
    assert!(stats.last_error.is_none());

    Ok(())
}

#[tokio::test]
async fn test_each_cycle_is_checking_then_one_outcome() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let checker = ScriptedChecker::new(vec![
        Ok(product_page("InStock")),
        Err(CheckError::CheckFailed("boom".to_string())),
        Ok(product_page("OutOfStock")),
        Err(CheckError::RateLimited { retry_after: Some(Duration::from_secs(5)) }),
    ]);

    let (run_loop, _sleeper, mut receiver) = run_loop_with(checker, cancel, 4);
    run_loop.run().await;

    let events = drain_events(&mut receiver);
    let (cycles, tail) = events.split_at(events.len() - 1);
    assert_eq!(tail, [MonitorEvent::ShuttingDown]);
    assert_eq!(cycles.len(), 8);
    for pair in cycles.chunks(2) {
        assert_eq!(pair[0], MonitorEvent::Checking);
        assert_ne!(pair[1], MonitorEvent::Checking);
    }

    Ok(())
}

#[tokio::test]
async fn test_no_overlapping_cycles() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let steps = (0..10).map(|_| Ok(product_page("OutOfStock"))).collect();
    let checker = ScriptedChecker::new(steps);
    let max_in_flight = checker.max_in_flight.clone();
    let fetches = checker.fetches.clone();

    let (run_loop, _sleeper, _receiver) = run_loop_with(checker, cancel, 10);
    run_loop.run().await;

    assert_eq!(fetches.load(Ordering::SeqCst), 10);
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_cancel_before_start_skips_polling() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let checker = ScriptedChecker::new(vec![Ok(product_page("InStock"))]);
    let fetches = checker.fetches.clone();
    let shutdowns = checker.shutdowns.clone();

    let (run_loop, sleeper, mut receiver) = run_loop_with(checker, cancel, usize::MAX);
    let stats = run_loop.run().await;

    assert_eq!(drain_events(&mut receiver), vec![MonitorEvent::ShuttingDown]);
    assert_eq!(fetches.load(Ordering::SeqCst), 0);
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    assert!(sleeper.sleeps().is_empty());
    assert_eq!(stats.run_count, 0);

    Ok(())
}

#[tokio::test]
async fn test_cancel_during_fetch_finishes_cycle_then_stops() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let checker = ScriptedChecker::new(vec![
        Ok(product_page("InStock")),
        Ok(product_page("InStock")),
    ])
    .cancelling_during_fetch(cancel.clone());
    let fetches = checker.fetches.clone();
    let shutdowns = checker.shutdowns.clone();

    let (run_loop, sleeper, mut receiver) = run_loop_with(checker, cancel, usize::MAX);
    run_loop.run().await;

    // The in-flight cycle is reported, no pause is taken and nothing new is polled
    assert_eq!(
        drain_events(&mut receiver),
        vec![
            MonitorEvent::Checking,
            MonitorEvent::InStock,
            MonitorEvent::ShuttingDown,
        ]
    );
    assert!(sleeper.sleeps().is_empty());
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_retry_after_honored_when_enabled() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let checker = ScriptedChecker::new(vec![Err(CheckError::RateLimited {
        retry_after: Some(Duration::from_secs(7)),
    })]);

    let (reporter, _receiver) = ChannelReporter::channel();
    let sleeper = RecordingSleeper::new(1, cancel.clone());
    let config = test_monitor_config(ITEM_URL, Strategy::Http).with_respect_retry_after(true);

    RunLoop::new(config, Box::new(checker), Arc::new(reporter), cancel)
        .with_sleeper(sleeper.clone())
        .run()
        .await;

    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(7)]);

    Ok(())
}

#[tokio::test]
async fn test_loops_share_only_the_token() -> anyhow::Result<()> {
    let parent = CancellationToken::new();
    let mut handles = Vec::new();
    let mut receivers = Vec::new();

    for availability in ["InStock", "OutOfStock"] {
        let token = parent.child_token();
        let checker = ScriptedChecker::new(vec![Ok(product_page(availability))]);
        let (reporter, receiver) = ChannelReporter::channel();
        // The sleeper blocks forever on the first pause without cancelling the parent
        let sleeper = RecordingSleeper::new(1, CancellationToken::new());

        let run_loop = RunLoop::new(
            test_monitor_config(ITEM_URL, Strategy::Http),
            Box::new(checker),
            Arc::new(reporter),
            token,
        )
        .with_sleeper(sleeper);

        handles.push(tokio::spawn(run_loop.run()));
        receivers.push(receiver);
    }

    // Both loops reach their first pause before shutdown is requested
    for receiver in receivers.iter_mut() {
        assert_eq!(receiver.recv().await, Some(MonitorEvent::Checking));
        receiver.recv().await;
    }
    parent.cancel();

    for handle in handles {
        let stats = handle.await?;
        assert_eq!(stats.run_count, 1);
        assert_eq!(stats.state, LoopState::Stopped);
    }
    assert_eq!(drain_events(&mut receivers[0]), vec![MonitorEvent::ShuttingDown]);

    Ok(())
}
