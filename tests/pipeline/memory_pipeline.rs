use std::sync::Arc;
use std::time::Duration;

use crate::support::helpers::{
    append_events, init_tracing, seeded_log, wait_for_rows, RecordingProjection,
};
use anyhow::{anyhow, Result};
use cursorproj::{Cursor, RunContext, Worker, WorkerConfig, WorkerError};
use tokio::time::timeout;

#[tokio::test]
async fn projects_whole_log_in_capped_batches() -> Result<()> {
    init_tracing();
    let log = seeded_log(5);
    let projection = RecordingProjection::new();
    let config = WorkerConfig::builder().batch_size(2).max_batches(3).build();
    let worker = Worker::new(log.clone(), projection.apply_fn(), config);

    worker.run(&RunContext::new()).await?;

    assert_eq!(projection.rows().len(), 5);
    assert_eq!(projection.apply_calls(), 3);
    assert_eq!(projection.checkpoint(), Some(Cursor::from("5")));
    assert_eq!(log.committed(), Some(Cursor::from("5")));
    assert_eq!(log.commit_count(), 3);
    Ok(())
}

#[tokio::test]
async fn restart_from_checkpoint_after_apply_failure() -> Result<()> {
    init_tracing();
    let log = seeded_log(6);
    let projection = RecordingProjection::new();
    projection.fail_on_call(2);
    let config = WorkerConfig::builder().batch_size(2).max_batches(3).build();
    let worker = Worker::new(log.clone(), projection.apply_fn(), config);

    let err = worker
        .run(&RunContext::new())
        .await
        .expect_err("second batch should fail");
    assert!(matches!(err, WorkerError::Apply(_)));
    assert!(
        err.to_string().contains("projection write rejected on call 2"),
        "apply error should pass through, got {err}"
    );
    assert_eq!(projection.checkpoint(), Some(Cursor::from("2")));
    assert_eq!(log.committed(), Some(Cursor::from("2")));

    let resume = projection.checkpoint().unwrap_or_default();
    let remaining = WorkerConfig::builder()
        .batch_size(2)
        .max_batches(2)
        .start(resume)
        .build();
    let restarted = Worker::new(log.clone(), projection.apply_fn(), remaining);
    restarted.run(&RunContext::new()).await?;

    assert_eq!(projection.rows().len(), 6);
    assert_eq!(projection.checkpoint(), Some(Cursor::from("6")));
    assert_eq!(projection.delivered(), 6, "no batch re-applied after a clean checkpoint");
    Ok(())
}

#[tokio::test]
async fn commit_failure_redelivers_batch_idempotently() -> Result<()> {
    init_tracing();
    let log = seeded_log(3);
    log.fail_next_commit(anyhow!("consumer group offset write failed"));
    let projection = RecordingProjection::new();
    let config = WorkerConfig::builder().batch_size(3).max_batches(1).build();
    let worker = Worker::new(log.clone(), projection.apply_fn(), config);

    let err = worker
        .run(&RunContext::new())
        .await
        .expect_err("commit should fail");
    assert!(matches!(err, WorkerError::Commit(_)));
    assert_eq!(projection.apply_calls(), 1);
    assert_eq!(log.committed(), None);

    // Restarting from the source's committed position replays the batch.
    worker.run(&RunContext::new()).await?;

    assert_eq!(projection.apply_calls(), 2);
    assert_eq!(projection.delivered(), 6);
    assert_eq!(projection.rows().len(), 3, "re-delivery must not duplicate rows");
    assert_eq!(log.committed(), Some(Cursor::from("3")));
    Ok(())
}

#[tokio::test]
async fn fetch_failure_is_surfaced_verbatim() -> Result<()> {
    init_tracing();
    let log = seeded_log(2);
    log.fail_next_fetch(anyhow!("event store unreachable"));
    let projection = RecordingProjection::new();
    let worker = Worker::with_defaults(log.clone(), projection.apply_fn());

    let err = worker
        .run(&RunContext::new())
        .await
        .expect_err("fetch should fail");
    let source = err.into_source().expect("fetch error carries its source");
    assert_eq!(source.to_string(), "event store unreachable");
    assert_eq!(projection.apply_calls(), 0);
    assert_eq!(log.commit_count(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tails_new_events_until_cancelled() -> Result<()> {
    init_tracing();
    let log = seeded_log(2);
    let projection = RecordingProjection::new();
    let config = WorkerConfig::builder()
        .idle_sleep(Duration::from_millis(20))
        .build();
    let worker = Arc::new(Worker::new(log.clone(), projection.apply_fn(), config));

    let ctx = RunContext::new();
    let handle = {
        let worker = worker.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { worker.run(&ctx).await })
    };

    wait_for_rows(&projection, 2, Duration::from_secs(5)).await?;
    append_events(&log, 2, 3);
    wait_for_rows(&projection, 5, Duration::from_secs(5)).await?;

    ctx.cancel();
    let outcome = timeout(Duration::from_secs(2), handle).await??;
    assert!(matches!(outcome, Err(WorkerError::Cancelled)));
    assert_eq!(projection.checkpoint(), Some(Cursor::from("5")));
    assert!(worker.telemetry().snapshot().idle_polls >= 1);
    Ok(())
}

#[tokio::test]
async fn deadline_is_distinguished_from_cancellation() -> Result<()> {
    init_tracing();
    let log = seeded_log(1);
    let projection = RecordingProjection::new();
    let config = WorkerConfig::builder()
        .idle_sleep(Duration::from_millis(10))
        .build();
    let worker = Worker::new(log, projection.apply_fn(), config);

    let ctx = RunContext::new().with_timeout(Duration::from_millis(100));
    let err = timeout(Duration::from_secs(2), worker.run(&ctx))
        .await?
        .expect_err("deadline should stop the run");
    assert!(matches!(err, WorkerError::DeadlineExceeded));
    assert_eq!(projection.rows().len(), 1);
    Ok(())
}
