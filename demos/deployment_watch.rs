//! # Example: deployment_watch
//!
//! Two watch tasks on one session: a deployment that becomes ready after a few polls,
//! and a fine-tune job that fails.
//!
//! Demonstrates how to:
//! - Register [`WatchTask`]s with a custom interval.
//! - Answer attempts with `Repoll`, `Success` and `Error` outcomes.
//! - Attach actions to a notification and receive it through a channel.
//! - Observe runtime events through the built-in [`LogWriter`].
//!
//! ## Flow
//! ```text
//! register_notification(deployment) ──► attempt 1..N: Repoll ──► Success("Deployment ready")
//! register_notification(fine-tune)  ──► attempt 1: Repoll    ──► attempt 2: Error("Fine-tune failed")
//! notifications.recv() x2 ──► session.shutdown()
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=fetchvisor=debug cargo run --example deployment_watch --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use fetchvisor::{
    Config, LogWriter, Notice, NotificationAction, Session, Subscribe, WatchError, WatchFn, WatchOutcome,
    WatchTask,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Deployment that reports one more ready replica per poll.
fn deployment_task(replicas: u32) -> WatchTask {
    let ready = Arc::new(AtomicU32::new(0));
    let cb = WatchFn::arc(move |ctx: CancellationToken| {
        let ready = Arc::clone(&ready);
        async move {
            if ctx.is_cancelled() {
                return Err(WatchError::Canceled);
            }
            let now = ready.fetch_add(1, Ordering::SeqCst) + 1;
            println!("[deployment] {now}/{replicas} replicas ready");
            if now < replicas {
                return Ok(WatchOutcome::Repoll);
            }
            let notice = Notice::new("Deployment ready", format!("{replicas} replicas serving"))
                .with_action(NotificationAction::new("Open endpoint", || {
                    println!("[ui] opening endpoint");
                }));
            Ok(WatchOutcome::Success(notice))
        }
    });
    WatchTask::new(cb)
        .with_name("deployment")
        .with_interval(Duration::from_millis(300))
}

/// Fine-tune job whose second status check reports a failure.
fn fine_tune_task() -> WatchTask {
    let checks = Arc::new(AtomicU32::new(0));
    let cb = WatchFn::arc(move |_ctx: CancellationToken| {
        let checks = Arc::clone(&checks);
        async move {
            match checks.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(WatchOutcome::Repoll),
                _ => Ok(WatchOutcome::error("Fine-tune failed", "pod evicted: out of memory")),
            }
        }
    });
    WatchTask::new(cb)
        .with_name("fine-tune")
        .with_interval(Duration::from_millis(500))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fetchvisor=debug")))
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let (session, mut notifications) = Session::builder(Config::default())
        .with_subscribers(subs)
        .build_with_channel();

    let watcher = session.watcher();
    watcher.register_notification(deployment_task(3))?;
    watcher.register_notification(fine_tune_task())?;

    for _ in 0..2 {
        let Some(n) = notifications.recv().await else {
            break;
        };
        println!("[ui] {:?}: {} ({})", n.severity, n.title, n.message);
        for action in &n.actions {
            println!("[ui] action: {}", action.title);
            action.click();
        }
    }

    println!("[main] still watching: {:?}", watcher.list().await);
    session.shutdown().await?;
    Ok(())
}
