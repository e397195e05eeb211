//! # Example: polling_fetch
//!
//! A fetch engine listing the models of the selected namespace.
//!
//! Demonstrates how to:
//! - Report missing inputs with [`FetchError::NotReady`] instead of an error.
//! - Re-render with [`FetchStateEngine::observe`] when the namespace changes.
//! - Poll on an interval and refresh on demand.
//!
//! ## Flow
//! ```text
//! build(deps = [None])          ──► NotReady (loaded = false, error = None)
//! observe(deps = ["team-a"])    ──► generation bump ──► ["team-a/granite", ...]
//! poll every 1s                 ──► revision grows
//! refresh().await               ──► out-of-band value
//! dispose()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example polling_fetch
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use fetchvisor::{Deps, FetchError, FetchStateEngine, ProducerFn, ProducerRef};
use tokio_util::sync::CancellationToken;

/// Producer closing over the currently selected namespace.
fn list_models(namespace: Option<String>, revision: Arc<AtomicU32>) -> ProducerRef<Vec<String>> {
    ProducerFn::arc(move |_ctx: CancellationToken| {
        let namespace = namespace.clone();
        let revision = Arc::clone(&revision);
        async move {
            let Some(ns) = namespace else {
                return Err(FetchError::not_ready("no namespace selected"));
            };
            tokio::time::sleep(Duration::from_millis(100)).await;
            let rev = revision.fetch_add(1, Ordering::SeqCst);
            Ok(vec![format!("{ns}/granite@{rev}"), format!("{ns}/llama@{rev}")])
        }
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let revision = Arc::new(AtomicU32::new(0));
    let mut namespace: Option<String> = None;

    let engine = FetchStateEngine::builder(list_models(namespace.clone(), Arc::clone(&revision)), Vec::new())
        .deps(Deps::new().with(namespace.clone()))
        .poll_interval(Duration::from_secs(1))
        .name("models")
        .build();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let (data, loaded, error, _refresh) = engine.state().into_tuple();
    println!("[ui] before selection: data={data:?} loaded={loaded} error={error:?}");

    namespace = Some("team-a".to_string());
    let state = engine.observe(Deps::new().with(namespace.clone()), || {
        list_models(namespace.clone(), Arc::clone(&revision))
    });
    println!("[ui] namespace selected, loaded={}", state.loaded);

    for _ in 0..3 {
        let Some(state) = engine.changed().await else {
            break;
        };
        println!("[ui] data={:?} loaded={} error={:?}", state.data, state.loaded, state.error);
    }

    let fresh = state.refresh.refresh().await;
    println!("[ui] manual refresh: {fresh:?}");

    engine.dispose();
    Ok(())
}
