//! # Producer abstraction and function-backed implementation.
//!
//! A [`Producer`] is the zero-argument asynchronous function wrapped by a
//! [`FetchStateEngine`](crate::FetchStateEngine). Each invocation receives a fresh
//! [`CancellationToken`] which is cancelled when the invocation is superseded
//! (dependency change, manual refresh) or the engine is disposed.
//!
//! [`ProducerFn`] wraps a closure `F: Fn(CancellationToken) -> Fut`, producing a fresh
//! future per invocation. If shared state is needed, capture an `Arc<...>` explicitly.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use fetchvisor::{FetchError, ProducerFn, ProducerRef};
//!
//! let namespace: Option<String> = None;
//! let p: ProducerRef<Vec<String>> = ProducerFn::arc(move |_ctx: CancellationToken| {
//!     let namespace = namespace.clone();
//!     async move {
//!         let Some(ns) = namespace else {
//!             return Err(FetchError::not_ready("no namespace selected"));
//!         };
//!         Ok(vec![format!("{ns}/model-a")])
//!     }
//! });
//! # let _ = p;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

/// Boxed future returned by one producer invocation.
pub type BoxFetchFuture<T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'static>>;

/// Shared handle to a producer object.
pub type ProducerRef<T> = Arc<dyn Producer<T>>;

/// # Asynchronous producer of a value.
///
/// Return [`FetchError::NotReady`] while inputs are missing, [`FetchError::Fail`] for
/// real failures, and [`FetchError::Canceled`] when the token was observed cancelled.
pub trait Producer<T>: Send + Sync + 'static {
    /// Starts one invocation.
    fn produce(&self, ctx: CancellationToken) -> BoxFetchFuture<T>;
}

/// Function-backed producer implementation.
pub struct ProducerFn<F> {
    f: F,
}

impl<F> ProducerFn<F> {
    /// Creates a new function-backed producer.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the producer and returns it as a shared handle.
    pub fn arc<T, Fut>(f: F) -> Arc<Self>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        Arc::new(Self::new(f))
    }
}

impl<T, F, Fut> Producer<T> for ProducerFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    fn produce(&self, ctx: CancellationToken) -> BoxFetchFuture<T> {
        Box::pin((self.f)(ctx))
    }
}
