//! Fetch engines: polled asynchronous values guarded against stale results.
//!
//! - [`deps`]: dependency identity ([`Deps`], [`DepKey`]);
//! - [`producer`]: the wrapped asynchronous function ([`Producer`], [`ProducerFn`]);
//! - [`cell`]: single-slot result holder with the generation guard;
//! - [`state`]: what consumers see ([`FetchState`], [`FetchRefresh`]);
//! - [`engine`]: the owner handle ([`FetchStateEngine`]);
//! - `driver`: the per-engine invocation loop (internal).

pub mod cell;
pub mod deps;
mod driver;
pub mod engine;
pub mod producer;
pub mod state;

pub use cell::{Applied, AsyncResultCell, Snapshot};
pub use deps::{DepKey, Deps};
pub use engine::{FetchBuilder, FetchOptions, FetchStateEngine};
pub use producer::{BoxFetchFuture, Producer, ProducerFn, ProducerRef};
pub use state::{FetchRefresh, FetchState};
