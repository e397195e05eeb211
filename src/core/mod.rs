//! Runtime core: attempt execution and session lifecycle.
//!
//! The public API from this module is [`Session`] and its [`SessionBuilder`].
//!
//! Internal modules:
//! - [`runner`]: executes one guarded attempt (cancellation race, panic isolation);
//! - [`session`]: owns config, bus, subscriber delivery and the notification watcher;
//! - [`builder`]: assembles a session.

mod builder;
pub(crate) mod runner;
mod session;

pub use builder::SessionBuilder;
pub use session::Session;
