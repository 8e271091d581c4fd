//! Lifecycle hooks: how a session tells scan alerts about the statements it ran.
//!
//! A [`LifecycleSource`] keeps a per-kind table of [`StatementHook`]s and fires a
//! [`StatementEvent`] after each statement of a watched kind. The event carries an
//! owned [`StatementSnapshot`] and a weak handle to the session's
//! [`ExplainExecutor`], which is all a scan needs.
//!
//! [`ObservedClient`] is the built-in source for `tokio-postgres` style clients.

mod observed;
mod registry;
mod types;

#[cfg(test)]
mod tests;

pub use observed::ObservedClient;
pub use registry::HookRegistry;
pub use types::{
    ExplainExecutor, LifecycleSource, StatementEvent, StatementHook, StatementSnapshot,
    Subscription,
};
