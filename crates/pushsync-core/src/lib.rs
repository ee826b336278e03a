//! Notification preferences and push subscription reconciliation.
//!
//! - [`prefs::PreferenceStore`] owns the user's notification settings and
//!   persists every change through a [`pushsync_types::kv_adapter::KvAdapter`].
//! - [`reconcile::ReconciliationController`] keeps the remote registry in
//!   agreement with those settings whenever the platform holds a push
//!   subscription, and asks for one when notifications are wanted.
//! - [`app::EngineBuilder`] wires both together.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod app;
pub mod prefs;
pub mod prelude;
pub mod reconcile;
pub mod signal;

pub use app::{Engine, EngineBuilder, EngineOpts};
pub use prefs::PreferenceStore;
pub use reconcile::{Phase, ReconcileOpts, ReconciliationController, ReconciliationHandle};
pub use signal::TopicSignal;

// vim: ts=4
