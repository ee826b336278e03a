//! Push subscription reconciliation
//!
//! Keeps the remote registry in agreement with the local preferences and the
//! platform's push subscription. All decisions are taken by one coordinator
//! task that consumes a single event queue fed by:
//!
//! - settings changes from the preference store
//! - push handle changes from the subscription source
//! - progress reports of the registry writer and the subscription requester
//!
//! Workers run in their own tasks bound to a cancellation token and tag every
//! report with a generation number. Reports from superseded generations are
//! dropped by the coordinator, so their statuses are never published.

use std::fmt;
use std::time::Duration;

mod controller;
mod worker;

pub use controller::{ReconciliationController, ReconciliationHandle};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_STATUS_CAPACITY: usize = 64;
/// Larger status capacities are clamped to this
pub const MAX_STATUS_CAPACITY: usize = 65_536;

/// State of the reconciliation state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	/// No usable server public key (yet, or for the lifetime of the process)
	Disabled,
	/// Notifications are wanted but the platform has no subscription
	AwaitingSubscription,
	/// A subscription exists and its registration is kept up to date
	Syncing,
	/// Nothing to do
	Idle,
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Phase::Disabled => "disabled",
			Phase::AwaitingSubscription => "awaiting-subscription",
			Phase::Syncing => "syncing",
			Phase::Idle => "idle",
		})
	}
}

/// Tuning of the reconciliation loop
#[derive(Debug, Clone)]
pub struct ReconcileOpts {
	/// Fixed delay between registry write attempts for the same pair
	pub retry_delay: Duration,
	/// Buffer size of the status broadcast channel, clamped to `1..=MAX_STATUS_CAPACITY`
	pub status_capacity: usize,
}

impl Default for ReconcileOpts {
	fn default() -> Self {
		Self { retry_delay: DEFAULT_RETRY_DELAY, status_capacity: DEFAULT_STATUS_CAPACITY }
	}
}

// vim: ts=4
