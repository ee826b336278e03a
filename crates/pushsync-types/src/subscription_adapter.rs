//! Platform push subscription source.
//!
//! The platform holds at most one push subscription at a time. The engine only
//! observes it and asks for a new one when notifications are wanted but none
//! exists.

use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::watch;

use crate::prelude::*;

#[async_trait]
pub trait SubscriptionSource: Debug + Send + Sync {
	/// Current handle (or its absence) and every later change
	fn watch_handle(&self) -> watch::Receiver<Option<PushHandle>>;

	/// Asks the platform to create a subscription bound to the server public key
	///
	/// On success the new handle must also be published through `watch_handle`,
	/// the engine does not use the returned value for its state.
	async fn request_subscription(&self, server_public_key: &str) -> ClResult<PushHandle>;
}

// vim: ts=4
