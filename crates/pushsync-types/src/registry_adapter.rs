//! Remote registry that stores which settings belong to which push subscription.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::prelude::*;

#[async_trait]
pub trait RegistryAdapter: Debug + Send + Sync {
	/// Returns the server (VAPID) public key. An empty key means push is unavailable.
	async fn fetch_server_public_key(&self) -> ClResult<Box<str>>;

	/// Stores `settings` for the subscription identified by `handle.endpoint`
	async fn register(&self, handle: &PushHandle, settings: &NotificationSettings) -> ClResult<()>;
}

// vim: ts=4
