//! Cancellable background work started by the coordinator

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::prelude::*;
use pushsync_types::registry_adapter::RegistryAdapter;
use pushsync_types::subscription_adapter::SubscriptionSource;

pub(super) type Generation = u64;

/// Everything the coordinator reacts to
#[derive(Debug)]
pub(super) enum Event {
	Settings(NotificationSettings),
	Handle(Option<PushHandle>),
	Sync { generation: Generation, progress: SyncProgress },
	Request { generation: Generation, result: ClResult<()> },
}

#[derive(Debug)]
pub(super) enum SyncProgress {
	Started { attempt: u32 },
	Succeeded { attempt: u32 },
	Failed { attempt: u32, error: String },
}

/// Writes one (endpoint, settings) pair to the registry until it succeeds
///
/// Both the registry call and the retry delay are abandoned as soon as the
/// token is cancelled.
pub(super) async fn sync_registration(
	registry: Arc<dyn RegistryAdapter>,
	handle: PushHandle,
	settings: NotificationSettings,
	retry_delay: Duration,
	generation: Generation,
	token: CancellationToken,
	events: flume::Sender<Event>,
) {
	let mut attempt: u32 = 0;
	loop {
		attempt = attempt.saturating_add(1);
		let progress = SyncProgress::Started { attempt };
		if events.send(Event::Sync { generation, progress }).is_err() {
			return;
		}

		let res = tokio::select! {
			biased;
			() = token.cancelled() => return,
			res = registry.register(&handle, &settings) => res,
		};

		let progress = match res {
			Ok(()) => {
				let _ignore =
					events.send(Event::Sync { generation, progress: SyncProgress::Succeeded { attempt } });
				return;
			}
			Err(e) => SyncProgress::Failed { attempt, error: e.to_string() },
		};
		if events.send(Event::Sync { generation, progress }).is_err() {
			return;
		}

		tokio::select! {
			biased;
			() = token.cancelled() => return,
			() = tokio::time::sleep(retry_delay) => {}
		}
	}
}

/// Asks the platform for a subscription once
pub(super) async fn request_subscription(
	source: Arc<dyn SubscriptionSource>,
	server_key: Box<str>,
	generation: Generation,
	token: CancellationToken,
	events: flume::Sender<Event>,
) {
	let res = tokio::select! {
		biased;
		() = token.cancelled() => return,
		res = source.request_subscription(&server_key) => res,
	};

	let result = res.map(|handle| {
		debug!(endpoint = %handle.endpoint, "Platform granted push subscription");
	});
	let _ignore = events.send(Event::Request { generation, result });
}

// vim: ts=4
