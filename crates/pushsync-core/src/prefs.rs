//! Preference store: the single source of truth for notification settings.
//!
//! Every mutation is persisted through the key-value adapter before the change
//! is published, so a reactor reading storage from a change notification sees
//! the new value. A failed write is returned to the caller but the in-memory
//! change stands.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use crate::prelude::*;
use crate::signal::TopicSignal;
use pushsync_types::kv_adapter::KvAdapter;

pub const DEFAULT_STORAGE_KEY: &str = "notification-settings";

pub struct PreferenceStore {
	storage: Arc<dyn KvAdapter>,
	key: Box<str>,
	settings: watch::Sender<NotificationSettings>,
	/// Per-topic signals, never evicted. The lock also serializes mutations.
	signals: Mutex<HashMap<TopicId, watch::Sender<bool>>>,
}

impl std::fmt::Debug for PreferenceStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PreferenceStore")
			.field("key", &self.key)
			.field("settings", &*self.settings.borrow())
			.finish_non_exhaustive()
	}
}

impl PreferenceStore {
	/// Loads the settings from storage, falling back to defaults
	pub fn load(storage: Arc<dyn KvAdapter>, key: impl Into<Box<str>>) -> Self {
		let key = key.into();
		let settings = match storage.get(&key) {
			Ok(Some(json)) => NotificationSettings::from_json(&json).unwrap_or_else(|e| {
				warn!(key = %key, error = %e, "Stored notification settings unreadable, using defaults");
				NotificationSettings::default()
			}),
			Ok(None) => NotificationSettings::default(),
			Err(e) => {
				warn!(key = %key, error = %e, "Failed to read notification settings, using defaults");
				NotificationSettings::default()
			}
		};
		debug!(key = %key, "Notification settings loaded: {:?}", settings);

		let (tx, _rx) = watch::channel(settings);
		Self { storage, key, settings: tx, signals: Mutex::new(HashMap::new()) }
	}

	/// Snapshot of the current settings
	pub fn get(&self) -> NotificationSettings {
		self.settings.borrow().clone()
	}

	/// Receiver yielding the current settings and every later change
	pub fn subscribe(&self) -> watch::Receiver<NotificationSettings> {
		self.settings.subscribe()
	}

	/// Sets a boolean preference
	///
	/// Returns `Ok(false)` if the value was already set. `Err(Error::Persistence)`
	/// means the change was applied in memory but could not be stored.
	pub fn set_flag(&self, flag: SettingsFlag, value: bool) -> ClResult<bool> {
		let signals = self.signals.lock();

		let mut next = self.get();
		if !next.set_flag(flag, value) {
			return Ok(false);
		}

		let persisted = self.persist(&next);
		self.settings.send_replace(next.clone());

		if flag == SettingsFlag::SubscribeToAll {
			for (topic, signal) in signals.iter() {
				update_signal(signal, next.has_subscription(topic));
			}
		}

		persisted.map(|()| true)
	}

	/// Live subscription flag of a topic, created on first use
	pub fn has_subscription(&self, topic: impl Into<TopicId>) -> TopicSignal {
		let topic = topic.into();
		let mut signals = self.signals.lock();

		let rx = match signals.get(&topic) {
			Some(signal) => signal.subscribe(),
			None => {
				let (tx, rx) = watch::channel(self.settings.borrow().has_subscription(&topic));
				signals.insert(topic.clone(), tx);
				rx
			}
		};
		TopicSignal::new(topic, rx)
	}

	/// Adds a per-topic subscription
	///
	/// Returns `Ok(false)` when `subscribe_to_all` is active or the topic is
	/// already subscribed.
	pub fn subscribe_to(&self, topic: impl Into<TopicId>) -> ClResult<bool> {
		self.update_topic(topic.into(), true)
	}

	/// Removes a per-topic subscription
	///
	/// Returns `Ok(false)` when `subscribe_to_all` is active or the topic is not
	/// subscribed.
	pub fn unsubscribe_from(&self, topic: impl Into<TopicId>) -> ClResult<bool> {
		self.update_topic(topic.into(), false)
	}

	/// Number of topics with a cached signal
	pub fn signal_count(&self) -> usize {
		self.signals.lock().len()
	}

	fn update_topic(&self, topic: TopicId, subscribed: bool) -> ClResult<bool> {
		let signals = self.signals.lock();

		let mut next = self.get();
		if next.subscribe_to_all {
			return Ok(false);
		}
		let changed = if subscribed {
			next.subscriptions.insert(topic.clone())
		} else {
			next.subscriptions.remove(&topic)
		};
		if !changed {
			return Ok(false);
		}

		let persisted = self.persist(&next);
		self.settings.send_replace(next);

		if let Some(signal) = signals.get(&topic) {
			update_signal(signal, subscribed);
		}
		debug!(topic = %topic, subscribed, "Topic subscription changed");

		persisted.map(|()| true)
	}

	fn persist(&self, settings: &NotificationSettings) -> ClResult<()> {
		let res = settings.to_json().and_then(|json| self.storage.set(&self.key, &json));
		res.map_err(|e| {
			warn!(key = %self.key, error = %e, "Failed to persist notification settings");
			Error::Persistence(e.to_string())
		})
	}
}

fn update_signal(signal: &watch::Sender<bool>, value: bool) {
	signal.send_if_modified(|current| {
		if *current == value {
			false
		} else {
			*current = value;
			true
		}
	});
}


// vim: ts=4
