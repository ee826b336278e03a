//! Notification settings value type
//!
//! `NotificationSettings` is plain value data. The authoritative instance lives
//! inside the preference store; every other holder works on a copy, so changing
//! a copy never affects what gets persisted or synchronized.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ClResult;
use crate::types::TopicId;

/// Boolean preferences that can be toggled through the preference store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsFlag {
	NotifyOnWarning,
	NotifyNonGraceful,
	SubscribeToAll,
}

/// User notification preferences
///
/// Missing fields deserialize to `false` / empty, unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
	pub notify_on_warning: bool,
	pub notify_non_graceful: bool,
	pub subscribe_to_all: bool,
	/// Explicit per-topic opt-ins, ignored while `subscribe_to_all` is set
	pub subscriptions: BTreeSet<TopicId>,
}

impl NotificationSettings {
	pub fn flag(&self, flag: SettingsFlag) -> bool {
		match flag {
			SettingsFlag::NotifyOnWarning => self.notify_on_warning,
			SettingsFlag::NotifyNonGraceful => self.notify_non_graceful,
			SettingsFlag::SubscribeToAll => self.subscribe_to_all,
		}
	}

	/// Sets a flag, returning whether the value changed
	pub fn set_flag(&mut self, flag: SettingsFlag, value: bool) -> bool {
		let slot = match flag {
			SettingsFlag::NotifyOnWarning => &mut self.notify_on_warning,
			SettingsFlag::NotifyNonGraceful => &mut self.notify_non_graceful,
			SettingsFlag::SubscribeToAll => &mut self.subscribe_to_all,
		};
		if *slot == value {
			return false;
		}
		*slot = value;
		true
	}

	/// Effective subscription state of a topic
	pub fn has_subscription(&self, topic: &TopicId) -> bool {
		self.subscribe_to_all || self.subscriptions.contains(topic)
	}

	/// Whether any notification would be delivered, i.e. a native subscription is needed
	pub fn subscription_required(&self) -> bool {
		self.subscribe_to_all || !self.subscriptions.is_empty()
	}

	pub fn to_json(&self) -> ClResult<String> {
		Ok(serde_json::to_string(self)?)
	}

	pub fn from_json(json: &str) -> ClResult<Self> {
		Ok(serde_json::from_str(json)?)
	}
}


// vim: ts=4
