//! Common identifiers and value types

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;

/// A named entity a user may subscribe to for notifications (a zone on the dashboard)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(pub Box<str>);

impl TopicId {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<&str> for TopicId {
	fn from(s: &str) -> Self {
		Self(s.into())
	}
}

impl From<String> for TopicId {
	fn from(s: String) -> Self {
		Self(s.into())
	}
}

impl fmt::Display for TopicId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Opaque identity of a native push subscription
///
/// Compared by value only. A different endpoint means a different subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(pub Box<str>);

impl Endpoint {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<&str> for Endpoint {
	fn from(s: &str) -> Self {
		Self(s.into())
	}
}

impl From<String> for Endpoint {
	fn from(s: String) -> Self {
		Self(s.into())
	}
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Subscription keys in the browser's PushSubscription format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
	/// P-256 public key (base64url encoded)
	pub p256dh: Box<str>,
	/// Auth secret (base64url encoded)
	pub auth: Box<str>,
}

/// A platform-issued push subscription handle
///
/// Everything except `endpoint` is an opaque credential that is only forwarded
/// to the remote registry.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushHandle {
	pub endpoint: Endpoint,
	/// Expiration time (Unix timestamp in ms, as reported by the platform)
	#[serde(rename = "expirationTime", default)]
	pub expiration_time: Option<i64>,
	#[serde(default)]
	pub keys: Option<PushKeys>,
}

impl PushHandle {
	pub fn new(endpoint: impl Into<Endpoint>) -> Self {
		Self { endpoint: endpoint.into(), expiration_time: None, keys: None }
	}

	pub fn with_keys(mut self, p256dh: impl Into<Box<str>>, auth: impl Into<Box<str>>) -> Self {
		self.keys = Some(PushKeys { p256dh: p256dh.into(), auth: auth.into() });
		self
	}
}

/// Synchronization status reported to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
	/// The platform refused to create a native subscription
	NonAccepted,
	/// A registry write for the current pair is in progress or being retried
	NotUpdated,
	/// The registry holds the current settings for the current endpoint
	Updated,
}

impl SyncStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			SyncStatus::NonAccepted => "non-accepted",
			SyncStatus::NotUpdated => "not-updated",
			SyncStatus::Updated => "updated",
		}
	}
}

impl fmt::Display for SyncStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_push_handle_browser_format() {
		let json = r#"{
			"endpoint": "https://push.example.com/abc",
			"expirationTime": null,
			"keys": { "p256dh": "BNc", "auth": "tBH" }
		}"#;
		let handle: PushHandle = serde_json::from_str(json).unwrap();

		assert_eq!(handle.endpoint.as_str(), "https://push.example.com/abc");
		assert_eq!(handle.expiration_time, None);
		assert_eq!(handle.keys.as_ref().map(|k| k.auth.as_ref()), Some("tBH"));
	}

	#[test]
	fn test_push_handle_skips_missing() {
		let json = serde_json::to_value(PushHandle::new("e1")).unwrap();
		assert_eq!(json, serde_json::json!({ "endpoint": "e1" }));
	}

	#[test]
	fn test_sync_status_names() {
		assert_eq!(serde_json::to_string(&SyncStatus::NonAccepted).unwrap(), "\"non-accepted\"");
		assert_eq!(serde_json::to_string(&SyncStatus::NotUpdated).unwrap(), "\"not-updated\"");
		assert_eq!(SyncStatus::Updated.to_string(), "updated");
	}
}

// vim: ts=4
