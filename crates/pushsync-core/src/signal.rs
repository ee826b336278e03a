//! Live per-topic subscription flags

use tokio::sync::watch;

use crate::prelude::*;

/// Live view of whether a topic is effectively subscribed
///
/// Cloning is cheap, all clones observe the same underlying value.
#[derive(Debug, Clone)]
pub struct TopicSignal {
	topic: TopicId,
	rx: watch::Receiver<bool>,
}

impl TopicSignal {
	pub(crate) fn new(topic: TopicId, rx: watch::Receiver<bool>) -> Self {
		Self { topic, rx }
	}

	pub fn topic(&self) -> &TopicId {
		&self.topic
	}

	/// Current effective value
	pub fn get(&self) -> bool {
		*self.rx.borrow()
	}

	/// Waits for the next change and returns the new value
	pub async fn changed(&mut self) -> ClResult<bool> {
		self.rx
			.changed()
			.await
			.map_err(|_| Error::Internal(format!("signal for topic {} closed", self.topic)))?;
		Ok(*self.rx.borrow_and_update())
	}

	/// Underlying receiver, for use in `select!` loops
	pub fn watch(&self) -> watch::Receiver<bool> {
		self.rx.clone()
	}
}

// vim: ts=4
