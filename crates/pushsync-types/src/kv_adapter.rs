//! Key-value storage used to persist the settings blob across restarts.
//!
//! Storage is a best-effort cache: callers keep their in-memory state even when
//! a write fails. Both methods are synchronous so that a mutation is persisted
//! before anyone is notified about it.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;

use crate::prelude::*;

pub trait KvAdapter: Debug + Send + Sync {
	/// Reads a value, `None` if the key was never written
	fn get(&self, key: &str) -> ClResult<Option<String>>;

	/// Stores a value, replacing any previous one
	fn set(&self, key: &str, value: &str) -> ClResult<()>;
}

/// Storage that remembers nothing, for headless and server contexts
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKvAdapter;

impl KvAdapter for NullKvAdapter {
	fn get(&self, _key: &str) -> ClResult<Option<String>> {
		Ok(None)
	}

	fn set(&self, _key: &str, _value: &str) -> ClResult<()> {
		Ok(())
	}
}

/// Process-local storage
#[derive(Debug, Default)]
pub struct MemoryKvAdapter {
	values: RwLock<HashMap<Box<str>, String>>,
}

impl MemoryKvAdapter {
	pub fn new() -> Self {
		Self::default()
	}
}

impl KvAdapter for MemoryKvAdapter {
	fn get(&self, key: &str) -> ClResult<Option<String>> {
		Ok(self.values.read().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> ClResult<()> {
		self.values.write().insert(key.into(), value.to_string());
		Ok(())
	}
}


// vim: ts=4
