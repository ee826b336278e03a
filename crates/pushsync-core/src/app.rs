//! Engine builder - wires the preference store and the reconciliation controller

use std::sync::Arc;
use std::time::Duration;

use crate::prefs::{DEFAULT_STORAGE_KEY, PreferenceStore};
use crate::prelude::*;
use crate::reconcile::{
	DEFAULT_RETRY_DELAY, DEFAULT_STATUS_CAPACITY, MAX_STATUS_CAPACITY, ReconcileOpts,
	ReconciliationController, ReconciliationHandle,
};
use pushsync_types::kv_adapter::{KvAdapter, NullKvAdapter};
use pushsync_types::registry_adapter::RegistryAdapter;
use pushsync_types::subscription_adapter::SubscriptionSource;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Installs a `tracing` subscriber configured from `RUST_LOG`
///
/// Meant for binaries embedding the engine. Does nothing if a global
/// subscriber is already set.
pub fn init_tracing() {
	let _ignore = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.try_init();
}

#[derive(Debug, Clone)]
pub struct EngineOpts {
	/// Storage key of the settings blob
	pub storage_key: Box<str>,
	/// Delay between registry write retries
	pub retry_delay: Duration,
	/// Buffer size of the status stream
	pub status_capacity: usize,
}

impl Default for EngineOpts {
	fn default() -> Self {
		Self {
			storage_key: DEFAULT_STORAGE_KEY.into(),
			retry_delay: DEFAULT_RETRY_DELAY,
			status_capacity: DEFAULT_STATUS_CAPACITY,
		}
	}
}

impl EngineOpts {
	/// Defaults overridden by `PUSHSYNC_STORAGE_KEY`, `PUSHSYNC_RETRY_DELAY_MS`
	/// and `PUSHSYNC_STATUS_CAPACITY`
	pub fn from_env() -> ClResult<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ClResult<Self> {
		let mut opts = Self::default();

		if let Some(key) = lookup("PUSHSYNC_STORAGE_KEY") {
			if key.is_empty() {
				return Err(Error::ValidationError("PUSHSYNC_STORAGE_KEY is empty".into()));
			}
			opts.storage_key = key.into();
		}
		if let Some(ms) = lookup("PUSHSYNC_RETRY_DELAY_MS") {
			let ms = ms.parse::<u64>().map_err(|e| {
				Error::ValidationError(format!("invalid PUSHSYNC_RETRY_DELAY_MS: {}", e))
			})?;
			opts.retry_delay = Duration::from_millis(ms);
		}
		if let Some(capacity) = lookup("PUSHSYNC_STATUS_CAPACITY") {
			let capacity = capacity.parse::<usize>().map_err(|e| {
				Error::ValidationError(format!("invalid PUSHSYNC_STATUS_CAPACITY: {}", e))
			})?;
			if capacity == 0 || capacity > MAX_STATUS_CAPACITY {
				return Err(Error::ValidationError(format!(
					"PUSHSYNC_STATUS_CAPACITY must be between 1 and {}",
					MAX_STATUS_CAPACITY
				)));
			}
			opts.status_capacity = capacity;
		}

		Ok(opts)
	}
}

pub struct EngineBuilder {
	opts: EngineOpts,
	kv_adapter: Option<Arc<dyn KvAdapter>>,
	subscription_source: Option<Arc<dyn SubscriptionSource>>,
	registry_adapter: Option<Arc<dyn RegistryAdapter>>,
}

impl EngineBuilder {
	pub fn new() -> Self {
		Self::with_opts(EngineOpts::default())
	}

	pub fn with_opts(opts: EngineOpts) -> Self {
		EngineBuilder { opts, kv_adapter: None, subscription_source: None, registry_adapter: None }
	}

	// Opts
	pub fn storage_key(&mut self, storage_key: impl Into<Box<str>>) -> &mut Self {
		self.opts.storage_key = storage_key.into();
		self
	}
	pub fn retry_delay(&mut self, retry_delay: Duration) -> &mut Self {
		self.opts.retry_delay = retry_delay;
		self
	}
	/// Clamped to `1..=MAX_STATUS_CAPACITY`
	pub fn status_capacity(&mut self, status_capacity: usize) -> &mut Self {
		self.opts.status_capacity = status_capacity.clamp(1, MAX_STATUS_CAPACITY);
		self
	}

	// Adapters
	pub fn kv_adapter(&mut self, kv_adapter: Arc<dyn KvAdapter>) -> &mut Self {
		self.kv_adapter = Some(kv_adapter);
		self
	}
	pub fn subscription_source(&mut self, source: Arc<dyn SubscriptionSource>) -> &mut Self {
		self.subscription_source = Some(source);
		self
	}
	pub fn registry_adapter(&mut self, registry_adapter: Arc<dyn RegistryAdapter>) -> &mut Self {
		self.registry_adapter = Some(registry_adapter);
		self
	}

	/// Loads the settings and starts reconciliation on the current tokio runtime
	///
	/// Without a key-value adapter the settings live only in memory.
	pub fn start(&self) -> ClResult<Engine> {
		let Some(source) = self.subscription_source.clone() else {
			return Err(Error::Internal("No subscription source configured".to_string()));
		};
		let Some(registry) = self.registry_adapter.clone() else {
			return Err(Error::Internal("No registry adapter configured".to_string()));
		};
		let kv_adapter = self.kv_adapter.clone().unwrap_or_else(|| {
			info!("No storage configured, notification settings will not survive restarts");
			Arc::new(NullKvAdapter)
		});

		info!("pushsync V{}", VERSION);
		let prefs = Arc::new(PreferenceStore::load(kv_adapter, self.opts.storage_key.clone()));
		let reconcile_opts = ReconcileOpts {
			retry_delay: self.opts.retry_delay,
			status_capacity: self.opts.status_capacity,
		};
		let reconciliation =
			ReconciliationController::new(Arc::clone(&prefs), source, registry, reconcile_opts)
				.start();

		Ok(Engine { prefs, reconciliation })
	}
}

impl Default for EngineBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// A running engine
#[derive(Debug)]
pub struct Engine {
	prefs: Arc<PreferenceStore>,
	reconciliation: ReconciliationHandle,
}

impl Engine {
	pub fn prefs(&self) -> &Arc<PreferenceStore> {
		&self.prefs
	}

	pub fn reconciliation(&self) -> &ReconciliationHandle {
		&self.reconciliation
	}

	pub async fn shutdown(self) {
		self.reconciliation.shutdown().await;
	}
}


// vim: ts=4
