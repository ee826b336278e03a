//! Common test utilities and helpers
//!
//! Scriptable in-memory implementations of the subscription source and the
//! remote registry, plus small helpers for driving a paused tokio clock.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, watch};

use pushsync_core::prelude::*;
use pushsync_core::{Phase, PreferenceStore, ReconcileOpts, ReconciliationController, ReconciliationHandle};
use pushsync_types::kv_adapter::MemoryKvAdapter;
use pushsync_types::registry_adapter::RegistryAdapter;
use pushsync_types::subscription_adapter::SubscriptionSource;

pub const SERVER_KEY: &str = "BPublicServerKey";

// MockSource
//************
#[derive(Debug)]
pub struct MockSource {
	handle: watch::Sender<Option<PushHandle>>,
	requests: AtomicUsize,
	deny: AtomicBool,
	gate: Mutex<Option<Arc<Notify>>>,
}

impl MockSource {
	pub fn new(handle: Option<PushHandle>) -> Arc<Self> {
		let (tx, _rx) = watch::channel(handle);
		Arc::new(Self {
			handle: tx,
			requests: AtomicUsize::new(0),
			deny: AtomicBool::new(false),
			gate: Mutex::new(None),
		})
	}

	/// Simulates the platform replacing or dropping its subscription
	pub fn set_handle(&self, handle: Option<PushHandle>) {
		self.handle.send_replace(handle);
	}

	pub fn requests(&self) -> usize {
		self.requests.load(Ordering::SeqCst)
	}

	pub fn deny(&self, deny: bool) {
		self.deny.store(deny, Ordering::SeqCst);
	}

	/// Makes requests wait until the returned notifier is triggered
	pub fn hold_requests(&self) -> Arc<Notify> {
		let gate = Arc::new(Notify::new());
		*self.gate.lock() = Some(Arc::clone(&gate));
		gate
	}
}

#[async_trait]
impl SubscriptionSource for MockSource {
	fn watch_handle(&self) -> watch::Receiver<Option<PushHandle>> {
		self.handle.subscribe()
	}

	async fn request_subscription(&self, server_public_key: &str) -> ClResult<PushHandle> {
		assert_eq!(server_public_key, SERVER_KEY);
		let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;

		let gate = self.gate.lock().clone();
		if let Some(gate) = gate {
			gate.notified().await;
		}

		if self.deny.load(Ordering::SeqCst) {
			return Err(Error::SubscriptionRejected("permission denied".into()));
		}
		let handle = PushHandle::new(format!("https://push.example.com/granted-{}", n))
			.with_keys("p256dh", "auth");
		self.handle.send_replace(Some(handle.clone()));
		Ok(handle)
	}
}

// MockRegistry
//**************
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMode {
	Key,
	Empty,
	Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
	pub endpoint: Endpoint,
	pub settings: NotificationSettings,
	pub ok: bool,
}

#[derive(Debug)]
pub struct MockRegistry {
	key: KeyMode,
	fail_all: AtomicBool,
	failing: Mutex<Vec<NotificationSettings>>,
	blocked: Mutex<Vec<NotificationSettings>>,
	/// Completed register calls, in order
	calls: Mutex<Vec<Call>>,
	attempts: AtomicUsize,
}

impl MockRegistry {
	pub fn new(key: KeyMode) -> Arc<Self> {
		Arc::new(Self {
			key,
			fail_all: AtomicBool::new(false),
			failing: Mutex::new(Vec::new()),
			blocked: Mutex::new(Vec::new()),
			calls: Mutex::new(Vec::new()),
			attempts: AtomicUsize::new(0),
		})
	}

	pub fn fail_all(&self, fail: bool) {
		self.fail_all.store(fail, Ordering::SeqCst);
	}

	/// Every write of these settings fails
	pub fn fail_for(&self, settings: NotificationSettings) {
		self.failing.lock().push(settings);
	}

	/// Every write of these settings hangs until cancelled
	pub fn block_for(&self, settings: NotificationSettings) {
		self.blocked.lock().push(settings);
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().clone()
	}

	/// Register calls started, including ones that never completed
	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl RegistryAdapter for MockRegistry {
	async fn fetch_server_public_key(&self) -> ClResult<Box<str>> {
		match self.key {
			KeyMode::Key => Ok(SERVER_KEY.into()),
			KeyMode::Empty => Ok("".into()),
			KeyMode::Fail => Err(Error::Network("connection refused".into())),
		}
	}

	async fn register(&self, handle: &PushHandle, settings: &NotificationSettings) -> ClResult<()> {
		self.attempts.fetch_add(1, Ordering::SeqCst);

		let blocked = self.blocked.lock().contains(settings);
		if blocked {
			std::future::pending::<()>().await;
		}

		let ok = !self.fail_all.load(Ordering::SeqCst) && !self.failing.lock().contains(settings);
		self.calls.lock().push(Call {
			endpoint: handle.endpoint.clone(),
			settings: settings.clone(),
			ok,
		});

		if ok { Ok(()) } else { Err(Error::Registry("HTTP 503".into())) }
	}
}

// Fixture
//*********
pub struct Fixture {
	pub prefs: Arc<PreferenceStore>,
	pub source: Arc<MockSource>,
	pub registry: Arc<MockRegistry>,
}

impl Fixture {
	pub fn new(key: KeyMode, handle: Option<PushHandle>) -> Self {
		let prefs = Arc::new(PreferenceStore::load(
			Arc::new(MemoryKvAdapter::new()),
			"notification-settings",
		));
		Self { prefs, source: MockSource::new(handle), registry: MockRegistry::new(key) }
	}

	pub fn start(&self) -> ReconciliationHandle {
		ReconciliationController::new(
			Arc::clone(&self.prefs),
			self.source.clone(),
			self.registry.clone(),
			ReconcileOpts::default(),
		)
		.start()
	}
}

pub fn handle(endpoint: &str) -> PushHandle {
	PushHandle::new(endpoint).with_keys("p256dh", "auth")
}

/// Lets every runnable task make progress, advancing the paused clock by `ms`
pub async fn settle(ms: u64) {
	tokio::time::sleep(Duration::from_millis(ms)).await;
}

pub async fn wait_for_phase(handle: &ReconciliationHandle, phase: Phase) {
	let mut rx = handle.watch_phase();
	tokio::time::timeout(Duration::from_secs(30), rx.wait_for(|p| *p == phase))
		.await
		.unwrap_or_else(|_| panic!("timed out waiting for phase {}", phase))
		.expect("phase channel closed");
}

pub async fn wait_for_status(handle: &ReconciliationHandle, status: SyncStatus) {
	let mut rx = handle.watch_status();
	tokio::time::timeout(Duration::from_secs(30), rx.wait_for(|s| *s == Some(status)))
		.await
		.unwrap_or_else(|_| panic!("timed out waiting for status {}", status))
		.expect("status channel closed");
}

// vim: ts=4
