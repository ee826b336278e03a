//! Reconciliation coordinator and its public handle

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::worker::{self, Event, Generation, SyncProgress};
use super::{MAX_STATUS_CAPACITY, Phase, ReconcileOpts};
use crate::prefs::PreferenceStore;
use crate::prelude::*;
use pushsync_types::registry_adapter::RegistryAdapter;
use pushsync_types::subscription_adapter::SubscriptionSource;

/// Drives the remote registry towards the local preferences
#[derive(Debug)]
pub struct ReconciliationController {
	prefs: Arc<PreferenceStore>,
	source: Arc<dyn SubscriptionSource>,
	registry: Arc<dyn RegistryAdapter>,
	opts: ReconcileOpts,
}

impl ReconciliationController {
	pub fn new(
		prefs: Arc<PreferenceStore>,
		source: Arc<dyn SubscriptionSource>,
		registry: Arc<dyn RegistryAdapter>,
		opts: ReconcileOpts,
	) -> Self {
		Self { prefs, source, registry, opts }
	}

	/// Spawns the coordinator on the current tokio runtime
	///
	/// The server public key is fetched once. If that fails or the key is empty
	/// the controller stays `Disabled` and never touches the registry or the
	/// subscription source again.
	pub fn start(self) -> ReconciliationHandle {
		let shutdown = CancellationToken::new();
		let (status_tx, _) =
			broadcast::channel(self.opts.status_capacity.clamp(1, MAX_STATUS_CAPACITY));
		let (status_watch, status_rx) = watch::channel(None);
		let (phase_tx, phase_rx) = watch::channel(Phase::Disabled);

		let publisher = Publisher { stream: status_tx.clone(), status: status_watch, phase: phase_tx };
		let task = tokio::spawn(run(self, publisher, shutdown.clone()));

		ReconciliationHandle {
			status_tx,
			status: status_rx,
			phase: phase_rx,
			shutdown: shutdown.clone(),
			task,
			_guard: shutdown.drop_guard(),
		}
	}
}

/// Handle to a running controller. Dropping it stops the controller.
#[derive(Debug)]
pub struct ReconciliationHandle {
	status_tx: broadcast::Sender<SyncStatus>,
	status: watch::Receiver<Option<SyncStatus>>,
	phase: watch::Receiver<Phase>,
	shutdown: CancellationToken,
	task: JoinHandle<()>,
	_guard: DropGuard,
}

impl ReconciliationHandle {
	/// Every status published from now on
	pub fn status_stream(&self) -> broadcast::Receiver<SyncStatus> {
		self.status_tx.subscribe()
	}

	/// Last status of the pair being synced
	///
	/// `None` before the first attempt and whenever no pair is being synced,
	/// e.g. after the subscription was lost.
	pub fn status(&self) -> Option<SyncStatus> {
		*self.status.borrow()
	}

	pub fn watch_status(&self) -> watch::Receiver<Option<SyncStatus>> {
		self.status.clone()
	}

	pub fn phase(&self) -> Phase {
		*self.phase.borrow()
	}

	pub fn watch_phase(&self) -> watch::Receiver<Phase> {
		self.phase.clone()
	}

	/// False once the coordinator has stopped (shutdown, or disabled at startup)
	pub fn is_running(&self) -> bool {
		!self.task.is_finished()
	}

	/// Stops the coordinator and every in-flight attempt, waiting for the coordinator to exit
	pub async fn shutdown(self) {
		self.shutdown.cancel();
		if let Err(e) = self.task.await {
			error!(error = %e, "Reconciliation task failed");
		}
	}
}

/// Publishes status and phase changes to observers
#[derive(Debug)]
struct Publisher {
	stream: broadcast::Sender<SyncStatus>,
	status: watch::Sender<Option<SyncStatus>>,
	phase: watch::Sender<Phase>,
}

impl Publisher {
	fn status(&self, status: SyncStatus) {
		self.status.send_replace(Some(status));
		// no subscribers is fine
		let _ignore = self.stream.send(status);
	}

	/// Forgets the status of a pair that is no longer being synced
	fn clear_status(&self) {
		self.status.send_if_modified(|current| current.take().is_some());
	}

	fn phase(&self, phase: Phase) {
		self.phase.send_if_modified(|current| {
			if *current == phase {
				return false;
			}
			debug!(from = %current, to = %phase, "Reconciliation phase changed");
			*current = phase;
			true
		});
	}
}

async fn run(ctl: ReconciliationController, publisher: Publisher, shutdown: CancellationToken) {
	let res = tokio::select! {
		biased;
		() = shutdown.cancelled() => return,
		res = ctl.registry.fetch_server_public_key() => res,
	};
	let res = res.and_then(|key| if key.is_empty() { Err(Error::KeyUnavailable) } else { Ok(key) });
	let server_key = match res {
		Ok(key) => key,
		Err(e) => {
			warn!(error = %e, "No server public key, notification sync disabled");
			return;
		}
	};
	info!("Server public key received, starting notification sync");

	let (events_tx, events_rx) = flume::unbounded();
	let mut settings_rx = ctl.prefs.subscribe();
	let mut handle_rx = ctl.source.watch_handle();
	let settings = settings_rx.borrow_and_update().clone();
	let handle = handle_rx.borrow_and_update().clone();
	spawn_forwarder(settings_rx, events_tx.clone(), shutdown.child_token(), Event::Settings);
	spawn_forwarder(handle_rx, events_tx.clone(), shutdown.child_token(), Event::Handle);

	let mut coordinator = Coordinator {
		registry: ctl.registry,
		source: ctl.source,
		retry_delay: ctl.opts.retry_delay,
		server_key,
		settings,
		handle,
		sync: None,
		request: RequestState::Idle,
		last_generation: 0,
		events: events_tx,
		shutdown: shutdown.clone(),
		publisher,
	};
	coordinator.reconcile();

	loop {
		let event = tokio::select! {
			biased;
			() = shutdown.cancelled() => break,
			event = events_rx.recv_async() => event,
		};
		match event {
			Ok(event) => coordinator.handle_event(event),
			Err(_) => break,
		}
	}

	coordinator.cancel_sync();
	coordinator.cancel_request();
	debug!("Notification sync stopped");
}

/// Feeds every later value of a watch channel into the event queue
fn spawn_forwarder<T, F>(
	mut rx: watch::Receiver<T>,
	events: flume::Sender<Event>,
	token: CancellationToken,
	wrap: F,
) where
	T: Clone + Send + Sync + 'static,
	F: Fn(T) -> Event + Send + 'static,
{
	tokio::spawn(async move {
		loop {
			tokio::select! {
				biased;
				() = token.cancelled() => break,
				res = rx.changed() => {
					if res.is_err() {
						break;
					}
				}
			}
			let value = rx.borrow_and_update().clone();
			if events.send(wrap(value)).is_err() {
				break;
			}
		}
	});
}

/// Registry write in progress (or completed) for one pair
#[derive(Debug)]
struct SyncJob {
	endpoint: Endpoint,
	settings: NotificationSettings,
	generation: Generation,
	token: CancellationToken,
}

#[derive(Debug)]
enum RequestState {
	Idle,
	Pending { generation: Generation, token: CancellationToken },
	/// The platform accepted, the handle has not arrived yet
	Granted,
}

struct Coordinator {
	registry: Arc<dyn RegistryAdapter>,
	source: Arc<dyn SubscriptionSource>,
	retry_delay: Duration,
	server_key: Box<str>,
	settings: NotificationSettings,
	handle: Option<PushHandle>,
	sync: Option<SyncJob>,
	request: RequestState,
	last_generation: Generation,
	events: flume::Sender<Event>,
	shutdown: CancellationToken,
	publisher: Publisher,
}

impl Coordinator {
	fn handle_event(&mut self, event: Event) {
		match event {
			Event::Settings(settings) => {
				self.settings = settings;
				self.reconcile();
			}
			Event::Handle(handle) => {
				if matches!(self.request, RequestState::Granted) {
					self.request = RequestState::Idle;
				}
				match &handle {
					Some(h) => debug!(endpoint = %h.endpoint, "Push subscription present"),
					None => debug!("Push subscription absent"),
				}
				self.handle = handle;
				self.reconcile();
			}
			Event::Sync { generation, progress } => self.on_sync_progress(generation, progress),
			Event::Request { generation, result } => self.on_request_result(generation, result),
		}
	}

	fn reconcile(&mut self) {
		if let Some(handle) = self.handle.clone() {
			// an existing subscription is always kept in sync, required or not
			self.cancel_request();
			self.ensure_sync(handle);
			self.publisher.phase(Phase::Syncing);
		} else if self.settings.subscription_required() {
			self.cancel_sync();
			self.publisher.phase(Phase::AwaitingSubscription);
			if matches!(self.request, RequestState::Idle) {
				self.start_request();
			}
		} else {
			self.cancel_sync();
			self.cancel_request();
			self.publisher.phase(Phase::Idle);
		}
	}

	fn next_generation(&mut self) -> Generation {
		self.last_generation += 1;
		self.last_generation
	}

	fn ensure_sync(&mut self, handle: PushHandle) {
		if let Some(job) = &self.sync {
			if job.endpoint == handle.endpoint && job.settings == self.settings {
				return;
			}
			debug!(endpoint = %job.endpoint, generation = job.generation, "Registration superseded");
		}
		self.cancel_sync();

		let generation = self.next_generation();
		let token = self.shutdown.child_token();
		tokio::spawn(worker::sync_registration(
			Arc::clone(&self.registry),
			handle.clone(),
			self.settings.clone(),
			self.retry_delay,
			generation,
			token.clone(),
			self.events.clone(),
		));
		self.sync = Some(SyncJob {
			endpoint: handle.endpoint,
			settings: self.settings.clone(),
			generation,
			token,
		});
	}

	fn cancel_sync(&mut self) {
		if let Some(job) = self.sync.take() {
			job.token.cancel();
			self.publisher.clear_status();
		}
	}

	fn start_request(&mut self) {
		let generation = self.next_generation();
		let token = self.shutdown.child_token();
		info!("Requesting push subscription");
		tokio::spawn(worker::request_subscription(
			Arc::clone(&self.source),
			self.server_key.clone(),
			generation,
			token.clone(),
			self.events.clone(),
		));
		self.request = RequestState::Pending { generation, token };
	}

	fn cancel_request(&mut self) {
		if let RequestState::Pending { token, .. } =
			std::mem::replace(&mut self.request, RequestState::Idle)
		{
			token.cancel();
		}
	}

	fn on_sync_progress(&mut self, generation: Generation, progress: SyncProgress) {
		let Some(job) = self.sync.as_ref().filter(|job| job.generation == generation) else {
			debug!(generation, "Dropping progress of superseded registration");
			return;
		};

		match progress {
			SyncProgress::Started { attempt } => {
				debug!(endpoint = %job.endpoint, attempt, "Registering push subscription");
				self.publisher.status(SyncStatus::NotUpdated);
			}
			SyncProgress::Succeeded { attempt } => {
				info!(endpoint = %job.endpoint, attempt, "Push subscription registered");
				self.publisher.status(SyncStatus::Updated);
			}
			SyncProgress::Failed { attempt, error } => {
				warn!(
					endpoint = %job.endpoint,
					attempt,
					error = %error,
					"Registration failed, retrying in {:?}",
					self.retry_delay
				);
			}
		}
	}

	fn on_request_result(&mut self, generation: Generation, result: ClResult<()>) {
		match &self.request {
			RequestState::Pending { generation: current, .. } if *current == generation => {}
			_ => {
				debug!(generation, "Dropping result of cancelled subscription request");
				return;
			}
		}

		match result {
			Ok(()) => {
				debug!("Subscription request accepted, waiting for the push handle");
				self.request = RequestState::Granted;
			}
			Err(e) => {
				warn!(error = %e, "Push subscription request failed");
				self.request = RequestState::Idle;
				self.publisher.status(SyncStatus::NonAccepted);
			}
		}
	}
}

// vim: ts=4
