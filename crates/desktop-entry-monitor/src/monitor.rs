use crate::{
	backend::{NotifyBackend, RawNotification, WatchBackend},
	coalescer::{ChangeCoalescer, TreeChanged},
	config::MonitorConfig,
	error::Error,
	watch_set::PathWatchSet,
};

use std::{fmt, path::PathBuf, pin::pin};

use async_channel as chan;
use tokio::{runtime::Handle, select, sync::oneshot, task::JoinHandle, time::sleep};
use tracing::{debug, info, instrument, trace, warn, Instrument};

type BackendFactory<B> =
	Box<dyn Fn(chan::Sender<RawNotification>) -> Result<B, Error> + Send + Sync>;

enum Request {
	WatchedPaths(oneshot::Sender<Vec<PathBuf>>),
}

enum State {
	Unstarted,
	Monitoring {
		requests_tx: chan::Sender<Request>,
		_handle: JoinHandle<()>,
	},
}

/// Watches a fixed set of root directory trees and emits a [`TreeChanged`] whenever they settle
/// after a change.
///
/// All the watching state lives in a single tokio task spawned by [`start`](Self::start): backend
/// notifications and the debounce timer are both handled there, so nothing is shared or locked.
/// Dropping the monitor stops that task, which releases every subscription, and closes the
/// [`TreeChanged`] channel.
pub struct DirectoryMonitor<B: WatchBackend = NotifyBackend> {
	roots: Vec<PathBuf>,
	config: MonitorConfig,
	backend_factory: BackendFactory<B>,
	changed_tx: chan::Sender<TreeChanged>,
	state: State,
}

impl DirectoryMonitor<NotifyBackend> {
	/// Monitor backed by the platform's recommended `notify` watcher.
	pub fn new(
		roots: impl IntoIterator<Item = impl Into<PathBuf>>,
		config: MonitorConfig,
	) -> (Self, chan::Receiver<TreeChanged>) {
		Self::with_backend(roots, config, |raw_tx| {
			NotifyBackend::new(raw_tx).map_err(Into::into)
		})
	}
}

impl<B: WatchBackend> DirectoryMonitor<B> {
	/// Monitor backed by whatever `backend_factory` builds. The factory receives the channel its
	/// backend must deliver notifications to, and is called once per [`start`](Self::start).
	///
	/// The returned receiver holds at most one pending [`TreeChanged`]: if the consumer hasn't
	/// picked up the previous one yet, new changes are folded into it.
	pub fn with_backend(
		roots: impl IntoIterator<Item = impl Into<PathBuf>>,
		config: MonitorConfig,
		backend_factory: impl Fn(chan::Sender<RawNotification>) -> Result<B, Error>
			+ Send
			+ Sync
			+ 'static,
	) -> (Self, chan::Receiver<TreeChanged>) {
		let (changed_tx, changed_rx) = chan::bounded(1);

		(
			Self {
				roots: roots.into_iter().map(Into::into).collect(),
				config,
				backend_factory: Box::new(backend_factory),
				changed_tx,
				state: State::Unstarted,
			},
			changed_rx,
		)
	}

	/// Subscribes the root trees and starts monitoring them on the current tokio runtime.
	///
	/// The initial scan runs before this returns, so every directory existing under the roots at
	/// this point is watched. Starting twice, or outside of a tokio runtime, is rejected without
	/// touching any subscription.
	#[instrument(skip(self), fields(roots = self.roots.len()))]
	pub fn start(&mut self) -> Result<(), Error> {
		if matches!(self.state, State::Monitoring { .. }) {
			return Err(Error::AlreadyMonitoring);
		}

		let runtime = Handle::try_current()?;

		let (raw_tx, raw_rx) = chan::unbounded();

		let mut watch_set = PathWatchSet::new((self.backend_factory)(raw_tx)?);
		watch_set.initialize(self.roots.iter().cloned());

		let (requests_tx, requests_rx) = chan::bounded(8);

		let handle = runtime.spawn(
			run_monitor(
				watch_set,
				ChangeCoalescer::new(self.config.debounce()),
				raw_rx,
				requests_rx,
				self.changed_tx.clone(),
			)
			.in_current_span(),
		);

		self.state = State::Monitoring {
			requests_tx,
			_handle: handle,
		};

		info!("Directory monitor started");

		Ok(())
	}

	#[must_use]
	pub const fn is_monitoring(&self) -> bool {
		matches!(self.state, State::Monitoring { .. })
	}

	/// Snapshot of every path currently subscribed, sorted.
	pub async fn watched_paths(&self) -> Result<Vec<PathBuf>, Error> {
		let State::Monitoring { requests_tx, .. } = &self.state else {
			return Err(Error::NotMonitoring);
		};

		let (tx, rx) = oneshot::channel();

		requests_tx
			.send(Request::WatchedPaths(tx))
			.await
			.map_err(|_| Error::ActorGone)?;

		rx.await.map_err(|_| Error::ActorGone)
	}
}

impl<B: WatchBackend> fmt::Debug for DirectoryMonitor<B> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DirectoryMonitor")
			.field("roots", &self.roots)
			.field("config", &self.config)
			.field("monitoring", &self.is_monitoring())
			.finish_non_exhaustive()
	}
}

async fn run_monitor<B: WatchBackend>(
	mut watch_set: PathWatchSet<B>,
	mut coalescer: ChangeCoalescer,
	raw_rx: chan::Receiver<RawNotification>,
	requests_rx: chan::Receiver<Request>,
	changed_tx: chan::Sender<TreeChanged>,
) {
	let mut debounce = pin!(sleep(coalescer.window()));

	loop {
		select! {
			biased;

			() = &mut debounce, if coalescer.is_pending() => {
				if let Some(changed) = coalescer.fire() {
					emit(&changed_tx, changed);
				}
			}

			notification = raw_rx.recv() => {
				let Ok(notification) = notification else {
					debug!("Watch backend is gone, stopping directory monitor");
					break;
				};

				let relevant = match notification {
					RawNotification::Changed(path) => {
						trace!(path = %path.display(), "Directory changed;");
						watch_set.handle_notification(&path)
					}
					RawNotification::Rescan => {
						warn!("Watch backend lost events, rescanning every directory");
						watch_set.rescan();
						true
					}
				};

				if relevant {
					debounce.as_mut().reset(coalescer.notify());
				}
			}

			request = requests_rx.recv() => match request {
				Ok(Request::WatchedPaths(tx)) => {
					if tx.send(watch_set.watched_paths()).is_err() {
						trace!("Watched paths requester went away;");
					}
				}
				Err(_) => {
					debug!("Directory monitor dropped, stopping");
					break;
				}
			},
		}
	}

	info!(
		watched = watch_set.watched_count(),
		"Directory monitor gracefully shutdown"
	);
}

fn emit(changed_tx: &chan::Sender<TreeChanged>, changed: TreeChanged) {
	match changed_tx.try_send(changed) {
		Ok(()) => debug!(
			coalesced = changed.coalesced,
			"Directory tree changed, rescan needed;"
		),
		Err(chan::TrySendError::Full(_)) => {
			trace!("Previous change wasn't consumed yet, folding into it;");
		}
		Err(chan::TrySendError::Closed(_)) => {
			trace!("Nobody is listening for directory changes;");
		}
	}
}
