//! Low level "this directory changed" capability and its `notify` implementation

use std::{
	iter,
	path::{Path, PathBuf},
};

use async_channel as chan;
use notify::{
	event::{AccessKind, AccessMode},
	Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use tracing::{debug, error, trace};

/// Something that can subscribe a single directory for change notifications.
///
/// Subscriptions are non-recursive, the [`PathWatchSet`](crate::PathWatchSet) takes care of
/// walking trees. Notifications are delivered out of band, as [`RawNotification`]s sent to the
/// channel handed to the backend when it was built.
pub trait WatchBackend: Send + 'static {
	/// Best effort, returns whether the subscription is now in place.
	fn subscribe(&mut self, path: &Path) -> bool;

	fn unsubscribe(&mut self, path: &Path);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawNotification {
	/// The contents or metadata of this path changed
	Changed(PathBuf),
	/// The backend lost events, everything must be checked again
	Rescan,
}

/// [`WatchBackend`] on top of the platform's recommended `notify` watcher.
#[derive(Debug)]
pub struct NotifyBackend {
	watcher: RecommendedWatcher,
}

impl NotifyBackend {
	pub fn new(raw_tx: chan::Sender<RawNotification>) -> Result<Self, notify::Error> {
		let watcher = RecommendedWatcher::new(
			move |result: notify::Result<Event>| match result {
				Ok(event) => {
					for notification in translate_event(event) {
						// SAFETY: we are not blocking the thread as this is an unbounded channel
						if raw_tx.send_blocking(notification).is_err() {
							trace!("Directory monitor is gone, dropping file system event;");
							return;
						}
					}
				}
				Err(e) => error!(?e, "Watcher error;"),
			},
			Config::default(),
		)?;

		Ok(Self { watcher })
	}
}

impl WatchBackend for NotifyBackend {
	fn subscribe(&mut self, path: &Path) -> bool {
		match self.watcher.watch(path, RecursiveMode::NonRecursive) {
			Ok(()) => true,
			Err(e) => {
				debug!(?e, path = %path.display(), "Unable to watch directory;");
				false
			}
		}
	}

	fn unsubscribe(&mut self, path: &Path) {
		// inotify drops the watch by itself when the directory is deleted, so failing here is
		// the common case on removals
		if let Err(e) = self.watcher.unwatch(path) {
			trace!(?e, path = %path.display(), "Unable to unwatch directory;");
		}
	}
}

/// Turns a `notify` event into directory level notifications.
///
/// Each event path is reported along with its parent, the monitor only keeps the ones it is
/// actually watching. That covers both events about a watched directory itself (deleted, moved,
/// metadata) and events about entries inside it.
fn translate_event(event: Event) -> Vec<RawNotification> {
	if event.need_rescan() {
		return vec![RawNotification::Rescan];
	}

	match event.kind {
		EventKind::Access(AccessKind::Close(AccessMode::Write)) => {}
		EventKind::Access(_) => return vec![],
		_ => {}
	}

	event
		.paths
		.into_iter()
		.flat_map(|path| {
			let parent = path.parent().map(Path::to_path_buf);
			iter::once(RawNotification::Changed(path)).chain(parent.map(RawNotification::Changed))
		})
		.collect()
}
