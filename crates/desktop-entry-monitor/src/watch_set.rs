use crate::backend::WatchBackend;

use std::{
	collections::HashSet,
	path::{Path, PathBuf},
};

use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// Bounds how many times roots are re-checked after anchors move within a single sync
const MAX_ROOT_SYNC_PASSES: usize = 8;

/// Every directory currently subscribed on a [`WatchBackend`], and the logic to keep that set in
/// line with the trees on disk.
///
/// Two kinds of subscriptions are kept:
/// - tree directories: every existing root and every directory beneath it;
/// - anchors: for each missing root, its nearest existing ancestor, so the root showing up is
///   observable.
///
/// A directory may be both, the backend subscription is shared and only released once neither
/// role needs it. Everything here is best effort: directories that vanish mid scan, unreadable
/// directories and refused subscriptions are skipped, the next notification on a parent retries.
#[derive(Debug)]
pub struct PathWatchSet<B: WatchBackend> {
	backend: B,
	roots: Vec<PathBuf>,
	tree: HashSet<PathBuf>,
	anchors: HashSet<PathBuf>,
}

impl<B: WatchBackend> PathWatchSet<B> {
	pub fn new(backend: B) -> Self {
		Self {
			backend,
			roots: Vec::new(),
			tree: HashSet::new(),
			anchors: HashSet::new(),
		}
	}

	/// Subscribes every existing root tree and an anchor for each missing root.
	pub fn initialize(&mut self, roots: impl IntoIterator<Item = PathBuf>) {
		for root in roots {
			if !self.roots.contains(&root) {
				self.roots.push(root);
			}
		}

		self.sync_roots();

		debug!(
			roots = self.roots.len(),
			watched = self.watched_count(),
			"Watch set initialized;"
		);
	}

	/// Reacts to the backend reporting a change at `path`, returns whether the change is relevant
	/// to consumers.
	///
	/// Any notification on a tree directory is relevant: if the directory is gone it (and what was
	/// beneath it) stops being watched, otherwise its new subdirectories get watched. Paths that
	/// aren't watched at all are stale and ignored.
	///
	/// Anchors are deliberately narrower than "every notification is relevant": a notification on
	/// an anchor only counts if it made a root appear, and only the nearest existing ancestor of a
	/// missing root is anchored rather than its whole parent chain. Anchors are usually busy shared
	/// directories (`/usr/share`, `~/.local/share`) whose unrelated activity must not trigger
	/// rescans or get their other subdirectories watched.
	pub fn handle_notification(&mut self, path: &Path) -> bool {
		let in_tree = self.tree.contains(path);

		if !in_tree && !self.anchors.contains(path) {
			trace!(path = %path.display(), "Ignoring notification for a path we don't watch;");
			return false;
		}

		if in_tree {
			if path.is_dir() {
				self.forget_missing_children(path);
				self.watch_new_children(path);
			} else {
				debug!(path = %path.display(), "Directory no longer exists, cleaning up;");
				self.forget_tree(path);
			}
		}

		self.sync_roots() || in_tree
	}

	/// Runs the notification handler over everything watched, used when the backend dropped
	/// events and we can't tell what changed.
	pub fn rescan(&mut self) {
		let watched = self
			.tree
			.iter()
			.chain(self.anchors.iter())
			.cloned()
			.collect::<HashSet<_>>();

		for path in watched {
			self.handle_notification(&path);
		}

		self.sync_roots();
	}

	#[must_use]
	pub fn is_watched(&self, path: &Path) -> bool {
		self.tree.contains(path) || self.anchors.contains(path)
	}

	#[must_use]
	pub fn watched_count(&self) -> usize {
		self.tree.len() + self.anchors.difference(&self.tree).count()
	}

	/// Sorted snapshot of every subscribed path.
	#[must_use]
	pub fn watched_paths(&self) -> Vec<PathBuf> {
		let mut paths = self
			.tree
			.union(&self.anchors)
			.cloned()
			.collect::<Vec<_>>();
		paths.sort();
		paths
	}

	/// Brings every root in line with the disk: existing roots get their tree watched, missing
	/// roots get an anchor. Returns whether a root appeared or disappeared.
	///
	/// A root can be created between checking it and subscribing its new anchor, so the check
	/// runs again after any anchor is added until nothing moves.
	fn sync_roots(&mut self) -> bool {
		let mut changed = false;

		for _ in 0..MAX_ROOT_SYNC_PASSES {
			let (roots_changed, anchors_added) = self.sync_roots_once();
			changed |= roots_changed;

			if !anchors_added {
				break;
			}
		}

		changed
	}

	/// Returns whether a root appeared or disappeared, and whether a new anchor was subscribed.
	fn sync_roots_once(&mut self) -> (bool, bool) {
		let roots = std::mem::take(&mut self.roots);
		let mut changed = false;
		let mut wanted_anchors = HashSet::new();

		for root in &roots {
			if root.is_dir() {
				if !self.tree.contains(root) && self.watch_tree(root) {
					debug!(root = %root.display(), "Root directory appeared;");
					changed = true;
				}
			} else {
				if self.tree.contains(root) {
					debug!(root = %root.display(), "Root directory disappeared;");
					self.forget_tree(root);
					changed = true;
				}

				if let Some(anchor) = nearest_existing_ancestor(root) {
					wanted_anchors.insert(anchor);
				}
			}
		}

		self.roots = roots;

		let stale = self
			.anchors
			.difference(&wanted_anchors)
			.cloned()
			.collect::<Vec<_>>();
		for anchor in stale {
			self.anchors.remove(&anchor);
			self.release(&anchor);
		}

		let mut anchors_added = false;

		for anchor in wanted_anchors {
			if self.anchors.contains(&anchor) {
				continue;
			}

			if self.tree.contains(&anchor) || self.backend.subscribe(&anchor) {
				trace!(anchor = %anchor.display(), "Watching ancestor of a missing root;");
				self.anchors.insert(anchor);
				anchors_added = true;
			} else {
				warn!(anchor = %anchor.display(), "Unable to watch ancestor of a missing root;");
			}
		}

		(changed, anchors_added)
	}

	/// Subscribes `top` and every directory beneath it, returns whether `top` itself is watched.
	///
	/// Symbolic links are not followed, directories already watched aren't walked again.
	fn watch_tree(&mut self, top: &Path) -> bool {
		let mut top_watched = false;
		let mut walker = WalkDir::new(top).follow_links(false).into_iter();

		while let Some(entry) = walker.next() {
			// extract directory entry or log and continue if failed
			let entry = match entry {
				Ok(entry) => entry,
				Err(e) => {
					debug!(?e, "Skipping unreadable directory;");
					continue;
				}
			};

			if !entry.file_type().is_dir() {
				continue;
			}

			if entry.depth() == 0 {
				if !self.add_to_tree(entry.path().to_path_buf()) {
					return false;
				}
				top_watched = true;
			} else if self.tree.contains(entry.path())
				|| !self.add_to_tree(entry.path().to_path_buf())
			{
				walker.skip_current_dir();
			}
		}

		top_watched
	}

	fn watch_new_children(&mut self, dir: &Path) {
		let children = WalkDir::new(dir)
			.follow_links(false)
			.min_depth(1)
			.max_depth(1)
			.into_iter()
			.filter_map(|entry| match entry {
				Ok(entry) => Some(entry),
				Err(e) => {
					debug!(?e, dir = %dir.display(), "Unable to list changed directory;");
					None
				}
			})
			.filter(|entry| entry.file_type().is_dir())
			.map(DirEntry::into_path)
			.collect::<Vec<_>>();

		for sub_dir in children {
			if !self.tree.contains(&sub_dir) {
				trace!(dir = %sub_dir.display(), "Found new subdirectory;");
				self.watch_tree(&sub_dir);
			}
		}
	}

	/// Drops watched children of `dir` that are confirmed gone, covers removals whose own
	/// notification was missed.
	fn forget_missing_children(&mut self, dir: &Path) {
		let missing = self
			.tree
			.iter()
			.filter(|path| path.parent() == Some(dir) && !path.is_dir())
			.cloned()
			.collect::<Vec<_>>();

		for path in missing {
			self.forget_tree(&path);
		}
	}

	/// Stops watching `top` and everything watched beneath it.
	fn forget_tree(&mut self, top: &Path) {
		let gone = self
			.tree
			.iter()
			.filter(|path| path.starts_with(top))
			.cloned()
			.collect::<Vec<_>>();

		for path in gone {
			self.tree.remove(&path);
			self.release(&path);
		}
	}

	fn add_to_tree(&mut self, path: PathBuf) -> bool {
		if self.tree.contains(&path) {
			return true;
		}

		if !self.anchors.contains(&path) && !self.backend.subscribe(&path) {
			debug!(path = %path.display(), "Dropping directory the backend refused to watch;");
			return false;
		}

		trace!(path = %path.display(), "Added directory to watcher;");
		self.tree.insert(path);
		true
	}

	fn release(&mut self, path: &Path) {
		if !self.tree.contains(path) && !self.anchors.contains(path) {
			trace!(path = %path.display(), "Removed directory from watcher;");
			self.backend.unsubscribe(path);
		}
	}
}

impl<B: WatchBackend> Drop for PathWatchSet<B> {
	fn drop(&mut self) {
		for path in self.tree.union(&self.anchors) {
			self.backend.unsubscribe(path);
		}
	}
}

fn nearest_existing_ancestor(path: &Path) -> Option<PathBuf> {
	path.ancestors()
		.skip(1)
		.find(|ancestor| ancestor.is_dir())
		.map(Path::to_path_buf)
}
