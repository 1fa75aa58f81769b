use std::time::Duration;

use tokio::time::Instant;

/// Emitted once a burst of relevant notifications settles down, consumers are expected to rescan
/// every root when receiving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeChanged {
	/// How many relevant notifications were folded into this event, for diagnostics only
	pub coalesced: usize,
}

/// Folds relevant change reports into a single [`TreeChanged`] per quiescence window.
///
/// This only keeps the bookkeeping, whoever owns it drives the actual timer: after each
/// [`notify`](Self::notify) the timer must be moved to the returned deadline, and
/// [`fire`](Self::fire) called when it elapses. Every report pushes the deadline back, so a
/// steady stream of changes keeps postponing the event instead of stacking timers.
#[derive(Debug)]
pub struct ChangeCoalescer {
	window: Duration,
	deadline: Option<Instant>,
	coalesced: usize,
}

impl ChangeCoalescer {
	#[must_use]
	pub const fn new(window: Duration) -> Self {
		Self {
			window,
			deadline: None,
			coalesced: 0,
		}
	}

	pub fn notify(&mut self) -> Instant {
		let deadline = Instant::now() + self.window;
		self.deadline = Some(deadline);
		self.coalesced += 1;
		deadline
	}

	#[must_use]
	pub const fn is_pending(&self) -> bool {
		self.deadline.is_some()
	}

	#[must_use]
	pub const fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	#[must_use]
	pub const fn window(&self) -> Duration {
		self.window
	}

	/// Returns the event to emit, or `None` if nothing was pending.
	pub fn fire(&mut self) -> Option<TreeChanged> {
		self.deadline.take()?;

		Some(TreeChanged {
			coalesced: std::mem::take(&mut self.coalesced),
		})
	}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;

	use tokio::time::advance;

	const WINDOW: Duration = Duration::from_millis(50);

	#[tokio::test(start_paused = true)]
	async fn every_notify_pushes_the_deadline_back() {
		let mut coalescer = ChangeCoalescer::new(WINDOW);

		let first = coalescer.notify();
		advance(Duration::from_millis(30)).await;
		let second = coalescer.notify();

		assert_eq!(second - first, Duration::from_millis(30));
		assert_eq!(coalescer.deadline(), Some(second));
	}

	#[tokio::test(start_paused = true)]
	async fn fire_folds_and_clears() {
		let mut coalescer = ChangeCoalescer::new(WINDOW);

		for _ in 0..5 {
			coalescer.notify();
		}

		assert_eq!(coalescer.fire(), Some(TreeChanged { coalesced: 5 }));
		assert!(!coalescer.is_pending());
		assert_eq!(coalescer.fire(), None);

		coalescer.notify();
		assert_eq!(coalescer.fire().unwrap().coalesced, 1);
	}
}
