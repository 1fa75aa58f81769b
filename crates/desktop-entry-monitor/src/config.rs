use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for a [`DirectoryMonitor`](crate::DirectoryMonitor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
	/// Quiescence period, in milliseconds, that must pass after the last relevant notification
	/// before a [`TreeChanged`](crate::TreeChanged) is emitted
	pub debounce_ms: u64,
}

impl MonitorConfig {
	pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

	#[must_use]
	pub fn with_debounce(debounce: Duration) -> Self {
		Self {
			debounce_ms: u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX),
		}
	}

	#[must_use]
	pub const fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}
}

impl Default for MonitorConfig {
	fn default() -> Self {
		Self {
			debounce_ms: Self::DEFAULT_DEBOUNCE_MS,
		}
	}
}
