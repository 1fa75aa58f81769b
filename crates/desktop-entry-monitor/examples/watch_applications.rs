//! Watches the XDG `applications` directories and logs every time a rescan would be needed.
//!
//! ```sh
//! RUST_LOG=sd_desktop_entry_monitor=debug cargo run --example watch_applications
//! ```

use sd_desktop_entry_monitor::{xdg, DirectoryMonitor, DirectoryMonitorError, MonitorConfig};

use tokio::{select, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), DirectoryMonitorError> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.init();

	let roots = xdg::application_dirs();
	for root in &roots {
		info!(root = %root.display(), "Monitoring desktop entry path");
	}

	let (mut monitor, changed_rx) = DirectoryMonitor::new(roots, MonitorConfig::default());
	monitor.start()?;

	loop {
		select! {
			changed = changed_rx.recv() => {
				let Ok(changed) = changed else {
					break;
				};

				info!(
					coalesced = changed.coalesced,
					"Desktop entries changed, a full rescan is needed"
				);
			}

			_ = signal::ctrl_c() => {
				info!("Shutting down");
				break;
			}
		}
	}

	Ok(())
}
