use sd_desktop_entry_monitor::{DirectoryMonitor, MonitorConfig, TreeChanged};

use std::{
	path::{Path, PathBuf},
	time::Duration,
};

use async_channel as chan;
use tempfile::tempdir;
use tokio::{fs, time::timeout};
use tracing::info;
use tracing_test::traced_test;

const DEBOUNCE: Duration = Duration::from_millis(100);
const PATIENCE: Duration = Duration::from_secs(5);

async fn next_change(changed_rx: &chan::Receiver<TreeChanged>) -> TreeChanged {
	timeout(PATIENCE, changed_rx.recv())
		.await
		.expect("no directory change within the allotted time")
		.expect("directory monitor channel closed")
}

/// Counts changes until the monitor stays quiet for a few debounce windows.
async fn drain_changes(changed_rx: &chan::Receiver<TreeChanged>) -> usize {
	let mut count = 0;
	while let Ok(Ok(_)) = timeout(DEBOUNCE * 5, changed_rx.recv()).await {
		count += 1;
	}
	count
}

async fn wait_until_watched(
	monitor: &DirectoryMonitor,
	path: &Path,
	expected: bool,
) -> Vec<PathBuf> {
	let started = tokio::time::Instant::now();
	loop {
		let watched = monitor.watched_paths().await.expect("monitor is running");
		if watched.iter().any(|watched| watched == path) == expected
			|| started.elapsed() > PATIENCE
		{
			return watched;
		}
		tokio::time::sleep(DEBOUNCE).await;
	}
}

#[tokio::test]
#[traced_test]
async fn initial_scan_covers_existing_tree() {
	let dir = tempdir().unwrap();
	let apps = dir.path().join("applications");
	fs::create_dir_all(apps.join("kde/games")).await.unwrap();
	fs::create_dir_all(apps.join("wine")).await.unwrap();

	let (mut monitor, _changed_rx) =
		DirectoryMonitor::new([apps.clone()], MonitorConfig::with_debounce(DEBOUNCE));
	monitor.start().unwrap();

	assert_eq!(
		monitor.watched_paths().await.unwrap(),
		vec![
			apps.clone(),
			apps.join("kde"),
			apps.join("kde/games"),
			apps.join("wine"),
		]
	);
}

#[tokio::test]
#[traced_test]
async fn missing_root_is_picked_up_when_created() {
	let dir = tempdir().unwrap();
	let t1 = dir.path().join("t1");
	let t2 = dir.path().join("t2");
	fs::create_dir(&t1).await.unwrap();

	let (mut monitor, changed_rx) =
		DirectoryMonitor::new([t1, t2.clone()], MonitorConfig::with_debounce(DEBOUNCE));
	monitor.start().unwrap();

	fs::create_dir(&t2).await.unwrap();
	fs::create_dir(t2.join("sub")).await.unwrap();

	next_change(&changed_rx).await;
	let extra = drain_changes(&changed_rx).await;
	info!(extra, "Changes after the first one");
	assert!(extra <= 1);

	let watched = wait_until_watched(&monitor, &t2.join("sub"), true).await;
	assert!(watched.contains(&t2.join("sub")));
}

#[tokio::test]
#[traced_test]
async fn removed_directory_stops_being_watched() {
	let dir = tempdir().unwrap();
	let apps = dir.path().join("applications");
	fs::create_dir_all(apps.join("kde")).await.unwrap();

	let (mut monitor, changed_rx) =
		DirectoryMonitor::new([apps.clone()], MonitorConfig::with_debounce(DEBOUNCE));
	monitor.start().unwrap();

	fs::remove_dir(apps.join("kde")).await.unwrap();

	next_change(&changed_rx).await;

	let watched = wait_until_watched(&monitor, &apps.join("kde"), false).await;
	assert_eq!(watched, vec![apps]);
}

#[tokio::test]
#[traced_test]
async fn burst_of_writes_is_coalesced() {
	let dir = tempdir().unwrap();
	let apps = dir.path().join("applications");
	fs::create_dir(&apps).await.unwrap();

	let (mut monitor, changed_rx) = DirectoryMonitor::new(
		[apps.clone()],
		MonitorConfig::with_debounce(Duration::from_millis(300)),
	);
	monitor.start().unwrap();

	for i in 0..20 {
		fs::write(
			apps.join(format!("app-{i}.desktop")),
			"[Desktop Entry]\nType=Application\n",
		)
		.await
		.unwrap();
	}

	let first = next_change(&changed_rx).await;
	assert!(first.coalesced > 1);

	let extra = drain_changes(&changed_rx).await;
	assert!(extra <= 1, "{extra} extra changes for a single burst");
}

#[tokio::test]
#[traced_test]
async fn new_subdirectory_files_are_observed() {
	let dir = tempdir().unwrap();
	let apps = dir.path().join("applications");
	fs::create_dir(&apps).await.unwrap();

	let (mut monitor, changed_rx) =
		DirectoryMonitor::new([apps.clone()], MonitorConfig::with_debounce(DEBOUNCE));
	monitor.start().unwrap();

	fs::create_dir(apps.join("vendor")).await.unwrap();
	next_change(&changed_rx).await;
	wait_until_watched(&monitor, &apps.join("vendor"), true).await;
	drain_changes(&changed_rx).await;

	// Only observable if the new subdirectory itself got subscribed
	fs::write(apps.join("vendor/editor.desktop"), "[Desktop Entry]\n")
		.await
		.unwrap();
	next_change(&changed_rx).await;
}
