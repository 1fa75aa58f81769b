//!
//! # Desktop Entry Monitor
//!
//! Watches a fixed set of application-description directories (the XDG `applications` folders,
//! usually) and tells the consumer when it should rescan them.
//!
//! Most platform backends only report changes for the exact directory that was modified, so the
//! monitor keeps a non-recursive subscription on every directory of every tree, following the trees
//! as subdirectories come and go. Roots that don't exist yet are observed through their nearest
//! existing ancestor until they show up.
//!
//! Package managers tend to write a lot of files in a row, so notifications are never forwarded
//! directly: they are folded by a debounce window and the consumer receives a single
//! [`TreeChanged`] once things quiet down.
//!
//! ## Basic example
//!
//! ```no_run
//! use sd_desktop_entry_monitor::{xdg, DirectoryMonitor, MonitorConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (mut monitor, changed_rx) =
//!         DirectoryMonitor::new(xdg::application_dirs(), MonitorConfig::default());
//!
//!     monitor.start().expect("failed to start the monitor");
//!
//!     while let Ok(changed) = changed_rx.recv().await {
//!         println!("rescan needed ({} notifications folded)", changed.coalesced);
//!     }
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod backend;
mod coalescer;
mod config;
mod error;
mod monitor;
mod watch_set;

pub mod xdg;

pub use backend::{NotifyBackend, RawNotification, WatchBackend};
pub use coalescer::{ChangeCoalescer, TreeChanged};
pub use config::MonitorConfig;
pub use error::Error as DirectoryMonitorError;
pub use monitor::DirectoryMonitor;
pub use watch_set::PathWatchSet;
