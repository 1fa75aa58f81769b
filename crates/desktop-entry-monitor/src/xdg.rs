//! Resolution of the XDG `applications` directories, the usual roots for a
//! [`DirectoryMonitor`](crate::DirectoryMonitor).

use std::{
	env,
	ffi::{OsStr, OsString},
	path::PathBuf,
};

const DEFAULT_DATA_DIRS: &str = "/usr/local/share:/usr/share";

/// `applications` directories from the current environment, most important first.
#[must_use]
pub fn application_dirs() -> Vec<PathBuf> {
	application_dirs_from(
		env::var_os("XDG_DATA_HOME"),
		env::var_os("HOME"),
		env::var_os("XDG_DATA_DIRS"),
	)
}

/// Same as [`application_dirs`], from explicit variable values.
///
/// An empty `XDG_DATA_HOME` falls back to `$HOME/.local/share` and an empty `XDG_DATA_DIRS` to
/// `/usr/local/share:/usr/share`. Empty entries are skipped and duplicates only kept once.
#[must_use]
pub fn application_dirs_from(
	data_home: Option<OsString>,
	home: Option<OsString>,
	data_dirs: Option<OsString>,
) -> Vec<PathBuf> {
	let data_home = data_home
		.filter(|data_home| !data_home.is_empty())
		.map(PathBuf::from)
		.or_else(|| {
			home.filter(|home| !home.is_empty())
				.map(|home| PathBuf::from(home).join(".local/share"))
		});

	let data_dirs = data_dirs
		.filter(|data_dirs| !data_dirs.is_empty())
		.unwrap_or_else(|| OsString::from(DEFAULT_DATA_DIRS));

	let mut dirs = Vec::new();

	for data_dir in data_home
		.into_iter()
		.chain(env::split_paths(&data_dirs).filter(|dir| dir.as_os_str() != OsStr::new("")))
	{
		let applications = data_dir.join("applications");
		if !dirs.contains(&applications) {
			dirs.push(applications);
		}
	}

	dirs
}
