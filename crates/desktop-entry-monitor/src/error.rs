use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("tried to start a directory monitor that is already monitoring")]
	AlreadyMonitoring,
	#[error("directory monitor is not running")]
	NotMonitoring,
	#[error("directory monitor actor is gone")]
	ActorGone,
	#[error("directory monitor must be started from within a tokio runtime: (error: {0})")]
	NoRuntime(#[from] tokio::runtime::TryCurrentError),

	#[error("watcher error: (error: {0})")]
	Watcher(#[from] notify::Error),
}
