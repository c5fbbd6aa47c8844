//! Directory watching for automatic registry refresh.
//!
//! In auto-refresh mode the cache registers every configured directory with
//! a filesystem watcher and runs a background loop over the resulting event
//! stream. The loop never touches registry state directly: each reaction
//! acquires the cache's exclusive lock, reconciles which directories are
//! watchable, and invokes the refresh path, so it serializes with all
//! foreground operations.
//!
//! Directories commonly do not exist yet when the cache is configured.
//! Registration failures are recorded as per-directory errors and retried
//! on every subsequent event and query, never treated as fatal.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};
use std::sync::{Arc, Weak};
use std::thread;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cache::CacheState;
use crate::error::CacheError;
use crate::spec::is_descriptor_path;

type EventReceiver = Receiver<notify::Result<Event>>;

/// Watch registration state for the configured descriptor directories.
///
/// `tracked` maps every configured directory to whether a watch is
/// currently registered on it. Lives inside the cache state and is only
/// ever touched under the cache lock.
#[derive(Default)]
pub(crate) struct Watch {
	watcher: Option<RecommendedWatcher>,
	tracked: BTreeMap<PathBuf, bool>,
}

impl Watch {
	/// Creates the watcher and registers interest in `dirs`.
	///
	/// Directories that cannot be watched yet get an entry in `dir_errors`
	/// and are retried later. Returns the event stream to hand to
	/// [`Watch::start`], or `None` if the watcher itself could not be
	/// created.
	pub(crate) fn setup(
		&mut self,
		dirs: &[PathBuf],
		dir_errors: &mut BTreeMap<PathBuf, Arc<CacheError>>,
	) -> Option<EventReceiver> {
		self.tracked = dirs.iter().map(|dir| (dir.clone(), false)).collect();

		let (tx, rx) = channel();
		match notify::recommended_watcher(tx) {
			Ok(watcher) => self.watcher = Some(watcher),
			Err(err) => {
				warn!(error = %err, "failed to create filesystem watcher");
				for dir in dirs {
					dir_errors.insert(
						dir.clone(),
						Arc::new(CacheError::WatchDir {
							path: dir.clone(),
							reason: err.to_string(),
						}),
					);
				}
				return None;
			}
		}

		self.update(dir_errors, &[]);
		Some(rx)
	}

	/// Stops watching. Idempotent; dropping the watcher closes the event
	/// stream, which is what ends the background loop.
	pub(crate) fn stop(&mut self) {
		self.watcher = None;
		self.tracked.clear();
	}

	/// Whether `dir` currently has a registered watch.
	pub(crate) fn is_tracked(&self, dir: &Path) -> bool {
		self.tracked.get(dir).copied().unwrap_or(false)
	}

	/// Reconciles watch registrations: tries to watch every untracked
	/// directory, and forces every path in `removed` untracked with a
	/// removal error. Returns whether tracking state changed, which the
	/// cache uses to decide if a topology refresh is warranted.
	pub(crate) fn update(
		&mut self,
		dir_errors: &mut BTreeMap<PathBuf, Arc<CacheError>>,
		removed: &[PathBuf],
	) -> bool {
		let Some(watcher) = self.watcher.as_mut() else {
			return false;
		};

		let mut changed = false;
		for (dir, tracked) in self.tracked.iter_mut() {
			if *tracked {
				continue;
			}
			match watcher.watch(dir, RecursiveMode::NonRecursive) {
				Ok(()) => {
					debug!(dir = %dir.display(), "watching descriptor directory");
					*tracked = true;
					dir_errors.remove(dir);
					changed = true;
				}
				Err(err) => {
					dir_errors.insert(
						dir.clone(),
						Arc::new(CacheError::WatchDir {
							path: dir.clone(),
							reason: err.to_string(),
						}),
					);
				}
			}
		}

		for dir in removed {
			if let Some(tracked) = self.tracked.get_mut(dir) {
				*tracked = false;
			}
			dir_errors.insert(
				dir.clone(),
				Arc::new(CacheError::DirRemoved { path: dir.clone() }),
			);
			changed = true;
		}

		changed
	}

	/// Spawns the background loop consuming `events` until the stream
	/// closes.
	pub(crate) fn start(events: EventReceiver, state: Weak<Mutex<CacheState>>) {
		let spawned = thread::Builder::new()
			.name("cdi-watch".into())
			.spawn(move || watch_loop(events, state));
		if let Err(err) = spawned {
			warn!(error = %err, "failed to spawn watch thread");
		}
	}
}

fn watch_loop(events: EventReceiver, state: Weak<Mutex<CacheState>>) {
	while let Ok(outcome) = events.recv() {
		let event = match outcome {
			Ok(event) => event,
			Err(err) => {
				warn!(error = %err, "filesystem watch error");
				continue;
			}
		};
		if !is_relevant(&event) {
			continue;
		}

		let Some(state) = state.upgrade() else {
			break;
		};
		let mut guard = state.lock();
		let state = &mut *guard;

		let removed: Vec<PathBuf> = if matches!(event.kind, EventKind::Remove(_)) {
			event
				.paths
				.iter()
				.filter(|path| state.is_tracked(path))
				.cloned()
				.collect()
		} else {
			Vec::new()
		};

		state.reconcile_watches(&removed);
		if let Err(errors) = state.refresh() {
			debug!(errors = errors.len(), "refresh after filesystem event recorded errors");
		}
	}
	debug!("watch event stream closed, stopping");
}

/// Creation, removal, and renames always warrant a reaction; content writes
/// only when they touch a file with a descriptor extension.
fn is_relevant(event: &Event) -> bool {
	match event.kind {
		EventKind::Create(_) | EventKind::Remove(_) | EventKind::Any => true,
		EventKind::Modify(ModifyKind::Name(_)) => true,
		EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
			event.paths.iter().any(|path| is_descriptor_path(path))
		}
		_ => false,
	}
}
