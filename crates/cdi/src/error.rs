//! Error types for descriptor loading, cache refresh, and injection.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors recorded while scanning, watching, and writing descriptors.
///
/// Scan-time instances are stored in the registry and handed out as shared
/// copies, which is why the cache keeps them behind [`Arc`].
#[derive(Debug, Error)]
pub enum CacheError {
	/// A descriptor file could not be read.
	#[error("failed to read descriptor {path:?}: {reason}")]
	SpecRead {
		/// Path of the unreadable file.
		path: PathBuf,
		/// The underlying I/O failure.
		reason: String,
	},

	/// A descriptor file could not be decoded.
	#[error("failed to parse descriptor {path:?}: {reason}")]
	SpecParse {
		/// Path of the malformed file.
		path: PathBuf,
		/// The decoder's message.
		reason: String,
	},

	/// A descriptor decoded cleanly but carries invalid content.
	#[error("invalid descriptor {path:?}: {reason}")]
	SpecInvalid {
		/// Path of the rejected file.
		path: PathBuf,
		/// What the validation rejected.
		reason: String,
	},

	/// Two descriptors at equal priority define the same device.
	#[error("conflicting device {name:?} (descriptors {path:?}, {other_path:?})")]
	DeviceConflict {
		/// The contested qualified device name.
		name: String,
		/// Path of the descriptor scanned later.
		path: PathBuf,
		/// Path of the descriptor scanned earlier.
		other_path: PathBuf,
	},

	/// A configured directory exists but could not be listed.
	#[error("failed to read directory {path:?}: {reason}")]
	DirRead {
		/// Path of the unreadable directory.
		path: PathBuf,
		/// The underlying I/O failure.
		reason: String,
	},

	/// A configured directory could not be registered for watching.
	#[error("failed to monitor {path:?} for changes: {reason}")]
	WatchDir {
		/// Path of the unwatchable directory.
		path: PathBuf,
		/// The watcher's message.
		reason: String,
	},

	/// A watched directory was removed from disk.
	#[error("directory {path:?} removed")]
	DirRemoved {
		/// Path of the removed directory.
		path: PathBuf,
	},

	/// A device reference is not a well-formed qualified name.
	#[error("invalid qualified device name {name:?}: {reason}")]
	InvalidQualifiedName {
		/// The offending reference.
		name: String,
		/// Why it was rejected.
		reason: String,
	},

	/// No directories are configured, so there is nowhere to write.
	#[error("no descriptor directories configured to write to")]
	NoSpecDirs,

	/// A descriptor write would clobber an existing file.
	#[error("refusing to overwrite existing descriptor {path:?}")]
	SpecExists {
		/// Path of the existing file.
		path: PathBuf,
	},

	/// Persisting a descriptor failed.
	#[error("failed to write descriptor {path:?}: {reason}")]
	SpecWrite {
		/// Path of the target file.
		path: PathBuf,
		/// The underlying failure.
		reason: String,
	},
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Aggregate of every error one registry refresh recorded.
///
/// A refresh never aborts on the first bad file; callers enumerate the
/// constituent failures through [`RefreshErrors::errors`].
#[derive(Debug, Default)]
pub struct RefreshErrors {
	errors: Vec<Arc<CacheError>>,
}

impl RefreshErrors {
	pub(crate) fn new(errors: Vec<Arc<CacheError>>) -> Self {
		Self { errors }
	}

	/// The individual errors, in the order the scan recorded them.
	pub fn errors(&self) -> &[Arc<CacheError>] {
		&self.errors
	}

	/// Number of recorded errors.
	pub fn len(&self) -> usize {
		self.errors.len()
	}

	/// Whether the refresh recorded no errors at all.
	pub fn is_empty(&self) -> bool {
		self.errors.is_empty()
	}
}

impl fmt::Display for RefreshErrors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} error(s) occurred:", self.errors.len())?;
		for error in &self.errors {
			write!(f, "\n\t* {error}")?;
		}
		Ok(())
	}
}

impl std::error::Error for RefreshErrors {}

/// Injection failed because requested devices are absent from the registry.
///
/// Carries every missing name, not just the first; the target specification
/// is left untouched when this is returned.
#[derive(Debug, Error)]
#[error("unresolvable devices {}", .unresolved.join(", "))]
pub struct UnresolvedDevices {
	unresolved: Vec<String>,
}

impl UnresolvedDevices {
	pub(crate) fn new(unresolved: Vec<String>) -> Self {
		Self { unresolved }
	}

	/// The requested qualified names that did not resolve, in request order.
	pub fn unresolved(&self) -> &[String] {
		&self.unresolved
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn refresh_errors_display_lists_constituents() {
		let errors = RefreshErrors::new(vec![
			Arc::new(CacheError::NoSpecDirs),
			Arc::new(CacheError::DirRemoved {
				path: PathBuf::from("/var/run/cdi"),
			}),
		]);
		let rendered = errors.to_string();
		assert!(rendered.starts_with("2 error(s) occurred:"));
		assert!(rendered.contains("no descriptor directories"));
		assert!(rendered.contains("/var/run/cdi"));
	}

	#[test]
	fn unresolved_devices_lists_names() {
		let err = UnresolvedDevices::new(vec!["a/b=c".into(), "d/e=f".into()]);
		assert_eq!(err.unresolved(), ["a/b=c", "d/e=f"]);
		assert_eq!(err.to_string(), "unresolvable devices a/b=c, d/e=f");
	}
}
