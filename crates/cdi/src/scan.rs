//! Descriptor directory scanning.
//!
//! The scanner walks the ordered directory list and hands every candidate
//! file to a callback, together with the priority derived from the
//! directory's position. Failures are strictly per-file or per-directory;
//! one bad entry never stops the rest of the scan.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::CacheError;
use crate::spec::{Spec, is_descriptor_path};

/// Scans `dirs` in ascending priority order, invoking `scan` for every
/// descriptor candidate with `(path, priority, load outcome)`.
///
/// Missing directories are skipped silently (the watcher tracks them);
/// directories that exist but cannot be listed are recorded in
/// `dir_errors`. Files within one directory are visited in byte-order
/// filename sort, which keeps the scan deterministic across refreshes of an
/// unchanged directory.
pub(crate) fn scan_spec_dirs(
	dirs: &[PathBuf],
	dir_errors: &mut BTreeMap<PathBuf, Arc<CacheError>>,
	mut scan: impl FnMut(PathBuf, usize, Result<Spec, CacheError>),
) {
	for (priority, dir) in dirs.iter().enumerate() {
		let entries = match fs::read_dir(dir) {
			Ok(entries) => entries,
			Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
			Err(err) => {
				dir_errors.insert(
					dir.clone(),
					Arc::new(CacheError::DirRead {
						path: dir.clone(),
						reason: err.to_string(),
					}),
				);
				continue;
			}
		};

		let mut files: Vec<PathBuf> = entries
			.filter_map(|entry| entry.ok())
			.map(|entry| entry.path())
			.filter(|path| is_descriptor_path(path) && path.is_file())
			.collect();
		files.sort();

		for path in files {
			let outcome = Spec::load(&path, priority);
			scan(path, priority, outcome);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn write_descriptor(dir: &std::path::Path, file: &str, kind: &str, device: &str) {
		let content = format!(
			r#"{{"cdiVersion": "0.5.0", "kind": "{kind}", "devices": [{{"name": "{device}"}}]}}"#
		);
		fs::write(dir.join(file), content).unwrap();
	}

	#[test]
	fn test_scan_is_sorted_and_priority_indexed() {
		let low = tempfile::tempdir().unwrap();
		let high = tempfile::tempdir().unwrap();
		write_descriptor(low.path(), "zeta.json", "acme.com/gpu", "z");
		write_descriptor(low.path(), "alpha.json", "acme.com/gpu", "a");
		write_descriptor(high.path(), "beta.json", "acme.com/net", "b");
		// not a candidate
		fs::write(low.path().join("notes.txt"), "ignored").unwrap();

		let dirs = vec![low.path().to_path_buf(), high.path().to_path_buf()];
		let mut dir_errors = BTreeMap::new();
		let mut seen = Vec::new();
		scan_spec_dirs(&dirs, &mut dir_errors, |path, priority, outcome| {
			assert!(outcome.is_ok());
			let name = path.file_name().unwrap().to_str().unwrap().to_string();
			seen.push((name, priority));
		});
		let expected = [
			("alpha.json".to_string(), 0),
			("zeta.json".to_string(), 0),
			("beta.json".to_string(), 1),
		];
		assert_eq!(seen, expected);
		assert!(dir_errors.is_empty());
	}

	#[test]
	fn test_partial_failure_continues() {
		let dir = tempfile::tempdir().unwrap();
		write_descriptor(dir.path(), "good.json", "acme.com/gpu", "g");
		fs::write(dir.path().join("bad.json"), "{ nope").unwrap();

		let dirs = vec![dir.path().to_path_buf()];
		let mut dir_errors = BTreeMap::new();
		let mut ok = 0;
		let mut failed = 0;
		scan_spec_dirs(&dirs, &mut dir_errors, |_path, _priority, outcome| {
			match outcome {
				Ok(_) => ok += 1,
				Err(_) => failed += 1,
			}
		});
		assert_eq!((ok, failed), (1, 1));
	}

	#[test]
	fn test_missing_directory_is_skipped() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("not-there");
		let mut dir_errors = BTreeMap::new();
		let mut calls = 0;
		scan_spec_dirs(&[missing], &mut dir_errors, |_, _, _| calls += 1);
		assert_eq!(calls, 0);
		assert!(dir_errors.is_empty());
	}
}
