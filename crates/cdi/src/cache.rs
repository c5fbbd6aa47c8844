//! The device registry cache.
//!
//! [`Cache`] owns the configured directory list and the current registry
//! snapshot: devices by qualified name, descriptors by vendor, and the
//! errors recorded by the last scan. One exclusive lock serializes every
//! public operation with the background watch loop; the snapshot is
//! replaced wholesale on refresh, so no caller ever observes a registry
//! built from part of a scan.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use vessel_oci as oci;

use crate::device::Device;
use crate::edits::ContainerEdits;
use crate::error::{CacheError, RefreshErrors, UnresolvedDevices};
use crate::scan::scan_spec_dirs;
use crate::schema;
use crate::spec::{Spec, is_descriptor_path};
use crate::watch::Watch;

/// Default directory for statically managed descriptors, lowest priority.
pub const DEFAULT_STATIC_DIR: &str = "/etc/cdi";

/// Default directory for dynamically generated descriptors, highest
/// priority.
pub const DEFAULT_DYNAMIC_DIR: &str = "/var/run/cdi";

/// The platform default descriptor directories, in ascending priority
/// order.
pub fn default_spec_dirs() -> Vec<PathBuf> {
	vec![
		PathBuf::from(DEFAULT_STATIC_DIR),
		PathBuf::from(DEFAULT_DYNAMIC_DIR),
	]
}

/// Cache configuration, applied at construction and on
/// [`Cache::reconfigure`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
	/// Descriptor directories in ascending priority order: a descriptor's
	/// priority is the index of its directory here, and later entries
	/// override earlier ones.
	pub spec_dirs: Vec<PathBuf>,
	/// Keep the registry current by watching the directories for changes.
	/// When disabled, the registry is only rebuilt by explicit
	/// [`Cache::refresh`] calls.
	pub auto_refresh: bool,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			spec_dirs: default_spec_dirs(),
			auto_refresh: true,
		}
	}
}

/// Device registry built from descriptor directories.
///
/// The embedding application owns one `Cache` per runtime root and passes
/// it by reference to every call site; all operations take `&self` and
/// serialize internally.
pub struct Cache {
	state: Arc<Mutex<CacheState>>,
}

impl Cache {
	/// Creates a cache and performs the initial scan.
	///
	/// Construction never fails: scan and watch problems are recorded and
	/// can be retrieved through [`Cache::refresh`], [`Cache::errors`], and
	/// [`Cache::dir_errors`] afterwards.
	pub fn new(config: CacheConfig) -> Self {
		let cache = Self {
			state: Arc::new(Mutex::new(CacheState {
				spec_dirs: Vec::new(),
				specs: HashMap::new(),
				devices: HashMap::new(),
				errors: BTreeMap::new(),
				dir_errors: BTreeMap::new(),
				auto_refresh: true,
				watch: Watch::default(),
			})),
		};
		cache.apply_config(config);
		cache
	}

	/// Re-applies configuration: restarts the watcher to match the new
	/// directory list and refresh mode, then rescans.
	pub fn reconfigure(&self, config: CacheConfig) {
		self.apply_config(config);
	}

	fn apply_config(&self, config: CacheConfig) {
		let mut guard = self.state.lock();
		let state = &mut *guard;

		state.spec_dirs = config.spec_dirs;
		state.auto_refresh = config.auto_refresh;
		state.dir_errors.clear();

		state.watch.stop();
		if state.auto_refresh {
			if let Some(events) = state.watch.setup(&state.spec_dirs, &mut state.dir_errors) {
				Watch::start(events, Arc::downgrade(&self.state));
			}
		}

		if let Err(errors) = state.refresh() {
			debug!(errors = errors.len(), "registry scan recorded errors");
		}
	}

	/// Rescans the descriptor directories and rebuilds the registry.
	///
	/// In manual mode the rescan is unconditional. In auto-refresh mode the
	/// registry is rebuilt only if the directory topology changed since the
	/// last check; content changes have already been pushed by the watcher.
	/// Returns the aggregate of all errors the (possibly cached) scan
	/// recorded.
	pub fn refresh(&self) -> Result<(), RefreshErrors> {
		let mut guard = self.state.lock();
		let state = &mut *guard;

		if let Some(result) = state.refresh_if_required(!state.auto_refresh) {
			return result;
		}

		// no rescan was needed; report the cached error state
		let cached: Vec<Arc<CacheError>> = state.errors.values().flatten().cloned().collect();
		if cached.is_empty() {
			Ok(())
		} else {
			Err(RefreshErrors::new(cached))
		}
	}

	/// Injects the edits of the named devices into `oci_spec`.
	///
	/// All-or-nothing: every requested name is resolved first, and if any
	/// are missing the call returns them all without touching `oci_spec`.
	/// Descriptor-level edits are applied once per contributing descriptor
	/// even when several of its devices are requested together.
	pub fn inject_devices(
		&self,
		oci_spec: &mut oci::Spec,
		devices: &[impl AsRef<str>],
	) -> Result<(), UnresolvedDevices> {
		let mut guard = self.state.lock();
		let state = &mut *guard;
		state.refresh_if_required(false);

		let mut unresolved = Vec::new();
		let mut edits = ContainerEdits::default();
		let mut seen_specs = HashSet::new();

		for requested in devices {
			let name = requested.as_ref();
			let Some(device) = state.devices.get(name) else {
				unresolved.push(name.to_string());
				continue;
			};
			let spec = device.spec();
			if seen_specs.insert(Arc::as_ptr(spec)) {
				edits.append(spec.edits());
			}
			edits.append(device.edits());
		}

		if !unresolved.is_empty() {
			return Err(UnresolvedDevices::new(unresolved));
		}

		edits.apply(oci_spec);
		Ok(())
	}

	/// Looks up a device by qualified name.
	pub fn device(&self, name: &str) -> Option<Device> {
		let mut guard = self.state.lock();
		let state = &mut *guard;
		state.refresh_if_required(false);
		state.devices.get(name).cloned()
	}

	/// All known qualified device names, lexicographically sorted.
	pub fn list_devices(&self) -> Vec<String> {
		let mut guard = self.state.lock();
		let state = &mut *guard;
		state.refresh_if_required(false);
		let mut devices: Vec<String> = state.devices.keys().cloned().collect();
		devices.sort();
		devices
	}

	/// All known vendors, lexicographically sorted.
	pub fn list_vendors(&self) -> Vec<String> {
		let mut guard = self.state.lock();
		let state = &mut *guard;
		state.refresh_if_required(false);
		let mut vendors: Vec<String> = state.specs.keys().cloned().collect();
		vendors.sort();
		vendors
	}

	/// All known device classes, lexicographically sorted.
	pub fn list_classes(&self) -> Vec<String> {
		let mut guard = self.state.lock();
		let state = &mut *guard;
		state.refresh_if_required(false);
		let classes: BTreeSet<String> = state
			.specs
			.values()
			.flatten()
			.map(|spec| spec.class().to_string())
			.collect();
		classes.into_iter().collect()
	}

	/// The loaded descriptors of one vendor.
	pub fn vendor_specs(&self, vendor: &str) -> Vec<Arc<Spec>> {
		let mut guard = self.state.lock();
		let state = &mut *guard;
		state.refresh_if_required(false);
		state.specs.get(vendor).cloned().unwrap_or_default()
	}

	/// Validates `raw` and persists it as a descriptor named `name` in the
	/// most-authoritative (highest-priority) configured directory.
	///
	/// If `name` lacks a recognized descriptor extension, the default
	/// encoding extension `.json` is appended.
	pub fn write_spec(&self, raw: schema::Spec, name: &str) -> Result<(), CacheError> {
		let guard = self.state.lock();

		let Some(dir) = guard.spec_dirs.last() else {
			return Err(CacheError::NoSpecDirs);
		};
		let priority = guard.spec_dirs.len() - 1;

		let mut path = dir.join(name);
		if !is_descriptor_path(&path) {
			let mut with_ext = path.into_os_string();
			with_ext.push(".json");
			path = PathBuf::from(with_ext);
		}

		let spec = Spec::new(raw, path, priority)?;
		spec.write(true)
	}

	/// The errors recorded against one descriptor's path by the last scan.
	pub fn spec_errors(&self, spec: &Spec) -> Vec<Arc<CacheError>> {
		self.state
			.lock()
			.errors
			.get(spec.path())
			.cloned()
			.unwrap_or_default()
	}

	/// All errors recorded by the last scan, per path, including
	/// directory-level errors. Returns a copy, never internal storage.
	pub fn errors(&self) -> BTreeMap<PathBuf, Vec<Arc<CacheError>>> {
		let guard = self.state.lock();
		let mut errors = guard.errors.clone();
		for (path, error) in &guard.dir_errors {
			errors.insert(path.clone(), vec![Arc::clone(error)]);
		}
		errors
	}

	/// The configured descriptor directories, ascending priority.
	pub fn spec_dirs(&self) -> Vec<PathBuf> {
		self.state.lock().spec_dirs.clone()
	}

	/// The current per-directory errors (unreadable, unwatchable, or
	/// removed directories). Returns a copy, never internal storage.
	pub fn dir_errors(&self) -> BTreeMap<PathBuf, Arc<CacheError>> {
		self.state.lock().dir_errors.clone()
	}
}

/// Everything behind the cache's exclusive lock: configuration, the
/// registry snapshot, error state, and watch tracking.
pub(crate) struct CacheState {
	spec_dirs: Vec<PathBuf>,
	specs: HashMap<String, Vec<Arc<Spec>>>,
	devices: HashMap<String, Device>,
	errors: BTreeMap<PathBuf, Vec<Arc<CacheError>>>,
	dir_errors: BTreeMap<PathBuf, Arc<CacheError>>,
	auto_refresh: bool,
	watch: Watch,
}

impl CacheState {
	/// Rescans if forced (manual-mode refresh) or if the watcher reports a
	/// topology change in auto-refresh mode. Returns `None` when no rescan
	/// happened.
	fn refresh_if_required(&mut self, force: bool) -> Option<Result<(), RefreshErrors>> {
		if force || (self.auto_refresh && self.watch.update(&mut self.dir_errors, &[])) {
			return Some(self.refresh());
		}
		None
	}

	/// Rebuilds the registry snapshot from disk.
	///
	/// Devices are collected directory-by-directory in ascending priority
	/// order. A higher-priority device silently replaces a lower-priority
	/// one with the same qualified name; equal priority is a conflict that
	/// excludes the name from the registry entirely. The new snapshot
	/// replaces the old one wholesale.
	pub(crate) fn refresh(&mut self) -> Result<(), RefreshErrors> {
		let mut specs: HashMap<String, Vec<Arc<Spec>>> = HashMap::new();
		let mut devices: HashMap<String, Device> = HashMap::new();
		let mut conflicts: HashSet<String> = HashSet::new();
		let mut spec_errors: BTreeMap<PathBuf, Vec<Arc<CacheError>>> = BTreeMap::new();
		let mut collected: Vec<Arc<CacheError>> = Vec::new();

		scan_spec_dirs(&self.spec_dirs, &mut self.dir_errors, |path, _priority, outcome| {
			let spec = match outcome {
				Ok(spec) => Arc::new(spec),
				Err(error) => {
					debug!(path = %path.display(), error = %error, "failed to load descriptor");
					let error = Arc::new(error);
					collected.push(Arc::clone(&error));
					spec_errors.entry(path).or_default().push(error);
					return;
				}
			};

			specs
				.entry(spec.vendor().to_string())
				.or_default()
				.push(Arc::clone(&spec));

			for device in Device::all(&spec) {
				let qualified = device.qualified_name();
				if let Some(existing) = devices.get(&qualified) {
					let new_priority = device.spec().priority();
					let old_priority = existing.spec().priority();
					if new_priority < old_priority {
						// intentionally shadowed by a more authoritative
						// directory, not a conflict
						continue;
					}
					if new_priority == old_priority {
						let error = Arc::new(CacheError::DeviceConflict {
							name: qualified.clone(),
							path: device.spec().path().to_path_buf(),
							other_path: existing.spec().path().to_path_buf(),
						});
						collected.push(Arc::clone(&error));
						spec_errors
							.entry(device.spec().path().to_path_buf())
							.or_default()
							.push(Arc::clone(&error));
						spec_errors
							.entry(existing.spec().path().to_path_buf())
							.or_default()
							.push(error);
						conflicts.insert(qualified);
						continue;
					}
				}
				devices.insert(qualified, device);
			}
		});

		// conflicted names are excluded outright, even where one of the
		// contenders would have beaten a lower-priority entry
		for name in &conflicts {
			devices.remove(name);
		}

		self.specs = specs;
		self.devices = devices;
		self.errors = spec_errors;

		if collected.is_empty() {
			Ok(())
		} else {
			Err(RefreshErrors::new(collected))
		}
	}

	pub(crate) fn is_tracked(&self, dir: &Path) -> bool {
		self.watch.is_tracked(dir)
	}

	pub(crate) fn reconcile_watches(&mut self, removed: &[PathBuf]) -> bool {
		self.watch.update(&mut self.dir_errors, removed)
	}
}

#[cfg(test)]
mod tests {
	use std::fs;

	use super::*;

	fn write_descriptor(dir: &Path, file: &str, kind: &str, devices: &[&str]) {
		let device_entries: Vec<String> = devices
			.iter()
			.map(|name| format!(r#"{{"name": "{name}"}}"#))
			.collect();
		let content = format!(
			r#"{{"cdiVersion": "0.5.0", "kind": "{kind}", "devices": [{}]}}"#,
			device_entries.join(", ")
		);
		fs::write(dir.join(file), content).unwrap();
	}

	fn manual_cache(dirs: &[&Path]) -> Cache {
		Cache::new(CacheConfig {
			spec_dirs: dirs.iter().map(|dir| dir.to_path_buf()).collect(),
			auto_refresh: false,
		})
	}

	#[test]
	fn same_file_duplicates_are_excluded_as_conflicts() {
		let dir = tempfile::tempdir().unwrap();
		write_descriptor(dir.path(), "dup.json", "acme.com/gpu", &["dev0", "dev0"]);

		let cache = manual_cache(&[dir.path()]);
		assert!(cache.device("acme.com/gpu=dev0").is_none());

		let errors = cache.errors();
		let recorded = errors.get(&dir.path().join("dup.json")).unwrap();
		assert!(recorded
			.iter()
			.any(|error| matches!(**error, CacheError::DeviceConflict { .. })));
	}

	#[test]
	fn default_config_uses_platform_directories() {
		let config = CacheConfig::default();
		assert_eq!(
			config.spec_dirs,
			[Path::new(DEFAULT_STATIC_DIR), Path::new(DEFAULT_DYNAMIC_DIR)]
		);
		assert!(config.auto_refresh);
	}

	#[test]
	fn write_spec_appends_default_extension() {
		let dir = tempfile::tempdir().unwrap();
		let cache = manual_cache(&[dir.path()]);

		let raw = schema::Spec {
			cdi_version: schema::CURRENT_VERSION.into(),
			kind: "acme.com/gpu".into(),
			container_edits: schema::ContainerEdits::default(),
			devices: vec![schema::Device {
				name: "dev0".into(),
				container_edits: schema::ContainerEdits::default(),
			}],
		};
		cache.write_spec(raw, "acme-devices").unwrap();

		assert!(dir.path().join("acme-devices.json").is_file());
	}

	#[test]
	fn write_spec_requires_a_directory() {
		let cache = manual_cache(&[]);
		let raw = schema::Spec {
			cdi_version: schema::CURRENT_VERSION.into(),
			kind: "acme.com/gpu".into(),
			container_edits: schema::ContainerEdits::default(),
			devices: Vec::new(),
		};
		let err = cache.write_spec(raw, "x").unwrap_err();
		assert!(matches!(err, CacheError::NoSpecDirs));
	}
}
