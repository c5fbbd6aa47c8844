//! Loaded device descriptors.
//!
//! A [`Spec`] is one descriptor file pulled into memory: its parsed content
//! plus the path it came from and the priority derived from its directory's
//! position in the configured directory list. Descriptors are value-like;
//! every refresh rebuilds them from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CacheError;
use crate::qualified::{
	parse_qualifier, validate_class_name, validate_device_name, validate_vendor_name,
};
use crate::schema;

/// File extensions recognized as descriptor encodings.
pub(crate) const SUPPORTED_EXTENSIONS: &[&str] = &["json", "yaml"];

/// Whether `path` has one of the supported descriptor extensions.
pub(crate) fn is_descriptor_path(path: &Path) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
}

/// One descriptor file loaded into memory.
#[derive(Debug)]
pub struct Spec {
	raw: schema::Spec,
	vendor: String,
	class: String,
	path: PathBuf,
	priority: usize,
}

impl Spec {
	/// Reads, decodes, and validates the descriptor at `path`.
	///
	/// The encoding is chosen by file extension; `priority` is the index of
	/// the owning directory in the configured directory list.
	pub fn load(path: &Path, priority: usize) -> Result<Self, CacheError> {
		let bytes = fs::read(path).map_err(|err| CacheError::SpecRead {
			path: path.to_path_buf(),
			reason: err.to_string(),
		})?;
		let raw = decode(path, &bytes)?;
		Self::new(raw, path.to_path_buf(), priority)
	}

	/// Wraps already-decoded descriptor content, validating it.
	pub fn new(raw: schema::Spec, path: PathBuf, priority: usize) -> Result<Self, CacheError> {
		validate(&raw, &path)?;
		let (vendor, class) = parse_qualifier(&raw.kind);
		Ok(Self {
			vendor: vendor.to_string(),
			class: class.to_string(),
			raw,
			path,
			priority,
		})
	}

	/// The decoded file content.
	pub fn raw(&self) -> &schema::Spec {
		&self.raw
	}

	/// Vendor part of the descriptor's kind.
	pub fn vendor(&self) -> &str {
		&self.vendor
	}

	/// Class part of the descriptor's kind.
	pub fn class(&self) -> &str {
		&self.class
	}

	/// Path of the file this descriptor was loaded from (or will be written
	/// to).
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Priority of the descriptor, i.e. the index of its directory in the
	/// configured directory list. Higher wins.
	pub fn priority(&self) -> usize {
		self.priority
	}

	/// The descriptor-level edits, applied once per descriptor at injection.
	pub fn edits(&self) -> &schema::ContainerEdits {
		&self.raw.container_edits
	}

	/// Serializes the descriptor back to its path, choosing the encoding by
	/// extension and creating parent directories as needed.
	pub fn write(&self, overwrite: bool) -> Result<(), CacheError> {
		if !overwrite && self.path.exists() {
			return Err(CacheError::SpecExists {
				path: self.path.clone(),
			});
		}

		let write_err = |reason: String| CacheError::SpecWrite {
			path: self.path.clone(),
			reason,
		};

		let data = if is_yaml(&self.path) {
			serde_yaml::to_string(&self.raw)
				.map(String::into_bytes)
				.map_err(|err| write_err(err.to_string()))?
		} else {
			serde_json::to_vec_pretty(&self.raw).map_err(|err| write_err(err.to_string()))?
		};

		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent).map_err(|err| write_err(err.to_string()))?;
		}
		fs::write(&self.path, data).map_err(|err| write_err(err.to_string()))
	}
}

fn is_yaml(path: &Path) -> bool {
	path.extension().and_then(|ext| ext.to_str()) == Some("yaml")
}

fn decode(path: &Path, bytes: &[u8]) -> Result<schema::Spec, CacheError> {
	let parse_err = |reason: String| CacheError::SpecParse {
		path: path.to_path_buf(),
		reason,
	};
	if is_yaml(path) {
		serde_yaml::from_slice(bytes).map_err(|err| parse_err(err.to_string()))
	} else {
		serde_json::from_slice(bytes).map_err(|err| parse_err(err.to_string()))
	}
}

/// Structural validation of decoded content.
///
/// Duplicate device names within one file are deliberately accepted here;
/// the cache's conflict resolution excludes them like any other
/// equal-priority collision.
fn validate(raw: &schema::Spec, path: &Path) -> Result<(), CacheError> {
	let invalid = |reason: String| CacheError::SpecInvalid {
		path: path.to_path_buf(),
		reason,
	};

	if !schema::is_known_version(&raw.cdi_version) {
		return Err(invalid(format!(
			"unsupported cdiVersion {:?}",
			raw.cdi_version
		)));
	}

	let (vendor, class) = parse_qualifier(&raw.kind);
	if vendor.is_empty() || class.is_empty() {
		return Err(invalid(format!("invalid kind {:?}", raw.kind)));
	}
	validate_vendor_name(vendor).map_err(&invalid)?;
	validate_class_name(class).map_err(&invalid)?;

	validate_edits(&raw.container_edits).map_err(&invalid)?;
	for device in &raw.devices {
		validate_device_name(&device.name)
			.map_err(|reason| invalid(format!("device {:?}: {reason}", device.name)))?;
		validate_edits(&device.container_edits)
			.map_err(|reason| invalid(format!("device {:?}: {reason}", device.name)))?;
	}

	Ok(())
}

fn validate_edits(edits: &schema::ContainerEdits) -> Result<(), String> {
	for hook in &edits.hooks {
		if !schema::HOOK_NAMES.contains(&hook.hook_name.as_str()) {
			return Err(format!("unknown hook {:?}", hook.hook_name));
		}
		if hook.path.is_empty() {
			return Err(format!("hook {:?} with empty path", hook.hook_name));
		}
	}
	for node in &edits.device_nodes {
		if node.path.is_empty() {
			return Err("device node with empty path".into());
		}
	}
	for mount in &edits.mounts {
		if mount.host_path.is_empty() || mount.container_path.is_empty() {
			return Err("mount with empty host or container path".into());
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn minimal(kind: &str) -> schema::Spec {
		schema::Spec {
			cdi_version: schema::CURRENT_VERSION.into(),
			kind: kind.into(),
			devices: vec![schema::Device {
				name: "dev0".into(),
				container_edits: schema::ContainerEdits::default(),
			}],
			container_edits: schema::ContainerEdits::default(),
		}
	}

	#[test]
	fn test_new_extracts_vendor_and_class() {
		let spec = Spec::new(minimal("acme.com/gpu"), PathBuf::from("/etc/cdi/acme.json"), 0)
			.unwrap();
		assert_eq!(spec.vendor(), "acme.com");
		assert_eq!(spec.class(), "gpu");
		assert_eq!(spec.priority(), 0);
	}

	#[test]
	fn test_rejects_unknown_version() {
		let mut raw = minimal("acme.com/gpu");
		raw.cdi_version = "42.0.0".into();
		let err = Spec::new(raw, PathBuf::from("/etc/cdi/acme.json"), 0).unwrap_err();
		assert!(matches!(err, CacheError::SpecInvalid { .. }));
	}

	#[test]
	fn test_rejects_bad_kind() {
		for kind in ["noslash", "/class", "vendor/", "vendor/cl.ass"] {
			let err = Spec::new(minimal(kind), PathBuf::from("/etc/cdi/x.json"), 0).unwrap_err();
			assert!(matches!(err, CacheError::SpecInvalid { .. }), "kind {kind:?}");
		}
	}

	#[test]
	fn test_rejects_unknown_hook() {
		let mut raw = minimal("acme.com/gpu");
		raw.devices[0].container_edits.hooks.push(schema::Hook {
			hook_name: "preLaunch".into(),
			path: "/bin/hook".into(),
			args: Vec::new(),
			env: Vec::new(),
			timeout: None,
		});
		let err = Spec::new(raw, PathBuf::from("/etc/cdi/x.json"), 0).unwrap_err();
		assert!(err.to_string().contains("preLaunch"));
	}

	#[test]
	fn test_accepts_duplicate_device_names() {
		// Same-name entries are resolved (and excluded) by the cache, not
		// rejected at load.
		let mut raw = minimal("acme.com/gpu");
		raw.devices.push(raw.devices[0].clone());
		assert!(Spec::new(raw, PathBuf::from("/etc/cdi/x.json"), 0).is_ok());
	}

	#[test]
	fn test_load_json_and_yaml() {
		let dir = tempfile::tempdir().unwrap();
		let json_path = dir.path().join("a.json");
		fs::write(
			&json_path,
			r#"{"cdiVersion": "0.5.0", "kind": "acme.com/gpu", "devices": [{"name": "d0"}]}"#,
		)
		.unwrap();
		let yaml_path = dir.path().join("b.yaml");
		fs::write(
			&yaml_path,
			"cdiVersion: \"0.5.0\"\nkind: acme.com/net\ndevices:\n  - name: d1\n",
		)
		.unwrap();

		let json_spec = Spec::load(&json_path, 1).unwrap();
		assert_eq!(json_spec.class(), "gpu");
		assert_eq!(json_spec.priority(), 1);

		let yaml_spec = Spec::load(&yaml_path, 0).unwrap();
		assert_eq!(yaml_spec.class(), "net");
	}

	#[test]
	fn test_load_reports_parse_failures() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("broken.json");
		fs::write(&path, "{ not json").unwrap();
		let err = Spec::load(&path, 0).unwrap_err();
		assert!(matches!(err, CacheError::SpecParse { .. }));
	}

	#[test]
	fn test_write_round_trips() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("acme.yaml");
		let spec = Spec::new(minimal("acme.com/gpu"), path.clone(), 0).unwrap();
		spec.write(false).unwrap();

		let again = Spec::load(&path, 0).unwrap();
		assert_eq!(again.raw(), spec.raw());

		// a second non-overwriting write refuses
		let err = spec.write(false).unwrap_err();
		assert!(matches!(err, CacheError::SpecExists { .. }));
	}

	#[test]
	fn test_descriptor_path_filter() {
		assert!(is_descriptor_path(Path::new("/etc/cdi/a.json")));
		assert!(is_descriptor_path(Path::new("/etc/cdi/a.yaml")));
		assert!(!is_descriptor_path(Path::new("/etc/cdi/a.yml")));
		assert!(!is_descriptor_path(Path::new("/etc/cdi/a.conf")));
		assert!(!is_descriptor_path(Path::new("/etc/cdi/json")));
	}
}
