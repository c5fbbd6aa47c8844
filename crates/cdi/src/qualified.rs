//! Qualified device names.
//!
//! A device is addressed as `vendor/class=name`, e.g.
//! `vendor.example.com/gpu=gpu0`. The qualified name is the sole registry
//! key: lookup, listing, conflict detection, and injection all operate on
//! it.

use crate::error::CacheError;

/// Forms the qualified name for a device.
pub fn qualified_name(vendor: &str, class: &str, name: &str) -> String {
	format!("{vendor}/{class}={name}")
}

/// Whether `device` is a valid, fully qualified device name.
pub fn is_qualified_name(device: &str) -> bool {
	parse_qualified_name(device).is_ok()
}

/// Parses a fully qualified device name into `(vendor, class, name)`.
///
/// Rejects unqualified references and names with invalid components.
pub fn parse_qualified_name(device: &str) -> Result<(String, String, String), CacheError> {
	let (vendor, class, name) = parse_device(device);

	let reject = |reason: String| CacheError::InvalidQualifiedName {
		name: device.to_string(),
		reason,
	};

	if vendor.is_empty() {
		return Err(reject("missing vendor".into()));
	}
	if class.is_empty() {
		return Err(reject("missing class".into()));
	}
	if name.is_empty() {
		return Err(reject("missing device name".into()));
	}

	validate_vendor_name(vendor).map_err(&reject)?;
	validate_class_name(class).map_err(&reject)?;
	validate_device_name(name).map_err(&reject)?;

	Ok((vendor.to_string(), class.to_string(), name.to_string()))
}

/// Splits a device reference into `(vendor, class, name)`.
///
/// Returns empty vendor and class if the reference is not qualified; no
/// component validation is performed.
pub fn parse_device(device: &str) -> (&str, &str, &str) {
	if device.is_empty() || device.starts_with('/') {
		return ("", "", device);
	}
	match device.split_once('=') {
		Some((kind, name)) if !kind.is_empty() && !name.is_empty() => {
			let (vendor, class) = parse_qualifier(kind);
			if vendor.is_empty() {
				("", "", device)
			} else {
				(vendor, class, name)
			}
		}
		_ => ("", "", device),
	}
}

/// Splits a `vendor/class` qualifier.
///
/// Returns an empty vendor (and the full input as class) if the qualifier is
/// not well formed.
pub fn parse_qualifier(kind: &str) -> (&str, &str) {
	match kind.split_once('/') {
		Some((vendor, class)) if !vendor.is_empty() && !class.is_empty() => (vendor, class),
		_ => ("", kind),
	}
}

/// Vendor names look like reversed domains: they must start with a letter,
/// end with a letter or digit, and may contain `-`, `_`, and `.` in between.
pub(crate) fn validate_vendor_name(vendor: &str) -> Result<(), String> {
	validate_component(vendor, "vendor", &['-', '_', '.'])
}

/// Class names follow the vendor rules minus the dot.
pub(crate) fn validate_class_name(class: &str) -> Result<(), String> {
	validate_component(class, "class", &['-', '_'])
}

/// Device names may additionally contain `.` and `:`.
pub(crate) fn validate_device_name(name: &str) -> Result<(), String> {
	if name.is_empty() {
		return Err("empty device name".into());
	}
	for c in name.chars() {
		if !c.is_ascii_alphanumeric() && !['-', '_', '.', ':'].contains(&c) {
			return Err(format!("invalid character {c:?} in device name {name:?}"));
		}
	}
	Ok(())
}

fn validate_component(value: &str, what: &str, extra: &[char]) -> Result<(), String> {
	let mut chars = value.chars();
	let Some(first) = chars.next() else {
		return Err(format!("empty {what}"));
	};
	if !first.is_ascii_alphabetic() {
		return Err(format!("{what} {value:?} must start with a letter"));
	}
	let mut last = first;
	for c in chars {
		if !c.is_ascii_alphanumeric() && !extra.contains(&c) {
			return Err(format!("invalid character {c:?} in {what} {value:?}"));
		}
		last = c;
	}
	if !last.is_ascii_alphanumeric() {
		return Err(format!("{what} {value:?} must end with a letter or digit"));
	}
	Ok(())
}
