//! Device entries resolved from descriptors.

use std::sync::Arc;

use crate::qualified::qualified_name;
use crate::schema;
use crate::spec::Spec;

/// One named device inside a descriptor.
///
/// A device does not own its descriptor; it holds a shared handle back to
/// the [`Spec`] it came from plus its index within that descriptor's device
/// list, so priority and path are read through the handle when needed.
#[derive(Debug, Clone)]
pub struct Device {
	spec: Arc<Spec>,
	index: usize,
}

impl Device {
	pub(crate) fn new(spec: Arc<Spec>, index: usize) -> Self {
		Self { spec, index }
	}

	/// All devices of a descriptor, in file order.
	pub(crate) fn all(spec: &Arc<Spec>) -> impl Iterator<Item = Self> + '_ {
		(0..spec.raw().devices.len()).map(move |index| Self::new(Arc::clone(spec), index))
	}

	/// Looks up a device of `spec` by its unqualified name.
	pub fn from_spec(spec: &Arc<Spec>, name: &str) -> Option<Self> {
		spec.raw()
			.devices
			.iter()
			.position(|device| device.name == name)
			.map(|index| Self::new(Arc::clone(spec), index))
	}

	/// The descriptor this device came from.
	pub fn spec(&self) -> &Arc<Spec> {
		&self.spec
	}

	fn raw(&self) -> &schema::Device {
		&self.spec.raw().devices[self.index]
	}

	/// The device's unqualified name.
	pub fn name(&self) -> &str {
		&self.raw().name
	}

	/// The device's `vendor/class=name` registry key.
	pub fn qualified_name(&self) -> String {
		qualified_name(self.spec.vendor(), self.spec.class(), self.name())
	}

	/// The device-level edits applied when this device is injected.
	pub fn edits(&self) -> &schema::ContainerEdits {
		&self.raw().container_edits
	}
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use super::*;

	fn spec_with_devices(names: &[&str]) -> Arc<Spec> {
		let raw = schema::Spec {
			cdi_version: schema::CURRENT_VERSION.into(),
			kind: "acme.com/gpu".into(),
			container_edits: schema::ContainerEdits::default(),
			devices: names
				.iter()
				.map(|name| schema::Device {
					name: (*name).into(),
					container_edits: schema::ContainerEdits::default(),
				})
				.collect(),
		};
		Arc::new(Spec::new(raw, PathBuf::from("/etc/cdi/acme.json"), 0).unwrap())
	}

	#[test]
	fn qualified_names_follow_descriptor_kind() {
		let spec = spec_with_devices(&["a", "b"]);
		let names: Vec<String> = Device::all(&spec).map(|d| d.qualified_name()).collect();
		assert_eq!(names, ["acme.com/gpu=a", "acme.com/gpu=b"]);
	}

	#[test]
	fn lookup_by_name() {
		let spec = spec_with_devices(&["a", "b"]);
		assert_eq!(Device::from_spec(&spec, "b").unwrap().name(), "b");
		assert!(Device::from_spec(&spec, "c").is_none());
	}
}
