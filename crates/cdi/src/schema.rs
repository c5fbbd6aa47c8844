//! On-disk descriptor schema.
//!
//! Serde model of one device descriptor file. A descriptor declares one or
//! more devices for a single `vendor/class` pair, together with the runtime
//! edits to apply when a device is injected. Field names serialize as the
//! camelCase identifiers the file format mandates.
//!
//! Priority is deliberately absent from this model: a descriptor's priority
//! is derived solely from the position of its containing directory in the
//! configured directory list.

use serde::{Deserialize, Serialize};

/// The descriptor format version written by default.
pub const CURRENT_VERSION: &str = "0.5.0";

/// Format versions this implementation accepts.
const KNOWN_VERSIONS: &[&str] = &["0.1.0", "0.2.0", "0.3.0", "0.4.0", "0.5.0"];

/// Hook names the runtime specification defines, in lifecycle order.
pub(crate) const HOOK_NAMES: &[&str] = &[
	"prestart",
	"createRuntime",
	"createContainer",
	"startContainer",
	"poststart",
	"poststop",
];

pub(crate) fn is_known_version(version: &str) -> bool {
	KNOWN_VERSIONS.contains(&version)
}

/// One descriptor file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
	/// Descriptor format version, e.g. `"0.5.0"`.
	pub cdi_version: String,
	/// The `vendor/class` pair all devices in this file belong to.
	pub kind: String,
	/// Edits applied once per descriptor when any of its devices is
	/// injected.
	#[serde(default, skip_serializing_if = "ContainerEdits::is_empty")]
	pub container_edits: ContainerEdits,
	/// The devices this descriptor declares, in file order.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub devices: Vec<Device>,
}

/// One device entry inside a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
	/// Device name, unique within its descriptor's `vendor/class`.
	pub name: String,
	/// Edits applied when this device is injected.
	#[serde(default, skip_serializing_if = "ContainerEdits::is_empty")]
	pub container_edits: ContainerEdits,
}

/// Runtime-specification fragments contributed by a descriptor or device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerEdits {
	/// Environment additions in `KEY=VALUE` form.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub env: Vec<String>,
	/// Device nodes to create inside the container.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub device_nodes: Vec<DeviceNode>,
	/// Lifecycle hooks to register.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub hooks: Vec<Hook>,
	/// Filesystem mounts to add.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub mounts: Vec<Mount>,
}

impl ContainerEdits {
	/// Whether these edits would change nothing.
	pub fn is_empty(&self) -> bool {
		self.env.is_empty()
			&& self.device_nodes.is_empty()
			&& self.hooks.is_empty()
			&& self.mounts.is_empty()
	}
}

/// A device node to expose inside the container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceNode {
	/// Path of the node inside the container.
	pub path: String,
	/// Path of the node on the host, when it differs from `path`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub host_path: Option<String>,
	/// Device type: `c`, `b`, `u`, or `p`.
	#[serde(rename = "type", skip_serializing_if = "Option::is_none")]
	pub node_type: Option<String>,
	/// Major device number.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub major: Option<i64>,
	/// Minor device number.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub minor: Option<i64>,
	/// File mode of the node.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub file_mode: Option<u32>,
	/// Cgroup access permissions, e.g. `"rwm"`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub permissions: Option<String>,
	/// Owning user id.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub uid: Option<u32>,
	/// Owning group id.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gid: Option<u32>,
}

/// One lifecycle hook contributed by a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
	/// Which lifecycle point to attach to; one of the runtime
	/// specification's hook names.
	pub hook_name: String,
	/// Absolute path of the hook binary on the host.
	pub path: String,
	/// Arguments, including `argv[0]`.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub args: Vec<String>,
	/// Environment in `KEY=VALUE` form.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub env: Vec<String>,
	/// Timeout in seconds.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timeout: Option<i64>,
}

/// One filesystem mount contributed by a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
	/// Source path on the host.
	pub host_path: String,
	/// Mount point inside the container.
	pub container_path: String,
	/// Filesystem type.
	#[serde(rename = "type", skip_serializing_if = "Option::is_none")]
	pub mount_type: Option<String>,
	/// Mount options.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub options: Vec<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	const JSON: &str = r#"{
		"cdiVersion": "0.5.0",
		"kind": "vendor.example.com/gpu",
		"containerEdits": {
			"env": ["VENDOR_VISIBLE_DEVICES=all"]
		},
		"devices": [
			{
				"name": "gpu0",
				"containerEdits": {
					"deviceNodes": [
						{"path": "/dev/gpu0", "type": "c", "major": 226, "minor": 0}
					],
					"hooks": [
						{"hookName": "createContainer", "path": "/usr/bin/gpu-hook"}
					],
					"mounts": [
						{"hostPath": "/usr/lib/gpu", "containerPath": "/usr/lib/gpu", "options": ["ro"]}
					]
				}
			}
		]
	}"#;

	#[test]
	fn test_parse_descriptor_json() {
		let spec: Spec = serde_json::from_str(JSON).unwrap();
		assert_eq!(spec.cdi_version, "0.5.0");
		assert_eq!(spec.kind, "vendor.example.com/gpu");
		assert_eq!(spec.container_edits.env, ["VENDOR_VISIBLE_DEVICES=all"]);
		assert_eq!(spec.devices.len(), 1);

		let device = &spec.devices[0];
		assert_eq!(device.name, "gpu0");
		assert_eq!(device.container_edits.device_nodes[0].path, "/dev/gpu0");
		assert_eq!(device.container_edits.device_nodes[0].major, Some(226));
		assert_eq!(device.container_edits.hooks[0].hook_name, "createContainer");
		assert_eq!(device.container_edits.mounts[0].options, ["ro"]);
	}

	#[test]
	fn test_parse_descriptor_yaml() {
		let yaml = r#"
cdiVersion: "0.5.0"
kind: vendor.example.com/gpu
devices:
  - name: gpu0
    containerEdits:
      deviceNodes:
        - path: /dev/gpu0
"#;
		let spec: Spec = serde_yaml::from_str(yaml).unwrap();
		assert_eq!(spec.kind, "vendor.example.com/gpu");
		assert_eq!(spec.devices[0].container_edits.device_nodes[0].path, "/dev/gpu0");
		assert!(spec.container_edits.is_empty());
	}

	#[test]
	fn test_empty_edits_are_skipped_on_write() {
		let spec = Spec {
			cdi_version: CURRENT_VERSION.into(),
			kind: "vendor.example.com/gpu".into(),
			devices: vec![Device {
				name: "gpu0".into(),
				container_edits: ContainerEdits::default(),
			}],
			container_edits: ContainerEdits::default(),
		};
		let json = serde_json::to_value(&spec).unwrap();
		assert!(json.get("containerEdits").is_none());
		assert!(json["devices"][0].get("containerEdits").is_none());
	}

	#[test]
	fn test_version_knowledge() {
		assert!(is_known_version(CURRENT_VERSION));
		assert!(is_known_version("0.3.0"));
		assert!(!is_known_version("9.9.9"));
		assert!(!is_known_version(""));
	}
}
