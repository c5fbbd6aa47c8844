//! OCI runtime specification data model.
//!
//! Serde types for the container runtime configuration document that the
//! container-launch path consumes. Vessel builds and edits this document;
//! only the subset of the runtime specification that vessel actually touches
//! is modelled here. All fields serialize with the camelCase names the
//! on-disk format mandates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root of the runtime configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
	/// Version of the runtime specification this document conforms to.
	#[serde(default)]
	pub oci_version: String,
	/// The container process to run.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub process: Option<Process>,
	/// The container root filesystem.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub root: Option<Root>,
	/// Hostname inside the container.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub hostname: Option<String>,
	/// Additional filesystem mounts, applied in order.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub mounts: Vec<Mount>,
	/// Lifecycle hooks, run by the runtime at fixed points.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub hooks: Option<Hooks>,
	/// Arbitrary metadata attached to the container.
	#[serde(default, skip_serializing_if = "HashMap::is_empty")]
	pub annotations: HashMap<String, String>,
	/// Linux platform configuration.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub linux: Option<Linux>,
}

/// The process started inside the container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
	/// Whether a terminal is attached to the process.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub terminal: Option<bool>,
	/// Command and arguments.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub args: Vec<String>,
	/// Environment in `KEY=VALUE` form.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub env: Vec<String>,
	/// Working directory of the process.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub cwd: String,
}

/// The container root filesystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Root {
	/// Path to the root filesystem.
	pub path: String,
	/// Whether the root is mounted read-only.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub readonly: Option<bool>,
}

/// One filesystem mount.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
	/// Mount point inside the container.
	pub destination: String,
	/// Filesystem type.
	#[serde(rename = "type", skip_serializing_if = "Option::is_none")]
	pub mount_type: Option<String>,
	/// Source on the host.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,
	/// Mount options.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub options: Vec<String>,
}

/// Lifecycle hooks grouped by the point at which the runtime invokes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hooks {
	/// Run before the container process is started (deprecated upstream,
	/// still honored).
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub prestart: Vec<Hook>,
	/// Run during runtime creation, in the runtime namespace.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub create_runtime: Vec<Hook>,
	/// Run after the runtime environment is created, in the container
	/// namespace.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub create_container: Vec<Hook>,
	/// Run as part of container start, in the container namespace.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub start_container: Vec<Hook>,
	/// Run after the container process has started.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub poststart: Vec<Hook>,
	/// Run after the container process has exited.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub poststop: Vec<Hook>,
}

/// One lifecycle hook invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
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

/// Linux platform configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Linux {
	/// Device nodes created inside the container.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub devices: Vec<LinuxDevice>,
}

/// One device node to create inside the container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxDevice {
	/// Path of the node inside the container.
	pub path: String,
	/// Device type: `c`, `b`, `u`, or `p`.
	#[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
	pub device_type: String,
	/// Major device number.
	#[serde(default)]
	pub major: i64,
	/// Minor device number.
	#[serde(default)]
	pub minor: i64,
	/// File mode of the node.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub file_mode: Option<u32>,
	/// Owning user id.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub uid: Option<u32>,
	/// Owning group id.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gid: Option<u32>,
}
