//! Aggregation and application of container edits.
//!
//! Injection collects the edits of every contributing descriptor and device
//! into one ordered [`ContainerEdits`] changeset, then applies it to the
//! target runtime specification in a single pass. Application is in-place
//! and infallible; all content validation happened at descriptor load.

use vessel_oci as oci;

use crate::schema;

/// Ordered aggregate of runtime-specification edits.
#[derive(Debug, Default)]
pub struct ContainerEdits {
	env: Vec<String>,
	device_nodes: Vec<schema::DeviceNode>,
	hooks: Vec<schema::Hook>,
	mounts: Vec<schema::Mount>,
}

impl ContainerEdits {
	/// Appends another edit fragment, preserving order.
	pub fn append(&mut self, other: &schema::ContainerEdits) {
		self.env.extend_from_slice(&other.env);
		self.device_nodes.extend_from_slice(&other.device_nodes);
		self.hooks.extend_from_slice(&other.hooks);
		self.mounts.extend_from_slice(&other.mounts);
	}

	/// Whether applying would change nothing.
	pub fn is_empty(&self) -> bool {
		self.env.is_empty()
			&& self.device_nodes.is_empty()
			&& self.hooks.is_empty()
			&& self.mounts.is_empty()
	}

	/// Applies the changeset to `spec` in place.
	///
	/// Environment entries replace an existing entry with the same key and
	/// append otherwise; device nodes, mounts, and hooks are appended
	/// without deduplication.
	pub fn apply(&self, spec: &mut oci::Spec) {
		if !self.env.is_empty() {
			let process = spec.process.get_or_insert_default();
			merge_env(&mut process.env, &self.env);
		}

		for node in &self.device_nodes {
			let linux = spec.linux.get_or_insert_default();
			linux.devices.push(device_node_to_oci(node));
		}

		for mount in &self.mounts {
			spec.mounts.push(mount_to_oci(mount));
		}

		if !self.hooks.is_empty() {
			let hooks = spec.hooks.get_or_insert_default();
			for hook in &self.hooks {
				let slot = match hook.hook_name.as_str() {
					"prestart" => &mut hooks.prestart,
					"createRuntime" => &mut hooks.create_runtime,
					"createContainer" => &mut hooks.create_container,
					"startContainer" => &mut hooks.start_container,
					"poststart" => &mut hooks.poststart,
					"poststop" => &mut hooks.poststop,
					// unreachable for loaded descriptors; validation
					// rejects unknown hook names
					_ => continue,
				};
				slot.push(hook_to_oci(hook));
			}
		}
	}
}

/// Merges `additions` into `target` with last-write-wins per key.
fn merge_env(target: &mut Vec<String>, additions: &[String]) {
	for addition in additions {
		let key = env_key(addition);
		match target.iter_mut().find(|entry| env_key(entry) == key) {
			Some(entry) => *entry = addition.clone(),
			None => target.push(addition.clone()),
		}
	}
}

/// The key of a `KEY=VALUE` entry; the value may itself contain `=`.
fn env_key(entry: &str) -> &str {
	entry.split_once('=').map_or(entry, |(key, _)| key)
}

fn device_node_to_oci(node: &schema::DeviceNode) -> oci::LinuxDevice {
	oci::LinuxDevice {
		path: node.path.clone(),
		device_type: node.node_type.clone().unwrap_or_default(),
		major: node.major.unwrap_or(0),
		minor: node.minor.unwrap_or(0),
		file_mode: node.file_mode,
		uid: node.uid,
		gid: node.gid,
	}
}

fn mount_to_oci(mount: &schema::Mount) -> oci::Mount {
	oci::Mount {
		destination: mount.container_path.clone(),
		mount_type: mount.mount_type.clone(),
		source: Some(mount.host_path.clone()),
		options: mount.options.clone(),
	}
}

fn hook_to_oci(hook: &schema::Hook) -> oci::Hook {
	oci::Hook {
		path: hook.path.clone(),
		args: hook.args.clone(),
		env: hook.env.clone(),
		timeout: hook.timeout,
	}
}
