//! Device descriptor discovery and injection cache.
//!
//! This crate implements the Container Device Interface side of vessel: it
//! discovers device descriptor files in a set of ranked directories, merges
//! them into a queryable in-memory registry, resolves naming conflicts
//! deterministically, keeps the registry current by watching the
//! directories, and injects the runtime-configuration fragments of chosen
//! devices into a container's runtime specification right before the
//! container is created.
//!
//! # Descriptor directories
//!
//! Descriptors are `.json` or `.yaml` files. The configured directory list
//! is ordered by ascending priority: a descriptor's priority is the index
//! of its directory, later directories override earlier ones, and equal
//! priorities defining the same device exclude that device outright. The
//! platform defaults are [`DEFAULT_STATIC_DIR`] and [`DEFAULT_DYNAMIC_DIR`].
//!
//! # Example
//!
//! ```no_run
//! use vessel_cdi::{Cache, CacheConfig};
//!
//! let cache = Cache::new(CacheConfig::default());
//!
//! let mut spec = vessel_oci::Spec::default();
//! cache.inject_devices(&mut spec, &["vendor.example.com/gpu=gpu0"])?;
//! # Ok::<(), vessel_cdi::UnresolvedDevices>(())
//! ```

pub mod cache;
pub mod device;
pub mod edits;
pub mod error;
pub mod qualified;
pub mod schema;
pub mod spec;

mod scan;
mod watch;

pub use cache::{
	Cache, CacheConfig, DEFAULT_DYNAMIC_DIR, DEFAULT_STATIC_DIR, default_spec_dirs,
};
pub use device::Device;
pub use edits::ContainerEdits;
pub use error::{CacheError, RefreshErrors, Result, UnresolvedDevices};
pub use qualified::{is_qualified_name, parse_device, parse_qualified_name, qualified_name};
pub use spec::Spec;
