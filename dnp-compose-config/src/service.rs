use std::collections::BTreeMap;

use indexmap::IndexMap;
#[cfg(feature = "schemars")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ListOrMap, SingleValue, StringOrList, StringOrNum};

/// Defines a service of a package's compose document.
///
/// Fields are declared in lexicographic order so that serialized services are stable and
/// diff-friendly. Keys that are not modeled here are kept in [`Service::extensions`], which is
/// what allows the sanitizer to report them instead of silently losing them.
///
/// See more: https://docs.docker.com/reference/compose-file/services/
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(default)]
pub struct Service {
	/// Specifies additional container capabilities as strings.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cap_add: Option<Vec<String>>,

	/// Specifies container capabilities to drop as strings.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cap_drop: Option<Vec<String>>,

	/// Overrides the default command declared by the container image.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub command: Option<StringOrList>,

	/// The name of the container. Always derived from the package and service names.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub container_name: Option<String>,

	/// A list of device mappings in the `HOST_PATH:CONTAINER_PATH[:CGROUP_PERMISSIONS]` form.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub devices: Option<Vec<String>>,

	/// Custom DNS server for the container.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dns: Option<String>,

	/// Environment variables set in the container, either as a list or a map.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub environment: Option<Environment>,

	/// The image to start the container from.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub image: Option<String>,

	/// Metadata attached to the container, as `KEY=VALUE` lines or a map.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub labels: Option<ListOrMap>,

	/// Logging configuration for the service.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub logging: Option<Logging>,

	/// Sets the network mode of the container (`host`, `none`, `service:name`...).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub network_mode: Option<String>,

	/// The networks that the service containers are attached to.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub networks: Option<ServiceNetworks>,

	/// Port mappings in their short syntax (`[host:]container[/protocol]`).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ports: Option<Vec<StringOrNum>>,

	/// Runs the container with elevated privileges.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub privileged: Option<bool>,

	/// The policy that the platform applies on container termination.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub restart: Option<String>,

	/// Volume mappings in their short syntax (`host_or_name:container`).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub volumes: Option<Vec<String>>,

	/// Any other key present in the source document.
	#[serde(flatten)]
	pub extensions: BTreeMap<String, Value>,
}

/// Defines environment variables set in the container.
///
/// See more: https://docs.docker.com/reference/compose-file/services/#environment
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(untagged)]
pub enum Environment {
	/// `KEY=VALUE` lines.
	List(Vec<String>),
	/// A mapping of keys to scalar values. A key with no value is read as `None`.
	Map(IndexMap<String, Option<SingleValue>>),
}

impl Environment {
	pub fn is_empty(&self) -> bool {
		match self {
			Self::List(list) => list.is_empty(),
			Self::Map(map) => map.is_empty(),
		}
	}
}

impl Default for Environment {
	fn default() -> Self {
		Self::List(Vec::new())
	}
}

/// Logging configuration for a service.
///
/// See more: https://docs.docker.com/reference/compose-file/services/#logging
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(default)]
pub struct Logging {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub driver: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub options: Option<BTreeMap<String, StringOrNum>>,
}

/// The networks that a service is attached to.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(untagged)]
pub enum ServiceNetworks {
	List(Vec<String>),
	Map(BTreeMap<String, Option<ServiceNetworkSettings>>),
}

impl ServiceNetworks {
	pub fn is_empty(&self) -> bool {
		match self {
			Self::List(list) => list.is_empty(),
			Self::Map(map) => map.is_empty(),
		}
	}

	pub fn contains(&self, name: &str) -> bool {
		match self {
			Self::List(list) => list.iter().any(|n| n == name),
			Self::Map(map) => map.contains_key(name),
		}
	}

	/// Names of the attached networks, in declaration order.
	pub fn names(&self) -> Vec<&str> {
		match self {
			Self::List(list) => list.iter().map(String::as_str).collect(),
			Self::Map(map) => map.keys().map(String::as_str).collect(),
		}
	}

	/// Converts both forms into the map form, which can carry per-network settings.
	pub fn into_map(self) -> BTreeMap<String, Option<ServiceNetworkSettings>> {
		match self {
			Self::List(list) => list.into_iter().map(|name| (name, None)).collect(),
			Self::Map(map) => map,
		}
	}
}

/// Per-network settings of a service attachment.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(default)]
pub struct ServiceNetworkSettings {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub aliases: Option<Vec<String>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub ipv4_address: Option<String>,
}
