#![cfg_attr(docsrs, feature(doc_auto_cfg))]
//! Typed representations of the compose documents that DAppNode packages ship.
//!
//! The model only covers the fields that the package manager understands. Everything else is
//! captured in flattened `extensions` maps, so that nothing a package author wrote is lost
//! before it has been inspected.

use std::collections::BTreeMap;

#[cfg(feature = "schemars")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

mod cleaning;
mod serde_utils;
mod service;

pub use cleaning::clean_compose;
pub use serde_utils::*;
pub use service::*;

pub(crate) type StringBTreeMap = BTreeMap<String, String>;

/// Errors produced while converting compose documents from or into text.
#[derive(Debug, Error)]
pub enum ComposeConfigError {
	#[error("Failed to deserialize the compose document: {0}")]
	Deserialization(#[source] serde_yaml_ng::Error),

	#[error("Failed to serialize the compose document: {0}")]
	Serialization(#[source] serde_yaml_ng::Error),

	#[error("Failed to convert the compose document: {0}")]
	Json(#[from] serde_json::Error),
}

/// A compose document, as shipped by a package or as committed to the container engine.
///
/// `services` is the only required key: a document without it is structurally invalid and
/// fails to deserialize.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
pub struct ComposeDocument {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,

	pub services: BTreeMap<String, Service>,

	#[serde(
		default,
		deserialize_with = "serde_utils::deserialize_nullable_map",
		skip_serializing_if = "BTreeMap::is_empty"
	)]
	pub volumes: BTreeMap<String, TopLevelVolume>,

	#[serde(
		default,
		deserialize_with = "serde_utils::deserialize_nullable_map",
		skip_serializing_if = "BTreeMap::is_empty"
	)]
	pub networks: BTreeMap<String, TopLevelNetwork>,

	#[serde(flatten)]
	pub extensions: BTreeMap<String, Value>,
}

impl ComposeDocument {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_yaml_str(yaml: &str) -> Result<Self, ComposeConfigError> {
		serde_yaml_ng::from_str(yaml).map_err(ComposeConfigError::Deserialization)
	}

	pub fn to_yaml_string(&self) -> Result<String, ComposeConfigError> {
		serde_yaml_ng::to_string(self).map_err(ComposeConfigError::Serialization)
	}

	pub fn from_json_value(value: Value) -> Result<Self, ComposeConfigError> {
		Ok(serde_json::from_value(value)?)
	}

	pub fn to_json_value(&self) -> Result<Value, ComposeConfigError> {
		Ok(serde_json::to_value(self)?)
	}
}

/// Volume declaration at the top level of a compose document.
///
/// See more: https://docs.docker.com/reference/compose-file/volumes/
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(default)]
pub struct TopLevelVolume {
	/// The volume already exists on the platform and its lifecycle is managed outside of the package.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub external: Option<bool>,

	/// Sets a custom name for the volume.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,

	/// Specifies which volume driver should be used.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub driver: Option<String>,

	/// Driver-dependent options. A bind-mounted volume carries `type`, `device` and `o` here.
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub driver_opts: BTreeMap<String, SingleValue>,

	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub labels: StringBTreeMap,

	#[serde(flatten)]
	pub extensions: BTreeMap<String, Value>,
}

impl TopLevelVolume {
	/// The host directory this volume is bound to, if it uses the local bind driver options.
	pub fn bind_device(&self) -> Option<String> {
		self.driver_opts
			.get("device")
			.map(ToString::to_string)
			.filter(|device| !device.is_empty())
	}
}

/// Network declaration at the top level of a compose document.
///
/// See more: https://docs.docker.com/reference/compose-file/networks/
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(default)]
pub struct TopLevelNetwork {
	/// The network's lifecycle is maintained outside of the package.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub external: Option<bool>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub driver: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub internal: Option<bool>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub attachable: Option<bool>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub ipam: Option<Ipam>,

	#[serde(flatten)]
	pub extensions: BTreeMap<String, Value>,
}

/// Specifies a custom IPAM configuration.
///
/// See more: https://docs.docker.com/reference/compose-file/networks/#ipam
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(default)]
pub struct Ipam {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub driver: Option<String>,

	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub config: Vec<IpamConfig>,
}

/// IPAM specific configurations.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Default)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(default)]
pub struct IpamConfig {
	/// Subnet in CIDR format that represents a network segment
	#[serde(skip_serializing_if = "Option::is_none")]
	pub subnet: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub ip_range: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub gateway: Option<String>,
}
