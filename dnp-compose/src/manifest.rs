use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use dnp_compose_config::StringOrList;

/// The classification of a package. Only `dncore` packages are trusted.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
	#[default]
	Service,
	Library,
	Dncore,
}

/// How the package manager follows the sync status of a blockchain client.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ChainDriver {
	Name(String),
	#[serde(rename_all = "camelCase")]
	Spec {
		driver: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		service_name: Option<String>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		port_number: Option<u16>,
	},
}

/// The subset of a package manifest the engine relies on.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
	pub name: String,
	pub version: String,
	#[serde(default, rename = "type")]
	pub package_type: PackageType,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub dependencies: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub avatar: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub origin: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub chain: Option<ChainDriver>,
}

impl Manifest {
	pub fn new(name: &str, version: &str, package_type: PackageType) -> Self {
		Self {
			name: name.to_string(),
			version: version.to_string(),
			package_type,
			..Default::default()
		}
	}

	pub fn is_core(&self) -> bool {
		self.package_type == PackageType::Dncore
	}
}

/// Manifests published before packages shipped a compose document. The single implicit
/// service is described inline in `image`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LegacyManifest {
	pub name: String,
	pub version: String,
	#[serde(default, rename = "type")]
	pub package_type: PackageType,
	#[serde(default)]
	pub image: LegacyImage,
}

impl LegacyManifest {
	pub fn is_core(&self) -> bool {
		self.package_type == PackageType::Dncore
	}
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct LegacyImage {
	pub ports: Vec<String>,
	pub environment: Vec<String>,
	pub volumes: Vec<String>,
	/// Deprecated. Declaring any entry here is rejected.
	pub external_vol: Vec<String>,
	pub restart: Option<String>,
	pub privileged: Option<bool>,
	pub cap_add: Vec<String>,
	pub cap_drop: Vec<String>,
	pub devices: Vec<String>,
	pub network_mode: Option<String>,
	pub command: Option<StringOrList>,
	pub labels: BTreeMap<String, String>,
	/// Fixed address on the private network. Only honored for core packages.
	pub ipv4_address: Option<String>,
}
