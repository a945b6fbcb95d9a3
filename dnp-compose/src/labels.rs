//! Values that must travel with a container, stored in its labels under `dappnode.dnp.`.
//!
//! Labels are best-effort data written by older versions too: a missing, empty or malformed
//! entry always decodes to "unknown", never to an error.

use std::collections::BTreeMap;

use dnp_compose_config::{ComposeDocument, ListOrMap, Service, StringOrNum};
use serde::de::DeserializeOwned;

use crate::{ChainDriver, Manifest, environment::parse_environment, stringify_environment};

pub type Labels = BTreeMap<String, String>;

pub const LABEL_PREFIX: &str = "dappnode.dnp.";

pub const DEFAULT_ENVIRONMENT_LABEL: &str = "dappnode.dnp.default.environment";
pub const DEFAULT_PORTS_LABEL: &str = "dappnode.dnp.default.ports";
pub const DEFAULT_VOLUMES_LABEL: &str = "dappnode.dnp.default.volumes";

pub const DNP_NAME_LABEL: &str = "dappnode.dnp.dnpName";
pub const VERSION_LABEL: &str = "dappnode.dnp.version";
pub const SERVICE_NAME_LABEL: &str = "dappnode.dnp.serviceName";
pub const DEPENDENCIES_LABEL: &str = "dappnode.dnp.dependencies";
pub const AVATAR_LABEL: &str = "dappnode.dnp.avatar";
pub const ORIGIN_LABEL: &str = "dappnode.dnp.origin";
pub const CHAIN_LABEL: &str = "dappnode.dnp.chain";
pub const IS_CORE_LABEL: &str = "dappnode.dnp.isCore";

/// Set on top-level volume declarations that were bound through the blanket mountpoint setting.
pub const ALL_NAMED_VOLUMES_MOUNTPOINT_LABEL: &str = "dappnode.dnp.allNamedVolumesMountpoint";

/// The environment, ports and volumes of a service as shipped, before any user change.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ServiceDefaults {
	pub environment: Option<Vec<String>>,
	pub ports: Option<Vec<String>>,
	pub volumes: Option<Vec<String>>,
}

impl ServiceDefaults {
	/// Snapshot of the current values of a service.
	pub fn from_service(service: &Service) -> Self {
		Self {
			environment: service
				.environment
				.as_ref()
				.map(|env| stringify_environment(&parse_environment(env))),
			ports: service
				.ports
				.as_ref()
				.map(|ports| ports.iter().map(ToString::to_string).collect()),
			volumes: service.volumes.clone(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.environment.is_none() && self.ports.is_none() && self.volumes.is_none()
	}
}

pub fn write_defaults_to_labels(defaults: &ServiceDefaults) -> Labels {
	let mut labels = Labels::new();

	for (key, value) in [
		(DEFAULT_ENVIRONMENT_LABEL, &defaults.environment),
		(DEFAULT_PORTS_LABEL, &defaults.ports),
		(DEFAULT_VOLUMES_LABEL, &defaults.volumes),
	] {
		if let Some(value) = value
			&& let Ok(json) = serde_json::to_string(value)
		{
			labels.insert(key.to_string(), json);
		}
	}

	labels
}

pub fn read_defaults_from_labels(labels: &Labels) -> ServiceDefaults {
	ServiceDefaults {
		environment: read_string_list(labels, DEFAULT_ENVIRONMENT_LABEL),
		ports: read_string_list(labels, DEFAULT_PORTS_LABEL),
		volumes: read_string_list(labels, DEFAULT_VOLUMES_LABEL),
	}
}

fn read_json<T: DeserializeOwned>(labels: &Labels, key: &str) -> Option<T> {
	let raw = labels.get(key)?;

	if raw.trim().is_empty() {
		return None;
	}

	serde_json::from_str(raw).ok()
}

/// Older writers stored ports as numbers, so scalars of both kinds are accepted.
fn read_string_list(labels: &Labels, key: &str) -> Option<Vec<String>> {
	read_json::<Vec<StringOrNum>>(labels, key)
		.map(|list| list.iter().map(ToString::to_string).collect())
}

/// Package-level information attached to every container of a package.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PackageMetadata {
	pub dnp_name: Option<String>,
	pub version: Option<String>,
	pub service_name: Option<String>,
	pub dependencies: BTreeMap<String, String>,
	pub avatar: Option<String>,
	pub origin: Option<String>,
	pub chain: Option<ChainDriver>,
	pub is_core: bool,
}

impl PackageMetadata {
	pub fn from_manifest(manifest: &Manifest, service_name: &str) -> Self {
		Self {
			dnp_name: Some(manifest.name.clone()),
			version: Some(manifest.version.clone()),
			service_name: Some(service_name.to_string()),
			dependencies: manifest.dependencies.clone(),
			avatar: manifest.avatar.clone(),
			origin: manifest.origin.clone(),
			chain: manifest.chain.clone(),
			is_core: manifest.is_core(),
		}
	}
}

pub fn write_metadata_to_labels(metadata: &PackageMetadata) -> Labels {
	let mut labels = Labels::new();

	for (key, value) in [
		(DNP_NAME_LABEL, &metadata.dnp_name),
		(VERSION_LABEL, &metadata.version),
		(SERVICE_NAME_LABEL, &metadata.service_name),
		(AVATAR_LABEL, &metadata.avatar),
		(ORIGIN_LABEL, &metadata.origin),
	] {
		if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
			labels.insert(key.to_string(), value.clone());
		}
	}

	if !metadata.dependencies.is_empty()
		&& let Ok(json) = serde_json::to_string(&metadata.dependencies)
	{
		labels.insert(DEPENDENCIES_LABEL.to_string(), json);
	}

	match &metadata.chain {
		Some(ChainDriver::Name(name)) => {
			labels.insert(CHAIN_LABEL.to_string(), name.clone());
		}
		Some(spec) => {
			if let Ok(json) = serde_json::to_string(spec) {
				labels.insert(CHAIN_LABEL.to_string(), json);
			}
		}
		None => {}
	}

	labels.insert(IS_CORE_LABEL.to_string(), metadata.is_core.to_string());

	labels
}

pub fn read_metadata_from_labels(labels: &Labels) -> PackageMetadata {
	let read_string = |key: &str| {
		labels
			.get(key)
			.filter(|value| !value.trim().is_empty())
			.cloned()
	};

	// Plain driver names are stored unquoted
	let chain = read_json::<ChainDriver>(labels, CHAIN_LABEL)
		.or_else(|| read_string(CHAIN_LABEL).map(ChainDriver::Name));

	PackageMetadata {
		dnp_name: read_string(DNP_NAME_LABEL),
		version: read_string(VERSION_LABEL),
		service_name: read_string(SERVICE_NAME_LABEL),
		dependencies: read_json(labels, DEPENDENCIES_LABEL).unwrap_or_default(),
		avatar: read_string(AVATAR_LABEL),
		origin: read_string(ORIGIN_LABEL),
		chain,
		is_core: labels
			.get(IS_CORE_LABEL)
			.is_some_and(|value| value.trim() == "true"),
	}
}

/// Writes the package metadata labels on every service of a document about to be committed.
pub fn stamp_package_labels(compose: &mut ComposeDocument, manifest: &Manifest) {
	for (service_name, service) in &mut compose.services {
		let metadata = PackageMetadata::from_manifest(manifest, service_name);

		extend_service_labels(service, write_metadata_to_labels(&metadata));
	}
}

/// Adds `labels` to the labels of `service`, which end up in map form.
pub fn extend_service_labels(service: &mut Service, labels: Labels) {
	let mut merged = service
		.labels
		.take()
		.map(ListOrMap::into_map)
		.unwrap_or_default();

	merged.extend(labels);

	service.labels = Some(ListOrMap::Map(merged));
}

#[cfg(test)]
mod tests {
	use maplit::btreemap;
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn defaults_survive_labels() {
		let defaults = ServiceDefaults {
			environment: Some(vec!["NETWORK=mainnet".to_string()]),
			ports: Some(vec!["30303:30303/udp".to_string()]),
			volumes: None,
		};

		let labels = write_defaults_to_labels(&defaults);

		assert_eq!(
			labels,
			btreemap! {
				DEFAULT_ENVIRONMENT_LABEL.to_string() => r#"["NETWORK=mainnet"]"#.to_string(),
				DEFAULT_PORTS_LABEL.to_string() => r#"["30303:30303/udp"]"#.to_string(),
			}
		);
		assert_eq!(read_defaults_from_labels(&labels), defaults);
	}

	#[test]
	fn broken_defaults_are_unknown() {
		let labels = btreemap! {
			DEFAULT_ENVIRONMENT_LABEL.to_string() => "{not json".to_string(),
			DEFAULT_PORTS_LABEL.to_string() => "[8080, \"30303/udp\"]".to_string(),
			DEFAULT_VOLUMES_LABEL.to_string() => String::new(),
		};

		assert_eq!(
			read_defaults_from_labels(&labels),
			ServiceDefaults {
				environment: None,
				ports: Some(vec!["8080".to_string(), "30303/udp".to_string()]),
				volumes: None,
			}
		);
	}

	#[test]
	fn metadata_round_trip() {
		let metadata = PackageMetadata {
			dnp_name: Some("geth.dnp.dappnode.eth".to_string()),
			version: Some("0.4.12".to_string()),
			service_name: Some("geth.dnp.dappnode.eth".to_string()),
			dependencies: btreemap! { "bind.dnp.dappnode.eth".to_string() => "^0.2.0".to_string() },
			avatar: Some("/ipfs/QmAvatar".to_string()),
			origin: None,
			chain: Some(ChainDriver::Name("ethereum".to_string())),
			is_core: false,
		};

		let labels = write_metadata_to_labels(&metadata);

		assert_eq!(labels[IS_CORE_LABEL], "false");
		assert_eq!(labels[CHAIN_LABEL], "ethereum");
		assert_eq!(read_metadata_from_labels(&labels), metadata);
	}

	#[test]
	fn chain_spec_is_json() {
		let metadata = PackageMetadata {
			chain: Some(ChainDriver::Spec {
				driver: "ethereum-beacon-chain".to_string(),
				service_name: Some("beacon-chain".to_string()),
				port_number: Some(3500),
			}),
			is_core: true,
			..Default::default()
		};

		let labels = write_metadata_to_labels(&metadata);

		assert_eq!(read_metadata_from_labels(&labels), metadata);
		assert!(!read_metadata_from_labels(&Labels::new()).is_core);
	}
}
