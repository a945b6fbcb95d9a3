use serde::{Deserialize, Serialize};

use crate::ComposeError;

/// Fleet-wide constants used when sanitizing and converting compose documents.
///
/// Every field has a default, so a YAML overlay only needs to name what it changes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineParams {
	/// Version written into documents generated from legacy manifests.
	pub compose_version: String,
	/// DNS server forced on every sanitized service.
	pub dns_ip: String,
	/// The bridge network owned by core packages and joined externally by every other package.
	pub private_network_name: String,
	/// Subnet of the private network when a core package declares it.
	pub private_network_subnet: String,
	/// Restart policy used when a service does not declare one.
	pub default_restart: String,
	pub logging_driver: String,
	pub log_max_size: String,
	pub log_max_file: u32,
	/// Host paths that a non-core package may never bind into a container.
	pub forbidden_host_paths: Vec<String>,
}

impl Default for EngineParams {
	fn default() -> Self {
		Self {
			compose_version: "3.5".to_string(),
			dns_ip: "172.33.1.2".to_string(),
			private_network_name: "dncore_network".to_string(),
			private_network_subnet: "172.33.0.0/16".to_string(),
			default_restart: "always".to_string(),
			logging_driver: "json-file".to_string(),
			log_max_size: "10m".to_string(),
			log_max_file: 3,
			forbidden_host_paths: vec![
				"/var/run/docker.sock".to_string(),
				"/run/docker.sock".to_string(),
			],
		}
	}
}

impl EngineParams {
	/// Reads a (possibly partial) YAML overlay on top of the defaults and validates the result.
	pub fn from_yaml_str(yaml: &str) -> Result<Self, ComposeError> {
		let params: Self = serde_yaml_ng::from_str(yaml)
			.map_err(|e| ComposeError::InvalidConfig(e.to_string()))?;

		params.validate()?;

		Ok(params)
	}

	pub fn validate(&self) -> Result<(), ComposeError> {
		if self.private_network_name.trim().is_empty() {
			return Err(ComposeError::InvalidConfig(
				"privateNetworkName must not be empty".to_string(),
			));
		}

		if self.log_max_file == 0 || self.log_max_size.trim().is_empty() {
			return Err(ComposeError::InvalidConfig(
				"log rotation requires a non-empty logMaxSize and a positive logMaxFile".to_string(),
			));
		}

		Ok(())
	}
}
