use std::collections::BTreeMap;

use dnp_compose_config::ComposeDocument;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{ComposeError, ServiceDefaults, read_defaults_from_labels};

pub const DEFAULTS_SCHEMA_VERSION: u32 = 1;

/// Stored form of [`ServiceDefaults`]. Unknown fields are ignored and missing ones defaulted,
/// so records written by other schema versions still decode.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct DefaultsRecord {
	pub schema_version: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub environment: Option<Vec<String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ports: Option<Vec<String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub volumes: Option<Vec<String>>,
}

impl Default for DefaultsRecord {
	fn default() -> Self {
		Self {
			schema_version: DEFAULTS_SCHEMA_VERSION,
			environment: None,
			ports: None,
			volumes: None,
		}
	}
}

impl From<ServiceDefaults> for DefaultsRecord {
	fn from(defaults: ServiceDefaults) -> Self {
		Self {
			schema_version: DEFAULTS_SCHEMA_VERSION,
			environment: defaults.environment,
			ports: defaults.ports,
			volumes: defaults.volumes,
		}
	}
}

impl From<DefaultsRecord> for ServiceDefaults {
	fn from(record: DefaultsRecord) -> Self {
		Self {
			environment: record.environment,
			ports: record.ports,
			volumes: record.volumes,
		}
	}
}

/// Shipped defaults keyed by package and service, kept outside of container metadata.
#[derive(Clone, Debug, Serialize, PartialEq, Eq, Default)]
pub struct DefaultsTable {
	packages: BTreeMap<String, BTreeMap<String, DefaultsRecord>>,
}

impl DefaultsTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, dnp_name: &str, service_name: &str, defaults: ServiceDefaults) {
		self.packages
			.entry(dnp_name.to_string())
			.or_default()
			.insert(service_name.to_string(), defaults.into());
	}

	pub fn get(&self, dnp_name: &str, service_name: &str) -> Option<ServiceDefaults> {
		self.packages
			.get(dnp_name)?
			.get(service_name)
			.cloned()
			.map(Into::into)
	}

	pub fn remove_package(&mut self, dnp_name: &str) {
		self.packages.remove(dnp_name);
	}

	/// Records the defaults stamped in the labels of every service of a committed document.
	/// Services without default labels are recorded with their current values.
	pub fn capture(&mut self, compose: &ComposeDocument, dnp_name: &str) {
		for (service_name, service) in &compose.services {
			let from_labels = service
				.labels
				.as_ref()
				.map(|labels| read_defaults_from_labels(&labels.to_map()))
				.unwrap_or_default();

			let defaults = if from_labels.is_empty() {
				ServiceDefaults::from_service(service)
			} else {
				from_labels
			};

			self.insert(dnp_name, service_name, defaults);
		}
	}

	/// Decodes a stored table. Records that do not decode are skipped; an unreadable table is
	/// read as empty.
	pub fn from_json_str(json: &str) -> Self {
		let raw: BTreeMap<String, BTreeMap<String, Value>> = match serde_json::from_str(json) {
			Ok(raw) => raw,
			Err(e) => {
				warn!(error = %e, "Discarding unreadable defaults table");
				return Self::default();
			}
		};

		let packages = raw
			.into_iter()
			.map(|(dnp_name, services)| {
				let records = services
					.into_iter()
					.filter_map(|(service_name, record)| {
						serde_json::from_value(record)
							.ok()
							.map(|record| (service_name, record))
					})
					.collect();

				(dnp_name, records)
			})
			.collect();

		Self { packages }
	}

	pub fn to_json_string(&self) -> Result<String, ComposeError> {
		serde_json::to_string(&self.packages)
			.map_err(|e| ComposeError::Model(e.into()))
	}
}
