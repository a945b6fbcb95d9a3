//! Extraction of the settings a user applied to a package, and their re-application on the
//! compose document of another version of the same package.

use std::collections::BTreeMap;

use dnp_compose_config::{
	ComposeDocument, Environment, Service, ServiceNetworks, SingleValue, TopLevelNetwork,
	clean_compose,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
	ALL_NAMED_VOLUMES_MOUNTPOINT_LABEL, ComposeEngine, ComposeError, DefaultsTable, EnvMap,
	HostPortSetting, NamingPolicy, PortEntry, PortIdentity, ServiceDefaults, dedup_port_entries,
	extend_service_labels, merge_envs, normalize_path, parse_environment, parse_port_entries,
	parse_volume_mappings, read_defaults_from_labels, read_metadata_from_labels,
	stringify_environment, stringify_port_entries, stringify_volume_mappings,
	write_defaults_to_labels,
};

/// Default volumes of packages released before defaults were stored in labels.
const LEGACY_DEFAULT_VOLUMES: &[(&str, &[&str])] = &[(
	"ethchain.dnp.dappnode.eth",
	&[
		"ethchaindnpdappnodeeth_data:/root/.local/share/io.parity.ethereum",
		"ethchaindnpdappnodeeth_geth:/root/.ethereum",
	],
)];

/// What a user changed on a package. Keyed by service name where per-service.
///
/// Empty collections are never serialized, so stored settings stay minimal.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSettings {
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub environment: BTreeMap<String, EnvMap>,

	/// Host port per port identity (`30303/UDP`). An empty value asks for an ephemeral port.
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub port_mappings: BTreeMap<String, BTreeMap<String, String>>,

	/// Host mountpoint per named volume. An empty value means "no specific mountpoint".
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub named_volume_mountpoints: BTreeMap<String, String>,

	/// Mountpoint for every named volume without a specific one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub all_named_volume_mountpoint: Option<String>,

	/// Deprecated: named volume replaced by an absolute host path, per service.
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub legacy_bind_volumes: BTreeMap<String, BTreeMap<String, String>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub networks: Option<NetworkSettings>,
}

/// Network attachments that must survive a change of the package's compose document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkSettings {
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub root_networks: BTreeMap<String, TopLevelNetwork>,

	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub service_networks: BTreeMap<String, ServiceNetworks>,
}

impl NetworkSettings {
	pub fn is_empty(&self) -> bool {
		self.root_networks.is_empty() && self.service_networks.is_empty()
	}
}

/// The package a committed document belongs to, as stamped in its metadata labels.
fn package_name(compose: &ComposeDocument) -> Option<String> {
	compose
		.services
		.values()
		.filter_map(|service| service.labels.as_ref())
		.find_map(|labels| read_metadata_from_labels(&labels.to_map()).dnp_name)
}

fn legacy_default_volumes(dnp_name: &str) -> Option<Vec<String>> {
	LEGACY_DEFAULT_VOLUMES
		.iter()
		.find(|(name, _)| *name == dnp_name)
		.map(|(_, volumes)| volumes.iter().map(ToString::to_string).collect())
}

/// Shipped volumes of a service: from the side table, then the labels, then the legacy table.
fn recover_default_volumes(
	dnp_name: &str,
	service_name: &str,
	service: &Service,
	table: Option<&DefaultsTable>,
) -> Option<Vec<String>> {
	table
		.and_then(|table| table.get(dnp_name, service_name))
		.and_then(|defaults| defaults.volumes)
		.or_else(|| {
			service
				.labels
				.as_ref()
				.and_then(|labels| read_defaults_from_labels(&labels.to_map()).volumes)
		})
		.or_else(|| legacy_default_volumes(dnp_name))
}

/// Named default volumes whose container path is now bound to a different absolute host path.
fn diverging_bind_volumes(defaults: &[String], live: &[String]) -> BTreeMap<String, String> {
	let live = parse_volume_mappings(live);

	parse_volume_mappings(defaults)
		.into_iter()
		.filter_map(|default| {
			let name = default.name?;
			let current = live
				.iter()
				.find(|mapping| mapping.container == default.container)?;

			(current.is_bind() && current.host.starts_with('/') && current.host != default.host)
				.then(|| (name, current.host.clone()))
		})
		.collect()
}

impl<N: NamingPolicy> ComposeEngine<N> {
	/// Reads the settings a user applied to a live compose document.
	///
	/// Environment values are the live ones, not a diff against the shipped defaults. A volume
	/// bound to a device the naming policy did not produce gets an empty mountpoint, since its
	/// declaration already carries the device. Port entries outside the short syntax are skipped.
	pub fn parse_user_settings(
		&self,
		compose: &ComposeDocument,
	) -> Result<UserSettings, ComposeError> {
		self.extract_user_settings(compose, None)
	}

	/// Like [`ComposeEngine::parse_user_settings`], recovering defaults from `table` before
	/// falling back to the container labels.
	pub fn parse_user_settings_with_defaults(
		&self,
		compose: &ComposeDocument,
		table: &DefaultsTable,
	) -> Result<UserSettings, ComposeError> {
		self.extract_user_settings(compose, Some(table))
	}

	fn extract_user_settings(
		&self,
		compose: &ComposeDocument,
		table: Option<&DefaultsTable>,
	) -> Result<UserSettings, ComposeError> {
		if compose.services.is_empty() {
			return Err(ComposeError::NoServices);
		}

		let dnp_name = package_name(compose);
		let mut settings = UserSettings::default();

		for (service_name, service) in &compose.services {
			if let Some(environment) = &service.environment {
				let env = parse_environment(environment);
				if !env.is_empty() {
					settings.environment.insert(service_name.clone(), env);
				}
			}

			if let Some(ports) = &service.ports {
				let (entries, _) = dedup_port_entries(parse_port_entries(ports));
				let ports: BTreeMap<String, String> = entries
					.iter()
					.filter_map(|entry| match entry {
						PortEntry::Mapping(mapping) => Some((
							mapping.identity().to_string(),
							mapping
								.host
								.map(|host| host.to_string())
								.unwrap_or_default(),
						)),
						PortEntry::Verbatim(_) => None,
					})
					.collect();

				if !ports.is_empty() {
					settings
						.port_mappings
						.insert(service_name.clone(), ports);
				}
			}

			let owner = dnp_name.as_deref().unwrap_or(service_name);
			let defaults = recover_default_volumes(owner, service_name, service, table);

			if let (Some(defaults), Some(live)) = (defaults, &service.volumes) {
				let binds = diverging_bind_volumes(&defaults, live);
				if !binds.is_empty() {
					settings
						.legacy_bind_volumes
						.insert(service_name.clone(), binds);
				}
			}
		}

		for (volume_name, volume) in &compose.volumes {
			if volume.external == Some(true) {
				continue;
			}

			let mountpoint = if let Some(all) = volume.labels.get(ALL_NAMED_VOLUMES_MOUNTPOINT_LABEL)
			{
				settings.all_named_volume_mountpoint = Some(all.clone());
				String::new()
			} else if let Some(device) = volume.bind_device() {
				dnp_name
					.as_deref()
					.and_then(|dnp_name| {
						self.naming
							.mountpoint_from_host_dir(&device, dnp_name, volume_name)
					})
					.unwrap_or_default()
			} else {
				String::new()
			};

			settings
				.named_volume_mountpoints
				.insert(volume_name.clone(), mountpoint);
		}

		settings.networks = self.retained_networks(compose);

		Ok(settings)
	}

	/// Networks beyond the private one, which every package gets anyway.
	fn retained_networks(&self, compose: &ComposeDocument) -> Option<NetworkSettings> {
		let private_name = &self.params.private_network_name;
		let private_only = self.private_network();

		let settings = NetworkSettings {
			root_networks: compose
				.networks
				.iter()
				.filter(|(name, _)| *name != private_name)
				.map(|(name, network)| (name.clone(), network.clone()))
				.collect(),
			service_networks: compose
				.services
				.iter()
				.filter_map(|(service_name, service)| {
					service
						.networks
						.as_ref()
						.filter(|networks| !networks.is_empty() && **networks != private_only)
						.map(|networks| (service_name.clone(), networks.clone()))
				})
				.collect(),
		};

		(!settings.is_empty()).then_some(settings)
	}

	/// Applies stored user settings on a newly shipped compose document of `dnp_name`.
	///
	/// Before any change, the values of every service are stamped in its labels as the
	/// defaults of this version.
	pub fn apply_user_settings(
		&self,
		compose: &ComposeDocument,
		settings: &UserSettings,
		dnp_name: &str,
	) -> Result<ComposeDocument, ComposeError> {
		if compose.services.is_empty() {
			return Err(ComposeError::NoServices);
		}

		let mut next = compose.clone();

		for (service_name, service) in &mut next.services {
			let defaults = ServiceDefaults::from_service(service);

			if let Some(user_env) = settings.environment.get(service_name) {
				let live = service
					.environment
					.as_ref()
					.map(parse_environment)
					.unwrap_or_default();

				service.environment = Some(Environment::List(stringify_environment(
					&merge_envs(user_env, &live),
				)));
			}

			if let Some(user_ports) = settings.port_mappings.get(service_name)
				&& let Some(ports) = &service.ports
			{
				let user_ports: BTreeMap<PortIdentity, &str> = user_ports
					.iter()
					.filter_map(|(identity, host)| {
						identity
							.parse()
							.ok()
							.map(|identity| (identity, host.as_str()))
					})
					.collect();

				let (mut entries, duplicates) = dedup_port_entries(parse_port_entries(ports));
				if !duplicates.is_empty() {
					debug!(service = %service_name, dropped = duplicates.len(), "Dropping duplicate port mappings");
				}

				for entry in &mut entries {
					if let PortEntry::Mapping(mapping) = entry {
						let setting =
							HostPortSetting::from_stored(user_ports.get(&mapping.identity()).copied());
						mapping.host = setting.apply(mapping.host);
					}
				}

				service.ports = Some(stringify_port_entries(&entries));
			}

			if let Some(legacy_binds) = settings.legacy_bind_volumes.get(service_name)
				&& let Some(volumes) = &service.volumes
			{
				let mut mappings = parse_volume_mappings(volumes);
				for mapping in &mut mappings {
					if let Some(name) = &mapping.name
						&& let Some(host) = legacy_binds.get(name)
						&& host.starts_with('/')
					{
						debug!(service = %service_name, volume = %name, host = %host, "Binding legacy volume");
						mapping.host = normalize_path(host);
						mapping.name = None;
					}
				}

				service.volumes = Some(stringify_volume_mappings(&mappings));
			}

			if let Some(stored) = settings
				.networks
				.as_ref()
				.and_then(|networks| networks.service_networks.get(service_name))
			{
				let mut attached = service
					.networks
					.take()
					.map(ServiceNetworks::into_map)
					.unwrap_or_default();

				for (name, network) in stored.clone().into_map() {
					attached.entry(name).or_insert(network);
				}

				service.networks = Some(ServiceNetworks::Map(attached));
			}

			extend_service_labels(service, write_defaults_to_labels(&defaults));
		}

		if let Some(networks) = &settings.networks {
			for (name, network) in &networks.root_networks {
				next.networks
					.entry(name.clone())
					.or_insert_with(|| network.clone());
			}
		}

		let all_named = settings
			.all_named_volume_mountpoint
			.as_deref()
			.filter(|mountpoint| !mountpoint.is_empty());

		for (volume_name, volume) in &mut next.volumes {
			if volume.external == Some(true) {
				continue;
			}

			let specific = settings
				.named_volume_mountpoints
				.get(volume_name)
				.map(String::as_str)
				.filter(|mountpoint| !mountpoint.is_empty());

			let (mountpoint, from_all) = match (specific, all_named) {
				(Some(mountpoint), _) => (mountpoint, false),
				(None, Some(mountpoint)) => (mountpoint, true),
				(None, None) => continue,
			};

			let device = self
				.naming
				.volume_host_dir(mountpoint, dnp_name, volume_name);

			debug!(volume = %volume_name, device = %device, "Binding named volume to mountpoint");

			volume.driver_opts = BTreeMap::from([
				("device".to_string(), SingleValue::String(device)),
				("o".to_string(), SingleValue::from("bind")),
				("type".to_string(), SingleValue::from("none")),
			]);

			if from_all {
				volume.labels.insert(
					ALL_NAMED_VOLUMES_MOUNTPOINT_LABEL.to_string(),
					mountpoint.to_string(),
				);
			} else {
				volume.labels.remove(ALL_NAMED_VOLUMES_MOUNTPOINT_LABEL);
			}
		}

		Ok(clean_compose(next))
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn diverging_binds_only() {
		let defaults = vec![
			"data:/root/.ethereum".to_string(),
			"config:/config".to_string(),
		];
		let live = vec![
			"/mnt/ssd/ethereum:/root/.ethereum".to_string(),
			"config:/config".to_string(),
		];

		assert_eq!(
			diverging_bind_volumes(&defaults, &live),
			BTreeMap::from([("data".to_string(), "/mnt/ssd/ethereum".to_string())])
		);
	}

	#[test]
	fn legacy_table_lookup() {
		assert!(legacy_default_volumes("ethchain.dnp.dappnode.eth").is_some());
		assert!(legacy_default_volumes("geth.dnp.dappnode.eth").is_none());
	}

	#[test]
	fn empty_settings_serialize_to_nothing() -> Result<(), Box<dyn std::error::Error>> {
		assert_eq!(serde_json::to_string(&UserSettings::default())?, "{}");

		let settings: UserSettings = serde_json::from_str(
			r#"{ "portMappings": { "geth": { "30303/UDP": "" } }, "unknown": 1 }"#,
		)?;
		assert_eq!(settings.port_mappings["geth"]["30303/UDP"], "");

		Ok(())
	}
}
