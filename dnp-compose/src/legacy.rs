//! Conversion of manifests that predate compose documents.

use std::collections::BTreeMap;

use dnp_compose_config::{
	ComposeDocument, Environment, ListOrMap, Service, ServiceNetworkSettings, ServiceNetworks,
	StringOrNum, TopLevelVolume, clean_compose,
};
use tracing::{debug, warn};

use crate::{
	ComposeEngine, ComposeError, LegacyManifest, NamingPolicy, parse_environment_lines,
	parse_volume_mappings, sanitizer::is_reserved_label, stringify_environment,
};

impl<N: NamingPolicy> ComposeEngine<N> {
	/// Builds the one-service compose document equivalent to a legacy manifest.
	///
	/// Legacy manifests predate the forced DNS server, so none is set. Declaring external
	/// volumes is a hard error.
	pub fn convert_legacy_manifest(
		&self,
		manifest: &LegacyManifest,
	) -> Result<ComposeDocument, ComposeError> {
		let image = &manifest.image;

		if !image.external_vol.is_empty() {
			return Err(ComposeError::ExternalVolumesForbidden {
				package: manifest.name.clone(),
			});
		}

		let service_name = manifest.name.as_str();
		let is_core = manifest.is_core();

		let volumes: BTreeMap<String, TopLevelVolume> = parse_volume_mappings(&image.volumes)
			.into_iter()
			.filter_map(|mapping| mapping.name)
			.map(|name| (name, TopLevelVolume::default()))
			.collect();

		let networks = match (&image.ipv4_address, &image.network_mode) {
			(Some(address), _) if is_core => Some(ServiceNetworks::Map(BTreeMap::from([(
				self.params.private_network_name.clone(),
				Some(ServiceNetworkSettings {
					ipv4_address: Some(address.clone()),
					..Default::default()
				}),
			)]))),
			(_, Some(_)) if is_core => None,
			_ => Some(self.private_network()),
		};

		let mut labels = image.labels.clone();
		if !is_core {
			labels.retain(|key, _| {
				let reserved = is_reserved_label(key);
				if reserved {
					warn!(package = %manifest.name, label = %key, "Dropping reserved label");
				}
				!reserved
			});
		}

		let service = Service {
			cap_add: Some(image.cap_add.clone()),
			cap_drop: Some(image.cap_drop.clone()),
			command: image.command.clone(),
			container_name: Some(
				self.naming
					.container_name(&manifest.name, service_name, is_core),
			),
			devices: Some(image.devices.clone()),
			environment: Some(Environment::List(stringify_environment(
				&parse_environment_lines(&image.environment),
			))),
			image: Some(
				self.naming
					.image_tag(&manifest.name, service_name, &manifest.version),
			),
			labels: Some(ListOrMap::Map(labels)),
			logging: Some(self.default_logging()),
			network_mode: image.network_mode.clone(),
			networks,
			ports: Some(
				image
					.ports
					.iter()
					.map(|port| StringOrNum::String(port.clone()))
					.collect(),
			),
			privileged: image.privileged,
			restart: Some(
				image
					.restart
					.clone()
					.unwrap_or_else(|| self.params.default_restart.clone()),
			),
			volumes: Some(image.volumes.clone()),
			..Default::default()
		};

		self.check_bind_mounts(service_name, &service, is_core)?;

		debug!(
			package = %manifest.name,
			volumes = volumes.len(),
			"Converted legacy manifest into a compose document"
		);

		let compose = ComposeDocument {
			version: Some(self.params.compose_version.clone()),
			services: BTreeMap::from([(service_name.to_string(), service)]),
			volumes,
			networks: BTreeMap::from([(
				self.params.private_network_name.clone(),
				self.private_network_declaration(is_core),
			)]),
			extensions: BTreeMap::new(),
		};

		Ok(clean_compose(compose))
	}
}
