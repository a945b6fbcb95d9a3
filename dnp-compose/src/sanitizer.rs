use std::collections::{BTreeMap, BTreeSet};

use dnp_compose_config::{
	ComposeDocument, Environment, Ipam, IpamConfig, ListOrMap, Logging, Service, ServiceNetworks,
	StringOrNum, TopLevelNetwork, TopLevelVolume, clean_compose,
};
use serde::Serialize;
use tracing::warn;

use crate::{
	ComposeEngine, ComposeError, LABEL_PREFIX, Manifest, NamingPolicy, PortEntry, bind_covers,
	parse_environment, parse_volume_mappings, stringify_environment,
};

pub const IGNORED_COMPOSE_VALUE: &str = "Ignored compose value";
pub const IGNORED_SERVICE_VALUE: &str = "Ignored compose service value";
pub const IGNORED_VOLUME_VALUE: &str = "Ignored compose volume value";
pub const IGNORED_CUSTOM_NETWORK: &str = "Ignored custom network";
pub const INVALID_IMAGE: &str = "Invalid image";
pub const RESERVED_LABEL: &str = "Reserved label";
pub const DUPLICATE_PORT_MAPPING: &str = "Duplicate port mapping";

/// Keys a sanitized service may contain. `container_name` and `image` are always present on
/// top of these.
pub const SERVICE_KEYS_WHITELIST: &[&str] = &[
	"cap_add",
	"cap_drop",
	"command",
	"devices",
	"dns",
	"environment",
	"labels",
	"logging",
	"network_mode",
	"networks",
	"ports",
	"privileged",
	"restart",
	"volumes",
];

/// A non-fatal report of something the sanitizer removed or replaced.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationAlert {
	pub name: String,
	pub details: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub service_name: Option<String>,
}

/// The output of the sanitizer: a safe document and everything that was dropped to get it.
#[derive(Clone, Debug, PartialEq)]
pub struct SanitizedCompose {
	pub compose: ComposeDocument,
	pub alerts: Vec<ValidationAlert>,
}

#[derive(Default)]
struct Alerts(Vec<ValidationAlert>);

impl Alerts {
	fn push(&mut self, name: &str, service_name: Option<&str>, details: String) {
		warn!(
			alert = name,
			service = service_name.unwrap_or_default(),
			"{details}"
		);

		self.0.push(ValidationAlert {
			name: name.to_string(),
			details,
			service_name: service_name.map(ToString::to_string),
		});
	}
}

impl<N: NamingPolicy> ComposeEngine<N> {
	/// Reduces an untrusted compose document to the subset a package is allowed to declare.
	///
	/// Dropped fields are reported through [`ComposeEngine::unsafe_compose_alerts`]. Only
	/// structural problems and forbidden bind mounts are errors.
	pub fn sanitize_compose(
		&self,
		compose: &ComposeDocument,
		manifest: &Manifest,
	) -> Result<ComposeDocument, ComposeError> {
		Ok(self
			.sanitize_compose_with_alerts(compose, manifest)?
			.compose)
	}

	/// The alerts produced while sanitizing `compose`.
	pub fn unsafe_compose_alerts(
		&self,
		compose: &ComposeDocument,
		manifest: &Manifest,
	) -> Result<Vec<ValidationAlert>, ComposeError> {
		Ok(self
			.sanitize_compose_with_alerts(compose, manifest)?
			.alerts)
	}

	pub fn sanitize_compose_with_alerts(
		&self,
		compose: &ComposeDocument,
		manifest: &Manifest,
	) -> Result<SanitizedCompose, ComposeError> {
		if compose.services.is_empty() {
			return Err(ComposeError::NoServices);
		}

		let mut alerts = Alerts::default();

		for key in compose.extensions.keys() {
			alerts.push(
				IGNORED_COMPOSE_VALUE,
				None,
				format!("Ignored top-level compose value `{key}`"),
			);
		}

		let mut services = BTreeMap::new();
		for (service_name, service) in &compose.services {
			self.check_bind_mounts(service_name, service, manifest.is_core())?;

			services.insert(
				service_name.clone(),
				self.sanitize_service(service_name, service, manifest, &mut alerts),
			);
		}

		let sanitized = ComposeDocument {
			version: Some(
				compose
					.version
					.clone()
					.unwrap_or_else(|| self.params.compose_version.clone()),
			),
			services,
			volumes: sanitize_volumes(&compose.volumes, manifest, &mut alerts),
			networks: self.sanitize_networks(&compose.networks, manifest, &mut alerts),
			extensions: BTreeMap::new(),
		};

		Ok(SanitizedCompose {
			compose: clean_compose(sanitized),
			alerts: alerts.0,
		})
	}

	/// Non-core packages may never bind the forbidden host paths (the docker socket), nor any
	/// directory containing one of them.
	pub(crate) fn check_bind_mounts(
		&self,
		service_name: &str,
		service: &Service,
		is_core: bool,
	) -> Result<(), ComposeError> {
		if is_core {
			return Ok(());
		}

		let volumes = service.volumes.as_deref().unwrap_or_default();

		for mapping in parse_volume_mappings(volumes) {
			if mapping.is_bind()
				&& self
					.params
					.forbidden_host_paths
					.iter()
					.any(|forbidden| bind_covers(&mapping.host, forbidden))
			{
				return Err(ComposeError::ForbiddenBindMount {
					service: service_name.to_string(),
					host_path: mapping.host,
				});
			}
		}

		Ok(())
	}

	pub(crate) fn default_logging(&self) -> Logging {
		Logging {
			driver: Some(self.params.logging_driver.clone()),
			options: Some(BTreeMap::from([
				(
					"max-file".to_string(),
					StringOrNum::String(self.params.log_max_file.to_string()),
				),
				(
					"max-size".to_string(),
					StringOrNum::String(self.params.log_max_size.clone()),
				),
			])),
		}
	}

	pub(crate) fn private_network(&self) -> ServiceNetworks {
		ServiceNetworks::List(vec![self.params.private_network_name.clone()])
	}

	fn sanitize_service(
		&self,
		service_name: &str,
		service: &Service,
		manifest: &Manifest,
		alerts: &mut Alerts,
	) -> Service {
		let is_core = manifest.is_core();

		for key in service.extensions.keys() {
			alerts.push(
				IGNORED_SERVICE_VALUE,
				Some(service_name),
				format!("Ignored compose value `{key}` of service `{service_name}`"),
			);
		}

		let image = self
			.naming
			.image_tag(&manifest.name, service_name, &manifest.version);
		if let Some(declared) = service
			.image
			.as_ref()
			.filter(|declared| **declared != image)
		{
			alerts.push(
				INVALID_IMAGE,
				Some(service_name),
				format!("Image `{declared}` of service `{service_name}` was replaced by `{image}`"),
			);
		}

		let networks = if is_core {
			service.networks.clone().or_else(|| {
				service
					.network_mode
					.is_none()
					.then(|| self.private_network())
			})
		} else {
			if let Some(declared) = &service.networks
				&& declared.names() != [self.params.private_network_name.as_str()]
			{
				alerts.push(
					IGNORED_CUSTOM_NETWORK,
					Some(service_name),
					format!(
						"Networks `{}` of service `{service_name}` were replaced by `{}`",
						declared.names().join(", "),
						self.params.private_network_name
					),
				);
			} else if let Some(ServiceNetworks::Map(declared)) = &service.networks
				&& declared.values().flatten().any(|settings| {
					settings.aliases.as_ref().is_some_and(|aliases| !aliases.is_empty())
						|| settings.ipv4_address.is_some()
				})
			{
				alerts.push(
					IGNORED_CUSTOM_NETWORK,
					Some(service_name),
					format!(
						"Settings of network `{}` of service `{service_name}` were ignored",
						self.params.private_network_name
					),
				);
			}

			Some(self.private_network())
		};

		let labels = service.labels.as_ref().map(|labels| {
			let mut labels = labels.to_map();
			if !is_core {
				labels.retain(|key, _| {
					let reserved = is_reserved_label(key);
					if reserved {
						alerts.push(
							RESERVED_LABEL,
							Some(service_name),
							format!("Label `{key}` of service `{service_name}` is reserved"),
						);
					}
					!reserved
				});
			}
			ListOrMap::Map(labels)
		});

		let ports = service.ports.as_ref().map(|ports| {
			let mut seen = BTreeSet::new();

			ports
				.iter()
				.filter(|port| {
					let duplicate = PortEntry::parse(port)
						.identity()
						.is_some_and(|identity| !seen.insert(identity));
					if duplicate {
						alerts.push(
							DUPLICATE_PORT_MAPPING,
							Some(service_name),
							format!(
								"Port `{port}` of service `{service_name}` maps a port that is already published"
							),
						);
					}
					!duplicate
				})
				.cloned()
				.collect()
		});

		Service {
			cap_add: service.cap_add.clone(),
			cap_drop: service.cap_drop.clone(),
			command: service.command.clone(),
			container_name: Some(
				self.naming
					.container_name(&manifest.name, service_name, is_core),
			),
			devices: service.devices.clone(),
			dns: Some(self.params.dns_ip.clone()),
			environment: service
				.environment
				.as_ref()
				.map(|env| Environment::List(stringify_environment(&parse_environment(env)))),
			image: Some(image),
			labels,
			logging: Some(
				service
					.logging
					.clone()
					.unwrap_or_else(|| self.default_logging()),
			),
			network_mode: service.network_mode.clone(),
			networks,
			ports,
			privileged: service.privileged,
			restart: Some(
				service
					.restart
					.clone()
					.unwrap_or_else(|| self.params.default_restart.clone()),
			),
			volumes: service.volumes.clone(),
			extensions: BTreeMap::new(),
		}
	}

	pub(crate) fn private_network_declaration(&self, is_core: bool) -> TopLevelNetwork {
		if is_core {
			TopLevelNetwork {
				driver: Some("bridge".to_string()),
				ipam: Some(Ipam {
					driver: None,
					config: vec![IpamConfig {
						subnet: Some(self.params.private_network_subnet.clone()),
						..Default::default()
					}],
				}),
				..Default::default()
			}
		} else {
			TopLevelNetwork {
				external: Some(true),
				..Default::default()
			}
		}
	}

	fn sanitize_networks(
		&self,
		networks: &BTreeMap<String, TopLevelNetwork>,
		manifest: &Manifest,
		alerts: &mut Alerts,
	) -> BTreeMap<String, TopLevelNetwork> {
		let private_name = &self.params.private_network_name;

		if manifest.is_core() {
			let mut networks = networks.clone();
			networks
				.entry(private_name.clone())
				.or_insert_with(|| self.private_network_declaration(true));
			return networks;
		}

		for name in networks.keys().filter(|name| *name != private_name) {
			alerts.push(
				IGNORED_CUSTOM_NETWORK,
				None,
				format!("Custom network `{name}` is not allowed for non-core packages"),
			);
		}

		BTreeMap::from([(
			private_name.clone(),
			self.private_network_declaration(false),
		)])
	}
}

/// Labels in the `dappnode.dnp.` namespace are only written by the package manager.
pub(crate) fn is_reserved_label(key: &str) -> bool {
	key.starts_with(LABEL_PREFIX)
}

/// Non-core packages may only mark volumes as external. Core packages keep their declarations.
fn sanitize_volumes(
	volumes: &BTreeMap<String, TopLevelVolume>,
	manifest: &Manifest,
	alerts: &mut Alerts,
) -> BTreeMap<String, TopLevelVolume> {
	if manifest.is_core() {
		return volumes.clone();
	}

	volumes
		.iter()
		.map(|(volume_name, volume)| {
			let mut ignored: Vec<&str> = Vec::new();
			if volume.name.is_some() {
				ignored.push("name");
			}
			if volume.driver.is_some() {
				ignored.push("driver");
			}
			if !volume.driver_opts.is_empty() {
				ignored.push("driver_opts");
			}
			if !volume.labels.is_empty() {
				ignored.push("labels");
			}
			ignored.extend(volume.extensions.keys().map(String::as_str));

			for key in ignored {
				alerts.push(
					IGNORED_VOLUME_VALUE,
					None,
					format!("Ignored compose value `{key}` of volume `{volume_name}`"),
				);
			}

			(
				volume_name.clone(),
				TopLevelVolume {
					external: volume.external,
					..Default::default()
				},
			)
		})
		.collect()
}
