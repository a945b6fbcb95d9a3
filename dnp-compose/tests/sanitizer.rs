use std::collections::BTreeMap;

use indoc::indoc;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use serde_json::Value;

use dnp_compose::*;
use dnp_compose_config::*;

const DNP_NAME: &str = "mock.dnp.dappnode.eth";

fn init_logging() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn mock_manifest(package_type: PackageType) -> Manifest {
	Manifest::new(DNP_NAME, "0.1.0", package_type)
}

#[test]
fn unknown_service_keys_are_reported() -> Result<(), Box<dyn std::error::Error>> {
	init_logging();

	let engine = ComposeEngine::new();
	let compose = ComposeDocument::from_yaml_str(indoc! {r#"
		services:
		  mock.dnp.dappnode.eth:
		    ports:
		      - "1111/1111"
		    volumes:
		      - data:/mock
		    logging:
		      driver: syslog
		    build:
		      context: .
		      dockerfile: Dockerfile
	"#})?;

	let SanitizedCompose { compose, alerts } =
		engine.sanitize_compose_with_alerts(&compose, &mock_manifest(PackageType::Service))?;
	let service = &compose.services[DNP_NAME];

	assert_eq!(service.ports, Some(vec![StringOrNum::from("1111/1111")]));
	assert_eq!(service.volumes, Some(vec!["data:/mock".to_string()]));
	assert_eq!(
		service.logging,
		Some(Logging {
			driver: Some("syslog".to_string()),
			options: None,
		})
	);
	assert_eq!(
		service.networks,
		Some(ServiceNetworks::List(vec!["dncore_network".to_string()]))
	);
	assert!(service.extensions.is_empty());

	assert_eq!(
		compose.networks,
		btreemap! {
			"dncore_network".to_string() => TopLevelNetwork {
				external: Some(true),
				..Default::default()
			}
		}
	);

	assert_eq!(
		alerts,
		vec![ValidationAlert {
			name: IGNORED_SERVICE_VALUE.to_string(),
			details: "Ignored compose value `build` of service `mock.dnp.dappnode.eth`".to_string(),
			service_name: Some(DNP_NAME.to_string()),
		}]
	);

	Ok(())
}

#[test]
fn docker_socket_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
	init_logging();

	let engine = ComposeEngine::new();
	let compose = ComposeDocument::from_yaml_str(indoc! {r#"
		services:
		  mock.dnp.dappnode.eth:
		    volumes:
		      - /var/run/docker.sock:/var/run/docker.sock
	"#})?;

	let result = engine.sanitize_compose(&compose, &mock_manifest(PackageType::Service));

	match result {
		Err(ComposeError::ForbiddenBindMount { service, host_path }) => {
			assert_eq!(service, DNP_NAME);
			assert_eq!(host_path, "/var/run/docker.sock");
		}
		other => panic!("Expected a forbidden bind mount error, got {other:?}"),
	}

	assert!(
		engine
			.unsafe_compose_alerts(&compose, &mock_manifest(PackageType::Service))
			.is_err()
	);

	// Core packages manage the engine itself
	assert!(
		engine
			.sanitize_compose(&compose, &mock_manifest(PackageType::Dncore))
			.is_ok()
	);

	Ok(())
}

#[test]
fn sanitizing_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
	let engine = ComposeEngine::new();
	let manifest = mock_manifest(PackageType::Service);
	let compose = ComposeDocument::from_yaml_str(indoc! {r#"
		version: "3.4"
		services:
		  mock.dnp.dappnode.eth:
		    image: someone/else:latest
		    environment:
		      B: 2
		      A: 1
		    networks:
		      - custom
		    healthcheck:
		      test: ["CMD", "true"]
		  ui:
		    stop_grace_period: 1m
		volumes:
		  data:
		    driver: local
		networks:
		  custom:
		x-meta: true
	"#})?;

	let first = engine.sanitize_compose_with_alerts(&compose, &manifest)?;
	let second = engine.sanitize_compose_with_alerts(&compose, &manifest)?;

	assert_eq!(first.compose.to_yaml_string()?, second.compose.to_yaml_string()?);
	assert_eq!(first.alerts, second.alerts);
	assert_eq!(first.compose.version.as_deref(), Some("3.4"));
	assert_eq!(
		first
			.alerts
			.iter()
			.map(|alert| alert.name.as_str())
			.collect::<Vec<_>>(),
		vec![
			IGNORED_COMPOSE_VALUE,
			IGNORED_SERVICE_VALUE,
			INVALID_IMAGE,
			IGNORED_CUSTOM_NETWORK,
			IGNORED_SERVICE_VALUE,
			IGNORED_VOLUME_VALUE,
			IGNORED_CUSTOM_NETWORK,
		]
	);
	assert_eq!(
		first.compose.services["ui"].image.as_deref(),
		Some("ui.mock.dnp.dappnode.eth:0.1.0")
	);

	Ok(())
}

#[test]
fn sanitized_services_only_hold_whitelisted_keys() -> Result<(), Box<dyn std::error::Error>> {
	let engine = ComposeEngine::new();
	let compose = ComposeDocument::from_yaml_str(indoc! {r#"
		services:
		  mock.dnp.dappnode.eth:
		    image: mock:latest
		    user: root
		    pid: host
		    ipc: host
		    userns_mode: host
		    security_opt:
		      - seccomp:unconfined
		    extra_hosts:
		      - "host.docker.internal:host-gateway"
		    volumes_from:
		      - other
		    cap_add:
		      - NET_ADMIN
		    command: ["--verbose"]
		    restart: unless-stopped
		    privileged: true
		    devices:
		      - /dev/fuse
		    labels:
		      traefik.enable: "true"
	"#})?;

	let allowed: Vec<&str> = SERVICE_KEYS_WHITELIST
		.iter()
		.copied()
		.chain(["container_name", "image"])
		.collect();

	for package_type in [PackageType::Service, PackageType::Dncore] {
		let sanitized = engine.sanitize_compose(&compose, &mock_manifest(package_type))?;

		for service in sanitized.services.values() {
			let Value::Object(keys) = serde_json::to_value(service)? else {
				panic!("A service must serialize to an object");
			};

			for key in keys.keys() {
				assert!(allowed.contains(&key.as_str()), "`{key}` survived sanitizing");
			}
		}
	}

	Ok(())
}

#[test]
fn core_packages_keep_volume_declarations() -> Result<(), Box<dyn std::error::Error>> {
	let engine = ComposeEngine::new();
	let compose = ComposeDocument::from_yaml_str(indoc! {r#"
		services:
		  mock.dnp.dappnode.eth:
		    network_mode: host
		    volumes:
		      - /var/run/docker.sock:/var/run/docker.sock
		      - data:/data
		volumes:
		  data:
		    driver_opts:
		      type: none
		      o: bind
		      device: /mnt/data
	"#})?;

	let SanitizedCompose { compose, alerts } =
		engine.sanitize_compose_with_alerts(&compose, &mock_manifest(PackageType::Dncore))?;

	assert!(alerts.is_empty());
	assert_eq!(compose.volumes["data"].bind_device().as_deref(), Some("/mnt/data"));

	let service = &compose.services[DNP_NAME];
	assert_eq!(service.network_mode.as_deref(), Some("host"));
	assert_eq!(service.networks, None);

	Ok(())
}

#[test]
fn alerts_serialize_in_camel_case() -> Result<(), Box<dyn std::error::Error>> {
	let alert = ValidationAlert {
		name: RESERVED_LABEL.to_string(),
		details: "Label `dappnode.dnp.isCore` of service `ui` is reserved".to_string(),
		service_name: Some("ui".to_string()),
	};

	let value: BTreeMap<String, String> = serde_json::from_value(serde_json::to_value(&alert)?)?;

	assert_eq!(
		value.keys().collect::<Vec<_>>(),
		vec!["details", "name", "serviceName"]
	);

	Ok(())
}

#[test]
fn directories_holding_the_docker_socket_are_fatal() -> Result<(), Box<dyn std::error::Error>> {
	init_logging();

	let engine = ComposeEngine::new();

	for (volume, host_path) in [
		("/var/run:/var/run", "/var/run"),
		("/var/run/./docker.sock:/var/run/docker.sock", "/var/run/docker.sock"),
		("/var/lib/../run/docker.sock:/docker.sock", "/var/run/docker.sock"),
		("/:/host", "/"),
		("/var/:/hostvar", "/var"),
	] {
		let compose = ComposeDocument::from_yaml_str(&format!(
			"services:\n  {DNP_NAME}:\n    volumes:\n      - \"{volume}\"\n"
		))?;

		match engine.sanitize_compose(&compose, &mock_manifest(PackageType::Service)) {
			Err(ComposeError::ForbiddenBindMount { host_path: rejected, .. }) => {
				assert_eq!(rejected, host_path);
			}
			other => panic!("Expected `{volume}` to be rejected, got {other:?}"),
		}
	}

	let unrelated = ComposeDocument::from_yaml_str(indoc! {r#"
		services:
		  mock.dnp.dappnode.eth:
		    volumes:
		      - /var/runner:/runner
		      - /etc/hostname:/etc/host_hostname:ro
	"#})?;

	assert!(
		engine
			.sanitize_compose(&unrelated, &mock_manifest(PackageType::Service))
			.is_ok()
	);

	Ok(())
}

#[test]
fn list_labels_are_sanitized() -> Result<(), Box<dyn std::error::Error>> {
	let engine = ComposeEngine::new();
	let compose = ComposeDocument::from_yaml_str(indoc! {r#"
		services:
		  mock.dnp.dappnode.eth:
		    labels:
		      - traefik.enable=true
		      - dappnode.dnp.isCore=true
	"#})?;

	let SanitizedCompose { compose, alerts } =
		engine.sanitize_compose_with_alerts(&compose, &mock_manifest(PackageType::Service))?;

	assert_eq!(
		compose.services[DNP_NAME].labels,
		Some(ListOrMap::Map(btreemap! {
			"traefik.enable".to_string() => "true".to_string()
		}))
	);
	assert_eq!(
		alerts,
		vec![ValidationAlert {
			name: RESERVED_LABEL.to_string(),
			details: "Label `dappnode.dnp.isCore` of service `mock.dnp.dappnode.eth` is reserved"
				.to_string(),
			service_name: Some(DNP_NAME.to_string()),
		}]
	);

	Ok(())
}

#[test]
fn duplicate_ports_are_dropped() -> Result<(), Box<dyn std::error::Error>> {
	let engine = ComposeEngine::new();
	let compose = ComposeDocument::from_yaml_str(indoc! {r#"
		services:
		  mock.dnp.dappnode.eth:
		    ports:
		      - "80"
		      - "8080:80"
		      - "80/udp"
	"#})?;

	let SanitizedCompose { compose, alerts } =
		engine.sanitize_compose_with_alerts(&compose, &mock_manifest(PackageType::Service))?;

	assert_eq!(
		compose.services[DNP_NAME].ports,
		Some(vec![StringOrNum::from("80"), StringOrNum::from("80/udp")])
	);
	assert_eq!(
		alerts
			.iter()
			.map(|alert| alert.name.as_str())
			.collect::<Vec<_>>(),
		vec![DUPLICATE_PORT_MAPPING]
	);

	Ok(())
}

#[test]
fn private_network_settings_are_reported() -> Result<(), Box<dyn std::error::Error>> {
	let engine = ComposeEngine::new();
	let compose = ComposeDocument::from_yaml_str(indoc! {r#"
		services:
		  mock.dnp.dappnode.eth:
		    networks:
		      dncore_network:
		        aliases:
		          - mock.dappnode
		        ipv4_address: 172.33.1.50
	"#})?;

	let SanitizedCompose { compose, alerts } =
		engine.sanitize_compose_with_alerts(&compose, &mock_manifest(PackageType::Service))?;

	assert_eq!(
		compose.services[DNP_NAME].networks,
		Some(ServiceNetworks::List(vec!["dncore_network".to_string()]))
	);
	assert_eq!(
		alerts
			.iter()
			.map(|alert| alert.name.as_str())
			.collect::<Vec<_>>(),
		vec![IGNORED_CUSTOM_NETWORK]
	);

	Ok(())
}
