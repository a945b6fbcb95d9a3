use indexmap::indexmap;
use indoc::indoc;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use serde_json::json;

use dnp_compose_config::*;

const BITCOIN_COMPOSE: &str = indoc! {r#"
	version: "3.5"
	services:
	  bitcoin.dnp.dappnode.eth:
	    image: bitcoin.dnp.dappnode.eth:0.1.2
	    container_name: DAppNodePackage-bitcoin.dnp.dappnode.eth
	    environment:
	      BTC_RPCUSER: dappnode
	      BTC_TXINDEX: 1
	      EMPTY:
	    ports:
	      - 8333
	      - "8332:8332/udp"
	    volumes:
	      - bitcoin_data:/root/.bitcoin
	    networks:
	      dncore_network:
	        aliases:
	          - bitcoin.dappnode
	    build:
	      context: .
	volumes:
	  bitcoin_data:
	networks:
	  dncore_network:
	    external: true
	x-custom: value
"#};

#[test]
fn compose_document_parsing() -> Result<(), Box<dyn std::error::Error>> {
	let compose = ComposeDocument::from_yaml_str(BITCOIN_COMPOSE)?;
	let service = &compose.services["bitcoin.dnp.dappnode.eth"];

	assert_eq!(compose.version.as_deref(), Some("3.5"));
	assert_eq!(compose.volumes["bitcoin_data"], TopLevelVolume::default());
	assert_eq!(compose.networks["dncore_network"].external, Some(true));
	assert_eq!(compose.extensions, btreemap! { "x-custom".to_string() => json!("value") });

	assert_eq!(
		service.environment,
		Some(Environment::Map(indexmap! {
			"BTC_RPCUSER".to_string() => Some(SingleValue::from("dappnode")),
			"BTC_TXINDEX".to_string() => Some(SingleValue::Int(1)),
			"EMPTY".to_string() => None,
		}))
	);
	assert_eq!(
		service.ports,
		Some(vec![StringOrNum::Num(8333), StringOrNum::from("8332:8332/udp")])
	);
	assert_eq!(
		service.networks,
		Some(ServiceNetworks::Map(btreemap! {
			"dncore_network".to_string() => Some(ServiceNetworkSettings {
				aliases: Some(vec!["bitcoin.dappnode".to_string()]),
				ipv4_address: None,
			})
		}))
	);
	assert_eq!(
		service.extensions,
		btreemap! { "build".to_string() => json!({ "context": "." }) }
	);

	Ok(())
}

#[test]
fn missing_services_is_an_error() {
	let result = ComposeDocument::from_yaml_str(indoc! {r#"
		version: "3.5"
		volumes:
		  data:
	"#});

	assert!(matches!(result, Err(ComposeConfigError::Deserialization(_))));
}

#[test]
fn yaml_round_trip() -> Result<(), Box<dyn std::error::Error>> {
	let compose = ComposeDocument::from_yaml_str(BITCOIN_COMPOSE)?;

	let serialized = compose.to_yaml_string()?;
	let deserialized = ComposeDocument::from_yaml_str(&serialized)?;

	assert_eq!(deserialized, compose);

	let json = compose.to_json_value()?;
	assert_eq!(ComposeDocument::from_json_value(json)?, compose);

	Ok(())
}

#[test]
fn cleaned_output_has_no_empty_blocks() -> Result<(), Box<dyn std::error::Error>> {
	let compose = ComposeDocument::from_yaml_str(indoc! {r#"
		version: ""
		services:
		  app:
		    image: app:1.0.0
		    environment: []
		    ports: []
		    labels: {}
		    logging:
		      options: {}
	"#})?;

	let cleaned = clean_compose(compose);

	assert_eq!(
		cleaned.to_json_value()?,
		json!({ "services": { "app": { "image": "app:1.0.0" } } })
	);

	Ok(())
}

#[test]
fn labels_in_both_forms() -> Result<(), Box<dyn std::error::Error>> {
	let compose = ComposeDocument::from_yaml_str(indoc! {r#"
		services:
		  list:
		    labels:
		      - traefik.enable=true
		      - traefik.http.routers.app.rule=Host(`app.dappnode`)
		      - bare
		      - =no-key
		  map:
		    labels:
		      traefik.enable: "true"
	"#})?;

	let list = compose.services["list"].labels.clone().unwrap_or_default();
	let map = compose.services["map"].labels.clone().unwrap_or_default();

	assert_eq!(
		list.to_map(),
		btreemap! {
			"bare".to_string() => String::new(),
			"traefik.enable".to_string() => "true".to_string(),
			"traefik.http.routers.app.rule".to_string() => "Host(`app.dappnode`)".to_string(),
		}
	);
	assert_eq!(map.into_map(), btreemap! { "traefik.enable".to_string() => "true".to_string() });

	Ok(())
}
