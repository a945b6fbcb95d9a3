//! Fleet-wide naming conventions.
//!
//! Container names, image tags and volume directories are shared with other subsystems of the
//! package manager, so the engine only consumes them through [`NamingPolicy`].

const CONTAINER_NAME_PREFIX: &str = "DAppNodePackage-";
const CONTAINER_CORE_NAME_PREFIX: &str = "DAppNodeCore-";
const VOLUMES_DIR: &str = "dappnode-volumes";

/// Deterministic derivation of the names the engine stamps on compose documents.
pub trait NamingPolicy {
	fn container_name(&self, dnp_name: &str, service_name: &str, is_core: bool) -> String;

	fn image_tag(&self, dnp_name: &str, service_name: &str, version: &str) -> String;

	/// Host directory backing the named volume `volume_name` of `dnp_name` under `mountpoint`.
	fn volume_host_dir(&self, mountpoint: &str, dnp_name: &str, volume_name: &str) -> String;

	/// Inverse of [`NamingPolicy::volume_host_dir`]. Returns `None` when `host_dir` was not
	/// produced by it for this package and volume.
	fn mountpoint_from_host_dir(
		&self,
		host_dir: &str,
		dnp_name: &str,
		volume_name: &str,
	) -> Option<String>;
}

/// The naming scheme used across a DAppNode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DappnodeNaming;

/// `service.dnp` for secondary services, `dnp` for the main one.
fn service_qualified_name(dnp_name: &str, service_name: &str) -> String {
	if service_name.is_empty() || service_name == dnp_name {
		dnp_name.to_string()
	} else {
		format!("{service_name}.{dnp_name}")
	}
}

impl NamingPolicy for DappnodeNaming {
	fn container_name(&self, dnp_name: &str, service_name: &str, is_core: bool) -> String {
		let prefix = if is_core {
			CONTAINER_CORE_NAME_PREFIX
		} else {
			CONTAINER_NAME_PREFIX
		};

		format!("{prefix}{}", service_qualified_name(dnp_name, service_name))
	}

	fn image_tag(&self, dnp_name: &str, service_name: &str, version: &str) -> String {
		format!("{}:{version}", service_qualified_name(dnp_name, service_name))
	}

	fn volume_host_dir(&self, mountpoint: &str, dnp_name: &str, volume_name: &str) -> String {
		let mountpoint = mountpoint.trim_end_matches('/');

		format!("{mountpoint}/{VOLUMES_DIR}/{dnp_name}/{volume_name}")
	}

	fn mountpoint_from_host_dir(
		&self,
		host_dir: &str,
		dnp_name: &str,
		volume_name: &str,
	) -> Option<String> {
		let suffix = format!("/{VOLUMES_DIR}/{dnp_name}/{volume_name}");

		host_dir
			.trim_end_matches('/')
			.strip_suffix(&suffix)
			.map(|mountpoint| {
				if mountpoint.is_empty() {
					"/".to_string()
				} else {
					mountpoint.to_string()
				}
			})
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn main_and_secondary_services() {
		let naming = DappnodeNaming;

		assert_eq!(
			naming.container_name("geth.dnp.dappnode.eth", "geth.dnp.dappnode.eth", false),
			"DAppNodePackage-geth.dnp.dappnode.eth"
		);
		assert_eq!(
			naming.container_name("bind.dnp.dappnode.eth", "", true),
			"DAppNodeCore-bind.dnp.dappnode.eth"
		);
		assert_eq!(
			naming.image_tag("mysite.dnp.dappnode.eth", "db", "0.1.0"),
			"db.mysite.dnp.dappnode.eth:0.1.0"
		);
	}

	#[test]
	fn volume_dirs_are_reversible() {
		let naming = DappnodeNaming;
		let dir = naming.volume_host_dir("/dev1/data/", "geth.dnp.dappnode.eth", "data");

		assert_eq!(dir, "/dev1/data/dappnode-volumes/geth.dnp.dappnode.eth/data");
		assert_eq!(
			naming
				.mountpoint_from_host_dir(&dir, "geth.dnp.dappnode.eth", "data")
				.as_deref(),
			Some("/dev1/data")
		);
		assert_eq!(
			naming.mountpoint_from_host_dir("/mnt/other", "geth.dnp.dappnode.eth", "data"),
			None
		);
	}
}
