use std::{
	collections::BTreeSet,
	fmt::{self, Display},
	net::Ipv4Addr,
	str::FromStr,
};

use dnp_compose_config::StringOrNum;
use serde::{Deserialize, Serialize};

use crate::ComposeError;

#[derive(
	Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortProtocol {
	#[default]
	Tcp,
	Udp,
}

impl Display for PortProtocol {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Tcp => f.write_str("TCP"),
			Self::Udp => f.write_str("UDP"),
		}
	}
}

impl FromStr for PortProtocol {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"tcp" => Ok(Self::Tcp),
			"udp" => Ok(Self::Udp),
			other => Err(format!("unknown protocol `{other}`")),
		}
	}
}

/// The identity of a port mapping within a service: its container port and protocol.
///
/// The host port is not part of the identity, which is what allows the same logical port to be
/// followed across package versions. Displayed as `30303/TCP`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortIdentity {
	pub container: u16,
	pub protocol: PortProtocol,
}

impl Display for PortIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.container, self.protocol)
	}
}

impl FromStr for PortIdentity {
	type Err = ComposeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (port, protocol) = s.split_once('/').unwrap_or((s, "TCP"));

		Ok(Self {
			container: parse_port_number(s, port)?,
			protocol: protocol
				.parse()
				.map_err(|reason| invalid_port(s, reason))?,
		})
	}
}

/// A published port: `container` exposed on `host`, or on an engine-assigned port when `host`
/// is `None`. `host_ip` restricts the binding to one host address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortMapping {
	pub container: u16,
	pub protocol: PortProtocol,
	pub host: Option<u16>,
	pub host_ip: Option<Ipv4Addr>,
}

impl PortMapping {
	pub fn identity(&self) -> PortIdentity {
		PortIdentity {
			container: self.container,
			protocol: self.protocol,
		}
	}
}

/// Compose short syntax: `[[ip:]host:]container[/protocol]`. The host port may be left empty
/// after an address (`127.0.0.1::8545`).
impl FromStr for PortMapping {
	type Err = ComposeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let value = s.trim();
		let (mapping, protocol) = match value.split_once('/') {
			Some((mapping, protocol)) => (
				mapping,
				protocol
					.parse()
					.map_err(|reason| invalid_port(value, reason))?,
			),
			None => (value, PortProtocol::Tcp),
		};

		let (host_ip, host, container) = match mapping.split(':').collect::<Vec<_>>()[..] {
			[container] => (None, None, container),
			[host, container] => (None, Some(parse_port_number(value, host)?), container),
			[ip, host, container] => {
				let ip = ip.trim().parse::<Ipv4Addr>().map_err(|_| {
					invalid_port(value, format!("`{ip}` is not an IPv4 address"))
				})?;
				let host = if host.trim().is_empty() {
					None
				} else {
					Some(parse_port_number(value, host)?)
				};

				(Some(ip), host, container)
			}
			_ => {
				return Err(invalid_port(
					value,
					"expected the `[[ip:]host:]container[/protocol]` form".to_string(),
				));
			}
		};

		Ok(Self {
			container: parse_port_number(value, container)?,
			protocol,
			host,
			host_ip,
		})
	}
}

impl Display for PortMapping {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (self.host_ip, self.host) {
			(Some(ip), Some(host)) => write!(f, "{ip}:{host}:")?,
			(Some(ip), None) => write!(f, "{ip}::")?,
			(None, Some(host)) => write!(f, "{host}:")?,
			(None, None) => {}
		}

		write!(f, "{}", self.container)?;

		if self.protocol == PortProtocol::Udp {
			f.write_str("/udp")?;
		}

		Ok(())
	}
}

fn invalid_port(value: &str, reason: String) -> ComposeError {
	ComposeError::InvalidPortMapping {
		value: value.to_string(),
		reason,
	}
}

fn parse_port_number(value: &str, port: &str) -> Result<u16, ComposeError> {
	match port.trim().parse::<u16>() {
		Ok(number) if number > 0 => Ok(number),
		_ => Err(invalid_port(
			value,
			format!("`{port}` is not a port number between 1 and 65535"),
		)),
	}
}

/// A port as written in a service.
///
/// Entries outside the short syntax understood by [`PortMapping`] (ranges, IPv6 addresses...)
/// are carried verbatim and take no part in identity matching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortEntry {
	Mapping(PortMapping),
	Verbatim(StringOrNum),
}

impl PortEntry {
	pub fn parse(port: &StringOrNum) -> Self {
		port.to_string()
			.parse()
			.map_or_else(|_| Self::Verbatim(port.clone()), Self::Mapping)
	}

	pub fn identity(&self) -> Option<PortIdentity> {
		match self {
			Self::Mapping(mapping) => Some(mapping.identity()),
			Self::Verbatim(_) => None,
		}
	}

	pub fn to_value(&self) -> StringOrNum {
		match self {
			Self::Mapping(mapping) => StringOrNum::String(mapping.to_string()),
			Self::Verbatim(value) => value.clone(),
		}
	}
}

pub fn parse_port_entries(ports: &[StringOrNum]) -> Vec<PortEntry> {
	ports.iter().map(PortEntry::parse).collect()
}

pub fn stringify_port_entries(entries: &[PortEntry]) -> Vec<StringOrNum> {
	entries.iter().map(PortEntry::to_value).collect()
}

/// Keeps the first entry of every port identity, so that a service maps each identity once.
///
/// Returns the kept entries and the dropped duplicates. Verbatim entries are always kept.
pub fn dedup_port_entries(entries: Vec<PortEntry>) -> (Vec<PortEntry>, Vec<PortEntry>) {
	let mut seen = BTreeSet::new();

	entries.into_iter().partition(|entry| {
		entry
			.identity()
			.is_none_or(|identity| seen.insert(identity))
	})
}

/// A user's stored opinion about the host port of one port identity.
///
/// `Cleared` is distinct from `Unset`: the user explicitly asked for an ephemeral port, which
/// must override a host port shipped by the package.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostPortSetting {
	Unset,
	Cleared,
	Value(u16),
}

impl HostPortSetting {
	/// An absent entry is `Unset`. A present entry that is not a usable port number is `Cleared`.
	pub fn from_stored(value: Option<&str>) -> Self {
		match value {
			None => Self::Unset,
			Some(value) => match value.trim().parse::<u16>() {
				Ok(port) if port > 0 => Self::Value(port),
				_ => Self::Cleared,
			},
		}
	}

	pub fn apply(self, current: Option<u16>) -> Option<u16> {
		match self {
			Self::Unset => current,
			Self::Cleared => None,
			Self::Value(port) => Some(port),
		}
	}
}
