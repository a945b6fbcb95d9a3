use std::sync::LazyLock;

use regex::Regex;

static REPEATED_SLASHES: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"/{2,}").expect("Failed to initialize the slashes regex"));

/// Host paths start with `/` or `~`, anything else is a volume name.
static VOLUME_NAME: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[^/~]").expect("Failed to initialize the volume name regex"));

/// A service volume in its `host:container` short form.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct VolumeMapping {
	/// Normalized path inside the container. Never empty.
	pub container: String,
	/// The normalized host side as written: a volume name or a host path. Empty for anonymous
	/// volumes.
	pub host: String,
	/// Set when the host side is a named volume.
	pub name: Option<String>,
}

impl VolumeMapping {
	pub fn is_bind(&self) -> bool {
		self.name.is_none() && !self.host.is_empty()
	}
}

/// Collapses repeated slashes and strips one trailing slash, preserving the root `/`.
///
/// Absolute paths also have their `.` and `..` segments resolved, and `..` never climbs above
/// the root. Relative paths are otherwise kept as written.
pub fn normalize_path(path: &str) -> String {
	let path = path.trim();

	if !path.starts_with('/') {
		let collapsed = REPEATED_SLASHES.replace_all(path, "/");

		return match collapsed.strip_suffix('/') {
			Some(stripped) if !stripped.is_empty() => stripped.to_string(),
			_ => collapsed.into_owned(),
		};
	}

	let mut segments: Vec<&str> = Vec::new();
	for segment in path.split('/') {
		match segment {
			"" | "." => {}
			".." => {
				segments.pop();
			}
			segment => segments.push(segment),
		}
	}

	format!("/{}", segments.join("/"))
}

/// Whether binding `host` exposes `target`: the same path or one of its ancestors.
pub fn bind_covers(host: &str, target: &str) -> bool {
	let host = normalize_path(host);
	let target = normalize_path(target);

	host == "/" || host == target || target.starts_with(&format!("{host}/"))
}

pub fn is_volume_name(host: &str) -> bool {
	VOLUME_NAME.is_match(host)
}

/// Parses short-syntax volume entries. Entries with an empty container path are dropped.
pub fn parse_volume_mappings<S: AsRef<str>>(volumes: &[S]) -> Vec<VolumeMapping> {
	volumes
		.iter()
		.filter_map(|entry| {
			let entry = entry.as_ref();
			let (host, container) = entry.split_once(':').unwrap_or(("", entry));

			let container = normalize_path(container);
			if container.is_empty() {
				return None;
			}

			let host = normalize_path(host);
			let name = is_volume_name(&host).then(|| host.clone());

			Some(VolumeMapping {
				container,
				host,
				name,
			})
		})
		.collect()
}

pub fn stringify_volume_mappings(mappings: &[VolumeMapping]) -> Vec<String> {
	mappings
		.iter()
		.map(|mapping| {
			let host = mapping.name.as_deref().unwrap_or(&mapping.host);

			if host.is_empty() {
				mapping.container.clone()
			} else {
				format!("{host}:{}", mapping.container)
			}
		})
		.collect()
}
