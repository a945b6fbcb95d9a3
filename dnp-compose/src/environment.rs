use dnp_compose_config::Environment;
use indexmap::IndexMap;

/// Environment variables keyed by name, in declaration order.
pub type EnvMap = IndexMap<String, String>;

/// Reads either form of a service's `environment` into a map.
///
/// The map form is taken as is (with `null` values read as empty strings). Lines go through
/// [`parse_environment_lines`].
pub fn parse_environment(environment: &Environment) -> EnvMap {
	match environment {
		Environment::Map(map) => map
			.iter()
			.filter(|(key, _)| !key.is_empty())
			.map(|(key, value)| {
				(
					key.clone(),
					value
						.as_ref()
						.map(ToString::to_string)
						.unwrap_or_default(),
				)
			})
			.collect(),
		Environment::List(lines) => parse_environment_lines(lines),
	}
}

/// Parses `KEY=VALUE` lines.
///
/// Lines are trimmed and split on the first `=`, so values may contain further `=`. A line
/// with no `=` yields an empty value. Blank lines and lines with an empty key are skipped.
pub fn parse_environment_lines<S: AsRef<str>>(lines: &[S]) -> EnvMap {
	let mut env = EnvMap::new();

	for line in lines {
		let line = line.as_ref().trim();

		if line.is_empty() {
			continue;
		}

		let (key, value) = line.split_once('=').unwrap_or((line, ""));

		if key.is_empty() {
			continue;
		}

		env.insert(key.to_string(), value.to_string());
	}

	env
}

/// Inverse of [`parse_environment_lines`]. Keys with an empty value are emitted bare.
pub fn stringify_environment(env: &EnvMap) -> Vec<String> {
	env.iter()
		.filter(|(key, _)| !key.is_empty())
		.map(|(key, value)| {
			if value.is_empty() {
				key.clone()
			} else {
				format!("{key}={value}")
			}
		})
		.collect()
}

/// Shallow merge where `high` wins on every key it defines.
pub fn merge_envs(high: &EnvMap, low: &EnvMap) -> EnvMap {
	let mut merged = low.clone();

	for (key, value) in high {
		merged.insert(key.clone(), value.clone());
	}

	merged.retain(|key, _| !key.is_empty());
	merged
}
