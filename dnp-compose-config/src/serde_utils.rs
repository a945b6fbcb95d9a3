use std::{
	collections::BTreeMap,
	fmt::{self, Display},
};

#[cfg(feature = "schemars")]
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, PartialOrd, Ord)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(untagged)]
pub enum StringOrNum {
	Num(i64),
	String(String),
}

impl Display for StringOrNum {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Num(n) => write!(f, "{n}"),
			Self::String(s) => f.write_str(s),
		}
	}
}

impl From<&str> for StringOrNum {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for StringOrNum {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, PartialOrd, Ord)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(untagged)]
pub enum StringOrList {
	String(String),
	List(Vec<String>),
}

impl StringOrList {
	pub fn is_empty(&self) -> bool {
		match self {
			Self::String(s) => s.is_empty(),
			Self::List(list) => list.is_empty(),
		}
	}
}

/// Compose fields that accept either `KEY=VALUE` lines or a map, such as labels.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(untagged)]
pub enum ListOrMap {
	List(Vec<String>),
	Map(BTreeMap<String, String>),
}

impl Default for ListOrMap {
	fn default() -> Self {
		Self::Map(BTreeMap::new())
	}
}

impl ListOrMap {
	pub fn is_empty(&self) -> bool {
		match self {
			Self::List(list) => list.is_empty(),
			Self::Map(map) => map.is_empty(),
		}
	}

	/// The map form. Lines are split on the first `=`, a line without one maps to an empty
	/// value, and lines with an empty key are skipped.
	pub fn to_map(&self) -> BTreeMap<String, String> {
		match self {
			Self::Map(map) => map.clone(),
			Self::List(list) => list
				.iter()
				.filter_map(|line| {
					let line = line.trim();
					let (key, value) = line.split_once('=').unwrap_or((line, ""));

					(!key.is_empty()).then(|| (key.to_string(), value.to_string()))
				})
				.collect(),
		}
	}

	pub fn into_map(self) -> BTreeMap<String, String> {
		match self {
			Self::Map(map) => map,
			list @ Self::List(_) => list.to_map(),
		}
	}
}

impl From<BTreeMap<String, String>> for ListOrMap {
	fn from(map: BTreeMap<String, String>) -> Self {
		Self::Map(map)
	}
}

/// A scalar as it can appear in a YAML map value (environment entries, driver options).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, PartialOrd)]
#[cfg_attr(feature = "schemars", derive(JsonSchema))]
#[serde(untagged)]
pub enum SingleValue {
	String(String),
	Bool(bool),
	Int(i64),
	Float(f64),
}

impl Display for SingleValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::String(s) => f.write_str(s),
			Self::Bool(b) => write!(f, "{b}"),
			Self::Int(i) => write!(f, "{i}"),
			Self::Float(fl) => write!(f, "{fl}"),
		}
	}
}

impl From<&str> for SingleValue {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for SingleValue {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

/// Compose allows `name:` with no body for volumes and networks. Those come through as `null`
/// and are read as the default declaration.
pub(crate) fn deserialize_nullable_map<'de, D, T>(
	deserializer: D,
) -> Result<BTreeMap<String, T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de> + Default,
{
	let map: Option<BTreeMap<String, Option<T>>> = Option::deserialize(deserializer)?;

	Ok(map
		.unwrap_or_default()
		.into_iter()
		.map(|(name, value)| (name, value.unwrap_or_default()))
		.collect())
}
