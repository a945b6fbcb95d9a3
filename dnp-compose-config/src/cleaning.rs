use std::collections::BTreeMap;

use serde_json::Value;

use crate::{ComposeDocument, Logging, Service};

/// Removes the fields that hold no value from a compose document.
///
/// Most compose tooling rejects empty blocks such as `environment: {}` or `ports: []`, so
/// emptiness is always represented by the absence of the field. Cleaning happens at the
/// document level and at each service level. `container_name` and `image` are never removed.
pub fn clean_compose(mut compose: ComposeDocument) -> ComposeDocument {
	compose.clean();
	compose
}

impl ComposeDocument {
	/// In-place version of [`clean_compose`].
	pub fn clean(&mut self) {
		if self
			.version
			.as_ref()
			.is_some_and(|version| version.is_empty())
		{
			self.version = None;
		}

		retain_meaningful(&mut self.extensions);

		for service in self.services.values_mut() {
			service.clean();
		}
	}
}

impl Service {
	pub fn clean(&mut self) {
		drop_if_empty(&mut self.cap_add, Vec::is_empty);
		drop_if_empty(&mut self.cap_drop, Vec::is_empty);
		drop_if_empty(&mut self.command, |command| command.is_empty());
		drop_if_empty(&mut self.devices, Vec::is_empty);
		drop_if_empty(&mut self.dns, String::is_empty);
		drop_if_empty(&mut self.environment, |env| env.is_empty());
		drop_if_empty(&mut self.labels, |labels| labels.is_empty());
		drop_if_empty(&mut self.network_mode, String::is_empty);
		drop_if_empty(&mut self.networks, |networks| networks.is_empty());
		drop_if_empty(&mut self.ports, Vec::is_empty);
		drop_if_empty(&mut self.restart, String::is_empty);
		drop_if_empty(&mut self.volumes, Vec::is_empty);

		if let Some(logging) = self.logging.as_mut() {
			drop_if_empty(&mut logging.options, BTreeMap::is_empty);
		}
		drop_if_empty(&mut self.logging, |logging| *logging == Logging::default());

		retain_meaningful(&mut self.extensions);
	}
}

fn drop_if_empty<T>(field: &mut Option<T>, is_empty: impl FnOnce(&T) -> bool) {
	if field.as_ref().is_some_and(is_empty) {
		*field = None;
	}
}

fn retain_meaningful(extensions: &mut BTreeMap<String, Value>) {
	extensions.retain(|_, value| !is_empty_value(value));
}

fn is_empty_value(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Array(list) => list.is_empty(),
		Value::Object(map) => map.is_empty(),
		_ => false,
	}
}
