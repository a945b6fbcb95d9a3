#![cfg_attr(docsrs, feature(doc_auto_cfg))]
//! Compose safety and settings-reconciliation engine for DAppNode packages.
//!
//! Every compose document goes through this crate before it reaches the container engine:
//! untrusted documents are sanitized, legacy manifests are converted, and the settings a user
//! applied to a package are extracted from the live document and re-applied on the next one.
//!
//! All operations are pure functions of their inputs. The caller must make sure that a
//! package's compose document and labels are not mutated concurrently while they run.

pub use defaults_table::*;
pub use environment::*;
pub use errors::*;
pub use labels::*;
pub use manifest::*;
pub use naming::*;
pub use params::*;
pub use ports::*;
pub use sanitizer::*;
pub use user_settings::*;
pub use volumes::*;

pub mod defaults_table;
pub mod environment;
pub mod errors;
pub mod labels;
pub mod legacy;
pub mod manifest;
pub mod naming;
pub mod params;
pub mod ports;
pub mod sanitizer;
pub mod user_settings;
pub mod volumes;

/// Entry point of the engine, bundling the fleet constants and the naming policy.
#[derive(Clone, Debug, Default)]
pub struct ComposeEngine<N = DappnodeNaming> {
	pub(crate) params: EngineParams,
	pub(crate) naming: N,
}

impl ComposeEngine {
	pub fn new() -> Self {
		Self::default()
	}
}

impl<N: NamingPolicy> ComposeEngine<N> {
	pub fn with_naming(params: EngineParams, naming: N) -> Result<Self, ComposeError> {
		params.validate()?;

		Ok(Self { params, naming })
	}

	pub fn params(&self) -> &EngineParams {
		&self.params
	}

	pub fn naming(&self) -> &N {
		&self.naming
	}
}

impl ComposeEngine<DappnodeNaming> {
	pub fn with_params(params: EngineParams) -> Result<Self, ComposeError> {
		Self::with_naming(params, DappnodeNaming)
	}
}
