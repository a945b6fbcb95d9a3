use dnp_compose_config::ComposeConfigError;
use thiserror::Error;

/// The kinds of errors that can occur while processing a compose document.
///
/// Anything that is merely dropped from a document is reported as a
/// [`ValidationAlert`](crate::ValidationAlert) instead.
#[derive(Debug, Error)]
pub enum ComposeError {
	// Structural errors
	#[error("The compose document does not declare any service")]
	NoServices,

	#[error(transparent)]
	Model(#[from] ComposeConfigError),

	#[error("Invalid port mapping `{value}`: {reason}")]
	InvalidPortMapping { value: String, reason: String },

	// Policy violations
	#[error("Service `{service}` is not allowed to bind the host path `{host_path}`")]
	ForbiddenBindMount { service: String, host_path: String },

	#[error("Package `{package}` declares external volumes, which are no longer supported")]
	ExternalVolumesForbidden { package: String },

	// Configuration
	#[error("Invalid engine configuration: {0}")]
	InvalidConfig(String),
}
