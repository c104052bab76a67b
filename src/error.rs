//! Error types for the vmforge provisioning engine.
//!
//! This module provides the error hierarchy for every stage of a plan run:
//! configuration loading, hypervisor provider calls, in-guest command
//! execution, and remote process watching. Every variant is fatal to the run;
//! errors are propagated up to the driver and then to `main`.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for vmforge.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// Configuration and plan loading errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Hypervisor provider errors.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// In-guest command execution errors.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Remote process watch errors.
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration and plan loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The plan file was not found.
    #[error("Plan file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The plan file could not be parsed.
    #[error("Failed to parse plan: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A required provider or credential field is absent from every source.
    #[error("Missing required setting '{field}' (set it in the plan's vmconfig, pass --{flag}, or export {env_var})")]
    ConfigMissing {
        /// Field name in the plan's `vmconfig` block.
        field: String,
        /// Command-line flag carrying the field.
        flag: String,
        /// Environment variable carrying the field.
        env_var: String,
    },

    /// The plan has the wrong structural shape.
    #[error("Invalid plan: {message}")]
    InvalidPlan {
        /// Description of the shape problem.
        message: String,
        /// Location of the offending element, e.g. `deployments[0].task.commands[2]`.
        location: Option<String>,
    },
}

/// Hypervisor provider errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A named inventory object could not be resolved.
    #[error("{kind} [{name}] could not be found")]
    ResourceNotFound {
        /// Kind of resource (datacenter, datastore, host, ...).
        kind: ResourceKind,
        /// Name that failed to resolve.
        name: String,
    },

    /// The clone task failed or produced no VM.
    #[error("Provisioning of '{vm_name}' failed: {detail}")]
    ProvisioningFailed {
        /// Requested VM name.
        vm_name: String,
        /// Provider-supplied detail.
        detail: String,
    },

    /// The cloned VM has no primary network adapter.
    #[error("Network adapter {device} does not exist on VM '{vm_name}'")]
    DeviceNotFound {
        /// VM that was inspected.
        vm_name: String,
        /// Device label that was expected.
        device: String,
    },

    /// The guest never reported an IP address.
    #[error("Guest '{vm_name}' did not report an IP address within {timeout_secs}s")]
    GuestUnreachable {
        /// VM that was waited on.
        vm_name: String,
        /// Timeout that elapsed.
        timeout_secs: u64,
    },

    /// Authentication against the management endpoint failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with the hypervisor: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response from the hypervisor API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Kinds of inventory objects resolved during provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Datacenter.
    Datacenter,
    /// Datastore.
    Datastore,
    /// Compute host.
    Host,
    /// Resource pool attached to a host.
    ResourcePool,
    /// VM folder of a datacenter.
    Folder,
    /// Network.
    Network,
    /// Source template.
    Template,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Datacenter => "Datacenter",
            Self::Datastore => "Datastore",
            Self::Host => "Host",
            Self::ResourcePool => "Resource pool",
            Self::Folder => "VM folder",
            Self::Network => "Network",
            Self::Template => "Template",
        };
        write!(f, "{s}")
    }
}

/// In-guest command execution errors.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A guest program could not be launched.
    #[error("Failed to start '{command}' on '{vm_name}': {reason}")]
    ExecutionFailed {
        /// VM the command targeted.
        vm_name: String,
        /// Command line that was launched.
        command: String,
        /// Underlying reason.
        reason: String,
    },

    /// A guest file transfer or delete failed.
    #[error("Transfer of '{path}' from '{vm_name}' failed: {reason}")]
    TransferFailed {
        /// VM the file lives on.
        vm_name: String,
        /// Remote path.
        path: String,
        /// Underlying reason.
        reason: String,
    },

    /// An execute referenced a result key nothing has stored.
    #[error("No result stored under key '{key}'")]
    MissingResult {
        /// Result key that was looked up.
        key: String,
    },

    /// Shutdown or template conversion failed.
    #[error("Failed to convert '{vm_name}' to a template: {reason}")]
    TemplateFinalization {
        /// VM being converted.
        vm_name: String,
        /// Underlying reason.
        reason: String,
    },
}

/// Remote process watch failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WatchError {
    /// The process finished with a non-zero exit code.
    #[error("Process {pid} exited with code {code}, investigate logs on the virtual machine")]
    NonZeroExit {
        /// Watched PID.
        pid: i64,
        /// Exit code reported by the guest.
        code: i32,
    },

    /// The guest stopped reporting the process.
    #[error("Process {pid} no longer visible after {misses} consecutive polls, guest tools may have restarted")]
    Lost {
        /// Watched PID.
        pid: i64,
        /// Consecutive polls without a record.
        misses: u32,
    },

    /// The process ran past the configured deadline.
    #[error("Process {pid} still running after {elapsed_secs}s")]
    DeadlineExceeded {
        /// Watched PID.
        pid: i64,
        /// Seconds elapsed when the watch gave up.
        elapsed_secs: u64,
    },
}

/// Result type alias for vmforge operations.
pub type Result<T> = std::result::Result<T, ForgeError>;

impl ForgeError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is a transient network failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(ProviderError::NetworkError { .. }))
    }
}

impl ConfigError {
    /// Creates a structural plan error at the given location.
    #[must_use]
    pub fn invalid_plan(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::InvalidPlan {
            message: message.into(),
            location: Some(location.into()),
        }
    }
}

impl ProviderError {
    /// Creates a resource-not-found error.
    #[must_use]
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}
