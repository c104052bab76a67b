//! Provider-facing types.
//!
//! Inventory handles are opaque identifiers issued by the hypervisor. The
//! engine passes them back into the provider but never interprets them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Program every guest command is launched through.
pub const ELEVATION_PROGRAM: &str = "/usr/bin/sudo";

/// Adapter type the network backing is built for.
pub const ADAPTER_TYPE: &str = "VMXNET3";

macro_rules! object_ref {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Returns the provider identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

object_ref!(
    /// Datacenter handle.
    DatacenterRef
);
object_ref!(
    /// Datastore handle.
    DatastoreRef
);
object_ref!(
    /// Compute host handle.
    HostRef
);
object_ref!(
    /// Resource pool handle.
    ResourcePoolRef
);
object_ref!(
    /// VM folder handle.
    FolderRef
);
object_ref!(
    /// Virtual machine or template handle.
    VmRef
);
object_ref!(
    /// Asynchronous task handle.
    TaskRef
);

/// Network handle, including the kind of backing it provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRef {
    /// Provider identifier.
    pub id: String,
    /// Backing kind, e.g. `STANDARD_PORTGROUP` or `DISTRIBUTED_PORTGROUP`.
    pub backing: String,
}

/// Placement and power options for a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneSpec {
    /// Target datastore.
    pub datastore: DatastoreRef,
    /// Target host.
    pub host: HostRef,
    /// Target resource pool.
    pub resource_pool: ResourcePoolRef,
    /// Power the clone on once created.
    pub power_on: bool,
}

/// Final state of an asynchronous task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskOutcome {
    /// Object produced by the task, if any.
    pub result: Option<VmRef>,
    /// Error detail reported by the task, if any.
    pub error: Option<String>,
}

/// A virtual network adapter on a VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAdapter {
    /// Device key.
    pub key: String,
    /// Device label.
    pub label: String,
    /// Emulated adapter type, e.g. `VMXNET3`.
    pub adapter_type: String,
}

/// A provisioned VM, ready for guest operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmHandle {
    /// Provider handle.
    pub vm: VmRef,
    /// VM name.
    pub name: String,
    /// IP address reported by the guest.
    pub ip: String,
}

/// Username/password credentials for in-guest operations.
#[derive(Clone, PartialEq, Eq)]
pub struct GuestCredentials {
    user: String,
    pass: String,
}

impl GuestCredentials {
    /// Creates guest credentials.
    #[must_use]
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }

    /// Returns the user name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Returns the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.pass
    }
}

impl std::fmt::Debug for GuestCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestCredentials")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

/// A program launch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestProgramSpec {
    /// Absolute path of the program in the guest.
    pub program_path: String,
    /// Argument string.
    pub arguments: String,
}

impl GuestProgramSpec {
    /// Wraps a command line so it runs as `user` through the elevation program.
    #[must_use]
    pub fn elevated(user: &str, command_line: &str) -> Self {
        Self {
            program_path: ELEVATION_PROGRAM.to_string(),
            arguments: format!("-n -u {user} {command_line}"),
        }
    }
}

/// A guest process as reported by the guest agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    /// Process id.
    pub pid: i64,
    /// Full command line.
    pub command_line: String,
    /// Set once the process has exited.
    pub end_time: Option<DateTime<Utc>>,
    /// Exit code, meaningful once `end_time` is set.
    pub exit_code: i32,
}

/// A pending guest-to-host file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransfer {
    /// Remote path being transferred.
    pub path: String,
    /// URL the file contents can be fetched from.
    pub url: String,
}

/// VM power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerState {
    /// Running.
    PoweredOn,
    /// Stopped.
    PoweredOff,
    /// Suspended.
    Suspended,
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PoweredOn => write!(f, "poweredOn"),
            Self::PoweredOff => write!(f, "poweredOff"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevated_program_spec() {
        let spec = GuestProgramSpec::elevated("root", "/bin/yum update -y");
        assert_eq!(spec.program_path, "/usr/bin/sudo");
        assert_eq!(spec.arguments, "-n -u root /bin/yum update -y");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = GuestCredentials::new("root", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("root"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_power_state_wire_names() {
        let state: PowerState = serde_json::from_str("\"POWERED_OFF\"").unwrap();
        assert_eq!(state, PowerState::PoweredOff);
    }
}
