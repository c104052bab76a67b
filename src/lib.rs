// ============================================================================
// Linting - Dangerous or non-idiomatic practices are flagged
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items should be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # vmforge
//!
//! Plan-driven VM provisioning and in-guest configuration for vSphere.
//!
//! ## Overview
//!
//! vmforge reads a deployment plan and, for each deployment in order:
//!
//! - Clones a VM from a template and attaches it to the configured network
//! - Waits for the guest to report an IP address
//! - Runs execute and download commands inside the guest through VMware Tools
//! - Optionally shuts the VM down and converts it into a new template
//!
//! Downloads can capture a guest file into a named result; a later execute
//! with the same result key runs the captured text as its command line. This
//! is how a join token produced on one VM is replayed on another.
//!
//! ## Failure model
//!
//! Execution is strictly sequential and every error is fatal to the run.
//! VMs created before a failure are left in place.
//!
//! ## Modules
//!
//! - [`config`]: Plan parsing, structural checks, and provider settings
//! - [`provider`]: Hypervisor provider contract and the vSphere client
//! - [`engine`]: Provisioning, command dispatch, process watching, and the deployment driver
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```json
//! {
//!   "label": "docker swarm",
//!   "version": "1",
//!   "deployments": [
//!     {
//!       "name": "manager",
//!       "note": "Build the swarm manager",
//!       "task": {
//!         "inputTemplate": "centos7-base",
//!         "outputName": "swarm-manager",
//!         "outputType": "vm",
//!         "commands": [
//!           { "type": "execute", "path": "/bin/yum", "args": "install -y docker" },
//!           { "type": "execute", "path": "/bin/sh", "args": "-c 'docker swarm join-token -q worker > /tmp/token'" },
//!           { "type": "download", "path": "/tmp/token", "resultKey": "token", "delAfterDownload": true }
//!         ]
//!       }
//!     }
//!   ]
//! }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod provider;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{DeploymentPlan, LoadedPlan, PlanParser, ProviderConfig};
pub use engine::{DeploymentDriver, EngineSettings, RunReport};
pub use error::{ForgeError, Result};
pub use provider::{HypervisorProvider, VSphereClient};
