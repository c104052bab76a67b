//! Configuration module for vmforge.
//!
//! This module handles everything that happens before the first provider call:
//! - Parsing deployment plan files (JSON or YAML)
//! - Structural checks on deployments and commands
//! - Resolving provider settings from plan file, flags, and environment
//! - Digesting plan files for traceability

mod digest;
mod parser;
mod provider;
mod spec;

pub use digest::PlanDigest;
pub use parser::{LoadedPlan, PlanFormat, PlanParser};
pub use provider::{
    ENV_DATACENTER, ENV_DATASTORE, ENV_ENDPOINT, ENV_GUEST_PASS, ENV_GUEST_USER, ENV_HOST,
    ENV_INSECURE, ENV_NETWORK, ProviderConfig,
};
pub use spec::{
    Command, CommandKind, DEFAULT_RUN_AS_USER, Deployment, DeploymentPlan, DeploymentTask,
    OutputType, VmConfig,
};
