//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    ENV_DATACENTER, ENV_DATASTORE, ENV_ENDPOINT, ENV_GUEST_PASS, ENV_GUEST_USER, ENV_HOST,
    ENV_INSECURE, ENV_NETWORK, VmConfig,
};
use crate::engine::{
    DEFAULT_GUEST_IP_TIMEOUT_SECS, DEFAULT_MISS_LIMIT, DEFAULT_POWER_OFF_INTERVAL_SECS,
    DEFAULT_POWER_OFF_ITERATIONS, DEFAULT_WATCH_INTERVAL_SECS, EngineSettings,
};

/// vmforge - Plan-driven VM provisioning for vSphere.
#[derive(Parser, Debug)]
#[command(name = "vmforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log line format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a deployment plan.
    Run {
        /// Path to the plan file (JSON or YAML).
        plan: PathBuf,

        /// Provider settings.
        #[command(flatten)]
        provider: ProviderArgs,

        /// Engine tunables.
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Parse and check a plan without contacting vCenter.
    Check {
        /// Path to the plan file (JSON or YAML).
        plan: PathBuf,
    },
}

/// Provider settings taken from flags or environment.
///
/// Values set in the plan's `vmconfig` block take precedence over these.
#[derive(Args, Debug, Clone, Default)]
pub struct ProviderArgs {
    /// vCenter URL, https://username:password@<address>/sdk.
    #[arg(long, env = ENV_ENDPOINT, hide_env_values = true)]
    pub vcurl: Option<String>,

    /// Datacenter name.
    #[arg(long, env = ENV_DATACENTER)]
    pub datacenter: Option<String>,

    /// Datastore name.
    #[arg(long, env = ENV_DATASTORE)]
    pub datastore: Option<String>,

    /// Network name.
    #[arg(long, env = ENV_NETWORK)]
    pub network: Option<String>,

    /// Compute host name.
    #[arg(long, env = ENV_HOST)]
    pub hostname: Option<String>,

    /// User baked into the templates.
    #[arg(long = "templateUser", env = ENV_GUEST_USER)]
    pub template_user: Option<String>,

    /// Password of the template user.
    #[arg(long = "templatePass", env = ENV_GUEST_PASS, hide_env_values = true)]
    pub template_pass: Option<String>,

    /// Accept self-signed vCenter certificates.
    #[arg(long, env = ENV_INSECURE)]
    pub insecure: bool,
}

impl ProviderArgs {
    /// Returns the flag values as a provider settings overlay.
    #[must_use]
    pub fn to_vm_config(&self) -> VmConfig {
        VmConfig {
            endpoint: self.vcurl.clone(),
            datacenter: self.datacenter.clone(),
            datastore: self.datastore.clone(),
            network: self.network.clone(),
            host: self.hostname.clone(),
            guest_user: self.template_user.clone(),
            guest_pass: self.template_pass.clone(),
        }
    }

    /// Fills unset values from the process environment.
    ///
    /// Flags are parsed before `.env` is loaded, so this picks up variables
    /// that file introduced.
    #[must_use]
    pub fn refreshed_from_env(&self) -> Self {
        self.filled_from(|var| std::env::var(var).ok())
    }

    /// Fills unset values from `lookup`. Values already set are kept.
    #[must_use]
    pub fn filled_from(&self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let fill = |value: &Option<String>, var: &str| value.clone().or_else(|| lookup(var));

        Self {
            vcurl: fill(&self.vcurl, ENV_ENDPOINT),
            datacenter: fill(&self.datacenter, ENV_DATACENTER),
            datastore: fill(&self.datastore, ENV_DATASTORE),
            network: fill(&self.network, ENV_NETWORK),
            hostname: fill(&self.hostname, ENV_HOST),
            template_user: fill(&self.template_user, ENV_GUEST_USER),
            template_pass: fill(&self.template_pass, ENV_GUEST_PASS),
            insecure: self.insecure || lookup(ENV_INSECURE).is_some_and(|v| is_truthy(&v)),
        }
    }
}

/// Reads a boolean environment value the way clap does for flags.
fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "n" | "no" | "f" | "false" | "off"
    )
}

/// Engine tunables.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Seconds between process polls.
    #[arg(long, default_value_t = DEFAULT_WATCH_INTERVAL_SECS)]
    pub watch_interval: u64,

    /// Consecutive polls without a process record before giving up.
    #[arg(long, default_value_t = DEFAULT_MISS_LIMIT)]
    pub miss_limit: u32,

    /// Maximum seconds a single watched process may run.
    #[arg(long)]
    pub max_duration: Option<u64>,

    /// Seconds between power state polls.
    #[arg(long, default_value_t = DEFAULT_POWER_OFF_INTERVAL_SECS)]
    pub power_off_interval: u64,

    /// Power state polls before giving up on a shutdown.
    #[arg(long, default_value_t = DEFAULT_POWER_OFF_ITERATIONS)]
    pub power_off_iterations: u32,

    /// Seconds to wait for a guest IP address.
    #[arg(long, default_value_t = DEFAULT_GUEST_IP_TIMEOUT_SECS)]
    pub guest_ip_timeout: u64,

    /// Fail if a VM never powers off before template conversion.
    #[arg(long)]
    pub strict_power_off: bool,

    /// Fail if an execute references a result key nothing stored.
    #[arg(long)]
    pub strict_results: bool,
}

impl From<&EngineArgs> for EngineSettings {
    fn from(args: &EngineArgs) -> Self {
        Self {
            watch_interval: Duration::from_secs(args.watch_interval),
            miss_limit: args.miss_limit,
            watch_deadline: args.max_duration.map(Duration::from_secs),
            power_off_interval: Duration::from_secs(args.power_off_interval),
            power_off_iterations: args.power_off_iterations,
            guest_ip_timeout: Duration::from_secs(args.guest_ip_timeout),
            strict_power_off: args.strict_power_off,
            strict_results: args.strict_results,
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Log line format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable log lines.
    #[default]
    Text,
    /// One JSON object per log line.
    Json,
}
