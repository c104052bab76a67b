//! vmforge CLI entrypoint.
//!
//! This is the main entrypoint for the vmforge command-line tool.

use std::path::Path;
use std::process::ExitCode;

use vmforge::cli::{Cli, Commands, EngineArgs, LogFormat, OutputFormatter, ProviderArgs};
use vmforge::config::{PlanParser, ProviderConfig};
use vmforge::engine::{DeploymentDriver, EngineSettings};
use vmforge::error::Result;
use vmforge::provider::VSphereClient;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Check { plan } => cmd_check(&plan, &formatter),
        Commands::Run {
            plan,
            provider,
            engine,
        } => cmd_run(&plan, &provider, &engine, &formatter).await,
    }
}

/// Parses and checks a plan.
fn cmd_check(plan_path: &Path, formatter: &OutputFormatter) -> Result<()> {
    let loaded = PlanParser::new().load_file(plan_path)?;

    eprintln!("{}", formatter.format_plan_summary(&loaded));
    eprintln!("Plan is valid!");
    Ok(())
}

/// Executes a plan against vCenter.
async fn cmd_run(
    plan_path: &Path,
    provider_args: &ProviderArgs,
    engine_args: &EngineArgs,
    formatter: &OutputFormatter,
) -> Result<()> {
    // Load .env beside the plan before reading provider settings
    let parser = PlanParser::new().with_base_path(
        plan_path
            .parent()
            .unwrap_or_else(|| Path::new(".")),
    );
    parser.load_dotenv()?;

    let loaded = parser.load_file(plan_path)?;
    debug!("Plan digest: {}", loaded.digest);

    // Flags were parsed before .env was loaded, so merge again with the
    // refreshed environment.
    let provider_args = provider_args.refreshed_from_env();
    let config = ProviderConfig::resolve(loaded.plan.vm_config.as_ref(), &provider_args.to_vm_config())?;

    let client = VSphereClient::connect(&config.endpoint, provider_args.insecure).await?;
    info!("Connected to vCenter");

    let settings = EngineSettings::from(engine_args);
    let driver = DeploymentDriver::new(&client, settings);
    let report = driver
        .run(&loaded.plan, &config)
        .await?
        .with_digest(loaded.digest.to_string());

    eprintln!("{}", formatter.format_report(&report));
    Ok(())
}

