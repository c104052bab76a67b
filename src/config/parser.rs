//! Plan file loading.
//!
//! This module reads a deployment plan from disk, picks the decoder from the
//! file extension (YAML for `.yaml`/`.yml`, JSON otherwise), and performs the
//! structural checks a plan must pass before anything talks to the
//! hypervisor. No semantic validation is performed.

use crate::error::{ConfigError, ForgeError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::digest::PlanDigest;
use super::spec::{CommandKind, DeploymentPlan};

/// Decoder used for a plan file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    /// JSON document.
    Json,
    /// YAML document.
    Yaml,
}

/// A parsed plan together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedPlan {
    /// The parsed plan.
    pub plan: DeploymentPlan,
    /// Digest of the raw file bytes.
    pub digest: PlanDigest,
    /// Path the plan was read from.
    pub path: PathBuf,
}

/// Plan loader.
#[derive(Debug, Default)]
pub struct PlanParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl PlanParser {
    /// Creates a new plan parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path used to find `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads and checks a plan file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be parsed, or has the
    /// wrong shape.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<LoadedPlan> {
        let path = path.as_ref();
        info!("Loading plan from: {}", path.display());

        if !path.exists() {
            return Err(ForgeError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let bytes = std::fs::read(path).map_err(|e| {
            ForgeError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        let content = std::str::from_utf8(&bytes).map_err(|e| {
            ForgeError::Config(ConfigError::ParseError {
                message: format!("Plan is not valid UTF-8: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;
        let plan = self.parse_str(content, Self::format_for(path), Some(path))?;

        info!(
            "Finished parsing [{}], {} deployment(s) and {} command(s) will be run",
            plan.label,
            plan.deployments.len(),
            plan.total_commands()
        );

        Ok(LoadedPlan {
            plan,
            digest: PlanDigest::of_bytes(&bytes),
            path: path.to_path_buf(),
        })
    }

    /// Parses and checks a plan from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or has the wrong shape.
    pub fn parse_str(
        &self,
        content: &str,
        format: PlanFormat,
        source: Option<&Path>,
    ) -> Result<DeploymentPlan> {
        debug!("Parsing {format:?} plan");

        let location = source.map(|p| p.display().to_string());
        let plan: DeploymentPlan = match format {
            PlanFormat::Json => serde_json::from_str(content).map_err(|e| {
                ForgeError::Config(ConfigError::ParseError {
                    message: format!("JSON parse error: {e}"),
                    location,
                })
            })?,
            PlanFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
                ForgeError::Config(ConfigError::ParseError {
                    message: format!("YAML parse error: {e}"),
                    location,
                })
            })?,
        };

        Self::check_shape(&plan)?;
        Ok(plan)
    }

    /// Picks the decoder for a path from its extension.
    #[must_use]
    pub fn format_for(path: &Path) -> PlanFormat {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                PlanFormat::Yaml
            }
            _ => PlanFormat::Json,
        }
    }

    /// Checks the structural requirements of each command.
    fn check_shape(plan: &DeploymentPlan) -> Result<()> {
        if plan.deployments.is_empty() {
            warn!("Plan [{}] contains no deployments", plan.label);
        }

        for (d, deployment) in plan.deployments.iter().enumerate() {
            let task = &deployment.task;
            if task.input_template.trim().is_empty() {
                return Err(ConfigError::invalid_plan(
                    "inputTemplate must not be empty",
                    format!("deployments[{d}].task"),
                )
                .into());
            }
            if task.output_name.trim().is_empty() {
                return Err(ConfigError::invalid_plan(
                    "outputName must not be empty",
                    format!("deployments[{d}].task"),
                )
                .into());
            }

            for (c, command) in task.commands.iter().enumerate() {
                let location = format!("deployments[{d}].task.commands[{c}]");
                match command.kind {
                    CommandKind::Download if command.path.trim().is_empty() => {
                        return Err(ConfigError::invalid_plan(
                            "download requires a remote path",
                            location,
                        )
                        .into());
                    }
                    CommandKind::Execute
                        if command.path.trim().is_empty() && command.result_key().is_none() =>
                    {
                        return Err(ConfigError::invalid_plan(
                            "execute requires a path or a resultKey",
                            location,
                        )
                        .into());
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ForgeError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}
