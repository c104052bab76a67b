//! Deployment driver.
//!
//! Runs every deployment of a plan in order: provision, run commands, and
//! for template outputs shut the VM down and mark it as a template. The first
//! error aborts the whole run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::{Deployment, DeploymentPlan, OutputType, ProviderConfig};
use crate::error::{ExecutionError, ForgeError, Result};
use crate::provider::{HypervisorProvider, PowerState, VmHandle};

use super::EngineSettings;
use super::context::ExecutionContext;
use super::dispatcher::CommandDispatcher;
use super::provisioner::Provisioner;

/// Outcome of one completed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentReport {
    /// Deployment name.
    pub name: String,
    /// Name of the VM or template produced.
    pub vm_name: String,
    /// Guest IP observed after provisioning.
    pub ip: String,
    /// What the deployment left behind.
    pub output_type: OutputType,
    /// Number of commands run.
    pub commands_run: usize,
}

/// Summary of a plan run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Plan label.
    pub label: String,
    /// Plan version.
    pub version: String,
    /// SHA-256 of the plan file, when run from a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_digest: Option<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Completed deployments, in plan order.
    pub deployments: Vec<DeploymentReport>,
}

impl RunReport {
    /// Records the digest of the plan file the run came from.
    #[must_use]
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.plan_digest = Some(digest.into());
        self
    }

    /// Returns the wall-clock duration of the run in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// Returns the number of templates produced.
    #[must_use]
    pub fn template_count(&self) -> usize {
        self.deployments
            .iter()
            .filter(|d| d.output_type == OutputType::Template)
            .count()
    }
}

/// Drives a plan through provisioning, commands, and finalization.
pub struct DeploymentDriver<'a> {
    provider: &'a dyn HypervisorProvider,
    settings: EngineSettings,
}

impl<'a> DeploymentDriver<'a> {
    /// Creates a driver.
    #[must_use]
    pub const fn new(provider: &'a dyn HypervisorProvider, settings: EngineSettings) -> Self {
        Self { provider, settings }
    }

    /// Runs every deployment of `plan` in order.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by provisioning, command execution, or
    /// template finalization. Later deployments do not run.
    pub async fn run(&self, plan: &DeploymentPlan, config: &ProviderConfig) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);

        async {
            let started_at = Utc::now();
            info!(
                "Running plan '{}' ({} deployments, {} commands)",
                plan.label,
                plan.deployments.len(),
                plan.total_commands()
            );

            let mut ctx = ExecutionContext::new();
            let mut deployments = Vec::with_capacity(plan.deployments.len());

            for (index, deployment) in plan.deployments.iter().enumerate() {
                info!(
                    "Deployment {}/{}: {}",
                    index + 1,
                    plan.deployments.len(),
                    deployment.name
                );
                deployments.push(self.run_deployment(deployment, config, &mut ctx).await?);
            }

            let finished_at = Utc::now();
            info!("Plan '{}' completed", plan.label);

            Ok::<_, ForgeError>(RunReport {
                run_id,
                label: plan.label.clone(),
                version: plan.version.clone(),
                plan_digest: None,
                started_at,
                finished_at,
                deployments,
            })
        }
        .instrument(span)
        .await
    }

    async fn run_deployment(
        &self,
        deployment: &Deployment,
        config: &ProviderConfig,
        ctx: &mut ExecutionContext,
    ) -> Result<DeploymentReport> {
        if !deployment.note.is_empty() {
            info!("{}", deployment.note);
        }
        let task = &deployment.task;

        let vm = Provisioner::new(self.provider, self.settings.guest_ip_timeout)
            .provision(config, &task.input_template, &task.output_name)
            .await?;

        let credentials = config.template_credentials.clone();
        let commands_run = CommandDispatcher::new(self.provider, &self.settings)
            .run_commands(&vm, &credentials, deployment, ctx)
            .await?;

        if task.output_type == OutputType::Template {
            self.finalize_template(&vm).await?;
        }

        Ok(DeploymentReport {
            name: deployment.name.clone(),
            vm_name: vm.name,
            ip: vm.ip,
            output_type: task.output_type,
            commands_run,
        })
    }

    /// Shuts the VM down and marks it as a template.
    ///
    /// # Errors
    ///
    /// Returns `TemplateFinalization` if shutdown or conversion fails, or if
    /// the VM never powers off and strict power-off is enabled.
    pub async fn finalize_template(&self, vm: &VmHandle) -> Result<()> {
        let failed = |e: ForgeError| ExecutionError::TemplateFinalization {
            vm_name: vm.name.clone(),
            reason: e.to_string(),
        };

        info!("Shutting down {} before template conversion", vm.name);
        self.provider.shutdown_guest(&vm.vm).await.map_err(failed)?;

        let iterations = self.settings.power_off_iterations;
        let mut powered_off = false;
        for attempt in 1..=iterations {
            let state = self.provider.power_state(&vm.vm).await.map_err(failed)?;
            if state == PowerState::PoweredOff {
                debug!("{} powered off after {attempt} polls", vm.name);
                powered_off = true;
                break;
            }
            if attempt < iterations {
                tokio::time::sleep(self.settings.power_off_interval).await;
            }
        }

        if !powered_off {
            let waited = self.settings.power_off_interval * self.settings.power_off_iterations;
            if self.settings.strict_power_off {
                return Err(ExecutionError::TemplateFinalization {
                    vm_name: vm.name.clone(),
                    reason: format!("still powered on after {}s", waited.as_secs()),
                }
                .into());
            }
            warn!(
                "{} still powered on after {}s, marking as template anyway",
                vm.name,
                waited.as_secs()
            );
        }

        self.provider.mark_as_template(&vm.vm).await.map_err(failed)?;
        info!("{} is now a template", vm.name);
        Ok(())
    }
}
