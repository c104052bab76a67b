//! VM provisioning from templates.
//!
//! Turns a template name into a running, network-attached VM with a guest IP.
//! Every inventory name is resolved before the clone is issued so a typo never
//! costs a clone.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ResourceKind, Result};
use crate::provider::{ADAPTER_TYPE, CloneSpec, HypervisorProvider, VmHandle};

/// Label reported when a clone has no network adapter.
const PRIMARY_ADAPTER: &str = "ethernet-0";

/// Provisions VMs through a hypervisor provider.
pub struct Provisioner<'a> {
    provider: &'a dyn HypervisorProvider,
    guest_ip_timeout: Duration,
}

impl<'a> Provisioner<'a> {
    /// Creates a provisioner.
    #[must_use]
    pub fn new(provider: &'a dyn HypervisorProvider, guest_ip_timeout: Duration) -> Self {
        Self {
            provider,
            guest_ip_timeout,
        }
    }

    /// Clones `input_template` into `output_name` and waits for the guest.
    ///
    /// A VM created here is left in place if a later step fails.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for the first unresolvable name,
    /// `ProvisioningFailed` if the clone task fails, `DeviceNotFound` if the
    /// clone has no network adapter, and `GuestUnreachable` if no IP is
    /// reported within the timeout.
    pub async fn provision(
        &self,
        config: &ProviderConfig,
        input_template: &str,
        output_name: &str,
    ) -> Result<VmHandle> {
        let provider = self.provider;
        info!("Provisioning {output_name} from template {input_template}");

        let datacenter = provider
            .find_datacenter(&config.datacenter)
            .await?
            .ok_or_else(|| ProviderError::not_found(ResourceKind::Datacenter, &config.datacenter))?;
        let datastore = provider
            .find_datastore(&datacenter, &config.datastore)
            .await?
            .ok_or_else(|| ProviderError::not_found(ResourceKind::Datastore, &config.datastore))?;
        let host = provider
            .find_host(&datacenter, &config.host)
            .await?
            .ok_or_else(|| ProviderError::not_found(ResourceKind::Host, &config.host))?;
        let resource_pool = provider
            .host_resource_pool(&host)
            .await?
            .ok_or_else(|| ProviderError::not_found(ResourceKind::ResourcePool, &config.host))?;
        let folder = provider
            .vm_folder(&datacenter)
            .await?
            .ok_or_else(|| ProviderError::not_found(ResourceKind::Folder, &config.datacenter))?;
        let network = provider
            .find_network(&datacenter, &config.network)
            .await?
            .ok_or_else(|| ProviderError::not_found(ResourceKind::Network, &config.network))?;
        let template = provider
            .find_template(&datacenter, input_template)
            .await?
            .ok_or_else(|| ProviderError::not_found(ResourceKind::Template, input_template))?;
        debug!("Resolved inventory for {output_name}: datastore {datastore}, host {host}, network {}", network.id);

        let spec = CloneSpec {
            datastore,
            host,
            resource_pool,
            power_on: true,
        };
        let task = provider.clone_vm(&template, &folder, output_name, &spec).await?;
        let outcome = provider.await_task(&task).await?;

        if let Some(detail) = outcome.error {
            return Err(ProviderError::ProvisioningFailed {
                vm_name: output_name.to_string(),
                detail,
            }
            .into());
        }
        let vm = outcome.result.ok_or_else(|| ProviderError::ProvisioningFailed {
            vm_name: output_name.to_string(),
            detail: String::from("clone task completed without a VM"),
        })?;
        info!("Cloned {output_name} ({vm})");

        let adapter = provider
            .primary_network_adapter(&vm)
            .await?
            .ok_or_else(|| ProviderError::DeviceNotFound {
                vm_name: output_name.to_string(),
                device: PRIMARY_ADAPTER.to_string(),
            })?;
        if !adapter.adapter_type.eq_ignore_ascii_case(ADAPTER_TYPE) {
            warn!(
                "{output_name}: {} is {}, expected {ADAPTER_TYPE}",
                adapter.label, adapter.adapter_type
            );
        }
        provider.edit_network_device(&vm, &adapter, &network).await?;
        debug!("Attached {} to network {}", adapter.label, config.network);

        info!("Waiting for {output_name} to report an IP address");
        let ip = tokio::time::timeout(self.guest_ip_timeout, provider.wait_for_guest_ip(&vm))
            .await
            .map_err(|_| ProviderError::GuestUnreachable {
                vm_name: output_name.to_string(),
                timeout_secs: self.guest_ip_timeout.as_secs(),
            })??;
        info!("{output_name} is up at {ip}");

        Ok(VmHandle {
            vm,
            name: output_name.to_string(),
            ip,
        })
    }
}
