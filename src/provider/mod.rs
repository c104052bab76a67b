//! Remote hypervisor provider.
//!
//! The engine only ever talks to the hypervisor through [`HypervisorProvider`].
//! [`VSphereClient`] implements it against the vSphere Automation REST API;
//! tests substitute mocks and recording fakes.

mod types;
mod vsphere;

use async_trait::async_trait;

use crate::error::Result;

pub use types::{
    ADAPTER_TYPE, CloneSpec, DatacenterRef, DatastoreRef, ELEVATION_PROGRAM, FileTransfer,
    FolderRef, GuestCredentials, GuestProgramSpec, HostRef, NetworkAdapter, NetworkRef,
    PowerState, ProcessRecord, ResourcePoolRef, TaskOutcome, TaskRef, VmHandle, VmRef,
};
pub use vsphere::VSphereClient;

/// Operations the engine needs from a hypervisor and its guest agent.
///
/// Lookups return `Ok(None)` when a name does not resolve; the caller decides
/// which error that becomes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HypervisorProvider: Send + Sync {
    /// Finds a datacenter by name.
    async fn find_datacenter(&self, name: &str) -> Result<Option<DatacenterRef>>;

    /// Finds a datastore by name within a datacenter.
    async fn find_datastore(&self, datacenter: &DatacenterRef, name: &str) -> Result<Option<DatastoreRef>>;

    /// Finds a compute host by name within a datacenter.
    async fn find_host(&self, datacenter: &DatacenterRef, name: &str) -> Result<Option<HostRef>>;

    /// Returns the resource pool attached to a host.
    async fn host_resource_pool(&self, host: &HostRef) -> Result<Option<ResourcePoolRef>>;

    /// Returns the root VM folder of a datacenter.
    async fn vm_folder(&self, datacenter: &DatacenterRef) -> Result<Option<FolderRef>>;

    /// Finds a network by name within a datacenter.
    async fn find_network(&self, datacenter: &DatacenterRef, name: &str) -> Result<Option<NetworkRef>>;

    /// Finds a VM or template by name within a datacenter.
    async fn find_template(&self, datacenter: &DatacenterRef, name: &str) -> Result<Option<VmRef>>;

    /// Starts cloning `template` into `folder` under `name`.
    async fn clone_vm(
        &self,
        template: &VmRef,
        folder: &FolderRef,
        name: &str,
        spec: &CloneSpec,
    ) -> Result<TaskRef>;

    /// Blocks until a task has finished and returns its outcome.
    async fn await_task(&self, task: &TaskRef) -> Result<TaskOutcome>;

    /// Returns the first network adapter of a VM.
    async fn primary_network_adapter(&self, vm: &VmRef) -> Result<Option<NetworkAdapter>>;

    /// Points an adapter at a network's backing.
    async fn edit_network_device(
        &self,
        vm: &VmRef,
        adapter: &NetworkAdapter,
        network: &NetworkRef,
    ) -> Result<()>;

    /// Blocks until the guest reports an IP address.
    async fn wait_for_guest_ip(&self, vm: &VmRef) -> Result<String>;

    /// Launches a program in the guest and returns its PID.
    async fn start_guest_program(
        &self,
        vm: &VmRef,
        credentials: &GuestCredentials,
        spec: &GuestProgramSpec,
    ) -> Result<i64>;

    /// Returns the records of the given PIDs that the guest still knows about.
    async fn list_guest_processes(
        &self,
        vm: &VmRef,
        credentials: &GuestCredentials,
        pids: &[i64],
    ) -> Result<Vec<ProcessRecord>>;

    /// Prepares a guest file for download.
    async fn initiate_guest_file_download(
        &self,
        vm: &VmRef,
        credentials: &GuestCredentials,
        path: &str,
    ) -> Result<FileTransfer>;

    /// Fetches the contents of a prepared transfer. Returns once the transfer is complete.
    async fn fetch_transfer(&self, transfer: &FileTransfer) -> Result<Vec<u8>>;

    /// Deletes a file in the guest.
    async fn delete_guest_file(
        &self,
        vm: &VmRef,
        credentials: &GuestCredentials,
        path: &str,
    ) -> Result<()>;

    /// Asks the guest OS to shut down.
    async fn shutdown_guest(&self, vm: &VmRef) -> Result<()>;

    /// Returns the VM power state.
    async fn power_state(&self, vm: &VmRef) -> Result<PowerState>;

    /// Converts a powered-off VM into a template.
    async fn mark_as_template(&self, vm: &VmRef) -> Result<()>;
}
