//! Command dispatcher.
//!
//! Runs a deployment's commands in order against a provisioned VM. Downloads
//! can capture file contents into the result store; a later execute naming
//! the same result key runs the captured text as its command line.

use tracing::{debug, info, warn};

use crate::config::{Command, CommandKind, Deployment};
use crate::error::{ExecutionError, ForgeError, Result};
use crate::provider::{GuestCredentials, GuestProgramSpec, HypervisorProvider, VmHandle};

use super::EngineSettings;
use super::context::ExecutionContext;
use super::watcher::ProcessWatcher;

/// Dispatches commands to the guest.
pub struct CommandDispatcher<'a> {
    provider: &'a dyn HypervisorProvider,
    settings: &'a EngineSettings,
}

impl<'a> CommandDispatcher<'a> {
    /// Creates a dispatcher.
    #[must_use]
    pub const fn new(provider: &'a dyn HypervisorProvider, settings: &'a EngineSettings) -> Self {
        Self { provider, settings }
    }

    /// Runs every command of `deployment`, in order, and returns how many ran.
    ///
    /// The context cursor is rewound afterwards, whether or not every command
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first launch, watch, or transfer failure. Nothing after the
    /// failing command runs.
    pub async fn run_commands(
        &self,
        vm: &VmHandle,
        credentials: &GuestCredentials,
        deployment: &Deployment,
        ctx: &mut ExecutionContext,
    ) -> Result<usize> {
        let commands = &deployment.task.commands;
        debug!("Running {} commands on {}", commands.len(), vm.name);

        let outcome = self.run_all(vm, credentials, commands, ctx).await;
        let ran = ctx.cursor.position();
        ctx.cursor.reset();
        outcome.map(|()| ran)
    }

    async fn run_all(
        &self,
        vm: &VmHandle,
        credentials: &GuestCredentials,
        commands: &[Command],
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        while let Some(command) = ctx.cursor.next_command(commands) {
            if !command.note.is_empty() {
                info!("{}", command.note);
            }

            match command.kind {
                CommandKind::Execute => self.execute(vm, credentials, command, ctx).await?,
                CommandKind::Download => self.download(vm, credentials, command, ctx).await?,
            }
        }
        Ok(())
    }

    /// Resolves the command line an execute runs.
    fn command_line(&self, command: &Command, ctx: &ExecutionContext) -> Result<String> {
        let Some(key) = command.result_key() else {
            return Ok(command.command_line());
        };

        match ctx.results.get(key) {
            Some(stored) => Ok(stored.to_string()),
            None if self.settings.strict_results => Err(ExecutionError::MissingResult {
                key: key.to_string(),
            }
            .into()),
            None => {
                warn!("Nothing stored under result key '{key}', running an empty command");
                Ok(String::new())
            }
        }
    }

    async fn execute(
        &self,
        vm: &VmHandle,
        credentials: &GuestCredentials,
        command: &Command,
        ctx: &ExecutionContext,
    ) -> Result<()> {
        let line = self.command_line(command, ctx)?;
        let spec = GuestProgramSpec::elevated(command.run_as_user(), &line);

        let pid = self
            .provider
            .start_guest_program(&vm.vm, credentials, &spec)
            .await
            .map_err(|e| ExecutionError::ExecutionFailed {
                vm_name: vm.name.clone(),
                command: line.clone(),
                reason: e.to_string(),
            })?;
        debug!("Started process {pid} on {}", vm.name);

        if command.ignore_watch {
            debug!("Not watching process {pid}");
            return Ok(());
        }

        ProcessWatcher::new(self.provider, self.settings)
            .watch(&vm.vm, credentials, pid)
            .await
    }

    async fn download(
        &self,
        vm: &VmHandle,
        credentials: &GuestCredentials,
        command: &Command,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        let path = command.path.as_str();
        let failed = |e: ForgeError| ExecutionError::TransferFailed {
            vm_name: vm.name.clone(),
            path: path.to_string(),
            reason: e.to_string(),
        };

        let transfer = self
            .provider
            .initiate_guest_file_download(&vm.vm, credentials, path)
            .await
            .map_err(failed)?;
        let bytes = self.provider.fetch_transfer(&transfer).await.map_err(failed)?;
        info!("Downloaded {} bytes from {path}", bytes.len());

        if let Some(key) = command.result_key() {
            ctx.results
                .insert(key, String::from_utf8_lossy(&bytes).into_owned());
            debug!("Stored {path} under result key '{key}'");
        }

        if command.delete_after_download {
            self.provider
                .delete_guest_file(&vm.vm, credentials, path)
                .await
                .map_err(failed)?;
            debug!("Deleted {path} from {}", vm.name);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputType;
    use crate::engine::context::ResultStore;
    use crate::engine::test_support::{FakeProvider, deployment};
    use crate::error::WatchError;
    use crate::provider::VmRef;
    use std::time::Duration;

    fn settings() -> EngineSettings {
        EngineSettings {
            watch_interval: Duration::ZERO,
            ..EngineSettings::default()
        }
    }

    fn vm() -> VmHandle {
        VmHandle {
            vm: VmRef(String::from("vm-42")),
            name: String::from("docker-base"),
            ip: String::from("10.0.0.15"),
        }
    }

    fn creds() -> GuestCredentials {
        GuestCredentials::new("root", "changeme")
    }

    async fn run(
        provider: &FakeProvider,
        settings: &EngineSettings,
        commands: Vec<Command>,
        ctx: &mut ExecutionContext,
    ) -> Result<usize> {
        let deployment = deployment("docker-base", OutputType::Vm, commands);
        CommandDispatcher::new(provider, settings)
            .run_commands(&vm(), &creds(), &deployment, ctx)
            .await
    }

    #[tokio::test]
    async fn test_commands_run_in_order_and_cursor_resets() {
        let provider = FakeProvider::new();
        let mut ctx = ExecutionContext::new();
        let commands = vec![
            Command::execute("/bin/yum", "install -y docker"),
            Command::execute("/bin/systemctl", "enable docker"),
            Command::execute("/bin/systemctl", "start docker"),
        ];

        let ran = run(&provider, &settings(), commands, &mut ctx).await.unwrap();

        assert_eq!(ran, 3);
        assert_eq!(ctx.cursor.position(), 0);
        assert_eq!(
            provider.calls_to("start:"),
            vec![
                "start:-n -u root /bin/yum install -y docker",
                "start:-n -u root /bin/systemctl enable docker",
                "start:-n -u root /bin/systemctl start docker",
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_elevates_to_named_user() {
        let provider = FakeProvider::new();
        let mut ctx = ExecutionContext::new();
        let mut command = Command::execute("/usr/bin/whoami", "");
        command.run_as_user = Some(String::from("builder"));

        run(&provider, &settings(), vec![command], &mut ctx).await.unwrap();

        assert_eq!(provider.calls_to("start:"), vec!["start:-n -u builder /usr/bin/whoami"]);
    }

    #[tokio::test]
    async fn test_download_result_feeds_later_execute_verbatim() {
        let join = "docker swarm join --token SWMTKN-1-abc 10.0.0.2:2377\n";
        let mut provider = FakeProvider::new();
        provider
            .files
            .insert(String::from("/tmp/join"), join.as_bytes().to_vec());
        let mut ctx = ExecutionContext::new();

        let commands = vec![
            Command::download("/tmp/join").with_result_key("join"),
            Command::execute("", "").with_result_key("join"),
        ];
        run(&provider, &settings(), commands, &mut ctx).await.unwrap();

        assert_eq!(ctx.results.get("join"), Some(join));
        assert_eq!(provider.calls_to("start:"), vec![format!("start:-n -u root {join}")]);
    }

    #[tokio::test]
    async fn test_missing_result_runs_empty_command() {
        let provider = FakeProvider::new();
        let mut ctx = ExecutionContext::new();

        run(
            &provider,
            &settings(),
            vec![Command::execute("", "").with_result_key("never-set")],
            &mut ctx,
        )
        .await
        .unwrap();

        assert_eq!(provider.calls_to("start:"), vec!["start:-n -u root "]);
    }

    #[tokio::test]
    async fn test_missing_result_is_fatal_when_strict() {
        let provider = FakeProvider::new();
        let mut ctx = ExecutionContext::new();
        let strict = EngineSettings {
            strict_results: true,
            ..settings()
        };

        let err = run(
            &provider,
            &strict,
            vec![Command::execute("", "").with_result_key("never-set")],
            &mut ctx,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ForgeError::Execution(ExecutionError::MissingResult { ref key }) if key == "never-set"
        ));
        assert!(provider.calls_to("start:").is_empty());
    }

    #[tokio::test]
    async fn test_preseeded_results_are_used() {
        let provider = FakeProvider::new();
        let mut results = ResultStore::new();
        results.insert("cmd", "/bin/echo seeded");
        let mut ctx = ExecutionContext::with_results(results);

        run(
            &provider,
            &settings(),
            vec![Command::execute("/bin/false", "").with_result_key("cmd")],
            &mut ctx,
        )
        .await
        .unwrap();

        assert_eq!(provider.calls_to("start:"), vec!["start:-n -u root /bin/echo seeded"]);
    }

    #[tokio::test]
    async fn test_ignore_watch_never_polls() {
        let mut provider = FakeProvider::new();
        provider.exit_codes.insert(String::from("/bin/false"), 1);
        let mut ctx = ExecutionContext::new();
        let mut command = Command::execute("/bin/false", "");
        command.ignore_watch = true;

        run(&provider, &settings(), vec![command], &mut ctx).await.unwrap();

        assert_eq!(provider.calls_to("start:").len(), 1);
        assert!(provider.calls_to("poll:").is_empty());
    }

    #[tokio::test]
    async fn test_non_zero_exit_stops_the_deployment() {
        let mut provider = FakeProvider::new();
        provider.exit_codes.insert(String::from("/bin/false"), 1);
        let mut ctx = ExecutionContext::new();
        let commands = vec![
            Command::execute("/bin/false", ""),
            Command::execute("/bin/true", ""),
        ];

        let err = run(&provider, &settings(), commands, &mut ctx).await.unwrap_err();

        assert!(matches!(
            err,
            ForgeError::Watch(WatchError::NonZeroExit { code: 1, .. })
        ));
        assert_eq!(provider.calls_to("start:").len(), 1);
        assert_eq!(ctx.cursor.position(), 0);
    }

    #[tokio::test]
    async fn test_delete_only_after_transfer_completes() {
        let mut provider = FakeProvider::new();
        provider
            .files
            .insert(String::from("/tmp/token"), b"abc".to_vec());
        let mut ctx = ExecutionContext::new();
        let mut command = Command::download("/tmp/token");
        command.delete_after_download = true;

        run(&provider, &settings(), vec![command], &mut ctx).await.unwrap();

        let fetch = provider.position("fetch:/tmp/token").unwrap();
        let delete = provider.position("delete:/tmp/token").unwrap();
        assert!(fetch < delete);
        assert!(ctx.results.is_empty());
    }

    #[tokio::test]
    async fn test_failed_transfer_skips_delete() {
        let provider = FakeProvider::new();
        let mut ctx = ExecutionContext::new();
        let mut command = Command::download("/tmp/missing");
        command.delete_after_download = true;

        let err = run(&provider, &settings(), vec![command], &mut ctx).await.unwrap_err();

        assert!(matches!(
            err,
            ForgeError::Execution(ExecutionError::TransferFailed { ref path, .. }) if path == "/tmp/missing"
        ));
        assert!(provider.calls_to("delete:").is_empty());
    }
}
