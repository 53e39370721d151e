// src/apply/restart.rs

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cancellation::run_cancellable,
    config::EngineConfig,
    constants::SHELL_PROCESS_NAME,
    errors::EngineResult,
    models::SettingDefinition,
    system::{ImportState, ProcessControl, ServiceControl},
};

/// Restarts whatever process or service a setting says must pick up its change.
///
/// Failures are logged and never returned; only cancellation is.
pub struct ProcessRestartManager {
    processes: Arc<dyn ProcessControl>,
    services: Arc<dyn ServiceControl>,
    import_state: Arc<dyn ImportState>,
    shell_poll_attempts: u32,
    shell_poll_delay: Duration,
}

impl ProcessRestartManager {
    pub fn new(
        processes: Arc<dyn ProcessControl>,
        services: Arc<dyn ServiceControl>,
        import_state: Arc<dyn ImportState>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            processes,
            services,
            import_state,
            shell_poll_attempts: config.explorer_restart_attempts,
            shell_poll_delay: config.explorer_restart_delay(),
        }
    }

    pub async fn handle_process_and_service_restarts(
        &self,
        setting: &SettingDefinition,
        token: &CancellationToken,
    ) -> EngineResult<()> {
        if let Some(process) = setting.restart_process.as_deref() {
            self.restart_process(setting, process, token).await?;
        }
        if let Some(service) = setting.restart_service.as_deref() {
            self.restart_service(setting, service, token).await?;
        }
        Ok(())
    }

    async fn restart_process(
        &self,
        setting: &SettingDefinition,
        process: &str,
        token: &CancellationToken,
    ) -> EngineResult<()> {
        if self.import_state.is_active() {
            debug!(
                "{:?} -> Skipping restart of '{}': configuration import in progress",
                setting.id, process
            );
            return Ok(());
        }

        if process.eq_ignore_ascii_case(SHELL_PROCESS_NAME) {
            return self.restart_shell(setting, process, token).await;
        }

        match run_cancellable(token, self.processes.kill_process(process)).await? {
            Ok(()) => info!("{:?} -> Restarted process '{}'", setting.id, process),
            Err(e) => warn!(
                "{:?} -> Failed to restart process '{}': {:#}",
                setting.id, process, e
            ),
        }
        Ok(())
    }

    /// Kills the shell and waits for it to come back on its own.
    async fn restart_shell(
        &self,
        setting: &SettingDefinition,
        process: &str,
        token: &CancellationToken,
    ) -> EngineResult<()> {
        if let Err(e) = run_cancellable(token, self.processes.kill_process(process)).await? {
            warn!(
                "{:?} -> Failed to restart process '{}': {:#}",
                setting.id, process, e
            );
            return Ok(());
        }

        for attempt in 1..=self.shell_poll_attempts {
            run_cancellable(token, tokio::time::sleep(self.shell_poll_delay)).await?;
            match run_cancellable(token, self.processes.is_process_running(process)).await? {
                Ok(true) => {
                    info!(
                        "{:?} -> '{}' restarted successfully after {} check(s)",
                        setting.id, process, attempt
                    );
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => debug!(
                    "{:?} -> Could not check whether '{}' is running: {:#}",
                    setting.id, process, e
                ),
            }
        }

        warn!(
            "{:?} -> '{}' did not come back after {} checks",
            setting.id, process, self.shell_poll_attempts
        );
        Ok(())
    }

    async fn restart_service(
        &self,
        setting: &SettingDefinition,
        service: &str,
        token: &CancellationToken,
    ) -> EngineResult<()> {
        info!("{:?} -> Restarting service '{}'", setting.id, service);
        if let Err(e) = run_cancellable(token, self.services.restart_service(service)).await? {
            warn!(
                "{:?} -> Failed to restart service {}: {:#}",
                setting.id, service, e
            );
        }
        Ok(())
    }
}
