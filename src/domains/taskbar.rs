// src/domains/taskbar.rs

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{ensure_supported, CommandExecutor};
use crate::{
    cancellation::{ensure_not_cancelled, run_cancellable},
    catalog::{DomainName, DomainProvider},
    constants::SHELL_PROCESS_NAME,
    errors::EngineResult,
    models::{mapping, RawValue, RegistrySetting, SettingDefinition},
    system::{ProcessControl, RegistryIo},
};

pub const CLEAN_TASKBAR: &str = "clean_taskbar";

const ADVANCED_KEY: &str =
    r"HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Explorer\Advanced";
const SEARCH_KEY: &str = r"HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Search";
const FEEDS_KEY: &str = r"HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Feeds";
const TASKBAND_KEY: &str =
    r"HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Explorer\Taskband";

pub struct TaskbarSettings;

impl DomainProvider for TaskbarSettings {
    fn domain_name(&self) -> &str {
        DomainName::Taskbar.as_ref()
    }

    fn settings(&self) -> anyhow::Result<Vec<SettingDefinition>> {
        Ok(vec![
            SettingDefinition::selection(
                "taskbar-alignment",
                "Taskbar alignment",
                "Where taskbar icons sit on the bar",
            )
            .windows11_only()
            .with_registry(RegistrySetting::dword(ADVANCED_KEY, "TaskbarAl", 1, Some(0)))
            .with_options(vec![
                ("Left", mapping([("TaskbarAl", RawValue::Int(0))])),
                ("Center", mapping([("TaskbarAl", RawValue::Int(1))])),
            ])
            .restarts_process(SHELL_PROCESS_NAME),
            SettingDefinition::selection(
                "taskbar-search-mode",
                "Search on the taskbar",
                "How the search box is shown",
            )
            .with_registry(RegistrySetting::dword(SEARCH_KEY, "SearchboxTaskbarMode", 1, Some(0)))
            .with_options(vec![
                ("Hidden", mapping([("SearchboxTaskbarMode", RawValue::Int(0))])),
                ("Search icon", mapping([("SearchboxTaskbarMode", RawValue::Int(1))])),
                ("Search box", mapping([("SearchboxTaskbarMode", RawValue::Int(2))])),
            ]),
            SettingDefinition::toggle(
                "taskbar-task-view",
                "Task View button",
                "Show the Task View button",
            )
            .with_registry(RegistrySetting::dword(ADVANCED_KEY, "ShowTaskViewButton", 1, Some(0))),
            SettingDefinition::toggle(
                "taskbar-news-and-interests",
                "News and interests",
                "Show the news and interests feed on the taskbar",
            )
            .windows10_only()
            .with_registry(RegistrySetting::dword(FEEDS_KEY, "ShellFeedsTaskbarViewMode", 0, Some(2)))
            .restarts_process(SHELL_PROCESS_NAME),
            SettingDefinition::toggle(
                "taskbar-end-task",
                "End task in taskbar menu",
                "Add End task to the taskbar right-click menu",
            )
            .windows11_only()
            .min_build(22631)
            .with_registry(RegistrySetting::dword(
                r"HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Explorer\Advanced\TaskbarDeveloperSettings",
                "TaskbarEndTask",
                1,
                None,
            )),
        ])
    }
}

/// Taskbar maintenance actions.
pub struct TaskbarCommands {
    registry: Arc<dyn RegistryIo>,
    processes: Arc<dyn ProcessControl>,
}

impl TaskbarCommands {
    pub fn new(registry: Arc<dyn RegistryIo>, processes: Arc<dyn ProcessControl>) -> Self {
        Self { registry, processes }
    }

    /// Removes every pinned taskbar item and restarts the shell so the bar redraws.
    async fn clean_taskbar(&self, token: &CancellationToken) -> EngineResult<()> {
        info!("Cleaning taskbar pins");
        if run_cancellable(token, self.registry.key_exists(TASKBAND_KEY)).await?? {
            run_cancellable(token, self.registry.delete_key(TASKBAND_KEY)).await??;
        }
        if let Err(e) = run_cancellable(token, self.processes.kill_process(SHELL_PROCESS_NAME)).await? {
            warn!("Failed to restart {} after cleaning taskbar: {:#}", SHELL_PROCESS_NAME, e);
        }
        Ok(())
    }
}

#[async_trait]
impl CommandExecutor for TaskbarCommands {
    fn supported_commands(&self) -> &[&'static str] {
        &[CLEAN_TASKBAR]
    }

    async fn execute_command(&self, name: &str, token: &CancellationToken) -> EngineResult<()> {
        ensure_not_cancelled(token)?;
        ensure_supported(self, name)?;
        self.clean_taskbar(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeProcesses, FakeRegistry};

    fn commands() -> (TaskbarCommands, Arc<FakeRegistry>, Arc<FakeProcesses>) {
        let registry = Arc::new(FakeRegistry::default());
        let processes = Arc::new(FakeProcesses::default());
        (
            TaskbarCommands::new(registry.clone(), processes.clone()),
            registry,
            processes,
        )
    }

    #[tokio::test]
    async fn test_clean_taskbar_removes_pins_and_restarts_shell() {
        let (commands, registry, processes) = commands();
        registry.put(TASKBAND_KEY, "Favorites", RawValue::Text("blob".into()));

        commands
            .execute_command(CLEAN_TASKBAR, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*registry.deleted_keys.lock(), vec![TASKBAND_KEY.to_string()]);
        assert_eq!(*processes.killed.lock(), vec!["explorer".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_command_is_rejected_by_name() {
        let (commands, registry, _) = commands();
        let err = commands
            .execute_command("reset_everything", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not supported"));
        assert!(err.to_string().contains("reset_everything"));
        assert!(registry.deleted_keys.lock().is_empty());
    }

    #[test]
    fn test_catalog_has_windows_specific_entries() {
        let settings = TaskbarSettings.settings().unwrap();
        let alignment = settings.iter().find(|s| s.id == "taskbar-alignment").unwrap();
        assert!(alignment.os.windows11_only);
        assert_eq!(alignment.restart_process.as_deref(), Some("explorer"));
        let news = settings
            .iter()
            .find(|s| s.id == "taskbar-news-and-interests")
            .unwrap();
        assert!(news.os.windows10_only);
    }
}
