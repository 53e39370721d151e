// src/domains/start_menu.rs

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ensure_supported, CommandExecutor};
use crate::{
    cancellation::{ensure_not_cancelled, run_cancellable},
    catalog::{DomainName, DomainProvider},
    errors::EngineResult,
    models::{mapping, RawValue, RegistrySetting, SettingDefinition},
    system::{ProcessControl, RegistryIo},
};

pub const CLEAN_START_MENU: &str = "clean_start_menu";

const START_MENU_HOST: &str = "StartMenuExperienceHost";
const ADVANCED_KEY: &str =
    r"HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Explorer\Advanced";
const START_KEY: &str = r"HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Start";
const EXPLORER_POLICY_KEY: &str =
    r"HKEY_LOCAL_MACHINE\SOFTWARE\Policies\Microsoft\Windows\Explorer";

// Tile and pin layout caches for the current user.
const LAYOUT_CACHE_KEYS: &[&str] = &[
    r"HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\CloudStore\Store\Cache\DefaultAccount",
    r"HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Start\Pins",
];

pub struct StartMenuSettings;

impl DomainProvider for StartMenuSettings {
    fn domain_name(&self) -> &str {
        DomainName::StartMenu.as_ref()
    }

    fn settings(&self) -> anyhow::Result<Vec<SettingDefinition>> {
        Ok(vec![
            SettingDefinition::selection(
                "start-menu-layout",
                "Start layout",
                "Balance between pinned apps and recommendations",
            )
            .windows11_only()
            .min_build(22621)
            .with_registry(RegistrySetting::dword(ADVANCED_KEY, "Start_Layout", 0, None))
            .with_options(vec![
                ("Default", mapping([("Start_Layout", RawValue::Int(0))])),
                ("More pins", mapping([("Start_Layout", RawValue::Int(1))])),
                ("More recommendations", mapping([("Start_Layout", RawValue::Int(2))])),
            ]),
            SettingDefinition::toggle(
                "start-menu-recommended",
                "Hide recommended section",
                "Remove the recommended section from Start",
            )
            .windows11_only()
            .with_registry(RegistrySetting::dword(
                EXPLORER_POLICY_KEY,
                "HideRecommendedSection",
                1,
                None,
            ))
            .restarts_process(START_MENU_HOST),
            SettingDefinition::toggle(
                "start-menu-recent-apps",
                "Show recently added apps",
                "List newly installed apps at the top of Start",
            )
            .with_registry(RegistrySetting::dword(START_KEY, "ShowRecentList", 1, Some(0))),
            SettingDefinition::toggle(
                "start-menu-suggestions",
                "Show suggestions in Start",
                "Occasionally show app suggestions",
            )
            .windows10_only()
            .with_registry(RegistrySetting::dword(
                r"HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\ContentDeliveryManager",
                "SubscribedContent-338388Enabled",
                1,
                Some(0),
            )),
        ])
    }
}

/// Start menu maintenance actions.
pub struct StartMenuCommands {
    registry: Arc<dyn RegistryIo>,
    processes: Arc<dyn ProcessControl>,
}

impl StartMenuCommands {
    pub fn new(registry: Arc<dyn RegistryIo>, processes: Arc<dyn ProcessControl>) -> Self {
        Self { registry, processes }
    }

    /// Drops the cached Start layout so the default one is rebuilt.
    async fn clean_start_menu(&self, token: &CancellationToken) -> EngineResult<()> {
        info!("Cleaning Start menu layout");
        for key in LAYOUT_CACHE_KEYS {
            if run_cancellable(token, self.registry.key_exists(key)).await?? {
                run_cancellable(token, self.registry.delete_key(key)).await??;
                debug!("Deleted Start layout cache '{}'", key);
            }
        }
        if let Err(e) = run_cancellable(token, self.processes.kill_process(START_MENU_HOST)).await? {
            warn!("Failed to restart {} after cleaning Start: {:#}", START_MENU_HOST, e);
        }
        Ok(())
    }
}

#[async_trait]
impl CommandExecutor for StartMenuCommands {
    fn supported_commands(&self) -> &[&'static str] {
        &[CLEAN_START_MENU]
    }

    async fn execute_command(&self, name: &str, token: &CancellationToken) -> EngineResult<()> {
        ensure_not_cancelled(token)?;
        ensure_supported(self, name)?;
        self.clean_start_menu(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        system::MockProcessControl,
        test_support::{FakeRegistry, LogCapture},
    };

    #[tokio::test]
    async fn test_clean_start_menu_deletes_existing_caches_only() {
        let registry = Arc::new(FakeRegistry::default());
        registry.put(LAYOUT_CACHE_KEYS[0], "Data", RawValue::Text("layout".into()));
        let mut processes = MockProcessControl::new();
        processes
            .expect_kill_process()
            .withf(|name: &str| name == START_MENU_HOST)
            .times(1)
            .returning(|_| Ok(()));

        let commands = StartMenuCommands::new(registry.clone(), Arc::new(processes));
        commands
            .execute_command(CLEAN_START_MENU, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*registry.deleted_keys.lock(), vec![LAYOUT_CACHE_KEYS[0].to_string()]);
    }

    #[tokio::test]
    async fn test_kill_failure_is_only_a_warning() {
        let (logs, _guard) = LogCapture::install();
        let registry = Arc::new(FakeRegistry::default());
        let mut processes = MockProcessControl::new();
        processes
            .expect_kill_process()
            .returning(|_| Err(anyhow::anyhow!("access denied")));

        let commands = StartMenuCommands::new(registry, Arc::new(processes));
        commands
            .execute_command(CLEAN_START_MENU, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(logs.lines_at("WARN", &[START_MENU_HOST, "access denied"]), 1);
    }

    #[tokio::test]
    async fn test_cancelled_command_does_nothing() {
        let registry = Arc::new(FakeRegistry::default());
        let commands = StartMenuCommands::new(registry, Arc::new(MockProcessControl::new()));
        let token = CancellationToken::new();
        token.cancel();
        let err = commands.execute_command(CLEAN_START_MENU, &token).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
