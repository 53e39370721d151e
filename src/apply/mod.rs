// src/apply/mod.rs

mod dependencies;
mod executor;
mod restart;

pub use dependencies::{DeclaredDependencyResolver, DependencyResolver};
pub use executor::{OperationExecutor, SettingOperationExecutor};
pub use restart::ProcessRestartManager;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cancellation::ensure_not_cancelled,
    domains::{CommandExecutor, DomainService},
    errors::{EngineError, EngineResult},
    global::{GlobalSettingsRegistry, SettingsRouter},
    models::{OperationResult, RawValue, SettingApplicationRequest, SettingAppliedEvent, SettingDefinition},
    system::EventPublisher,
};

/// Entry point for changing a setting: routing, prerequisites, the write itself,
/// restarts and the change notification.
pub struct SettingApplicationService {
    router: Arc<SettingsRouter>,
    global: Arc<GlobalSettingsRegistry>,
    executor: Arc<dyn OperationExecutor>,
    dependencies: Arc<dyn DependencyResolver>,
    restarts: Arc<ProcessRestartManager>,
    events: Arc<dyn EventPublisher>,
}

impl SettingApplicationService {
    pub fn new(
        router: Arc<SettingsRouter>,
        global: Arc<GlobalSettingsRegistry>,
        executor: Arc<dyn OperationExecutor>,
        dependencies: Arc<dyn DependencyResolver>,
        restarts: Arc<ProcessRestartManager>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            router,
            global,
            executor,
            dependencies,
            restarts,
            events,
        }
    }

    /// Applies one request.
    ///
    /// An unknown id is an error. Failed writes are not: they come back in the
    /// [`OperationResult`] after the event has been published.
    pub async fn apply_setting(
        &self,
        request: &SettingApplicationRequest,
        token: &CancellationToken,
    ) -> EngineResult<OperationResult> {
        ensure_not_cancelled(token)?;
        info!(
            "{:?} -> Applying (enable: {}, value: {:?})",
            request.setting_id, request.enable, request.value
        );

        let domain = self
            .router
            .find_domain_for_setting(&request.setting_id)
            .ok_or_else(|| EngineError::SettingNotFound(request.setting_id.clone()))?;
        let setting = find_setting(domain.as_ref(), &request.setting_id)
            .await
            .ok_or_else(|| EngineError::SettingNotFound(request.setting_id.clone()))?;

        if let Some(command) = request.command_string.as_deref() {
            if let Some(executor) = domain
                .as_command_executor()
                .filter(|executor| executor.supports_command(command))
            {
                return self.run_command(executor, &setting, command, token).await;
            }
            debug!(
                "{:?} -> Domain '{}' has no command '{}', applying normally",
                setting.id,
                domain.domain_name(),
                command
            );
        }

        if request.enable && !request.skip_value_prerequisites {
            self.apply_dependencies(&setting, token).await?;
        }

        self.apply_resolved(
            domain.as_ref(),
            &setting,
            request.enable,
            request.value.as_ref(),
            token,
        )
        .await
    }

    async fn run_command(
        &self,
        executor: &dyn CommandExecutor,
        setting: &SettingDefinition,
        command: &str,
        token: &CancellationToken,
    ) -> EngineResult<OperationResult> {
        let result = match executor.execute_command(command, token).await {
            Ok(()) => {
                info!("{:?} -> Command '{}' completed", setting.id, command);
                OperationResult::succeeded()
            }
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(e) => {
                warn!("{:?} -> Command '{}' failed: {}", setting.id, command, e);
                OperationResult::failed(e.to_string())
            }
        };
        self.publish(setting, &result);
        Ok(result)
    }

    /// Applies each prerequisite in turn. Failures are logged and do not stop
    /// the main operation.
    async fn apply_dependencies(&self, setting: &SettingDefinition, token: &CancellationToken) -> EngineResult<()> {
        let requests = self.dependencies.resolve(setting, true, token).await?;
        for request in requests {
            let Some(domain) = self.router.find_domain_for_setting(&request.setting_id) else {
                warn!(
                    "{:?} -> Dependency '{}' is not a known setting, skipping",
                    setting.id, request.setting_id
                );
                continue;
            };
            let Some(dependency) = find_setting(domain.as_ref(), &request.setting_id).await else {
                warn!(
                    "{:?} -> Dependency '{}' is not available on this system, skipping",
                    setting.id, request.setting_id
                );
                continue;
            };

            debug!("{:?} -> Applying dependency '{}'", setting.id, dependency.id);
            let result = self
                .apply_resolved(
                    domain.as_ref(),
                    &dependency,
                    request.enable,
                    request.value.as_ref(),
                    token,
                )
                .await?;
            if !result.success {
                warn!(
                    "{:?} -> Dependency '{}' failed: {}",
                    setting.id,
                    dependency.id,
                    result.error_message.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Ok(())
    }

    /// Write, restart, register, notify. The executor's result is returned as is.
    async fn apply_resolved(
        &self,
        domain: &dyn DomainService,
        setting: &SettingDefinition,
        enable: bool,
        value: Option<&RawValue>,
        token: &CancellationToken,
    ) -> EngineResult<OperationResult> {
        let result = self.executor.execute(setting, enable, value, token).await?;
        if result.success {
            info!("{:?} -> Applied", setting.id);
        } else {
            warn!(
                "{:?} -> Apply failed: {}",
                setting.id,
                result.error_message.as_deref().unwrap_or("unknown error")
            );
        }

        self.restarts
            .handle_process_and_service_restarts(setting, token)
            .await?;
        self.global
            .register_setting(domain.domain_name(), setting.clone());
        self.publish(setting, &result);
        Ok(result)
    }

    fn publish(&self, setting: &SettingDefinition, result: &OperationResult) {
        self.events.publish(SettingAppliedEvent {
            setting_id: setting.id.clone(),
            success: result.success,
            error_message: result.error_message.clone(),
        });
    }
}

async fn find_setting(domain: &dyn DomainService, id: &str) -> Option<SettingDefinition> {
    domain
        .get_settings()
        .await
        .iter()
        .find(|setting| setting.id == id)
        .cloned()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        catalog::DomainProvider,
        combobox::PowerPlanComboBoxService,
        compat_registry::CompatibleSettingsRegistry,
        config::EngineConfig,
        domains::{taskbar::CLEAN_TASKBAR, CachedDomainService},
        models::{DependencyKind, RegistrySetting},
        test_support::{FakeHardware, FakeOs, LogCapture, StaticProvider, TestSystem},
    };

    const KEY: &str = r"HKEY_CURRENT_USER\Software\Tweaks";

    /// Records each call and fails for the ids it is told to.
    #[derive(Default)]
    struct ScriptedExecutor {
        calls: Mutex<Vec<(String, bool, Option<RawValue>)>>,
        failing: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl OperationExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            setting: &SettingDefinition,
            enable: bool,
            value: Option<&RawValue>,
            token: &CancellationToken,
        ) -> EngineResult<OperationResult> {
            ensure_not_cancelled(token)?;
            self.calls
                .lock()
                .push((setting.id.clone(), enable, value.cloned()));
            if self.failing.lock().contains(&setting.id) {
                return Ok(OperationResult::failed("write refused"));
            }
            Ok(OperationResult::succeeded())
        }
    }

    struct Commands {
        ran: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandExecutor for Commands {
        fn supported_commands(&self) -> &[&'static str] {
            &[CLEAN_TASKBAR]
        }

        async fn execute_command(&self, name: &str, _token: &CancellationToken) -> EngineResult<()> {
            self.ran.lock().push(name.to_string());
            Ok(())
        }
    }

    struct Fixture {
        service: SettingApplicationService,
        system: TestSystem,
        executor: Arc<ScriptedExecutor>,
        commands: Arc<Commands>,
        global: Arc<GlobalSettingsRegistry>,
    }

    async fn fixture(executor: Arc<ScriptedExecutor>) -> Fixture {
        let system = TestSystem::new(FakeOs::windows11(22631), FakeHardware::desktop());
        let providers: Vec<Arc<dyn DomainProvider>> = vec![
            StaticProvider::new(
                "Gaming",
                vec![
                    SettingDefinition::toggle("game-mode", "Game mode", ""),
                    SettingDefinition::toggle("game-dvr", "Game DVR", ""),
                    SettingDefinition::toggle("fse", "Fullscreen optimizations", "")
                        .depends_on("game-dvr", DependencyKind::RequiresDisabled)
                        .depends_on("missing", DependencyKind::RequiresEnabled),
                    SettingDefinition::selection("responsiveness", "Responsiveness", "")
                        .depends_on("game-mode", DependencyKind::RequiresValue(1))
                        .restarts_service("Audiosrv"),
                ],
            ),
            StaticProvider::new(
                "Taskbar",
                vec![SettingDefinition::toggle("taskbar-cleanup", "Clean taskbar", "")
                    .with_registry(RegistrySetting::dword(KEY, "Clean", 1, None))
                    .restarts_process("StartMenuExperienceHost")],
            ),
        ];
        let registry = Arc::new(CompatibleSettingsRegistry::from_system(providers, &system.services()));
        registry.initialize(&CancellationToken::new()).await.unwrap();

        let commands = Arc::new(Commands {
            ran: Mutex::new(Vec::new()),
        });
        let domains: Vec<Arc<dyn DomainService>> = vec![
            Arc::new(CachedDomainService::new("Gaming", registry.clone())),
            Arc::new(CachedDomainService::new("Taskbar", registry.clone()).with_commands(commands.clone())),
        ];
        let global = Arc::new(GlobalSettingsRegistry::new());
        let router = Arc::new(SettingsRouter::new(domains, global.clone(), registry));
        let restarts = Arc::new(ProcessRestartManager::new(
            system.processes.clone(),
            system.services.clone(),
            system.import_state.clone(),
            &EngineConfig {
                explorer_restart_delay_ms: 0,
                ..Default::default()
            },
        ));

        Fixture {
            service: SettingApplicationService::new(
                router,
                global.clone(),
                executor.clone(),
                Arc::new(DeclaredDependencyResolver),
                restarts,
                system.events.clone(),
            ),
            system,
            executor,
            commands,
            global,
        }
    }

    fn executed(f: &Fixture) -> Vec<String> {
        f.executor.calls.lock().iter().map(|(id, _, _)| id.clone()).collect()
    }

    #[tokio::test]
    async fn test_unknown_setting_is_not_found() {
        let f = fixture(Arc::default()).await;
        let err = f
            .service
            .apply_setting(&SettingApplicationRequest::toggle("nope", true), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SettingNotFound(ref id) if id == "nope"));
        assert!(executed(&f).is_empty());
        assert!(f.system.events.events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_apply_restarts_registers_and_publishes() {
        let f = fixture(Arc::default()).await;
        let result = f
            .service
            .apply_setting(
                &SettingApplicationRequest::toggle("taskbar-cleanup", true),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(*f.system.processes.killed.lock(), vec!["StartMenuExperienceHost"]);
        assert_eq!(f.global.domain_of("taskbar-cleanup").as_deref(), Some("Taskbar"));
        let events = f.system.events.events.lock();
        assert_eq!(events.len(), 1);
        assert!(events[0].success);
    }

    #[tokio::test]
    async fn test_executor_failure_still_restarts_and_publishes() {
        let executor = Arc::new(ScriptedExecutor::default());
        executor.failing.lock().push("responsiveness".into());
        let f = fixture(executor).await;

        let result = f
            .service
            .apply_setting(
                &SettingApplicationRequest::select("responsiveness", 2),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("write refused"));
        assert_eq!(*f.system.services.restarted.lock(), vec!["Audiosrv"]);
        let events = f.system.events.events.lock();
        assert_eq!(events.last().map(|e| e.success), Some(false));
        assert_eq!(
            events.last().and_then(|e| e.error_message.clone()).as_deref(),
            Some("write refused")
        );
    }

    #[tokio::test]
    async fn test_dependencies_run_first_and_missing_ones_are_skipped() {
        let (logs, _guard) = LogCapture::install();
        let f = fixture(Arc::default()).await;
        f.service
            .apply_setting(&SettingApplicationRequest::toggle("fse", true), &CancellationToken::new())
            .await
            .unwrap();

        let calls = f.executor.calls.lock().clone();
        assert_eq!(
            calls,
            vec![("game-dvr".to_string(), false, None), ("fse".to_string(), true, None)]
        );
        assert_eq!(logs.lines_at("WARN", &["fse", "missing"]), 1);
        // One event per applied setting.
        assert_eq!(f.system.events.events.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_value_dependency_and_skip_flag() {
        let f = fixture(Arc::default()).await;
        let token = CancellationToken::new();
        f.service
            .apply_setting(&SettingApplicationRequest::select("responsiveness", 0), &token)
            .await
            .unwrap();
        assert_eq!(
            f.executor.calls.lock()[0],
            ("game-mode".to_string(), true, Some(RawValue::Int(1)))
        );

        f.executor.calls.lock().clear();
        let request = SettingApplicationRequest {
            skip_value_prerequisites: true,
            ..SettingApplicationRequest::select("responsiveness", 0)
        };
        f.service.apply_setting(&request, &token).await.unwrap();
        assert_eq!(executed(&f), vec!["responsiveness"]);
    }

    #[tokio::test]
    async fn test_disabling_ignores_dependencies() {
        let f = fixture(Arc::default()).await;
        f.service
            .apply_setting(&SettingApplicationRequest::toggle("fse", false), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(executed(&f), vec!["fse"]);
    }

    #[tokio::test]
    async fn test_supported_command_short_circuits() {
        let f = fixture(Arc::default()).await;
        let result = f
            .service
            .apply_setting(
                &SettingApplicationRequest::command("taskbar-cleanup", CLEAN_TASKBAR),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(*f.commands.ran.lock(), vec![CLEAN_TASKBAR]);
        assert!(executed(&f).is_empty());
        assert!(f.system.processes.killed.lock().is_empty());
        assert_eq!(f.system.events.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_command_falls_through_to_apply() {
        let f = fixture(Arc::default()).await;
        f.service
            .apply_setting(
                &SettingApplicationRequest::command("taskbar-cleanup", "defrag_taskbar"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(f.commands.ran.lock().is_empty());
        assert_eq!(executed(&f), vec!["taskbar-cleanup"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let f = fixture(Arc::default()).await;
        let token = CancellationToken::new();
        token.cancel();
        let err = f
            .service
            .apply_setting(&SettingApplicationRequest::toggle("game-mode", true), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(f.system.events.events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_import_skips_process_restart() {
        let f = fixture(Arc::default()).await;
        f.system.import_state.set_active(true);
        f.service
            .apply_setting(
                &SettingApplicationRequest::toggle("taskbar-cleanup", true),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(f.system.processes.killed.lock().is_empty());
        assert_eq!(f.system.events.events.lock().len(), 1);
    }
}
