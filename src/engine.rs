// src/engine.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    apply::{
        DeclaredDependencyResolver, ProcessRestartManager, SettingApplicationService, SettingOperationExecutor,
    },
    catalog::DomainProvider,
    combobox::{ComboBoxSetupService, PowerPlanComboBoxService},
    compat_registry::CompatibleSettingsRegistry,
    config::EngineConfig,
    domains::{build_domain_services, default_providers, DomainService},
    errors::{EngineError, EngineResult},
    global::{GlobalSettingsRegistry, SettingsPreloader, SettingsRouter},
    models::{
        ComboBoxSetupResult, OperationResult, PowerPlanOption, RawValue, RawValues, SettingApplicationRequest,
        SettingDefinition,
    },
    system::SystemServices,
};

/// Everything wired together behind one handle.
pub struct TweakEngine {
    registry: Arc<CompatibleSettingsRegistry>,
    global: Arc<GlobalSettingsRegistry>,
    router: Arc<SettingsRouter>,
    preloader: SettingsPreloader,
    power_plans: Arc<PowerPlanComboBoxService>,
    combo_boxes: ComboBoxSetupService,
    application: SettingApplicationService,
}

impl TweakEngine {
    pub fn new(config: EngineConfig, system: SystemServices) -> Self {
        Self::with_providers(config, system, default_providers())
    }

    pub fn with_providers(
        config: EngineConfig,
        system: SystemServices,
        providers: Vec<Arc<dyn DomainProvider>>,
    ) -> Self {
        let registry = Arc::new(CompatibleSettingsRegistry::from_system(providers, &system));
        registry.set_filter_enabled(config.filter_enabled);

        let global = Arc::new(GlobalSettingsRegistry::new());
        let domains = build_domain_services(registry.clone(), &system);
        let router = Arc::new(SettingsRouter::new(domains, global.clone(), registry.clone()));
        let preloader = SettingsPreloader::new(registry.clone(), global.clone());

        let power_plans = Arc::new(PowerPlanComboBoxService::new(system.power.clone()));
        let combo_boxes = ComboBoxSetupService::new(system.discovery.clone(), power_plans.clone());

        let executor = Arc::new(SettingOperationExecutor::new(
            system.registry.clone(),
            system.power.clone(),
            power_plans.clone(),
        ));
        let restarts = Arc::new(ProcessRestartManager::new(
            system.processes.clone(),
            system.services.clone(),
            system.import_state.clone(),
            &config,
        ));
        let application = SettingApplicationService::new(
            router.clone(),
            global.clone(),
            executor,
            Arc::new(DeclaredDependencyResolver),
            restarts,
            system.events.clone(),
        );

        Self {
            registry,
            global,
            router,
            preloader,
            power_plans,
            combo_boxes,
            application,
        }
    }

    /// Runs discovery and fills the global registry. Safe to call repeatedly.
    pub async fn initialize(&self, token: &CancellationToken) -> EngineResult<()> {
        self.registry.initialize(token).await?;
        self.preloader.preload(token).await
    }

    pub fn set_filter_enabled(&self, enabled: bool) {
        self.registry.set_filter_enabled(enabled);
        for domain in self.router.domains() {
            domain.invalidate_cache();
        }
    }

    pub fn is_filter_enabled(&self) -> bool {
        self.registry.is_filter_enabled()
    }

    /// The domain's settings in the active view, or `None` for an unknown domain.
    pub async fn get_settings(&self, domain: &str) -> Option<Arc<[SettingDefinition]>> {
        let service = self.router.domain(domain)?;
        Some(service.get_settings().await)
    }

    pub async fn apply_setting(
        &self,
        request: &SettingApplicationRequest,
        token: &CancellationToken,
    ) -> EngineResult<OperationResult> {
        self.application.apply_setting(request, token).await
    }

    pub async fn setup_combo_box_options(
        &self,
        setting_id: &str,
        current_value: Option<&RawValue>,
        token: &CancellationToken,
    ) -> EngineResult<ComboBoxSetupResult> {
        let setting = self.find_setting(setting_id).await?;
        self.combo_boxes
            .setup_combo_box_options(&setting, current_value, token)
            .await
    }

    pub async fn resolve_index_from_raw_values(
        &self,
        setting_id: &str,
        raw_values: &RawValues,
        token: &CancellationToken,
    ) -> EngineResult<usize> {
        let setting = self.find_setting(setting_id).await?;
        self.combo_boxes
            .resolve_index_from_raw_values(&setting, raw_values, token)
            .await
    }

    pub async fn get_power_plan_options(&self, token: &CancellationToken) -> EngineResult<Arc<[PowerPlanOption]>> {
        self.power_plans.get_power_plan_options(token).await
    }

    pub fn registry(&self) -> &Arc<CompatibleSettingsRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<SettingsRouter> {
        &self.router
    }

    pub fn global(&self) -> &Arc<GlobalSettingsRegistry> {
        &self.global
    }

    pub fn domains(&self) -> &[Arc<dyn DomainService>] {
        self.router.domains()
    }

    async fn find_setting(&self, setting_id: &str) -> EngineResult<SettingDefinition> {
        let not_found = || EngineError::SettingNotFound(setting_id.to_string());
        let domain = self.router.find_domain_for_setting(setting_id).ok_or_else(not_found)?;
        domain
            .get_settings()
            .await
            .iter()
            .find(|setting| setting.id == setting_id)
            .cloned()
            .ok_or_else(not_found)
    }
}
