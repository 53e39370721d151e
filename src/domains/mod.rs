// src/domains/mod.rs

pub mod gaming;
pub mod power;
pub mod privacy;
pub mod sound;
pub mod start_menu;
pub mod taskbar;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    catalog::{DomainName, DomainProvider},
    compat_registry::CompatibleSettingsRegistry,
    errors::{EngineError, EngineResult},
    models::SettingDefinition,
    system::SystemServices,
};

/// One feature area's view of the catalog.
#[async_trait]
pub trait DomainService: Send + Sync {
    fn domain_name(&self) -> &str;

    /// The domain's settings from the registry's active view. Registry errors
    /// are logged and yield an empty list.
    async fn get_settings(&self) -> Arc<[SettingDefinition]>;

    fn invalidate_cache(&self);

    fn as_command_executor(&self) -> Option<&dyn CommandExecutor> {
        None
    }
}

/// Named one-shot actions a domain offers besides its settings.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    fn supported_commands(&self) -> &[&'static str];

    fn supports_command(&self, name: &str) -> bool {
        self.supported_commands().contains(&name)
    }

    /// Runs `name`. Unknown names fail with [`EngineError::UnsupportedCommand`].
    async fn execute_command(&self, name: &str, token: &CancellationToken) -> EngineResult<()>;
}

/// Empty settings list returned when the registry cannot answer.
fn no_settings() -> Arc<[SettingDefinition]> {
    Arc::from(Vec::new())
}

/// `None` after logging when the registry cannot answer.
fn read_registry(registry: &CompatibleSettingsRegistry, domain: &str) -> Option<Arc<[SettingDefinition]>> {
    match registry.get_filtered_settings(domain) {
        Ok(settings) => Some(settings),
        Err(e) => {
            error!("Failed to load settings for domain '{}': {}", domain, e);
            None
        }
    }
}

/// Asks the registry once and keeps returning the same list until invalidated.
pub struct CachedDomainService {
    name: String,
    registry: Arc<CompatibleSettingsRegistry>,
    cache: Mutex<Option<Arc<[SettingDefinition]>>>,
    commands: Option<Arc<dyn CommandExecutor>>,
}

impl CachedDomainService {
    pub fn new(name: &str, registry: Arc<CompatibleSettingsRegistry>) -> Self {
        Self {
            name: name.to_string(),
            registry,
            cache: Mutex::new(None),
            commands: None,
        }
    }

    pub fn with_commands(mut self, commands: Arc<dyn CommandExecutor>) -> Self {
        self.commands = Some(commands);
        self
    }
}

#[async_trait]
impl DomainService for CachedDomainService {
    fn domain_name(&self) -> &str {
        &self.name
    }

    async fn get_settings(&self) -> Arc<[SettingDefinition]> {
        if let Some(cached) = self.cache.lock().as_ref() {
            return cached.clone();
        }
        match read_registry(&self.registry, &self.name) {
            Some(settings) => {
                *self.cache.lock() = Some(settings.clone());
                settings
            }
            None => no_settings(),
        }
    }

    fn invalidate_cache(&self) {
        debug!("Invalidating settings cache for domain '{}'", self.name);
        *self.cache.lock() = None;
    }

    fn as_command_executor(&self) -> Option<&dyn CommandExecutor> {
        self.commands.as_deref()
    }
}

/// Asks the registry on every call.
pub struct PassThroughDomainService {
    name: String,
    registry: Arc<CompatibleSettingsRegistry>,
    commands: Option<Arc<dyn CommandExecutor>>,
}

impl PassThroughDomainService {
    pub fn new(name: &str, registry: Arc<CompatibleSettingsRegistry>) -> Self {
        Self {
            name: name.to_string(),
            registry,
            commands: None,
        }
    }

    pub fn with_commands(mut self, commands: Arc<dyn CommandExecutor>) -> Self {
        self.commands = Some(commands);
        self
    }
}

#[async_trait]
impl DomainService for PassThroughDomainService {
    fn domain_name(&self) -> &str {
        &self.name
    }

    async fn get_settings(&self) -> Arc<[SettingDefinition]> {
        read_registry(&self.registry, &self.name).unwrap_or_else(no_settings)
    }

    fn invalidate_cache(&self) {}

    fn as_command_executor(&self) -> Option<&dyn CommandExecutor> {
        self.commands.as_deref()
    }
}

/// Fails with [`EngineError::UnsupportedCommand`] unless `executor` knows `name`.
pub(crate) fn ensure_supported(executor: &dyn CommandExecutor, name: &str) -> EngineResult<()> {
    if executor.supports_command(name) {
        Ok(())
    } else {
        Err(EngineError::UnsupportedCommand(name.to_string()))
    }
}

/// Catalog providers for every built-in domain, in discovery order.
pub fn default_providers() -> Vec<Arc<dyn DomainProvider>> {
    vec![
        Arc::new(taskbar::TaskbarSettings),
        Arc::new(start_menu::StartMenuSettings),
        Arc::new(power::PowerSettings),
        Arc::new(sound::SoundSettings),
        Arc::new(privacy::PrivacySettings),
        Arc::new(gaming::GamingPerformanceSettings),
    ]
}

/// One service per built-in domain, with command executors attached where the
/// domain has commands.
pub fn build_domain_services(
    registry: Arc<CompatibleSettingsRegistry>,
    system: &SystemServices,
) -> Vec<Arc<dyn DomainService>> {
    let cached = |domain: DomainName| CachedDomainService::new(domain.as_ref(), registry.clone());
    vec![
        Arc::new(cached(DomainName::Taskbar).with_commands(Arc::new(
            taskbar::TaskbarCommands::new(system.registry.clone(), system.processes.clone()),
        ))),
        Arc::new(cached(DomainName::StartMenu).with_commands(Arc::new(
            start_menu::StartMenuCommands::new(system.registry.clone(), system.processes.clone()),
        ))),
        // Plan lists change underneath us, so Power always asks again.
        Arc::new(PassThroughDomainService::new(
            DomainName::Power.as_ref(),
            registry.clone(),
        )),
        Arc::new(cached(DomainName::Sound)),
        Arc::new(cached(DomainName::Privacy)),
        Arc::new(cached(DomainName::GamingPerformance)),
    ]
}
