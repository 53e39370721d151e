// src/global.rs

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::{
    cancellation::ensure_not_cancelled,
    compat_registry::CompatibleSettingsRegistry,
    domains::DomainService,
    errors::{EngineError, EngineResult},
    models::SettingDefinition,
};

#[derive(Debug, Clone)]
struct RegisteredSetting {
    domain: String,
    setting: Arc<SettingDefinition>,
}

/// Flat id -> (domain, definition) lookup across every domain.
#[derive(Debug, Default)]
pub struct GlobalSettingsRegistry {
    entries: RwLock<HashMap<String, RegisteredSetting>>,
}

impl GlobalSettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_settings(&self, domain: &str, settings: &[SettingDefinition]) {
        let mut entries = self.entries.write();
        for setting in settings {
            entries.insert(
                setting.id.clone(),
                RegisteredSetting {
                    domain: domain.to_string(),
                    setting: Arc::new(setting.clone()),
                },
            );
        }
        debug!("Registered {} settings for domain '{}'", settings.len(), domain);
    }

    /// Registers (or replaces) one definition.
    pub fn register_setting(&self, domain: &str, setting: SettingDefinition) {
        trace!("{:?} -> Registered under domain '{}'", setting.id, domain);
        self.entries.write().insert(
            setting.id.clone(),
            RegisteredSetting {
                domain: domain.to_string(),
                setting: Arc::new(setting),
            },
        );
    }

    pub fn get_setting(&self, id: &str) -> Option<Arc<SettingDefinition>> {
        self.entries.read().get(id).map(|entry| entry.setting.clone())
    }

    pub fn domain_of(&self, id: &str) -> Option<String> {
        self.entries.read().get(id).map(|entry| entry.domain.clone())
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Maps setting ids to the domain service that owns them.
pub struct SettingsRouter {
    domains: Vec<Arc<dyn DomainService>>,
    global: Arc<GlobalSettingsRegistry>,
    registry: Arc<CompatibleSettingsRegistry>,
}

impl SettingsRouter {
    pub fn new(
        domains: Vec<Arc<dyn DomainService>>,
        global: Arc<GlobalSettingsRegistry>,
        registry: Arc<CompatibleSettingsRegistry>,
    ) -> Self {
        Self {
            domains,
            global,
            registry,
        }
    }

    pub fn domain(&self, name: &str) -> Option<Arc<dyn DomainService>> {
        self.domains
            .iter()
            .find(|service| service.domain_name() == name)
            .cloned()
    }

    pub fn domains(&self) -> &[Arc<dyn DomainService>] {
        &self.domains
    }

    /// Owning domain of `id`. Uses the global map first and, before preloading,
    /// falls back to scanning the registry's bypassed views.
    pub fn find_domain_for_setting(&self, id: &str) -> Option<Arc<dyn DomainService>> {
        if let Some(domain) = self.global.domain_of(id) {
            return self.domain(&domain);
        }

        let all = self.registry.get_all_bypassed_settings().ok()?;
        let (domain, _) = all
            .iter()
            .find(|(_, settings)| settings.iter().any(|s| s.id == id))?;
        debug!("{:?} -> Routed to domain '{}' by scanning catalogs", id, domain);
        self.domain(domain)
    }
}

/// Fills the global registry from every domain once.
pub struct SettingsPreloader {
    registry: Arc<CompatibleSettingsRegistry>,
    global: Arc<GlobalSettingsRegistry>,
    done: OnceCell<()>,
}

impl SettingsPreloader {
    pub fn new(registry: Arc<CompatibleSettingsRegistry>, global: Arc<GlobalSettingsRegistry>) -> Self {
        Self {
            registry,
            global,
            done: OnceCell::new(),
        }
    }

    pub fn is_preloaded(&self) -> bool {
        self.done.initialized()
    }

    /// Initializes the registry if needed and registers every bypassed setting.
    /// Later calls return immediately.
    pub async fn preload(&self, token: &CancellationToken) -> EngineResult<()> {
        ensure_not_cancelled(token)?;
        self.done
            .get_or_try_init(|| async {
                self.registry.initialize(token).await?;
                let all = self.registry.get_all_bypassed_settings()?;
                for (domain, settings) in &all {
                    self.global.register_settings(domain, settings);
                }
                info!(
                    "Preloaded {} settings from {} domains",
                    self.global.len(),
                    all.len()
                );
                Ok::<(), EngineError>(())
            })
            .await?;
        Ok(())
    }
}
