// src/compat_registry.rs

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use indexmap::IndexMap;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cancellation::ensure_not_cancelled,
    catalog::{validate_catalog, DomainProvider},
    errors::{CatalogError, EngineError, EngineResult},
    filters::{HardwareCompatibilityFilter, PowerSettingsValidationService, WindowsCompatibilityFilter},
    models::SettingDefinition,
    system::SystemServices,
};

/// Domain name -> settings, in provider registration order.
pub type DomainSettings = IndexMap<String, Arc<[SettingDefinition]>>;

/// Lifecycle of the registry. `Initialized` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryStatus {
    Uninitialized,
    Initializing,
    Initialized,
}

#[derive(Debug, Default)]
struct RegistryState {
    filtered: DomainSettings,
    bypassed: DomainSettings,
}

/// Runs every domain catalog through the compatibility filters once and serves
/// the results.
///
/// Two views are kept per domain: `filtered` holds only what applies to this
/// machine, `bypassed` holds everything with exclusion reasons attached.
pub struct CompatibleSettingsRegistry {
    providers: Vec<Arc<dyn DomainProvider>>,
    windows_filter: WindowsCompatibilityFilter,
    hardware_filter: HardwareCompatibilityFilter,
    power_validation: PowerSettingsValidationService,
    state: OnceCell<RegistryState>,
    initializing: AtomicBool,
    filter_enabled: AtomicBool,
}

impl CompatibleSettingsRegistry {
    pub fn new(
        providers: Vec<Arc<dyn DomainProvider>>,
        windows_filter: WindowsCompatibilityFilter,
        hardware_filter: HardwareCompatibilityFilter,
        power_validation: PowerSettingsValidationService,
    ) -> Self {
        Self {
            providers,
            windows_filter,
            hardware_filter,
            power_validation,
            state: OnceCell::new(),
            initializing: AtomicBool::new(false),
            filter_enabled: AtomicBool::new(true),
        }
    }

    /// Wires the three filters from the system collaborators.
    pub fn from_system(providers: Vec<Arc<dyn DomainProvider>>, system: &SystemServices) -> Self {
        Self::new(
            providers,
            WindowsCompatibilityFilter::new(system.os.clone()),
            HardwareCompatibilityFilter::new(system.hardware.clone()),
            PowerSettingsValidationService::new(system.power.clone(), system.registry.clone()),
        )
    }

    /// Discovers and filters every domain. Concurrent callers share one pass;
    /// calls after completion return immediately.
    pub async fn initialize(&self, token: &CancellationToken) -> EngineResult<()> {
        ensure_not_cancelled(token)?;
        self.state.get_or_try_init(|| self.discover(token)).await?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized()
    }

    pub fn status(&self) -> RegistryStatus {
        if self.state.initialized() {
            RegistryStatus::Initialized
        } else if self.initializing.load(Ordering::SeqCst) {
            RegistryStatus::Initializing
        } else {
            RegistryStatus::Uninitialized
        }
    }

    /// Switches reads between the filtered and bypassed views. Does not rediscover.
    pub fn set_filter_enabled(&self, enabled: bool) {
        let previous = self.filter_enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(
                "Compatibility filtering {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    pub fn is_filter_enabled(&self) -> bool {
        self.filter_enabled.load(Ordering::SeqCst)
    }

    /// Settings for `domain` from the active view. Unknown domains yield an empty slice.
    pub fn get_filtered_settings(&self, domain: &str) -> EngineResult<Arc<[SettingDefinition]>> {
        let state = self.state()?;
        let view = if self.is_filter_enabled() {
            &state.filtered
        } else {
            &state.bypassed
        };
        Ok(lookup(view, domain))
    }

    pub fn get_all_filtered_settings(&self) -> EngineResult<DomainSettings> {
        let state = self.state()?;
        Ok(if self.is_filter_enabled() {
            state.filtered.clone()
        } else {
            state.bypassed.clone()
        })
    }

    pub fn get_bypassed_settings(&self, domain: &str) -> EngineResult<Arc<[SettingDefinition]>> {
        Ok(lookup(&self.state()?.bypassed, domain))
    }

    pub fn get_all_bypassed_settings(&self) -> EngineResult<DomainSettings> {
        Ok(self.state()?.bypassed.clone())
    }

    /// Names of the domains that made it through discovery.
    pub fn domain_names(&self) -> EngineResult<Vec<String>> {
        Ok(self.state()?.bypassed.keys().cloned().collect())
    }

    fn state(&self) -> EngineResult<&RegistryState> {
        self.state.get().ok_or(EngineError::NotInitialized)
    }

    async fn discover(&self, token: &CancellationToken) -> EngineResult<RegistryState> {
        self.initializing.store(true, Ordering::SeqCst);
        let result = self.discover_domains(token).await;
        self.initializing.store(false, Ordering::SeqCst);
        result
    }

    async fn discover_domains(&self, token: &CancellationToken) -> EngineResult<RegistryState> {
        info!("Initializing compatible settings registry...");

        let mut state = RegistryState::default();
        let mut owners: HashMap<String, String> = HashMap::new();

        for provider in &self.providers {
            ensure_not_cancelled(token)?;
            let domain = provider.domain_name().to_string();

            let raw = match load_catalog(provider.as_ref()) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Failed to load settings for domain '{}': {:#}", domain, e);
                    continue;
                }
            };
            let raw = claim_ids(&domain, raw, &mut owners);

            match self.filter_domain(raw, token).await {
                Ok((filtered, bypassed)) => {
                    debug!(
                        "Domain '{}': {} compatible of {} settings",
                        domain,
                        filtered.len(),
                        bypassed.len()
                    );
                    state.filtered.insert(domain.clone(), filtered.into());
                    state.bypassed.insert(domain, bypassed.into());
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!("Failed to filter settings for domain '{}': {}", domain, e);
                }
            }
        }

        let compatible: usize = state.filtered.values().map(|s| s.len()).sum();
        let total: usize = state.bypassed.values().map(|s| s.len()).sum();
        info!(
            "Compatible settings registry initialized: {} domains, {} of {} settings compatible",
            state.bypassed.len(),
            compatible,
            total
        );
        Ok(state)
    }

    /// Builds the filtered and bypassed views of one domain catalog.
    async fn filter_domain(
        &self,
        raw: Vec<SettingDefinition>,
        token: &CancellationToken,
    ) -> EngineResult<(Vec<SettingDefinition>, Vec<SettingDefinition>)> {
        let filtered = self.windows_filter.filter(raw.clone(), true);
        let filtered = self.hardware_filter.filter(filtered, token).await?;
        let filtered = self.power_validation.filter_by_existence(filtered, token).await?;

        let bypassed = self.windows_filter.filter(raw, false);
        let bypassed = self
            .hardware_filter
            .filter_with_mode(bypassed, false, token)
            .await?;
        let bypassed = self
            .power_validation
            .filter_with_mode(bypassed, false, token)
            .await?;

        Ok((filtered, bypassed))
    }
}

fn load_catalog(provider: &dyn DomainProvider) -> anyhow::Result<Vec<SettingDefinition>> {
    let settings = provider.settings()?;
    validate_catalog(provider.domain_name(), &settings)?;
    Ok(settings)
}

/// Drops settings whose id an earlier domain already owns.
fn claim_ids(
    domain: &str,
    settings: Vec<SettingDefinition>,
    owners: &mut HashMap<String, String>,
) -> Vec<SettingDefinition> {
    settings
        .into_iter()
        .filter(|setting| match owners.get(&setting.id) {
            Some(owner) => {
                warn!(
                    "{}",
                    CatalogError::IdOwnedByOtherDomain {
                        id: setting.id.clone(),
                        owner: owner.clone(),
                        domain: domain.to_string(),
                    }
                );
                false
            }
            None => {
                owners.insert(setting.id.clone(), domain.to_string());
                true
            }
        })
        .collect()
}

fn lookup(view: &DomainSettings, domain: &str) -> Arc<[SettingDefinition]> {
    view.get(domain)
        .cloned()
        .unwrap_or_else(|| Arc::from(Vec::new()))
}
