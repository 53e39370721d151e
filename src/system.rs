// src/system.rs
//
// Narrow seams to the operating system. Every probe, registry write and
// process action the engine performs goes through one of these traits.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::models::{
    PowerCfgSetting, PowerPlan, PowerSnapshot, RawValue, RawValues, RegistrySetting,
    RegistryValueType, SettingAppliedEvent, SettingDefinition,
};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait HardwareProbe: Send + Sync {
    async fn has_battery(&self) -> anyhow::Result<bool>;
    async fn has_lid(&self) -> anyhow::Result<bool>;
    async fn supports_brightness_control(&self) -> anyhow::Result<bool>;
    async fn supports_hybrid_sleep(&self) -> anyhow::Result<bool>;
}

pub trait OsVersionProbe: Send + Sync {
    fn is_windows11(&self) -> bool;
    fn is_windows_server(&self) -> bool;
    fn build_number(&self) -> u32;
}

#[async_trait]
pub trait PowerQuery: Send + Sync {
    async fn get_available_power_plans(&self) -> anyhow::Result<Vec<PowerPlan>>;

    async fn get_active_power_plan(&self) -> anyhow::Result<Option<PowerPlan>>;

    /// Reads every setting of `scheme_id` in one pass.
    async fn get_all_power_settings_ac_dc(&self, scheme_id: &str) -> anyhow::Result<PowerSnapshot>;

    async fn is_setting_hardware_controlled(&self, setting: &PowerCfgSetting) -> anyhow::Result<bool>;

    async fn set_active_power_plan(&self, guid: &str) -> anyhow::Result<()>;

    async fn set_power_setting_value(
        &self,
        setting: &PowerCfgSetting,
        ac: u32,
        dc: u32,
    ) -> anyhow::Result<()>;

    /// Drops any cached plans or snapshots.
    fn invalidate_cache(&self);
}

#[async_trait]
pub trait RegistryIo: Send + Sync {
    /// Writes (or deletes) the value for the requested state. `value` overrides
    /// the declared enabled value when present.
    async fn apply_setting(
        &self,
        setting: &RegistrySetting,
        enable: bool,
        value: Option<&RawValue>,
    ) -> anyhow::Result<bool>;

    async fn get_value(&self, key_path: &str, value_name: &str) -> anyhow::Result<Option<RawValue>>;

    async fn set_value(
        &self,
        key_path: &str,
        value_name: &str,
        value: &RawValue,
        value_type: RegistryValueType,
    ) -> anyhow::Result<()>;

    async fn delete_value(&self, key_path: &str, value_name: &str) -> anyhow::Result<()>;

    async fn key_exists(&self, key_path: &str) -> anyhow::Result<bool>;

    /// Deletes a key tree. Implementations refuse shallow or protected paths.
    async fn delete_key(&self, key_path: &str) -> anyhow::Result<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProcessControl: Send + Sync {
    async fn kill_process(&self, name: &str) -> anyhow::Result<()>;
    async fn is_process_running(&self, name: &str) -> anyhow::Result<bool>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ServiceControl: Send + Sync {
    /// Restarts `name`, or every service starting with the prefix when `name` ends with `*`.
    async fn restart_service(&self, name: &str) -> anyhow::Result<()>;
}

/// Reads the live values behind settings, keyed by setting id then field name.
#[async_trait]
pub trait RawValueDiscovery: Send + Sync {
    async fn get_raw_settings_values(
        &self,
        settings: &[SettingDefinition],
    ) -> anyhow::Result<HashMap<String, RawValues>>;
}

#[cfg_attr(test, automock)]
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: SettingAppliedEvent);
}

/// Whether a configuration import is currently running.
#[cfg_attr(test, automock)]
pub trait ImportState: Send + Sync {
    fn is_active(&self) -> bool;
}

/// Process-wide import flag.
#[derive(Debug, Default)]
pub struct ImportFlag {
    active: AtomicBool,
}

impl ImportFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl ImportState for ImportFlag {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Every collaborator the engine needs, bundled for wiring.
#[derive(Clone)]
pub struct SystemServices {
    pub os: Arc<dyn OsVersionProbe>,
    pub hardware: Arc<dyn HardwareProbe>,
    pub power: Arc<dyn PowerQuery>,
    pub registry: Arc<dyn RegistryIo>,
    pub processes: Arc<dyn ProcessControl>,
    pub services: Arc<dyn ServiceControl>,
    pub discovery: Arc<dyn RawValueDiscovery>,
    pub events: Arc<dyn EventPublisher>,
    pub import_state: Arc<dyn ImportState>,
}
