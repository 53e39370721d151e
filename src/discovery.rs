// src/discovery.rs

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    constants::{ACTIVE_POWER_PLAN_FIELD, ACTIVE_SCHEME_ALIAS},
    models::{RawValue, RawValues, SettingDefinition},
    system::{PowerQuery, RawValueDiscovery, RegistryIo},
};

/// Reads current raw values straight from the registry and the power APIs.
///
/// Registry-backed settings report one field per registry value, keyed by value
/// name. Power plan selections report the active plan under
/// [`ACTIVE_POWER_PLAN_FIELD`]. Power settings report their AC value keyed by
/// the setting GUID.
pub struct SystemRawValueDiscovery {
    registry: Arc<dyn RegistryIo>,
    power: Arc<dyn PowerQuery>,
}

impl SystemRawValueDiscovery {
    pub fn new(registry: Arc<dyn RegistryIo>, power: Arc<dyn PowerQuery>) -> Self {
        Self { registry, power }
    }

    async fn read_setting(&self, setting: &SettingDefinition) -> anyhow::Result<RawValues> {
        let mut values = RawValues::new();

        if setting.is_power_plan_selection() {
            let active = self.power.get_active_power_plan().await?;
            let value = active.map_or(RawValue::Null, |plan| RawValue::Text(plan.guid));
            values.insert(ACTIVE_POWER_PLAN_FIELD.to_string(), value);
            return Ok(values);
        }

        for registry_setting in &setting.registry_settings {
            let value = self
                .registry
                .get_value(&registry_setting.key_path, &registry_setting.value_name)
                .await?
                .unwrap_or(RawValue::Null);
            values.insert(registry_setting.value_name.clone(), value);
        }

        if !setting.power_cfg_settings.is_empty() {
            let snapshot = self
                .power
                .get_all_power_settings_ac_dc(ACTIVE_SCHEME_ALIAS)
                .await?;
            for power_setting in &setting.power_cfg_settings {
                let value = snapshot
                    .get(&power_setting.snapshot_key())
                    .map_or(RawValue::Null, |v| RawValue::from(v.ac));
                values.insert(power_setting.setting_guid.clone(), value);
            }
        }

        Ok(values)
    }
}

#[async_trait]
impl RawValueDiscovery for SystemRawValueDiscovery {
    async fn get_raw_settings_values(
        &self,
        settings: &[SettingDefinition],
    ) -> anyhow::Result<HashMap<String, RawValues>> {
        let mut result = HashMap::with_capacity(settings.len());
        for setting in settings {
            let values = self.read_setting(setting).await?;
            debug!("{:?} -> Read {} raw values", setting.id, values.len());
            result.insert(setting.id.clone(), values);
        }
        Ok(result)
    }
}
