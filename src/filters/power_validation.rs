// src/filters/power_validation.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::annotate;
use crate::{
    cancellation::{ensure_not_cancelled, run_cancellable},
    constants::ACTIVE_SCHEME_ALIAS,
    errors::EngineResult,
    models::{PowerCfgSetting, PowerSnapshot, SettingDefinition},
    system::{PowerQuery, RegistryIo},
};

/// Confirms that power-backed settings exist on the active scheme before they
/// are offered.
pub struct PowerSettingsValidationService {
    power: Arc<dyn PowerQuery>,
    registry: Arc<dyn RegistryIo>,
}

impl PowerSettingsValidationService {
    pub fn new(power: Arc<dyn PowerQuery>, registry: Arc<dyn RegistryIo>) -> Self {
        Self { power, registry }
    }

    pub async fn filter_by_existence(
        &self,
        settings: Vec<SettingDefinition>,
        token: &CancellationToken,
    ) -> EngineResult<Vec<SettingDefinition>> {
        self.filter_with_mode(settings, true, token).await
    }

    /// With `apply_filter == false` missing settings are kept and annotated,
    /// and hidden settings are not revealed (no registry writes).
    pub async fn filter_with_mode(
        &self,
        settings: Vec<SettingDefinition>,
        apply_filter: bool,
        token: &CancellationToken,
    ) -> EngineResult<Vec<SettingDefinition>> {
        ensure_not_cancelled(token)?;

        if !settings.iter().any(needs_validation) {
            return Ok(settings);
        }

        let mut snapshot = match self.fetch_snapshot(token).await? {
            Some(snapshot) => snapshot,
            None => return Ok(settings),
        };

        let total = settings.len();
        let mut result = Vec::with_capacity(total);

        for mut setting in settings {
            if !needs_validation(&setting) {
                result.push(setting);
                continue;
            }

            let mut available = false;
            for power_setting in &setting.power_cfg_settings {
                if self
                    .entry_available(&setting.id, power_setting, &mut snapshot, apply_filter, token)
                    .await?
                {
                    available = true;
                    break;
                }
            }

            if available {
                result.push(setting);
            } else if apply_filter {
                debug!(
                    "{:?} -> Excluded: power setting does not exist on the active scheme",
                    setting.id
                );
            } else {
                annotate(&mut setting, "Power setting is not available on this system");
                result.push(setting);
            }
        }

        if apply_filter {
            debug!(
                "Power existence validation kept {} of {} settings",
                result.len(),
                total
            );
        }
        Ok(result)
    }

    /// One bulk read of the active scheme. `None` means the read failed and
    /// callers should not filter.
    async fn fetch_snapshot(&self, token: &CancellationToken) -> EngineResult<Option<PowerSnapshot>> {
        match run_cancellable(token, self.power.get_all_power_settings_ac_dc(ACTIVE_SCHEME_ALIAS)).await? {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(
                    "Failed to read power settings, skipping existence validation: {:#}",
                    e
                );
                Ok(None)
            }
        }
    }

    async fn entry_available(
        &self,
        setting_id: &str,
        power_setting: &PowerCfgSetting,
        snapshot: &mut PowerSnapshot,
        may_reveal: bool,
        token: &CancellationToken,
    ) -> EngineResult<bool> {
        let key = power_setting.snapshot_key();
        let mut present = snapshot.contains_key(&key);

        if !present && may_reveal {
            if let Some(enablement) = &power_setting.enablement_registry_setting {
                present = self
                    .reveal(setting_id, power_setting, enablement, snapshot, token)
                    .await?;
            }
        }

        if !present {
            return Ok(false);
        }

        if power_setting.check_for_hardware_control {
            match run_cancellable(token, self.power.is_setting_hardware_controlled(power_setting)).await? {
                Ok(true) => {
                    debug!(
                        "{:?} -> Power setting {} is hardware controlled",
                        setting_id, power_setting.setting_guid
                    );
                    return Ok(false);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        "{:?} -> Failed to check hardware control for {}: {:#}",
                        setting_id, power_setting.setting_guid, e
                    );
                }
            }
        }

        Ok(true)
    }

    /// Writes the enablement value, refetches the scheme and re-checks the entry.
    async fn reveal(
        &self,
        setting_id: &str,
        power_setting: &PowerCfgSetting,
        enablement: &crate::models::RegistrySetting,
        snapshot: &mut PowerSnapshot,
        token: &CancellationToken,
    ) -> EngineResult<bool> {
        info!(
            "{:?} -> Power setting {} is hidden, writing enablement value to '{}'",
            setting_id, power_setting.setting_guid, enablement.key_path
        );

        match run_cancellable(token, self.registry.apply_setting(enablement, true, None)).await? {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "{:?} -> Enablement write for {} was rejected",
                    setting_id, power_setting.setting_guid
                );
                return Ok(false);
            }
            Err(e) => {
                warn!(
                    "{:?} -> Failed to write enablement value for {}: {:#}",
                    setting_id, power_setting.setting_guid, e
                );
                return Ok(false);
            }
        }

        self.power.invalidate_cache();
        if let Some(refreshed) = self.fetch_snapshot(token).await? {
            *snapshot = refreshed;
        }
        Ok(snapshot.contains_key(&power_setting.snapshot_key()))
    }
}

fn needs_validation(setting: &SettingDefinition) -> bool {
    setting.validate_existence && !setting.power_cfg_settings.is_empty()
}
