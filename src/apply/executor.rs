// src/apply/executor.rs

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    cancellation::{ensure_not_cancelled, run_cancellable},
    combobox::{ComboBoxResolver, PowerPlanComboBoxService},
    errors::EngineResult,
    models::{InputType, OperationResult, RawValue, SettingDefinition, ValueMapping},
    system::{PowerQuery, RegistryIo},
};

/// Performs the concrete writes behind one setting.
///
/// Failures are reported in the returned [`OperationResult`]; only cancellation
/// is an error.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn execute(
        &self,
        setting: &SettingDefinition,
        enable: bool,
        value: Option<&RawValue>,
        token: &CancellationToken,
    ) -> EngineResult<OperationResult>;
}

/// Writes registry values and power settings, or switches the power plan.
pub struct SettingOperationExecutor {
    registry: Arc<dyn RegistryIo>,
    power: Arc<dyn PowerQuery>,
    power_plans: Arc<PowerPlanComboBoxService>,
}

impl SettingOperationExecutor {
    pub fn new(
        registry: Arc<dyn RegistryIo>,
        power: Arc<dyn PowerQuery>,
        power_plans: Arc<PowerPlanComboBoxService>,
    ) -> Self {
        Self {
            registry,
            power,
            power_plans,
        }
    }

    async fn activate_power_plan(
        &self,
        setting: &SettingDefinition,
        value: Option<&RawValue>,
        token: &CancellationToken,
    ) -> EngineResult<OperationResult> {
        let Some(index) = value.and_then(RawValue::as_i64) else {
            return Ok(OperationResult::failed(format!(
                "Setting '{}' needs a power plan index",
                setting.id
            )));
        };

        let resolution = self.power_plans.resolve_power_plan_by_index(index, token).await?;
        let guid = match (resolution.success, resolution.guid) {
            (true, Some(guid)) => guid,
            _ => {
                return Ok(OperationResult::failed(
                    resolution
                        .error_message
                        .unwrap_or_else(|| format!("Invalid power plan index {}", index)),
                ))
            }
        };

        if let Err(e) = run_cancellable(token, self.power.set_active_power_plan(&guid)).await? {
            error!("{:?} -> Failed to activate power plan {}: {:#}", setting.id, guid, e);
            return Ok(OperationResult::failed(format!(
                "Failed to activate power plan {}: {:#}",
                guid, e
            )));
        }

        self.power.invalidate_cache();
        self.power_plans.invalidate_cache().await;
        info!("{:?} -> Activated power plan {}", setting.id, guid);
        Ok(OperationResult::succeeded())
    }

    /// Writes the values mapped to one option of a selection.
    async fn apply_mapping(
        &self,
        setting: &SettingDefinition,
        mapping: &ValueMapping,
        token: &CancellationToken,
    ) -> EngineResult<OperationResult> {
        for registry_setting in &setting.registry_settings {
            let Some(value) = mapping.get(&registry_setting.value_name) else {
                continue;
            };
            let write = async {
                if value.is_null() {
                    self.registry
                        .delete_value(&registry_setting.key_path, &registry_setting.value_name)
                        .await
                } else {
                    self.registry
                        .set_value(
                            &registry_setting.key_path,
                            &registry_setting.value_name,
                            value,
                            registry_setting.value_type,
                        )
                        .await
                }
            };
            if let Err(e) = run_cancellable(token, write).await? {
                return Ok(registry_failure(setting, &registry_setting.key_path, &registry_setting.value_name, e));
            }
        }

        for power_setting in &setting.power_cfg_settings {
            let Some(value) = mapping
                .get(&power_setting.setting_guid)
                .and_then(RawValue::as_i64)
                .and_then(|v| u32::try_from(v).ok())
            else {
                continue;
            };
            if let Err(e) =
                run_cancellable(token, self.power.set_power_setting_value(power_setting, value, value)).await?
            {
                return Ok(power_failure(setting, &power_setting.setting_guid, e));
            }
        }

        Ok(OperationResult::succeeded())
    }

    async fn apply_state(
        &self,
        setting: &SettingDefinition,
        enable: bool,
        value: Option<&RawValue>,
        token: &CancellationToken,
    ) -> EngineResult<OperationResult> {
        for registry_setting in &setting.registry_settings {
            let override_value = value.filter(|_| registry_setting.is_primary);
            match run_cancellable(
                token,
                self.registry.apply_setting(registry_setting, enable, override_value),
            )
            .await?
            {
                Ok(true) => {}
                Ok(false) => {
                    return Ok(OperationResult::failed(format!(
                        "Registry rejected value '{}' in '{}'",
                        registry_setting.value_name, registry_setting.key_path
                    )))
                }
                Err(e) => {
                    return Ok(registry_failure(
                        setting,
                        &registry_setting.key_path,
                        &registry_setting.value_name,
                        e,
                    ))
                }
            }
        }

        for power_setting in &setting.power_cfg_settings {
            let target = if enable {
                power_setting.enabled_value
            } else {
                power_setting.disabled_value
            };
            let Some(target) = target else {
                debug!(
                    "{:?} -> No value declared for power setting {}, skipping",
                    setting.id, power_setting.setting_guid
                );
                continue;
            };
            if let Err(e) =
                run_cancellable(token, self.power.set_power_setting_value(power_setting, target, target)).await?
            {
                return Ok(power_failure(setting, &power_setting.setting_guid, e));
            }
        }

        Ok(OperationResult::succeeded())
    }
}

#[async_trait]
impl OperationExecutor for SettingOperationExecutor {
    async fn execute(
        &self,
        setting: &SettingDefinition,
        enable: bool,
        value: Option<&RawValue>,
        token: &CancellationToken,
    ) -> EngineResult<OperationResult> {
        ensure_not_cancelled(token)?;

        if setting.is_power_plan_selection() {
            return self.activate_power_plan(setting, value, token).await;
        }

        let index = value.and_then(RawValue::as_i64);
        if setting.input_type == InputType::Selection {
            if let Some(index) = index {
                let mapping = usize::try_from(index)
                    .ok()
                    .and_then(|i| ComboBoxResolver::value_mapping_for_index(setting, i));
                return match mapping {
                    Some(mapping) => self.apply_mapping(setting, mapping, token).await,
                    None => Ok(OperationResult::failed(format!(
                        "Setting '{}' has no option with index {}",
                        setting.id, index
                    ))),
                };
            }
        }

        self.apply_state(setting, enable, value, token).await
    }
}

fn registry_failure(
    setting: &SettingDefinition,
    key_path: &str,
    value_name: &str,
    e: anyhow::Error,
) -> OperationResult {
    error!(
        "{:?} -> Failed to write '{}' in '{}': {:#}",
        setting.id, value_name, key_path, e
    );
    OperationResult::failed(format!(
        "Failed to write '{}' in '{}': {:#}",
        value_name, key_path, e
    ))
}

fn power_failure(setting: &SettingDefinition, setting_guid: &str, e: anyhow::Error) -> OperationResult {
    error!(
        "{:?} -> Failed to write power setting {}: {:#}",
        setting.id, setting_guid, e
    );
    OperationResult::failed(format!("Failed to write power setting {}: {:#}", setting_guid, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{BALANCED_PLAN, HIGH_PERFORMANCE_PLAN},
        models::{mapping, CustomProperty, PowerCfgSetting, PowerPlan, RegistrySetting},
        test_support::{FakePower, FakeRegistry},
    };

    const KEY: &str = r"HKEY_CURRENT_USER\Software\Tweaks";

    fn executor() -> (SettingOperationExecutor, Arc<FakeRegistry>, Arc<FakePower>) {
        let registry = Arc::new(FakeRegistry::default());
        let power = Arc::new(FakePower::default());
        let plans = Arc::new(PowerPlanComboBoxService::new(power.clone()));
        (
            SettingOperationExecutor::new(registry.clone(), power.clone(), plans),
            registry,
            power,
        )
    }

    #[tokio::test]
    async fn test_toggle_writes_enabled_and_disabled_values() {
        let (executor, registry, _) = executor();
        let setting = SettingDefinition::toggle("t", "T", "")
            .with_registry(RegistrySetting::dword(KEY, "Flag", 1, None));
        let token = CancellationToken::new();

        assert!(executor.execute(&setting, true, None, &token).await.unwrap().success);
        assert_eq!(registry.get(KEY, "Flag"), Some(RawValue::Int(1)));

        assert!(executor.execute(&setting, false, None, &token).await.unwrap().success);
        assert_eq!(registry.get(KEY, "Flag"), None);
    }

    #[tokio::test]
    async fn test_selection_writes_mapping_for_index() {
        let (executor, registry, power) = executor();
        let setting = SettingDefinition::selection("s", "S", "")
            .with_registry(RegistrySetting::dword(KEY, "Mode", 0, None))
            .with_power_cfg(PowerCfgSetting::new("sub", "guid-a"))
            .with_options(vec![
                ("Off", mapping([("Mode", RawValue::Null), ("guid-a", RawValue::Int(0))])),
                ("On", mapping([("Mode", RawValue::Int(5)), ("guid-a", RawValue::Int(3))])),
            ]);
        let token = CancellationToken::new();

        let result = executor
            .execute(&setting, true, Some(&RawValue::Int(1)), &token)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(registry.get(KEY, "Mode"), Some(RawValue::Int(5)));
        assert_eq!(*power.written.lock(), vec![("guid-a".to_string(), 3, 3)]);

        executor
            .execute(&setting, true, Some(&RawValue::Int(0)), &token)
            .await
            .unwrap();
        assert_eq!(registry.get(KEY, "Mode"), None);

        let bad = executor
            .execute(&setting, true, Some(&RawValue::Int(9)), &token)
            .await
            .unwrap();
        assert!(!bad.success);
    }

    #[tokio::test]
    async fn test_registry_failure_is_reported_not_raised() {
        let (executor, registry, _) = executor();
        registry.fail_writes_to(KEY);
        let setting = SettingDefinition::toggle("t", "T", "")
            .with_registry(RegistrySetting::dword(KEY, "Flag", 1, Some(0)));
        let result = executor
            .execute(&setting, true, None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("Access denied"));
    }

    #[tokio::test]
    async fn test_power_plan_selection_activates_resolved_plan() {
        let (executor, _, power) = executor();
        power.set_plans(vec![
            PowerPlan {
                name: "Balanced".into(),
                guid: BALANCED_PLAN.guid.into(),
                is_active: true,
            },
            PowerPlan {
                name: "High performance".into(),
                guid: HIGH_PERFORMANCE_PLAN.guid.into(),
                is_active: false,
            },
        ]);
        let setting = SettingDefinition::selection("power-plan", "Plan", "")
            .with_property(CustomProperty::PowerPlanSelection);

        // Sorted: Balanced, High performance, Power saver, Ultimate Performance.
        let result = executor
            .execute(&setting, true, Some(&RawValue::Int(1)), &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(*power.activated.lock(), vec![HIGH_PERFORMANCE_PLAN.guid.to_string()]);

        let bad = executor
            .execute(&setting, true, Some(&RawValue::Int(8)), &CancellationToken::new())
            .await
            .unwrap();
        assert!(bad.error_message.unwrap().contains("Invalid power plan index"));
    }

    #[tokio::test]
    async fn test_toggle_power_setting_uses_declared_values() {
        let (executor, _, power) = executor();
        let setting = SettingDefinition::toggle("p", "P", "")
            .with_power_cfg(PowerCfgSetting::new("sub", "guid-b").with_values(2, 0));
        executor
            .execute(&setting, false, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*power.written.lock(), vec![("guid-b".to_string(), 0, 0)]);
    }
}
