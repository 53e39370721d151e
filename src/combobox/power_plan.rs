// src/combobox/power_plan.rs

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cancellation::{ensure_not_cancelled, run_cancellable},
    constants::{ACTIVE_POWER_PLAN_FIELD, PREDEFINED_POWER_PLANS},
    errors::EngineResult,
    models::{
        ComboBoxOption, ComboBoxSetupResult, PowerPlan, PowerPlanOption, PowerPlanResolution,
        RawValue, RawValues, SettingDefinition,
    },
    system::PowerQuery,
};

/// Options for the power plan selection: the well-known plans merged with
/// whatever the machine reports.
pub struct PowerPlanComboBoxService {
    power: Arc<dyn PowerQuery>,
    options: Mutex<Option<Arc<[PowerPlanOption]>>>,
}

impl PowerPlanComboBoxService {
    pub fn new(power: Arc<dyn PowerQuery>) -> Self {
        Self {
            power,
            options: Mutex::new(None),
        }
    }

    /// Sorted, indexed options. Built once and reused until [`invalidate_cache`](Self::invalidate_cache).
    pub async fn get_power_plan_options(&self, token: &CancellationToken) -> EngineResult<Arc<[PowerPlanOption]>> {
        ensure_not_cancelled(token)?;
        let mut cached = self.options.lock().await;
        if let Some(options) = cached.as_ref() {
            return Ok(options.clone());
        }

        let system_plans = run_cancellable(token, self.power.get_available_power_plans()).await??;
        let options: Arc<[PowerPlanOption]> = build_options(&system_plans).into();
        debug!(
            "Built {} power plan options from {} system plans",
            options.len(),
            system_plans.len()
        );
        *cached = Some(options.clone());
        Ok(options)
    }

    pub async fn invalidate_cache(&self) {
        *self.options.lock().await = None;
    }

    /// Options for the plan selection with the active plan selected.
    pub async fn setup_power_plan_combo_box(
        &self,
        setting: &SettingDefinition,
        _current_value: Option<&RawValue>,
        token: &CancellationToken,
    ) -> EngineResult<ComboBoxSetupResult> {
        let options = match self.get_power_plan_options(token).await {
            Ok(options) => options,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!("{:?} -> Failed to load power plans: {}", setting.id, e);
                return Ok(ComboBoxSetupResult::failure(e.to_string()));
            }
        };

        let selected = options.iter().position(|o| o.is_active).unwrap_or(0);
        let items = options
            .iter()
            .map(|o| ComboBoxOption {
                display_text: o.display_name.clone(),
                index: o.index,
            })
            .collect();
        Ok(ComboBoxSetupResult::succeeded(items, selected))
    }

    /// GUID to activate for the option at `index`.
    pub async fn resolve_power_plan_by_index(
        &self,
        index: i64,
        token: &CancellationToken,
    ) -> EngineResult<PowerPlanResolution> {
        let options = self.get_power_plan_options(token).await?;
        let option = usize::try_from(index).ok().and_then(|i| options.get(i));

        Ok(match option.and_then(|o| o.guid()) {
            Some(guid) => PowerPlanResolution {
                success: true,
                guid: Some(guid.to_string()),
                error_message: None,
            },
            None => PowerPlanResolution {
                success: false,
                guid: None,
                error_message: Some(if options.is_empty() {
                    format!("Invalid power plan index {}: no power plans are available", index)
                } else {
                    format!(
                        "Invalid power plan index {} (valid range 0..{})",
                        index,
                        options.len() - 1
                    )
                }),
            },
        })
    }

    /// Index of the option whose GUID equals the active plan GUID in `raw_values`.
    /// Anything that cannot be matched resolves to 0.
    pub async fn resolve_index_from_raw_values(
        &self,
        setting: &SettingDefinition,
        raw_values: &RawValues,
        token: &CancellationToken,
    ) -> EngineResult<usize> {
        let Some(active_guid) = raw_values
            .get(ACTIVE_POWER_PLAN_FIELD)
            .and_then(RawValue::as_str)
        else {
            debug!("{:?} -> No active power plan value, defaulting to 0", setting.id);
            return Ok(0);
        };

        let options = match self.get_power_plan_options(token).await {
            Ok(options) => options,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!("{:?} -> Failed to load power plans, defaulting to 0: {}", setting.id, e);
                return Ok(0);
            }
        };

        Ok(options
            .iter()
            .find(|o| o.guid() == Some(active_guid))
            .map_or(0, |o| o.index))
    }
}

fn build_options(system_plans: &[PowerPlan]) -> Vec<PowerPlanOption> {
    let mut options = Vec::with_capacity(system_plans.len() + PREDEFINED_POWER_PLANS.len());
    let mut merged = vec![false; system_plans.len()];

    for predefined in PREDEFINED_POWER_PLANS {
        let system = system_plans
            .iter()
            .position(|plan| plan.guid.eq_ignore_ascii_case(predefined.guid));
        let system_plan = system.map(|i| {
            merged[i] = true;
            system_plans[i].clone()
        });
        let display_name = match &system_plan {
            Some(plan) if !plan.name.is_empty() => plan.name.clone(),
            _ => predefined.name.to_string(),
        };
        options.push(PowerPlanOption {
            display_name,
            index: 0,
            is_active: system_plan.as_ref().is_some_and(|p| p.is_active),
            exists_on_system: system_plan.is_some(),
            system_plan,
            predefined_plan: Some(predefined),
        });
    }

    for (plan, _) in system_plans.iter().zip(&merged).filter(|(_, merged)| !**merged) {
        options.push(PowerPlanOption {
            display_name: plan.name.clone(),
            index: 0,
            system_plan: Some(plan.clone()),
            predefined_plan: None,
            exists_on_system: true,
            is_active: plan.is_active,
        });
    }

    options.sort_by_key(|o| o.display_name.to_lowercase());
    for (index, option) in options.iter_mut().enumerate() {
        option.index = index;
    }
    options
}
