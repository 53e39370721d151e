// src/combobox/mod.rs

mod power_plan;
mod resolver;

pub use power_plan::PowerPlanComboBoxService;
pub use resolver::{ComboBoxResolver, IndexResolution};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cancellation::{ensure_not_cancelled, run_cancellable},
    errors::EngineResult,
    models::{ComboBoxOption, ComboBoxSetupResult, InputType, RawValue, RawValues, SettingDefinition},
    system::RawValueDiscovery,
};

/// Builds the option list of a selection setting and works out which option is
/// currently in effect.
pub struct ComboBoxSetupService {
    discovery: Arc<dyn RawValueDiscovery>,
    power_plans: Arc<PowerPlanComboBoxService>,
}

impl ComboBoxSetupService {
    pub fn new(discovery: Arc<dyn RawValueDiscovery>, power_plans: Arc<PowerPlanComboBoxService>) -> Self {
        Self {
            discovery,
            power_plans,
        }
    }

    /// An integer `current_value` is taken as the selected index. Anything else
    /// means the live values are read and resolved.
    pub async fn setup_combo_box_options(
        &self,
        setting: &SettingDefinition,
        current_value: Option<&RawValue>,
        token: &CancellationToken,
    ) -> EngineResult<ComboBoxSetupResult> {
        ensure_not_cancelled(token)?;

        if setting.input_type != InputType::Selection {
            return Ok(ComboBoxSetupResult::failure(format!(
                "Setting '{}' is not a ComboBox setting",
                setting.id
            )));
        }

        if setting.is_power_plan_selection() {
            return self
                .power_plans
                .setup_power_plan_combo_box(setting, current_value, token)
                .await;
        }

        let names = match setting.custom_properties.display_names() {
            Some(names) if !names.is_empty() => names,
            _ => {
                return Ok(ComboBoxSetupResult::failure(format!(
                    "Setting '{}' has no options to display",
                    setting.id
                )))
            }
        };

        let options = names
            .iter()
            .enumerate()
            .map(|(index, name)| ComboBoxOption {
                display_text: name.clone(),
                index,
            })
            .collect();

        let selected = match current_value {
            // Negative indexes cannot address an option.
            Some(RawValue::Int(index)) => usize::try_from(*index).unwrap_or(0),
            _ => self.resolve_current_index(setting, token).await?,
        };

        Ok(ComboBoxSetupResult::succeeded(options, selected))
    }

    /// Resolves `raw_values` to an option index, falling back to 0 when nothing
    /// matches or resolution fails.
    pub async fn resolve_index_from_raw_values(
        &self,
        setting: &SettingDefinition,
        raw_values: &RawValues,
        token: &CancellationToken,
    ) -> EngineResult<usize> {
        ensure_not_cancelled(token)?;

        if setting.is_power_plan_selection() {
            return self
                .power_plans
                .resolve_index_from_raw_values(setting, raw_values, token)
                .await;
        }

        Ok(match ComboBoxResolver::resolve(setting, raw_values) {
            Ok(IndexResolution::Found(index)) => index,
            Ok(IndexResolution::NotFound) => {
                debug!("{:?} -> No option matches the current values, defaulting to 0", setting.id);
                0
            }
            Err(e) => {
                warn!("{:?} -> Failed to resolve selected option, defaulting to 0: {}", setting.id, e);
                0
            }
        })
    }

    async fn resolve_current_index(&self, setting: &SettingDefinition, token: &CancellationToken) -> EngineResult<usize> {
        let discovered = run_cancellable(
            token,
            self.discovery.get_raw_settings_values(std::slice::from_ref(setting)),
        )
        .await?;

        let raw_values = match discovered {
            Ok(mut values) => values.remove(&setting.id).unwrap_or_default(),
            Err(e) => {
                warn!("{:?} -> Failed to read current values, defaulting to 0: {:#}", setting.id, e);
                return Ok(0);
            }
        };
        self.resolve_index_from_raw_values(setting, &raw_values, token).await
    }
}
