// src/models.rs

use std::{collections::BTreeMap, collections::HashMap, fmt};

use strum_macros::{Display, EnumDiscriminants, EnumString};

use crate::constants::PredefinedPowerPlan;

/// How a setting is presented and applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum InputType {
    Toggle,
    Selection,
}

/// A raw value as read from (or written to) the system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RawValue {
    Int(i64),
    Text(String),
    Null,
}

impl RawValue {
    /// Integer view of the value. Numeric text counts as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Int(v) => Some(*v),
            RawValue::Text(s) => s.trim().parse().ok(),
            RawValue::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Int(v) => write!(f, "{}", v),
            RawValue::Text(s) => write!(f, "{}", s),
            RawValue::Null => write!(f, "null"),
        }
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

impl From<u32> for RawValue {
    fn from(value: u32) -> Self {
        RawValue::Int(i64::from(value))
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

/// Field name -> raw value, for a single setting.
pub type RawValues = HashMap<String, RawValue>;

/// Field name -> value written for one selection index.
pub type ValueMapping = BTreeMap<String, RawValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum RegistryValueType {
    Dword,
    Qword,
    String,
    ExpandString,
    Binary,
}

/// A single registry write backing a setting.
///
/// A `None` enabled/disabled value means the value is deleted for that state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySetting {
    /// Full path including the hive, e.g. `HKEY_CURRENT_USER\Software\...`.
    pub key_path: String,
    pub value_name: String,
    pub value_type: RegistryValueType,
    pub enabled_value: Option<RawValue>,
    pub disabled_value: Option<RawValue>,
    pub recommended_value: Option<RawValue>,
    /// The value that decides the setting's reported state.
    pub is_primary: bool,
}

impl RegistrySetting {
    pub fn dword(key_path: &str, value_name: &str, enabled: u32, disabled: Option<u32>) -> Self {
        Self {
            key_path: key_path.to_string(),
            value_name: value_name.to_string(),
            value_type: RegistryValueType::Dword,
            enabled_value: Some(RawValue::from(enabled)),
            disabled_value: disabled.map(RawValue::from),
            recommended_value: Some(RawValue::from(enabled)),
            is_primary: true,
        }
    }

    pub fn secondary(mut self) -> Self {
        self.is_primary = false;
        self
    }

    /// Value to write for the requested state.
    pub fn value_for(&self, enable: bool) -> Option<&RawValue> {
        if enable {
            self.enabled_value.as_ref()
        } else {
            self.disabled_value.as_ref()
        }
    }
}

/// A `powercfg` entry backing a setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerCfgSetting {
    pub subgroup_guid: String,
    pub setting_guid: String,
    /// Registry write that unhides the setting on machines where it is hidden.
    pub enablement_registry_setting: Option<RegistrySetting>,
    /// Drop the setting when the OS reports it as controlled by hardware.
    pub check_for_hardware_control: bool,
    pub enabled_value: Option<u32>,
    pub disabled_value: Option<u32>,
}

impl PowerCfgSetting {
    pub fn new(subgroup_guid: &str, setting_guid: &str) -> Self {
        Self {
            subgroup_guid: subgroup_guid.to_string(),
            setting_guid: setting_guid.to_string(),
            enablement_registry_setting: None,
            check_for_hardware_control: false,
            enabled_value: None,
            disabled_value: None,
        }
    }

    pub fn with_values(mut self, enabled: u32, disabled: u32) -> Self {
        self.enabled_value = Some(enabled);
        self.disabled_value = Some(disabled);
        self
    }

    pub fn with_enablement(mut self, registry_setting: RegistrySetting) -> Self {
        self.enablement_registry_setting = Some(registry_setting);
        self
    }

    pub fn with_hardware_control_check(mut self) -> Self {
        self.check_for_hardware_control = true;
        self
    }

    /// Lookup key used against power snapshots.
    pub fn snapshot_key(&self) -> String {
        self.setting_guid.to_ascii_lowercase()
    }
}

/// Well-known custom properties a setting may carry.
#[derive(Debug, Clone, PartialEq, Eq, EnumDiscriminants)]
#[strum_discriminants(name(CustomPropertyKind), derive(Display, Hash))]
pub enum CustomProperty {
    /// Option labels for a selection, in display order.
    DisplayNames(Vec<String>),
    /// Option index -> values that represent it.
    ValueMappings(BTreeMap<usize, ValueMapping>),
    /// Options come from the machine's power plans instead of display names.
    PowerPlanSelection,
}

/// The custom properties attached to one setting. Validated when the catalog loads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomProperties(Vec<CustomProperty>);

impl CustomProperties {
    pub fn push(&mut self, property: CustomProperty) {
        self.0.push(property);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CustomProperty> {
        self.0.iter()
    }

    pub fn display_names(&self) -> Option<&[String]> {
        self.0.iter().find_map(|p| match p {
            CustomProperty::DisplayNames(names) => Some(names.as_slice()),
            _ => None,
        })
    }

    pub fn value_mappings(&self) -> Option<&BTreeMap<usize, ValueMapping>> {
        self.0.iter().find_map(|p| match p {
            CustomProperty::ValueMappings(mappings) => Some(mappings),
            _ => None,
        })
    }

    pub fn is_power_plan_selection(&self) -> bool {
        self.0
            .iter()
            .any(|p| matches!(p, CustomProperty::PowerPlanSelection))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardwareRequirements {
    pub battery: bool,
    pub lid: bool,
    pub desktop: bool,
    pub brightness_support: bool,
    pub hybrid_sleep_capable: bool,
}

impl HardwareRequirements {
    pub fn any(&self) -> bool {
        self.battery || self.lid || self.desktop || self.brightness_support || self.hybrid_sleep_capable
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRequirements {
    pub windows10_only: bool,
    pub windows11_only: bool,
    pub minimum_build: Option<u32>,
    pub maximum_build: Option<u32>,
    /// Inclusive `(min, max)` pairs. When non-empty the build must fall in one of them.
    pub supported_build_ranges: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    RequiresEnabled,
    RequiresDisabled,
    RequiresValue(i64),
}

/// Another setting that has to be in a given state first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingDependency {
    pub kind: DependencyKind,
    pub required_setting_id: String,
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub input_type: InputType,
    pub custom_properties: CustomProperties,
    pub registry_settings: Vec<RegistrySetting>,
    pub power_cfg_settings: Vec<PowerCfgSetting>,
    pub hardware: HardwareRequirements,
    pub os: OsRequirements,
    pub validate_existence: bool,
    pub restart_process: Option<String>,
    /// Service to restart. A trailing `*` matches every service with that prefix.
    pub restart_service: Option<String>,
    pub dependencies: Vec<SettingDependency>,
    /// Why the setting would be filtered out. Only set in bypass mode.
    pub version_compatibility_message: Option<String>,
}

impl SettingDefinition {
    fn new(id: &str, name: &str, description: &str, input_type: InputType) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            input_type,
            custom_properties: CustomProperties::default(),
            registry_settings: Vec::new(),
            power_cfg_settings: Vec::new(),
            hardware: HardwareRequirements::default(),
            os: OsRequirements::default(),
            validate_existence: true,
            restart_process: None,
            restart_service: None,
            dependencies: Vec::new(),
            version_compatibility_message: None,
        }
    }

    pub fn toggle(id: &str, name: &str, description: &str) -> Self {
        Self::new(id, name, description, InputType::Toggle)
    }

    pub fn selection(id: &str, name: &str, description: &str) -> Self {
        Self::new(id, name, description, InputType::Selection)
    }

    pub fn with_registry(mut self, setting: RegistrySetting) -> Self {
        self.registry_settings.push(setting);
        self
    }

    pub fn with_power_cfg(mut self, setting: PowerCfgSetting) -> Self {
        self.power_cfg_settings.push(setting);
        self
    }

    pub fn with_property(mut self, property: CustomProperty) -> Self {
        self.custom_properties.push(property);
        self
    }

    /// Display names plus one value mapping per name, keyed by option index.
    pub fn with_options(self, options: Vec<(&str, ValueMapping)>) -> Self {
        let names = options.iter().map(|(name, _)| name.to_string()).collect();
        let mappings = options
            .into_iter()
            .enumerate()
            .map(|(index, (_, mapping))| (index, mapping))
            .collect();
        self.with_property(CustomProperty::DisplayNames(names))
            .with_property(CustomProperty::ValueMappings(mappings))
    }

    pub fn with_hardware(mut self, hardware: HardwareRequirements) -> Self {
        self.hardware = hardware;
        self
    }

    pub fn with_os(mut self, os: OsRequirements) -> Self {
        self.os = os;
        self
    }

    pub fn windows10_only(mut self) -> Self {
        self.os.windows10_only = true;
        self
    }

    pub fn windows11_only(mut self) -> Self {
        self.os.windows11_only = true;
        self
    }

    pub fn min_build(mut self, build: u32) -> Self {
        self.os.minimum_build = Some(build);
        self
    }

    pub fn restarts_process(mut self, process: &str) -> Self {
        self.restart_process = Some(process.to_string());
        self
    }

    pub fn restarts_service(mut self, service: &str) -> Self {
        self.restart_service = Some(service.to_string());
        self
    }

    pub fn depends_on(mut self, required_setting_id: &str, kind: DependencyKind) -> Self {
        self.dependencies.push(SettingDependency {
            kind,
            required_setting_id: required_setting_id.to_string(),
        });
        self
    }

    pub fn skip_existence_validation(mut self) -> Self {
        self.validate_existence = false;
        self
    }

    pub fn is_power_plan_selection(&self) -> bool {
        self.custom_properties.is_power_plan_selection()
    }
}

/// Builds a [`ValueMapping`] from `(field, value)` pairs.
pub fn mapping<const N: usize>(entries: [(&str, RawValue); N]) -> ValueMapping {
    entries
        .into_iter()
        .map(|(field, value)| (field.to_string(), value))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComboBoxOption {
    pub display_text: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComboBoxSetupResult {
    pub success: bool,
    pub options: Vec<ComboBoxOption>,
    pub selected_value: usize,
    pub error_message: Option<String>,
}

impl ComboBoxSetupResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            options: Vec::new(),
            selected_value: 0,
            error_message: Some(message.into()),
        }
    }

    pub fn succeeded(options: Vec<ComboBoxOption>, selected_value: usize) -> Self {
        Self {
            success: true,
            options,
            selected_value,
            error_message: None,
        }
    }
}

/// A power plan as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerPlan {
    pub name: String,
    pub guid: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerPlanOption {
    pub display_name: String,
    pub index: usize,
    pub system_plan: Option<PowerPlan>,
    pub predefined_plan: Option<PredefinedPowerPlan>,
    pub exists_on_system: bool,
    pub is_active: bool,
}

impl PowerPlanOption {
    /// GUID to activate for this option. The installed plan wins over the template.
    pub fn guid(&self) -> Option<&str> {
        self.system_plan
            .as_ref()
            .map(|plan| plan.guid.as_str())
            .or_else(|| self.predefined_plan.map(|plan| plan.guid))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerPlanResolution {
    pub success: bool,
    pub guid: Option<String>,
    pub error_message: Option<String>,
}

/// AC/DC value indexes of one power setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcDcValue {
    pub ac: u32,
    pub dc: u32,
}

/// Lowercase setting GUID -> values, for one scheme.
pub type PowerSnapshot = HashMap<String, AcDcValue>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingApplicationRequest {
    pub setting_id: String,
    pub enable: bool,
    pub value: Option<RawValue>,
    pub command_string: Option<String>,
    pub skip_value_prerequisites: bool,
}

impl SettingApplicationRequest {
    pub fn toggle(setting_id: &str, enable: bool) -> Self {
        Self {
            setting_id: setting_id.to_string(),
            enable,
            ..Default::default()
        }
    }

    pub fn select(setting_id: &str, index: i64) -> Self {
        Self {
            setting_id: setting_id.to_string(),
            enable: true,
            value: Some(RawValue::Int(index)),
            ..Default::default()
        }
    }

    pub fn command(setting_id: &str, command: &str) -> Self {
        Self {
            setting_id: setting_id.to_string(),
            enable: true,
            command_string: Some(command.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub success: bool,
    pub error_message: Option<String>,
}

impl OperationResult {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Published after every apply, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingAppliedEvent {
    pub setting_id: String,
    pub success: bool,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_numeric_text() {
        assert_eq!(RawValue::from(" 12 ").as_i64(), Some(12));
        assert_eq!(RawValue::from("abc").as_i64(), None);
        assert_eq!(RawValue::Null.as_i64(), None);
        assert_eq!(RawValue::from(3u32).as_i64(), Some(3));
    }

    #[test]
    fn test_with_options_builds_matching_properties() {
        let setting = SettingDefinition::selection("quality", "Quality", "").with_options(vec![
            ("Low", mapping([("Quality", RawValue::Int(0))])),
            ("High", mapping([("Quality", RawValue::Int(1))])),
        ]);
        let names = setting.custom_properties.display_names().unwrap();
        assert_eq!(names, ["Low".to_string(), "High".to_string()]);
        let mappings = setting.custom_properties.value_mappings().unwrap();
        assert_eq!(mappings.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert!(!setting.is_power_plan_selection());
    }

    #[test]
    fn test_power_plan_option_guid_prefers_system_plan() {
        let option = PowerPlanOption {
            display_name: "Balanced".into(),
            index: 0,
            system_plan: Some(PowerPlan {
                name: "Balanced".into(),
                guid: "system-guid".into(),
                is_active: false,
            }),
            predefined_plan: Some(crate::constants::BALANCED_PLAN),
            exists_on_system: true,
            is_active: false,
        };
        assert_eq!(option.guid(), Some("system-guid"));

        let template_only = PowerPlanOption {
            system_plan: None,
            ..option
        };
        assert_eq!(template_only.guid(), Some(crate::constants::BALANCED_PLAN.guid));
    }

    #[test]
    fn test_input_type_round_trips_through_strings() {
        use std::str::FromStr;
        assert_eq!(InputType::from_str("Selection").unwrap(), InputType::Selection);
        assert_eq!(InputType::Toggle.to_string(), "Toggle");
    }
}
