// src/domains/power.rs

use crate::{
    catalog::{DomainName, DomainProvider},
    models::{
        mapping, CustomProperty, HardwareRequirements, PowerCfgSetting, RawValue, RegistrySetting,
        SettingDefinition,
    },
};

pub const POWER_PLAN_SETTING_ID: &str = "power-plan";

const SUB_BUTTONS: &str = "4f971e89-eebd-4455-a8de-9e59040e7347";
const LID_ACTION: &str = "5ca83367-6e45-459f-a27b-476b1d01c936";
const SUB_VIDEO: &str = "7516b95f-f776-4464-8c53-06167f40cc99";
const ADAPTIVE_BRIGHTNESS: &str = "fbd9aa66-9553-4097-ba44-ed6e9d65eab8";
const SUB_SLEEP: &str = "238c9fa8-0aad-41ed-83f4-97be242c8f20";
const HYBRID_SLEEP: &str = "94ac6d29-73ce-41a6-809f-6363ba21b47e";
const SUB_PROCESSOR: &str = "54533251-82be-4824-96c1-47b60b740d00";
const BOOST_MODE: &str = "be337238-0d82-4146-a960-4f3749d470c7";
const SUB_PCIE: &str = "501a4d13-42af-4429-9fd1-a8218c268e20";
const LINK_STATE: &str = "ee12f906-d277-404b-b6da-e5fa1a576df5";

const POWER_SETTINGS_KEY: &str =
    r"HKEY_LOCAL_MACHINE\SYSTEM\CurrentControlSet\Control\Power\PowerSettings";

/// Registry flag that unhides a power setting in the control panel and the APIs.
fn unhide(subgroup: &str, setting: &str) -> RegistrySetting {
    RegistrySetting::dword(
        &format!(r"{}\{}\{}", POWER_SETTINGS_KEY, subgroup, setting),
        "Attributes",
        2,
        Some(1),
    )
}

pub struct PowerSettings;

impl DomainProvider for PowerSettings {
    fn domain_name(&self) -> &str {
        DomainName::Power.as_ref()
    }

    fn settings(&self) -> anyhow::Result<Vec<SettingDefinition>> {
        Ok(vec![
            SettingDefinition::selection(
                POWER_PLAN_SETTING_ID,
                "Power plan",
                "The active power plan",
            )
            .with_property(CustomProperty::PowerPlanSelection)
            .skip_existence_validation(),
            SettingDefinition::selection(
                "power-lid-close-action",
                "Lid close action",
                "What closing the lid does",
            )
            .with_hardware(HardwareRequirements {
                lid: true,
                ..Default::default()
            })
            .with_power_cfg(PowerCfgSetting::new(SUB_BUTTONS, LID_ACTION))
            .with_options(vec![
                ("Do nothing", mapping([(LID_ACTION, RawValue::Int(0))])),
                ("Sleep", mapping([(LID_ACTION, RawValue::Int(1))])),
                ("Hibernate", mapping([(LID_ACTION, RawValue::Int(2))])),
                ("Shut down", mapping([(LID_ACTION, RawValue::Int(3))])),
            ]),
            SettingDefinition::toggle(
                "power-adaptive-brightness",
                "Adaptive brightness",
                "Adjust screen brightness to ambient light",
            )
            .with_hardware(HardwareRequirements {
                brightness_support: true,
                ..Default::default()
            })
            .with_power_cfg(
                PowerCfgSetting::new(SUB_VIDEO, ADAPTIVE_BRIGHTNESS)
                    .with_values(1, 0)
                    .with_hardware_control_check(),
            ),
            SettingDefinition::toggle(
                "power-hybrid-sleep",
                "Hybrid sleep",
                "Save memory to disk when going to sleep",
            )
            .with_hardware(HardwareRequirements {
                hybrid_sleep_capable: true,
                desktop: true,
                ..Default::default()
            })
            .with_power_cfg(PowerCfgSetting::new(SUB_SLEEP, HYBRID_SLEEP).with_values(1, 0)),
            SettingDefinition::selection(
                "power-processor-boost",
                "Processor performance boost mode",
                "How aggressively the CPU boosts above base clock",
            )
            .with_power_cfg(
                PowerCfgSetting::new(SUB_PROCESSOR, BOOST_MODE)
                    .with_enablement(unhide(SUB_PROCESSOR, BOOST_MODE)),
            )
            .with_options(vec![
                ("Disabled", mapping([(BOOST_MODE, RawValue::Int(0))])),
                ("Enabled", mapping([(BOOST_MODE, RawValue::Int(1))])),
                ("Aggressive", mapping([(BOOST_MODE, RawValue::Int(2))])),
                ("Efficient aggressive", mapping([(BOOST_MODE, RawValue::Int(4))])),
            ]),
            SettingDefinition::toggle(
                "power-pcie-link-state",
                "PCI Express power saving",
                "Let PCIe links drop to low power states",
            )
            .with_power_cfg(PowerCfgSetting::new(SUB_PCIE, LINK_STATE).with_values(2, 0)),
        ])
    }
}
