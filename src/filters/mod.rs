// src/filters/mod.rs

mod hardware_compat;
mod power_validation;
mod windows_compat;

pub use hardware_compat::{HardwareCapabilities, HardwareCompatibilityFilter};
pub use power_validation::PowerSettingsValidationService;
pub use windows_compat::WindowsCompatibilityFilter;

use crate::models::SettingDefinition;

/// Records why `setting` would be excluded, keeping earlier reasons.
pub(crate) fn annotate(setting: &mut SettingDefinition, reason: &str) {
    setting.version_compatibility_message = Some(match setting.version_compatibility_message.take() {
        Some(existing) if !existing.is_empty() => format!("{}; {}", existing, reason),
        _ => reason.to_string(),
    });
}
