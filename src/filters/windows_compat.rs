// src/filters/windows_compat.rs

use std::sync::Arc;

use tracing::{debug, info};

use super::annotate;
use crate::{models::SettingDefinition, system::OsVersionProbe};

/// Drops (or, in bypass mode, annotates) settings that do not fit the running
/// Windows edition and build.
pub struct WindowsCompatibilityFilter {
    os: Arc<dyn OsVersionProbe>,
}

impl WindowsCompatibilityFilter {
    pub fn new(os: Arc<dyn OsVersionProbe>) -> Self {
        Self { os }
    }

    /// Filters `settings` against the current OS.
    ///
    /// With `apply_filter == false` nothing is removed; every setting that would
    /// have been removed carries a `version_compatibility_message` instead.
    /// Survivors keep their relative order.
    pub fn filter(&self, settings: Vec<SettingDefinition>, apply_filter: bool) -> Vec<SettingDefinition> {
        let build = self.os.build_number();

        if self.os.is_windows_server() {
            info!(
                "Windows Server detected (build {}), skipping OS version filtering for {} settings",
                build,
                settings.len()
            );
            return settings;
        }

        let is_windows11 = self.os.is_windows11();
        let total = settings.len();
        let mut result = Vec::with_capacity(total);

        for mut setting in settings {
            match incompatibility_reason(&setting, is_windows11, build) {
                None => result.push(setting),
                Some(reason) if apply_filter => {
                    debug!("{:?} -> Excluded: {}", setting.id, reason);
                }
                Some(reason) => {
                    annotate(&mut setting, &reason);
                    result.push(setting);
                }
            }
        }

        if apply_filter {
            debug!(
                "Windows compatibility filter kept {} of {} settings (build {})",
                result.len(),
                total,
                build
            );
        }
        result
    }
}

fn incompatibility_reason(setting: &SettingDefinition, is_windows11: bool, build: u32) -> Option<String> {
    let os = &setting.os;

    if os.windows10_only && is_windows11 {
        return Some("This setting is only available on Windows 10".to_string());
    }
    if os.windows11_only && !is_windows11 {
        return Some("This setting is only available on Windows 11".to_string());
    }
    if let Some(min) = os.minimum_build {
        if build < min {
            return Some(format!("Requires Windows build {} or newer (current build {})", min, build));
        }
    }
    if let Some(max) = os.maximum_build {
        if build > max {
            return Some(format!("Requires Windows build {} or older (current build {})", max, build));
        }
    }
    if !os.supported_build_ranges.is_empty()
        && !os
            .supported_build_ranges
            .iter()
            .any(|&(min, max)| (min..=max).contains(&build))
    {
        let ranges = os
            .supported_build_ranges
            .iter()
            .map(|(min, max)| format!("{}-{}", min, max))
            .collect::<Vec<_>>()
            .join(", ");
        return Some(format!(
            "Current build {} is outside the supported build ranges ({})",
            build, ranges
        ));
    }
    None
}
