// src/catalog.rs

use std::collections::HashSet;

use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::{
    errors::CatalogError,
    models::{CustomPropertyKind, SettingDefinition},
};

/// Feature areas that own a slice of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
pub enum DomainName {
    Taskbar,
    StartMenu,
    Power,
    Sound,
    Privacy,
    GamingPerformance,
}

/// Contributes the raw (unfiltered) setting list of one domain.
pub trait DomainProvider: Send + Sync {
    fn domain_name(&self) -> &str;

    /// Builds the domain's raw catalog. Errors are reported per domain.
    fn settings(&self) -> anyhow::Result<Vec<SettingDefinition>>;
}

/// Checks a domain catalog before it enters the registry.
///
/// Ids must be unique within the domain, custom properties must not repeat,
/// selection option counts must agree and value mappings must be dense.
pub fn validate_catalog(domain: &str, settings: &[SettingDefinition]) -> Result<(), CatalogError> {
    let mut ids = HashSet::new();
    for setting in settings {
        if !ids.insert(setting.id.as_str()) {
            return Err(CatalogError::DuplicateId {
                domain: domain.to_string(),
                id: setting.id.clone(),
            });
        }
        validate_setting(setting)?;
    }
    Ok(())
}

fn validate_setting(setting: &SettingDefinition) -> Result<(), CatalogError> {
    let mut kinds = HashSet::new();
    for property in setting.custom_properties.iter() {
        let kind = CustomPropertyKind::from(property);
        if !kinds.insert(kind) {
            return Err(CatalogError::DuplicateProperty {
                setting_id: setting.id.clone(),
                kind: kind.to_string(),
            });
        }
    }

    let names = setting.custom_properties.display_names();
    let mappings = setting.custom_properties.value_mappings();

    if let Some(mappings) = mappings {
        let dense = mappings.keys().copied().eq(0..mappings.len());
        if !dense {
            return Err(CatalogError::SparseValueMappings {
                setting_id: setting.id.clone(),
                count: mappings.len(),
            });
        }
    }

    if let (Some(names), Some(mappings)) = (names, mappings) {
        if names.len() != mappings.len() {
            return Err(CatalogError::OptionCountMismatch {
                setting_id: setting.id.clone(),
                display_names: names.len(),
                value_mappings: mappings.len(),
            });
        }
    }

    for &(min, max) in &setting.os.supported_build_ranges {
        if min > max {
            return Err(CatalogError::InvalidBuildRange {
                setting_id: setting.id.clone(),
                min,
                max,
            });
        }
    }

    Ok(())
}
