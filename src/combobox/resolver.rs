// src/combobox/resolver.rs

use crate::{
    errors::{EngineError, EngineResult},
    models::{RawValue, RawValues, SettingDefinition, ValueMapping},
};

/// Outcome of matching live values against a setting's options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexResolution {
    Found(usize),
    NotFound,
}

/// Maps raw values back to a selection index through the setting's value mappings.
pub struct ComboBoxResolver;

impl ComboBoxResolver {
    /// The lowest index whose mapping agrees with `raw_values` on every field.
    ///
    /// A field missing from `raw_values` reads as [`RawValue::Null`], so a
    /// mapping can describe "value deleted". Settings without value mappings,
    /// or with an empty mapping, cannot be resolved and yield an error.
    pub fn resolve(setting: &SettingDefinition, raw_values: &RawValues) -> EngineResult<IndexResolution> {
        let mappings = setting
            .custom_properties
            .value_mappings()
            .ok_or_else(|| failure(setting, "setting has no value mappings"))?;

        for (&index, mapping) in mappings {
            if mapping.is_empty() {
                return Err(failure(setting, &format!("value mapping for index {} is empty", index)));
            }
            if mapping_matches(mapping, raw_values) {
                return Ok(IndexResolution::Found(index));
            }
        }
        Ok(IndexResolution::NotFound)
    }

    pub fn value_mapping_for_index(setting: &SettingDefinition, index: usize) -> Option<&ValueMapping> {
        setting.custom_properties.value_mappings()?.get(&index)
    }
}

fn mapping_matches(mapping: &ValueMapping, raw_values: &RawValues) -> bool {
    mapping.iter().all(|(field, expected)| {
        let actual = raw_values.get(field).unwrap_or(&RawValue::Null);
        values_match(expected, actual)
    })
}

/// Integers compare numerically, so `"2"` read from a string value matches `2`.
fn values_match(expected: &RawValue, actual: &RawValue) -> bool {
    match (expected, actual) {
        (RawValue::Null, actual) => actual.is_null(),
        (RawValue::Int(e), actual) => actual.as_i64().is_some_and(|a| ints_match(*e, a)),
        (RawValue::Text(e), RawValue::Text(a)) => e == a,
        (RawValue::Text(e), RawValue::Int(a)) => {
            e.trim().parse::<i64>().is_ok_and(|e| ints_match(e, *a))
        }
        (RawValue::Text(_), RawValue::Null) => false,
    }
}

/// Equal, or the same 32-bit pattern: a DWORD written as `-1` reads back as `0xFFFFFFFF`.
fn ints_match(expected: i64, actual: i64) -> bool {
    let in_dword_range = |v: i64| (i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&v);
    expected == actual
        || (in_dword_range(expected) && in_dword_range(actual) && expected as u32 == actual as u32)
}

fn failure(setting: &SettingDefinition, message: &str) -> EngineError {
    EngineError::ResolutionFailure {
        setting_id: setting.id.clone(),
        message: message.to_string(),
    }
}
