// src/utils/power.rs

use std::ptr;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};
use widestring::U16String;
use windows::{
    core::GUID,
    Win32::{
        Foundation::{
            LocalFree, ERROR_ACCESS_DENIED, ERROR_MORE_DATA, ERROR_NO_MORE_ITEMS, ERROR_SUCCESS, HLOCAL, WIN32_ERROR,
        },
        System::Power::{
            PowerEnumerate, PowerGetActiveScheme, PowerReadACValueIndex, PowerReadDCValueIndex, PowerReadFriendlyName,
            PowerSetActiveScheme, PowerSettingAccessCheck, PowerWriteACValueIndex, PowerWriteDCValueIndex,
            ACCESS_AC_POWER_SETTING_INDEX, ACCESS_INDIVIDUAL_SETTING, ACCESS_SCHEME, ACCESS_SUBGROUP,
            POWER_DATA_ACCESSOR,
        },
    },
};

use crate::{
    constants::ACTIVE_SCHEME_ALIAS,
    models::{AcDcValue, PowerCfgSetting, PowerPlan, PowerSnapshot},
    system::PowerQuery,
};

fn check(result: WIN32_ERROR, what: &str) -> anyhow::Result<()> {
    if result == ERROR_SUCCESS {
        Ok(())
    } else {
        Err(anyhow!("{} failed: {:?}", what, windows::core::Error::from(result.to_hresult())))
    }
}

/// Lowercase, hyphenated, no braces.
pub fn guid_to_string(guid: &GUID) -> String {
    format!("{:?}", guid).to_ascii_lowercase()
}

pub fn parse_guid(text: &str) -> anyhow::Result<GUID> {
    let trimmed = text.trim().trim_start_matches('{').trim_end_matches('}');
    GUID::try_from(trimmed).map_err(|e| anyhow!("Invalid GUID '{}': {:?}", text, e))
}

/// Frees a buffer the power APIs allocated for us.
struct LocalGuid(*mut GUID);

impl Drop for LocalGuid {
    fn drop(&mut self) {
        if !self.0.is_null() {
            let leaked = unsafe { LocalFree(HLOCAL(self.0 as *mut _)) };
            if !leaked.is_invalid() {
                warn!("Failed to free power scheme GUID buffer");
            }
        }
    }
}

fn read_active_scheme_guid() -> anyhow::Result<GUID> {
    let mut guid_pointer: *mut GUID = ptr::null_mut();
    check(
        unsafe { PowerGetActiveScheme(None, &mut guid_pointer) },
        "PowerGetActiveScheme",
    )?;
    if guid_pointer.is_null() {
        anyhow::bail!("PowerGetActiveScheme returned no scheme");
    }
    let active = LocalGuid(guid_pointer);
    Ok(unsafe { *active.0 })
}

/// `index`-th GUID under the given scheme/subgroup, or `None` past the end.
fn power_enumerate(
    access: POWER_DATA_ACCESSOR,
    scheme: Option<&GUID>,
    subgroup: Option<&GUID>,
    index: u32,
) -> anyhow::Result<Option<GUID>> {
    let mut guid = GUID::zeroed();
    let mut size = std::mem::size_of::<GUID>() as u32;
    let result = unsafe {
        PowerEnumerate(
            None,
            scheme.map(|g| g as *const GUID),
            subgroup.map(|g| g as *const GUID),
            access,
            index,
            Some(&mut guid as *mut GUID as *mut u8),
            &mut size,
        )
    };
    if result == ERROR_NO_MORE_ITEMS {
        return Ok(None);
    }
    check(result, "PowerEnumerate")?;
    Ok(Some(guid))
}

fn enumerate_all(
    access: POWER_DATA_ACCESSOR,
    scheme: Option<&GUID>,
    subgroup: Option<&GUID>,
) -> anyhow::Result<Vec<GUID>> {
    let mut guids = Vec::new();
    while let Some(guid) = power_enumerate(access, scheme, subgroup, guids.len() as u32)? {
        guids.push(guid);
    }
    Ok(guids)
}

fn read_scheme_name(scheme: &GUID) -> anyhow::Result<String> {
    let mut size: u32 = 0;
    let first = unsafe { PowerReadFriendlyName(None, Some(scheme), None, None, None, &mut size) };
    if first != ERROR_SUCCESS && first != ERROR_MORE_DATA {
        check(first, "PowerReadFriendlyName")?;
    }

    let mut buffer: Vec<u16> = vec![0; (size.max(2) / 2) as usize];
    check(
        unsafe {
            PowerReadFriendlyName(
                None,
                Some(scheme),
                None,
                None,
                Some(buffer.as_mut_ptr() as *mut u8),
                &mut size,
            )
        },
        "PowerReadFriendlyName",
    )?;
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    buffer.truncate(len);
    Ok(U16String::from_vec(buffer).to_string_lossy())
}

fn read_value(scheme: &GUID, subgroup: &GUID, setting: &GUID, ac: bool) -> anyhow::Result<u32> {
    let mut value = 0u32;
    let result = unsafe {
        if ac {
            PowerReadACValueIndex(None, Some(scheme), Some(subgroup), Some(setting), &mut value)
        } else {
            PowerReadDCValueIndex(None, Some(scheme), Some(subgroup), Some(setting), &mut value)
        }
    };
    check(result, "PowerRead*ValueIndex")?;
    Ok(value)
}

/// [`PowerQuery`] over the `Power*` APIs.
///
/// The plan list is cached until [`PowerQuery::invalidate_cache`].
#[derive(Debug, Default)]
pub struct WindowsPower {
    plans: Mutex<Option<Vec<PowerPlan>>>,
}

impl WindowsPower {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_scheme(scheme_id: &str) -> anyhow::Result<GUID> {
        if scheme_id.eq_ignore_ascii_case(ACTIVE_SCHEME_ALIAS) {
            read_active_scheme_guid()
        } else {
            parse_guid(scheme_id)
        }
    }

    fn load_plans() -> anyhow::Result<Vec<PowerPlan>> {
        let active = read_active_scheme_guid()?;
        enumerate_all(ACCESS_SCHEME, None, None)?
            .into_iter()
            .map(|guid| {
                let name = read_scheme_name(&guid).unwrap_or_default();
                Ok(PowerPlan {
                    name,
                    guid: guid_to_string(&guid),
                    is_active: guid == active,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PowerQuery for WindowsPower {
    async fn get_available_power_plans(&self) -> anyhow::Result<Vec<PowerPlan>> {
        if let Some(plans) = self.plans.lock().as_ref() {
            return Ok(plans.clone());
        }
        let plans = Self::load_plans()?;
        debug!("Found {} power plans", plans.len());
        *self.plans.lock() = Some(plans.clone());
        Ok(plans)
    }

    async fn get_active_power_plan(&self) -> anyhow::Result<Option<PowerPlan>> {
        let guid = read_active_scheme_guid()?;
        Ok(Some(PowerPlan {
            name: read_scheme_name(&guid).unwrap_or_default(),
            guid: guid_to_string(&guid),
            is_active: true,
        }))
    }

    async fn get_all_power_settings_ac_dc(&self, scheme_id: &str) -> anyhow::Result<PowerSnapshot> {
        let scheme = Self::resolve_scheme(scheme_id)?;
        let mut snapshot = PowerSnapshot::new();
        for subgroup in enumerate_all(ACCESS_SUBGROUP, Some(&scheme), None)? {
            for setting in enumerate_all(ACCESS_INDIVIDUAL_SETTING, Some(&scheme), Some(&subgroup))? {
                let (Ok(ac), Ok(dc)) = (
                    read_value(&scheme, &subgroup, &setting, true),
                    read_value(&scheme, &subgroup, &setting, false),
                ) else {
                    continue;
                };
                snapshot.insert(guid_to_string(&setting), AcDcValue { ac, dc });
            }
        }
        debug!("Read {} power settings for scheme {}", snapshot.len(), scheme_id);
        Ok(snapshot)
    }

    async fn is_setting_hardware_controlled(&self, setting: &PowerCfgSetting) -> anyhow::Result<bool> {
        let guid = parse_guid(&setting.setting_guid)?;
        let result = unsafe { PowerSettingAccessCheck(ACCESS_AC_POWER_SETTING_INDEX, Some(&guid)) };
        if result == ERROR_ACCESS_DENIED {
            return Ok(true);
        }
        check(result, "PowerSettingAccessCheck")?;
        Ok(false)
    }

    async fn set_active_power_plan(&self, guid: &str) -> anyhow::Result<()> {
        let scheme = parse_guid(guid)?;
        check(unsafe { PowerSetActiveScheme(None, Some(&scheme)) }, "PowerSetActiveScheme")
            .with_context(|| format!("Failed to activate power plan {}", guid))
    }

    async fn set_power_setting_value(&self, setting: &PowerCfgSetting, ac: u32, dc: u32) -> anyhow::Result<()> {
        let scheme = read_active_scheme_guid()?;
        let subgroup = parse_guid(&setting.subgroup_guid)?;
        let guid = parse_guid(&setting.setting_guid)?;
        check(
            unsafe { PowerWriteACValueIndex(None, &scheme, Some(&subgroup), Some(&guid), ac) },
            "PowerWriteACValueIndex",
        )?;
        check(
            unsafe { PowerWriteDCValueIndex(None, &scheme, Some(&subgroup), Some(&guid), dc) },
            "PowerWriteDCValueIndex",
        )?;
        // Re-activating the scheme makes the new indexes take effect.
        check(unsafe { PowerSetActiveScheme(None, Some(&scheme)) }, "PowerSetActiveScheme")?;
        debug!("Wrote power setting {} (AC {}, DC {})", setting.setting_guid, ac, dc);
        Ok(())
    }

    fn invalidate_cache(&self) {
        *self.plans.lock() = None;
    }
}
