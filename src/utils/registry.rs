// src/utils/registry.rs

use crate::{
    constants::{MIN_DELETABLE_KEY_DEPTH, PROTECTED_REGISTRY_ROOTS},
    errors::RegistryGuardError,
    models::{RawValue, RegistryValueType},
};

/// Root keys a registry path may start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hive {
    LocalMachine,
    CurrentUser,
    ClassesRoot,
    Users,
    CurrentConfig,
}

/// Splits `HKEY_*\Sub\Key` into its hive and the hive-relative subkey.
///
/// Both long and short hive names (`HKLM`, `HKCU`, ...) are accepted.
pub fn parse_registry_path(path: &str) -> Result<(Hive, &str), RegistryGuardError> {
    let (hive, subkey) = path
        .split_once('\\')
        .ok_or_else(|| RegistryGuardError::InvalidPath(path.to_string()))?;
    let subkey = subkey.trim_matches('\\');
    if subkey.is_empty() {
        return Err(RegistryGuardError::InvalidPath(path.to_string()));
    }

    let hive = match hive.to_ascii_uppercase().as_str() {
        "HKEY_LOCAL_MACHINE" | "HKLM" => Hive::LocalMachine,
        "HKEY_CURRENT_USER" | "HKCU" => Hive::CurrentUser,
        "HKEY_CLASSES_ROOT" | "HKCR" => Hive::ClassesRoot,
        "HKEY_USERS" | "HKU" => Hive::Users,
        "HKEY_CURRENT_CONFIG" | "HKCC" => Hive::CurrentConfig,
        _ => return Err(RegistryGuardError::UnsupportedHive(hive.to_string())),
    };
    Ok((hive, subkey))
}

/// Refuses key deletions that are too shallow or would take a protected
/// subtree with them. Comparison ignores case and the hive.
pub fn validate_deletable_path(path: &str) -> Result<(), RegistryGuardError> {
    let (_, subkey) = parse_registry_path(path)?;
    let segments: Vec<&str> = subkey.split('\\').filter(|s| !s.is_empty()).collect();
    let normalized = segments.join("\\").to_ascii_lowercase();
    for root in PROTECTED_REGISTRY_ROOTS {
        let root_lower = root.to_ascii_lowercase();
        let is_root_or_ancestor =
            root_lower == normalized || root_lower.starts_with(&format!("{}\\", normalized));
        if is_root_or_ancestor {
            return Err(RegistryGuardError::ProtectedKey {
                path: path.to_string(),
                root: root.to_string(),
            });
        }
    }

    if segments.len() < MIN_DELETABLE_KEY_DEPTH {
        return Err(RegistryGuardError::TooShallow {
            path: path.to_string(),
            min_depth: MIN_DELETABLE_KEY_DEPTH,
        });
    }
    Ok(())
}

/// Serializes `value` into the byte layout of `value_type`.
///
/// `None` means the value cannot be stored as that type.
pub fn encode_value(value: &RawValue, value_type: RegistryValueType) -> Option<Vec<u8>> {
    match value_type {
        RegistryValueType::Dword => {
            let number = value.as_i64()?;
            // Negative values are stored as their 32-bit two's complement.
            let dword = u32::try_from(number)
                .ok()
                .or_else(|| i32::try_from(number).ok().map(|n| n as u32))?;
            Some(dword.to_le_bytes().to_vec())
        }
        RegistryValueType::Qword => Some((value.as_i64()? as u64).to_le_bytes().to_vec()),
        RegistryValueType::String | RegistryValueType::ExpandString => {
            let text = match value {
                RawValue::Int(n) => n.to_string(),
                RawValue::Text(s) => s.clone(),
                RawValue::Null => return None,
            };
            Some(
                text.encode_utf16()
                    .chain(std::iter::once(0))
                    .flat_map(u16::to_le_bytes)
                    .collect(),
            )
        }
        RegistryValueType::Binary => match value {
            RawValue::Text(hex) => decode_hex(hex),
            _ => None,
        },
    }
}

/// Reads raw registry bytes back into a [`RawValue`].
pub fn decode_value(value_type: RegistryValueType, bytes: &[u8]) -> anyhow::Result<RawValue> {
    match value_type {
        RegistryValueType::Dword => {
            let raw: [u8; 4] = bytes
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| anyhow::anyhow!("REG_DWORD data too small ({} bytes)", bytes.len()))?;
            Ok(RawValue::from(u32::from_le_bytes(raw)))
        }
        RegistryValueType::Qword => {
            let raw: [u8; 8] = bytes
                .get(..8)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| anyhow::anyhow!("REG_QWORD data too small ({} bytes)", bytes.len()))?;
            Ok(RawValue::Int(u64::from_le_bytes(raw) as i64))
        }
        RegistryValueType::String | RegistryValueType::ExpandString => {
            let wide: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
                .take_while(|&c| c != 0)
                .collect();
            Ok(RawValue::Text(String::from_utf16_lossy(&wide)))
        }
        RegistryValueType::Binary => Ok(RawValue::Text(
            bytes.iter().map(|b| format!("{:02x}", b)).collect(),
        )),
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace() && *c != ',').collect();
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(windows)]
pub use native::WindowsRegistry;

#[cfg(windows)]
mod native {
    use std::io::ErrorKind;

    use anyhow::Context;
    use async_trait::async_trait;
    use tracing::{debug, warn};
    use winreg::{
        enums::{
            RegType, HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS,
            KEY_READ, KEY_WRITE,
        },
        RegKey, RegValue,
    };

    use super::{decode_value, encode_value, parse_registry_path, validate_deletable_path, Hive};
    use crate::{
        models::{RawValue, RegistrySetting, RegistryValueType},
        system::RegistryIo,
    };

    /// [`RegistryIo`] over the live registry.
    #[derive(Debug, Default)]
    pub struct WindowsRegistry;

    impl WindowsRegistry {
        pub fn new() -> Self {
            Self
        }
    }

    fn open_hive(path: &str) -> anyhow::Result<(RegKey, &str)> {
        let (hive, subkey) = parse_registry_path(path)?;
        let predef = match hive {
            Hive::LocalMachine => HKEY_LOCAL_MACHINE,
            Hive::CurrentUser => HKEY_CURRENT_USER,
            Hive::ClassesRoot => HKEY_CLASSES_ROOT,
            Hive::Users => HKEY_USERS,
            Hive::CurrentConfig => HKEY_CURRENT_CONFIG,
        };
        Ok((RegKey::predef(predef), subkey))
    }

    fn reg_type(value_type: RegistryValueType) -> RegType {
        match value_type {
            RegistryValueType::Dword => RegType::REG_DWORD,
            RegistryValueType::Qword => RegType::REG_QWORD,
            RegistryValueType::String => RegType::REG_SZ,
            RegistryValueType::ExpandString => RegType::REG_EXPAND_SZ,
            RegistryValueType::Binary => RegType::REG_BINARY,
        }
    }

    fn known_type(vtype: &RegType) -> Option<RegistryValueType> {
        match vtype {
            RegType::REG_DWORD => Some(RegistryValueType::Dword),
            RegType::REG_QWORD => Some(RegistryValueType::Qword),
            RegType::REG_SZ => Some(RegistryValueType::String),
            RegType::REG_EXPAND_SZ => Some(RegistryValueType::ExpandString),
            RegType::REG_BINARY => Some(RegistryValueType::Binary),
            _ => None,
        }
    }

    #[async_trait]
    impl RegistryIo for WindowsRegistry {
        async fn apply_setting(
            &self,
            setting: &RegistrySetting,
            enable: bool,
            value: Option<&RawValue>,
        ) -> anyhow::Result<bool> {
            match value.or_else(|| setting.value_for(enable)) {
                None | Some(RawValue::Null) => {
                    self.delete_value(&setting.key_path, &setting.value_name).await?;
                    Ok(true)
                }
                Some(target) => {
                    if encode_value(target, setting.value_type).is_none() {
                        warn!(
                            "Value {:?} cannot be stored as {:?} in '{}'",
                            target, setting.value_type, setting.value_name
                        );
                        return Ok(false);
                    }
                    self.set_value(&setting.key_path, &setting.value_name, target, setting.value_type)
                        .await?;
                    Ok(true)
                }
            }
        }

        async fn get_value(&self, key_path: &str, value_name: &str) -> anyhow::Result<Option<RawValue>> {
            let (hive, subkey) = open_hive(key_path)?;
            let key = match hive.open_subkey_with_flags(subkey, KEY_READ) {
                Ok(key) => key,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e).with_context(|| format!("Failed to open subkey '{}'", key_path)),
            };
            let raw = match key.get_raw_value(value_name) {
                Ok(raw) => raw,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read value '{}' in '{}'", value_name, key_path))
                }
            };
            let kind = known_type(&raw.vtype)
                .ok_or_else(|| anyhow::anyhow!("Unsupported registry value type: {:?}", raw.vtype))?;
            decode_value(kind, &raw.bytes).map(Some)
        }

        async fn set_value(
            &self,
            key_path: &str,
            value_name: &str,
            value: &RawValue,
            value_type: RegistryValueType,
        ) -> anyhow::Result<()> {
            let bytes = encode_value(value, value_type).ok_or_else(|| {
                anyhow::anyhow!("Value {:?} cannot be stored as {:?}", value, value_type)
            })?;
            let (hive, subkey) = open_hive(key_path)?;
            let (key, _) = hive
                .create_subkey(subkey)
                .with_context(|| format!("Failed to create or open subkey '{}'", key_path))?;
            key.set_raw_value(
                value_name,
                &RegValue {
                    bytes,
                    vtype: reg_type(value_type),
                },
            )
            .with_context(|| format!("Failed to set value '{}' in '{}'", value_name, key_path))?;
            debug!("Set '{}' in '{}' to {:?}", value_name, key_path, value);
            Ok(())
        }

        async fn delete_value(&self, key_path: &str, value_name: &str) -> anyhow::Result<()> {
            let (hive, subkey) = open_hive(key_path)?;
            let key = match hive.open_subkey_with_flags(subkey, KEY_WRITE) {
                Ok(key) => key,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(e).with_context(|| format!("Failed to open subkey '{}'", key_path)),
            };
            match key.delete_value(value_name) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e).with_context(|| format!("Failed to delete value '{}' in '{}'", value_name, key_path)),
            }
        }

        async fn key_exists(&self, key_path: &str) -> anyhow::Result<bool> {
            let (hive, subkey) = open_hive(key_path)?;
            match hive.open_subkey_with_flags(subkey, KEY_READ) {
                Ok(_) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e).with_context(|| format!("Failed to open subkey '{}'", key_path)),
            }
        }

        async fn delete_key(&self, key_path: &str) -> anyhow::Result<()> {
            validate_deletable_path(key_path)?;
            let (hive, subkey) = open_hive(key_path)?;
            match hive.delete_subkey_all(subkey) {
                Ok(()) => {
                    debug!("Deleted key '{}'", key_path);
                    Ok(())
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e).with_context(|| format!("Failed to delete key '{}'", key_path)),
            }
        }
    }
}
