// src/utils/system_info.rs

use crate::system::OsVersionProbe;

/// First build number that identifies as Windows 11.
pub const WINDOWS_11_FIRST_BUILD: u32 = 22000;

/// OS facts captured once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowsVersion {
    pub build_number: u32,
    pub is_server: bool,
}

impl WindowsVersion {
    /// Builds from the `CurrentBuildNumber` and `InstallationType` strings of
    /// the `CurrentVersion` key.
    pub fn from_registry_strings(build: &str, installation_type: &str) -> anyhow::Result<Self> {
        let build_number = build
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid build number '{}': {}", build, e))?;
        Ok(Self {
            build_number,
            is_server: installation_type.trim().eq_ignore_ascii_case("Server"),
        })
    }
}

impl OsVersionProbe for WindowsVersion {
    fn is_windows11(&self) -> bool {
        !self.is_server && self.build_number >= WINDOWS_11_FIRST_BUILD
    }

    fn is_windows_server(&self) -> bool {
        self.is_server
    }

    fn build_number(&self) -> u32 {
        self.build_number
    }
}

#[cfg(windows)]
pub use native::{read_windows_version, WindowsHardware};

#[cfg(windows)]
mod native {
    use anyhow::Context;
    use async_trait::async_trait;
    use windows::Win32::System::Power::{GetPwrCapabilities, SYSTEM_POWER_CAPABILITIES};
    use winreg::{enums::HKEY_LOCAL_MACHINE, RegKey};

    use super::WindowsVersion;
    use crate::system::HardwareProbe;

    const CURRENT_VERSION_KEY: &str = r"SOFTWARE\Microsoft\Windows NT\CurrentVersion";

    pub fn read_windows_version() -> anyhow::Result<WindowsVersion> {
        let key = RegKey::predef(HKEY_LOCAL_MACHINE)
            .open_subkey(CURRENT_VERSION_KEY)
            .with_context(|| format!("Failed to open '{}'", CURRENT_VERSION_KEY))?;
        let build: String = key
            .get_value("CurrentBuildNumber")
            .context("Failed to read CurrentBuildNumber")?;
        let installation_type: String = key.get_value("InstallationType").unwrap_or_default();
        WindowsVersion::from_registry_strings(&build, &installation_type)
    }

    fn capabilities() -> anyhow::Result<SYSTEM_POWER_CAPABILITIES> {
        let mut caps = SYSTEM_POWER_CAPABILITIES::default();
        if unsafe { GetPwrCapabilities(&mut caps) }.0 == 0 {
            return Err(windows::core::Error::from_win32()).context("GetPwrCapabilities failed");
        }
        Ok(caps)
    }

    /// [`HardwareProbe`] over `GetPwrCapabilities`.
    #[derive(Debug, Default)]
    pub struct WindowsHardware;

    impl WindowsHardware {
        pub fn new() -> Self {
            Self
        }
    }

    #[async_trait]
    impl HardwareProbe for WindowsHardware {
        async fn has_battery(&self) -> anyhow::Result<bool> {
            Ok(capabilities()?.SystemBatteriesPresent.0 != 0)
        }

        async fn has_lid(&self) -> anyhow::Result<bool> {
            Ok(capabilities()?.LidPresent.0 != 0)
        }

        async fn supports_brightness_control(&self) -> anyhow::Result<bool> {
            Ok(capabilities()?.VideoDimPresent.0 != 0)
        }

        async fn supports_hybrid_sleep(&self) -> anyhow::Result<bool> {
            let caps = capabilities()?;
            Ok(caps.SystemS3.0 != 0 && caps.SystemS4.0 != 0 && caps.HiberFilePresent.0 != 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_classification() {
        let win11 = WindowsVersion::from_registry_strings("22631", "Client").unwrap();
        assert!(win11.is_windows11());
        assert!(!win11.is_windows_server());

        let win10 = WindowsVersion::from_registry_strings(" 19045 ", "Client").unwrap();
        assert!(!win10.is_windows11());
        assert_eq!(win10.build_number(), 19045);

        let server = WindowsVersion::from_registry_strings("26100", "Server").unwrap();
        assert!(server.is_windows_server());
        assert!(!server.is_windows11());
    }

    #[test]
    fn test_bad_build_number_is_an_error() {
        assert!(WindowsVersion::from_registry_strings("unknown", "Client").is_err());
    }
}
