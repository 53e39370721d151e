// src/domains/gaming.rs

use crate::{
    catalog::{DomainName, DomainProvider},
    models::{mapping, DependencyKind, RawValue, RegistrySetting, SettingDefinition},
};

const GRAPHICS_DRIVERS_KEY: &str =
    r"HKEY_LOCAL_MACHINE\SYSTEM\CurrentControlSet\Control\GraphicsDrivers";
const GAME_BAR_KEY: &str = r"HKEY_CURRENT_USER\Software\Microsoft\GameBar";
const GAME_DVR_KEY: &str = r"HKEY_CURRENT_USER\System\GameConfigStore";
const MULTIMEDIA_PROFILE_KEY: &str =
    r"HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Windows NT\CurrentVersion\Multimedia\SystemProfile";
const PRIORITY_CONTROL_KEY: &str =
    r"HKEY_LOCAL_MACHINE\SYSTEM\CurrentControlSet\Control\PriorityControl";

pub struct GamingPerformanceSettings;

impl DomainProvider for GamingPerformanceSettings {
    fn domain_name(&self) -> &str {
        DomainName::GamingPerformance.as_ref()
    }

    fn settings(&self) -> anyhow::Result<Vec<SettingDefinition>> {
        Ok(vec![
            SettingDefinition::toggle(
                "gaming-hardware-scheduling",
                "Hardware-accelerated GPU scheduling",
                "Let the GPU manage its own memory scheduling",
            )
            .min_build(19041)
            .with_registry(RegistrySetting::dword(GRAPHICS_DRIVERS_KEY, "HwSchMode", 2, Some(1))),
            SettingDefinition::toggle(
                "gaming-game-mode",
                "Game Mode",
                "Prioritize the foreground game",
            )
            .with_registry(RegistrySetting::dword(GAME_BAR_KEY, "AutoGameModeEnabled", 1, Some(0))),
            SettingDefinition::toggle(
                "gaming-game-dvr",
                "Disable background recording",
                "Turn off Game DVR background capture",
            )
            .with_registry(RegistrySetting::dword(GAME_DVR_KEY, "GameDVR_Enabled", 0, Some(1))),
            SettingDefinition::toggle(
                "gaming-fullscreen-optimizations",
                "Disable fullscreen optimizations",
                "Use exclusive fullscreen where games allow it",
            )
            .with_registry(RegistrySetting::dword(GAME_DVR_KEY, "GameDVR_FSEBehaviorMode", 2, Some(0)))
            .with_registry(
                RegistrySetting::dword(GAME_DVR_KEY, "GameDVR_HonorUserFSEBehaviorMode", 1, Some(0))
                    .secondary(),
            )
            .depends_on("gaming-game-dvr", DependencyKind::RequiresEnabled),
            SettingDefinition::selection(
                "gaming-system-responsiveness",
                "Background CPU reservation",
                "Share of CPU time kept for background tasks while multimedia runs",
            )
            .with_registry(RegistrySetting::dword(
                MULTIMEDIA_PROFILE_KEY,
                "SystemResponsiveness",
                20,
                None,
            ))
            .with_options(vec![
                ("Default (20%)", mapping([("SystemResponsiveness", RawValue::Int(20))])),
                ("Reduced (10%)", mapping([("SystemResponsiveness", RawValue::Int(10))])),
                ("Minimal (0%)", mapping([("SystemResponsiveness", RawValue::Int(0))])),
            ])
            .depends_on("gaming-game-mode", DependencyKind::RequiresValue(1)),
            SettingDefinition::selection(
                "gaming-priority-separation",
                "Foreground priority boost",
                "How much quantum foreground processes get",
            )
            .with_registry(RegistrySetting::dword(
                PRIORITY_CONTROL_KEY,
                "Win32PrioritySeparation",
                2,
                None,
            ))
            .with_options(vec![
                ("Default", mapping([("Win32PrioritySeparation", RawValue::Int(2))])),
                ("Programs", mapping([("Win32PrioritySeparation", RawValue::Int(38))])),
                ("Background services", mapping([("Win32PrioritySeparation", RawValue::Int(24))])),
            ]),
        ])
    }
}
