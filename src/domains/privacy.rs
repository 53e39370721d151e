// src/domains/privacy.rs

use crate::{
    catalog::{DomainName, DomainProvider},
    models::{DependencyKind, RegistrySetting, SettingDefinition},
};

const DATA_COLLECTION_POLICY_KEY: &str =
    r"HKEY_LOCAL_MACHINE\SOFTWARE\Policies\Microsoft\Windows\DataCollection";
const ADVERTISING_KEY: &str =
    r"HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\AdvertisingInfo";
const ACTIVITY_POLICY_KEY: &str = r"HKEY_LOCAL_MACHINE\SOFTWARE\Policies\Microsoft\Windows\System";

pub struct PrivacySettings;

impl DomainProvider for PrivacySettings {
    fn domain_name(&self) -> &str {
        DomainName::Privacy.as_ref()
    }

    fn settings(&self) -> anyhow::Result<Vec<SettingDefinition>> {
        Ok(vec![
            SettingDefinition::toggle(
                "privacy-telemetry",
                "Limit diagnostic data",
                "Send only required diagnostic data",
            )
            .with_registry(RegistrySetting::dword(
                DATA_COLLECTION_POLICY_KEY,
                "AllowTelemetry",
                0,
                None,
            ))
            .restarts_service("DiagTrack"),
            SettingDefinition::toggle(
                "privacy-advertising-id",
                "Advertising ID",
                "Let apps show personalized ads using your advertising ID",
            )
            .with_registry(RegistrySetting::dword(ADVERTISING_KEY, "Enabled", 1, Some(0))),
            SettingDefinition::toggle(
                "privacy-activity-history",
                "Disable activity history",
                "Stop collecting activity history on this device",
            )
            .with_registry(RegistrySetting::dword(ACTIVITY_POLICY_KEY, "EnableActivityFeed", 0, None))
            .with_registry(
                RegistrySetting::dword(ACTIVITY_POLICY_KEY, "PublishUserActivities", 0, None)
                    .secondary(),
            ),
            SettingDefinition::toggle(
                "privacy-clipboard-sync",
                "Disable clipboard sync",
                "Stop syncing clipboard history across devices",
            )
            .with_registry(RegistrySetting::dword(
                ACTIVITY_POLICY_KEY,
                "AllowCrossDeviceClipboard",
                0,
                None,
            ))
            .depends_on("privacy-activity-history", DependencyKind::RequiresEnabled)
            // Per-user instances are named CDPUserSvc_<suffix>.
            .restarts_service("CDPUserSvc*"),
        ])
    }
}
