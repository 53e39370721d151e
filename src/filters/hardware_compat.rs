// src/filters/hardware_compat.rs

use std::{future::Future, sync::Arc};

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::annotate;
use crate::{
    cancellation::{ensure_not_cancelled, run_cancellable},
    errors::EngineResult,
    models::SettingDefinition,
    system::HardwareProbe,
};

/// What the machine has, as far as the filter cares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardwareCapabilities {
    pub has_battery: bool,
    pub has_lid: bool,
    pub supports_brightness: bool,
    pub supports_hybrid_sleep: bool,
}

impl HardwareCapabilities {
    /// Battery plus lid is treated as a laptop.
    pub fn is_laptop(&self) -> bool {
        self.has_battery && self.has_lid
    }
}

/// Drops settings that need hardware the machine does not have.
///
/// Probing happens at most once per filter instance; the answers are memoized.
pub struct HardwareCompatibilityFilter {
    probe: Arc<dyn HardwareProbe>,
    capabilities: OnceCell<HardwareCapabilities>,
}

impl HardwareCompatibilityFilter {
    pub fn new(probe: Arc<dyn HardwareProbe>) -> Self {
        Self {
            probe,
            capabilities: OnceCell::new(),
        }
    }

    pub async fn filter(
        &self,
        settings: Vec<SettingDefinition>,
        token: &CancellationToken,
    ) -> EngineResult<Vec<SettingDefinition>> {
        self.filter_with_mode(settings, true, token).await
    }

    /// Like [`filter`](Self::filter), but with `apply_filter == false` every
    /// incompatible setting is kept and annotated.
    pub async fn filter_with_mode(
        &self,
        settings: Vec<SettingDefinition>,
        apply_filter: bool,
        token: &CancellationToken,
    ) -> EngineResult<Vec<SettingDefinition>> {
        ensure_not_cancelled(token)?;

        if !settings.iter().any(|s| s.hardware.any()) {
            return Ok(settings);
        }

        let capabilities = self.capabilities(token).await?;
        let total = settings.len();
        let mut result = Vec::with_capacity(total);

        for mut setting in settings {
            match missing_hardware(&setting, &capabilities) {
                None => result.push(setting),
                Some(reason) if apply_filter => {
                    debug!("{:?} -> Excluded: {}", setting.id, reason);
                }
                Some(reason) => {
                    annotate(&mut setting, reason);
                    result.push(setting);
                }
            }
        }

        if apply_filter {
            debug!(
                "Hardware compatibility filter kept {} of {} settings",
                result.len(),
                total
            );
        }
        Ok(result)
    }

    /// Memoized hardware capabilities. Concurrent first callers share one probe pass.
    pub async fn capabilities(&self, token: &CancellationToken) -> EngineResult<HardwareCapabilities> {
        self.capabilities
            .get_or_try_init(|| self.detect(token))
            .await
            .copied()
    }

    async fn detect(&self, token: &CancellationToken) -> EngineResult<HardwareCapabilities> {
        let capabilities = HardwareCapabilities {
            has_battery: probe_flag("battery", self.probe.has_battery(), token).await?,
            has_lid: probe_flag("lid", self.probe.has_lid(), token).await?,
            supports_brightness: probe_flag(
                "brightness",
                self.probe.supports_brightness_control(),
                token,
            )
            .await?,
            supports_hybrid_sleep: probe_flag(
                "hybrid sleep",
                self.probe.supports_hybrid_sleep(),
                token,
            )
            .await?,
        };
        debug!("Detected hardware capabilities: {:?}", capabilities);
        Ok(capabilities)
    }
}

/// A probe that fails reports the feature as absent.
async fn probe_flag<F>(name: &str, probe: F, token: &CancellationToken) -> EngineResult<bool>
where
    F: Future<Output = anyhow::Result<bool>>,
{
    match run_cancellable(token, probe).await? {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!("Hardware probe '{}' failed, assuming absent: {:#}", name, e);
            Ok(false)
        }
    }
}

fn missing_hardware(
    setting: &SettingDefinition,
    capabilities: &HardwareCapabilities,
) -> Option<&'static str> {
    let required = &setting.hardware;
    if required.battery && !capabilities.has_battery {
        return Some("Requires a battery");
    }
    if required.lid && !capabilities.has_lid {
        return Some("Requires a laptop lid");
    }
    if required.desktop && capabilities.is_laptop() {
        return Some("Only available on desktop computers");
    }
    if required.brightness_support && !capabilities.supports_brightness {
        return Some("Requires display brightness control");
    }
    if required.hybrid_sleep_capable && !capabilities.supports_hybrid_sleep {
        return Some("Requires hybrid sleep support");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::HardwareRequirements,
        system::MockHardwareProbe,
        test_support::{FakeHardware, LogCapture},
    };

    fn catalog() -> Vec<SettingDefinition> {
        vec![
            SettingDefinition::toggle("plain", "Plain", ""),
            SettingDefinition::toggle("battery", "Battery", "").with_hardware(HardwareRequirements {
                battery: true,
                ..Default::default()
            }),
            SettingDefinition::toggle("lid", "Lid", "").with_hardware(HardwareRequirements {
                lid: true,
                ..Default::default()
            }),
            SettingDefinition::toggle("desktop", "Desktop", "").with_hardware(HardwareRequirements {
                desktop: true,
                ..Default::default()
            }),
            SettingDefinition::toggle("brightness", "Brightness", "").with_hardware(
                HardwareRequirements {
                    brightness_support: true,
                    ..Default::default()
                },
            ),
            SettingDefinition::toggle("hybrid", "Hybrid", "").with_hardware(HardwareRequirements {
                hybrid_sleep_capable: true,
                ..Default::default()
            }),
        ]
    }

    fn ids(settings: &[SettingDefinition]) -> Vec<&str> {
        settings.iter().map(|s| s.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_desktop_without_battery_drops_battery_settings() {
        let filter = HardwareCompatibilityFilter::new(Arc::new(FakeHardware::desktop()));
        let input = catalog();
        let input_len = input.len();
        let result = filter.filter(input, &CancellationToken::new()).await.unwrap();
        assert_eq!(ids(&result), vec!["plain", "desktop", "hybrid"]);
        assert_eq!(result.len(), input_len - 3);
    }

    #[tokio::test]
    async fn test_laptop_drops_desktop_only() {
        let filter = HardwareCompatibilityFilter::new(Arc::new(FakeHardware::laptop()));
        let result = filter.filter(catalog(), &CancellationToken::new()).await.unwrap();
        assert_eq!(ids(&result), vec!["plain", "battery", "lid", "brightness"]);
    }

    #[tokio::test]
    async fn test_probes_are_memoized_across_calls() {
        let hardware = Arc::new(FakeHardware::laptop());
        let filter = HardwareCompatibilityFilter::new(hardware.clone());
        let token = CancellationToken::new();
        filter.filter(catalog(), &token).await.unwrap();
        filter.filter(catalog(), &token).await.unwrap();
        filter.filter_with_mode(catalog(), false, &token).await.unwrap();
        assert_eq!(hardware.calls(), 4);
    }

    #[tokio::test]
    async fn test_no_requirements_means_no_probing() {
        let hardware = Arc::new(FakeHardware::desktop());
        let filter = HardwareCompatibilityFilter::new(hardware.clone());
        let plain = vec![SettingDefinition::toggle("plain", "Plain", "")];
        let result = filter.filter(plain, &CancellationToken::new()).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(hardware.calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_probe_counts_as_absent() {
        let (logs, _guard) = LogCapture::install();
        let mut probe = MockHardwareProbe::new();
        probe
            .expect_has_battery()
            .times(1)
            .returning(|| Err(anyhow::anyhow!("WMI unavailable")));
        probe.expect_has_lid().times(1).returning(|| Ok(true));
        probe
            .expect_supports_brightness_control()
            .times(1)
            .returning(|| Ok(true));
        probe.expect_supports_hybrid_sleep().times(1).returning(|| Ok(true));

        let filter = HardwareCompatibilityFilter::new(Arc::new(probe));
        let result = filter.filter(catalog(), &CancellationToken::new()).await.unwrap();
        assert!(!ids(&result).contains(&"battery"));
        assert!(ids(&result).contains(&"desktop"));
        assert_eq!(logs.lines_at("WARN", &["battery", "WMI unavailable"]), 1);
    }

    #[tokio::test]
    async fn test_bypass_mode_annotates() {
        let filter = HardwareCompatibilityFilter::new(Arc::new(FakeHardware::desktop()));
        let result = filter
            .filter_with_mode(catalog(), false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.len(), catalog().len());
        let battery = result.iter().find(|s| s.id == "battery").unwrap();
        assert_eq!(
            battery.version_compatibility_message.as_deref(),
            Some("Requires a battery")
        );
        let plain = result.iter().find(|s| s.id == "plain").unwrap();
        assert!(plain.version_compatibility_message.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_token_is_propagated() {
        let hardware = Arc::new(FakeHardware::laptop());
        let filter = HardwareCompatibilityFilter::new(hardware.clone());
        let token = CancellationToken::new();
        token.cancel();
        let err = filter.filter(catalog(), &token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(hardware.calls(), 0);
    }
}
