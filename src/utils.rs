// src/utils.rs

pub mod powershell;
pub mod process;
pub mod registry;
pub mod services;
pub mod system_info;

#[cfg(windows)]
pub mod power;

#[cfg(windows)]
mod native {
    use std::sync::Arc;

    use super::{
        power::WindowsPower,
        process::WindowsProcesses,
        registry::WindowsRegistry,
        services::PowerShellServices,
        system_info::{read_windows_version, WindowsHardware},
    };
    use crate::{
        discovery::SystemRawValueDiscovery,
        system::{EventPublisher, ImportFlag, PowerQuery, RegistryIo, SystemServices},
    };

    impl SystemServices {
        /// The native back-ends of the running machine. Events go to `events`.
        pub fn windows(events: Arc<dyn EventPublisher>) -> anyhow::Result<Self> {
            let registry: Arc<dyn RegistryIo> = Arc::new(WindowsRegistry::new());
            let power: Arc<dyn PowerQuery> = Arc::new(WindowsPower::new());
            Ok(Self {
                os: Arc::new(read_windows_version()?),
                hardware: Arc::new(WindowsHardware::new()),
                discovery: Arc::new(SystemRawValueDiscovery::new(registry.clone(), power.clone())),
                power,
                registry,
                processes: Arc::new(WindowsProcesses::new()),
                services: Arc::new(PowerShellServices::new()),
                events,
                import_state: Arc::new(ImportFlag::new()),
            })
        }
    }
}
