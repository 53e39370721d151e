// src/utils/services.rs

use async_trait::async_trait;
use tracing::info;

use super::powershell::{execute_powershell_script, quote};
use crate::system::ServiceControl;

/// PowerShell that restarts `name`. A trailing `*` restarts every service whose
/// name starts with the prefix, which covers per-user services such as
/// `CDPUserSvc_1a2b3c`.
pub fn restart_service_script(name: &str) -> String {
    format!(
        "$ErrorActionPreference = 'Stop'; \
         $services = @(Get-Service -Name {} -ErrorAction SilentlyContinue); \
         if ($services.Count -eq 0) {{ throw 'No service matches {}' }}; \
         $services | Restart-Service -Force; \
         $services.Count",
        quote(name),
        name.replace('\'', "''"),
    )
}

/// [`ServiceControl`] through `Restart-Service`.
#[derive(Debug, Default)]
pub struct PowerShellServices;

impl PowerShellServices {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ServiceControl for PowerShellServices {
    async fn restart_service(&self, name: &str) -> anyhow::Result<()> {
        let restarted = execute_powershell_script(&restart_service_script(name)).await?;
        info!("Restarted {} service(s) matching '{}'", restarted, name);
        Ok(())
    }
}
