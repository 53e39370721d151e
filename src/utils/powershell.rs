// src/utils/powershell.rs

use anyhow::Context;
use tracing::{debug, error};

/// Quotes `value` as a single-quoted PowerShell literal.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Runs `script` in a hidden, profile-less PowerShell and returns its trimmed
/// stdout. Any stderr output or a non-zero exit code is an error.
pub async fn execute_powershell_script(script: &str) -> anyhow::Result<String> {
    let mut command = tokio::process::Command::new("powershell");
    command.args([
        "-NoProfile",
        "-NonInteractive",
        "-ExecutionPolicy",
        "Bypass",
        "-WindowStyle",
        "Hidden",
        "-Command",
        script,
    ]);
    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    debug!("Running PowerShell: {}", script);
    let output = command
        .kill_on_drop(true)
        .output()
        .await
        .context("Failed to execute PowerShell script")?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        error!("PowerShell script error output: {}", stderr);
        anyhow::bail!("PowerShell script error: {}", stderr);
    }
    if !output.status.success() {
        anyhow::bail!("PowerShell exited with {}", output.status);
    }
    Ok(stdout)
}
