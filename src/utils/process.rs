// src/utils/process.rs

/// Whether the executable `exe_name` (as listed by the OS) is the process
/// called `name`. The `.exe` suffix is optional on either side.
pub fn matches_process_name(exe_name: &str, name: &str) -> bool {
    fn stem(s: &str) -> &str {
        let len = s.len();
        if len > 4 && s[len - 4..].eq_ignore_ascii_case(".exe") {
            &s[..len - 4]
        } else {
            s
        }
    }
    stem(exe_name).eq_ignore_ascii_case(stem(name))
}

#[cfg(windows)]
pub use native::WindowsProcesses;

#[cfg(windows)]
mod native {
    use anyhow::Context;
    use async_trait::async_trait;
    use tracing::{error, info};
    use windows::Win32::{
        Foundation::{CloseHandle, HANDLE},
        System::{
            Diagnostics::ToolHelp::{
                CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W, TH32CS_SNAPPROCESS,
            },
            Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE},
        },
    };

    use super::matches_process_name;
    use crate::system::ProcessControl;

    /// Closes the wrapped handle on drop.
    struct HandleGuard(HANDLE);

    impl Drop for HandleGuard {
        fn drop(&mut self) {
            if let Err(e) = unsafe { CloseHandle(self.0) } {
                error!("Failed to close handle: {:?}", e);
            }
        }
    }

    /// Ids of every running process whose executable is `name`.
    fn find_processes(name: &str) -> anyhow::Result<Vec<u32>> {
        let snapshot = HandleGuard(
            unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }.context("Failed to snapshot processes")?,
        );
        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        let mut ids = Vec::new();
        if unsafe { Process32FirstW(snapshot.0, &mut entry) }.is_err() {
            return Ok(ids);
        }
        loop {
            let exe: Vec<u16> = entry.szExeFile.iter().take_while(|&&c| c != 0).copied().collect();
            if matches_process_name(&String::from_utf16_lossy(&exe), name) {
                ids.push(entry.th32ProcessID);
            }
            if unsafe { Process32NextW(snapshot.0, &mut entry) }.is_err() {
                break;
            }
        }
        Ok(ids)
    }

    /// [`ProcessControl`] over ToolHelp snapshots and `TerminateProcess`.
    #[derive(Debug, Default)]
    pub struct WindowsProcesses;

    impl WindowsProcesses {
        pub fn new() -> Self {
            Self
        }
    }

    #[async_trait]
    impl ProcessControl for WindowsProcesses {
        async fn kill_process(&self, name: &str) -> anyhow::Result<()> {
            let ids = find_processes(name)?;
            if ids.is_empty() {
                anyhow::bail!("No running process named '{}'", name);
            }
            for pid in ids {
                let process = HandleGuard(
                    unsafe { OpenProcess(PROCESS_TERMINATE, false, pid) }
                        .with_context(|| format!("Failed to open '{}' (PID {})", name, pid))?,
                );
                unsafe { TerminateProcess(process.0, 1) }
                    .with_context(|| format!("Failed to terminate '{}' (PID {})", name, pid))?;
                info!("Terminated '{}' with PID {}", name, pid);
            }
            Ok(())
        }

        async fn is_process_running(&self, name: &str) -> anyhow::Result<bool> {
            Ok(!find_processes(name)?.is_empty())
        }
    }
}
