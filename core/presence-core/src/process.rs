//! Process liveness checks for the chat client and the target terminal.
//!
//! Both checks are substring heuristics over the process table. An unrelated
//! process whose path happens to contain the marker counts as a match.

use sysinfo::{ProcessRefreshKind, System, UpdateKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub chat_client_running: bool,
    pub target_app_running: bool,
}

pub trait ProcessProbe {
    fn snapshot(&mut self) -> ProcessSnapshot;
}

pub struct SysinfoWatcher {
    system: System,
    target_marker: String,
    chat_client_marker: String,
}

impl SysinfoWatcher {
    pub fn new(target_marker: &str, chat_client_marker: &str) -> Self {
        Self {
            system: System::new(),
            target_marker: target_marker.to_lowercase(),
            chat_client_marker: chat_client_marker.to_lowercase(),
        }
    }
}

impl ProcessProbe for SysinfoWatcher {
    fn snapshot(&mut self) -> ProcessSnapshot {
        // One full refresh per tick; exe and cmd only need reading once per PID.
        self.system.refresh_processes_specifics(
            ProcessRefreshKind::new()
                .with_exe(UpdateKind::OnlyIfNotSet)
                .with_cmd(UpdateKind::OnlyIfNotSet),
        );

        let mut snapshot = ProcessSnapshot::default();
        for process in self.system.processes().values() {
            if !snapshot.chat_client_running
                && name_matches(process.name(), &self.chat_client_marker)
            {
                snapshot.chat_client_running = true;
            }
            if !snapshot.target_app_running {
                let exe = process.exe().map(|path| path.to_string_lossy());
                if target_matches(exe.as_deref(), process.cmd(), &self.target_marker) {
                    snapshot.target_app_running = true;
                }
            }
            if snapshot.chat_client_running && snapshot.target_app_running {
                break;
            }
        }
        snapshot
    }
}

/// `marker` must already be lowercase.
pub fn name_matches(name: &str, marker: &str) -> bool {
    !marker.is_empty() && name.to_lowercase().contains(marker)
}

/// Matches the marker against the executable path or the joined command line.
///
/// `marker` must already be lowercase.
pub fn target_matches(exe: Option<&str>, cmd: &[String], marker: &str) -> bool {
    if marker.is_empty() {
        return false;
    }
    if exe.is_some_and(|exe| exe.to_lowercase().contains(marker)) {
        return true;
    }
    cmd.join(" ").to_lowercase().contains(marker)
}
