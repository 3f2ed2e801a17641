//! warp-presence daemon entrypoint.
//!
//! A single-threaded background service: every few seconds it checks whether
//! Discord and Warp are running, reads the shell's status file, and mirrors
//! the active session into Discord rich presence over the local IPC socket.
//! SIGINT/SIGTERM stop the loop at the next tick boundary and clear the
//! connection before exit.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

use presence_core::config::CLIENT_ID_ENV;
use presence_core::paths::home_dir_string;
use presence_core::{load_config, ReconciliationLoop, SysinfoWatcher};

mod ipc;
mod logging;

use ipc::DiscordIpcConnector;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

fn main() {
    let _logging_guard = logging::init();

    let config = match load_config(None) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load warp-presence config");
            std::process::exit(1);
        }
    };

    if config.has_placeholder_client_id() {
        warn!(
            env = CLIENT_ID_ENV,
            "Discord application id is not configured; handshakes will be rejected"
        );
    }

    if let Err(err) = install_signal_handlers() {
        error!(error = %err, "Failed to install signal handlers");
        std::process::exit(1);
    }

    let home = home_dir_string();
    if home.is_none() {
        warn!("Home directory not found; '~' in paths and rules stays literal");
    }

    let probe = SysinfoWatcher::new(&config.target_marker, &config.chat_client_marker);
    let connector = DiscordIpcConnector::new(config.client_id.clone());
    let mut presence = ReconciliationLoop::new(&config, probe, connector, home);

    info!(version = env!("CARGO_PKG_VERSION"), "warp-presence daemon started");
    presence.run(&SHUTDOWN);
    info!("warp-presence daemon exiting");
}

extern "C" fn handle_signal(_signal: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() -> std::io::Result<()> {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        let handler = handle_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
        let previous = unsafe { libc::signal(signal, handler) };
        if previous == libc::SIG_ERR {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}
