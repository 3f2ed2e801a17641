//! The presence reconciliation loop.
//!
//! Each tick walks a fixed ladder: chat client alive? → connected? → target
//! app alive? → compose and send. The loop owns all state carried between
//! ticks (connection, last identity, timer start); nothing is global.
//!
//! Ticks never overlap. Every failure inside a tick is absorbed here, logged,
//! and turned into a shorter or longer wait before the next one.

use chrono::Utc;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::composer::{compose, ComposeError, ComposeInput, TimerReset};
use crate::config::{PresenceAssets, PresenceConfig};
use crate::connection::{ConnectionManager, IpcError, PresenceConnector};
use crate::process::ProcessProbe;
use crate::rules::{match_rule, RuleFile};
use crate::shell::login_shell_name;
use crate::status::StatusFile;
use crate::types::IdentityKey;

const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    ChatClientAbsent,
    Connecting,
    TargetAppAbsent,
    Presenting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    ChatClientAbsent,
    ConnectFailed,
    Cleared,
    Presented { details: String, state: String },
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTimings {
    pub poll_interval: Duration,
    pub absent_recheck: Duration,
    pub connect_backoff: Duration,
}

impl LoopTimings {
    pub fn from_config(config: &PresenceConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            absent_recheck: config.absent_recheck(),
            connect_backoff: config.connect_backoff(),
        }
    }
}

impl TickOutcome {
    pub fn next_delay(&self, timings: &LoopTimings) -> Duration {
        match self {
            TickOutcome::ChatClientAbsent => timings.absent_recheck,
            TickOutcome::ConnectFailed => timings.connect_backoff,
            TickOutcome::Cleared | TickOutcome::Presented { .. } | TickOutcome::Failed => {
                timings.poll_interval
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum TickError {
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Ipc(#[from] IpcError),
}

/// Values carried from one tick to the next.
#[derive(Debug, Default)]
struct LoopState {
    phase: Option<LoopPhase>,
    last_identity: Option<IdentityKey>,
    start_epoch: i64,
    last_presented: Option<(String, String)>,
}

pub struct ReconciliationLoop<P: ProcessProbe, K: PresenceConnector> {
    probe: P,
    connection: ConnectionManager<K>,
    status: StatusFile,
    rules: RuleFile,
    assets: PresenceAssets,
    timings: LoopTimings,
    home: Option<String>,
    shell_resolver: fn() -> String,
    state: LoopState,
}

impl<P: ProcessProbe, K: PresenceConnector> ReconciliationLoop<P, K> {
    pub fn new(config: &PresenceConfig, probe: P, connector: K, home: Option<String>) -> Self {
        let home_ref = home.as_deref();
        Self {
            probe,
            connection: ConnectionManager::new(connector),
            status: StatusFile::new(config.status_path(home_ref)),
            rules: RuleFile::new(config.rules_path(home_ref)),
            assets: config.assets.clone(),
            timings: LoopTimings::from_config(config),
            home,
            shell_resolver: login_shell_name,
            state: LoopState::default(),
        }
    }

    pub fn with_shell_resolver(mut self, resolver: fn() -> String) -> Self {
        self.shell_resolver = resolver;
        self
    }

    pub fn phase(&self) -> Option<LoopPhase> {
        self.state.phase
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn timings(&self) -> &LoopTimings {
        &self.timings
    }

    pub fn connector(&self) -> &K {
        self.connection.connector()
    }

    /// Runs until `shutdown` is set, then releases the connection.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!(
            status_path = %self.status.path().display(),
            rules_path = %self.rules.path().display(),
            poll_interval_secs = self.timings.poll_interval.as_secs(),
            "Presence loop started"
        );

        while !shutdown.load(Ordering::SeqCst) {
            let now = Utc::now().timestamp();
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.tick(now))) {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("Presence tick panicked; resetting connection");
                    self.connection.disconnect();
                    TickOutcome::Failed
                }
            };
            sleep_unless_shutdown(outcome.next_delay(&self.timings), shutdown);
        }

        self.connection.disconnect();
        info!("Presence loop stopped");
    }

    /// One full reconciliation cycle at wall-clock time `now` (epoch seconds).
    pub fn tick(&mut self, now: i64) -> TickOutcome {
        let snapshot = self.probe.snapshot();

        if !snapshot.chat_client_running {
            if self.connection.is_connected() {
                info!("Discord closed; disconnecting RPC");
            }
            self.connection.disconnect();
            self.enter(LoopPhase::ChatClientAbsent);
            return TickOutcome::ChatClientAbsent;
        }

        if !self.connection.is_connected() {
            if let Err(err) = self.connection.ensure_connected() {
                warn!(error = %err, "Connect to Discord RPC failed");
                self.enter(LoopPhase::Connecting);
                return TickOutcome::ConnectFailed;
            }
            info!("Connected to Discord RPC");
        }

        if !snapshot.target_app_running {
            self.enter(LoopPhase::TargetAppAbsent);
            return match self.connection.clear() {
                Ok(()) => {
                    if self.state.last_presented.take().is_some() {
                        info!("Cleared presence");
                    } else {
                        debug!("Cleared presence");
                    }
                    TickOutcome::Cleared
                }
                Err(err) => {
                    warn!(error = %err, "Clearing presence failed; reconnecting next tick");
                    TickOutcome::Failed
                }
            };
        }

        self.enter(LoopPhase::Presenting);
        match self.present(now) {
            Ok(outcome) => outcome,
            Err(err) => {
                match &err {
                    TickError::Compose(err) => {
                        warn!(error = %err, "Focus rule configuration error; skipping update")
                    }
                    TickError::Ipc(err) if err.is_pipe_closed() => {
                        warn!(error = %err, "Pipe closed; reconnecting next tick")
                    }
                    TickError::Ipc(err) => warn!(error = %err, "Presence update failed"),
                }
                self.connection.disconnect();
                self.state.last_presented = None;
                TickOutcome::Failed
            }
        }
    }

    fn present(&mut self, now: i64) -> Result<TickOutcome, TickError> {
        let session = self.status.read();
        let rules = self.rules.load();
        let shell = (self.shell_resolver)();
        let rule = match_rule(&session.cwd, &rules, self.home.as_deref());

        let composition = compose(&ComposeInput {
            session: &session,
            shell: &shell,
            rule,
            previous_identity: self.state.last_identity.as_ref(),
            previous_start: self.state.start_epoch,
            now,
            assets: &self.assets,
            home: self.home.as_deref(),
        })?;

        match composition.timer {
            TimerReset::Kept => {}
            TimerReset::Held => debug!(
                identity = %composition.identity,
                "Focus rule entered without timer reset"
            ),
            TimerReset::IdentityChanged | TimerReset::RuleEntered => debug!(
                identity = %composition.identity,
                reason = ?composition.timer,
                "Elapsed timer reset"
            ),
        }
        // Committed before sending so a reconnect resumes the same timer.
        if composition.timer.commits_identity() {
            self.state.last_identity = Some(composition.identity);
        }
        self.state.start_epoch = composition.start_epoch_seconds;

        let payload = composition.payload;
        self.connection.update(&payload)?;

        let shown = (payload.details.clone(), payload.state.clone());
        if self.state.last_presented.as_ref() != Some(&shown) {
            info!(details = %payload.details, state = %payload.state, "Updated presence");
        } else {
            debug!(details = %payload.details, state = %payload.state, "Refreshed presence");
        }
        self.state.last_presented = Some(shown);

        Ok(TickOutcome::Presented {
            details: payload.details,
            state: payload.state,
        })
    }

    fn enter(&mut self, phase: LoopPhase) {
        if self.state.phase != Some(phase) {
            debug!(from = ?self.state.phase, to = ?phase, "Presence loop phase changed");
            self.state.phase = Some(phase);
        }
    }
}

fn sleep_unless_shutdown(total: Duration, shutdown: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() && !shutdown.load(Ordering::SeqCst) {
        let slice = remaining.min(SHUTDOWN_POLL);
        thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_delays_follow_timings() {
        let timings = LoopTimings {
            poll_interval: Duration::from_secs(5),
            absent_recheck: Duration::from_secs(3),
            connect_backoff: Duration::from_secs(7),
        };

        assert_eq!(
            TickOutcome::ChatClientAbsent.next_delay(&timings),
            Duration::from_secs(3)
        );
        assert_eq!(
            TickOutcome::ConnectFailed.next_delay(&timings),
            Duration::from_secs(7)
        );
        assert_eq!(TickOutcome::Cleared.next_delay(&timings), Duration::from_secs(5));
        assert_eq!(TickOutcome::Failed.next_delay(&timings), Duration::from_secs(5));
    }

    #[test]
    fn sleep_returns_immediately_when_shutdown_requested() {
        let shutdown = AtomicBool::new(true);
        let started = std::time::Instant::now();
        sleep_unless_shutdown(Duration::from_secs(30), &shutdown);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
