//! # presence-core
//!
//! Core library for warp-presence. Everything that decides *what* Discord
//! shows lives here; the daemon crate only supplies the socket transport and
//! process bootstrapping.
//!
//! ## Design Principles
//!
//! - **Synchronous**: one polling thread, blocking I/O, no async runtime.
//! - **Graceful degradation**: missing or malformed status/rule files yield
//!   empty defaults, never errors.
//! - **Seams at the edges**: process inspection and the IPC transport sit
//!   behind traits ([`ProcessProbe`], [`PresenceConnector`]) so the loop can
//!   be driven by fakes in tests.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use presence_core::{load_config, ReconciliationLoop, SysinfoWatcher};
//!
//! let config = load_config(None)?;
//! let probe = SysinfoWatcher::new(&config.target_marker, &config.chat_client_marker);
//! let mut presence = ReconciliationLoop::new(&config, probe, connector, home);
//! presence.run(&SHUTDOWN);
//! ```

pub mod composer;
pub mod config;
pub mod connection;
pub mod error;
pub mod glob;
pub mod paths;
pub mod process;
pub mod reconcile;
pub mod rules;
pub mod shell;
pub mod status;
pub mod template;
pub mod types;

pub use composer::{compose, ComposeError, ComposeInput, Composition, TimerReset};
pub use config::{load_config, PresenceAssets, PresenceConfig};
pub use connection::{ConnectionManager, IpcError, PresenceClient, PresenceConnector};
pub use error::{PresenceError, Result};
pub use process::{ProcessProbe, ProcessSnapshot, SysinfoWatcher};
pub use reconcile::{LoopPhase, LoopTimings, ReconciliationLoop, TickOutcome};
pub use rules::{match_rule, FocusRule, RuleFile, RuleSet};
pub use status::{SessionStatus, StatusFile};
pub use types::{Button, IdentityKey, PresencePayload};
