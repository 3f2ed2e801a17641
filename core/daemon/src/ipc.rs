//! Unix-socket transport for Discord's local RPC.
//!
//! Discord listens on `discord-ipc-{0..9}` inside the runtime/temp directory.
//! We connect, handshake with the application id, then send `SET_ACTIVITY`
//! commands and wait for the reply carrying our nonce. Every read and write
//! is bounded by a timeout so a wedged client can't stall the loop.

use chrono::Utc;
use presence_core::{IpcError, PresenceClient, PresenceConnector, PresencePayload};
use rand::RngCore;
use serde::Serialize;
use std::env;
use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use warp_presence_protocol::{
    decode_header, encode_frame, parse_close_reason, Activity, CommandFrame, Dispatch, Handshake,
    Opcode, HEADER_LEN,
};

const SOCKET_ENV: &str = "WARP_PRESENCE_IPC_SOCKET";
const SOCKET_PREFIX: &str = "discord-ipc-";
const MAX_SOCKET_INDEX: u8 = 10;
const IO_TIMEOUT_MS: u64 = 2000;
/// Unrelated dispatches (e.g. subscriptions) tolerated while awaiting a reply.
const MAX_SKIPPED_FRAMES: usize = 16;

/// Sandboxed Discord builds put the socket one level down.
const SANDBOX_SUBDIRS: &[&str] = &["", "app/com.discordapp.Discord", "snap.discord"];

pub struct DiscordIpcConnector {
    client_id: String,
    socket_override: Option<PathBuf>,
}

impl DiscordIpcConnector {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            socket_override: env::var(SOCKET_ENV)
                .ok()
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
        }
    }

    #[cfg(test)]
    fn with_socket(client_id: impl Into<String>, socket: PathBuf) -> Self {
        Self {
            client_id: client_id.into(),
            socket_override: Some(socket),
        }
    }

    fn open_socket(&self) -> Result<UnixStream, IpcError> {
        if let Some(path) = &self.socket_override {
            return UnixStream::connect(path).map_err(|err| {
                debug!(path = %path.display(), error = %err, "IPC socket override unavailable");
                IpcError::SocketNotFound
            });
        }

        for path in candidate_socket_paths() {
            if let Ok(stream) = UnixStream::connect(&path) {
                debug!(path = %path.display(), "Opened Discord IPC socket");
                return Ok(stream);
            }
        }
        Err(IpcError::SocketNotFound)
    }
}

impl PresenceConnector for DiscordIpcConnector {
    type Client = DiscordIpcClient;

    fn connect(&mut self) -> Result<DiscordIpcClient, IpcError> {
        let stream = self.open_socket()?;
        let timeout = Some(Duration::from_millis(IO_TIMEOUT_MS));
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;

        let mut client = DiscordIpcClient {
            stream,
            pid: std::process::id(),
            closed: false,
        };
        client.handshake(&self.client_id)?;
        Ok(client)
    }
}

pub fn candidate_socket_paths() -> Vec<PathBuf> {
    let mut bases: Vec<PathBuf> = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .collect();
    bases.push(PathBuf::from("/tmp"));
    let mut seen = Vec::new();
    bases.retain(|base| {
        if seen.contains(base) {
            false
        } else {
            seen.push(base.clone());
            true
        }
    });

    let mut paths = Vec::new();
    for base in &bases {
        for subdir in SANDBOX_SUBDIRS {
            let dir = if subdir.is_empty() {
                base.clone()
            } else {
                base.join(subdir)
            };
            for index in 0..MAX_SOCKET_INDEX {
                paths.push(dir.join(format!("{}{}", SOCKET_PREFIX, index)));
            }
        }
    }
    paths
}

pub struct DiscordIpcClient {
    stream: UnixStream,
    pid: u32,
    closed: bool,
}

impl DiscordIpcClient {
    fn handshake(&mut self, client_id: &str) -> Result<(), IpcError> {
        self.write_frame(Opcode::Handshake, &Handshake::new(client_id))?;

        for _ in 0..MAX_SKIPPED_FRAMES {
            let (opcode, body) = self.read_frame()?;
            match opcode {
                Opcode::Frame => {
                    let dispatch = parse_dispatch(&body)?;
                    if let Some(err) = dispatch.error() {
                        return Err(IpcError::Handshake(format!(
                            "{}: {}",
                            err.code, err.message
                        )));
                    }
                    if dispatch.is_ready() {
                        return Ok(());
                    }
                }
                Opcode::Close => {
                    let reason = parse_close_reason(&body)
                        .map(|reason| format!("{}: {}", reason.code, reason.message))
                        .unwrap_or_else(|| "closed during handshake".to_string());
                    return Err(IpcError::Handshake(reason));
                }
                Opcode::Ping => self.write_raw(Opcode::Pong, &body)?,
                Opcode::Pong | Opcode::Handshake => {}
            }
        }
        Err(IpcError::Handshake("no READY dispatch".to_string()))
    }

    fn send_activity(&mut self, activity: Option<Activity>) -> Result<(), IpcError> {
        let nonce = make_nonce();
        let command = CommandFrame::set_activity(self.pid, activity, nonce.clone());
        self.write_frame(Opcode::Frame, &command)?;

        for _ in 0..MAX_SKIPPED_FRAMES {
            let (opcode, body) = self.read_frame()?;
            match opcode {
                Opcode::Frame => {
                    let dispatch = parse_dispatch(&body)?;
                    if dispatch.nonce.as_deref() != Some(nonce.as_str()) {
                        continue;
                    }
                    if let Some(err) = dispatch.error() {
                        return Err(IpcError::Rejected {
                            code: err.code,
                            message: err.message,
                        });
                    }
                    return Ok(());
                }
                Opcode::Close => {
                    let reason = parse_close_reason(&body)
                        .map(|reason| reason.message)
                        .unwrap_or_default();
                    return Err(IpcError::PipeClosed(format!("peer closed: {}", reason)));
                }
                Opcode::Ping => self.write_raw(Opcode::Pong, &body)?,
                Opcode::Pong => {}
                Opcode::Handshake => {
                    return Err(IpcError::Protocol(
                        "unexpected handshake opcode".to_string(),
                    ))
                }
            }
        }
        Err(IpcError::Protocol(
            "no reply for SET_ACTIVITY command".to_string(),
        ))
    }

    fn write_frame<T: Serialize>(&mut self, opcode: Opcode, body: &T) -> Result<(), IpcError> {
        let frame = encode_frame(opcode, body)?;
        self.stream.write_all(&frame)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Echoes an already-encoded body, used for Ping → Pong.
    fn write_raw(&mut self, opcode: Opcode, body: &[u8]) -> Result<(), IpcError> {
        let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
        frame.extend_from_slice(&(opcode as u32).to_le_bytes());
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(body);
        self.stream.write_all(&frame)?;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<(Opcode, Vec<u8>), IpcError> {
        let mut header = [0u8; HEADER_LEN];
        self.stream.read_exact(&mut header)?;
        let header = decode_header(header)?;

        let mut body = vec![0u8; header.len];
        self.stream.read_exact(&mut body)?;
        Ok((header.opcode, body))
    }
}

impl PresenceClient for DiscordIpcClient {
    fn set_activity(&mut self, payload: &PresencePayload) -> Result<(), IpcError> {
        self.send_activity(Some(payload.to_activity()))
    }

    fn clear_activity(&mut self) -> Result<(), IpcError> {
        self.send_activity(None)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.write_frame(Opcode::Close, &serde_json::json!({}));
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl Drop for DiscordIpcClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn parse_dispatch(body: &[u8]) -> Result<Dispatch, IpcError> {
    serde_json::from_slice(body)
        .map_err(|err| IpcError::Protocol(format!("invalid dispatch JSON: {}", err)))
}

fn make_nonce() -> String {
    let mut random = rand::thread_rng();
    format!("{}-{:x}", Utc::now().timestamp_millis(), random.next_u64())
}
