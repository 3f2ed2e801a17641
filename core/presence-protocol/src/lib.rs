//! Discord IPC wire types for warp-presence.
//!
//! Discord's local RPC socket speaks a tiny framed protocol: an 8-byte
//! little-endian header (`opcode`, `length`) followed by a JSON body.
//! This crate owns the framing and the handful of payloads the daemon sends,
//! so the transport and its tests share one schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const HANDSHAKE_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 8;
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

pub const CMD_SET_ACTIVITY: &str = "SET_ACTIVITY";
pub const CMD_DISPATCH: &str = "DISPATCH";
pub const EVT_READY: &str = "READY";
pub const EVT_ERROR: &str = "ERROR";

/// Discord truncates anything longer and rejects more than two buttons.
pub const MAX_TEXT_CHARS: usize = 128;
pub const MAX_BUTTONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl Opcode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Opcode::Handshake),
            1 => Some(Opcode::Frame),
            2 => Some(Opcode::Close),
            3 => Some(Opcode::Ping),
            4 => Some(Opcode::Pong),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unknown opcode {0}")]
    UnknownOpcode(u32),

    #[error("frame body of {len} bytes exceeds maximum of {max}")]
    TooLarge { len: usize, max: usize },

    #[error("invalid frame JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub opcode: Opcode,
    pub len: usize,
}

pub fn encode_frame<T: Serialize>(opcode: Opcode, body: &T) -> Result<Vec<u8>, FrameError> {
    let json = serde_json::to_vec(body)?;
    if json.len() > MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge {
            len: json.len(),
            max: MAX_FRAME_BYTES,
        });
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + json.len());
    frame.extend_from_slice(&(opcode as u32).to_le_bytes());
    frame.extend_from_slice(&(json.len() as u32).to_le_bytes());
    frame.extend_from_slice(&json);
    Ok(frame)
}

pub fn decode_header(bytes: [u8; HEADER_LEN]) -> Result<FrameHeader, FrameError> {
    let raw_opcode = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;

    let opcode = Opcode::from_u32(raw_opcode).ok_or(FrameError::UnknownOpcode(raw_opcode))?;
    if len > MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge {
            len,
            max: MAX_FRAME_BYTES,
        });
    }

    Ok(FrameHeader { opcode, len })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub v: u32,
    pub client_id: String,
}

impl Handshake {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            v: HANDSHAKE_VERSION,
            client_id: client_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandFrame {
    pub cmd: String,
    pub args: SetActivityArgs,
    pub nonce: String,
}

impl CommandFrame {
    /// `activity: None` serializes as `null`, which Discord treats as "clear".
    pub fn set_activity(pid: u32, activity: Option<Activity>, nonce: impl Into<String>) -> Self {
        Self {
            cmd: CMD_SET_ACTIVITY.to_string(),
            args: SetActivityArgs { pid, activity },
            nonce: nonce.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetActivityArgs {
    pub pid: u32,
    pub activity: Option<Activity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Timestamps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Assets>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<ActivityButton>,
}

impl Activity {
    /// Truncates text fields and drops surplus buttons so Discord accepts the payload.
    pub fn clamped(mut self) -> Self {
        self.details = self.details.map(clamp_text);
        self.state = self.state.map(clamp_text);
        if let Some(assets) = self.assets.as_mut() {
            assets.large_text = assets.large_text.take().map(clamp_text);
            assets.small_text = assets.small_text.take().map(clamp_text);
        }
        self.buttons.truncate(MAX_BUTTONS);
        self
    }
}

fn clamp_text(value: String) -> String {
    if value.chars().count() <= MAX_TEXT_CHARS {
        value
    } else {
        value.chars().take(MAX_TEXT_CHARS).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityButton {
    pub label: String,
    pub url: String,
}

/// Any JSON message Discord sends back over a `Frame` opcode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dispatch {
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub evt: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: i64,
    pub message: String,
}

impl Dispatch {
    pub fn is_ready(&self) -> bool {
        self.evt.as_deref() == Some(EVT_READY)
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        if self.evt.as_deref() != Some(EVT_ERROR) {
            return None;
        }
        let data = self.data.as_ref();
        let code = data
            .and_then(|data| data.get("code"))
            .and_then(|value| value.as_i64())
            .unwrap_or(0);
        let message = data
            .and_then(|data| data.get("message"))
            .and_then(|value| value.as_str())
            .unwrap_or("unknown error")
            .to_string();
        Some(ErrorInfo { code, message })
    }
}

/// Close frames carry `{code, message}` directly rather than nested in `data`.
pub fn parse_close_reason(body: &[u8]) -> Option<ErrorInfo> {
    let value: Value = serde_json::from_slice(body).ok()?;
    Some(ErrorInfo {
        code: value.get("code").and_then(|v| v.as_i64()).unwrap_or(0),
        message: value
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
    })
}
