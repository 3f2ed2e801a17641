//! IPC connection lifecycle.
//!
//! [`ConnectionManager`] is a two-state machine (`Disconnected`/`Connected`)
//! over a pluggable transport. It never retries internally: any transport
//! failure drops the handle and the caller's next tick reconnects.

use std::io;
use tracing::debug;
use warp_presence_protocol::FrameError;

use crate::types::PresencePayload;

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("no Discord IPC socket found")]
    SocketNotFound,

    #[error("IPC I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("IPC pipe closed: {0}")]
    PipeClosed(String),

    #[error("IPC handshake failed: {0}")]
    Handshake(String),

    #[error("IPC protocol error: {0}")]
    Protocol(String),

    #[error("Discord rejected command: {code}: {message}")]
    Rejected { code: i64, message: String },

    #[error("not connected")]
    NotConnected,
}

impl IpcError {
    pub fn is_pipe_closed(&self) -> bool {
        matches!(self, IpcError::PipeClosed(_))
    }
}

impl From<io::Error> for IpcError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof => IpcError::PipeClosed(err.to_string()),
            _ => IpcError::Io(err),
        }
    }
}

impl From<FrameError> for IpcError {
    fn from(err: FrameError) -> Self {
        IpcError::Protocol(err.to_string())
    }
}

/// A live, handshaken connection to the chat client.
pub trait PresenceClient {
    fn set_activity(&mut self, payload: &PresencePayload) -> Result<(), IpcError>;
    fn clear_activity(&mut self) -> Result<(), IpcError>;
    /// Best-effort teardown; must not fail.
    fn close(&mut self);
}

pub trait PresenceConnector {
    type Client: PresenceClient;

    fn connect(&mut self) -> Result<Self::Client, IpcError>;
}

enum ConnectionState<C> {
    Disconnected,
    Connected(C),
}

pub struct ConnectionManager<K: PresenceConnector> {
    connector: K,
    state: ConnectionState<K::Client>,
}

impl<K: PresenceConnector> ConnectionManager<K> {
    pub fn new(connector: K) -> Self {
        Self {
            connector,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }

    /// Handshakes if currently disconnected. A failure leaves the manager
    /// disconnected; backoff is the caller's job.
    pub fn ensure_connected(&mut self) -> Result<(), IpcError> {
        if self.is_connected() {
            return Ok(());
        }
        let client = self.connector.connect()?;
        self.state = ConnectionState::Connected(client);
        Ok(())
    }

    pub fn update(&mut self, payload: &PresencePayload) -> Result<(), IpcError> {
        let ConnectionState::Connected(client) = &mut self.state else {
            return Err(IpcError::NotConnected);
        };
        if let Err(err) = client.set_activity(payload) {
            self.disconnect();
            return Err(err);
        }
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), IpcError> {
        let ConnectionState::Connected(client) = &mut self.state else {
            return Err(IpcError::NotConnected);
        };
        if let Err(err) = client.clear_activity() {
            self.disconnect();
            return Err(err);
        }
        Ok(())
    }

    /// Idempotent.
    pub fn disconnect(&mut self) {
        if let ConnectionState::Connected(mut client) =
            std::mem::replace(&mut self.state, ConnectionState::Disconnected)
        {
            debug!("Closing presence connection");
            client.close();
        }
    }

    pub fn connector(&self) -> &K {
        &self.connector
    }
}

impl<K: PresenceConnector> Drop for ConnectionManager<K> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct Script {
        connects: VecDeque<Result<(), IpcError>>,
        sends: VecDeque<Result<(), IpcError>>,
        closes: usize,
        sent: Vec<Option<String>>,
    }

    struct FakeConnector(Rc<RefCell<Script>>);
    struct FakeClient(Rc<RefCell<Script>>);

    impl PresenceConnector for FakeConnector {
        type Client = FakeClient;

        fn connect(&mut self) -> Result<FakeClient, IpcError> {
            let next = self.0.borrow_mut().connects.pop_front().unwrap_or(Ok(()));
            next.map(|_| FakeClient(Rc::clone(&self.0)))
        }
    }

    impl PresenceClient for FakeClient {
        fn set_activity(&mut self, payload: &PresencePayload) -> Result<(), IpcError> {
            let mut script = self.0.borrow_mut();
            script.sent.push(Some(payload.details.clone()));
            script.sends.pop_front().unwrap_or(Ok(()))
        }

        fn clear_activity(&mut self) -> Result<(), IpcError> {
            let mut script = self.0.borrow_mut();
            script.sent.push(None);
            script.sends.pop_front().unwrap_or(Ok(()))
        }

        fn close(&mut self) {
            self.0.borrow_mut().closes += 1;
        }
    }

    fn manager() -> (ConnectionManager<FakeConnector>, Rc<RefCell<Script>>) {
        let script = Rc::new(RefCell::new(Script::default()));
        (
            ConnectionManager::new(FakeConnector(Rc::clone(&script))),
            script,
        )
    }

    fn payload() -> PresencePayload {
        PresencePayload {
            details: "command line".to_string(),
            state: "Using ZSH • On Warp".to_string(),
            large_image_key: "warp".to_string(),
            large_text: "Warp Terminal".to_string(),
            small_image_key: None,
            small_text: None,
            start_epoch_seconds: 0,
            buttons: Vec::new(),
        }
    }

    #[test]
    fn starts_disconnected_and_rejects_updates() {
        let (mut manager, _) = manager();
        assert!(!manager.is_connected());
        assert!(matches!(
            manager.update(&payload()),
            Err(IpcError::NotConnected)
        ));
        assert!(matches!(manager.clear(), Err(IpcError::NotConnected)));
    }

    #[test]
    fn failed_handshake_stays_disconnected() {
        let (mut manager, script) = manager();
        script
            .borrow_mut()
            .connects
            .push_back(Err(IpcError::SocketNotFound));

        assert!(manager.ensure_connected().is_err());
        assert!(!manager.is_connected());

        manager.ensure_connected().expect("second attempt connects");
        assert!(manager.is_connected());
    }

    #[test]
    fn send_failure_drops_connection_without_retry() {
        let (mut manager, script) = manager();
        manager.ensure_connected().expect("connect");
        script
            .borrow_mut()
            .sends
            .push_back(Err(IpcError::PipeClosed("eof".to_string())));

        let err = manager.update(&payload()).expect_err("pipe closed");

        assert!(err.is_pipe_closed());
        assert!(!manager.is_connected());
        assert_eq!(script.borrow().sent.len(), 1);
        assert_eq!(script.borrow().closes, 1);
    }

    #[test]
    fn clear_failure_drops_connection() {
        let (mut manager, script) = manager();
        manager.ensure_connected().expect("connect");
        script.borrow_mut().sends.push_back(Err(IpcError::Rejected {
            code: 4000,
            message: "bad".to_string(),
        }));

        assert!(manager.clear().is_err());
        assert!(!manager.is_connected());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (mut manager, script) = manager();
        manager.ensure_connected().expect("connect");

        manager.disconnect();
        manager.disconnect();

        assert!(!manager.is_connected());
        assert_eq!(script.borrow().closes, 1);
    }

    #[test]
    fn drop_releases_connection() {
        let (mut manager, script) = manager();
        manager.ensure_connected().expect("connect");
        drop(manager);
        assert_eq!(script.borrow().closes, 1);
    }

    #[test]
    fn io_errors_classify_pipe_closed() {
        let broken = IpcError::from(io::Error::new(io::ErrorKind::BrokenPipe, "broken"));
        let eof = IpcError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        let timeout = IpcError::from(io::Error::new(io::ErrorKind::TimedOut, "slow"));

        assert!(broken.is_pipe_closed());
        assert!(eof.is_pipe_closed());
        assert!(!timeout.is_pipe_closed());
    }
}
