// MIT License - Copyright (c) 2021 TJForc
// Session lifecycle and login handshake

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::codec::Frame;
use crate::config::TpiConfig;
use crate::constants::{
    inbound, outbound, KEYS_DUMP_BYPASS_ZONES, LOGIN_FAILED, LOGIN_PROMPT, LOGIN_SUCCESS,
};
use crate::dispatcher::CommandDispatcher;
use crate::error::{LoginError, LoginStep, Result, TpiError};
use crate::event::{event_channel, EventReceiver};
use crate::listener::{spawn_listener, Listener};
use crate::protocol::{Command, PanicKind};
use crate::transport::{self, FrameReader, FrameWriter, Incoming};

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    LoggedIn,
    Streaming,
    ShuttingDown,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::LoggedIn => "logged in",
            Self::Streaming => "streaming",
            Self::ShuttingDown => "shutting down",
        };
        f.write_str(name)
    }
}

/// A logged-in connection to an EnvisaLink.
///
/// Created by [`Session::connect`], which also returns the receiver for
/// decoded panel events. The receiver yields `None` once the listener has
/// stopped, which is the signal to reconnect.
///
/// # Example
///
/// ```no_run
/// use envisalink_tpi::{Session, TpiConfig};
///
/// # async fn example() -> envisalink_tpi::Result<()> {
/// let config = TpiConfig::builder()
///     .host("192.168.1.50")
///     .password("user")
///     .access_code("1234")
///     .build();
///
/// let (mut session, mut events) = Session::connect(config).await?;
/// session.status_report().await?;
///
/// while let Some(event) = events.recv().await {
///     println!("Event: {:?}", event);
/// }
///
/// session.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    dispatcher: Arc<CommandDispatcher>,
    state: Arc<RwLock<ConnectionState>>,
    listener: Option<JoinHandle<()>>,
    config: TpiConfig,
}

impl Session {
    /// Open a TCP connection, log in and start the listener.
    pub async fn connect(config: TpiConfig) -> Result<(Session, EventReceiver)> {
        let stream = transport::connect(&config.host, config.port, config.login_timeout).await?;
        let (reader, writer) = transport::split(stream, config.login_timeout, config.write_timeout);
        Self::handshake(reader, writer, config).await
    }

    /// Run the login handshake over an already open stream and start the
    /// listener.
    ///
    /// On any deviation from the expected sequence the write half is shut
    /// down and both halves are dropped.
    pub async fn handshake(
        mut reader: FrameReader,
        writer: FrameWriter,
        config: TpiConfig,
    ) -> Result<(Session, EventReceiver)> {
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));
        let dispatcher = Arc::new(CommandDispatcher::new(writer, config.lock_timeout));

        reader.set_timeout(config.login_timeout);
        if let Err(e) = login(&mut reader, &dispatcher, &config).await {
            error!("Login to EnvisaLink failed: {}", e);
            dispatcher.force_close().await;
            *state.write().await = ConnectionState::Disconnected;
            return Err(e);
        }

        reader.set_timeout(config.listen_timeout);
        *state.write().await = ConnectionState::LoggedIn;
        info!("Logged in to EnvisaLink");

        let (event_tx, event_rx) = event_channel(config.event_capacity);
        let handle = spawn_listener(Listener {
            reader,
            dispatcher: dispatcher.clone(),
            state: state.clone(),
            event_tx,
            access_code: config.access_code.clone(),
        });

        {
            // The listener may already have seen the socket close
            let mut current = state.write().await;
            if *current == ConnectionState::LoggedIn {
                *current = ConnectionState::Streaming;
            }
        }

        let session = Session {
            dispatcher,
            state,
            listener: Some(handle),
            config,
        };
        Ok((session, event_rx))
    }

    /// Stop the listener and close the connection.
    ///
    /// Disables time broadcasts, waits up to the join timeout for the
    /// listener to see the acknowledgment, then closes the write half. If
    /// the send lock cannot be acquired the connection is left open and
    /// [`TpiError::LockTimeout`] is returned;
    /// call [`close`](Self::close) to force it.
    pub async fn shutdown(&mut self) -> Result<()> {
        debug!("Shutting down session");
        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, ConnectionState::ShuttingDown)
        };

        if let Err(e) = self.dispatcher.request_stop().await {
            warn!("Unable to disable time broadcasts: {}", e);
            if matches!(e, TpiError::LockTimeout) {
                let mut state = self.state.write().await;
                if *state == ConnectionState::ShuttingDown {
                    *state = previous;
                }
                return Err(e);
            }
        }

        if let Some(handle) = self.listener.as_mut() {
            match timeout(self.config.shutdown_join_timeout, handle).await {
                Ok(_) => {
                    debug!("Listener stopped");
                    self.listener = None;
                }
                Err(_) => warn!(
                    "Listener did not stop within {:?}",
                    self.config.shutdown_join_timeout
                ),
            }
        }

        self.dispatcher.close().await?;
        *self.state.write().await = ConnectionState::Disconnected;
        info!("Disconnected from EnvisaLink");
        Ok(())
    }

    /// Close the connection immediately without the stop handshake.
    pub async fn close(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
        }
        self.dispatcher.force_close().await;
        *self.state.write().await = ConnectionState::Disconnected;
    }

    /// Whether the session is logged in and streaming events.
    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Streaming
    }

    /// Whether the listener task is still running.
    pub fn is_listening(&self) -> bool {
        self.listener.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub fn config(&self) -> &TpiConfig {
        &self.config
    }

    /// Send a raw command code and payload.
    pub async fn send_command(&self, code: &str, data: &str) -> Result<()> {
        self.dispatcher.send_command(code, data).await
    }

    /// Send a typed command.
    pub async fn send(&self, command: &Command) -> Result<()> {
        self.dispatcher.send(command).await
    }

    // ---- Convenience commands ----

    pub async fn status_report(&self) -> Result<()> {
        self.send(&Command::StatusReport).await
    }

    pub async fn arm_away(&self, partition: u8) -> Result<()> {
        self.send(&Command::ArmAway { partition }).await
    }

    pub async fn arm_stay(&self, partition: u8) -> Result<()> {
        self.send(&Command::ArmStay { partition }).await
    }

    pub async fn arm_zero_entry(&self, partition: u8) -> Result<()> {
        self.send(&Command::ArmZeroEntry { partition }).await
    }

    pub async fn arm_with_code(&self, partition: u8, code: &str) -> Result<()> {
        self.send(&Command::ArmWithCode {
            partition,
            code: code.to_string(),
        })
        .await
    }

    pub async fn disarm(&self, partition: u8, code: &str) -> Result<()> {
        self.send(&Command::Disarm {
            partition,
            code: code.to_string(),
        })
        .await
    }

    pub async fn activate_command_output(&self, partition: u8, output: u8) -> Result<()> {
        self.send(&Command::ActivateCommandOutput { partition, output })
            .await
    }

    pub async fn trigger_panic(&self, kind: PanicKind) -> Result<()> {
        self.send(&Command::TriggerPanic(kind)).await
    }

    pub async fn send_keystrokes(&self, partition: u8, keys: &str) -> Result<()> {
        self.send(&Command::SendKeystrokes {
            partition,
            keys: keys.to_string(),
        })
        .await
    }

    /// Enter and leave the bypass menu so the panel sends a `616` dump.
    pub async fn dump_bypassed_zones(&self, partition: u8) -> Result<()> {
        self.send_keystrokes(partition, KEYS_DUMP_BYPASS_ZONES).await
    }

    pub async fn set_time(&self, time: NaiveDateTime) -> Result<()> {
        self.send(&Command::SetTime(time)).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
        }
    }
}

async fn login(
    reader: &mut FrameReader,
    dispatcher: &CommandDispatcher,
    config: &TpiConfig,
) -> Result<()> {
    let frame = expect_frame(reader, LoginStep::Prompt).await?;
    if frame.code != inbound::LOGIN_INTERACTION || frame.data != LOGIN_PROMPT {
        return Err(LoginError::UnexpectedPrompt {
            received: describe(&frame),
        }
        .into());
    }

    dispatcher
        .send(&Command::NetworkLogin {
            password: config.password.clone(),
        })
        .await?;
    let frame = expect_frame(reader, LoginStep::PasswordAck).await?;
    if frame.code != inbound::ACK || frame.data != outbound::NETWORK_LOGIN {
        return Err(LoginError::PasswordNotAcknowledged {
            received: describe(&frame),
        }
        .into());
    }

    let frame = expect_frame(reader, LoginStep::LoginResult).await?;
    match (frame.code.as_str(), frame.data.as_str()) {
        (inbound::LOGIN_INTERACTION, LOGIN_SUCCESS) => {}
        (inbound::LOGIN_INTERACTION, LOGIN_FAILED) => {
            error!("Invalid password specified. Login failed.");
            return Err(LoginError::BadPassword.into());
        }
        _ => {
            return Err(LoginError::UnexpectedLoginResult {
                received: describe(&frame),
            }
            .into());
        }
    }

    // Time broadcasts every ~4 minutes double as the keep-alive
    dispatcher
        .send(&Command::TimeBroadcastControl { enabled: true })
        .await?;
    let frame = expect_frame(reader, LoginStep::KeepAliveAck).await?;
    if frame.code != inbound::ACK || frame.data != outbound::TIME_BROADCAST_CONTROL {
        return Err(LoginError::KeepAliveNotAcknowledged {
            received: describe(&frame),
        }
        .into());
    }

    Ok(())
}

async fn expect_frame(reader: &mut FrameReader, step: LoginStep) -> Result<Frame> {
    match reader.receive_frame().await? {
        Incoming::Frame(frame) => Ok(frame),
        Incoming::Timeout => Err(LoginError::Timeout { step }.into()),
        Incoming::Closed => Err(LoginError::ConnectionClosed { step }.into()),
    }
}

fn describe(frame: &Frame) -> String {
    format!("{}{}", frame.code, frame.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_next, encode};
    use bytes::BytesMut;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn test_config() -> TpiConfig {
        TpiConfig::builder()
            .password("user")
            .login_timeout(Duration::from_millis(200))
            .shutdown_join_timeout(Duration::from_millis(500))
            .build()
    }

    fn pipes() -> (FrameReader, FrameWriter, DuplexStream, DuplexStream) {
        let (client_read, device_out) = tokio::io::duplex(1024);
        let (client_write, device_in) = tokio::io::duplex(1024);
        (
            FrameReader::new(Box::new(client_read), Duration::from_secs(1)),
            FrameWriter::new(Box::new(client_write), Duration::from_secs(1)),
            device_in,
            device_out,
        )
    }

    async fn next_frame(stream: &mut DuplexStream, buf: &mut BytesMut) -> Option<Frame> {
        loop {
            if let Some(frame) = decode_next(buf) {
                return Some(frame);
            }
            let mut chunk = [0u8; 64];
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Scripted device side of a successful login.
    async fn device_login(
        device_in: &mut DuplexStream,
        device_out: &mut DuplexStream,
        buf: &mut BytesMut,
    ) {
        device_out.write_all(&encode("505", "3")).await.unwrap();
        let login = next_frame(device_in, buf).await.unwrap();
        assert_eq!((login.code.as_str(), login.data.as_str()), ("005", "user"));
        device_out.write_all(&encode("500", "005")).await.unwrap();
        device_out.write_all(&encode("505", "1")).await.unwrap();
        let keep_alive = next_frame(device_in, buf).await.unwrap();
        assert_eq!((keep_alive.code.as_str(), keep_alive.data.as_str()), ("056", "1"));
        device_out.write_all(&encode("500", "056")).await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_success() {
        let (reader, writer, mut device_in, mut device_out) = pipes();
        let device = tokio::spawn(async move {
            let mut buf = BytesMut::new();
            device_login(&mut device_in, &mut device_out, &mut buf).await;
            (device_in, device_out)
        });

        let (session, _events) = Session::handshake(reader, writer, test_config())
            .await
            .unwrap();
        let _device = device.await.unwrap();

        assert!(session.is_connected().await);
        assert!(session.is_listening());
        assert_eq!(session.state().await, ConnectionState::Streaming);
    }

    #[tokio::test]
    async fn test_handshake_wrong_prompt() {
        let (reader, writer, mut device_in, mut device_out) = pipes();
        device_out.write_all(&encode("500", "000")).await.unwrap();

        let err = Session::handshake(reader, writer, test_config())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            TpiError::Login(LoginError::UnexpectedPrompt { .. })
        ));

        // The client side is gone
        let mut rest = Vec::new();
        device_in.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_handshake_bad_password() {
        let (reader, writer, mut device_in, mut device_out) = pipes();
        let device = tokio::spawn(async move {
            let mut buf = BytesMut::new();
            device_out.write_all(&encode("505", "3")).await.unwrap();
            next_frame(&mut device_in, &mut buf).await.unwrap();
            device_out.write_all(&encode("500", "005")).await.unwrap();
            device_out.write_all(&encode("505", "0")).await.unwrap();
            device_out
        });

        let err = Session::handshake(reader, writer, test_config())
            .await
            .err()
            .unwrap();
        assert!(err.is_bad_credentials());
        assert!(!err.is_retryable());
        let _device = device.await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let (reader, writer, _device_in, _device_out) = pipes();
        let err = Session::handshake(reader, writer, test_config())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            TpiError::Login(LoginError::Timeout { step: LoginStep::Prompt })
        ));
    }

    #[tokio::test]
    async fn test_handshake_keep_alive_not_acknowledged() {
        let (reader, writer, mut device_in, mut device_out) = pipes();
        let device = tokio::spawn(async move {
            let mut buf = BytesMut::new();
            device_out.write_all(&encode("505", "3")).await.unwrap();
            next_frame(&mut device_in, &mut buf).await.unwrap();
            device_out.write_all(&encode("500", "005")).await.unwrap();
            device_out.write_all(&encode("505", "1")).await.unwrap();
            next_frame(&mut device_in, &mut buf).await.unwrap();
            device_out.write_all(&encode("502", "020")).await.unwrap();
            device_out
        });

        let err = Session::handshake(reader, writer, test_config())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            TpiError::Login(LoginError::KeepAliveNotAcknowledged { .. })
        ));
        let _device = device.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_listener() {
        let (reader, writer, mut device_in, mut device_out) = pipes();
        let device = tokio::spawn(async move {
            let mut buf = BytesMut::new();
            device_login(&mut device_in, &mut device_out, &mut buf).await;

            // Acknowledge the broadcast disable, then read until the client closes
            let stop = next_frame(&mut device_in, &mut buf).await.unwrap();
            assert_eq!((stop.code.as_str(), stop.data.as_str()), ("056", "0"));
            device_out.write_all(&encode("500", "056")).await.unwrap();
            assert!(next_frame(&mut device_in, &mut buf).await.is_none());
            device_out
        });

        let (mut session, mut events) = Session::handshake(reader, writer, test_config())
            .await
            .unwrap();
        session.shutdown().await.unwrap();

        assert!(!session.is_listening());
        assert_eq!(session.state().await, ConnectionState::Disconnected);
        assert!(events.recv().await.is_none());
        let _device = device.await.unwrap();

        let err = session.status_report().await.unwrap_err();
        assert!(matches!(err, TpiError::Disconnected));
    }

    #[tokio::test]
    async fn test_close_without_handshake() {
        let (reader, writer, mut device_in, mut device_out) = pipes();
        let device = tokio::spawn(async move {
            let mut buf = BytesMut::new();
            device_login(&mut device_in, &mut device_out, &mut buf).await;
            assert!(next_frame(&mut device_in, &mut buf).await.is_none());
            device_out
        });

        let (mut session, _events) = Session::handshake(reader, writer, test_config())
            .await
            .unwrap();
        session.close().await;
        assert!(!session.is_listening());
        assert!(!session.is_connected().await);
        let _device = device.await.unwrap();
    }

    #[tokio::test]
    async fn test_convenience_commands_on_wire() {
        let (reader, writer, mut device_in, mut device_out) = pipes();
        let device = tokio::spawn(async move {
            let mut buf = BytesMut::new();
            device_login(&mut device_in, &mut device_out, &mut buf).await;
            let mut seen = Vec::new();
            for _ in 0..3 {
                let f = next_frame(&mut device_in, &mut buf).await.unwrap();
                seen.push(format!("{}{}", f.code, f.data));
            }
            (seen, device_out)
        });

        let (session, _events) = Session::handshake(reader, writer, test_config())
            .await
            .unwrap();
        session.arm_stay(1).await.unwrap();
        session.disarm(1, "1234").await.unwrap();
        session.dump_bypassed_zones(1).await.unwrap();

        let (seen, _device_out) = device.await.unwrap();
        assert_eq!(seen, vec!["0311", "04011234", "0711*1#"]);
    }
}
