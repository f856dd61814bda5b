// MIT License - Copyright (c) 2021 TJForc
// Serialized command sending

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::codec;
use crate::constants::outbound;
use crate::error::{Result, TpiError};
use crate::protocol::{validate_frame_fields, Command};
use crate::transport::FrameWriter;

struct DispatchState {
    writer: FrameWriter,
    last_sent: Option<String>,
    stop_requested: bool,
}

/// Serializes writes to the device.
///
/// The session, the caller and the listener all send through one
/// dispatcher. Each send holds the lock for exactly one frame write; the
/// lock is never held while waiting for a reply.
pub struct CommandDispatcher {
    state: Mutex<DispatchState>,
    lock_timeout: Duration,
}

impl CommandDispatcher {
    pub fn new(writer: FrameWriter, lock_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(DispatchState {
                writer,
                last_sent: None,
                stop_requested: false,
            }),
            lock_timeout,
        }
    }

    async fn lock(&self) -> Result<MutexGuard<'_, DispatchState>> {
        timeout(self.lock_timeout, self.state.lock())
            .await
            .map_err(|_| {
                warn!("Timed out waiting for the send lock");
                TpiError::LockTimeout
            })
    }

    /// Send a raw command code and data payload.
    pub async fn send_command(&self, code: &str, data: &str) -> Result<()> {
        validate_frame_fields(code, data)?;
        let frame = codec::encode(code, data);

        let mut state = self.lock().await?;
        debug!("Sending: code {}, data {}", code, data);
        state.writer.send(&frame).await?;
        state.last_sent = Some(code.to_string());
        Ok(())
    }

    /// Send a typed command.
    pub async fn send(&self, command: &Command) -> Result<()> {
        command.validate()?;
        self.send_command(command.code(), &command.data()).await
    }

    /// Code of the last command written, if any.
    pub async fn last_sent(&self) -> Option<String> {
        self.state.lock().await.last_sent.clone()
    }

    /// Whether [`request_stop`](Self::request_stop) has been sent.
    pub async fn stop_requested(&self) -> bool {
        self.state.lock().await.stop_requested
    }

    /// Disable time broadcasts. The device acknowledges with `500`/`056`,
    /// which tells the listener to exit.
    pub async fn request_stop(&self) -> Result<()> {
        let frame = codec::encode(outbound::TIME_BROADCAST_CONTROL, "0");

        let mut state = self.lock().await?;
        debug!("Disabling time broadcasts");
        state.stop_requested = true;
        state.writer.send(&frame).await?;
        state.last_sent = Some(outbound::TIME_BROADCAST_CONTROL.to_string());
        Ok(())
    }

    /// Close the write half, waiting at most the lock timeout.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.lock().await?;
        state.writer.close().await;
        Ok(())
    }

    /// Close the write half regardless of pending sends.
    pub async fn force_close(&self) {
        self.state.lock().await.writer.close().await;
    }

    pub async fn is_open(&self) -> bool {
        self.state.lock().await.writer.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_next;
    use bytes::BytesMut;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    fn dispatcher(buffer: usize) -> (Arc<CommandDispatcher>, tokio::io::DuplexStream) {
        let (client, device) = tokio::io::duplex(buffer);
        let writer = FrameWriter::new(Box::new(client), Duration::from_secs(5));
        (
            Arc::new(CommandDispatcher::new(writer, Duration::from_secs(5))),
            device,
        )
    }

    #[tokio::test]
    async fn test_send_records_last_sent() {
        let (dispatcher, mut device) = dispatcher(64);
        assert_eq!(dispatcher.last_sent().await, None);

        dispatcher.send_command("001", "").await.unwrap();
        assert_eq!(dispatcher.last_sent().await.as_deref(), Some("001"));

        let mut buf = [0u8; 7];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"00191\r\n");
    }

    #[tokio::test]
    async fn test_invalid_commands_rejected() {
        let (dispatcher, _device) = dispatcher(64);
        let err = dispatcher.send_command("1", "").await.unwrap_err();
        assert!(matches!(err, TpiError::InvalidCommand { .. }));
        let err = dispatcher.send_command("071", "1\r\n").await.unwrap_err();
        assert!(matches!(err, TpiError::InvalidCommand { .. }));
        let err = dispatcher
            .send(&Command::ArmAway { partition: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, TpiError::InvalidCommand { .. }));
        assert_eq!(dispatcher.last_sent().await, None);
    }

    #[tokio::test]
    async fn test_concurrent_sends_do_not_interleave() {
        // An 8-byte pipe forces every frame through several partial writes
        let (dispatcher, mut device) = dispatcher(8);

        let mut tasks = Vec::new();
        for i in 0..20u32 {
            let dispatcher = dispatcher.clone();
            tasks.push(tokio::spawn(async move {
                let keys = format!("{}", 100000 + i);
                dispatcher.send_command("071", &keys).await.unwrap();
            }));
        }

        let reader = tokio::spawn(async move {
            let mut buf = BytesMut::new();
            let mut frames = Vec::new();
            while frames.len() < 20 {
                let mut chunk = [0u8; 16];
                let n = device.read(&mut chunk).await.unwrap();
                assert!(n > 0);
                buf.extend_from_slice(&chunk[..n]);
                while let Some(frame) = decode_next(&mut buf) {
                    frames.push(frame);
                }
            }
            frames
        });

        for task in tasks {
            task.await.unwrap();
        }
        let frames = reader.await.unwrap();

        let mut payloads: Vec<_> = frames
            .iter()
            .map(|f| {
                assert_eq!(f.code, "071");
                assert!(f.checksum_matches());
                f.data.clone()
            })
            .collect();
        payloads.sort();
        let expected: Vec<_> = (0..20u32).map(|i| format!("{}", 100000 + i)).collect();
        assert_eq!(payloads, expected);
    }

    #[tokio::test]
    async fn test_request_stop() {
        let (dispatcher, mut device) = dispatcher(64);
        assert!(!dispatcher.stop_requested().await);

        dispatcher.request_stop().await.unwrap();
        assert!(dispatcher.stop_requested().await);
        assert_eq!(dispatcher.last_sent().await.as_deref(), Some("056"));

        dispatcher.close().await.unwrap();
        assert!(!dispatcher.is_open().await);

        let mut received = Vec::new();
        device.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, codec::encode("056", "0").to_vec());
    }

    #[tokio::test]
    async fn test_lock_timeout() {
        let (client, _device) = tokio::io::duplex(64);
        let writer = FrameWriter::new(Box::new(client), Duration::from_secs(5));
        let dispatcher = CommandDispatcher::new(writer, Duration::from_millis(20));

        let _held = dispatcher.state.lock().await;
        let err = dispatcher.send_command("001", "").await.unwrap_err();
        assert!(matches!(err, TpiError::LockTimeout));
    }

    #[tokio::test]
    async fn test_send_after_close() {
        let (dispatcher, _device) = dispatcher(64);
        dispatcher.force_close().await;
        let err = dispatcher.send_command("001", "").await.unwrap_err();
        assert!(matches!(err, TpiError::Disconnected));
    }
}
