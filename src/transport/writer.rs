// MIT License - Copyright (c) 2021 TJForc
// Frame writer

use tokio::io::AsyncWriteExt;
use tokio::time::{timeout, Duration};
use tracing::{debug, error};

use crate::error::{Result, TpiError};
use crate::transport::BoxedWriter;

/// Write half of the connection.
///
/// A failed or timed-out write closes the writer; later sends return
/// [`TpiError::Disconnected`]. Nothing is retried here.
pub struct FrameWriter {
    writer: Option<BoxedWriter>,
    write_timeout: Duration,
}

impl FrameWriter {
    pub fn new(writer: BoxedWriter, write_timeout: Duration) -> Self {
        Self {
            writer: Some(writer),
            write_timeout,
        }
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Write a complete encoded frame.
    pub async fn send(&mut self, frame: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(TpiError::Disconnected)?;

        let result = timeout(self.write_timeout, async {
            writer.write_all(frame).await?;
            writer.flush().await
        })
        .await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Connection to device unexpectedly closed: {}", e);
                self.close().await;
                Err(TpiError::Io(e))
            }
            Err(_) => {
                error!("Unable to communicate with device - connection closed");
                self.close().await;
                Err(TpiError::WriteTimeout)
            }
        }
    }

    /// Shut down the write half. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            debug!("Closing connection");
            if let Ok(Err(e)) = timeout(self.write_timeout, writer.shutdown()).await {
                debug!("Error shutting down writer: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_send_and_close() {
        let (client, mut device) = tokio::io::duplex(64);
        let mut writer = FrameWriter::new(Box::new(client), Duration::from_secs(1));

        writer.send(b"00191\r\n").await.unwrap();
        writer.close().await;
        assert!(!writer.is_open());

        let mut received = Vec::new();
        device.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"00191\r\n");

        let err = writer.send(b"00191\r\n").await.unwrap_err();
        assert!(matches!(err, TpiError::Disconnected));
    }

    #[tokio::test]
    async fn test_write_timeout_closes() {
        // Nobody drains the device side, so a write larger than the pipe stalls
        let (client, _device) = tokio::io::duplex(4);
        let mut writer = FrameWriter::new(Box::new(client), Duration::from_millis(50));

        let err = writer.send(b"0711*1#4B\r\n").await.unwrap_err();
        assert!(matches!(err, TpiError::WriteTimeout));
        assert!(!writer.is_open());
    }

    #[tokio::test]
    async fn test_write_to_dropped_peer() {
        let (client, device) = tokio::io::duplex(64);
        drop(device);
        let mut writer = FrameWriter::new(Box::new(client), Duration::from_secs(1));

        let err = writer.send(b"00191\r\n").await.unwrap_err();
        assert!(matches!(err, TpiError::Io(_)));
        assert!(!writer.is_open());
    }
}
