// MIT License - Copyright (c) 2021 TJForc
// Buffered frame reader

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::time::{timeout_at, Duration, Instant};
use tracing::{debug, error, trace};

use crate::codec::{decode_next, Frame};
use crate::error::{Result, TpiError};
use crate::transport::BoxedReader;

const READ_CHUNK: usize = 1024;

/// Outcome of a single [`FrameReader::receive_frame`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A complete frame
    Frame(Frame),
    /// No complete frame arrived within the read timeout
    Timeout,
    /// The peer closed the stream
    Closed,
}

/// Reads frames from the device.
///
/// Owns the receive buffer: a single socket read may deliver a partial frame
/// or several frames, so unconsumed bytes carry over between calls.
pub struct FrameReader {
    reader: BoxedReader,
    buffer: BytesMut,
    timeout: Duration,
}

impl FrameReader {
    pub fn new(reader: BoxedReader, timeout: Duration) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            timeout,
        }
    }

    /// Change the read timeout (login vs. steady-state).
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Return the next frame, reading from the stream as needed.
    pub async fn receive_frame(&mut self) -> Result<Incoming> {
        let deadline = Instant::now() + self.timeout;

        loop {
            if let Some(frame) = decode_next(&mut self.buffer) {
                debug!("Received: code {}, data {}", frame.code, frame.data);
                return Ok(Incoming::Frame(frame));
            }

            self.buffer.reserve(READ_CHUNK);
            match timeout_at(deadline, self.reader.read_buf(&mut self.buffer)).await {
                Err(_) => {
                    trace!("Read timed out with {} bytes buffered", self.buffer.len());
                    return Ok(Incoming::Timeout);
                }
                Ok(Ok(0)) => {
                    debug!("Connection closed by device");
                    return Ok(Incoming::Closed);
                }
                Ok(Ok(n)) => trace!("Read {} bytes", n),
                Ok(Err(e)) => {
                    error!("Read error: {}", e);
                    return Err(TpiError::Io(e));
                }
            }
        }
    }
}
