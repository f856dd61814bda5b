// MIT License - Copyright (c) 2021 TJForc
// TCP transport

pub mod reader;
pub mod writer;

use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info};

use crate::error::{Result, TpiError};

pub use reader::{FrameReader, Incoming};
pub use writer::FrameWriter;

/// Read half of the connection. Boxed so the session and listener run
/// unchanged over TCP or in-memory streams.
pub type BoxedReader = Box<dyn tokio::io::AsyncRead + Send + Sync + Unpin>;

/// Write half of the connection.
pub type BoxedWriter = Box<dyn tokio::io::AsyncWrite + Send + Unpin>;

/// Open a TCP connection to the device, bounded by `connect_timeout`.
pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<TcpStream> {
    let addr = format!("{}:{}", host, port);
    info!("Connecting to EnvisaLink at {}", addr);

    match timeout(connect_timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Unable to set TCP_NODELAY: {}", e);
            }
            debug!("TCP socket connected");
            Ok(stream)
        }
        Ok(Err(source)) => {
            error!("Socket error on connect: {}", source);
            Err(TpiError::Connect { addr, source })
        }
        Err(_) => {
            error!("Timed out connecting to {}", addr);
            Err(TpiError::ConnectTimeout { addr })
        }
    }
}

/// Split a stream into a frame reader and a frame writer.
pub fn split<S>(stream: S, read_timeout: Duration, write_timeout: Duration) -> (FrameReader, FrameWriter)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Sync + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    (
        FrameReader::new(Box::new(reader), read_timeout),
        FrameWriter::new(Box::new(writer), write_timeout),
    )
}
