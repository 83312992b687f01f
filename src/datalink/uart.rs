//! Serial (UART) DataLink backend: any duplex byte stream, with framing
//! left to the Network tier above, §4.1.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::DataLinkBackend;

const READ_CHUNK: usize = 4096;

/// Wraps any `AsyncRead + AsyncWrite` duplex stream as a DataLink backend.
/// No physical serial port is opened here — this crate treats UART as a
/// capability interface over a generic byte stream, consistent with the
/// "pluggable byte transport" framing of the core (§1).
pub struct UartBackend<S> {
    stream: S,
    read_buf: Vec<u8>,
}

impl<S> UartBackend<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        UartBackend {
            stream,
            read_buf: vec![0u8; READ_CHUNK],
        }
    }
}

#[async_trait]
impl<S> DataLinkBackend for UartBackend<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, bytes: Vec<u8>) -> bool {
        self.stream.write_all(&bytes).await.is_ok()
    }

    async fn receive(&mut self) -> Option<Vec<u8>> {
        // Suspends until bytes arrive rather than spinning; the pump worker
        // yields here instead of busy-polling an idle UART.
        match self.stream.read(&mut self.read_buf).await {
            Ok(0) | Err(_) => None,
            Ok(n) => Some(self.read_buf[..n].to_vec()),
        }
    }

    async fn stop(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn round_trips_bytes_over_a_duplex_stream() {
        let (client, server) = duplex(1024);
        let mut client_backend = UartBackend::new(client);
        let mut server_backend = UartBackend::new(server);

        assert!(client_backend.send(b"hello uart".to_vec()).await);
        let received = server_backend.receive().await.unwrap();
        assert_eq!(received, b"hello uart");
    }
}
