//! Test utilities for driving a fake ADB server over TCP
//!
//! Provides a minimal adb client that speaks the host protocol, so tests can
//! assert on the raw bytes a server sends back.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use fakeadb_core::prelude::*;

use crate::protocol::{decode_length, encode_message, FAIL, OKAY};

/// Default timeout used by the `*_with_timeout` helpers in tests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Status word at the start of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Okay,
    Fail(String),
}

/// A single client connection to the server
pub struct AdbTestClient {
    stream: TcpStream,
}

impl AdbTestClient {
    /// Connect to a server listening on localhost
    pub async fn connect(port: u16) -> Result<Self> {
        let stream = TcpStream::connect(("127.0.0.1", port)).await?;
        Ok(Self { stream })
    }

    /// Connect, send one host service and return its length-prefixed payload
    pub async fn query(port: u16, service: &str) -> Result<String> {
        let mut client = Self::connect(port).await?;
        client.send(service).await?;
        client.expect_okay().await?;
        client.read_length_prefixed().await
    }

    /// Send a length-prefixed service request
    pub async fn send(&mut self, service: &str) -> Result<()> {
        self.stream
            .write_all(&encode_message(service.as_bytes())?)
            .await?;
        Ok(())
    }

    /// Write raw bytes, e.g. a JDWP handshake or relay traffic
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    /// Read `OKAY` or `FAIL` (and the failure message)
    pub async fn read_status(&mut self) -> Result<Status> {
        let mut word = [0u8; 4];
        self.stream.read_exact(&mut word).await?;
        if &word == OKAY {
            Ok(Status::Okay)
        } else if &word == FAIL {
            Ok(Status::Fail(self.read_length_prefixed().await?))
        } else {
            Err(Error::protocol(format!(
                "unexpected status {:?}",
                String::from_utf8_lossy(&word)
            )))
        }
    }

    /// Read a status and fail unless it is `OKAY`
    pub async fn expect_okay(&mut self) -> Result<()> {
        match self.read_status().await? {
            Status::Okay => Ok(()),
            Status::Fail(message) => Err(Error::protocol(format!("FAIL: {}", message))),
        }
    }

    /// Read a status and return the message if it is `FAIL`
    pub async fn expect_fail(&mut self) -> Result<String> {
        match self.read_status().await? {
            Status::Fail(message) => Ok(message),
            Status::Okay => Err(Error::protocol("expected FAIL, got OKAY")),
        }
    }

    /// Read one four-hex-digit length and that many bytes
    pub async fn read_length_prefixed(&mut self) -> Result<String> {
        let mut prefix = [0u8; 4];
        self.stream.read_exact(&mut prefix).await?;
        let len = decode_length(&prefix)?;
        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).await?;
        String::from_utf8(payload).map_err(|_| Error::protocol("payload is not valid UTF-8"))
    }

    /// Like [`read_length_prefixed`](Self::read_length_prefixed), but gives
    /// up after `duration`. Returns `Ok(None)` on timeout.
    pub async fn read_length_prefixed_with_timeout(
        &mut self,
        duration: Duration,
    ) -> Result<Option<String>> {
        match timeout(duration, self.read_length_prefixed()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Read exactly `len` raw bytes
    pub async fn read_exact_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Read whatever raw bytes arrive next, waiting at most `duration`
    pub async fn read_some_with_timeout(&mut self, duration: Duration) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; 4096];
        match timeout(duration, self.stream.read(&mut buf)).await {
            Ok(read) => {
                let n = read?;
                buf.truncate(n);
                Ok(Some(buf))
            }
            Err(_) => Ok(None),
        }
    }

    /// Read until the server closes the connection
    pub async fn read_to_end(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        self.stream.read_to_end(&mut buf).await?;
        String::from_utf8(buf).map_err(|_| Error::protocol("stream is not valid UTF-8"))
    }

    /// Whether the server closes the connection within `duration`
    ///
    /// Any data received while waiting counts as "not closed".
    pub async fn is_closed_within(&mut self, duration: Duration) -> bool {
        let mut buf = [0u8; 1];
        matches!(
            timeout(duration, self.stream.read(&mut buf)).await,
            Ok(Ok(0)) | Ok(Err(_))
        )
    }
}
