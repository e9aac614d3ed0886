pub mod auth;
pub mod socket_client;
pub mod tcp_client;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{RelayError, Result};

/// Replies are read in a single receive into a buffer of this size.
pub const REPLY_BUFFER_SIZE: usize = 4096;

/// A TCP host and port for the companion app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One way of reaching the companion app.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the channel's address exists right now. Channels without a
    /// cheap presence check report `true`.
    fn is_present(&self) -> bool {
        true
    }

    /// Send `payload` and, if `await_reply`, return whatever the peer answers
    /// in one bounded read. `Ok(None)` means the payload went out but no reply
    /// bytes came back.
    async fn send(&self, payload: &[u8], await_reply: bool) -> Result<Option<Vec<u8>>>;
}

/// Builds a remote channel once the endpoint is known.
pub trait Dialer: Send + Sync {
    fn dial(&self, endpoint: &Endpoint) -> Box<dyn Channel>;
}

/// Write the payload, then optionally read a single reply.
///
/// No framing: the payload is written as-is and the reply is whatever one
/// read returns, capped at [`REPLY_BUFFER_SIZE`].
pub async fn deliver<S>(stream: &mut S, payload: &[u8], await_reply: bool) -> Result<Option<Vec<u8>>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(payload)
        .await
        .map_err(|e| RelayError::Ipc {
            reason: format!("write failed: {}", e),
        })?;

    if !await_reply {
        if let Err(e) = stream.shutdown().await {
            tracing::debug!("shutdown after send failed: {}", e);
        }
        return Ok(None);
    }

    tracing::debug!("waiting for response");
    let mut buf = vec![0u8; REPLY_BUFFER_SIZE];
    let n = stream.read(&mut buf).await.map_err(|e| RelayError::Ipc {
        reason: format!("read failed: {}", e),
    })?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    tracing::debug!("received response: {}", String::from_utf8_lossy(&buf));
    Ok(Some(buf))
}

/// Run `fut` with an upper bound, mapping expiry to [`RelayError::Timeout`].
pub(crate) async fn within<T, F>(operation: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::Timeout {
            operation,
            after: limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_deliver_reads_single_reply() {
        let mut stream = Builder::new()
            .write(br#"{"event":"PermissionRequest"}"#)
            .read(br#"{"decision":"allow"}"#)
            .build();

        let reply = deliver(&mut stream, br#"{"event":"PermissionRequest"}"#, true)
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some(&br#"{"decision":"allow"}"#[..]));
    }

    #[tokio::test]
    async fn test_deliver_without_reply_skips_read() {
        let mut stream = Builder::new().write(b"{}").build();
        let reply = deliver(&mut stream, b"{}", false).await.unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_deliver_closed_before_reply() {
        let mut stream = Builder::new().write(b"{}").build();
        let reply = deliver(&mut stream, b"{}", true).await.unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_within_maps_expiry_to_timeout() {
        let result: Result<()> = within("probe", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            result,
            Err(RelayError::Timeout {
                operation: "probe",
                ..
            })
        ));
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::new("100.64.0.1", 4851).to_string(), "100.64.0.1:4851");
    }
}
