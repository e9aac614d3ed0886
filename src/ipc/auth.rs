//! Handshake for the TCP channel.
//!
//! A companion app in permissive mode greets trusted peers with `OK` right
//! after accepting. In locked-down mode it says nothing and waits for
//! `AUTH <token>\n`. The client cannot know which mode it faces, so it listens
//! for [`GREETING_WAIT`] first and only then speaks. A greeting delayed past
//! that bound is misread as "authenticate first"; servers must greet promptly.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{RelayError, Result};

/// Fixed wait for an unsolicited greeting.
pub const GREETING_WAIT: Duration = Duration::from_millis(500);

/// Greeting and auth success line.
pub const OK_LINE: &str = "OK";

const CHUNK_SIZE: usize = 64;

/// How the connection got past the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trust {
    /// The peer greeted us without asking for a token.
    PeerTrusted,
    /// We sent a token and the peer accepted it.
    Authenticated,
}

/// Run the greeting probe and, if needed, the `AUTH` exchange.
///
/// On `Ok` the stream is ready for the event payload.
pub async fn negotiate<S>(
    stream: &mut S,
    host: &str,
    token: Option<&str>,
    greeting_wait: Duration,
) -> Result<Trust>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if await_greeting(stream, greeting_wait).await? {
        tracing::debug!("auto-trusted by server");
        return Ok(Trust::PeerTrusted);
    }

    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Err(RelayError::MissingCredential {
            host: host.to_string(),
        });
    };

    authenticate(stream, token).await?;
    Ok(Trust::Authenticated)
}

/// True if the peer sent `OK` within `wait`.
async fn await_greeting<S>(stream: &mut S, wait: Duration) -> Result<bool>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; CHUNK_SIZE];
    match tokio::time::timeout(wait, stream.read(&mut buf)).await {
        // Silence: the peer expects us to speak first.
        Err(_) => Ok(false),
        Ok(Ok(n)) => Ok(String::from_utf8_lossy(&buf[..n]).trim() == OK_LINE),
        Ok(Err(e)) => Err(RelayError::Ipc {
            reason: format!("greeting read failed: {}", e),
        }),
    }
}

async fn authenticate<S>(stream: &mut S, token: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tracing::debug!("sending auth");
    let auth_line = format!("AUTH {}\n", token);
    stream
        .write_all(auth_line.as_bytes())
        .await
        .map_err(|e| RelayError::Ipc {
            reason: format!("auth write failed: {}", e),
        })?;

    let mut response = Vec::new();
    let mut chunk = [0u8; CHUNK_SIZE];
    while !response.contains(&b'\n') {
        let n = stream.read(&mut chunk).await.map_err(|e| RelayError::Ipc {
            reason: format!("auth read failed: {}", e),
        })?;
        if n == 0 {
            return Err(RelayError::AuthClosed);
        }
        response.extend_from_slice(&chunk[..n]);
    }

    let response = String::from_utf8_lossy(&response);
    let response = response.trim();
    tracing::debug!("auth response: {}", response);
    if response != OK_LINE {
        return Err(RelayError::AuthRejected {
            response: response.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_greeting_skips_auth() {
        let mut stream = Builder::new().read(b"OK\n").build();
        let trust = negotiate(&mut stream, "100.64.0.1", None, GREETING_WAIT)
            .await
            .unwrap();
        assert_eq!(trust, Trust::PeerTrusted);
    }

    #[tokio::test]
    async fn test_authenticate_accepts_split_ok() {
        let mut stream = Builder::new()
            .write(b"AUTH s3cret\n")
            .read(b"O")
            .read(b"K\n")
            .build();
        authenticate(&mut stream, "s3cret").await.unwrap();
    }

    #[tokio::test]
    async fn test_authenticate_rejects_other_reply() {
        let mut stream = Builder::new()
            .write(b"AUTH wrong\n")
            .read(b"DENIED\n")
            .build();
        let err = authenticate(&mut stream, "wrong").await.unwrap_err();
        assert!(matches!(err, RelayError::AuthRejected { response } if response == "DENIED"));
    }

    #[tokio::test]
    async fn test_authenticate_eof_before_newline() {
        let mut stream = Builder::new().write(b"AUTH s3cret\n").read(b"OK").build();
        let err = authenticate(&mut stream, "s3cret").await.unwrap_err();
        assert!(matches!(err, RelayError::AuthClosed));
    }

    #[tokio::test]
    async fn test_non_ok_greeting_without_token_fails() {
        let mut stream = Builder::new().read(b"HELLO\n").build();
        let err = negotiate(&mut stream, "10.0.0.1", None, GREETING_WAIT)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::MissingCredential { host } if host == "10.0.0.1"));
    }
}
