use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UnixStream;

use crate::error::{RelayError, Result};
use crate::ipc::{deliver, within, Channel};

/// Unix socket channel to a companion app on the same machine.
pub struct UnixChannel {
    socket_path: PathBuf,
    timeout: Duration,
}

impl UnixChannel {
    pub fn new(socket_path: PathBuf, timeout: Duration) -> Self {
        Self {
            socket_path,
            timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

#[async_trait]
impl Channel for UnixChannel {
    fn name(&self) -> &'static str {
        "unix socket"
    }

    fn is_present(&self) -> bool {
        self.socket_path.exists()
    }

    async fn send(&self, payload: &[u8], await_reply: bool) -> Result<Option<Vec<u8>>> {
        if !self.socket_path.exists() {
            return Err(RelayError::SocketNotFound {
                path: self.socket_path.clone(),
            });
        }

        tracing::debug!("connecting via unix socket: {}", self.socket_path.display());
        within("unix socket exchange", self.timeout, async {
            let mut stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
                RelayError::Ipc {
                    reason: format!("connect failed: {}", e),
                }
            })?;
            deliver(&mut stream, payload, await_reply).await
        })
        .await
    }
}
