use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::error::{RelayError, Result};
use crate::ipc::auth::{self, GREETING_WAIT};
use crate::ipc::{deliver, within, Channel, Dialer, Endpoint};

/// TCP channel to a companion app, possibly on another machine.
pub struct TcpChannel {
    endpoint: Endpoint,
    token: Option<String>,
    timeout: Duration,
}

impl TcpChannel {
    pub fn new(endpoint: Endpoint, token: Option<String>, timeout: Duration) -> Self {
        Self {
            endpoint,
            token,
            timeout,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl Channel for TcpChannel {
    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn send(&self, payload: &[u8], await_reply: bool) -> Result<Option<Vec<u8>>> {
        tracing::debug!("connecting via tcp: {}", self.endpoint);
        within("tcp exchange", self.timeout, async {
            let mut stream = TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port))
                .await
                .map_err(|e| RelayError::Ipc {
                    reason: format!("connect to {} failed: {}", self.endpoint, e),
                })?;

            let trust = auth::negotiate(
                &mut stream,
                &self.endpoint.host,
                self.token.as_deref(),
                GREETING_WAIT,
            )
            .await?;
            tracing::debug!(?trust, "sending event payload");

            deliver(&mut stream, payload, await_reply).await
        })
        .await
    }
}

/// Builds [`TcpChannel`]s sharing one token and timeout.
pub struct TcpDialer {
    token: Option<String>,
    timeout: Duration,
}

impl TcpDialer {
    pub fn new(token: Option<String>, timeout: Duration) -> Self {
        Self { token, timeout }
    }
}

impl Dialer for TcpDialer {
    fn dial(&self, endpoint: &Endpoint) -> Box<dyn Channel> {
        Box::new(TcpChannel::new(
            endpoint.clone(),
            self.token.clone(),
            self.timeout,
        ))
    }
}
