//! Connection strategy: which channel to try, in what order, and when to stop.

use crate::config::{ConnectionMode, RelayConfig};
use crate::decision::DecisionReply;
use crate::discovery::Resolver;
use crate::event::EventRecord;
use crate::ipc::socket_client::UnixChannel;
use crate::ipc::tcp_client::TcpDialer;
use crate::ipc::{Channel, Dialer};
use crate::trust;

/// A place the relay can send an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Local,
    Remote,
}

impl ConnectionMode {
    /// Routes tried for this mode, in order.
    pub fn routes(self) -> &'static [Route] {
        match self {
            ConnectionMode::Socket => &[Route::Local],
            ConnectionMode::Tcp => &[Route::Remote],
            ConnectionMode::Auto => &[Route::Local, Route::Remote],
        }
    }
}

/// Outcome of trying one route.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Stop here with this result.
    Final(Option<DecisionReply>),
    /// Try the next route.
    FallThrough,
}

/// Sends events to the companion app over the configured routes.
///
/// Never fails: every transport, auth, or decode problem is logged at debug
/// level and turned into "no decision".
pub struct Relay {
    config: RelayConfig,
    resolver: Resolver,
    local: Box<dyn Channel>,
    dialer: Box<dyn Dialer>,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        let resolver = Resolver::from_config(&config);
        let local = Box::new(UnixChannel::new(
            config.socket_path.clone(),
            config.response_timeout,
        ));
        let dialer = Box::new(TcpDialer::new(
            config.token.clone(),
            config.response_timeout,
        ));
        Self::with_parts(config, resolver, local, dialer)
    }

    pub fn with_parts(
        config: RelayConfig,
        resolver: Resolver,
        local: Box<dyn Channel>,
        dialer: Box<dyn Dialer>,
    ) -> Self {
        Self {
            config,
            resolver,
            local,
            dialer,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Serialize and send `event`. Returns the companion's decision when
    /// `await_reply` is set and one arrives.
    pub async fn dispatch(&self, event: &EventRecord, await_reply: bool) -> Option<DecisionReply> {
        tracing::debug!(mode = %self.config.mode, event = %event.event, "dispatching");
        let payload = match event.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!("event encode error: {}", e);
                return None;
            }
        };
        self.dispatch_payload(&payload, await_reply).await
    }

    /// Send an already-serialized event over the routes for the configured mode.
    pub async fn dispatch_payload(&self, payload: &[u8], await_reply: bool) -> Option<DecisionReply> {
        let routes = self.config.mode.routes();
        for (idx, route) in routes.iter().enumerate() {
            let has_fallback = idx + 1 < routes.len();
            let step = match route {
                Route::Local => self.try_local(payload, await_reply, has_fallback).await,
                Route::Remote => self.try_remote(payload, await_reply).await,
            };
            if let Step::Final(reply) = step {
                return reply;
            }
        }
        None
    }

    async fn try_local(&self, payload: &[u8], await_reply: bool, has_fallback: bool) -> Step {
        if has_fallback && !self.local.is_present() {
            tracing::debug!("local socket absent, skipping");
            return Step::FallThrough;
        }

        let reply = attempt(self.local.as_ref(), payload, await_reply).await;
        // A present socket that gave no decision still lets remote have a go.
        if reply.is_some() || !await_reply || !has_fallback {
            Step::Final(reply)
        } else {
            Step::FallThrough
        }
    }

    async fn try_remote(&self, payload: &[u8], await_reply: bool) -> Step {
        let endpoint = self.resolver.resolve().await;
        if !trust::remote_eligible(&endpoint.host, self.config.token.as_deref()) {
            tracing::debug!(
                "not trying tcp to {}: no token and not an overlay address",
                endpoint
            );
            return Step::Final(None);
        }

        let channel = self.dialer.dial(&endpoint);
        Step::Final(attempt(channel.as_ref(), payload, await_reply).await)
    }
}

/// One send over `channel`, with errors and bad replies folded into `None`.
async fn attempt(channel: &dyn Channel, payload: &[u8], await_reply: bool) -> Option<DecisionReply> {
    let bytes = match channel.send(payload, await_reply).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::debug!("{} send successful", channel.name());
            return None;
        }
        Err(e) => {
            tracing::debug!("{} error: {}", channel.name(), e);
            return None;
        }
    };

    match DecisionReply::from_slice(&bytes) {
        Ok(reply) => Some(reply),
        Err(e) => {
            tracing::debug!("{} reply decode error: {}", channel.name(), e);
            None
        }
    }
}
