// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Client construction configuration.
//!
//! Mirrors the constructor-parameter shape of `BybitWebSocketClient::new_public`
//! (url + heartbeat as plain `Option` fields rather than a derive-builder
//! crate) while carrying the reconnect-backoff fields `WebSocketConfig`
//! exposes to its own `connect()` call.

use std::time::Duration;

use crate::transport::framed::BackoffConfig;

/// Which Bayeux connection type a client prefers on its first handshake.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportKind {
    /// Persistent socket, Bayeux connection type `"websocket"`.
    Framed,
    /// HTTP long-polling, Bayeux connection type `"long-polling"`.
    Polling,
}

impl TransportKind {
    #[must_use]
    pub fn as_connection_type(self) -> &'static str {
        match self {
            Self::Framed => "websocket",
            Self::Polling => "long-polling",
        }
    }
}

/// Construction-time configuration for [`crate::client::FayeClient`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Server URL. Scheme is upgraded (`http`→`ws`, `https`→`wss`) when a
    /// framed transport is built against it.
    pub url: String,

    /// Preferred Bayeux connection type, negotiated at handshake time.
    pub preferred_transport: TransportKind,

    /// Overall timeout for the `connect()` operation.
    pub connect_timeout: Duration,

    /// Per-request timeout used by `Transport::send`.
    pub send_timeout: Duration,

    /// Framed-transport heartbeat interval. `None` disables heartbeats.
    pub heartbeat: Option<Duration>,

    /// Reconnect backoff parameters for the framed transport.
    pub backoff: BackoffConfig,
}

impl ClientConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            preferred_transport: TransportKind::Framed,
            connect_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(30),
            heartbeat: Some(Duration::from_secs(20)),
            backoff: BackoffConfig::default(),
        }
    }

    #[must_use]
    pub fn with_preferred_transport(mut self, kind: TransportKind) -> Self {
        self.preferred_transport = kind;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: Option<Duration>) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Rewrites `http(s)://` to `ws(s)://`, leaving an already-`ws(s)://` URL
    /// untouched. Falls back to the raw configured URL if it does not parse
    /// (the framed transport's own `connect()` will then surface the error).
    #[must_use]
    pub fn websocket_url(&self) -> String {
        let Ok(mut parsed) = url::Url::parse(&self.url) else {
            return self.url.clone();
        };
        let scheme = match parsed.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => other,
        };
        if parsed.set_scheme(scheme).is_err() {
            return self.url.clone();
        }
        parsed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_url_upgrades_scheme() {
        let config = ClientConfig::new("https://example.com/faye");
        assert_eq!(config.websocket_url(), "wss://example.com/faye");

        let config = ClientConfig::new("http://example.com/faye");
        assert_eq!(config.websocket_url(), "ws://example.com/faye");

        let config = ClientConfig::new("ws://example.com/faye");
        assert_eq!(config.websocket_url(), "ws://example.com/faye");
    }

    #[test]
    fn builder_methods_override_defaults() {
        let config = ClientConfig::new("ws://example.com/faye")
            .with_preferred_transport(TransportKind::Polling)
            .with_heartbeat(None);
        assert_eq!(config.preferred_transport, TransportKind::Polling);
        assert!(config.heartbeat.is_none());
    }
}
