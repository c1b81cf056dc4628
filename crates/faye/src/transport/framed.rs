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

//! WebSocket-backed [`Transport`], correlating responses by message `id`.
//!
//! Grounded on `crates/adapters/bybit/src/websocket/client.rs` (`Arc<RwLock<Option<_>>>`
//! inner socket, `AtomicBool` shutdown signal, one inbound-dispatch task reading
//! frames in a loop) and `crates/adapters/coinbase/src/websocket/client.rs`
//! (direct `tokio_tungstenite::connect_async` usage). `original_source/src/faye/transport/websocket.py`'s
//! `WebSocketTransport` simply reads "the next frame" after every send with
//! no id correlation; this transport instead keeps a pending-response table
//! keyed by outbound `id`, so `send` calls issued back to back resolve to the
//! right response even if the server interleaves pushes between them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::RwLock as StdRwLock;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::TransportError;
use crate::message::Message;
use crate::transport::{decode_envelope, InboundCallback, Transport};

const SUBPROTOCOL: &str = "faye-websocket";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

/// Reconnect backoff parameters, mirrored from the `WebSocketConfig` fields
/// the bybit/coinbase adapter clients pass into `WebSocketClient::connect`.
#[derive(Clone, Debug)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
            backoff_factor: 1.5,
            jitter_ms: 250,
        }
    }
}

/// WebSocket transport for the Bayeux framed connection type.
pub struct FramedTransport {
    url: String,
    heartbeat: Option<Duration>,
    send_timeout: Duration,
    sink: Arc<Mutex<Option<WsSink>>>,
    pending: Arc<DashMap<String, oneshot::Sender<Message>>>,
    inbound: Arc<StdRwLock<Option<InboundCallback>>>,
    signal: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    dispatch_task: RwLock<Option<tokio::task::JoinHandle<()>>>,
    heartbeat_task: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl FramedTransport {
    #[must_use]
    pub fn new(url: impl Into<String>, heartbeat: Option<Duration>, send_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            heartbeat,
            send_timeout,
            sink: Arc::new(Mutex::new(None)),
            pending: Arc::new(DashMap::new()),
            inbound: Arc::new(StdRwLock::new(None)),
            signal: Arc::new(AtomicBool::new(false)),
            connected: Arc::new(AtomicBool::new(false)),
            dispatch_task: RwLock::new(None),
            heartbeat_task: RwLock::new(None),
        }
    }

    async fn heartbeat_loop(interval: Duration, sink: Arc<Mutex<Option<WsSink>>>, signal: Arc<AtomicBool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if signal.load(Ordering::Relaxed) {
                break;
            }
            let mut guard = sink.lock().await;
            let Some(sink) = guard.as_mut() else { break };
            if sink.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                break;
            }
        }
    }

    /// Serializes writes onto the socket's sink half; the read half lives
    /// exclusively inside the dispatch task, so reads never contend with
    /// writes on a single lock (the pitfall of guarding one stream handle
    /// with one `RwLock` for both directions).
    async fn write_frame(&self, text: String) -> Result<(), TransportError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;
        sink.send(WsMessage::text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn dispatch_loop(
        mut stream: futures_util::stream::SplitStream<WsStream>,
        pending: Arc<DashMap<String, oneshot::Sender<Message>>>,
        inbound: Arc<StdRwLock<Option<InboundCallback>>>,
        signal: Arc<AtomicBool>,
        connected: Arc<AtomicBool>,
    ) {
        loop {
            if signal.load(Ordering::Relaxed) {
                break;
            }

            let next = stream.next().await;

            match next {
                Some(Ok(WsMessage::Text(text))) => {
                    match decode_envelope(&text) {
                        Ok(messages) => {
                            for message in messages {
                                Self::route_inbound(&pending, &inbound, message);
                            }
                        }
                        Err(err) => tracing::warn!(error = %err, "malformed frame from faye server"),
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    tracing::debug!(?frame, "faye websocket closed by peer");
                    break;
                }
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Binary(_) | WsMessage::Frame(_))) => {}
                Some(Err(err)) => {
                    tracing::error!(error = %err, "faye websocket frame error");
                    break;
                }
                None => break,
            }
        }
        connected.store(false, Ordering::Relaxed);
    }

    fn route_inbound(
        pending: &DashMap<String, oneshot::Sender<Message>>,
        inbound: &StdRwLock<Option<InboundCallback>>,
        message: Message,
    ) {
        if let Some(id) = message.id.clone() {
            if let Some((_, sender)) = pending.remove(&id) {
                let _ = sender.send(message);
                return;
            }
        }
        if let Some(callback) = inbound.read().expect("inbound lock poisoned").as_ref() {
            callback(message);
        }
    }
}

#[async_trait::async_trait]
impl Transport for FramedTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        use tokio_tungstenite::tungstenite::client::IntoClientRequest;

        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            SUBPROTOCOL
                .parse()
                .expect("static subprotocol token is a valid header value"),
        );

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (sink, read_half) = stream.split();

        {
            let mut guard = self.sink.lock().await;
            *guard = Some(sink);
        }
        self.signal.store(false, Ordering::Relaxed);
        self.connected.store(true, Ordering::Relaxed);

        let handle = tokio::spawn(Self::dispatch_loop(
            read_half,
            Arc::clone(&self.pending),
            Arc::clone(&self.inbound),
            Arc::clone(&self.signal),
            Arc::clone(&self.connected),
        ));
        *self.dispatch_task.write().await = Some(handle);

        if let Some(interval) = self.heartbeat {
            let handle = tokio::spawn(Self::heartbeat_loop(
                interval,
                Arc::clone(&self.sink),
                Arc::clone(&self.signal),
            ));
            *self.heartbeat_task.write().await = Some(handle);
        }

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.signal.store(true, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);

        {
            let mut guard = self.sink.lock().await;
            if let Some(mut sink) = guard.take() {
                let _ = sink.close().await;
            }
        }

        if let Some(handle) = self.dispatch_task.write().await.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.heartbeat_task.write().await.take() {
            handle.abort();
        }

        for entry in self.pending.iter() {
            tracing::debug!(id = %entry.key(), "dropping pending response on disconnect");
        }
        self.pending.clear();

        Ok(())
    }

    async fn send(&self, mut message: Message) -> Result<Message, TransportError> {
        if message.is_connect() && message.connection_type.is_none() {
            message.connection_type = Some("websocket".to_string());
        }

        let id = message
            .id
            .clone()
            .ok_or_else(|| TransportError::Protocol("outbound message missing id".to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);

        let text = crate::transport::encode_envelope(&message);
        if let Err(err) = self.write_frame(text).await {
            self.pending.remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(self.send_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(TransportError::Closed(
                "transport closed while awaiting response".to_string(),
            )),
            Err(_) => {
                self.pending.remove(&id);
                Err(TransportError::Timeout(id))
            }
        }
    }

    fn set_inbound_callback(&self, callback: InboundCallback) {
        *self.inbound.write().expect("inbound lock poisoned") = Some(callback);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_defaults_match_teacher_websocket_config() {
        let backoff = BackoffConfig::default();
        assert_eq!(backoff.initial_delay_ms, 500);
        assert_eq!(backoff.max_delay_ms, 5_000);
        assert!((backoff.backoff_factor - 1.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn send_before_connect_is_not_connected() {
        let transport = FramedTransport::new("ws://example.invalid/faye", None, Duration::from_secs(1));
        let err = transport.send(Message::new("/meta/handshake")).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }
}
