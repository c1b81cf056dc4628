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

//! HTTP long-polling [`Transport`], grounded on
//! `original_source/src/faye/transport/http.py` (`_poll_messages`/
//! `_poll_single_message`), re-expressed with a `tokio::task::JoinHandle`
//! plus a `tokio_util::sync::CancellationToken` in place of the Python
//! original's `asyncio.Task` + `task.cancel()` pair.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use std::sync::RwLock as StdRwLock;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::advice::Advice;
use crate::error::TransportError;
use crate::message::Message;
use crate::transport::framed::BackoffConfig;
use crate::transport::{InboundCallback, Transport};

const CONNECTION_TYPE: &str = "long-polling";

/// HTTP long-polling transport for the Bayeux connection type of the same
/// name.
pub struct PollingTransport {
    url: String,
    backoff: BackoffConfig,
    client: Mutex<Option<reqwest::Client>>,
    client_id: Arc<RwLock<Option<String>>>,
    advice: Arc<RwLock<Advice>>,
    inbound: Arc<StdRwLock<Option<InboundCallback>>>,
    cancellation: Mutex<Option<CancellationToken>>,
    poll_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    connected: AtomicBool,
}

impl PollingTransport {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_backoff(url, BackoffConfig::default())
    }

    #[must_use]
    pub fn with_backoff(url: impl Into<String>, backoff: BackoffConfig) -> Self {
        Self {
            url: url.into(),
            backoff,
            client: Mutex::new(None),
            client_id: Arc::new(RwLock::new(None)),
            advice: Arc::new(RwLock::new(Advice::default())),
            inbound: Arc::new(StdRwLock::new(None)),
            cancellation: Mutex::new(None),
            poll_task: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Exponential backoff with ceiling and jitter for consecutive poll
    /// failures. `original_source/src/faye/transport/http.py` instead
    /// backs off a flat one second on every poll error; this transport
    /// exposes the curve as policy via [`BackoffConfig`] so callers can
    /// tune it per deployment.
    fn error_backoff(backoff: &BackoffConfig, consecutive_errors: u32) -> Duration {
        let exponent = consecutive_errors.min(16);
        let scaled = backoff.initial_delay_ms as f64 * backoff.backoff_factor.powi(exponent as i32);
        let capped = (scaled as u64).min(backoff.max_delay_ms);
        let jitter = if backoff.jitter_ms > 0 {
            rand::rng().random_range(0..=backoff.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(capped + jitter)
    }

    async fn poll_loop(
        url: String,
        client: reqwest::Client,
        backoff: BackoffConfig,
        client_id: Arc<RwLock<Option<String>>>,
        advice: Arc<RwLock<Advice>>,
        inbound: Arc<StdRwLock<Option<InboundCallback>>>,
        cancellation: CancellationToken,
    ) {
        let mut consecutive_errors: u32 = 0;

        loop {
            if cancellation.is_cancelled() {
                break;
            }

            let timeout_ms = advice.read().await.timeout_ms();
            let interval_ms = advice.read().await.interval_ms();

            let id = client_id.read().await.clone();
            let Some(id) = id else {
                tokio::select! {
                    () = cancellation.cancelled() => break,
                    () = tokio::time::sleep(Duration::from_millis(interval_ms)) => continue,
                }
            };

            let connect = Message {
                client_id: Some(id),
                connection_type: Some(CONNECTION_TYPE.to_string()),
                ..Message::new("/meta/connect")
            };

            let request = client
                .post(&url)
                .json(&serde_json::Value::Array(vec![connect.to_value()]))
                .timeout(Duration::from_millis(timeout_ms));

            let outcome = tokio::select! {
                () = cancellation.cancelled() => break,
                result = request.send() => result,
            };

            let mut request_failed = false;

            match outcome {
                Ok(response) => match response.json::<serde_json::Value>().await {
                    Ok(body) => {
                        consecutive_errors = 0;
                        let messages = match body {
                            serde_json::Value::Array(items) => items,
                            other => vec![other],
                        };
                        for value in messages {
                            match Message::from_value(value) {
                                Ok(message) if message.is_connect() => {
                                    if let Some(received) = &message.advice {
                                        advice.write().await.merge(received);
                                    }
                                }
                                Ok(message) => {
                                    if let Some(callback) = inbound.read().expect("inbound lock poisoned").as_ref() {
                                        callback(message);
                                    }
                                }
                                Err(err) => {
                                    tracing::warn!(error = %err, "malformed poll response message");
                                }
                            }
                        }
                    }
                    Err(err) => {
                        request_failed = true;
                        tracing::warn!(error = %err, "failed to decode poll response body");
                    }
                },
                Err(err) => {
                    request_failed = true;
                    tracing::error!(error = %err, "long-polling request failed, backing off");
                }
            }

            let delay = if request_failed {
                consecutive_errors = consecutive_errors.saturating_add(1);
                Self::error_backoff(&backoff, consecutive_errors)
            } else {
                Duration::from_millis(interval_ms)
            };

            tokio::select! {
                () = cancellation.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for PollingTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let token = CancellationToken::new();
        let handle = tokio::spawn(Self::poll_loop(
            self.url.clone(),
            client.clone(),
            self.backoff.clone(),
            Arc::clone(&self.client_id),
            Arc::clone(&self.advice),
            Arc::clone(&self.inbound),
            token.clone(),
        ));

        *self.client.lock().await = Some(client);
        *self.cancellation.lock().await = Some(token);
        *self.poll_task.lock().await = Some(handle);
        self.connected.store(true, Ordering::Relaxed);

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::Relaxed);
        if let Some(token) = self.cancellation.lock().await.take() {
            token.cancel();
        }
        if let Some(handle) = self.poll_task.lock().await.take() {
            let _ = handle.await;
        }
        *self.client.lock().await = None;
        *self.client_id.write().await = None;
        Ok(())
    }

    async fn send(&self, mut message: Message) -> Result<Message, TransportError> {
        if message.is_connect() && message.connection_type.is_none() {
            message.connection_type = Some(CONNECTION_TYPE.to_string());
        }
        if let Some(id) = &message.client_id {
            *self.client_id.write().await = Some(id.clone());
        }

        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(TransportError::NotConnected)?;

        let body = serde_json::Value::Array(vec![message.to_value()]);
        let response = client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Send(format!(
                "server returned status {}",
                response.status()
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        let first = match value {
            serde_json::Value::Array(mut items) if !items.is_empty() => items.remove(0),
            serde_json::Value::Array(_) => {
                return Err(TransportError::Protocol("empty response array".to_string()))
            }
            other => other,
        };

        Message::from_value(first).map_err(|e| TransportError::Protocol(e.to_string()))
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

    #[tokio::test]
    async fn send_before_connect_is_not_connected() {
        let transport = PollingTransport::new("http://example.invalid/faye");
        let err = transport.send(Message::new("/meta/handshake")).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[tokio::test]
    async fn fresh_transport_is_not_connected() {
        let transport = PollingTransport::new("http://example.invalid/faye");
        assert!(!transport.is_connected());
    }
}
