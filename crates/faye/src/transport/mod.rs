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

//! Transport abstraction over the wire encoding of Bayeux messages.
//!
//! Two implementations ship: [`framed::FramedTransport`] (WebSocket, frames
//! correlated by message `id`) and [`polling::PollingTransport`] (HTTP
//! long-polling). Grounded on the `#[async_trait]` object-safe client trait
//! pattern used throughout `nautilus_trader`'s adapters (e.g.
//! `crates/adapters/bybit/src/http/client.rs`), generalized here to an
//! interface the `Client` coordinator can hold as `Box<dyn Transport>`.

pub mod framed;
pub mod polling;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::message::Message;

/// A callback invoked with every message the transport receives that is not
/// itself the synchronous response to a pending `send`.
pub type InboundCallback = std::sync::Arc<dyn Fn(Message) + Send + Sync>;

/// Wire-level transport for Bayeux messages.
///
/// Implementations own their connection lifecycle; `Client` never reaches
/// into transport internals, only ever calling through this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the underlying connection.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Closes the underlying connection. Idempotent.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Sends `message` and awaits the server's correlated response.
    async fn send(&self, message: Message) -> Result<Message, TransportError>;

    /// Registers the callback invoked for messages arriving outside of a
    /// pending `send` (broadcast publishes, unsolicited meta messages).
    /// Replaces any previously registered callback.
    fn set_inbound_callback(&self, callback: InboundCallback);

    /// `true` if the transport believes it has a live connection.
    fn is_connected(&self) -> bool;
}

/// Normalizes a Bayeux wire payload into a list of messages.
///
/// Per the Bayeux spec, both requests and responses may be sent as a single
/// JSON object or as an array of objects; this always returns the latter
/// shape so callers (framed dispatch loop, polling response handler) have
/// one code path.
pub(crate) fn decode_envelope(text: &str) -> Result<Vec<Message>, TransportError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| TransportError::Protocol(e.to_string()))?;

    let values = match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };

    values
        .into_iter()
        .map(|v| Message::from_value(v).map_err(|e| TransportError::Protocol(e.to_string())))
        .collect()
}

/// Encodes a single outbound message as a one-element Bayeux envelope.
pub(crate) fn encode_envelope(message: &Message) -> String {
    serde_json::Value::Array(vec![message.to_value()]).to_string()
}
