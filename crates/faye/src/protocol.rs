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

//! The Bayeux session state machine.
//!
//! Pure logic: builds request messages and processes responses, performs no
//! I/O. Grounded on `original_source/src/faye/protocol/bayeux.py`, which
//! holds an `asyncio.Lock` around `_handshaken`; here `Protocol` instead
//! relies on its only caller, [`crate::client::FayeClient`], serializing all
//! access behind its own coordination mutex, and keeps `Protocol` `&mut self`.

use serde_json::Value;

use crate::advice::Advice;
use crate::channel::{validate_for_publish, validate_for_subscribe};
use crate::error::{HandshakeError, ValidationError};
use crate::message::Message;

/// Default connection types offered in a handshake, in preference order.
pub const DEFAULT_CONNECTION_TYPES: &[&str] = &["websocket", "long-polling"];

const BAYEUX_VERSION: &str = "1.0";

/// Bayeux session state machine. Owns the session id, negotiated
/// connection types, and merged advice; produces messages on request.
#[derive(Debug, Default)]
pub struct Protocol {
    client_id: Option<String>,
    supported_connection_types: Vec<String>,
    advice: Advice,
    handshaken: bool,
}

impl Protocol {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_handshaken(&self) -> bool {
        self.handshaken
    }

    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    #[must_use]
    pub fn supported_connection_types(&self) -> &[String] {
        &self.supported_connection_types
    }

    #[must_use]
    pub fn advice(&self) -> &Advice {
        &self.advice
    }

    /// Builds a `/meta/handshake` message.
    #[must_use]
    pub fn build_handshake(&self, ext: Option<Value>, conn_types: Option<&[&str]>) -> Message {
        let types = conn_types
            .unwrap_or(DEFAULT_CONNECTION_TYPES)
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        Message {
            version: Some(BAYEUX_VERSION.to_string()),
            minimum_version: Some(BAYEUX_VERSION.to_string()),
            supported_connection_types: Some(types),
            ext,
            ..Message::new("/meta/handshake")
        }
    }

    /// Processes a `/meta/handshake` response: stores the session id,
    /// lower-cases and stores the negotiated connection types (defaulting
    /// if absent), merges advice, and marks the protocol handshaken.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::Rejected`] if `successful` is not `true`,
    /// or [`HandshakeError::MissingClientId`] if a successful response
    /// carries no `clientId`.
    pub fn process_handshake_response(&mut self, response: &Message) -> Result<(), HandshakeError> {
        if response.successful != Some(true) {
            return Err(HandshakeError::Rejected(
                response.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let client_id = response
            .client_id
            .clone()
            .ok_or(HandshakeError::MissingClientId)?;

        self.client_id = Some(client_id);
        self.supported_connection_types = match &response.supported_connection_types {
            Some(types) if !types.is_empty() => {
                types.iter().map(|t| t.to_lowercase()).collect()
            }
            _ => DEFAULT_CONNECTION_TYPES.iter().map(|s| (*s).to_string()).collect(),
        };

        if let Some(advice) = &response.advice {
            self.advice.merge(advice);
        }
        self.handshaken = true;
        Ok(())
    }

    /// Builds a `/meta/connect` message carrying the current session id and
    /// merged advice.
    ///
    /// # Panics
    ///
    /// Panics if called before a successful handshake; callers must check
    /// [`Protocol::is_handshaken`] first.
    #[must_use]
    pub fn build_connect(&self, connection_type: &str) -> Message {
        let client_id = self.client_id.clone().expect("build_connect requires handshake");
        Message {
            client_id: Some(client_id),
            connection_type: Some(connection_type.to_string()),
            advice: Some(self.advice.clone()),
            ..Message::new("/meta/connect")
        }
    }

    /// Builds a `/meta/subscribe` message, validating `channel` first.
    pub fn build_subscribe(&self, channel: &str) -> Result<Message, ValidationError> {
        validate_for_subscribe(channel)?;
        Ok(Message {
            client_id: self.client_id.clone(),
            subscription: Some(channel.to_string()),
            ..Message::new("/meta/subscribe")
        })
    }

    /// Builds a `/meta/unsubscribe` message, validating `channel` first.
    pub fn build_unsubscribe(&self, channel: &str) -> Result<Message, ValidationError> {
        validate_for_subscribe(channel)?;
        Ok(Message {
            client_id: self.client_id.clone(),
            subscription: Some(channel.to_string()),
            ..Message::new("/meta/unsubscribe")
        })
    }

    /// Builds a data-carrying publish message on `channel`, validating it
    /// first.
    pub fn build_publish(&self, channel: &str, data: Value) -> Result<Message, ValidationError> {
        validate_for_publish(channel)?;
        Ok(Message {
            client_id: self.client_id.clone(),
            data: Some(data),
            ..Message::new(channel)
        })
    }

    /// Builds a `/meta/disconnect` message.
    #[must_use]
    pub fn build_disconnect(&self) -> Message {
        Message {
            client_id: self.client_id.clone(),
            ..Message::new("/meta/disconnect")
        }
    }

    /// Merges an incoming advice record into the tracked state.
    pub fn process_advice(&mut self, advice: Option<&Advice>) {
        if let Some(advice) = advice {
            self.advice.merge(advice);
        }
    }

    /// Clears session id, handshake flag, supported types, and advice, in
    /// preparation for a rehandshake or after disconnect.
    pub fn reset(&mut self) {
        self.client_id = None;
        self.supported_connection_types.clear();
        self.advice = Advice::default();
        self.handshaken = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::Reconnect;

    #[test]
    fn handshake_round_trip() {
        let mut protocol = Protocol::new();
        let handshake = protocol.build_handshake(None, None);
        assert_eq!(handshake.channel, "/meta/handshake");
        assert!(handshake.id.is_some());

        let response = Message {
            successful: Some(true),
            client_id: Some("c1".to_string()),
            supported_connection_types: Some(vec!["WebSocket".to_string()]),
            ..Message::new("/meta/handshake")
        };
        protocol.process_handshake_response(&response).unwrap();
        assert!(protocol.is_handshaken());
        assert_eq!(protocol.client_id(), Some("c1"));
        assert_eq!(protocol.supported_connection_types(), &["websocket".to_string()]);
    }

    #[test]
    fn handshake_defaults_connection_types_when_absent() {
        let mut protocol = Protocol::new();
        let response = Message {
            successful: Some(true),
            client_id: Some("c1".to_string()),
            ..Message::new("/meta/handshake")
        };
        protocol.process_handshake_response(&response).unwrap();
        assert_eq!(
            protocol.supported_connection_types(),
            &["websocket".to_string(), "long-polling".to_string()]
        );
    }

    #[test]
    fn handshake_rejects_missing_client_id() {
        let mut protocol = Protocol::new();
        let response = Message {
            successful: Some(true),
            ..Message::new("/meta/handshake")
        };
        let err = protocol.process_handshake_response(&response).unwrap_err();
        assert!(matches!(err, HandshakeError::MissingClientId));
    }

    #[test]
    fn handshake_rejects_unsuccessful_response() {
        let mut protocol = Protocol::new();
        let response = Message {
            successful: Some(false),
            error: Some("403:denied".to_string()),
            ..Message::new("/meta/handshake")
        };
        let err = protocol.process_handshake_response(&response).unwrap_err();
        assert!(matches!(err, HandshakeError::Rejected(_)));
    }

    #[test]
    fn reset_clears_all_session_state() {
        let mut protocol = Protocol::new();
        let response = Message {
            successful: Some(true),
            client_id: Some("c1".to_string()),
            advice: Some(crate::advice::Advice {
                reconnect: Some(Reconnect::Retry),
                ..Default::default()
            }),
            ..Message::new("/meta/handshake")
        };
        protocol.process_handshake_response(&response).unwrap();
        protocol.reset();
        assert!(!protocol.is_handshaken());
        assert_eq!(protocol.client_id(), None);
        assert_eq!(protocol.advice(), &Advice::default());
    }

    #[test]
    fn publish_rejects_invalid_channel_before_any_message_is_built() {
        let protocol = Protocol::new();
        let err = protocol.build_publish("/meta/foo", Value::Null).unwrap_err();
        assert!(matches!(err, ValidationError::NotPublishable));
    }
}
