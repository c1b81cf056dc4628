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

//! The Bayeux protocol message value type.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::advice::Advice;

const META_PREFIX: &str = "/meta/";
const SERVICE_PREFIX: &str = "/service/";

/// A single Bayeux protocol message.
///
/// Mirrors the wire dictionary form field-for-field; absent fields are
/// omitted on serialization rather than emitted as `null`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Absolute channel path, e.g. `/meta/handshake` or `/foo/bar`.
    pub channel: String,

    /// Client-assigned correlation id, unique per outbound request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Server-issued session identifier.
    #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Target channel for subscribe/unsubscribe messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    /// Publish payload, or response payload for service replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Server-set result indicator on meta responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,

    /// Bayeux-formatted error string `"<code>:<args>:<reason>"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Server reconnection guidance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,

    /// Extension-owned sub-document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,

    /// Protocol version, present on handshake.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Minimum protocol version accepted, present on handshake.
    #[serde(rename = "minimumVersion", skip_serializing_if = "Option::is_none")]
    pub minimum_version: Option<String>,

    /// Transports the handshake negotiates over.
    #[serde(
        rename = "supportedConnectionTypes",
        skip_serializing_if = "Option::is_none"
    )]
    pub supported_connection_types: Option<Vec<String>>,

    /// Transport in use, present on connect messages.
    #[serde(rename = "connectionType", skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,

    /// Server timestamp, echoed informationally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Server-hold duration for the polling transport, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Delay before the next connect, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
}

impl Message {
    /// Builds a message on `channel` with an auto-generated `id`.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            id: Some(Uuid::new_v4().to_string()),
            ..Default::default()
        }
    }

    /// Parses a message from its wire (JSON object) representation.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Renders this message to its wire (JSON object) representation, with
    /// absent fields omitted.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("Message always serializes")
    }

    /// `true` if `channel` starts with `/meta/`.
    #[must_use]
    pub fn is_meta(&self) -> bool {
        self.channel.starts_with(META_PREFIX)
    }

    /// `true` if `channel` starts with `/service/`.
    #[must_use]
    pub fn is_service(&self) -> bool {
        self.channel.starts_with(SERVICE_PREFIX)
    }

    #[must_use]
    pub fn is_handshake(&self) -> bool {
        self.channel == "/meta/handshake"
    }

    #[must_use]
    pub fn is_connect(&self) -> bool {
        self.channel == "/meta/connect"
    }

    #[must_use]
    pub fn is_subscribe(&self) -> bool {
        self.channel == "/meta/subscribe"
    }

    #[must_use]
    pub fn is_unsubscribe(&self) -> bool {
        self.channel == "/meta/unsubscribe"
    }

    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        self.channel == "/meta/disconnect"
    }

    /// `true` if the message carries a Bayeux error string, or `successful`
    /// is explicitly `false`.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.successful == Some(false)
    }

    /// Classifies [`Message::error`] into a recognized [`ErrorKind`].
    ///
    /// Deliberately partial: only the codes observed from real Bayeux
    /// servers are mapped; anything else is `Unknown`. Extend this match
    /// as new server error codes are encountered in practice.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        let error = self.error.as_ref()?;
        Some(if error.contains("401") {
            ErrorKind::Unauthorized
        } else if error.contains("403") {
            ErrorKind::Forbidden
        } else if error.contains("405") {
            ErrorKind::InvalidChannel
        } else if error.contains("409") {
            ErrorKind::ConnectionFailed
        } else {
            ErrorKind::Unknown
        })
    }

    /// Tests whether this message's channel matches a subscription pattern,
    /// per Bayeux wildcard rules: `*` matches exactly one segment, `**`
    /// (only valid as the final pattern segment) matches the remaining
    /// segments inclusive of zero.
    #[must_use]
    pub fn matches(&self, pattern: &str) -> bool {
        channel_matches(&self.channel, pattern)
    }
}

/// Recognized Bayeux error codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    InvalidChannel,
    ConnectionFailed,
    Unknown,
}

/// Tests whether `channel` matches `pattern` per Bayeux wildcard semantics.
///
/// Grounded on `original_source/src/faye/protocol/message.py::matches`, with
/// the `**` handling generalized so a pattern prefix of `n` segments matches
/// any channel with at least `n` segments. `message.py::matches` only ever
/// gets called with `**` as the final token, which is also the only
/// placement this crate accepts at subscribe-time via [`crate::channel`].
#[must_use]
pub fn channel_matches(channel: &str, pattern: &str) -> bool {
    if !pattern.starts_with('/') {
        return false;
    }

    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let channel_parts: Vec<&str> = channel.split('/').collect();

    if let Some(glob_index) = pattern_parts.iter().position(|&p| p == "**") {
        if !segments_match(&pattern_parts[..glob_index], &channel_parts[..glob_index.min(channel_parts.len())]) {
            return false;
        }
        if glob_index > channel_parts.len() {
            return false;
        }
        return true;
    }

    if pattern_parts.len() != channel_parts.len() {
        return false;
    }
    segments_match(&pattern_parts, &channel_parts)
}

fn segments_match(pattern_parts: &[&str], channel_parts: &[&str]) -> bool {
    if pattern_parts.len() > channel_parts.len() {
        return false;
    }
    pattern_parts
        .iter()
        .zip(channel_parts.iter())
        .all(|(p, c)| *p == "*" || p == c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_drops_absent_fields() {
        let msg = Message::new("/foo/bar");
        let value = msg.to_value();
        assert!(value.get("clientId").is_none());
        let parsed = Message::from_value(value).unwrap();
        assert_eq!(parsed.channel, msg.channel);
        assert_eq!(parsed.id, msg.id);
    }

    #[test]
    fn channel_predicates() {
        let msg = Message::new("/meta/handshake");
        assert!(msg.is_meta());
        assert!(msg.is_handshake());
        assert!(!msg.is_service());
    }

    #[test]
    fn error_kind_classification() {
        let mut msg = Message::new("/meta/handshake");
        msg.error = Some("401:auth:Invalid token".to_string());
        assert_eq!(msg.error_kind(), Some(ErrorKind::Unauthorized));
        msg.error = Some("999:x:mystery".to_string());
        assert_eq!(msg.error_kind(), Some(ErrorKind::Unknown));
    }

    #[rstest::rstest]
    #[case("/a/*", "/a/b", true)]
    #[case("/a/*", "/a/b/c", false)]
    #[case("/a/**", "/a/b", true)]
    #[case("/a/**", "/a/b/c", true)]
    #[case("/a/**", "/a", true)]
    #[case("/a/b", "/a/b", true)]
    #[case("/a/b", "/a/c", false)]
    #[case("foo*", "/foo", false)]
    fn wildcard_matching(#[case] pattern: &str, #[case] channel: &str, #[case] expected: bool) {
        assert_eq!(channel_matches(channel, pattern), expected);
    }

    #[test]
    fn matches_is_stable_under_reparse() {
        let msg = Message::new("/a/b/c");
        let reparsed = Message::from_value(msg.to_value()).unwrap();
        assert_eq!(msg.matches("/a/**"), reparsed.matches("/a/**"));
    }
}
