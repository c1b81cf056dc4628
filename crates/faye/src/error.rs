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

//! Error types for the Bayeux/Faye client.

use thiserror::Error;

/// Result alias for fallible Faye client operations.
pub type FayeResult<T> = Result<T, FayeError>;

/// Channel name or publish payload failed synchronous validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The channel string was empty.
    #[error("channel name cannot be empty")]
    EmptyChannel,

    /// The channel did not start with `/`.
    #[error("channel name must start with /")]
    MissingLeadingSlash,

    /// One or more interior segments were empty (e.g. `/foo//bar`).
    #[error("channel segments cannot be empty")]
    EmptySegment,

    /// A `*` or `**` token appeared as part of a larger segment (e.g. `foo*`).
    #[error("wildcard * can only be used as a full segment")]
    PartialWildcard,

    /// `**` appeared somewhere other than the final segment.
    #[error("** can only appear as the final segment")]
    MisplacedGlob,

    /// Subscribe was attempted against a meta or service channel.
    #[error("cannot subscribe to service channels")]
    NotSubscribable,

    /// Publish was attempted against a meta or service channel.
    #[error("cannot publish to service channels")]
    NotPublishable,

    /// Publish payload could not be represented as JSON.
    #[error("publish payload is not JSON-serializable: {0}")]
    NotSerializable(String),
}

/// The server rejected or malformed a `/meta/handshake` response.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The response's `successful` field was absent or `false`.
    #[error("handshake failed: {0}")]
    Rejected(String),

    /// The response was `successful` but carried no `clientId`.
    #[error("handshake response missing clientId")]
    MissingClientId,
}

/// Failure in the underlying socket or HTTP transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// `send`/`connect` was attempted while not connected.
    #[error("transport is not connected")]
    NotConnected,

    /// The socket or HTTP layer failed to open.
    #[error("failed to open transport: {0}")]
    Connect(String),

    /// A write to the wire failed.
    #[error("failed to send message: {0}")]
    Send(String),

    /// A pending response was not observed within its timeout.
    #[error("timed out waiting for response to message {0}")]
    Timeout(String),

    /// Malformed frame or JSON payload from the server.
    #[error("malformed protocol frame: {0}")]
    Protocol(String),

    /// The socket closed while a request was outstanding.
    #[error("transport closed: {0}")]
    Closed(String),
}

/// Server-observed authentication failure (401, or an extension-recognized
/// `ext.auth_error`).
#[derive(Debug, Error)]
#[error("authentication failed: {0}")]
pub struct AuthenticationError(pub String);

/// Umbrella error surfaced to callers of [`crate::client::FayeClient`].
///
/// Operation-level methods (`connect`, `subscribe`, `unsubscribe`, `publish`)
/// wrap any non-successful meta response with the operation that triggered
/// it, so callers can tell a rejected subscribe from a rejected publish
/// without matching on channel strings.
#[derive(Debug, Error)]
pub enum FayeError {
    /// Synchronous channel/payload validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Handshake was rejected or malformed.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// Underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Server or extension reported an authentication failure.
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    /// A meta response came back unsuccessful, or an extension halted the
    /// pipeline, during a user-initiated operation.
    #[error("{operation} failed: {reason}")]
    Operation {
        /// The client method that failed (`connect`, `subscribe`, ...).
        operation: &'static str,
        /// The server error string or local failure reason.
        reason: String,
    },

    /// The client was asked to operate outside its current state (e.g.
    /// `subscribe` before `connect`).
    #[error("invalid client state: {0}")]
    InvalidState(&'static str),

    /// No transport kind is usable (neither preferred nor fallback is
    /// supported by the server).
    #[error("no usable transport: {0}")]
    Configuration(String),
}

impl FayeError {
    /// Wraps an arbitrary display-able cause with operation context.
    pub(crate) fn operation(operation: &'static str, reason: impl ToString) -> Self {
        Self::Operation {
            operation,
            reason: reason.to_string(),
        }
    }
}
