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

//! The extension pipeline: an ordered, asymmetric interceptor chain.
//!
//! Grounded on `original_source/src/faye/extensions/base.py` (the
//! `Extension` ABC) and `original_source/src/faye/client.py`'s
//! `_process_outgoing`/`_process_incoming` (forward-order outbound,
//! reverse-order inbound, halt-on-`None`, catch-log-and-forward on error).

use async_trait::async_trait;
use serde_json::json;

use crate::message::Message;

/// A user-registered interceptor in the outbound/inbound message pipeline.
///
/// Implementations may be synchronous in spirit; the trait is `async` so
/// extensions that need to await (e.g. refreshing a token) can.
#[async_trait]
pub trait Extension: Send + Sync {
    /// Processes an outbound message before it reaches the transport.
    /// Returning `None` halts the pipeline for this message.
    async fn outgoing(&self, message: Message) -> Option<Message> {
        Some(message)
    }

    /// Processes an inbound message before it reaches protocol/subscription
    /// dispatch. Returning `None` drops the message.
    async fn incoming(&self, message: Message) -> Option<Message> {
        Some(message)
    }
}

/// Ordered list of [`Extension`]s. Outbound messages run forward,
/// inbound messages run in reverse registration order.
#[derive(Default)]
pub struct ExtensionPipeline {
    extensions: Vec<std::sync::Arc<dyn Extension>>,
}

impl ExtensionPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, extension: std::sync::Arc<dyn Extension>) {
        self.extensions.push(extension);
    }

    /// Runs `message` through every extension's `outgoing` hook in
    /// registration order. Exceptions (panics are not caught; extension
    /// errors here mean a `None` halt) stop propagation for this call.
    pub async fn process_outgoing(&self, message: Message) -> Option<Message> {
        let mut current = message;
        for extension in &self.extensions {
            match extension.outgoing(current.clone()).await {
                Some(next) => current = next,
                None => return None,
            }
        }
        Some(current)
    }

    /// Runs `message` through every extension's `incoming` hook in reverse
    /// registration order.
    pub async fn process_incoming(&self, message: Message) -> Option<Message> {
        let mut current = message;
        for extension in self.extensions.iter().rev() {
            match extension.incoming(current.clone()).await {
                Some(next) => current = next,
                None => return None,
            }
        }
        Some(current)
    }
}

/// Adds a bearer token to outgoing handshake messages under
/// `ext.auth.token`, and halts the inbound pipeline when the server reports
/// `ext.auth_error` on an unsuccessful response.
///
/// Grounded on `original_source/src/faye/extensions/authentication.py`.
pub struct AuthenticationExtension {
    token: String,
}

impl AuthenticationExtension {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl Extension for AuthenticationExtension {
    async fn outgoing(&self, mut message: Message) -> Option<Message> {
        if message.is_handshake() {
            let mut ext = message.ext.take().unwrap_or_else(|| json!({}));
            if let Some(obj) = ext.as_object_mut() {
                obj.insert("auth".to_string(), json!({ "token": self.token }));
            }
            message.ext = Some(ext);
        }
        Some(message)
    }

    async fn incoming(&self, message: Message) -> Option<Message> {
        if message.successful == Some(false) && auth_error(&message).is_some() {
            tracing::warn!(error = ?auth_error(&message), "authentication extension observed auth_error");
            return None;
        }
        Some(message)
    }
}

/// Reads `ext.auth_error` off a message, independent of whether an
/// [`AuthenticationExtension`] is installed: the client checks this directly
/// on a halted response, since a halt only yields `None` and carries no
/// error payload of its own — the extension pipeline has no typed error
/// channel, only the presence or absence of a message.
#[must_use]
pub fn auth_error(message: &Message) -> Option<&str> {
    message
        .ext
        .as_ref()
        .and_then(|ext| ext.get("auth_error"))
        .and_then(|v| v.as_str())
}
