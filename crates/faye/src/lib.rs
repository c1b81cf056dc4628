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

//! An asynchronous Bayeux 1.0 publish/subscribe client, compatible with
//! Faye servers.
//!
//! ```no_run
//! use std::sync::Arc;
//! use nautilus_faye::{ClientConfig, FayeClient};
//!
//! # async fn run() -> nautilus_faye::FayeResult<()> {
//! let client = FayeClient::new(ClientConfig::new("https://example.com/faye"));
//! client.connect().await?;
//! client
//!     .subscribe(
//!         "/foo/*",
//!         Arc::new(|message| println!("{:?}", message.data)),
//!     )
//!     .await?;
//! client.publish("/foo/bar", serde_json::json!({ "hello": "world" })).await?;
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod advice;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod extension;
pub mod message;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use advice::{Advice, Reconnect};
pub use client::{ClientState, FayeClient};
pub use config::{ClientConfig, TransportKind};
pub use error::{
    AuthenticationError, FayeError, FayeResult, HandshakeError, TransportError, ValidationError,
};
pub use extension::{auth_error, AuthenticationExtension, Extension, ExtensionPipeline};
pub use message::{channel_matches, ErrorKind, Message};
pub use registry::Callback;
pub use transport::framed::{BackoffConfig, FramedTransport};
pub use transport::polling::PollingTransport;
pub use transport::Transport;
