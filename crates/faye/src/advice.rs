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

//! Server reconnection advice.

use serde::{Deserialize, Serialize};

/// `reconnect` field of an advice record.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reconnect {
    /// Reconnect with a fresh `/meta/connect` after `interval`.
    Retry,
    /// Tear down the session and rehandshake.
    Handshake,
    /// Give up; the client should disconnect.
    None,
}

/// Server reconnection guidance, merged key-by-key as later advice arrives.
///
/// Grounded on `original_source/src/faye/protocol/bayeux.py::handle_advice`
/// (`self.advice.update(advice)`), re-expressed as a typed merge over
/// `Option` fields instead of a raw dict update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect: Option<Reconnect>,

    /// Milliseconds to wait before the next connect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,

    /// Server-hold duration for the polling transport, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Advice {
    /// Default poll interval when the server has not advised one: 1 second.
    pub const DEFAULT_INTERVAL_MS: u64 = 1_000;

    /// Default poll-request hold timeout: 30 seconds.
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

    /// Overlays `other`'s present fields onto `self`, key-by-key.
    pub fn merge(&mut self, other: &Advice) {
        if let Some(reconnect) = other.reconnect {
            self.reconnect = Some(reconnect);
        }
        if let Some(interval) = other.interval {
            self.interval = Some(interval);
        }
        if let Some(timeout) = other.timeout {
            self.timeout = Some(timeout);
        }
    }

    #[must_use]
    pub fn interval_ms(&self) -> u64 {
        self.interval.unwrap_or(Self::DEFAULT_INTERVAL_MS)
    }

    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout.unwrap_or(Self::DEFAULT_TIMEOUT_MS)
    }
}
