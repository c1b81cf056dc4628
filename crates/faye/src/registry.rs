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

//! Subscription bookkeeping: channel pattern to callback registry.
//!
//! Grounded on the `DashMap<String, ...>` subscription tables used by the
//! adapter websocket clients (e.g.
//! `nautilus_trader/crates/adapters/bybit/src/websocket/client.rs`), adapted
//! here from "one entry per market-data stream" to "one entry per Bayeux
//! channel pattern with potentially many callbacks".

use std::sync::Arc;

use dashmap::DashMap;

use crate::message::{channel_matches, Message};

/// A subscriber callback: invoked with every inbound message whose channel
/// matches the pattern it was registered under.
pub type Callback = Arc<dyn Fn(Message) + Send + Sync>;

/// Concurrent map of subscription pattern to registered callbacks, hashed
/// with `ahash` (the teacher's default hasher for every `DashMap`/`HashMap`
/// it keeps off the standard `SipHash`, e.g. the subscription tables in
/// `crates/adapters/bybit/src/websocket/client.rs`).
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: DashMap<String, Vec<Callback>, ahash::RandomState>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` under `pattern`. Multiple callbacks may share a
    /// pattern; each is invoked independently on dispatch.
    pub fn insert(&self, pattern: impl Into<String>, callback: Callback) {
        self.subscriptions.entry(pattern.into()).or_default().push(callback);
    }

    /// Removes every callback registered under `pattern`. Returns `true` if
    /// the pattern had any registration.
    pub fn remove(&self, pattern: &str) -> bool {
        self.subscriptions.remove(pattern).is_some()
    }

    /// `true` if at least one callback remains registered under `pattern`.
    #[must_use]
    pub fn contains(&self, pattern: &str) -> bool {
        self.subscriptions.contains_key(pattern)
    }

    /// Removes every registration, e.g. on rehandshake when the server
    /// forgets prior subscriptions.
    pub fn clear(&self) {
        self.subscriptions.clear();
    }

    /// All patterns currently registered, for resubscription after a
    /// rehandshake.
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        self.subscriptions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Invokes every callback whose registered pattern matches `message`'s
    /// channel. A callback that panics is isolated: caught via
    /// `catch_unwind` so one misbehaving subscriber cannot take down
    /// dispatch for the others.
    pub fn dispatch(&self, message: &Message) {
        for entry in &self.subscriptions {
            if channel_matches(&message.channel, entry.key()) {
                for callback in entry.value() {
                    let callback = callback.clone();
                    let message = message.clone();
                    if let Err(panic) =
                        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(message)))
                    {
                        tracing::error!(?panic, channel = %entry.key(), "subscription callback panicked");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatch_invokes_matching_callbacks_only() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        registry.insert(
            "/foo/*",
            Arc::new(move |_msg| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        registry.insert("/bar/*", Arc::new(|_msg| {}));

        registry.dispatch(&Message::new("/foo/bar"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        registry.dispatch(&Message::new("/baz/bar"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_drops_all_callbacks_for_pattern() {
        let registry = SubscriptionRegistry::new();
        registry.insert("/foo", Arc::new(|_msg| {}));
        assert!(registry.contains("/foo"));
        assert!(registry.remove("/foo"));
        assert!(!registry.contains("/foo"));
        assert!(!registry.remove("/foo"));
    }

    #[test]
    fn dispatch_isolates_panicking_callback() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        registry.insert("/foo", Arc::new(|_msg| panic!("boom")));
        registry.insert(
            "/foo",
            Arc::new(move |_msg| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        registry.dispatch(&Message::new("/foo"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
