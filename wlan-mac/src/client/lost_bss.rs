// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use wlan_common::time::{Duration, TimeUnit};

/// Tracks how long the joined BSS has gone unheard. Once a full timeout of
/// beacon periods accumulates without a single beacon, the association is
/// declared lost and torn down.
#[derive(Debug)]
pub struct LostBssCounter {
    /// The beacon period announced by the AP, used to convert beacon counts
    /// into time.
    beacon_period: Duration,

    /// Silence threshold: this much time without a beacon loses the BSS.
    full_timeout: Duration,

    /// Accumulated silence. Reset to zero by every received beacon.
    time_since_last_beacon: Duration,
}

/// The periodic status check adds a full check interval on every firing,
/// which can over-count if a beacon arrived during the interval. Callers
/// avoid that by asking `should_deauthenticate()` first and only adding the
/// interval when the answer is no.
impl LostBssCounter {
    pub fn start(beacon_period: TimeUnit, full_timeout_beacon_count: u32) -> Self {
        Self {
            beacon_period: Duration::from(beacon_period),
            full_timeout: Duration::from(beacon_period) * full_timeout_beacon_count as i64,
            time_since_last_beacon: Duration::ZERO,
        }
    }

    pub fn reset(&mut self) {
        self.time_since_last_beacon = Duration::ZERO;
    }

    pub fn should_deauthenticate(&self) -> bool {
        self.time_since_last_beacon >= self.full_timeout
    }

    pub fn add_beacon_interval(&mut self, beacon_intervals_since_last_timeout: u32) {
        self.time_since_last_beacon +=
            self.beacon_period * beacon_intervals_since_last_timeout as i64;
    }
}
