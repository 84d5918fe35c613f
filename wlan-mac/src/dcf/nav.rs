// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use wlan_common::time::Time;

/// The network allocation vector: the virtual carrier-sense deadline derived
/// from the duration fields of overheard frames.
///
/// Monotone non-decreasing between explicit resets: a shorter overheard
/// reservation never shortens an adopted one.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Nav {
    deadline: Option<Time>,
}

impl Nav {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts `candidate` only if it extends the current deadline. Returns
    /// whether the deadline moved.
    pub fn update(&mut self, candidate: Time) -> bool {
        match self.deadline {
            Some(deadline) if candidate <= deadline => false,
            _ => {
                self.deadline = Some(candidate);
                true
            }
        }
    }

    /// Whether the medium is virtually reserved at `now`.
    pub fn is_busy(&self, now: Time) -> bool {
        matches!(self.deadline, Some(deadline) if now < deadline)
    }

    pub fn deadline(&self) -> Option<Time> {
        self.deadline
    }

    pub fn reset(&mut self) {
        self.deadline = None;
    }
}
