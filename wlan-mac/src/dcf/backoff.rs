// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use rand::{Rng, RngCore};

/// The contention window the backoff counter is drawn from.
///
/// Starts at `cw_min`; doubles (capped at `cw_max`) on every unsuccessful
/// retry and resets to `cw_min` on success or when the frame is finally
/// dropped. After N consecutive failures the window is
/// `min(cw_min * 2^N, cw_max)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentionWindow {
    cw_min: u16,
    cw_max: u16,
    current: u16,
}

impl ContentionWindow {
    pub fn new(cw_min: u16, cw_max: u16) -> Self {
        Self { cw_min, cw_max, current: cw_min }
    }

    pub fn current(&self) -> u16 {
        self.current
    }

    pub fn fail(&mut self) {
        self.current = self.current.saturating_mul(2).min(self.cw_max);
    }

    pub fn reset(&mut self) {
        self.current = self.cw_min;
    }

    /// Draws a backoff slot count uniformly from `[0, current]`.
    pub fn draw(&self, rng: &mut dyn RngCore) -> u16 {
        rng.gen_range(0..=self.current)
    }
}
