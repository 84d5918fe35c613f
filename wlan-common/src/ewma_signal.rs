// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::energy::DecibelMilliWatt;

/// Exponentially weighted moving average over received signal strength.
///
/// Receivers report dBm as an i8, and integer rounding would let small
/// changes disappear entirely (avg(-50, -51) rounds back to -50 forever).
/// The average is therefore kept as an f64 and only rounded on read.
#[derive(Clone, Debug, PartialEq)]
pub struct EwmaSignalStrength {
    average: f64,
    /// Smoothing factor 2/(n+1) for an n-sample averaging depth.
    alpha: f64,
}

impl EwmaSignalStrength {
    pub fn new(depth: usize, initial_signal: DecibelMilliWatt) -> Self {
        Self { average: initial_signal.0.into(), alpha: 2.0 / (1.0 + depth as f64) }
    }

    pub fn dbm(&self) -> DecibelMilliWatt {
        DecibelMilliWatt(self.average.round() as i8)
    }

    // Averaged linearly rather than logarithmically; closer to perceived
    // link quality.
    pub fn update_average(&mut self, sample: DecibelMilliWatt) {
        self.average = self.alpha * (sample.0 as f64) + (1.0 - self.alpha) * self.average;
    }
}
