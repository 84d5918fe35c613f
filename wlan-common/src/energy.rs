// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::ops::{Add, Sub};

/// Received signal strength in dBm. The representable range (-128..=127)
/// comfortably covers every value a receiver will ever report.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DecibelMilliWatt(pub i8);

impl DecibelMilliWatt {
    pub fn dbm(&self) -> i8 {
        self.0
    }
}

impl Add<i8> for DecibelMilliWatt {
    type Output = Self;
    fn add(self, rhs: i8) -> Self {
        DecibelMilliWatt(self.0.saturating_add(rhs))
    }
}

impl Sub<i8> for DecibelMilliWatt {
    type Output = Self;
    fn sub(self, rhs: i8) -> Self {
        DecibelMilliWatt(self.0.saturating_sub(rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_and_arithmetic() {
        assert!(DecibelMilliWatt(-40) > DecibelMilliWatt(-70));
        assert_eq!(DecibelMilliWatt(-70) + 5, DecibelMilliWatt(-65));
        assert_eq!(DecibelMilliWatt(-70) - 5, DecibelMilliWatt(-75));
        assert_eq!(DecibelMilliWatt(120) + 10, DecibelMilliWatt(127));
    }
}
