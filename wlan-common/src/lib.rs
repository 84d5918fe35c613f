// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Vocabulary shared by every component of the MAC: wire-format frame
//! layouts, hardware addresses, sequence number bookkeeping, signal-strength
//! types, time units, and the timer abstraction the state machines suspend
//! on.

pub mod energy;
pub mod error;
pub mod ewma_signal;
pub mod ie;
pub mod mac;
pub mod sequence;
pub mod test_utils;
pub mod time;
pub mod timer;

pub use time::TimeUnit;
