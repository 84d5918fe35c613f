// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::mac::{FrameControl, MacAddr},
    zerocopy::{AsBytes, FromBytes, Unaligned},
};

// IEEE Std 802.11-2016, 9.3.1.2
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct RtsHdr {
    pub frame_ctrl: FrameControl,
    pub duration: u16,
    pub ra: MacAddr,
    pub ta: MacAddr,
}

// IEEE Std 802.11-2016, 9.3.1.3. The ACK frame (9.3.1.4) shares this layout.
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct CtsHdr {
    pub frame_ctrl: FrameControl,
    pub duration: u16,
    pub ra: MacAddr,
}

pub type AckHdr = CtsHdr;
