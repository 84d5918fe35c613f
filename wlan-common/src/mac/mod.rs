// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Frame layouts and typed field wrappers for the parts of IEEE Std
//! 802.11-2016 this MAC speaks: management frames with fixed bodies and
//! trailing elements, the RTS/CTS/ACK control frames, and plain
//! (non-QoS) data frames.

mod ctrl;
mod data;
mod fields;
mod mgmt;

pub use {ctrl::*, data::*, fields::*, mgmt::*};

use zerocopy::{ByteSlice, LayoutVerified};

pub type MacAddr = [u8; 6];

pub const BCAST_ADDR: MacAddr = [0xFF; 6];
pub const NULL_ADDR: MacAddr = [0x00; 6];

pub fn is_multicast(addr: MacAddr) -> bool {
    // IEEE Std 802.3-2015, 3.2.3b
    addr[0] & 0x01 != 0
}

pub fn is_unicast(addr: MacAddr) -> bool {
    !is_multicast(addr)
}

/// The address a station is identified by when acting as (or talking about)
/// the BSS it provides; distinct from `MacAddr` to keep the two roles of an
/// address from being confused.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub struct Bssid(pub MacAddr);

pub const WILDCARD_BSSID: Bssid = Bssid(BCAST_ADDR);

/// A parsed MAC frame, borrowing the underlying receive buffer.
pub enum MacFrame<B: ByteSlice> {
    Mgmt {
        mgmt_hdr: LayoutVerified<B, MgmtHdr>,
        body: B,
    },
    Data {
        fixed_fields: LayoutVerified<B, FixedDataHdrFields>,
        body: B,
    },
    Rts {
        rts_hdr: LayoutVerified<B, RtsHdr>,
    },
    Cts {
        cts_hdr: LayoutVerified<B, CtsHdr>,
    },
    Ack {
        ack_hdr: LayoutVerified<B, AckHdr>,
    },
    Unsupported {
        frame_ctrl: FrameControl,
    },
}

impl<B: ByteSlice> MacFrame<B> {
    pub fn parse(bytes: B) -> Option<MacFrame<B>> {
        if bytes.len() < 2 {
            return None;
        }
        let frame_ctrl = FrameControl(u16::from_le_bytes([bytes[0], bytes[1]]));
        match frame_ctrl.frame_type() {
            FrameType::MGMT => {
                let (mgmt_hdr, body) = LayoutVerified::new_unaligned_from_prefix(bytes)?;
                Some(MacFrame::Mgmt { mgmt_hdr, body })
            }
            FrameType::DATA => {
                let (fixed_fields, body) = LayoutVerified::new_unaligned_from_prefix(bytes)?;
                Some(MacFrame::Data { fixed_fields, body })
            }
            FrameType::CTRL => match frame_ctrl.ctrl_subtype() {
                CtrlSubtype::RTS => {
                    let (rts_hdr, _) = LayoutVerified::new_unaligned_from_prefix(bytes)?;
                    Some(MacFrame::Rts { rts_hdr })
                }
                CtrlSubtype::CTS => {
                    let (cts_hdr, _) = LayoutVerified::new_unaligned_from_prefix(bytes)?;
                    Some(MacFrame::Cts { cts_hdr })
                }
                CtrlSubtype::ACK => {
                    let (ack_hdr, _) = LayoutVerified::new_unaligned_from_prefix(bytes)?;
                    Some(MacFrame::Ack { ack_hdr })
                }
                _ => Some(MacFrame::Unsupported { frame_ctrl }),
            },
            _ => Some(MacFrame::Unsupported { frame_ctrl }),
        }
    }
}
