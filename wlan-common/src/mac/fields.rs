// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use zerocopy::{AsBytes, FromBytes};

// IEEE Std 802.11-2016, 9.2.4.1.3
#[derive(AsBytes, FromBytes, PartialEq, Eq, Clone, Copy, Debug, Default, Hash)]
#[repr(C)]
pub struct FrameType(pub u16);

impl FrameType {
    pub const MGMT: Self = Self(0);
    pub const CTRL: Self = Self(1);
    pub const DATA: Self = Self(2);
    pub const EXT: Self = Self(3);
}

// IEEE Std 802.11-2016, 9.2.4.1.3, Table 9-1
#[derive(AsBytes, FromBytes, PartialEq, Eq, Clone, Copy, Debug, Default, Hash)]
#[repr(C)]
pub struct MgmtSubtype(pub u16);

impl MgmtSubtype {
    pub const ASSOC_REQ: Self = Self(0b0000);
    pub const ASSOC_RESP: Self = Self(0b0001);
    pub const REASSOC_REQ: Self = Self(0b0010);
    pub const REASSOC_RESP: Self = Self(0b0011);
    pub const PROBE_REQ: Self = Self(0b0100);
    pub const PROBE_RESP: Self = Self(0b0101);
    pub const BEACON: Self = Self(0b1000);
    pub const ATIM: Self = Self(0b1001);
    pub const DISASSOC: Self = Self(0b1010);
    pub const AUTH: Self = Self(0b1011);
    pub const DEAUTH: Self = Self(0b1100);
    pub const ACTION: Self = Self(0b1101);
}

// IEEE Std 802.11-2016, 9.2.4.1.3, Table 9-1
#[derive(AsBytes, FromBytes, PartialEq, Eq, Clone, Copy, Debug, Default, Hash)]
#[repr(C)]
pub struct CtrlSubtype(pub u16);

impl CtrlSubtype {
    pub const RTS: Self = Self(0b1011);
    pub const CTS: Self = Self(0b1100);
    pub const ACK: Self = Self(0b1101);
}

// IEEE Std 802.11-2016, 9.2.4.1.1
#[derive(AsBytes, FromBytes, PartialEq, Eq, Clone, Copy, Debug, Default, Hash)]
#[repr(C)]
pub struct FrameControl(pub u16);

impl FrameControl {
    pub fn protocol_version(&self) -> u16 {
        self.0 & 0b11
    }

    pub fn frame_type(&self) -> FrameType {
        FrameType((self.0 >> 2) & 0b11)
    }

    pub fn set_frame_type(&mut self, frame_type: FrameType) {
        self.0 = (self.0 & !(0b11 << 2)) | ((frame_type.0 & 0b11) << 2);
    }

    pub fn mgmt_subtype(&self) -> MgmtSubtype {
        MgmtSubtype((self.0 >> 4) & 0b1111)
    }

    pub fn set_mgmt_subtype(&mut self, subtype: MgmtSubtype) {
        self.0 = (self.0 & !(0b1111 << 4)) | ((subtype.0 & 0b1111) << 4);
    }

    pub fn ctrl_subtype(&self) -> CtrlSubtype {
        CtrlSubtype((self.0 >> 4) & 0b1111)
    }

    pub fn set_ctrl_subtype(&mut self, subtype: CtrlSubtype) {
        self.0 = (self.0 & !(0b1111 << 4)) | ((subtype.0 & 0b1111) << 4);
    }

    pub fn to_ds(&self) -> bool {
        self.0 & (1 << 8) != 0
    }

    pub fn set_to_ds(&mut self, to_ds: bool) {
        self.set_bit(8, to_ds);
    }

    pub fn from_ds(&self) -> bool {
        self.0 & (1 << 9) != 0
    }

    pub fn set_from_ds(&mut self, from_ds: bool) {
        self.set_bit(9, from_ds);
    }

    pub fn more_fragments(&self) -> bool {
        self.0 & (1 << 10) != 0
    }

    pub fn retry(&self) -> bool {
        self.0 & (1 << 11) != 0
    }

    pub fn set_retry(&mut self, retry: bool) {
        self.set_bit(11, retry);
    }

    pub fn power_mgmt(&self) -> bool {
        self.0 & (1 << 12) != 0
    }

    pub fn more_data(&self) -> bool {
        self.0 & (1 << 13) != 0
    }

    pub fn protected(&self) -> bool {
        self.0 & (1 << 14) != 0
    }

    fn set_bit(&mut self, bit: u16, value: bool) {
        if value {
            self.0 |= 1 << bit;
        } else {
            self.0 &= !(1 << bit);
        }
    }
}

// IEEE Std 802.11-2016, 9.2.4.4
#[derive(AsBytes, FromBytes, PartialEq, Eq, Clone, Copy, Debug, Default, Hash)]
#[repr(C)]
pub struct SequenceControl(pub u16);

impl SequenceControl {
    pub fn frag_num(&self) -> u16 {
        self.0 & 0b1111
    }

    pub fn seq_num(&self) -> u16 {
        self.0 >> 4
    }

    pub fn set_seq_num(&mut self, seq_num: u16) {
        self.0 = (self.0 & 0b1111) | (seq_num << 4);
    }

    pub fn from_seq_num(seq_num: u16) -> Self {
        Self(seq_num << 4)
    }
}

// IEEE Std 802.11-2016, 9.4.1.4
#[derive(AsBytes, FromBytes, PartialEq, Eq, Clone, Copy, Debug, Default, Hash)]
#[repr(C)]
pub struct CapabilityInfo(pub u16);

impl CapabilityInfo {
    pub fn ess(&self) -> bool {
        self.0 & 1 != 0
    }

    pub fn set_ess(&mut self, ess: bool) {
        if ess {
            self.0 |= 1
        } else {
            self.0 &= !1
        }
    }

    pub fn ibss(&self) -> bool {
        self.0 & (1 << 1) != 0
    }

    pub fn cf_pollable(&self) -> bool {
        self.0 & (1 << 2) != 0
    }

    pub fn cf_poll_req(&self) -> bool {
        self.0 & (1 << 3) != 0
    }

    pub fn privacy(&self) -> bool {
        self.0 & (1 << 4) != 0
    }

    pub fn short_preamble(&self) -> bool {
        self.0 & (1 << 5) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_control_type_and_subtype() {
        let mut fc = FrameControl(0);
        fc.set_frame_type(FrameType::MGMT);
        fc.set_mgmt_subtype(MgmtSubtype::AUTH);
        assert_eq!(fc.frame_type(), FrameType::MGMT);
        assert_eq!(fc.mgmt_subtype(), MgmtSubtype::AUTH);
        assert_eq!(fc.0, 0b1011_0000);

        let mut fc = FrameControl(0);
        fc.set_frame_type(FrameType::CTRL);
        fc.set_ctrl_subtype(CtrlSubtype::RTS);
        assert_eq!(fc.frame_type(), FrameType::CTRL);
        assert_eq!(fc.ctrl_subtype(), CtrlSubtype::RTS);
        assert_eq!(fc.0, 0b1011_0100);
    }

    #[test]
    fn frame_control_flags() {
        let mut fc = FrameControl(0);
        fc.set_retry(true);
        assert!(fc.retry());
        assert_eq!(fc.0, 1 << 11);
        fc.set_retry(false);
        assert!(!fc.retry());

        fc.set_to_ds(true);
        fc.set_from_ds(true);
        assert!(fc.to_ds());
        assert!(fc.from_ds());
    }

    #[test]
    fn sequence_control_fields() {
        let seq_ctrl = SequenceControl::from_seq_num(0b1010_1010_1010);
        assert_eq!(seq_ctrl.seq_num(), 0b1010_1010_1010);
        assert_eq!(seq_ctrl.frag_num(), 0);

        let mut seq_ctrl = SequenceControl(0b0110);
        seq_ctrl.set_seq_num(77);
        assert_eq!(seq_ctrl.frag_num(), 0b0110);
        assert_eq!(seq_ctrl.seq_num(), 77);
    }
}
