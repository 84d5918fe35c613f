// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{
        mac::{FrameControl, MacAddr, MgmtSubtype, SequenceControl},
        mac::fields::CapabilityInfo,
        time::TimeUnit,
    },
    zerocopy::{AsBytes, ByteSlice, FromBytes, LayoutVerified, Unaligned},
};

// IEEE Std 802.11-2016, 9.3.3.2
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct MgmtHdr {
    pub frame_ctrl: FrameControl,
    pub duration: u16,
    pub addr1: MacAddr,
    pub addr2: MacAddr,
    pub addr3: MacAddr,
    pub seq_ctrl: SequenceControl,
}

// IEEE Std 802.11-2016, 9.4.1.9
#[derive(AsBytes, FromBytes, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[repr(C)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const SUCCESS: Self = Self(0);
    pub const REFUSED: Self = Self(1);
    pub const REFUSED_CAPABILITIES_MISMATCH: Self = Self(10);
    pub const REFUSED_UNAUTHENTICATED_ACCESS_NOT_SUPPORTED: Self = Self(13);
    pub const UNSUPPORTED_AUTH_ALGORITHM: Self = Self(13);
    pub const TRANSACTION_SEQUENCE_ERROR: Self = Self(14);
    pub const DENIED_NO_MORE_STAS: Self = Self(17);
    pub const REFUSED_TEMPORARILY: Self = Self(30);
}

// IEEE Std 802.11-2016, 9.4.1.7
#[derive(AsBytes, FromBytes, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[repr(C)]
pub struct ReasonCode(pub u16);

impl ReasonCode {
    pub const UNSPECIFIED_REASON: Self = Self(1);
    pub const INVALID_AUTHENTICATION: Self = Self(2);
    pub const LEAVING_NETWORK_DEAUTH: Self = Self(3);
    pub const REASON_INACTIVITY: Self = Self(4);
    pub const NO_MORE_STAS: Self = Self(5);
    pub const INVALID_CLASS2FRAME: Self = Self(6);
    pub const INVALID_CLASS3FRAME: Self = Self(7);
    pub const LEAVING_NETWORK_DISASSOC: Self = Self(8);
    pub const NOT_AUTHENTICATED: Self = Self(9);
    pub const STA_LEAVING: Self = Self(36);
}

// IEEE Std 802.11-2016, 9.4.1.1
#[derive(AsBytes, FromBytes, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[repr(C)]
pub struct AuthAlgorithmNumber(pub u16);

impl AuthAlgorithmNumber {
    pub const OPEN: Self = Self(0);
    pub const SHARED_KEY: Self = Self(1);
    pub const FAST_BSS_TRANSITION: Self = Self(2);
    pub const SAE: Self = Self(3);
}

// IEEE Std 802.11-2016, 9.3.3.12
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct AuthHdr {
    pub auth_alg_num: AuthAlgorithmNumber,
    pub auth_txn_seq_num: u16,
    pub status_code: StatusCode,
}

// IEEE Std 802.11-2016, 9.3.3.3
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct BeaconHdr {
    pub timestamp: u64,
    pub beacon_interval: TimeUnit,
    pub capabilities: CapabilityInfo,
}

// IEEE Std 802.11-2016, 9.3.3.6
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct AssocReqHdr {
    pub capabilities: CapabilityInfo,
    pub listen_interval: u16,
}

// IEEE Std 802.11-2016, 9.3.3.8
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct ReassocReqHdr {
    pub capabilities: CapabilityInfo,
    pub listen_interval: u16,
    pub current_ap: MacAddr,
}

// IEEE Std 802.11-2016, 9.3.3.7. Also used for reassociation responses,
// whose body is identical (9.3.3.9).
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct AssocRespHdr {
    pub capabilities: CapabilityInfo,
    pub status_code: StatusCode,
    pub aid: u16,
}

// IEEE Std 802.11-2016, 9.3.3.13
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct DeauthHdr {
    pub reason_code: ReasonCode,
}

// IEEE Std 802.11-2016, 9.3.3.5
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct DisassocHdr {
    pub reason_code: ReasonCode,
}

/// The fixed body of a management frame, with any trailing elements
/// (SSID and friends) left as raw bytes for the caller to walk.
pub enum MgmtBody<B: ByteSlice> {
    Beacon { bcn_hdr: LayoutVerified<B, BeaconHdr>, elements: B },
    ProbeReq { elements: B },
    ProbeResp { probe_resp_hdr: LayoutVerified<B, BeaconHdr>, elements: B },
    Authentication { auth_hdr: LayoutVerified<B, AuthHdr>, elements: B },
    AssociationReq { assoc_req_hdr: LayoutVerified<B, AssocReqHdr>, elements: B },
    AssociationResp { assoc_resp_hdr: LayoutVerified<B, AssocRespHdr>, elements: B },
    ReassociationReq { reassoc_req_hdr: LayoutVerified<B, ReassocReqHdr>, elements: B },
    ReassociationResp { reassoc_resp_hdr: LayoutVerified<B, AssocRespHdr>, elements: B },
    Deauthentication { deauth_hdr: LayoutVerified<B, DeauthHdr>, elements: B },
    Disassociation { disassoc_hdr: LayoutVerified<B, DisassocHdr>, elements: B },
    Unsupported { subtype: MgmtSubtype },
}

impl<B: ByteSlice> MgmtBody<B> {
    pub fn parse(subtype: MgmtSubtype, bytes: B) -> Option<Self> {
        match subtype {
            MgmtSubtype::BEACON => {
                let (bcn_hdr, elements) = LayoutVerified::new_unaligned_from_prefix(bytes)?;
                Some(MgmtBody::Beacon { bcn_hdr, elements })
            }
            MgmtSubtype::PROBE_REQ => Some(MgmtBody::ProbeReq { elements: bytes }),
            MgmtSubtype::PROBE_RESP => {
                let (probe_resp_hdr, elements) =
                    LayoutVerified::new_unaligned_from_prefix(bytes)?;
                Some(MgmtBody::ProbeResp { probe_resp_hdr, elements })
            }
            MgmtSubtype::AUTH => {
                let (auth_hdr, elements) = LayoutVerified::new_unaligned_from_prefix(bytes)?;
                Some(MgmtBody::Authentication { auth_hdr, elements })
            }
            MgmtSubtype::ASSOC_REQ => {
                let (assoc_req_hdr, elements) =
                    LayoutVerified::new_unaligned_from_prefix(bytes)?;
                Some(MgmtBody::AssociationReq { assoc_req_hdr, elements })
            }
            MgmtSubtype::ASSOC_RESP => {
                let (assoc_resp_hdr, elements) =
                    LayoutVerified::new_unaligned_from_prefix(bytes)?;
                Some(MgmtBody::AssociationResp { assoc_resp_hdr, elements })
            }
            MgmtSubtype::REASSOC_REQ => {
                let (reassoc_req_hdr, elements) =
                    LayoutVerified::new_unaligned_from_prefix(bytes)?;
                Some(MgmtBody::ReassociationReq { reassoc_req_hdr, elements })
            }
            MgmtSubtype::REASSOC_RESP => {
                let (reassoc_resp_hdr, elements) =
                    LayoutVerified::new_unaligned_from_prefix(bytes)?;
                Some(MgmtBody::ReassociationResp { reassoc_resp_hdr, elements })
            }
            MgmtSubtype::DEAUTH => {
                let (deauth_hdr, elements) = LayoutVerified::new_unaligned_from_prefix(bytes)?;
                Some(MgmtBody::Deauthentication { deauth_hdr, elements })
            }
            MgmtSubtype::DISASSOC => {
                let (disassoc_hdr, elements) =
                    LayoutVerified::new_unaligned_from_prefix(bytes)?;
                Some(MgmtBody::Disassociation { disassoc_hdr, elements })
            }
            subtype => Some(MgmtBody::Unsupported { subtype }),
        }
    }
}
