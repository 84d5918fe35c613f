// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Builders pairing each management action with a ready-to-transmit frame.
//!
//! Builders validate the caller's role: a station cannot build access-point
//! responses and vice versa. Misuse returns [`Error::UnsupportedRole`]
//! instead of producing a frame.

use {
    crate::{dcf, error::Error, MacRole},
    wlan_common::{
        ie,
        mac::{
            AckHdr, AssocReqHdr, AssocRespHdr, AuthAlgorithmNumber, AuthHdr, BeaconHdr, Bssid,
            CapabilityInfo, CtrlSubtype, CtsHdr, DeauthHdr, DisassocHdr, FixedDataHdrFields,
            FrameControl, FrameType, MacAddr, MgmtHdr, MgmtSubtype, ReasonCode, ReassocReqHdr,
            RtsHdr, SequenceControl, StatusCode, BCAST_ADDR,
        },
        time::{Time, TimeUnit},
    },
    zerocopy::AsBytes,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Beacon,
    ProbeReq,
    ProbeResp,
    Auth,
    AssocReq,
    AssocResp,
    ReassocReq,
    ReassocResp,
    Disassoc,
    Deauth,
    Data,
    Rts,
    Cts,
    Ack,
}

impl FrameKind {
    pub fn from_mgmt_subtype(subtype: MgmtSubtype) -> Option<FrameKind> {
        match subtype {
            MgmtSubtype::BEACON => Some(FrameKind::Beacon),
            MgmtSubtype::PROBE_REQ => Some(FrameKind::ProbeReq),
            MgmtSubtype::PROBE_RESP => Some(FrameKind::ProbeResp),
            MgmtSubtype::AUTH => Some(FrameKind::Auth),
            MgmtSubtype::ASSOC_REQ => Some(FrameKind::AssocReq),
            MgmtSubtype::ASSOC_RESP => Some(FrameKind::AssocResp),
            MgmtSubtype::REASSOC_REQ => Some(FrameKind::ReassocReq),
            MgmtSubtype::REASSOC_RESP => Some(FrameKind::ReassocResp),
            MgmtSubtype::DISASSOC => Some(FrameKind::Disassoc),
            MgmtSubtype::DEAUTH => Some(FrameKind::Deauth),
            _ => None,
        }
    }

    /// Frames whose loss means an authentication or (re)association attempt
    /// can no longer complete.
    pub fn is_connection_mgmt(&self) -> bool {
        matches!(self, FrameKind::Auth | FrameKind::AssocReq | FrameKind::ReassocReq)
    }
}

/// A frame queued for transmission, paired with the metadata the channel
/// access engine needs. Consumed exactly once: freed on transmission
/// completion or on drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub kind: FrameKind,
    pub bytes: Vec<u8>,
    pub src_addr: MacAddr,
    pub dst_addr: MacAddr,
    pub enqueued_at: Time,
}

impl FrameDescriptor {
    pub fn new(
        kind: FrameKind,
        bytes: Vec<u8>,
        src_addr: MacAddr,
        dst_addr: MacAddr,
        enqueued_at: Time,
    ) -> Self {
        Self { kind, bytes, src_addr, dst_addr, enqueued_at }
    }

    pub fn needs_ack(&self) -> bool {
        wlan_common::mac::is_unicast(self.dst_addr)
    }

    /// Marks the frame as a retransmission. The sequence number is left
    /// untouched so the receiver can recognize the repeat.
    pub fn set_retry(&mut self) {
        if self.bytes.len() < 2 {
            return;
        }
        let mut frame_ctrl = FrameControl(u16::from_le_bytes([self.bytes[0], self.bytes[1]]));
        frame_ctrl.set_retry(true);
        self.bytes[0..2].copy_from_slice(&frame_ctrl.0.to_le_bytes());
    }
}

fn append<T: AsBytes>(buf: &mut Vec<u8>, value: &T) {
    buf.extend_from_slice(value.as_bytes());
}

fn mgmt_frame_ctrl(subtype: MgmtSubtype) -> FrameControl {
    let mut frame_ctrl = FrameControl(0);
    frame_ctrl.set_frame_type(FrameType::MGMT);
    frame_ctrl.set_mgmt_subtype(subtype);
    frame_ctrl
}

fn ctrl_frame_ctrl(subtype: CtrlSubtype) -> FrameControl {
    let mut frame_ctrl = FrameControl(0);
    frame_ctrl.set_frame_type(FrameType::CTRL);
    frame_ctrl.set_ctrl_subtype(subtype);
    frame_ctrl
}

/// Duration announced by a unicast frame: the SIFS and ACK that complete its
/// exchange. Broadcast frames announce zero.
fn frame_duration(dst_addr: MacAddr) -> u16 {
    if wlan_common::mac::is_unicast(dst_addr) {
        dcf::SIFS_MICROS + dcf::ACK_TX_MICROS
    } else {
        0
    }
}

fn write_mgmt_hdr(
    buf: &mut Vec<u8>,
    subtype: MgmtSubtype,
    dst_addr: MacAddr,
    src_addr: MacAddr,
    bssid: MacAddr,
    seq_num: u16,
) {
    append(
        buf,
        &MgmtHdr {
            frame_ctrl: mgmt_frame_ctrl(subtype),
            duration: frame_duration(dst_addr),
            addr1: dst_addr,
            addr2: src_addr,
            addr3: bssid,
            seq_ctrl: SequenceControl::from_seq_num(seq_num),
        },
    );
}

fn expect_role(actual: MacRole, required: MacRole) -> Result<(), Error> {
    if actual == required {
        Ok(())
    } else {
        Err(Error::UnsupportedRole(actual))
    }
}

/// IEEE Std 802.11-2016, 11.3.4.2: open-system authentication, first frame of
/// the transaction.
pub fn auth_req(
    role: MacRole,
    sta_addr: MacAddr,
    bssid: Bssid,
    seq_num: u16,
    now: Time,
) -> Result<FrameDescriptor, Error> {
    expect_role(role, MacRole::Client)?;
    let mut buf = vec![];
    write_mgmt_hdr(&mut buf, MgmtSubtype::AUTH, bssid.0, sta_addr, bssid.0, seq_num);
    append(
        &mut buf,
        &AuthHdr {
            auth_alg_num: AuthAlgorithmNumber::OPEN,
            auth_txn_seq_num: 1,
            status_code: StatusCode::SUCCESS,
        },
    );
    Ok(FrameDescriptor::new(FrameKind::Auth, buf, sta_addr, bssid.0, now))
}

/// IEEE Std 802.11-2016, 11.3.4.3: second (final) frame of the open-system
/// transaction, carrying the verdict.
pub fn auth_resp(
    role: MacRole,
    bssid: Bssid,
    peer_addr: MacAddr,
    seq_num: u16,
    status_code: StatusCode,
    now: Time,
) -> Result<FrameDescriptor, Error> {
    expect_role(role, MacRole::Ap)?;
    let mut buf = vec![];
    write_mgmt_hdr(&mut buf, MgmtSubtype::AUTH, peer_addr, bssid.0, bssid.0, seq_num);
    append(
        &mut buf,
        &AuthHdr {
            auth_alg_num: AuthAlgorithmNumber::OPEN,
            auth_txn_seq_num: 2,
            status_code,
        },
    );
    Ok(FrameDescriptor::new(FrameKind::Auth, buf, bssid.0, peer_addr, now))
}

pub fn assoc_req(
    role: MacRole,
    sta_addr: MacAddr,
    bssid: Bssid,
    seq_num: u16,
    capabilities: CapabilityInfo,
    listen_interval: u16,
    ssid: &[u8],
    now: Time,
) -> Result<FrameDescriptor, Error> {
    expect_role(role, MacRole::Client)?;
    let mut buf = vec![];
    write_mgmt_hdr(&mut buf, MgmtSubtype::ASSOC_REQ, bssid.0, sta_addr, bssid.0, seq_num);
    append(&mut buf, &AssocReqHdr { capabilities, listen_interval });
    ie::write_ssid(&mut buf, ssid)?;
    Ok(FrameDescriptor::new(FrameKind::AssocReq, buf, sta_addr, bssid.0, now))
}

pub fn reassoc_req(
    role: MacRole,
    sta_addr: MacAddr,
    new_bssid: Bssid,
    current_ap: Bssid,
    seq_num: u16,
    capabilities: CapabilityInfo,
    listen_interval: u16,
    ssid: &[u8],
    now: Time,
) -> Result<FrameDescriptor, Error> {
    expect_role(role, MacRole::Client)?;
    let mut buf = vec![];
    write_mgmt_hdr(&mut buf, MgmtSubtype::REASSOC_REQ, new_bssid.0, sta_addr, new_bssid.0, seq_num);
    append(
        &mut buf,
        &ReassocReqHdr { capabilities, listen_interval, current_ap: current_ap.0 },
    );
    ie::write_ssid(&mut buf, ssid)?;
    Ok(FrameDescriptor::new(FrameKind::ReassocReq, buf, sta_addr, new_bssid.0, now))
}

/// Association and reassociation responses share a body; `reassoc` selects
/// the subtype echoed back.
pub fn assoc_resp(
    role: MacRole,
    reassoc: bool,
    bssid: Bssid,
    peer_addr: MacAddr,
    seq_num: u16,
    capabilities: CapabilityInfo,
    status_code: StatusCode,
    aid: u16,
    now: Time,
) -> Result<FrameDescriptor, Error> {
    expect_role(role, MacRole::Ap)?;
    let (subtype, kind) = if reassoc {
        (MgmtSubtype::REASSOC_RESP, FrameKind::ReassocResp)
    } else {
        (MgmtSubtype::ASSOC_RESP, FrameKind::AssocResp)
    };
    let mut buf = vec![];
    write_mgmt_hdr(&mut buf, subtype, peer_addr, bssid.0, bssid.0, seq_num);
    append(&mut buf, &AssocRespHdr { capabilities, status_code, aid });
    Ok(FrameDescriptor::new(kind, buf, bssid.0, peer_addr, now))
}

pub fn probe_req(
    role: MacRole,
    sta_addr: MacAddr,
    ssid: &[u8],
    seq_num: u16,
    now: Time,
) -> Result<FrameDescriptor, Error> {
    expect_role(role, MacRole::Client)?;
    let mut buf = vec![];
    write_mgmt_hdr(&mut buf, MgmtSubtype::PROBE_REQ, BCAST_ADDR, sta_addr, BCAST_ADDR, seq_num);
    ie::write_ssid(&mut buf, ssid)?;
    Ok(FrameDescriptor::new(FrameKind::ProbeReq, buf, sta_addr, BCAST_ADDR, now))
}

pub fn probe_resp(
    role: MacRole,
    bssid: Bssid,
    peer_addr: MacAddr,
    seq_num: u16,
    beacon_interval: TimeUnit,
    capabilities: CapabilityInfo,
    ssid: &[u8],
    channel: u8,
    now: Time,
) -> Result<FrameDescriptor, Error> {
    expect_role(role, MacRole::Ap)?;
    let mut buf = vec![];
    write_mgmt_hdr(&mut buf, MgmtSubtype::PROBE_RESP, peer_addr, bssid.0, bssid.0, seq_num);
    append(&mut buf, &BeaconHdr { timestamp: 0, beacon_interval, capabilities });
    ie::write_ssid(&mut buf, ssid)?;
    buf.extend_from_slice(&[ie::DSSS_PARAM_SET_ID, 1, channel]);
    Ok(FrameDescriptor::new(FrameKind::ProbeResp, buf, bssid.0, peer_addr, now))
}

pub fn beacon(
    role: MacRole,
    bssid: Bssid,
    seq_num: u16,
    timestamp: u64,
    beacon_interval: TimeUnit,
    capabilities: CapabilityInfo,
    ssid: &[u8],
    channel: u8,
    now: Time,
) -> Result<FrameDescriptor, Error> {
    expect_role(role, MacRole::Ap)?;
    let mut buf = vec![];
    write_mgmt_hdr(&mut buf, MgmtSubtype::BEACON, BCAST_ADDR, bssid.0, bssid.0, seq_num);
    append(&mut buf, &BeaconHdr { timestamp, beacon_interval, capabilities });
    ie::write_ssid(&mut buf, ssid)?;
    buf.extend_from_slice(&[ie::DSSS_PARAM_SET_ID, 1, channel]);
    Ok(FrameDescriptor::new(FrameKind::Beacon, buf, bssid.0, BCAST_ADDR, now))
}

pub fn deauth(
    src_addr: MacAddr,
    peer_addr: MacAddr,
    bssid: Bssid,
    seq_num: u16,
    reason_code: ReasonCode,
    now: Time,
) -> FrameDescriptor {
    let mut buf = vec![];
    write_mgmt_hdr(&mut buf, MgmtSubtype::DEAUTH, peer_addr, src_addr, bssid.0, seq_num);
    append(&mut buf, &DeauthHdr { reason_code });
    FrameDescriptor::new(FrameKind::Deauth, buf, src_addr, peer_addr, now)
}

pub fn disassoc(
    src_addr: MacAddr,
    peer_addr: MacAddr,
    bssid: Bssid,
    seq_num: u16,
    reason_code: ReasonCode,
    now: Time,
) -> FrameDescriptor {
    let mut buf = vec![];
    write_mgmt_hdr(&mut buf, MgmtSubtype::DISASSOC, peer_addr, src_addr, bssid.0, seq_num);
    append(&mut buf, &DisassocHdr { reason_code });
    FrameDescriptor::new(FrameKind::Disassoc, buf, src_addr, peer_addr, now)
}

/// Data frame from a station toward the distribution system (ToDS).
pub fn client_data(
    sta_addr: MacAddr,
    bssid: Bssid,
    dst_addr: MacAddr,
    seq_num: u16,
    payload: &[u8],
    now: Time,
) -> FrameDescriptor {
    let mut frame_ctrl = FrameControl(0);
    frame_ctrl.set_frame_type(FrameType::DATA);
    frame_ctrl.set_to_ds(true);
    let mut buf = vec![];
    append(
        &mut buf,
        &FixedDataHdrFields {
            frame_ctrl,
            duration: frame_duration(bssid.0),
            addr1: bssid.0,
            addr2: sta_addr,
            addr3: dst_addr,
            seq_ctrl: SequenceControl::from_seq_num(seq_num),
        },
    );
    buf.extend_from_slice(payload);
    FrameDescriptor::new(FrameKind::Data, buf, sta_addr, bssid.0, now)
}

/// Data frame from an access point toward one of its stations (FromDS).
pub fn ap_data(
    bssid: Bssid,
    peer_addr: MacAddr,
    src_addr: MacAddr,
    seq_num: u16,
    payload: &[u8],
    now: Time,
) -> FrameDescriptor {
    let mut frame_ctrl = FrameControl(0);
    frame_ctrl.set_frame_type(FrameType::DATA);
    frame_ctrl.set_from_ds(true);
    let mut buf = vec![];
    append(
        &mut buf,
        &FixedDataHdrFields {
            frame_ctrl,
            duration: frame_duration(peer_addr),
            addr1: peer_addr,
            addr2: bssid.0,
            addr3: src_addr,
            seq_ctrl: SequenceControl::from_seq_num(seq_num),
        },
    );
    buf.extend_from_slice(payload);
    FrameDescriptor::new(FrameKind::Data, buf, bssid.0, peer_addr, now)
}

pub fn rts(ta: MacAddr, ra: MacAddr, duration: u16) -> Vec<u8> {
    let mut buf = vec![];
    append(&mut buf, &RtsHdr { frame_ctrl: ctrl_frame_ctrl(CtrlSubtype::RTS), duration, ra, ta });
    buf
}

pub fn cts(ra: MacAddr, duration: u16) -> Vec<u8> {
    let mut buf = vec![];
    append(&mut buf, &CtsHdr { frame_ctrl: ctrl_frame_ctrl(CtrlSubtype::CTS), duration, ra });
    buf
}

pub fn ack(ra: MacAddr) -> Vec<u8> {
    let mut buf = vec![];
    append(&mut buf, &AckHdr { frame_ctrl: ctrl_frame_ctrl(CtrlSubtype::ACK), duration: 0, ra });
    buf
}
