// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{error::Error, frames::FrameKind},
    wlan_common::mac::{Bssid, MacAddr},
};

#[cfg(test)]
pub use test_utils::*;

/// State reported by the PHY alongside every status change.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PhyStatus {
    Off,
    Idle,
    Sensing,
    Receiving,
    Transmitting,
}

impl PhyStatus {
    /// Whether the medium counts as busy for carrier sensing.
    pub fn is_busy(&self) -> bool {
        !matches!(self, PhyStatus::Idle)
    }
}

/// Receive metadata the PHY attaches to every frame it hands up.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RxInfo {
    pub rssi_dbm: i8,
    pub channel: u8,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LinkStatus {
    Down,
    Up(Bssid),
}

/// The boundary to everything outside the MAC: the PHY below it and the
/// network layer above it. All methods are fire-and-forget from the MAC's
/// point of view; results arrive back as events.
pub trait Device {
    fn mac_addr(&self) -> MacAddr;

    /// Hand a fully built frame to the PHY for transmission on the current
    /// channel.
    fn send_wlan_frame(&mut self, frame: &[u8]) -> Result<(), Error>;

    /// Request the PHY to tune to `channel`. If successful, `channel()`
    /// returns the new value.
    fn set_channel(&mut self, channel: u8) -> Result<(), Error>;

    fn channel(&self) -> u8;

    /// Whether the radio is able to listen on `channel`; scan skips channels
    /// it cannot.
    fn can_listen_on(&self, channel: u8) -> bool;

    /// Deliver a received payload to the network layer.
    fn deliver_eth_frame(&mut self, src_addr: MacAddr, body: &[u8]);

    /// Tell the network layer this interface is reachable through `bssid`.
    fn set_link_up(&mut self, bssid: Bssid);

    fn set_link_down(&mut self);

    /// Surface a frame lost to retry exhaustion.
    fn report_tx_drop(&mut self, peer_addr: MacAddr, frame_kind: FrameKind);
}
