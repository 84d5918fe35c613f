// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! This crate implements the access and association control of an
//! 802.11-style MAC as a library. The implementation is broadly divided
//! between client and AP stations, with the shared channel access engine
//! underneath. See the [`client`], [`ap`] and [`dcf`] modules.
//!
//! The crate is single-threaded and event-driven: an external loop owns the
//! scheduler and the PHY, and advances a station exclusively through the
//! [`MlmeImpl`] entry points. Every handler runs to completion; suspension is
//! always "schedule a timer and return".

pub mod ap;
pub mod client;
pub mod config;
pub mod dcf;
pub mod device;
pub mod error;
pub mod frames;
pub mod stats;

pub use config::{Config, ScanMode};

use {
    crate::error::Error,
    log::info,
    wlan_common::{
        mac::MacAddr,
        sequence::SequenceManager,
        timer::{EventId, Timer},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacRole {
    Client,
    Ap,
}

/// Every timer either role can be waiting on. A fired id that no longer
/// resolves to an event is stale (superseded or cancelled) and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedEvent {
    Access(dcf::AccessTimeout),
    Client(client::ClientEvent),
    Ap(ap::ApEvent),
}

/// Mutable per-interface state shared by the station management machinery
/// and the channel access engine. Owned by exactly one MLME; passed by
/// reference into every transition.
pub struct Context<D> {
    pub config: Config,
    pub device: D,
    pub timer: Timer<TimedEvent>,
    pub seq_mgr: SequenceManager,
    pub counters: stats::Counters,
}

/// The event surface of one station, regardless of role. The external loop
/// feeds timer firings, frames from the medium, payloads from the network
/// layer, and PHY status transitions through these entry points.
pub trait MlmeImpl {
    /// Handles a fired timer. Stale event ids are discarded.
    fn handle_timed_event(&mut self, event_id: EventId);
    /// Handles a frame received from the medium.
    fn handle_mac_frame_rx(&mut self, frame: &[u8], rx_info: device::RxInfo);
    /// Handles a payload the network layer wants transmitted.
    fn handle_eth_frame_tx(&mut self, dst_addr: MacAddr, body: &[u8]) -> Result<(), Error>;
    /// Handles a PHY status transition.
    fn handle_phy_status_changed(&mut self, old: device::PhyStatus, new: device::PhyStatus);
}

pub(crate) fn log_stale_timer(event_id: EventId) {
    info!("ignoring stale timer event {:?}", event_id);
}
