// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-frame-type counters. The MAC only accumulates; an external statistics
//! sink decides what to do with the totals.

use crate::frames::FrameKind;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PacketCounter {
    pub sent: u64,
    pub received: u64,
    pub dropped: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Counters {
    pub beacon: PacketCounter,
    pub probe_req: PacketCounter,
    pub probe_resp: PacketCounter,
    pub auth: PacketCounter,
    pub assoc_req: PacketCounter,
    pub assoc_resp: PacketCounter,
    pub reassoc_req: PacketCounter,
    pub reassoc_resp: PacketCounter,
    pub disassoc: PacketCounter,
    pub deauth: PacketCounter,
    pub data: PacketCounter,
    pub rts: PacketCounter,
    pub cts: PacketCounter,
    pub ack: PacketCounter,
    /// Unicast frames whose sequence number repeated the last accepted one
    /// and were therefore not delivered upward.
    pub duplicates: u64,
}

impl Counters {
    fn counter_mut(&mut self, kind: FrameKind) -> &mut PacketCounter {
        match kind {
            FrameKind::Beacon => &mut self.beacon,
            FrameKind::ProbeReq => &mut self.probe_req,
            FrameKind::ProbeResp => &mut self.probe_resp,
            FrameKind::Auth => &mut self.auth,
            FrameKind::AssocReq => &mut self.assoc_req,
            FrameKind::AssocResp => &mut self.assoc_resp,
            FrameKind::ReassocReq => &mut self.reassoc_req,
            FrameKind::ReassocResp => &mut self.reassoc_resp,
            FrameKind::Disassoc => &mut self.disassoc,
            FrameKind::Deauth => &mut self.deauth,
            FrameKind::Data => &mut self.data,
            FrameKind::Rts => &mut self.rts,
            FrameKind::Cts => &mut self.cts,
            FrameKind::Ack => &mut self.ack,
        }
    }

    pub fn record_sent(&mut self, kind: FrameKind) {
        self.counter_mut(kind).sent += 1;
    }

    pub fn record_received(&mut self, kind: FrameKind) {
        self.counter_mut(kind).received += 1;
    }

    pub fn record_dropped(&mut self, kind: FrameKind) {
        self.counter_mut(kind).dropped += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.duplicates += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_kind() {
        let mut counters = Counters::default();
        counters.record_sent(FrameKind::Auth);
        counters.record_sent(FrameKind::Auth);
        counters.record_received(FrameKind::Auth);
        counters.record_dropped(FrameKind::Data);
        counters.record_duplicate();

        assert_eq!(counters.auth.sent, 2);
        assert_eq!(counters.auth.received, 1);
        assert_eq!(counters.auth.dropped, 0);
        assert_eq!(counters.data.dropped, 1);
        assert_eq!(counters.duplicates, 1);
        assert_eq!(counters.beacon, PacketCounter::default());
    }
}
