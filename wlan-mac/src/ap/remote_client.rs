// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-station association records kept by an access point.

use {
    std::collections::HashMap,
    wlan_common::{
        mac::MacAddr,
        time::{Duration, Time},
    },
};

// IEEE Std 802.11-2016, 9.4.1.8: association ids are 1..=2007.
pub const MAX_AID: u16 = 2007;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteClient {
    pub aid: u16,
    pub listen_interval: u16,
    pub power_save: bool,
    pub last_contact: Time,
}

/// The registry of associated stations, keyed by address. Association ids
/// come from an index-based free pool: the lowest id not currently held by
/// any record. An evicted id becomes reusable immediately; there is no
/// generation counter guarding against a stale holder.
#[derive(Debug, Default)]
pub struct RemoteClients {
    clients: HashMap<MacAddr, RemoteClient>,
}

impl RemoteClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn get(&self, addr: &MacAddr) -> Option<&RemoteClient> {
        self.clients.get(addr)
    }

    pub fn contains(&self, addr: &MacAddr) -> bool {
        self.clients.contains_key(addr)
    }

    /// Creates or refreshes a record. A station that is already associated
    /// keeps its assigned id. Returns `None` when the id pool is exhausted.
    pub fn associate(
        &mut self,
        addr: MacAddr,
        listen_interval: u16,
        power_save: bool,
        now: Time,
    ) -> Option<u16> {
        if let Some(existing) = self.clients.get_mut(&addr) {
            existing.listen_interval = listen_interval;
            existing.power_save = power_save;
            existing.last_contact = now;
            return Some(existing.aid);
        }
        let aid = self.lowest_free_aid()?;
        self.clients.insert(
            addr,
            RemoteClient { aid, listen_interval, power_save, last_contact: now },
        );
        Some(aid)
    }

    fn lowest_free_aid(&self) -> Option<u16> {
        (1..=MAX_AID).find(|aid| !self.clients.values().any(|c| c.aid == *aid))
    }

    /// Refreshes the last-contact timestamp; returns whether the station is
    /// known.
    pub fn refresh(&mut self, addr: &MacAddr, now: Time) -> bool {
        match self.clients.get_mut(addr) {
            Some(client) => {
                client.last_contact = now;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, addr: &MacAddr) -> Option<RemoteClient> {
        self.clients.remove(addr)
    }

    /// Evicts every record whose age since last contact exceeds `timeout`,
    /// releasing its association id back to the pool. Returns the evicted
    /// stations.
    pub fn sweep_inactive(&mut self, now: Time, timeout: Duration) -> Vec<(MacAddr, u16)> {
        let expired: Vec<(MacAddr, u16)> = self
            .clients
            .iter()
            .filter(|(_, client)| now - client.last_contact > timeout)
            .map(|(addr, client)| (*addr, client.aid))
            .collect();
        for (addr, _) in &expired {
            self.clients.remove(addr);
        }
        expired
    }
}
