// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Access-point role: periodic beaconing, acceptance of authentication and
//! (re)association requests, and the registry of associated stations.
//!
//! An access point never scans or authenticates; it enters its beaconing
//! steady state directly on [`ApMlme::start`].

mod remote_client;

pub use remote_client::{RemoteClient, RemoteClients, MAX_AID};

use {
    crate::{
        dcf::{ChannelAccess, TxOutcome, TxReport},
        device::{Device, PhyStatus, RxInfo},
        error::Error,
        frames::{self, FrameKind},
        log_stale_timer, Config, Context, MacRole, MlmeImpl, TimedEvent,
    },
    log::{debug, error, info, warn},
    rand::RngCore,
    wlan_common::{
        ie,
        mac::{
            self, Bssid, CapabilityInfo, MacAddr, MacFrame, MgmtBody, StatusCode,
        },
        sequence::SequenceManager,
        time::Duration,
        timer::{EventId, Scheduler, Timer},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApEvent {
    BeaconInterval,
    InactivitySweep,
}

pub struct ApMlme<D> {
    ctx: Context<D>,
    dcf: ChannelAccess,
    clients: RemoteClients,
    beacon_timeout: Option<EventId>,
    sweep_timeout: Option<EventId>,
}

impl<D: Device> ApMlme<D> {
    pub fn new(
        config: Config,
        device: D,
        scheduler: Box<dyn Scheduler>,
        rng: Box<dyn RngCore>,
    ) -> Self {
        let config = config.sanitize();
        let dcf = ChannelAccess::new(&config, rng);
        Self {
            ctx: Context {
                config,
                device,
                timer: Timer::new(scheduler),
                seq_mgr: SequenceManager::new(),
                counters: Default::default(),
            },
            dcf,
            clients: RemoteClients::new(),
            beacon_timeout: None,
            sweep_timeout: None,
        }
    }

    pub fn bssid(&self) -> Bssid {
        Bssid(self.ctx.device.mac_addr())
    }

    pub fn counters(&self) -> &crate::stats::Counters {
        &self.ctx.counters
    }

    pub fn clients(&self) -> &RemoteClients {
        &self.clients
    }

    fn capabilities(&self) -> CapabilityInfo {
        let mut capabilities = CapabilityInfo(0);
        capabilities.set_ess(true);
        capabilities
    }

    /// Brings the BSS up: tunes to the configured channel and starts
    /// beaconing and the inactivity sweep.
    pub fn start(&mut self) {
        let channel = self.ctx.config.station_channel;
        if let Err(e) = self.ctx.device.set_channel(channel) {
            error!("failed setting channel {}: {}", channel, e);
        }
        info!("starting BSS {:02x?} on channel {}", self.bssid().0, channel);
        self.schedule_beacon();
        self.schedule_sweep();
    }

    fn schedule_beacon(&mut self) {
        let interval = Duration::from(self.ctx.config.beacon_interval);
        let id = self.ctx.timer.schedule_after(interval, TimedEvent::Ap(ApEvent::BeaconInterval));
        if let Some(old) = self.beacon_timeout.replace(id) {
            self.ctx.timer.cancel_event(old);
        }
    }

    fn schedule_sweep(&mut self) {
        let interval = self.ctx.config.inactivity_timeout;
        let id = self.ctx.timer.schedule_after(interval, TimedEvent::Ap(ApEvent::InactivitySweep));
        if let Some(old) = self.sweep_timeout.replace(id) {
            self.ctx.timer.cancel_event(old);
        }
    }

    fn handle_ap_event(&mut self, event: ApEvent) {
        match event {
            ApEvent::BeaconInterval => {
                self.emit_beacon();
                self.schedule_beacon();
            }
            ApEvent::InactivitySweep => {
                let now = self.ctx.timer.now();
                let timeout = self.ctx.config.inactivity_timeout;
                for (addr, aid) in self.clients.sweep_inactive(now, timeout) {
                    info!("evicting inactive station {:02x?} (aid {})", addr, aid);
                }
                self.schedule_sweep();
            }
        }
    }

    fn emit_beacon(&mut self) {
        let bssid = self.bssid();
        let seq_num = self.ctx.seq_mgr.next_seq_num(mac::BCAST_ADDR);
        let now = self.ctx.timer.now();
        let timestamp = (now.into_nanos() / 1_000) as u64;
        let ssid = self.ctx.config.ssid.clone();
        let capabilities = self.capabilities();
        match frames::beacon(
            MacRole::Ap,
            bssid,
            seq_num,
            timestamp,
            self.ctx.config.beacon_interval,
            capabilities,
            &ssid,
            self.ctx.config.station_channel,
            now,
        ) {
            Ok(desc) => self.dcf.enqueue_mgmt(&mut self.ctx, desc),
            Err(e) => error!("failed building beacon: {}", e),
        }
    }

    fn enqueue_response(&mut self, desc: frames::FrameDescriptor) {
        self.dcf.enqueue_mgmt(&mut self.ctx, desc);
    }

    fn on_auth_req(&mut self, peer_addr: MacAddr, auth_alg: mac::AuthAlgorithmNumber, txn: u16) {
        let status_code = if auth_alg != mac::AuthAlgorithmNumber::OPEN {
            warn!("refusing authentication with unsupported algorithm {:?}", auth_alg);
            StatusCode::UNSUPPORTED_AUTH_ALGORITHM
        } else if txn != 1 {
            warn!("refusing authentication with unexpected txn {}", txn);
            StatusCode::TRANSACTION_SEQUENCE_ERROR
        } else {
            StatusCode::SUCCESS
        };
        let bssid = self.bssid();
        let seq_num = self.ctx.seq_mgr.next_seq_num(peer_addr);
        let now = self.ctx.timer.now();
        match frames::auth_resp(MacRole::Ap, bssid, peer_addr, seq_num, status_code, now) {
            Ok(desc) => self.enqueue_response(desc),
            Err(e) => error!("failed building authenticate response: {}", e),
        }
    }

    fn on_assoc_req(
        &mut self,
        reassoc: bool,
        peer_addr: MacAddr,
        listen_interval: u16,
        power_save: bool,
        ssid: Option<&[u8]>,
    ) {
        let now = self.ctx.timer.now();
        let (status_code, aid) = if ssid != Some(&self.ctx.config.ssid[..]) {
            // The requester asked for a different network; refuse without
            // creating a record.
            warn!(
                "refusing association of {:02x?}: requested network {:?} is not ours",
                peer_addr,
                ssid.map(String::from_utf8_lossy)
            );
            (StatusCode::REFUSED, 0)
        } else {
            match self.clients.associate(peer_addr, listen_interval, power_save, now) {
                Some(aid) => {
                    info!("associated {:02x?} (aid {})", peer_addr, aid);
                    (StatusCode::SUCCESS, aid)
                }
                None => {
                    warn!("association id pool exhausted; refusing {:02x?}", peer_addr);
                    (StatusCode::DENIED_NO_MORE_STAS, 0)
                }
            }
        };
        let bssid = self.bssid();
        let seq_num = self.ctx.seq_mgr.next_seq_num(peer_addr);
        let capabilities = self.capabilities();
        match frames::assoc_resp(
            MacRole::Ap,
            reassoc,
            bssid,
            peer_addr,
            seq_num,
            capabilities,
            status_code,
            aid,
            now,
        ) {
            Ok(desc) => self.enqueue_response(desc),
            Err(e) => error!("failed building associate response: {}", e),
        }
    }

    fn on_probe_req(&mut self, peer_addr: MacAddr, ssid: Option<&[u8]>) {
        let matches = match ssid {
            // A wildcard probe asks every network to identify itself.
            Some(b"") | None => true,
            Some(requested) => requested == &self.ctx.config.ssid[..],
        };
        if !matches {
            debug!("ignoring probe for a different network from {:02x?}", peer_addr);
            return;
        }
        let bssid = self.bssid();
        let seq_num = self.ctx.seq_mgr.next_seq_num(peer_addr);
        let now = self.ctx.timer.now();
        let ssid = self.ctx.config.ssid.clone();
        let capabilities = self.capabilities();
        match frames::probe_resp(
            MacRole::Ap,
            bssid,
            peer_addr,
            seq_num,
            self.ctx.config.beacon_interval,
            capabilities,
            &ssid,
            self.ctx.config.station_channel,
            now,
        ) {
            Ok(desc) => self.enqueue_response(desc),
            Err(e) => error!("failed building probe response: {}", e),
        }
    }

    fn handle_mgmt_frame(&mut self, mgmt_hdr: &mac::MgmtHdr, body: &[u8]) {
        let frame_ctrl = { mgmt_hdr.frame_ctrl };
        let src_addr = { mgmt_hdr.addr2 };
        let subtype = frame_ctrl.mgmt_subtype();
        let kind = match FrameKind::from_mgmt_subtype(subtype) {
            Some(kind) => kind,
            None => {
                info!("discarding management frame with unknown subtype {:?}", subtype);
                return;
            }
        };
        self.ctx.counters.record_received(kind);
        let body = match MgmtBody::parse(subtype, body) {
            Some(body) => body,
            None => {
                warn!("malformed {:?} frame from {:02x?}", kind, src_addr);
                return;
            }
        };
        match body {
            MgmtBody::Authentication { auth_hdr, .. } => {
                self.on_auth_req(src_addr, { auth_hdr.auth_alg_num }, {
                    auth_hdr.auth_txn_seq_num
                });
            }
            MgmtBody::AssociationReq { assoc_req_hdr, elements } => {
                self.on_assoc_req(
                    false,
                    src_addr,
                    { assoc_req_hdr.listen_interval },
                    frame_ctrl.power_mgmt(),
                    ie::find_ssid(elements),
                );
            }
            MgmtBody::ReassociationReq { reassoc_req_hdr, elements } => {
                self.on_assoc_req(
                    true,
                    src_addr,
                    { reassoc_req_hdr.listen_interval },
                    frame_ctrl.power_mgmt(),
                    ie::find_ssid(elements),
                );
            }
            MgmtBody::ProbeReq { elements } => {
                self.on_probe_req(src_addr, ie::find_ssid(elements));
            }
            MgmtBody::Deauthentication { .. } | MgmtBody::Disassociation { .. } => {
                if let Some(client) = self.clients.remove(&src_addr) {
                    info!("station {:02x?} left (aid {})", src_addr, client.aid);
                }
            }
            MgmtBody::Beacon { .. } | MgmtBody::ProbeResp { .. } => {
                debug!("ignoring beacon/probe response from a neighboring BSS");
            }
            MgmtBody::AssociationResp { .. } | MgmtBody::ReassociationResp { .. } => {
                debug!("ignoring client-side response frame in access-point role");
            }
            MgmtBody::Unsupported { subtype } => {
                info!("discarding management frame with unsupported subtype {:?}", subtype);
            }
        }
    }

    fn handle_data_frame(&mut self, fixed_fields: &mac::FixedDataHdrFields, body: &[u8]) {
        let frame_ctrl = { fixed_fields.frame_ctrl };
        let src_addr = { fixed_fields.addr2 };
        if !frame_ctrl.to_ds() {
            debug!("discarding data frame without ToDS from {:02x?}", src_addr);
            return;
        }
        if !self.clients.contains(&src_addr) {
            warn!("discarding data frame from non-associated station {:02x?}", src_addr);
            return;
        }
        self.ctx.counters.record_received(FrameKind::Data);
        self.ctx.device.deliver_eth_frame(src_addr, body);
    }

    fn process_tx_report(&mut self, report: TxReport) {
        match report.outcome {
            TxOutcome::Delivered => {}
            TxOutcome::Dropped => {
                if report.desc.kind == FrameKind::Data {
                    self.ctx.device.report_tx_drop(report.desc.dst_addr, FrameKind::Data);
                } else {
                    warn!(
                        "{:?} frame to {:02x?} dropped after retry exhaustion",
                        report.desc.kind, report.desc.dst_addr
                    );
                }
            }
        }
    }

    fn after_engine_event(&mut self, report: Option<TxReport>) {
        if let Some(report) = report {
            self.process_tx_report(report);
        }
    }
}

impl<D: Device> MlmeImpl for ApMlme<D> {
    fn handle_timed_event(&mut self, event_id: EventId) {
        match self.ctx.timer.triggered(&event_id) {
            Some(TimedEvent::Access(timeout)) => {
                let report = self.dcf.handle_timeout(&mut self.ctx, timeout);
                self.after_engine_event(report);
            }
            Some(TimedEvent::Ap(event)) => self.handle_ap_event(event),
            Some(TimedEvent::Client(event)) => {
                warn!("discarding client event {:?} in access-point role", event)
            }
            None => log_stale_timer(event_id),
        }
    }

    fn handle_mac_frame_rx(&mut self, frame: &[u8], _rx_info: RxInfo) {
        match MacFrame::parse(frame) {
            Some(MacFrame::Mgmt { mgmt_hdr, body }) => {
                let dst_addr = { mgmt_hdr.addr1 };
                let src_addr = { mgmt_hdr.addr2 };
                let seq_num = { mgmt_hdr.seq_ctrl }.seq_num();
                let duration = { mgmt_hdr.duration };
                // Any frame from a known station counts as contact.
                let now = self.ctx.timer.now();
                self.clients.refresh(&src_addr, now);
                match self.dcf.on_peer_frame(&mut self.ctx, dst_addr, src_addr, seq_num, duration)
                {
                    crate::dcf::RxDisposition::Deliver => self.handle_mgmt_frame(&mgmt_hdr, body),
                    crate::dcf::RxDisposition::Duplicate
                    | crate::dcf::RxDisposition::NotForUs => {}
                }
            }
            Some(MacFrame::Data { fixed_fields, body }) => {
                let dst_addr = { fixed_fields.addr1 };
                let src_addr = { fixed_fields.addr2 };
                let seq_num = { fixed_fields.seq_ctrl }.seq_num();
                let duration = { fixed_fields.duration };
                let now = self.ctx.timer.now();
                self.clients.refresh(&src_addr, now);
                match self.dcf.on_peer_frame(&mut self.ctx, dst_addr, src_addr, seq_num, duration)
                {
                    crate::dcf::RxDisposition::Deliver => {
                        self.handle_data_frame(&fixed_fields, body)
                    }
                    crate::dcf::RxDisposition::Duplicate
                    | crate::dcf::RxDisposition::NotForUs => {}
                }
            }
            Some(MacFrame::Rts { rts_hdr }) => {
                let ra = { rts_hdr.ra };
                let ta = { rts_hdr.ta };
                let duration = { rts_hdr.duration };
                self.dcf.on_rts(&mut self.ctx, ra, ta, duration);
            }
            Some(MacFrame::Cts { cts_hdr }) => {
                let ra = { cts_hdr.ra };
                let duration = { cts_hdr.duration };
                self.dcf.on_cts(&mut self.ctx, ra, duration);
            }
            Some(MacFrame::Ack { ack_hdr }) => {
                let ra = { ack_hdr.ra };
                let duration = { ack_hdr.duration };
                let report = self.dcf.on_ack(&mut self.ctx, ra, duration);
                self.after_engine_event(report);
            }
            Some(MacFrame::Unsupported { frame_ctrl }) => {
                info!("discarding frame with unsupported type {:?}", frame_ctrl.frame_type());
            }
            None => warn!("discarding malformed frame ({} bytes)", frame.len()),
        }
    }

    fn handle_eth_frame_tx(&mut self, dst_addr: MacAddr, body: &[u8]) -> Result<(), Error> {
        if mac::is_unicast(dst_addr) && !self.clients.contains(&dst_addr) {
            return Err(Error::PeerNotAssociated);
        }
        let bssid = self.bssid();
        let seq_num = self.ctx.seq_mgr.next_seq_num(dst_addr);
        let now = self.ctx.timer.now();
        let desc = frames::ap_data(bssid, dst_addr, bssid.0, seq_num, body, now);
        self.dcf.enqueue_data(&mut self.ctx, desc);
        Ok(())
    }

    fn handle_phy_status_changed(&mut self, old: PhyStatus, new: PhyStatus) {
        let report = self.dcf.handle_phy_status_changed(&mut self.ctx, old, new);
        self.after_engine_event(report);
    }
}
