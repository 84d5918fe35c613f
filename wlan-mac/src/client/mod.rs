// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Client-station management: scanning, authentication, association and the
//! joined steady state, including handover to a stronger access point.

mod lost_bss;
mod scanner;

pub use scanner::{Candidate, Scanner};

use {
    crate::{
        dcf::{ChannelAccess, TxOutcome, TxReport},
        device::{Device, PhyStatus, RxInfo},
        error::Error,
        frames::{self, FrameKind},
        log_stale_timer, Config, Context, MacRole, MlmeImpl, TimedEvent,
    },
    lost_bss::LostBssCounter,
    log::{debug, error, info, warn},
    rand::RngCore,
    wlan_common::{
        energy::DecibelMilliWatt,
        ewma_signal::EwmaSignalStrength,
        ie,
        mac::{
            Bssid, CapabilityInfo, MacAddr, MacFrame, MgmtBody, StatusCode,
        },
        sequence::SequenceManager,
        time::Duration,
        timer::{EventId, Scheduler, Timer},
    },
};

/// Listen interval announced in (re)association requests, in beacon periods.
const LISTEN_INTERVAL_BCN_PERIODS: u16 = 10;

/// How long to wait for the response of an authentication or (re)association
/// exchange, in beacon periods of the target access point.
const MGMT_RESPONSE_TIMEOUT_BCN_PERIODS: u32 = 20;

/// Cadence of the beacon-loss check while joined, in beacon periods.
const LOST_BSS_CHECK_BCN_PERIODS: u32 = 10;

/// Beacon periods without any beacon from the joined access point before the
/// association is considered lost.
const LOST_BSS_TIMEOUT_BCN_PERIODS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    ScanDwell,
    AuthTimeout,
    AssocTimeout,
    ReassocTimeout,
    LostBssCheck,
}

/// The access point a station is currently joined to.
#[derive(Debug, Clone)]
struct JoinedAp {
    bssid: Bssid,
    ssid: Vec<u8>,
    channel: u8,
    beacon_interval: wlan_common::TimeUnit,
    capabilities: CapabilityInfo,
    aid: u16,
    signal: EwmaSignalStrength,
}

enum ClientState {
    Idle,
    Scanning,
    Authenticating { target: Candidate, timeout: EventId },
    Associating { target: Candidate, timeout: EventId },
    Joined { ap: JoinedAp, lost_bss: LostBssCounter, check: EventId },
    Reassociating { current: JoinedAp, target: Candidate, timeout: EventId },
}

pub struct ClientMlme<D> {
    ctx: Context<D>,
    dcf: ChannelAccess,
    scanner: Scanner,
    state: ClientState,
    /// A reset requested while the engine was mid-exchange; honored as soon
    /// as the engine returns to idle.
    pending_reset: bool,
}

impl<D: Device> ClientMlme<D> {
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
            scanner: Scanner::new(),
            state: ClientState::Idle,
            pending_reset: false,
        }
    }

    pub fn counters(&self) -> &crate::stats::Counters {
        &self.ctx.counters
    }

    pub fn bssid(&self) -> Option<Bssid> {
        match &self.state {
            ClientState::Joined { ap, .. } => Some(ap.bssid),
            _ => None,
        }
    }

    /// Brings the station up: begins discovery of an access point.
    pub fn start(&mut self) {
        self.start_scan();
    }

    /// Begins a (re)scan. While joined this runs in the background and may
    /// end in a handover; otherwise it feeds the join attempt.
    pub fn start_scan(&mut self) {
        if self.scanner.start(&mut self.ctx, &mut self.dcf) {
            if matches!(self.state, ClientState::Idle) {
                self.state = ClientState::Scanning;
            }
        } else if matches!(self.state, ClientState::Idle | ClientState::Scanning) {
            warn!("scan could not start; station stays idle");
            self.state = ClientState::Idle;
        }
    }

    fn client_capabilities() -> CapabilityInfo {
        let mut capabilities = CapabilityInfo(0);
        capabilities.set_ess(true);
        capabilities
    }

    fn response_timeout(&mut self, target: &Candidate, event: ClientEvent) -> EventId {
        let duration =
            Duration::from(target.beacon_interval) * MGMT_RESPONSE_TIMEOUT_BCN_PERIODS as i64;
        self.ctx.timer.schedule_after(duration, TimedEvent::Client(event))
    }

    fn on_scan_complete(&mut self) {
        let best = self.scanner.best_candidate(&self.ctx).cloned();
        let margin = self.ctx.config.handover_margin_db;
        let state = std::mem::replace(&mut self.state, ClientState::Idle);
        match state {
            ClientState::Joined { ap, lost_bss, check } => {
                // Scanning may have left us off-channel.
                if let Err(e) = self.ctx.device.set_channel(ap.channel) {
                    error!("failed returning to channel {}: {}", ap.channel, e);
                }
                let handover = best.filter(|cand| {
                    cand.bssid != ap.bssid && cand.signal.dbm() >= ap.signal.dbm() + margin
                });
                match handover {
                    Some(target) => {
                        info!(
                            "handover: {:02x?} at {:?} beats {:02x?} at {:?} by >= {} dB",
                            target.bssid.0,
                            target.signal.dbm(),
                            ap.bssid.0,
                            ap.signal.dbm(),
                            margin
                        );
                        self.ctx.timer.cancel_event(check);
                        self.begin_reassociate(ap, target);
                    }
                    None => self.state = ClientState::Joined { ap, lost_bss, check },
                }
            }
            _ => match best {
                Some(target) => self.begin_authenticate(target),
                None => {
                    warn!("no suitable access point found");
                }
            },
        }
    }

    fn begin_authenticate(&mut self, target: Candidate) {
        if let Err(e) = self.ctx.device.set_channel(target.channel) {
            error!("failed setting channel {}: {}", target.channel, e);
        }
        let own_addr = self.ctx.device.mac_addr();
        let seq_num = self.ctx.seq_mgr.next_seq_num(target.bssid.0);
        let now = self.ctx.timer.now();
        match frames::auth_req(MacRole::Client, own_addr, target.bssid, seq_num, now) {
            Ok(desc) => {
                info!("authenticating with {:02x?}", target.bssid.0);
                self.dcf.enqueue_mgmt(&mut self.ctx, desc);
                let timeout = self.response_timeout(&target, ClientEvent::AuthTimeout);
                self.state = ClientState::Authenticating { target, timeout };
            }
            Err(e) => {
                error!("failed building authenticate request: {}", e);
                self.state = ClientState::Idle;
            }
        }
    }

    fn begin_associate(&mut self, target: Candidate) {
        let own_addr = self.ctx.device.mac_addr();
        let seq_num = self.ctx.seq_mgr.next_seq_num(target.bssid.0);
        let now = self.ctx.timer.now();
        match frames::assoc_req(
            MacRole::Client,
            own_addr,
            target.bssid,
            seq_num,
            Self::client_capabilities(),
            LISTEN_INTERVAL_BCN_PERIODS,
            &target.ssid,
            now,
        ) {
            Ok(desc) => {
                self.dcf.enqueue_mgmt(&mut self.ctx, desc);
                let timeout = self.response_timeout(&target, ClientEvent::AssocTimeout);
                self.state = ClientState::Associating { target, timeout };
            }
            Err(e) => {
                error!("failed building associate request: {}", e);
                self.state = ClientState::Idle;
            }
        }
    }

    fn begin_reassociate(&mut self, current: JoinedAp, target: Candidate) {
        if let Err(e) = self.ctx.device.set_channel(target.channel) {
            error!("failed setting channel {}: {}", target.channel, e);
        }
        let own_addr = self.ctx.device.mac_addr();
        let seq_num = self.ctx.seq_mgr.next_seq_num(target.bssid.0);
        let now = self.ctx.timer.now();
        match frames::reassoc_req(
            MacRole::Client,
            own_addr,
            target.bssid,
            current.bssid,
            seq_num,
            Self::client_capabilities(),
            LISTEN_INTERVAL_BCN_PERIODS,
            &target.ssid,
            now,
        ) {
            Ok(desc) => {
                self.dcf.enqueue_mgmt(&mut self.ctx, desc);
                let timeout = self.response_timeout(&target, ClientEvent::ReassocTimeout);
                self.state = ClientState::Reassociating { current, target, timeout };
            }
            Err(e) => {
                error!("failed building reassociate request: {}", e);
                self.return_to_joined(current);
            }
        }
    }

    fn enter_joined(&mut self, target: Candidate, aid: u16) {
        info!("joined {:02x?} (aid {})", target.bssid.0, aid);
        self.ctx.device.set_link_up(target.bssid);
        let lost_bss = LostBssCounter::start(target.beacon_interval, LOST_BSS_TIMEOUT_BCN_PERIODS);
        let check = self.schedule_lost_bss_check(target.beacon_interval);
        self.state = ClientState::Joined {
            ap: JoinedAp {
                bssid: target.bssid,
                ssid: target.ssid,
                channel: target.channel,
                beacon_interval: target.beacon_interval,
                capabilities: target.capabilities,
                aid,
                signal: target.signal,
            },
            lost_bss,
            check,
        };
    }

    /// Falls back to the current access point after a failed handover.
    fn return_to_joined(&mut self, ap: JoinedAp) {
        if let Err(e) = self.ctx.device.set_channel(ap.channel) {
            error!("failed returning to channel {}: {}", ap.channel, e);
        }
        let lost_bss = LostBssCounter::start(ap.beacon_interval, LOST_BSS_TIMEOUT_BCN_PERIODS);
        let check = self.schedule_lost_bss_check(ap.beacon_interval);
        self.state = ClientState::Joined { ap, lost_bss, check };
    }

    fn schedule_lost_bss_check(&mut self, beacon_interval: wlan_common::TimeUnit) -> EventId {
        let duration = Duration::from(beacon_interval) * LOST_BSS_CHECK_BCN_PERIODS as i64;
        self.ctx.timer.schedule_after(duration, TimedEvent::Client(ClientEvent::LostBssCheck))
    }

    /// Tears down any association state and starts over with a scan. If the
    /// engine is mid-exchange the reset is deferred until it finishes.
    pub fn reset(&mut self) {
        if self.dcf.is_idle() {
            self.do_reset();
        } else {
            debug!("reset deferred: channel access engine is mid-exchange");
            self.pending_reset = true;
        }
    }

    fn do_reset(&mut self) {
        self.pending_reset = false;
        let state = std::mem::replace(&mut self.state, ClientState::Idle);
        match state {
            ClientState::Authenticating { timeout, .. }
            | ClientState::Associating { timeout, .. }
            | ClientState::Reassociating { timeout, .. } => self.ctx.timer.cancel_event(timeout),
            ClientState::Joined { check, .. } => self.ctx.timer.cancel_event(check),
            ClientState::Idle | ClientState::Scanning => {}
        }
        for desc in self.dcf.drain_mgmt_queue() {
            self.ctx.counters.record_dropped(desc.kind);
        }
        self.ctx.device.set_link_down();
        info!("management state reset; restarting scan");
        self.start_scan();
    }

    fn process_tx_report(&mut self, report: TxReport) {
        match report.outcome {
            TxOutcome::Delivered => {}
            TxOutcome::Dropped => {
                if report.desc.kind == FrameKind::Data {
                    self.ctx.device.report_tx_drop(report.desc.dst_addr, FrameKind::Data);
                } else if report.desc.kind.is_connection_mgmt() {
                    warn!(
                        "{:?} frame to {:02x?} dropped; resetting association state",
                        report.desc.kind, report.desc.dst_addr
                    );
                    self.reset();
                }
            }
        }
    }

    fn after_engine_event(&mut self, report: Option<TxReport>) {
        if let Some(report) = report {
            self.process_tx_report(report);
        }
        if self.pending_reset && self.dcf.is_idle() {
            self.do_reset();
        }
    }

    fn handle_client_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::ScanDwell => {
                if self.scanner.handle_dwell_timeout(&mut self.ctx, &mut self.dcf) {
                    self.on_scan_complete();
                }
            }
            ClientEvent::AuthTimeout => {
                if matches!(self.state, ClientState::Authenticating { .. }) {
                    if let ClientState::Authenticating { target, .. } =
                        std::mem::replace(&mut self.state, ClientState::Idle)
                    {
                        warn!("authentication with {:02x?} timed out", target.bssid.0);
                    }
                }
            }
            ClientEvent::AssocTimeout => {
                if matches!(self.state, ClientState::Associating { .. }) {
                    if let ClientState::Associating { target, .. } =
                        std::mem::replace(&mut self.state, ClientState::Idle)
                    {
                        warn!("association with {:02x?} timed out", target.bssid.0);
                    }
                }
            }
            ClientEvent::ReassocTimeout => {
                if matches!(self.state, ClientState::Reassociating { .. }) {
                    if let ClientState::Reassociating { current, target, .. } =
                        std::mem::replace(&mut self.state, ClientState::Idle)
                    {
                        warn!("reassociation with {:02x?} timed out", target.bssid.0);
                        self.return_to_joined(current);
                    }
                }
            }
            ClientEvent::LostBssCheck => {
                let lost = matches!(
                    &self.state,
                    ClientState::Joined { lost_bss, .. } if lost_bss.should_deauthenticate()
                );
                if lost {
                    if let ClientState::Joined { ap, .. } = &self.state {
                        warn!(
                            "no beacon from {:02x?} for too long; association lost",
                            ap.bssid.0
                        );
                    }
                    self.reset();
                } else if let ClientState::Joined { ap, lost_bss, check } = &mut self.state {
                    lost_bss.add_beacon_interval(LOST_BSS_CHECK_BCN_PERIODS);
                    let duration =
                        Duration::from(ap.beacon_interval) * LOST_BSS_CHECK_BCN_PERIODS as i64;
                    *check = self
                        .ctx
                        .timer
                        .schedule_after(duration, TimedEvent::Client(ClientEvent::LostBssCheck));
                }
            }
        }
    }

    fn on_beacon_or_probe_resp(
        &mut self,
        bssid: Bssid,
        ssid: &[u8],
        channel: u8,
        rssi: DecibelMilliWatt,
        beacon_interval: wlan_common::TimeUnit,
        capabilities: CapabilityInfo,
    ) {
        let complete_now = self.scanner.on_candidate_heard(
            &self.ctx,
            bssid,
            ssid,
            channel,
            rssi,
            beacon_interval,
            capabilities,
        );
        if let ClientState::Joined { ap, lost_bss, .. } = &mut self.state {
            if ap.bssid == bssid {
                lost_bss.reset();
                ap.signal.update_average(rssi);
            }
        }
        if complete_now {
            self.on_scan_complete();
        }
    }

    fn on_auth_resp(&mut self, src_addr: MacAddr, txn_seq_num: u16, status_code: StatusCode) {
        if txn_seq_num != 2 {
            debug!("ignoring authentication frame with txn {}", txn_seq_num);
            return;
        }
        match std::mem::replace(&mut self.state, ClientState::Idle) {
            ClientState::Authenticating { target, timeout } if target.bssid.0 == src_addr => {
                self.ctx.timer.cancel_event(timeout);
                if status_code == StatusCode::SUCCESS {
                    self.begin_associate(target);
                } else {
                    warn!(
                        "authentication refused by {:02x?}: status {}",
                        src_addr, status_code.0
                    );
                }
            }
            other => {
                debug!("ignoring unexpected authentication response from {:02x?}", src_addr);
                self.state = other;
            }
        }
    }

    fn on_assoc_resp(
        &mut self,
        reassoc: bool,
        src_addr: MacAddr,
        status_code: StatusCode,
        aid: u16,
    ) {
        match std::mem::replace(&mut self.state, ClientState::Idle) {
            ClientState::Associating { target, timeout }
                if !reassoc && target.bssid.0 == src_addr =>
            {
                self.ctx.timer.cancel_event(timeout);
                if status_code == StatusCode::SUCCESS {
                    self.enter_joined(target, aid);
                } else {
                    warn!("association refused by {:02x?}: status {}", src_addr, status_code.0);
                }
            }
            ClientState::Reassociating { current, target, timeout }
                if reassoc && target.bssid.0 == src_addr =>
            {
                self.ctx.timer.cancel_event(timeout);
                if status_code == StatusCode::SUCCESS {
                    self.enter_joined(target, aid);
                } else {
                    warn!(
                        "reassociation refused by {:02x?}: status {}; staying with {:02x?}",
                        src_addr, status_code.0, current.bssid.0
                    );
                    self.return_to_joined(current);
                }
            }
            other => {
                debug!("ignoring unexpected association response from {:02x?}", src_addr);
                self.state = other;
            }
        }
    }

    fn on_deauth_or_disassoc(&mut self, src_addr: MacAddr, reason_code: u16) {
        let from_our_ap = match &self.state {
            ClientState::Joined { ap, .. } => ap.bssid.0 == src_addr,
            ClientState::Authenticating { target, .. }
            | ClientState::Associating { target, .. } => target.bssid.0 == src_addr,
            ClientState::Reassociating { current, .. } => current.bssid.0 == src_addr,
            _ => false,
        };
        if from_our_ap {
            warn!("{:02x?} tore the connection down (reason {})", src_addr, reason_code);
            self.reset();
        }
    }

    fn handle_mgmt_frame(&mut self, mgmt_hdr: &wlan_common::mac::MgmtHdr, body: &[u8], rx_info: RxInfo) {
        let frame_ctrl = { mgmt_hdr.frame_ctrl };
        let src_addr = { mgmt_hdr.addr2 };
        let bssid = Bssid({ mgmt_hdr.addr3 });
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
            MgmtBody::Beacon { bcn_hdr, elements } | MgmtBody::ProbeResp { probe_resp_hdr: bcn_hdr, elements } => {
                let ssid = ie::find_ssid(elements).unwrap_or(&[]).to_vec();
                let channel = dsss_channel(elements).unwrap_or(rx_info.channel);
                self.on_beacon_or_probe_resp(
                    bssid,
                    &ssid,
                    channel,
                    DecibelMilliWatt(rx_info.rssi_dbm),
                    { bcn_hdr.beacon_interval },
                    { bcn_hdr.capabilities },
                );
            }
            MgmtBody::Authentication { auth_hdr, .. } => {
                self.on_auth_resp(src_addr, { auth_hdr.auth_txn_seq_num }, {
                    auth_hdr.status_code
                });
            }
            MgmtBody::AssociationResp { assoc_resp_hdr, .. } => {
                self.on_assoc_resp(false, src_addr, { assoc_resp_hdr.status_code }, {
                    assoc_resp_hdr.aid
                });
            }
            MgmtBody::ReassociationResp { reassoc_resp_hdr, .. } => {
                self.on_assoc_resp(true, src_addr, { reassoc_resp_hdr.status_code }, {
                    reassoc_resp_hdr.aid
                });
            }
            MgmtBody::Deauthentication { deauth_hdr, .. } => {
                self.on_deauth_or_disassoc(src_addr, { deauth_hdr.reason_code }.0);
            }
            MgmtBody::Disassociation { disassoc_hdr, .. } => {
                self.on_deauth_or_disassoc(src_addr, { disassoc_hdr.reason_code }.0);
            }
            MgmtBody::AssociationReq { .. }
            | MgmtBody::ReassociationReq { .. }
            | MgmtBody::ProbeReq { .. } => {
                debug!("ignoring access-point-side request in client role");
            }
            MgmtBody::Unsupported { subtype } => {
                info!("discarding management frame with unsupported subtype {:?}", subtype);
            }
        }
    }

    fn handle_data_frame(
        &mut self,
        fixed_fields: &wlan_common::mac::FixedDataHdrFields,
        body: &[u8],
    ) {
        let frame_ctrl = { fixed_fields.frame_ctrl };
        let transmitter = { fixed_fields.addr2 };
        let src_addr = { fixed_fields.addr3 };
        match &self.state {
            ClientState::Joined { ap, .. }
                if frame_ctrl.from_ds() && ap.bssid.0 == transmitter =>
            {
                self.ctx.counters.record_received(FrameKind::Data);
                self.ctx.device.deliver_eth_frame(src_addr, body);
            }
            _ => debug!("discarding data frame from {:02x?} while not joined to it", transmitter),
        }
    }
}

/// IEEE Std 802.11-2016, 9.4.2.4: current channel from the DSSS parameter set.
fn dsss_channel(elements: &[u8]) -> Option<u8> {
    ie::Reader::new(elements)
        .find(|(id, body)| *id == ie::DSSS_PARAM_SET_ID && body.len() == 1)
        .map(|(_, body)| body[0])
}

impl<D: Device> MlmeImpl for ClientMlme<D> {
    fn handle_timed_event(&mut self, event_id: EventId) {
        match self.ctx.timer.triggered(&event_id) {
            Some(TimedEvent::Access(timeout)) => {
                let report = self.dcf.handle_timeout(&mut self.ctx, timeout);
                self.after_engine_event(report);
            }
            Some(TimedEvent::Client(event)) => self.handle_client_event(event),
            Some(TimedEvent::Ap(event)) => {
                warn!("discarding access-point event {:?} in client role", event)
            }
            None => log_stale_timer(event_id),
        }
    }

    fn handle_mac_frame_rx(&mut self, frame: &[u8], rx_info: RxInfo) {
        match MacFrame::parse(frame) {
            Some(MacFrame::Mgmt { mgmt_hdr, body }) => {
                let dst_addr = { mgmt_hdr.addr1 };
                let src_addr = { mgmt_hdr.addr2 };
                let seq_num = { mgmt_hdr.seq_ctrl }.seq_num();
                let duration = { mgmt_hdr.duration };
                match self.dcf.on_peer_frame(&mut self.ctx, dst_addr, src_addr, seq_num, duration)
                {
                    crate::dcf::RxDisposition::Deliver => {
                        self.handle_mgmt_frame(&mgmt_hdr, body, rx_info)
                    }
                    crate::dcf::RxDisposition::Duplicate
                    | crate::dcf::RxDisposition::NotForUs => {}
                }
            }
            Some(MacFrame::Data { fixed_fields, body }) => {
                let dst_addr = { fixed_fields.addr1 };
                let src_addr = { fixed_fields.addr2 };
                let seq_num = { fixed_fields.seq_ctrl }.seq_num();
                let duration = { fixed_fields.duration };
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
        let (bssid, own_addr) = match &self.state {
            ClientState::Joined { ap, .. } => (ap.bssid, self.ctx.device.mac_addr()),
            _ => return Err(Error::NotJoined),
        };
        let seq_num = self.ctx.seq_mgr.next_seq_num(bssid.0);
        let now = self.ctx.timer.now();
        let desc = frames::client_data(own_addr, bssid, dst_addr, seq_num, body, now);
        self.dcf.enqueue_data(&mut self.ctx, desc);
        Ok(())
    }

    fn handle_phy_status_changed(&mut self, old: PhyStatus, new: PhyStatus) {
        let report = self.dcf.handle_phy_status_changed(&mut self.ctx, old, new);
        self.after_engine_event(report);
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{device::FakeDevice, device::LinkStatus, ScanMode},
        rand::{rngs::StdRng, SeedableRng},
        wlan_common::{
            assert_variant,
            mac::{MgmtSubtype, ReasonCode},
            time::TimeUnit,
            timer::FakeScheduler,
        },
    };

    const STA_ADDR: MacAddr = FakeDevice::DEFAULT_MAC_ADDR;
    const AP_1: Bssid = Bssid([1; 6]);
    const AP_2: Bssid = Bssid([2; 6]);
    const SSID: &[u8] = b"network";

    struct TestHelper {
        fake_device: FakeDevice,
        fake_scheduler: FakeScheduler,
    }

    impl TestHelper {
        fn new() -> Self {
            Self { fake_device: FakeDevice::new(), fake_scheduler: FakeScheduler::new() }
        }

        fn make_mlme(&self, config: Config) -> ClientMlme<FakeDevice> {
            ClientMlme::new(
                config,
                self.fake_device.clone(),
                self.fake_scheduler.as_scheduler(),
                Box::new(StdRng::seed_from_u64(0x5eed)),
            )
        }

        fn default_config() -> Config {
            Config {
                scan_mode: ScanMode::Passive,
                channel_list: vec![1],
                ssid: SSID.to_vec(),
                ..Config::default()
            }
        }

        fn rx_info(&self, rssi_dbm: i8) -> RxInfo {
            RxInfo { rssi_dbm, channel: self.fake_device.state().channel }
        }

        /// Fires pending timers until the station transmits a frame, then
        /// returns it.
        fn run_until_tx(&self, mlme: &mut ClientMlme<FakeDevice>) -> Vec<u8> {
            for _ in 0..1200 {
                if let Some(frame) = self.fake_device.next_wlan_frame() {
                    return frame;
                }
                let id = self.fake_scheduler.next_event().expect("no timer pending");
                mlme.handle_timed_event(id);
            }
            panic!("station never transmitted");
        }

        fn complete_tx(&self, mlme: &mut ClientMlme<FakeDevice>) {
            mlme.handle_phy_status_changed(PhyStatus::Transmitting, PhyStatus::Idle);
        }

        fn deliver_ack(&self, mlme: &mut ClientMlme<FakeDevice>) {
            let ack = frames::ack(STA_ADDR);
            mlme.handle_mac_frame_rx(&ack, self.rx_info(-40));
        }

        /// Transmit + ACK one pending unicast exchange, returning the frame.
        fn exchange_frame(&self, mlme: &mut ClientMlme<FakeDevice>) -> Vec<u8> {
            let frame = self.run_until_tx(mlme);
            self.complete_tx(mlme);
            self.deliver_ack(mlme);
            frame
        }

        fn deliver_beacon(&self, mlme: &mut ClientMlme<FakeDevice>, bssid: Bssid, rssi_dbm: i8) {
            let desc = frames::beacon(
                MacRole::Ap,
                bssid,
                0,
                0,
                TimeUnit(100),
                CapabilityInfo(1),
                SSID,
                self.fake_device.state().channel,
                wlan_common::time::Time::ZERO,
            )
            .expect("failed building beacon");
            mlme.handle_mac_frame_rx(&desc.bytes, self.rx_info(rssi_dbm));
        }

        fn deliver_auth_resp(
            &self,
            mlme: &mut ClientMlme<FakeDevice>,
            bssid: Bssid,
            status_code: StatusCode,
        ) {
            let desc = frames::auth_resp(
                MacRole::Ap,
                bssid,
                STA_ADDR,
                1,
                status_code,
                wlan_common::time::Time::ZERO,
            )
            .expect("failed building auth resp");
            mlme.handle_mac_frame_rx(&desc.bytes, self.rx_info(-40));
            self.drain_acks();
        }

        fn deliver_assoc_resp(
            &self,
            mlme: &mut ClientMlme<FakeDevice>,
            bssid: Bssid,
            reassoc: bool,
            status_code: StatusCode,
            aid: u16,
        ) {
            let desc = frames::assoc_resp(
                MacRole::Ap,
                reassoc,
                bssid,
                STA_ADDR,
                2,
                CapabilityInfo(1),
                status_code,
                aid,
                wlan_common::time::Time::ZERO,
            )
            .expect("failed building assoc resp");
            mlme.handle_mac_frame_rx(&desc.bytes, self.rx_info(-40));
            self.drain_acks();
        }

        /// Removes the immediate link-layer ACKs the station transmits in
        /// response to delivered unicast frames.
        fn drain_acks(&self) {
            for frame in self.fake_device.drain_wlan_queue() {
                assert_variant!(MacFrame::parse(&frame[..]), Some(MacFrame::Ack { .. }));
            }
        }

        /// Walks a station from cold start into the joined state.
        fn join(&self, mlme: &mut ClientMlme<FakeDevice>, bssid: Bssid, rssi_dbm: i8) {
            mlme.start();
            self.deliver_beacon(mlme, bssid, rssi_dbm);
            // End of the only dwell period: scan completes, auth req goes out.
            let auth_req = self.exchange_frame(mlme);
            assert_mgmt_subtype(&auth_req, MgmtSubtype::AUTH);
            self.deliver_auth_resp(mlme, bssid, StatusCode::SUCCESS);
            let assoc_req = self.exchange_frame(mlme);
            assert_mgmt_subtype(&assoc_req, MgmtSubtype::ASSOC_REQ);
            self.deliver_assoc_resp(mlme, bssid, false, StatusCode::SUCCESS, 5);
        }
    }

    fn assert_mgmt_subtype(frame: &[u8], subtype: MgmtSubtype) {
        assert_variant!(MacFrame::parse(frame), Some(MacFrame::Mgmt { mgmt_hdr, .. }) => {
            assert_eq!({ mgmt_hdr.frame_ctrl }.mgmt_subtype(), subtype);
        });
    }

    #[test]
    fn join_happy_path_reaches_joined_exactly_once() {
        let h = TestHelper::new();
        let mut mlme = h.make_mlme(TestHelper::default_config());

        h.join(&mut mlme, AP_1, -40);
        assert_eq!(h.fake_device.state().link_status, LinkStatus::Up(AP_1));
        assert_eq!(mlme.bssid(), Some(AP_1));
        assert_eq!(mlme.counters().auth.sent, 1);
        assert_eq!(mlme.counters().assoc_req.sent, 1);

        // A second (duplicate-ish) successful response does not re-join.
        h.deliver_assoc_resp(&mut mlme, AP_1, false, StatusCode::SUCCESS, 5);
        assert_eq!(mlme.bssid(), Some(AP_1));
    }

    #[test]
    fn refused_auth_leaves_station_unjoined() {
        let h = TestHelper::new();
        let mut mlme = h.make_mlme(TestHelper::default_config());

        mlme.start();
        h.deliver_beacon(&mut mlme, AP_1, -40);
        let auth_req = h.exchange_frame(&mut mlme);
        assert_mgmt_subtype(&auth_req, MgmtSubtype::AUTH);
        h.deliver_auth_resp(&mut mlme, AP_1, StatusCode::REFUSED);

        // No association attempt, no join notification.
        assert_eq!(mlme.counters().assoc_req.sent, 0);
        assert_eq!(h.fake_device.state().link_status, LinkStatus::Down);
        assert_eq!(mlme.bssid(), None);
    }

    #[test]
    fn refused_assoc_leaves_station_unjoined() {
        let h = TestHelper::new();
        let mut mlme = h.make_mlme(TestHelper::default_config());

        mlme.start();
        h.deliver_beacon(&mut mlme, AP_1, -40);
        h.exchange_frame(&mut mlme);
        h.deliver_auth_resp(&mut mlme, AP_1, StatusCode::SUCCESS);
        h.exchange_frame(&mut mlme);
        h.deliver_assoc_resp(&mut mlme, AP_1, false, StatusCode::REFUSED, 0);

        assert_eq!(h.fake_device.state().link_status, LinkStatus::Down);
        assert_eq!(mlme.bssid(), None);
    }

    #[test]
    fn dropped_auth_frame_triggers_reset_and_rescan() {
        let h = TestHelper::new();
        let mut mlme = h.make_mlme(Config {
            short_retry_limit: 1,
            ..TestHelper::default_config()
        });

        mlme.start();
        h.deliver_beacon(&mut mlme, AP_1, -40);

        // Auth request transmits but is never acknowledged; one retry is
        // allowed, then the frame drops and the station rescans.
        for _ in 0..2 {
            let frame = h.run_until_tx(&mut mlme);
            assert_mgmt_subtype(&frame, MgmtSubtype::AUTH);
            h.complete_tx(&mut mlme);
            // Let the ACK timeout fire.
            let id = h.fake_scheduler.next_event().expect("no ack timeout pending");
            mlme.handle_timed_event(id);
        }

        assert_eq!(mlme.counters().auth.dropped, 1);
        // Reset restarted the scan.
        assert!(mlme.scanner.is_scanning());
        assert_eq!(mlme.bssid(), None);
    }

    #[test]
    fn handover_respects_hysteresis_margin() {
        let h = TestHelper::new();
        let mut mlme = h.make_mlme(Config {
            handover_margin_db: 5,
            ..TestHelper::default_config()
        });

        h.join(&mut mlme, AP_1, -70);
        assert_eq!(mlme.bssid(), Some(AP_1));

        // Background scan hears a barely-stronger AP: margin not met.
        mlme.start_scan();
        h.deliver_beacon(&mut mlme, AP_2, -69);
        let id = h.fake_scheduler.next_event().expect("no dwell timer pending");
        mlme.handle_timed_event(id);

        // Still with AP_1, no reassociation attempted.
        assert_eq!(mlme.bssid(), Some(AP_1));
        assert_eq!(mlme.counters().reassoc_req.sent, 0);
    }

    #[test]
    fn handover_happens_when_margin_is_met() {
        let h = TestHelper::new();
        let mut mlme = h.make_mlme(Config {
            handover_margin_db: 5,
            ..TestHelper::default_config()
        });

        h.join(&mut mlme, AP_1, -70);

        mlme.start_scan();
        h.deliver_beacon(&mut mlme, AP_2, -50);
        let id = h.fake_scheduler.next_event().expect("no dwell timer pending");
        mlme.handle_timed_event(id);

        // Reassociation request toward the new AP.
        let reassoc_req = h.exchange_frame(&mut mlme);
        assert_mgmt_subtype(&reassoc_req, MgmtSubtype::REASSOC_REQ);
        assert_variant!(MacFrame::parse(&reassoc_req[..]), Some(MacFrame::Mgmt { mgmt_hdr, .. }) => {
            assert_eq!({ mgmt_hdr.addr1 }, AP_2.0);
        });

        h.deliver_assoc_resp(&mut mlme, AP_2, true, StatusCode::SUCCESS, 9);
        assert_eq!(mlme.bssid(), Some(AP_2));
        assert_eq!(h.fake_device.state().link_status, LinkStatus::Up(AP_2));
    }

    #[test]
    fn eth_tx_requires_join() {
        let h = TestHelper::new();
        let mut mlme = h.make_mlme(TestHelper::default_config());
        assert_variant!(mlme.handle_eth_frame_tx([9; 6], b"payload"), Err(Error::NotJoined));

        h.join(&mut mlme, AP_1, -40);
        mlme.handle_eth_frame_tx([9; 6], b"payload").expect("eth tx refused while joined");
        let data = h.run_until_tx(&mut mlme);
        assert_variant!(MacFrame::parse(&data[..]), Some(MacFrame::Data { fixed_fields, body }) => {
            assert!({ fixed_fields.frame_ctrl }.to_ds());
            assert_eq!({ fixed_fields.addr1 }, AP_1.0);
            assert_eq!({ fixed_fields.addr3 }, [9; 6]);
            assert_eq!(body, &b"payload"[..]);
        });
    }

    #[test]
    fn duplicate_data_frame_is_delivered_once() {
        let h = TestHelper::new();
        let mut mlme = h.make_mlme(TestHelper::default_config());
        h.join(&mut mlme, AP_1, -40);

        let desc = frames::ap_data(
            AP_1,
            STA_ADDR,
            [9; 6],
            77,
            b"hello",
            wlan_common::time::Time::ZERO,
        );
        mlme.handle_mac_frame_rx(&desc.bytes, h.rx_info(-40));
        mlme.handle_mac_frame_rx(&desc.bytes, h.rx_info(-40));

        assert_eq!(h.fake_device.state().eth_queue, vec![([9; 6], b"hello".to_vec())]);
        // Both copies were acknowledged regardless.
        assert_eq!(mlme.counters().ack.sent, 2);
        assert_eq!(mlme.counters().duplicates, 1);
    }

    #[test]
    fn deauth_from_ap_resets_to_scanning() {
        let h = TestHelper::new();
        let mut mlme = h.make_mlme(TestHelper::default_config());
        h.join(&mut mlme, AP_1, -40);

        let desc = frames::deauth(
            AP_1.0,
            STA_ADDR,
            AP_1,
            3,
            ReasonCode::LEAVING_NETWORK_DEAUTH,
            wlan_common::time::Time::ZERO,
        );
        mlme.handle_mac_frame_rx(&desc.bytes, h.rx_info(-40));

        assert_eq!(h.fake_device.state().link_status, LinkStatus::Down);
        assert_eq!(mlme.bssid(), None);
        assert!(mlme.scanner.is_scanning());
    }

    #[test]
    fn beacon_loss_resets_association() {
        let h = TestHelper::new();
        let mut mlme = h.make_mlme(TestHelper::default_config());
        h.join(&mut mlme, AP_1, -40);

        // No beacons arrive; keep firing the periodic check until the full
        // timeout accumulates.
        for _ in 0..=(LOST_BSS_TIMEOUT_BCN_PERIODS / LOST_BSS_CHECK_BCN_PERIODS) {
            if mlme.bssid().is_none() {
                break;
            }
            let id = h.fake_scheduler.next_event().expect("no check pending");
            mlme.handle_timed_event(id);
        }
        assert_eq!(mlme.bssid(), None);
        assert_eq!(h.fake_device.state().link_status, LinkStatus::Down);
    }

    #[test]
    fn stale_timer_is_ignored() {
        let h = TestHelper::new();
        let mut mlme = h.make_mlme(TestHelper::default_config());
        mlme.start();
        // An id that was never handed out resolves to nothing and is dropped.
        mlme.handle_timed_event(wlan_common::timer::EventId(0xdead));
        assert!(mlme.scanner.is_scanning());
    }

    #[test]
    fn unknown_frame_type_is_discarded() {
        let h = TestHelper::new();
        let mut mlme = h.make_mlme(TestHelper::default_config());
        mlme.start();
        // Extension-type frame: logged and dropped without state damage.
        mlme.handle_mac_frame_rx(&[0b0000_1100, 0, 0, 0], h.rx_info(-40));
        assert!(mlme.scanner.is_scanning());
    }

    #[test]
    fn scan_visits_only_listenable_channels() {
        let h = TestHelper::new();
        h.fake_device.state().unlistenable_channels = vec![1];
        let mut mlme = h.make_mlme(Config {
            channel_list: vec![1, 6],
            ..TestHelper::default_config()
        });
        mlme.start();
        assert_eq!(h.fake_device.state().channel, 6);
    }

    #[test]
    fn reset_is_deferred_while_engine_is_busy() {
        let h = TestHelper::new();
        let mut mlme = h.make_mlme(TestHelper::default_config());
        h.join(&mut mlme, AP_1, -40);

        // Put the engine mid-exchange with a data frame.
        mlme.handle_eth_frame_tx([9; 6], b"payload").expect("eth tx refused");
        h.run_until_tx(&mut mlme);
        h.complete_tx(&mut mlme);

        mlme.reset();
        // Still joined: the reset waits for the exchange to finish.
        assert_eq!(mlme.bssid(), Some(AP_1));

        // The ACK completes the exchange and the deferred reset runs.
        h.deliver_ack(&mut mlme);
        assert_eq!(mlme.bssid(), None);
        assert!(mlme.scanner.is_scanning());
    }
}
