// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The distributed coordination function: contention, backoff, virtual
//! carrier sensing and the RTS/CTS/ACK handshakes.
//!
//! The engine owns at most one frame at a time. Frames wait in a management
//! and a data FIFO and are promoted into the engine only when it is idle;
//! management frames are promoted first.

mod backoff;
mod nav;

pub use {backoff::ContentionWindow, nav::Nav};

use {
    crate::{
        config::Config,
        device::{Device, PhyStatus},
        error::Error,
        frames::{self, FrameDescriptor, FrameKind},
        Context, TimedEvent,
    },
    log::{debug, error, warn},
    rand::RngCore,
    std::collections::VecDeque,
    wlan_common::{
        mac::{self, MacAddr},
        time::Duration,
        timer::EventId,
    },
};

pub const SIFS_MICROS: u16 = 10;
pub const SLOT_MICROS: u16 = 20;
pub const SIFS: Duration = Duration::from_micros(SIFS_MICROS as i64);
pub const SLOT_TIME: Duration = Duration::from_micros(SLOT_MICROS as i64);
/// DIFS = SIFS + 2 slots.
pub const DIFS: Duration = Duration::from_micros((SIFS_MICROS + 2 * SLOT_MICROS) as i64);

/// Base-rate PHY preamble and PLCP header airtime.
pub const PHY_OVERHEAD_MICROS: u16 = 192;
/// A 14-byte ACK or CTS at the 1 Mb/s base rate, preamble included.
pub const ACK_TX_MICROS: u16 = PHY_OVERHEAD_MICROS + 112;
pub const CTS_TX_MICROS: u16 = ACK_TX_MICROS;

/// A response is due within SIFS plus one slot of the end of the soliciting
/// frame; the response airtime itself is granted on top.
pub const CTS_TIMEOUT: Duration =
    Duration::from_micros((SIFS_MICROS + SLOT_MICROS + CTS_TX_MICROS) as i64);
pub const ACK_TIMEOUT: Duration =
    Duration::from_micros((SIFS_MICROS + SLOT_MICROS + ACK_TX_MICROS) as i64);

/// How long a station that answered an RTS waits for the promised data frame
/// before giving the medium back.
pub const WAIT_FOR_DATA_TIMEOUT: Duration = Duration::from_millis(5);

/// Airtime of a frame at the 1 Mb/s base rate.
pub fn tx_time_micros(frame_len: usize) -> u16 {
    PHY_OVERHEAD_MICROS.saturating_add((frame_len as u32 * 8).min(u16::MAX as u32) as u16)
}

/// Duration announced by an RTS: the rest of the four-way exchange.
fn rts_duration(data_frame_len: usize) -> u16 {
    3 * SIFS_MICROS + CTS_TX_MICROS + tx_time_micros(data_frame_len) + ACK_TX_MICROS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTimeout {
    /// The inter-frame space elapsed with the medium idle.
    Ifs,
    /// One backoff slot elapsed.
    BackoffSlot,
    CtsTimeout,
    AckTimeout,
    NavExpired,
    WaitForDataTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// Acknowledged, or a broadcast that left the antenna.
    Delivered,
    /// Retry limit exhausted.
    Dropped,
}

/// Handed back to station management whenever the engine finishes with a
/// frame, one way or the other.
#[derive(Debug, PartialEq, Eq)]
pub struct TxReport {
    pub desc: FrameDescriptor,
    pub outcome: TxOutcome,
}

/// What the engine decided about a received management or data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxDisposition {
    /// Addressed to this station and new: hand the body upward.
    Deliver,
    /// Addressed to this station but repeats the last accepted sequence
    /// number; it was re-acknowledged and must not be delivered again.
    Duplicate,
    /// Addressed elsewhere; only its duration was of interest.
    NotForUs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    Nothing,
    Cts,
    Ack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Idle,
    Contending { slots_remaining: u16 },
    Transmitting { awaiting: Awaiting },
    WaitingForCts,
    WaitingForAck,
    WaitingForData { peer: MacAddr },
}

pub struct ChannelAccess {
    state: TxState,
    cw: ContentionWindow,
    nav: Nav,
    short_retries: u16,
    long_retries: u16,
    /// Whether the frame currently owned by the engine goes out behind an
    /// RTS/CTS handshake; decides long vs. short retry accounting.
    rts_for_current: bool,
    current: Option<FrameDescriptor>,
    mgmt_queue: VecDeque<FrameDescriptor>,
    data_queue: VecDeque<FrameDescriptor>,
    medium_busy: bool,
    /// The single outstanding contention/response timer.
    access_timeout: Option<EventId>,
    nav_timeout: Option<EventId>,
    rng: Box<dyn RngCore>,
}

impl ChannelAccess {
    pub fn new(config: &Config, rng: Box<dyn RngCore>) -> Self {
        Self {
            state: TxState::Idle,
            cw: ContentionWindow::new(config.cw_min, config.cw_max),
            nav: Nav::new(),
            short_retries: 0,
            long_retries: 0,
            rts_for_current: false,
            current: None,
            mgmt_queue: VecDeque::new(),
            data_queue: VecDeque::new(),
            medium_busy: false,
            access_timeout: None,
            nav_timeout: None,
            rng,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, TxState::Idle) && self.current.is_none()
    }

    pub fn contention_window(&self) -> u16 {
        self.cw.current()
    }

    pub fn nav(&self) -> &Nav {
        &self.nav
    }

    pub fn enqueue_mgmt<D: Device>(&mut self, ctx: &mut Context<D>, desc: FrameDescriptor) {
        self.mgmt_queue.push_back(desc);
        self.try_service(ctx);
    }

    pub fn enqueue_data<D: Device>(&mut self, ctx: &mut Context<D>, desc: FrameDescriptor) {
        self.data_queue.push_back(desc);
        self.try_service(ctx);
    }

    /// Removes every frame still waiting in the management queue, without
    /// transmitting it.
    pub fn drain_mgmt_queue(&mut self) -> Vec<FrameDescriptor> {
        self.mgmt_queue.drain(..).collect()
    }

    /// Hands a frame to the engine. Accepted only while idle; the engine
    /// never preempts the frame it owns.
    pub fn submit_frame<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        desc: FrameDescriptor,
        requires_rts_cts: bool,
    ) -> Result<(), Error> {
        if !self.is_idle() {
            return Err(Error::NotIdle);
        }
        self.short_retries = 0;
        self.long_retries = 0;
        self.rts_for_current = requires_rts_cts;
        let slots = self.cw.draw(self.rng.as_mut());
        debug!(
            "contending for {:?} to {:02x?}: {} backoff slots, cw {}",
            desc.kind,
            desc.dst_addr,
            slots,
            self.cw.current()
        );
        self.current = Some(desc);
        self.state = TxState::Contending { slots_remaining: slots };
        self.try_begin_ifs(ctx);
        Ok(())
    }

    fn requires_rts_cts<D: Device>(ctx: &Context<D>, desc: &FrameDescriptor) -> bool {
        let threshold = ctx.config.rts_threshold;
        desc.needs_ack() && (threshold == 0 || desc.bytes.len() > threshold)
    }

    fn try_service<D: Device>(&mut self, ctx: &mut Context<D>) {
        if !self.is_idle() {
            return;
        }
        let desc = match self.mgmt_queue.pop_front().or_else(|| self.data_queue.pop_front()) {
            Some(desc) => desc,
            None => return,
        };
        let requires_rts_cts = Self::requires_rts_cts(ctx, &desc);
        // Idleness was checked above; submission cannot be refused.
        let _ = self.submit_frame(ctx, desc, requires_rts_cts);
    }

    fn try_begin_ifs<D: Device>(&mut self, ctx: &mut Context<D>) {
        if self.medium_busy || self.nav.is_busy(ctx.timer.now()) {
            return;
        }
        if matches!(self.state, TxState::Contending { .. }) {
            self.schedule_access_timeout(ctx, AccessTimeout::Ifs, DIFS);
        }
    }

    fn schedule_access_timeout<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        timeout: AccessTimeout,
        duration: Duration,
    ) {
        let id = ctx.timer.schedule_after(duration, TimedEvent::Access(timeout));
        if let Some(old) = self.access_timeout.replace(id) {
            ctx.timer.cancel_event(old);
        }
    }

    fn cancel_access_timeout<D: Device>(&mut self, ctx: &mut Context<D>) {
        if let Some(id) = self.access_timeout.take() {
            ctx.timer.cancel_event(id);
        }
    }

    /// PHY status transitions drive both carrier sensing and the completion
    /// of this station's own transmissions.
    pub fn handle_phy_status_changed<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        old: PhyStatus,
        new: PhyStatus,
    ) -> Option<TxReport> {
        self.medium_busy = new.is_busy();
        let mut report = None;
        if old == PhyStatus::Transmitting && new != PhyStatus::Transmitting {
            report = self.handle_tx_complete(ctx);
        }
        if new == PhyStatus::Idle {
            self.try_begin_ifs(ctx);
        } else if matches!(self.state, TxState::Contending { .. }) {
            // The countdown pauses while the medium is busy; it resumes with
            // a fresh inter-frame space once the medium goes idle again.
            self.cancel_access_timeout(ctx);
        }
        report
    }

    fn handle_tx_complete<D: Device>(&mut self, ctx: &mut Context<D>) -> Option<TxReport> {
        match self.state {
            TxState::Transmitting { awaiting: Awaiting::Cts } => {
                self.state = TxState::WaitingForCts;
                self.schedule_access_timeout(ctx, AccessTimeout::CtsTimeout, CTS_TIMEOUT);
                None
            }
            TxState::Transmitting { awaiting: Awaiting::Ack } => {
                self.state = TxState::WaitingForAck;
                self.schedule_access_timeout(ctx, AccessTimeout::AckTimeout, ACK_TIMEOUT);
                None
            }
            TxState::Transmitting { awaiting: Awaiting::Nothing } => self.complete_success(ctx),
            _ => None,
        }
    }

    pub fn handle_timeout<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        timeout: AccessTimeout,
    ) -> Option<TxReport> {
        match timeout {
            AccessTimeout::Ifs => {
                self.access_timeout = None;
                if self.medium_busy || self.nav.is_busy(ctx.timer.now()) {
                    return None;
                }
                if let TxState::Contending { slots_remaining } = self.state {
                    if slots_remaining == 0 {
                        self.transmit_current(ctx);
                    } else {
                        self.schedule_access_timeout(ctx, AccessTimeout::BackoffSlot, SLOT_TIME);
                    }
                }
                None
            }
            AccessTimeout::BackoffSlot => {
                self.access_timeout = None;
                if self.medium_busy || self.nav.is_busy(ctx.timer.now()) {
                    return None;
                }
                if let TxState::Contending { slots_remaining } = self.state {
                    let slots_remaining = slots_remaining.saturating_sub(1);
                    if slots_remaining == 0 {
                        self.transmit_current(ctx);
                    } else {
                        self.state = TxState::Contending { slots_remaining };
                        self.schedule_access_timeout(ctx, AccessTimeout::BackoffSlot, SLOT_TIME);
                    }
                }
                None
            }
            AccessTimeout::CtsTimeout => {
                self.access_timeout = None;
                if matches!(self.state, TxState::WaitingForCts) {
                    debug!("CTS timeout");
                    self.handle_response_timeout(ctx, false)
                } else {
                    None
                }
            }
            AccessTimeout::AckTimeout => {
                self.access_timeout = None;
                if matches!(self.state, TxState::WaitingForAck) {
                    debug!("ACK timeout");
                    let long = self.rts_for_current;
                    self.handle_response_timeout(ctx, long)
                } else {
                    None
                }
            }
            AccessTimeout::NavExpired => {
                self.nav_timeout = None;
                self.nav.reset();
                self.try_begin_ifs(ctx);
                None
            }
            AccessTimeout::WaitForDataTimeout => {
                self.access_timeout = None;
                if matches!(self.state, TxState::WaitingForData { .. }) {
                    debug!("reserved data frame never arrived");
                    self.state = TxState::Idle;
                    self.try_service(ctx);
                }
                None
            }
        }
    }

    fn transmit_current<D: Device>(&mut self, ctx: &mut Context<D>) {
        let desc = match self.current.as_ref() {
            Some(desc) => desc,
            None => {
                self.state = TxState::Idle;
                return;
            }
        };
        if self.rts_for_current {
            let duration = rts_duration(desc.bytes.len());
            let rts_bytes = frames::rts(desc.src_addr, desc.dst_addr, duration);
            ctx.counters.record_sent(FrameKind::Rts);
            if let Err(e) = ctx.device.send_wlan_frame(&rts_bytes) {
                error!("failed transmitting RTS: {}", e);
            }
            self.state = TxState::Transmitting { awaiting: Awaiting::Cts };
        } else {
            self.send_current_frame(ctx);
        }
    }

    fn send_current_frame<D: Device>(&mut self, ctx: &mut Context<D>) {
        let desc = match self.current.as_ref() {
            Some(desc) => desc,
            None => {
                self.state = TxState::Idle;
                return;
            }
        };
        let awaiting = if desc.needs_ack() { Awaiting::Ack } else { Awaiting::Nothing };
        ctx.counters.record_sent(desc.kind);
        if let Err(e) = ctx.device.send_wlan_frame(&desc.bytes) {
            error!("failed transmitting {:?} frame: {}", desc.kind, e);
        }
        self.state = TxState::Transmitting { awaiting };
    }

    fn handle_response_timeout<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        long: bool,
    ) -> Option<TxReport> {
        let (count, limit) = if long {
            (&mut self.long_retries, ctx.config.long_retry_limit)
        } else {
            (&mut self.short_retries, ctx.config.short_retry_limit)
        };
        *count += 1;
        if *count > limit {
            let desc = self.current.take();
            self.cw.reset();
            self.short_retries = 0;
            self.long_retries = 0;
            self.rts_for_current = false;
            self.state = TxState::Idle;
            let report = desc.map(|desc| {
                warn!(
                    "dropping {:?} frame to {:02x?}: {} retry limit exhausted",
                    desc.kind,
                    desc.dst_addr,
                    if long { "long" } else { "short" }
                );
                ctx.counters.record_dropped(desc.kind);
                TxReport { desc, outcome: TxOutcome::Dropped }
            });
            self.try_service(ctx);
            report
        } else {
            self.cw.fail();
            if let Some(desc) = self.current.as_mut() {
                desc.set_retry();
            }
            let slots = self.cw.draw(self.rng.as_mut());
            self.state = TxState::Contending { slots_remaining: slots };
            self.try_begin_ifs(ctx);
            None
        }
    }

    fn complete_success<D: Device>(&mut self, ctx: &mut Context<D>) -> Option<TxReport> {
        let desc = self.current.take();
        self.cw.reset();
        self.short_retries = 0;
        self.long_retries = 0;
        self.rts_for_current = false;
        self.state = TxState::Idle;
        let report = desc.map(|desc| TxReport { desc, outcome: TxOutcome::Delivered });
        self.try_service(ctx);
        report
    }

    /// Header inspection for every received management or data frame:
    /// acknowledges and deduplicates frames addressed to this station, adopts
    /// the announced duration of everything else into the NAV.
    pub fn on_peer_frame<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        dst_addr: MacAddr,
        src_addr: MacAddr,
        seq_num: u16,
        duration: u16,
    ) -> RxDisposition {
        let own_addr = ctx.device.mac_addr();
        if dst_addr == own_addr {
            if let TxState::WaitingForData { peer } = self.state {
                if peer == src_addr {
                    self.cancel_access_timeout(ctx);
                    self.state = TxState::Idle;
                    self.try_service(ctx);
                }
            }
            // Acknowledge even a duplicate; our previous ACK may have been
            // the casualty.
            ctx.counters.record_sent(FrameKind::Ack);
            if let Err(e) = ctx.device.send_wlan_frame(&frames::ack(src_addr)) {
                error!("failed transmitting ACK: {}", e);
            }
            if ctx.seq_mgr.record_rx(src_addr, seq_num) {
                ctx.counters.record_duplicate();
                RxDisposition::Duplicate
            } else {
                RxDisposition::Deliver
            }
        } else if mac::is_multicast(dst_addr) {
            RxDisposition::Deliver
        } else {
            self.observe_duration(ctx, duration);
            RxDisposition::NotForUs
        }
    }

    pub fn on_rts<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        ra: MacAddr,
        ta: MacAddr,
        duration: u16,
    ) {
        if ra == ctx.device.mac_addr() {
            ctx.counters.record_received(FrameKind::Rts);
            if self.is_idle() && !self.nav.is_busy(ctx.timer.now()) {
                let cts_duration = duration.saturating_sub(SIFS_MICROS + CTS_TX_MICROS);
                ctx.counters.record_sent(FrameKind::Cts);
                if let Err(e) = ctx.device.send_wlan_frame(&frames::cts(ta, cts_duration)) {
                    error!("failed transmitting CTS: {}", e);
                }
                self.state = TxState::WaitingForData { peer: ta };
                self.schedule_access_timeout(
                    ctx,
                    AccessTimeout::WaitForDataTimeout,
                    WAIT_FOR_DATA_TIMEOUT,
                );
            }
        } else {
            self.observe_duration(ctx, duration);
        }
    }

    pub fn on_cts<D: Device>(&mut self, ctx: &mut Context<D>, ra: MacAddr, duration: u16) {
        if ra == ctx.device.mac_addr() {
            if matches!(self.state, TxState::WaitingForCts) {
                ctx.counters.record_received(FrameKind::Cts);
                self.cancel_access_timeout(ctx);
                self.send_current_frame(ctx);
            }
        } else {
            self.observe_duration(ctx, duration);
        }
    }

    pub fn on_ack<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        ra: MacAddr,
        duration: u16,
    ) -> Option<TxReport> {
        if ra == ctx.device.mac_addr() {
            if matches!(self.state, TxState::WaitingForAck) {
                ctx.counters.record_received(FrameKind::Ack);
                self.cancel_access_timeout(ctx);
                return self.complete_success(ctx);
            }
            None
        } else {
            self.observe_duration(ctx, duration);
            None
        }
    }

    fn observe_duration<D: Device>(&mut self, ctx: &mut Context<D>, duration_micros: u16) {
        if duration_micros == 0 {
            return;
        }
        let candidate = ctx.timer.now() + Duration::from_micros(duration_micros as i64);
        if self.nav.update(candidate) {
            let id = ctx.timer.schedule_event(candidate, TimedEvent::Access(AccessTimeout::NavExpired));
            if let Some(old) = self.nav_timeout.replace(id) {
                ctx.timer.cancel_event(old);
            }
            if matches!(self.state, TxState::Contending { .. }) {
                self.cancel_access_timeout(ctx);
            }
        }
    }
}
