// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Discovery of candidate access points.
//!
//! A passive scan visits each listenable channel for a dwell time waiting
//! for beacons; an active scan additionally solicits probe responses and
//! dwells for a shorter time. A disabled scan tunes to the configured
//! channel and waits for the configured network to announce itself there.

use {
    crate::{
        client::ClientEvent,
        config::ScanMode,
        dcf::ChannelAccess,
        device::Device,
        frames, Context, MacRole, TimedEvent,
    },
    log::{debug, error, warn},
    wlan_common::{
        energy::DecibelMilliWatt,
        ewma_signal::EwmaSignalStrength,
        mac::{Bssid, CapabilityInfo},
        time::{Time, TimeUnit},
        timer::EventId,
    },
};

/// Samples folded into a candidate's signal estimate before it stabilizes.
const SIGNAL_AVERAGING_DEPTH: usize = 10;

/// One entry per access point heard, persisted across scans; selection only
/// considers entries refreshed since the current scan started.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub bssid: Bssid,
    pub ssid: Vec<u8>,
    pub channel: u8,
    pub signal: EwmaSignalStrength,
    pub last_heard: Time,
    pub beacon_interval: TimeUnit,
    pub capabilities: CapabilityInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    NotScanning,
    Scanning { channel_idx: usize },
}

pub struct Scanner {
    state: ScanState,
    dwell_timeout: Option<EventId>,
    candidates: Vec<Candidate>,
    scan_start: Time,
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            state: ScanState::NotScanning,
            dwell_timeout: None,
            candidates: vec![],
            scan_start: Time::ZERO,
        }
    }

    pub fn is_scanning(&self) -> bool {
        !matches!(self.state, ScanState::NotScanning)
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Begins a scan. Returns `false` if the scan completed on the spot
    /// (nothing to visit); the caller then proceeds directly to selection.
    pub fn start<D: Device>(&mut self, ctx: &mut Context<D>, dcf: &mut ChannelAccess) -> bool {
        self.scan_start = ctx.timer.now();
        match ctx.config.scan_mode {
            ScanMode::Disabled => {
                // Adopt the configured channel and wait for the configured
                // network to show up there; no dwell timer.
                let channel = ctx.config.station_channel;
                if let Err(e) = ctx.device.set_channel(channel) {
                    error!("failed setting channel {}: {}", channel, e);
                }
                self.state = ScanState::Scanning { channel_idx: 0 };
                true
            }
            ScanMode::Passive | ScanMode::Active => match self.next_listenable(ctx, 0) {
                Some(channel_idx) => {
                    self.state = ScanState::Scanning { channel_idx };
                    self.visit_channel(ctx, dcf, channel_idx);
                    true
                }
                None => {
                    warn!("no listenable channel in scan list");
                    self.state = ScanState::NotScanning;
                    false
                }
            },
        }
    }

    /// Advances to the next channel when a dwell period ends. Returns `true`
    /// once every channel has been visited and the scan is complete.
    pub fn handle_dwell_timeout<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        dcf: &mut ChannelAccess,
    ) -> bool {
        self.dwell_timeout = None;
        let channel_idx = match self.state {
            ScanState::Scanning { channel_idx } => channel_idx,
            ScanState::NotScanning => return false,
        };
        match self.next_listenable(ctx, channel_idx + 1) {
            Some(next_idx) => {
                self.state = ScanState::Scanning { channel_idx: next_idx };
                self.visit_channel(ctx, dcf, next_idx);
                false
            }
            None => {
                self.state = ScanState::NotScanning;
                true
            }
        }
    }

    fn next_listenable<D: Device>(&self, ctx: &Context<D>, from_idx: usize) -> Option<usize> {
        ctx.config
            .channel_list
            .iter()
            .enumerate()
            .skip(from_idx)
            .find(|(_, channel)| ctx.device.can_listen_on(**channel))
            .map(|(idx, _)| idx)
    }

    fn visit_channel<D: Device>(
        &mut self,
        ctx: &mut Context<D>,
        dcf: &mut ChannelAccess,
        channel_idx: usize,
    ) {
        let channel = ctx.config.channel_list[channel_idx];
        debug!("scanning channel {}", channel);
        if let Err(e) = ctx.device.set_channel(channel) {
            error!("failed setting channel {}: {}", channel, e);
        }
        let dwell = match ctx.config.scan_mode {
            ScanMode::Active => {
                let own_addr = ctx.device.mac_addr();
                let seq_num = ctx.seq_mgr.next_seq_num(wlan_common::mac::BCAST_ADDR);
                let ssid = ctx.config.ssid.clone();
                let now = ctx.timer.now();
                match frames::probe_req(MacRole::Client, own_addr, &ssid, seq_num, now) {
                    Ok(desc) => dcf.enqueue_mgmt(ctx, desc),
                    Err(e) => error!("failed building probe request: {}", e),
                }
                ctx.config.probe_dwell_time
            }
            _ => ctx.config.dwell_time,
        };
        let id = ctx.timer.schedule_after(dwell, TimedEvent::Client(ClientEvent::ScanDwell));
        if let Some(old) = self.dwell_timeout.replace(id) {
            ctx.timer.cancel_event(old);
        }
    }

    /// Folds a heard beacon or probe response into the candidate list.
    /// Returns `true` when this discovery completes the scan on the spot
    /// (disabled-scan mode waiting for the configured network).
    pub fn on_candidate_heard<D: Device>(
        &mut self,
        ctx: &Context<D>,
        bssid: Bssid,
        ssid: &[u8],
        channel: u8,
        rssi: DecibelMilliWatt,
        beacon_interval: TimeUnit,
        capabilities: CapabilityInfo,
    ) -> bool {
        let now = ctx.timer.now();
        match self.candidates.iter_mut().find(|c| c.bssid == bssid) {
            Some(existing) => {
                existing.signal.update_average(rssi);
                existing.last_heard = now;
                existing.ssid = ssid.to_vec();
                existing.channel = channel;
                existing.beacon_interval = beacon_interval;
                existing.capabilities = capabilities;
            }
            None => self.candidates.push(Candidate {
                bssid,
                ssid: ssid.to_vec(),
                channel,
                signal: EwmaSignalStrength::new(SIGNAL_AVERAGING_DEPTH, rssi),
                last_heard: now,
                beacon_interval,
                capabilities,
            }),
        }
        let completes_wait = matches!(ctx.config.scan_mode, ScanMode::Disabled)
            && self.is_scanning()
            && ssid_matches(&ctx.config.ssid, ssid);
        if completes_wait {
            self.state = ScanState::NotScanning;
        }
        completes_wait
    }

    /// Strongest candidate heard since scan start whose estimated signal
    /// clears the configured floor and whose network matches the configured
    /// one. Strict `>` comparison: the first candidate seen wins ties.
    pub fn best_candidate<D: Device>(&self, ctx: &Context<D>) -> Option<&Candidate> {
        let mut best: Option<&Candidate> = None;
        for candidate in &self.candidates {
            if candidate.last_heard < self.scan_start {
                continue;
            }
            if candidate.signal.dbm() <= ctx.config.signal_floor {
                continue;
            }
            if !ssid_matches(&ctx.config.ssid, &candidate.ssid) {
                continue;
            }
            match best {
                Some(current) if candidate.signal.dbm() > current.signal.dbm() => {
                    best = Some(candidate)
                }
                Some(_) => {}
                None => best = Some(candidate),
            }
        }
        best
    }
}

/// An empty configured SSID means "any network".
fn ssid_matches(configured: &[u8], heard: &[u8]) -> bool {
    configured.is_empty() || configured == heard
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{config::Config, device::FakeDevice},
        rand::{rngs::StdRng, SeedableRng},
        wlan_common::{
            assert_variant,
            mac::MacFrame,
            sequence::SequenceManager,
            time::DurationNum,
            timer::{FakeScheduler, Timer},
        },
    };

    const AP_1: Bssid = Bssid([1; 6]);
    const AP_2: Bssid = Bssid([2; 6]);

    struct MockObjects {
        fake_device: FakeDevice,
        fake_scheduler: FakeScheduler,
    }

    impl MockObjects {
        fn new() -> Self {
            Self { fake_device: FakeDevice::new(), fake_scheduler: FakeScheduler::new() }
        }

        fn make_ctx(&self, config: Config) -> Context<FakeDevice> {
            Context {
                config,
                device: self.fake_device.clone(),
                timer: Timer::new(self.fake_scheduler.as_scheduler()),
                seq_mgr: SequenceManager::new(),
                counters: Default::default(),
            }
        }
    }

    fn make_dcf(config: &Config) -> ChannelAccess {
        ChannelAccess::new(config, Box::new(StdRng::seed_from_u64(7)))
    }

    fn hear(
        scanner: &mut Scanner,
        ctx: &Context<FakeDevice>,
        bssid: Bssid,
        ssid: &[u8],
        channel: u8,
        rssi_dbm: i8,
    ) -> bool {
        scanner.on_candidate_heard(
            ctx,
            bssid,
            ssid,
            channel,
            DecibelMilliWatt(rssi_dbm),
            TimeUnit(100),
            CapabilityInfo(1),
        )
    }

    #[test]
    fn passive_scan_walks_listenable_channels() {
        let m = MockObjects::new();
        let mut ctx = m.make_ctx(Config {
            scan_mode: ScanMode::Passive,
            channel_list: vec![1, 2, 3],
            ..Config::default()
        });
        m.fake_device.state().unlistenable_channels = vec![2];
        let mut dcf = make_dcf(&ctx.config);
        let mut scanner = Scanner::new();

        assert!(scanner.start(&mut ctx, &mut dcf));
        assert_eq!(m.fake_device.state().channel, 1);
        assert!(scanner.is_scanning());

        // Channel 2 is unlistenable and skipped.
        assert!(!scanner.handle_dwell_timeout(&mut ctx, &mut dcf));
        assert_eq!(m.fake_device.state().channel, 3);

        // Exhausting the list completes the scan.
        assert!(scanner.handle_dwell_timeout(&mut ctx, &mut dcf));
        assert!(!scanner.is_scanning());
        // No probe requests in passive mode.
        assert!(m.fake_device.state().wlan_queue.is_empty());
    }

    #[test]
    fn active_scan_sends_probe_request_per_channel() {
        let m = MockObjects::new();
        let mut ctx = m.make_ctx(Config {
            scan_mode: ScanMode::Active,
            channel_list: vec![1, 6],
            ssid: b"net".to_vec(),
            ..Config::default()
        });
        let mut dcf = make_dcf(&ctx.config);
        let mut scanner = Scanner::new();

        assert!(scanner.start(&mut ctx, &mut dcf));
        // The probe request contends and is eventually transmitted; drive the
        // engine to transmission.
        let mut probes = 0;
        for _ in 0..200 {
            if let Some(frame) = m.fake_device.next_wlan_frame() {
                assert_variant!(MacFrame::parse(&frame[..]), Some(MacFrame::Mgmt { .. }));
                probes += 1;
                dcf.handle_phy_status_changed(
                    &mut ctx,
                    crate::device::PhyStatus::Transmitting,
                    crate::device::PhyStatus::Idle,
                );
                if probes == 1 {
                    // End of first dwell: moves to channel 6 and probes again.
                    assert!(!scanner.handle_dwell_timeout(&mut ctx, &mut dcf));
                    continue;
                }
                break;
            }
            let id = m.fake_scheduler.next_event().expect("no timer pending");
            match ctx.timer.triggered(&id) {
                Some(TimedEvent::Access(timeout)) => {
                    dcf.handle_timeout(&mut ctx, timeout);
                }
                Some(TimedEvent::Client(ClientEvent::ScanDwell)) | None => {}
                Some(other) => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(probes, 2);
    }

    #[test]
    fn disabled_scan_adopts_configured_channel_and_waits() {
        let m = MockObjects::new();
        let mut ctx = m.make_ctx(Config {
            scan_mode: ScanMode::Disabled,
            station_channel: 11,
            ssid: b"net".to_vec(),
            ..Config::default()
        });
        let mut dcf = make_dcf(&ctx.config);
        let mut scanner = Scanner::new();

        assert!(scanner.start(&mut ctx, &mut dcf));
        assert_eq!(m.fake_device.state().channel, 11);
        // No dwell timer in disabled mode.
        assert_eq!(m.fake_scheduler.pending(), 0);

        // A foreign network does not complete the wait; the configured one does.
        assert!(!hear(&mut scanner, &ctx, AP_2, b"other", 11, -40));
        assert!(hear(&mut scanner, &ctx, AP_1, b"net", 11, -50));
    }

    #[test]
    fn best_candidate_prefers_strongest_above_floor() {
        let m = MockObjects::new();
        let mut ctx = m.make_ctx(Config {
            signal_floor: DecibelMilliWatt(-85),
            ..Config::default()
        });
        let mut dcf = make_dcf(&ctx.config);
        let mut scanner = Scanner::new();
        scanner.start(&mut ctx, &mut dcf);

        hear(&mut scanner, &ctx, AP_1, b"net", 1, -60);
        hear(&mut scanner, &ctx, AP_2, b"net", 6, -40);
        let best = scanner.best_candidate(&ctx).expect("no candidate selected");
        assert_eq!(best.bssid, AP_2);
    }

    #[test]
    fn candidates_below_floor_are_never_selected() {
        let m = MockObjects::new();
        let mut ctx = m.make_ctx(Config {
            signal_floor: DecibelMilliWatt(-50),
            ..Config::default()
        });
        let mut dcf = make_dcf(&ctx.config);
        let mut scanner = Scanner::new();
        scanner.start(&mut ctx, &mut dcf);

        hear(&mut scanner, &ctx, AP_1, b"net", 1, -60);
        assert!(scanner.best_candidate(&ctx).is_none());
    }

    #[test]
    fn stale_candidates_are_ignored_by_selection() {
        let m = MockObjects::new();
        let mut ctx = m.make_ctx(Config::default());
        let mut dcf = make_dcf(&ctx.config);
        let mut scanner = Scanner::new();

        scanner.start(&mut ctx, &mut dcf);
        hear(&mut scanner, &ctx, AP_1, b"net", 1, -40);

        // A later scan starts; the old sighting no longer qualifies.
        m.fake_scheduler.increment_time(10.seconds());
        scanner.start(&mut ctx, &mut dcf);
        assert!(scanner.best_candidate(&ctx).is_none());

        // Heard again during the new scan: selectable again.
        hear(&mut scanner, &ctx, AP_1, b"net", 1, -40);
        assert!(scanner.best_candidate(&ctx).is_some());
    }

    #[test]
    fn ties_go_to_the_first_candidate_seen() {
        let m = MockObjects::new();
        let mut ctx = m.make_ctx(Config::default());
        let mut dcf = make_dcf(&ctx.config);
        let mut scanner = Scanner::new();
        scanner.start(&mut ctx, &mut dcf);

        hear(&mut scanner, &ctx, AP_1, b"net", 1, -40);
        hear(&mut scanner, &ctx, AP_2, b"net", 6, -40);
        let best = scanner.best_candidate(&ctx).expect("no candidate selected");
        assert_eq!(best.bssid, AP_1);
    }
}
