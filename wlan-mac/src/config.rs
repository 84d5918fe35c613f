// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    log::warn,
    wlan_common::{
        energy::DecibelMilliWatt,
        time::{Duration, DurationNum, TimeUnit},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Disabled,
    Passive,
    Active,
}

/// The recognized configuration surface. Out-of-range values never abort
/// interface bring-up: [`Config::sanitize`] clamps them to a safe default and
/// logs a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub ssid: Vec<u8>,
    pub scan_mode: ScanMode,
    /// Channels visited by a scan, in order.
    pub channel_list: Vec<u8>,
    /// Channel adopted directly when scanning is disabled, and the channel an
    /// access point operates on.
    pub station_channel: u8,
    /// How long a passive scan listens for beacons on each channel.
    pub dwell_time: Duration,
    /// How long an active scan waits for probe responses on each channel.
    pub probe_dwell_time: Duration,
    pub short_retry_limit: u16,
    pub long_retry_limit: u16,
    /// Frames strictly larger than this use the RTS/CTS handshake;
    /// 0 means every unicast frame does.
    pub rts_threshold: usize,
    pub cw_min: u16,
    pub cw_max: u16,
    /// Candidates below this signal estimate are never joined.
    pub signal_floor: DecibelMilliWatt,
    /// A new access point must beat the current one by this many dB before a
    /// handover is attempted.
    pub handover_margin_db: i8,
    pub beacon_interval: TimeUnit,
    /// Access-point side: registry records older than this are evicted.
    pub inactivity_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ssid: vec![],
            scan_mode: ScanMode::Passive,
            channel_list: (1..=11).collect(),
            station_channel: 1,
            dwell_time: 200.millis(),
            probe_dwell_time: 30.millis(),
            short_retry_limit: 7,
            long_retry_limit: 4,
            rts_threshold: 2346,
            cw_min: 31,
            cw_max: 1023,
            signal_floor: DecibelMilliWatt(-85),
            handover_margin_db: 4,
            beacon_interval: TimeUnit::DEFAULT_BEACON_INTERVAL,
            inactivity_timeout: 60.seconds(),
        }
    }
}

impl Config {
    /// Clamps out-of-range values to safe defaults. Invalid configuration is
    /// never fatal.
    pub fn sanitize(mut self) -> Self {
        let defaults = Config::default();
        if self.short_retry_limit == 0 {
            warn!("short retry limit must be positive; using {}", defaults.short_retry_limit);
            self.short_retry_limit = defaults.short_retry_limit;
        }
        if self.long_retry_limit == 0 {
            warn!("long retry limit must be positive; using {}", defaults.long_retry_limit);
            self.long_retry_limit = defaults.long_retry_limit;
        }
        if self.cw_min == 0 {
            warn!("cw_min must be positive; using {}", defaults.cw_min);
            self.cw_min = defaults.cw_min;
        }
        if self.cw_max < self.cw_min {
            warn!("cw_max {} below cw_min {}; using cw_max = cw_min", self.cw_max, self.cw_min);
            self.cw_max = self.cw_min;
        }
        if self.dwell_time <= Duration::ZERO {
            warn!("non-positive dwell time; using default");
            self.dwell_time = defaults.dwell_time;
        }
        if self.probe_dwell_time <= Duration::ZERO {
            warn!("non-positive probe dwell time; using default");
            self.probe_dwell_time = defaults.probe_dwell_time;
        }
        if self.handover_margin_db < 0 {
            warn!("negative handover margin; using {}", defaults.handover_margin_db);
            self.handover_margin_db = defaults.handover_margin_db;
        }
        if self.beacon_interval.0 == 0 {
            warn!("beacon interval must be positive; using default");
            self.beacon_interval = defaults.beacon_interval;
        }
        if self.inactivity_timeout <= Duration::ZERO {
            warn!("non-positive inactivity timeout; using default");
            self.inactivity_timeout = defaults.inactivity_timeout;
        }
        if self.channel_list.is_empty() {
            warn!("empty channel list; using default");
            self.channel_list = defaults.channel_list;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_survives_sanitize() {
        let config = Config::default();
        assert_eq!(config.clone().sanitize(), config);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = Config {
            short_retry_limit: 0,
            long_retry_limit: 0,
            cw_min: 0,
            cw_max: 0,
            dwell_time: Duration::ZERO,
            handover_margin_db: -3,
            channel_list: vec![],
            ..Config::default()
        }
        .sanitize();

        let defaults = Config::default();
        assert_eq!(config.short_retry_limit, defaults.short_retry_limit);
        assert_eq!(config.long_retry_limit, defaults.long_retry_limit);
        assert_eq!(config.cw_min, defaults.cw_min);
        assert!(config.cw_max >= config.cw_min);
        assert_eq!(config.dwell_time, defaults.dwell_time);
        assert_eq!(config.handover_margin_db, defaults.handover_margin_db);
        assert_eq!(config.channel_list, defaults.channel_list);
    }

    #[test]
    fn rts_threshold_zero_is_legal() {
        // 0 is meaningful (always RTS), not an error.
        let config = Config { rts_threshold: 0, ..Config::default() }.sanitize();
        assert_eq!(config.rts_threshold, 0);
    }
}
