// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Reading and writing the information elements carried after the fixed body
//! of a management frame. Only the elements this MAC acts on are given names;
//! unknown elements are surfaced by id so callers can skip them.

use crate::error::FrameWriteError;

// IEEE Std 802.11-2016, 9.4.2.1, Table 9-77
pub const SSID_ID: u8 = 0;
pub const SUPPORTED_RATES_ID: u8 = 1;
pub const DSSS_PARAM_SET_ID: u8 = 3;

// IEEE Std 802.11-2016, 9.4.2.2
pub const SSID_MAX_LEN: usize = 32;

/// Iterates over `(id, body)` pairs; stops at the first malformed element.
pub struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader(bytes)
    }
}

impl<'a> Iterator for Reader<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.0.len() < 2 {
            return None;
        }
        let id = self.0[0];
        let body_len = self.0[1] as usize;
        if self.0.len() < 2 + body_len {
            return None;
        }
        let body = &self.0[2..2 + body_len];
        self.0 = &self.0[2 + body_len..];
        Some((id, body))
    }
}

pub fn find_ssid(elements: &[u8]) -> Option<&[u8]> {
    Reader::new(elements).find(|(id, _)| *id == SSID_ID).map(|(_, body)| body)
}

pub fn write_ssid(buf: &mut Vec<u8>, ssid: &[u8]) -> Result<(), FrameWriteError> {
    if ssid.len() > SSID_MAX_LEN {
        return Err(FrameWriteError::InvalidData("SSID longer than 32 bytes"));
    }
    buf.push(SSID_ID);
    buf.push(ssid.len() as u8);
    buf.extend_from_slice(ssid);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_elements() {
        #[rustfmt::skip]
        let bytes = [
            0, 3, b'f', b'o', b'o', // SSID
            1, 2, 0x82, 0x84, // supported rates
        ];
        let elements: Vec<_> = Reader::new(&bytes[..]).collect();
        assert_eq!(
            elements,
            vec![(SSID_ID, &b"foo"[..]), (SUPPORTED_RATES_ID, &[0x82, 0x84][..])]
        );
    }

    #[test]
    fn read_stops_at_malformed_element() {
        let bytes = [0, 3, b'f', b'o', b'o', 1, 200, 0x82];
        let elements: Vec<_> = Reader::new(&bytes[..]).collect();
        assert_eq!(elements, vec![(SSID_ID, &b"foo"[..])]);
    }

    #[test]
    fn find_ssid_element() {
        let bytes = [3, 1, 11, 0, 3, b'f', b'o', b'o'];
        assert_eq!(find_ssid(&bytes[..]), Some(&b"foo"[..]));
        assert_eq!(find_ssid(&bytes[..3]), None);
    }

    #[test]
    fn write_ssid_element() {
        let mut buf = vec![];
        write_ssid(&mut buf, b"foo").expect("failed writing SSID");
        assert_eq!(buf, vec![0, 3, b'f', b'o', b'o']);
    }

    #[test]
    fn write_overlong_ssid_fails() {
        let mut buf = vec![];
        assert_eq!(
            write_ssid(&mut buf, &[b'x'; 33]),
            Err(FrameWriteError::InvalidData("SSID longer than 32 bytes"))
        );
        assert!(buf.is_empty());
    }
}
