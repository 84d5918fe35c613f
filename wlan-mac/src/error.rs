// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::MacRole,
    thiserror::Error,
    wlan_common::error::{FrameParseError, FrameWriteError},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("channel access engine is busy with another frame")]
    NotIdle,
    #[error("operation not supported in {0:?} role")]
    UnsupportedRole(MacRole),
    #[error("station is not joined to a BSS")]
    NotJoined,
    #[error("peer is not an associated station")]
    PeerNotAssociated,
    #[error("error parsing frame: {0}")]
    ParsingFrame(#[from] FrameParseError),
    #[error("error writing frame: {0}")]
    WritingFrame(#[from] FrameWriteError),
    #[error("device rejected request: {0}")]
    Device(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_convert() {
        let e: Error = FrameParseError::BufferTooShort("auth header").into();
        assert!(matches!(e, Error::ParsingFrame(_)));

        let e: Error = FrameWriteError::InvalidData("SSID longer than 32 bytes").into();
        assert!(matches!(e, Error::WritingFrame(_)));
    }
}
