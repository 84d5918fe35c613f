// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum FrameParseError {
    #[error("buffer too short to hold {0}")]
    BufferTooShort(&'static str),
    #[error("unsupported frame type {0}")]
    UnsupportedFrameType(u16),
    #[error("invalid element body for {0}")]
    InvalidElement(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum FrameWriteError {
    #[error("buffer too small to write {0}")]
    BufferTooSmall(&'static str),
    #[error("invalid field value: {0}")]
    InvalidData(&'static str),
}
