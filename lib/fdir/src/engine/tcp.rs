// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! TCP headers.

use core::mem;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const TCP_HDR_SZ: usize = mem::size_of::<TcpHdrRaw>();

/// Five 32-bit words, no options.
pub const TCP_DATA_OFFSET: u8 = 0x50;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TcpMeta {
    pub src: u16,
    pub dst: u16,
}

#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct TcpHdrRaw {
    pub src_port: [u8; 2],
    pub dst_port: [u8; 2],
    pub seq: [u8; 4],
    pub ack: [u8; 4],
    pub offset: u8,
    pub flags: u8,
    pub win: [u8; 2],
    pub csum: [u8; 2],
    pub urg: [u8; 2],
}

impl From<&TcpMeta> for TcpHdrRaw {
    fn from(meta: &TcpMeta) -> Self {
        Self {
            src_port: meta.src.to_be_bytes(),
            dst_port: meta.dst.to_be_bytes(),
            seq: [0; 4],
            ack: [0; 4],
            offset: TCP_DATA_OFFSET,
            flags: 0,
            win: [0; 2],
            csum: [0; 2],
            urg: [0; 2],
        }
    }
}
