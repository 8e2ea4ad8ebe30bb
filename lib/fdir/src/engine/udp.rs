// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! UDP headers.

use core::mem;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const UDP_HDR_SZ: usize = mem::size_of::<UdpHdrRaw>();

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UdpMeta {
    pub src: u16,
    pub dst: u16,
    pub len: u16,
}

#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct UdpHdrRaw {
    pub src_port: [u8; 2],
    pub dst_port: [u8; 2],
    pub length: [u8; 2],
    pub csum: [u8; 2],
}

impl From<&UdpMeta> for UdpHdrRaw {
    fn from(meta: &UdpMeta) -> Self {
        Self {
            src_port: meta.src.to_be_bytes(),
            dst_port: meta.dst.to_be_bytes(),
            length: meta.len.to_be_bytes(),
            csum: [0; 2],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn emit() {
        let raw = UdpHdrRaw::from(&UdpMeta { src: 4789, dst: 53, len: 8 });
        assert_eq!(UDP_HDR_SZ, 8);
        assert_eq!(raw.as_bytes(), &[0x12, 0xB5, 0x00, 0x35, 0, 8, 0, 0]);
    }
}
