// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! IPv6 headers.

use crate::api::Ipv6Addr;
use core::mem;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const IPV6_HDR_SZ: usize = mem::size_of::<Ipv6HdrRaw>();

/// Version 6, zero traffic class and flow label.
pub const IPV6_VTC_FLOW: u32 = 0x6000_0000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv6Meta {
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    pub next_hdr: u8,
    pub hop_limit: u8,
    pub payload_len: u16,
}

#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct Ipv6HdrRaw {
    pub vtc_flow: [u8; 4],
    pub payload_len: [u8; 2],
    pub next_hdr: u8,
    pub hop_limit: u8,
    pub src: [u8; 16],
    pub dst: [u8; 16],
}

impl From<&Ipv6Meta> for Ipv6HdrRaw {
    fn from(meta: &Ipv6Meta) -> Self {
        Self {
            vtc_flow: IPV6_VTC_FLOW.to_be_bytes(),
            payload_len: meta.payload_len.to_be_bytes(),
            next_hdr: meta.next_hdr,
            hop_limit: meta.hop_limit,
            src: meta.src.bytes(),
            dst: meta.dst.bytes(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn emit() {
        let src = Ipv6Addr::from_const([0xfd00, 0, 0, 0, 0, 0, 0, 1]);
        let dst = Ipv6Addr::from_const([0xfd00, 0, 0, 0, 0, 0, 0, 2]);
        let raw = Ipv6HdrRaw::from(&Ipv6Meta {
            src,
            dst,
            next_hdr: 6,
            hop_limit: 0,
            payload_len: 0,
        });
        let bytes = raw.as_bytes();
        assert_eq!(IPV6_HDR_SZ, 40);
        assert_eq!(&bytes[..8], &[0x60, 0, 0, 0, 0, 0, 6, 0]);
        assert_eq!(&bytes[8..24], src.as_ref());
        assert_eq!(&bytes[24..], dst.as_ref());
    }
}
