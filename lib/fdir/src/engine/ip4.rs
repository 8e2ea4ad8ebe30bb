// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! IPv4 headers.

use crate::api::Ipv4Addr;
use core::mem;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const IPV4_HDR_SZ: usize = mem::size_of::<Ipv4HdrRaw>();
pub const IPV4_VER_HDR_LEN: u8 = 0x45;
pub const DEF_TTL: u8 = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv4Meta {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub proto: u8,
    pub ttl: u8,
    pub tos: u8,
    pub total_len: u16,
}

#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct Ipv4HdrRaw {
    pub ver_hdr_len: u8,
    pub tos: u8,
    pub total_len: [u8; 2],
    pub ident: [u8; 2],
    pub frag_and_flags: [u8; 2],
    pub ttl: u8,
    pub proto: u8,
    pub csum: [u8; 2],
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

// The checksum is left zero; the device never validates the template.
impl From<&Ipv4Meta> for Ipv4HdrRaw {
    fn from(meta: &Ipv4Meta) -> Self {
        Self {
            ver_hdr_len: IPV4_VER_HDR_LEN,
            tos: meta.tos,
            total_len: meta.total_len.to_be_bytes(),
            ident: [0; 2],
            frag_and_flags: [0; 2],
            ttl: meta.ttl,
            proto: meta.proto,
            csum: [0; 2],
            src: meta.src.bytes(),
            dst: meta.dst.bytes(),
        }
    }
}
