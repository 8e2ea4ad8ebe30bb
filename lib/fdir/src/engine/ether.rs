// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Ethernet and 802.1Q headers.

use crate::api::MacAddr;
use core::mem;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const ETHER_TYPE_IPV4: u16 = 0x0800;
pub const ETHER_TYPE_VLAN: u16 = 0x8100;
pub const ETHER_TYPE_IPV6: u16 = 0x86DD;

pub const ETHER_ADDR_LEN: usize = 6;
pub const ETHER_HDR_SZ: usize = mem::size_of::<EtherHdrRaw>();
pub const VLAN_HDR_SZ: usize = mem::size_of::<VlanHdrRaw>();

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EtherMeta {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ether_type: u16,
}

#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct EtherHdrRaw {
    pub dst: [u8; ETHER_ADDR_LEN],
    pub src: [u8; ETHER_ADDR_LEN],
    pub ether_type: [u8; 2],
}

impl From<&EtherMeta> for EtherHdrRaw {
    fn from(meta: &EtherMeta) -> Self {
        Self {
            dst: meta.dst.bytes(),
            src: meta.src.bytes(),
            ether_type: meta.ether_type.to_be_bytes(),
        }
    }
}

/// The remainder of an 802.1Q tag, following an Ethernet header whose
/// type is [`ETHER_TYPE_VLAN`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VlanMeta {
    pub tci: u16,
    pub ether_type: u16,
}

#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct VlanHdrRaw {
    pub tci: [u8; 2],
    pub ether_type: [u8; 2],
}

impl From<&VlanMeta> for VlanHdrRaw {
    fn from(meta: &VlanMeta) -> Self {
        Self {
            tci: meta.tci.to_be_bytes(),
            ether_type: meta.ether_type.to_be_bytes(),
        }
    }
}
