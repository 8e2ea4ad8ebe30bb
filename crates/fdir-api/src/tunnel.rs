// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use super::ip::IpAddr;
use super::mac::MacAddr;
use alloc::string::String;
use bitflags::bitflags;
use core::fmt;
use core::fmt::Display;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

/// Default IANA port for VXLAN.
pub const VXLAN_DEFAULT_PORT: u16 = 4789;

/// Default IANA port for GENEVE.
pub const GENEVE_DEFAULT_PORT: u16 = 6081;

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum TunnelType {
    #[default]
    None,
    Vxlan,
    Geneve,
    Teredo,
    Nvgre,
    IpInGre,
    ETag,
}

impl FromStr for TunnelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "vxlan" => Ok(Self::Vxlan),
            "geneve" => Ok(Self::Geneve),
            "teredo" => Ok(Self::Teredo),
            "nvgre" => Ok(Self::Nvgre),
            "ipgre" | "ip-in-gre" => Ok(Self::IpInGre),
            "e-tag" | "etag" => Ok(Self::ETag),
            _ => Err(format!("invalid tunnel type: {s}")),
        }
    }
}

impl Display for TunnelType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Vxlan => "vxlan",
            Self::Geneve => "geneve",
            Self::Teredo => "teredo",
            Self::Nvgre => "nvgre",
            Self::IpInGre => "ipgre",
            Self::ETag => "e-tag",
        };
        write!(f, "{s}")
    }
}

bitflags! {
/// The fields a tunnel filter matches on.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
pub struct TunnelFilterFlags: u16 {
    /// Outer destination MAC.
    const OMAC = 1 << 0;
    /// Outer destination IP.
    const OIP = 1 << 1;
    /// Tenant ID (VNI).
    const TENID = 1 << 2;
    /// Inner destination MAC.
    const IMAC = 1 << 3;
    /// Inner VLAN.
    const IVLAN = 1 << 4;
    /// Inner destination IP.
    const IIP = 1 << 5;
}
}

/// A request to steer tunnelled traffic.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TunnelFilterConf {
    pub outer_mac: MacAddr,
    pub inner_mac: MacAddr,
    pub inner_vlan: u16,
    pub ip_addr: Option<IpAddr>,
    pub filter_type: TunnelFilterFlags,
    pub tunnel_type: TunnelType,
    pub tenant_id: u32,
    pub queue_id: u16,
}

/// A UDP destination port to recognize as a tunnel.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct UdpTunnel {
    pub udp_port: u16,
    pub prot_type: TunnelType,
}

/// The classification the device applies to a tunnel kind.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub enum TunnClss {
    #[default]
    MacVlan,
    MacVni,
    InnerMacVlan,
    InnerMacVni,
}

impl Display for TunnClss {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::MacVlan => "mac-vlan",
            Self::MacVni => "mac-vni",
            Self::InnerMacVlan => "inner-mac-vlan",
            Self::InnerMacVni => "inner-mac-vni",
        };
        write!(f, "{s}")
    }
}

/// The unicast filter kinds the device understands.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum UcastFilterType {
    Mac,
    Vlan,
    MacVlan,
    InnerMac,
    InnerVlan,
    InnerPair,
    InnerMacVniPair,
    MacVniPair,
    Vni,
}

impl Display for UcastFilterType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Mac => "mac",
            Self::Vlan => "vlan",
            Self::MacVlan => "mac-vlan",
            Self::InnerMac => "inner-mac",
            Self::InnerVlan => "inner-vlan",
            Self::InnerPair => "inner-pair",
            Self::InnerMacVniPair => "inner-mac-vni-pair",
            Self::MacVniPair => "mac-vni-pair",
            Self::Vni => "vni",
        };
        write!(f, "{s}")
    }
}
