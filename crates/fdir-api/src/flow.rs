// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Flow director and ntuple filter descriptors.

use super::ip::IpAddr;
use super::ip::Ipv4Addr;
use super::ip::PROTO_SCTP;
use super::ip::PROTO_TCP;
use super::ip::PROTO_UDP;
use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

/// The kind of flow a filter describes.
///
/// Only the four TCP/UDP kinds can be turned into a packet template;
/// the rest exist so that requests naming them can be rejected with
/// a meaningful error.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum FlowType {
    Raw,
    Ipv4Frag,
    Ipv4Tcp,
    Ipv4Udp,
    Ipv4Sctp,
    Ipv4Other,
    Ipv6Frag,
    Ipv6Tcp,
    Ipv6Udp,
    Ipv6Sctp,
    Ipv6Other,
    L2Payload,
}

impl FlowType {
    pub const fn is_ipv4(&self) -> bool {
        matches!(
            self,
            Self::Ipv4Frag
                | Self::Ipv4Tcp
                | Self::Ipv4Udp
                | Self::Ipv4Sctp
                | Self::Ipv4Other
        )
    }

    pub const fn is_ipv6(&self) -> bool {
        matches!(
            self,
            Self::Ipv6Frag
                | Self::Ipv6Tcp
                | Self::Ipv6Udp
                | Self::Ipv6Sctp
                | Self::Ipv6Other
        )
    }

    /// Can a filter of this kind be programmed?
    pub const fn is_supported(&self) -> bool {
        matches!(
            self,
            Self::Ipv4Tcp | Self::Ipv4Udp | Self::Ipv6Tcp | Self::Ipv6Udp
        )
    }

    /// The transport protocol implied by the flow kind, if any.
    pub const fn l4_proto(&self) -> Option<u8> {
        match self {
            Self::Ipv4Tcp | Self::Ipv6Tcp => Some(PROTO_TCP),
            Self::Ipv4Udp | Self::Ipv6Udp => Some(PROTO_UDP),
            Self::Ipv4Sctp | Self::Ipv6Sctp => Some(PROTO_SCTP),
            _ => None,
        }
    }
}

impl FromStr for FlowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "ipv4-frag" => Ok(Self::Ipv4Frag),
            "ipv4-tcp" => Ok(Self::Ipv4Tcp),
            "ipv4-udp" => Ok(Self::Ipv4Udp),
            "ipv4-sctp" => Ok(Self::Ipv4Sctp),
            "ipv4-other" => Ok(Self::Ipv4Other),
            "ipv6-frag" => Ok(Self::Ipv6Frag),
            "ipv6-tcp" => Ok(Self::Ipv6Tcp),
            "ipv6-udp" => Ok(Self::Ipv6Udp),
            "ipv6-sctp" => Ok(Self::Ipv6Sctp),
            "ipv6-other" => Ok(Self::Ipv6Other),
            "l2-payload" => Ok(Self::L2Payload),
            _ => Err(format!("invalid flow type: {s}")),
        }
    }
}

impl Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Raw => "raw",
            Self::Ipv4Frag => "ipv4-frag",
            Self::Ipv4Tcp => "ipv4-tcp",
            Self::Ipv4Udp => "ipv4-udp",
            Self::Ipv4Sctp => "ipv4-sctp",
            Self::Ipv4Other => "ipv4-other",
            Self::Ipv6Frag => "ipv6-frag",
            Self::Ipv6Tcp => "ipv6-tcp",
            Self::Ipv6Udp => "ipv6-udp",
            Self::Ipv6Sctp => "ipv6-sctp",
            Self::Ipv6Other => "ipv6-other",
            Self::L2Payload => "l2-payload",
        };
        write!(f, "{s}")
    }
}

/// The match side of a flow director filter.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FdirInput {
    pub flow_type: FlowType,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    /// Overrides the protocol implied by `flow_type`.
    pub proto: Option<u8>,
    /// Overrides the default IPv4 TTL of 64. Ignored for IPv6.
    pub ttl: Option<u8>,
    pub tos: u8,
    /// The VLAN TCI, host order. When present the template carries
    /// an 802.1Q tag.
    pub vlan_tci: Option<u16>,
    /// The request arrived through a VF representor.
    pub from_vf: bool,
}

/// What to do with a packet matching the filter.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct FdirAction {
    pub rx_queue: u16,
}

/// A complete flow director filter request.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FdirFilter {
    pub input: FdirInput,
    pub action: FdirAction,
}

/// A legacy 5-tuple filter. These are IPv4 only.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NtupleFilter {
    pub proto: u8,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub queue: u16,
}

/// The flow director mode requested at device configuration.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub enum FdirMode {
    #[default]
    None,
    Signature,
    Perfect,
    PerfectMacVlan,
    PerfectTunnel,
}

impl FromStr for FdirMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "signature" => Ok(Self::Signature),
            "perfect" => Ok(Self::Perfect),
            "perfect-mac-vlan" => Ok(Self::PerfectMacVlan),
            "perfect-tunnel" => Ok(Self::PerfectTunnel),
            _ => Err(format!("invalid fdir mode: {s}")),
        }
    }
}

/// The searcher configuration programmed into the device.
///
/// The L3/L4 flags accumulate as filters of new kinds are added and
/// are only cleared when the last filter goes away.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct ArfsConfig {
    pub enable: bool,
    pub ipv4: bool,
    pub ipv6: bool,
    pub tcp: bool,
    pub udp: bool,
}

impl ArfsConfig {
    /// Return this configuration, enabled and widened to cover
    /// `flow_type`.
    pub fn including(mut self, flow_type: FlowType) -> Self {
        self.enable = true;
        self.ipv4 |= flow_type.is_ipv4();
        self.ipv6 |= flow_type.is_ipv6();
        match flow_type.l4_proto() {
            Some(PROTO_TCP) => self.tcp = true,
            Some(PROTO_UDP) => self.udp = true,
            _ => (),
        }
        self
    }
}

impl Display for ArfsConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.enable {
            return write!(f, "disabled");
        }

        let kinds = [
            (self.ipv4, "ipv4"),
            (self.ipv6, "ipv6"),
            (self.tcp, "tcp"),
            (self.udp, "udp"),
        ];
        let mut first = true;
        for (on, name) in kinds {
            if on {
                if !first {
                    write!(f, ",")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flow_type_names() {
        for ft in [
            FlowType::Raw,
            FlowType::Ipv4Tcp,
            FlowType::Ipv6Udp,
            FlowType::Ipv6Other,
            FlowType::L2Payload,
        ] {
            assert_eq!(format!("{ft}").parse::<FlowType>().unwrap(), ft);
        }
        assert!("ipv5-tcp".parse::<FlowType>().is_err());
    }

    #[test]
    fn arfs_accumulates() {
        let cfg = ArfsConfig::default().including(FlowType::Ipv4Tcp);
        assert_eq!(
            cfg,
            ArfsConfig {
                enable: true,
                ipv4: true,
                ipv6: false,
                tcp: true,
                udp: false
            }
        );
        assert_eq!(cfg.including(FlowType::Ipv4Tcp), cfg);

        let cfg = cfg.including(FlowType::Ipv6Udp);
        assert!(cfg.ipv4 && cfg.ipv6 && cfg.tcp && cfg.udp);
        assert_eq!(format!("{cfg}"), "ipv4,ipv6,tcp,udp");
        assert_eq!(format!("{}", ArfsConfig::default()), "disabled");
    }
}
