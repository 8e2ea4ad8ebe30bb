// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Packet templates.
//!
//! The device matches flow director filters against a synthetic
//! packet: an Ethernet frame carrying the headers of the flow with
//! every field the filter does not care about zeroed. A template is
//! built from a [`FdirInput`] alone, so two equal descriptors always
//! produce byte-identical templates. The filter set relies on this to
//! detect duplicates and to find the filter a delete refers to.
//!
//! Multi-byte fields are written in network order.

use super::ether::ETHER_TYPE_IPV4;
use super::ether::ETHER_TYPE_IPV6;
use super::ether::ETHER_TYPE_VLAN;
use super::ether::EtherHdrRaw;
use super::ether::EtherMeta;
use super::ether::VlanHdrRaw;
use super::ether::VlanMeta;
use super::ip4::DEF_TTL;
use super::ip4::IPV4_HDR_SZ;
use super::ip4::Ipv4HdrRaw;
use super::ip4::Ipv4Meta;
use super::ip6::Ipv6HdrRaw;
use super::ip6::Ipv6Meta;
use super::tcp::TCP_HDR_SZ;
use super::tcp::TcpHdrRaw;
use super::tcp::TcpMeta;
use super::udp::UDP_HDR_SZ;
use super::udp::UdpHdrRaw;
use super::udp::UdpMeta;
use crate::api::FdirInput;
use crate::api::FlowType;
use crate::api::IpAddr;
use crate::api::MacAddr;
use crate::api::PROTO_TCP;
use crate::api::PROTO_UDP;
use core::cmp::Ordering;
use core::fmt;
use core::fmt::Debug;
use core::hash::Hash;
use core::hash::Hasher;
use thiserror::Error;
use zerocopy::IntoBytes;

/// The largest template the device accepts.
pub const FDIR_MAX_PKT_LEN: usize = 86;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum TemplateError {
    #[error("cannot build a template for {0} flows")]
    UnsupportedFlow(FlowType),
    #[error("{flow_type} flow with {addr} address")]
    AddrFamilyMismatch { flow_type: FlowType, addr: &'static str },
    #[error("template needs {need} bytes, only {avail} available")]
    TooLong { need: usize, avail: usize },
}

/// A packet template: a fixed buffer plus the number of bytes used.
///
/// Equality, ordering and hashing only consider the used bytes.
#[derive(Clone)]
pub struct PacketTemplate {
    buf: [u8; FDIR_MAX_PKT_LEN],
    len: usize,
}

impl PacketTemplate {
    fn new() -> Self {
        Self { buf: [0; FDIR_MAX_PKT_LEN], len: 0 }
    }

    fn push(&mut self, bytes: &[u8]) -> Result<(), TemplateError> {
        let end = self.len + bytes.len();
        if end > FDIR_MAX_PKT_LEN {
            return Err(TemplateError::TooLong {
                need: end,
                avail: FDIR_MAX_PKT_LEN,
            });
        }
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// A short fingerprint of the template, for log messages.
    pub fn crc32(&self) -> u32 {
        crc32fast::hash(self.as_bytes())
    }
}

impl PartialEq for PacketTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for PacketTemplate {}

impl PartialOrd for PacketTemplate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PacketTemplate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl Hash for PacketTemplate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl Debug for PacketTemplate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PacketTemplate {{ len: {}, bytes: ", self.len)?;
        for b in self.as_bytes() {
            write!(f, "{b:02x}")?;
        }
        write!(f, " }}")
    }
}

/// Build the template for `input`.
///
/// Only the IPv4/IPv6 TCP/UDP flow types are supported, and the
/// addresses must belong to the family the flow type names.
pub fn build_template(
    input: &FdirInput,
) -> Result<PacketTemplate, TemplateError> {
    let (l4_len, implied_proto) = match input.flow_type {
        FlowType::Ipv4Tcp | FlowType::Ipv6Tcp => (TCP_HDR_SZ, PROTO_TCP),
        FlowType::Ipv4Udp | FlowType::Ipv6Udp => (UDP_HDR_SZ, PROTO_UDP),
        ft => return Err(TemplateError::UnsupportedFlow(ft)),
    };
    let proto = input.proto.unwrap_or(implied_proto);
    let ether_type = if input.flow_type.is_ipv4() {
        ETHER_TYPE_IPV4
    } else {
        ETHER_TYPE_IPV6
    };

    let mut tmpl = PacketTemplate::new();

    // The MAC addresses are never part of the match.
    let eth = EtherMeta {
        dst: MacAddr::ZERO,
        src: MacAddr::ZERO,
        ether_type: if input.vlan_tci.is_some() {
            ETHER_TYPE_VLAN
        } else {
            ether_type
        },
    };
    tmpl.push(EtherHdrRaw::from(&eth).as_bytes())?;

    if let Some(tci) = input.vlan_tci {
        let vlan = VlanMeta { tci, ether_type };
        tmpl.push(VlanHdrRaw::from(&vlan).as_bytes())?;
    }

    match (input.flow_type.is_ipv4(), input.src_ip, input.dst_ip) {
        (true, IpAddr::Ip4(src), IpAddr::Ip4(dst)) => {
            let ip = Ipv4Meta {
                src,
                dst,
                proto,
                ttl: input.ttl.unwrap_or(DEF_TTL),
                tos: input.tos,
                total_len: (IPV4_HDR_SZ + l4_len) as u16,
            };
            tmpl.push(Ipv4HdrRaw::from(&ip).as_bytes())?;
        }

        (false, IpAddr::Ip6(src), IpAddr::Ip6(dst)) => {
            // XXX The payload length is never filled in and the hop
            // limit stays zero. Installed filters depend on these bytes.
            let ip = Ipv6Meta {
                src,
                dst,
                next_hdr: proto,
                hop_limit: 0,
                payload_len: 0,
            };
            tmpl.push(Ipv6HdrRaw::from(&ip).as_bytes())?;
        }

        (_, src, dst) => {
            let addr = if src.is_ipv4() && dst.is_ipv4() {
                "IPv4"
            } else if !src.is_ipv4() && !dst.is_ipv4() {
                "IPv6"
            } else {
                "mixed"
            };
            return Err(TemplateError::AddrFamilyMismatch {
                flow_type: input.flow_type,
                addr,
            });
        }
    }

    if implied_proto == PROTO_TCP {
        let tcp = TcpMeta { src: input.src_port, dst: input.dst_port };
        tmpl.push(TcpHdrRaw::from(&tcp).as_bytes())?;
    } else {
        let udp = UdpMeta {
            src: input.src_port,
            dst: input.dst_port,
            len: UDP_HDR_SZ as u16,
        };
        tmpl.push(UdpHdrRaw::from(&udp).as_bytes())?;
    }

    Ok(tmpl)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::Ipv4Addr;
    use crate::api::Ipv6Addr;
    use zerocopy::FromBytes;

    fn input(flow_type: FlowType, src: IpAddr, dst: IpAddr) -> FdirInput {
        FdirInput {
            flow_type,
            src_ip: src,
            dst_ip: dst,
            src_port: 1234,
            dst_port: 80,
            proto: None,
            ttl: None,
            tos: 0,
            vlan_tci: None,
            from_vf: false,
        }
    }

    fn v4(last: u8) -> IpAddr {
        IpAddr::Ip4(Ipv4Addr::from_const([10, 0, 0, last]))
    }

    fn v6(last: u16) -> IpAddr {
        IpAddr::Ip6(Ipv6Addr::from_const([0xfd00, 0, 0, 0, 0, 0, 0, last]))
    }

    #[test]
    fn ipv4_tcp_bytes() {
        let tmpl =
            build_template(&input(FlowType::Ipv4Tcp, v4(1), v4(2))).unwrap();

        #[rustfmt::skip]
        let expected: [u8; 54] = [
            // Ethernet
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x08, 0x00,
            // IPv4
            0x45, 0x00, 0x00, 0x28, 0x00, 0x00, 0x00, 0x00,
            0x40, 0x06, 0x00, 0x00, 10, 0, 0, 1, 10, 0, 0, 2,
            // TCP
            0x04, 0xD2, 0x00, 0x50, 0, 0, 0, 0, 0, 0, 0, 0,
            0x50, 0, 0, 0, 0, 0, 0, 0,
        ];
        assert_eq!(tmpl.len(), 54);
        assert_eq!(tmpl.as_bytes(), &expected);
    }

    #[test]
    fn ipv4_udp_with_vlan() {
        let mut inp = input(FlowType::Ipv4Udp, v4(1), v4(2));
        inp.vlan_tci = Some(0x0064);
        inp.ttl = Some(9);
        inp.tos = 0x2E;
        let tmpl = build_template(&inp).unwrap();
        let bytes = tmpl.as_bytes();

        assert_eq!(tmpl.len(), 12 + 4 + 2 + 20 + 8);
        assert_eq!(&bytes[12..18], &[0x81, 0x00, 0x00, 0x64, 0x08, 0x00]);

        let (ip, rest) = Ipv4HdrRaw::ref_from_prefix(&bytes[18..]).unwrap();
        assert_eq!(ip.tos, 0x2E);
        assert_eq!(ip.ttl, 9);
        assert_eq!(ip.proto, PROTO_UDP);
        assert_eq!(u16::from_be_bytes(ip.total_len), 28);

        let (udp, rest) = UdpHdrRaw::ref_from_prefix(rest).unwrap();
        assert!(rest.is_empty());
        assert_eq!(u16::from_be_bytes(udp.length), 8);
        assert_eq!(u16::from_be_bytes(udp.src_port), 1234);
    }

    #[test]
    fn ipv6_lengths() {
        let tcp =
            build_template(&input(FlowType::Ipv6Tcp, v6(1), v6(2))).unwrap();
        assert_eq!(tcp.len(), 74);
        assert_eq!(&tcp.as_bytes()[12..14], &[0x86, 0xDD]);

        let mut inp = input(FlowType::Ipv6Udp, v6(1), v6(2));
        inp.vlan_tci = Some(7);
        let udp = build_template(&inp).unwrap();
        assert_eq!(udp.len(), 66);

        // Largest possible template.
        inp.flow_type = FlowType::Ipv6Tcp;
        let tcp = build_template(&inp).unwrap();
        assert_eq!(tcp.len(), 78);
        assert!(tcp.len() <= FDIR_MAX_PKT_LEN);
    }

    #[test]
    fn ipv6_fixed_fields() {
        let mut inp = input(FlowType::Ipv6Udp, v6(1), v6(2));
        inp.ttl = Some(200);
        let tmpl = build_template(&inp).unwrap();
        let (ip, _) =
            Ipv6HdrRaw::ref_from_prefix(&tmpl.as_bytes()[14..]).unwrap();
        assert_eq!(ip.vtc_flow, [0x60, 0, 0, 0]);
        assert_eq!(ip.payload_len, [0, 0]);
        assert_eq!(ip.next_hdr, PROTO_UDP);
        assert_eq!(ip.hop_limit, 0);
    }

    #[test]
    fn proto_override() {
        let mut inp = input(FlowType::Ipv4Udp, v4(1), v4(2));
        inp.proto = Some(PROTO_TCP);
        let tmpl = build_template(&inp).unwrap();
        // The override changes the IP protocol, not the L4 layout.
        assert_eq!(tmpl.as_bytes()[14 + 9], PROTO_TCP);
        assert_eq!(tmpl.len(), 42);
    }

    #[test]
    fn unsupported_flows() {
        for ft in [
            FlowType::Raw,
            FlowType::Ipv4Frag,
            FlowType::Ipv4Sctp,
            FlowType::Ipv4Other,
            FlowType::Ipv6Frag,
            FlowType::Ipv6Other,
            FlowType::L2Payload,
        ] {
            assert_eq!(
                build_template(&input(ft, v4(1), v4(2))),
                Err(TemplateError::UnsupportedFlow(ft))
            );
        }
    }

    #[test]
    fn family_mismatch() {
        let inp = input(FlowType::Ipv4Tcp, v6(1), v6(2));
        let err = build_template(&inp).unwrap_err();
        assert_eq!(
            err,
            TemplateError::AddrFamilyMismatch {
                flow_type: FlowType::Ipv4Tcp,
                addr: "IPv6"
            }
        );
        assert!(matches!(
            build_template(&input(FlowType::Ipv6Udp, v6(1), v4(2))),
            Err(TemplateError::AddrFamilyMismatch { addr: "mixed", .. })
        ));
    }

    #[test]
    fn equal_inputs_equal_templates() {
        let a = build_template(&input(FlowType::Ipv4Tcp, v4(1), v4(2)));
        let b = build_template(&input(FlowType::Ipv4Tcp, v4(1), v4(2)));
        let c = build_template(&input(FlowType::Ipv4Tcp, v4(1), v4(3)));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.unwrap().crc32(), b.unwrap().crc32());
    }
}
