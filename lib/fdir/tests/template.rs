// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Check that templates are well-formed packets by parsing them with
//! an independent network stack.

use fdir::engine::build_template;
use fdir_test_utils::*;
use smoltcp::wire::EthernetFrame;
use smoltcp::wire::EthernetProtocol;
use smoltcp::wire::IpProtocol;
use smoltcp::wire::Ipv4Packet;
use smoltcp::wire::Ipv6Packet;
use smoltcp::wire::TcpPacket;
use smoltcp::wire::UdpPacket;

const ETH_LEN: usize = 14;

#[test]
fn ipv4_tcp_parses() {
    let mut f = tcp4(2, 443, 0);
    f.input.tos = 0xb8;
    let tmpl = build_template(&f.input).unwrap();
    let bytes = tmpl.as_bytes();
    assert_eq!(bytes.len(), 54);

    let eth = EthernetFrame::new_checked(bytes).unwrap();
    assert_eq!(eth.ethertype(), EthernetProtocol::Ipv4);
    assert_eq!(eth.src_addr().as_bytes(), &[0; 6]);
    assert_eq!(eth.dst_addr().as_bytes(), &[0; 6]);

    let ip = Ipv4Packet::new_checked(eth.payload()).unwrap();
    assert_eq!(ip.version(), 4);
    assert_eq!(ip.header_len(), 20);
    assert_eq!(ip.total_len(), 40);
    assert_eq!(ip.hop_limit(), 64);
    assert_eq!(ip.dscp(), 46);
    assert_eq!(ip.next_header(), IpProtocol::Tcp);
    assert_eq!(ip.src_addr().as_bytes(), &[10, 0, 0, 1]);
    assert_eq!(ip.dst_addr().as_bytes(), &[10, 0, 0, 2]);

    let tcp = TcpPacket::new_checked(ip.payload()).unwrap();
    assert_eq!(tcp.src_port(), 4000);
    assert_eq!(tcp.dst_port(), 443);
    assert_eq!(tcp.header_len(), 20);
    assert_eq!(tcp.seq_number().0, 0);
    assert!(!tcp.syn());
}

#[test]
fn ipv4_udp_parses() {
    let mut f = udp4(7, 53, 0);
    f.input.ttl = Some(255);
    let tmpl = build_template(&f.input).unwrap();

    let eth = EthernetFrame::new_checked(tmpl.as_bytes()).unwrap();
    let ip = Ipv4Packet::new_checked(eth.payload()).unwrap();
    assert_eq!(ip.total_len(), 28);
    assert_eq!(ip.hop_limit(), 255);
    assert_eq!(ip.next_header(), IpProtocol::Udp);

    let udp = UdpPacket::new_checked(ip.payload()).unwrap();
    assert_eq!(udp.src_port(), 4000);
    assert_eq!(udp.dst_port(), 53);
    assert_eq!(udp.len(), 8);
}

#[test]
fn vlan_tag_precedes_ip() {
    let mut f = udp4(7, 53, 0);
    f.input.vlan_tci = Some(0x2064);
    let tmpl = build_template(&f.input).unwrap();
    let bytes = tmpl.as_bytes();
    assert_eq!(bytes.len(), 46);

    let eth = EthernetFrame::new_checked(bytes).unwrap();
    assert_eq!(eth.ethertype(), EthernetProtocol::Unknown(0x8100));
    assert_eq!(&eth.payload()[..4], &[0x20, 0x64, 0x08, 0x00]);

    let ip = Ipv4Packet::new_checked(&eth.payload()[4..]).unwrap();
    assert_eq!(ip.next_header(), IpProtocol::Udp);
}

#[test]
fn ipv6_header_fields() {
    let f = tcp6(9, 22, 0);
    let tmpl = build_template(&f.input).unwrap();
    let bytes = tmpl.as_bytes();
    assert_eq!(bytes.len(), 74);

    let eth = EthernetFrame::new_checked(bytes).unwrap();
    assert_eq!(eth.ethertype(), EthernetProtocol::Ipv6);

    let ip = Ipv6Packet::new_checked(eth.payload()).unwrap();
    assert_eq!(ip.version(), 6);
    assert_eq!(ip.traffic_class(), 0);
    assert_eq!(ip.flow_label(), 0);
    assert_eq!(ip.next_header(), IpProtocol::Tcp);
    // The payload length and hop limit are left at zero.
    assert_eq!(ip.payload_len(), 0);
    assert_eq!(ip.hop_limit(), 0);

    let mut dst = [0u8; 16];
    dst[0] = 0xfd;
    dst[15] = 9;
    assert_eq!(ip.dst_addr().as_bytes(), &dst);

    // The IPv6 payload length is zero, so find TCP by offset.
    let tcp = TcpPacket::new_checked(&bytes[ETH_LEN + 40..]).unwrap();
    assert_eq!(tcp.src_port(), 4000);
    assert_eq!(tcp.dst_port(), 22);
}

#[test]
fn ipv6_udp_with_proto_override() {
    let mut f = udp6(9, 4789, 0);
    f.input.proto = Some(PROTO_SCTP);
    let tmpl = build_template(&f.input).unwrap();
    assert_eq!(tmpl.len(), 62);

    let eth = EthernetFrame::new_checked(tmpl.as_bytes()).unwrap();
    let ip = Ipv6Packet::new_checked(eth.payload()).unwrap();
    assert_eq!(ip.next_header(), IpProtocol::Unknown(PROTO_SCTP));

    let udp = UdpPacket::new_checked(&tmpl.as_bytes()[ETH_LEN + 40..])
        .unwrap();
    assert_eq!(udp.dst_port(), 4789);
}
