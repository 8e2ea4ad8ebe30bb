// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Routines for building and reading packet capture files.

use fdir::pcap::PcapWriter;
use pcap_parser::Linktype;
use pcap_parser::pcap;
use pcap_parser::pcap::LegacyPcapBlock;
use pcap_parser::pcap::PcapHeader;
use std::fs::File;
use std::path::Path;

fn get_header(offset: &[u8]) -> (&[u8], PcapHeader) {
    match pcap::parse_pcap_header(offset) {
        Ok((new_offset, header)) => (new_offset, header),
        Err(e) => panic!("failed to get header: {e:?}"),
    }
}

fn next_block(offset: &[u8]) -> (&[u8], LegacyPcapBlock<'_>) {
    match pcap::parse_pcap_frame(offset) {
        Ok((new_offset, block)) => {
            // Templates are always captured whole.
            assert_eq!(block.origlen, block.caplen);
            (new_offset, block)
        }

        Err(e) => panic!("failed to get next block: {e:?}"),
    }
}

/// Build a packet capture file from a series of packet templates.
pub struct PcapBuilder {
    writer: PcapWriter<File>,
}

impl PcapBuilder {
    /// Create a new pcap builder, writing all captures to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let file = File::create(path).unwrap();
        Self { writer: PcapWriter::new(file).unwrap() }
    }

    /// Add a packet to the capture.
    pub fn add_pkt(&mut self, pkt: &[u8]) {
        self.writer.add_pkt(pkt).unwrap();
    }
}

/// Read every packet out of the capture file at `path`.
pub fn read_pcap(path: impl AsRef<Path>) -> Vec<Vec<u8>> {
    let bytes = std::fs::read(path).unwrap();
    let (mut offset, hdr) = get_header(&bytes);
    assert_eq!(hdr.network, Linktype::ETHERNET);

    let mut pkts = vec![];
    while !offset.is_empty() {
        let (rest, block) = next_block(offset);
        pkts.push(block.data.to_vec());
        offset = rest;
    }
    pkts
}
