// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Write packet templates as a legacy pcap capture.

use pcap_parser::Linktype;
use pcap_parser::ToVec;
use pcap_parser::pcap::LegacyPcapBlock;
use pcap_parser::pcap::PcapHeader;
use std::io;
use std::io::Write;

/// The largest packet a capture records whole.
pub const SNAPLEN: u32 = 1500;

fn gen_err(e: impl core::fmt::Debug) -> io::Error {
    io::Error::other(format!("pcap serialization failed: {e:?}"))
}

/// A capture being written to `W`, one Ethernet frame per block.
pub struct PcapWriter<W: Write> {
    out: W,
}

impl<W: Write> PcapWriter<W> {
    /// Write the capture header and return a writer for the packets.
    pub fn new(mut out: W) -> io::Result<Self> {
        let mut hdr = PcapHeader {
            magic_number: 0xa1b2c3d4,
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen: SNAPLEN,
            network: Linktype::ETHERNET,
        };
        out.write_all(&hdr.to_vec().map_err(gen_err)?)?;
        Ok(Self { out })
    }

    pub fn add_pkt(&mut self, pkt: &[u8]) -> io::Result<()> {
        let len = u32::try_from(pkt.len()).map_err(gen_err)?;
        let mut block = LegacyPcapBlock {
            ts_sec: 0,
            ts_usec: 0,
            caplen: len,
            origlen: len,
            data: pkt,
        };
        self.out.write_all(&block.to_vec().map_err(gen_err)?)
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
