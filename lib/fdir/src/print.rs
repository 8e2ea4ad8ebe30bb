// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Print filter state in a human-friendly manner.
//!
//! Shared by fdiradm and the integration tests.

use crate::api::DumpFdirResp;
use crate::api::FdirEntryDump;
use crate::api::TunnelDump;
use std::io::Write;
use std::string::String;
use tabwriter::TabWriter;

/// Print a [`DumpFdirResp`].
pub fn print_fdir(resp: &DumpFdirResp) -> std::io::Result<()> {
    print_fdir_into(&mut std::io::stdout(), resp)
}

/// Print a [`DumpFdirResp`].
pub fn print_fdir_into(
    writer: &mut impl Write,
    resp: &DumpFdirResp,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Device {} (mode {:?})", resp.name, resp.mode)?;
    write_hrb(&mut t)?;
    writeln!(t, "Filters ({}/{})", resp.count, resp.max)?;
    write_hr(&mut t)?;
    writeln!(t, "QUEUE\tLEN\tTEMPLATE")?;
    for entry in &resp.filters {
        print_fdir_entry(&mut t, entry)?;
    }
    t.flush()?;

    writeln!(t, "\nSearcher: {}", resp.arfs)?;

    writeln!(t, "\nTunnels")?;
    write_hr(&mut t)?;
    writeln!(t, "TUNNEL\tENABLED\tCLASS\tPORT\tFILTERS")?;
    for tunn in &resp.tunnels {
        print_tunnel(&mut t, tunn)?;
    }
    writeln!(t)?;
    t.flush()
}

fn print_fdir_entry(
    t: &mut impl Write,
    entry: &FdirEntryDump,
) -> std::io::Result<()> {
    writeln!(t, "{}\t{}\t{}", entry.rx_queue, entry.pkt_len, hex(&entry.pkt))
}

fn print_tunnel(t: &mut impl Write, tunn: &TunnelDump) -> std::io::Result<()> {
    let port = match tunn.udp_port {
        0 => String::from("-"),
        p => format!("{p}"),
    };
    writeln!(
        t,
        "{}\t{}\t{}\t{}\t{}",
        tunn.tunnel, tunn.enabled, tunn.clss, port, tunn.num_filters
    )
}

/// Render bytes as lowercase hex with no separators.
pub fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

/// Print horizontal rule in bold.
pub fn write_hrb(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:=<70}", "=")
}

/// Print a horizontal rule.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<70}", "-")
}
