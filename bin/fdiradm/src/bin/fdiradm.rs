// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tabwriter::TabWriter;

use fdir::api::FdirFilter;
use fdir::api::TunnelFilterFlags;
use fdir::cfg::FdirCfg;
use fdir::engine::build_template;
use fdir::pcap::PcapWriter;
use fdir::print::print_fdir;
use fdir::print::write_hr;
use fdiradm::FlowSpec;
use fdiradm::classify_mask;

/// Build, install and inspect flow director filters against a
/// simulated device. Set RUST_LOG=debug to see every device request.
#[derive(Debug, Parser)]
#[command(version)]
enum Command {
    /// Build the packet template for a filter and dump it.
    Template {
        #[command(flatten)]
        flow: FlowSpec,

        /// Also write the template to this pcap file.
        #[arg(long)]
        pcap: Option<PathBuf>,
    },

    /// Apply a RON script of filter requests to a simulated device
    /// and print the resulting filter table.
    Replay {
        script: PathBuf,

        /// The device configuration, in TOML.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the table as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show how the device classifies a tunnel filter type. Without a
    /// mask, list every classifiable type.
    Classify {
        /// The filter type bits, in decimal or 0x-prefixed hex.
        mask: Option<String>,
    },
}

fn parse_mask(s: &str) -> anyhow::Result<u16> {
    let mask = match s.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    mask.with_context(|| format!("bad filter type mask {s:?}"))
}

fn write_pcap(path: &PathBuf, pkt: &[u8]) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut pcap = PcapWriter::new(file)?;
    pcap.add_pkt(pkt)?;
    pcap.into_inner()?;
    Ok(())
}

fn print_template(
    flow: &FlowSpec,
    pcap: Option<PathBuf>,
) -> anyhow::Result<()> {
    let filter = FdirFilter::from(flow);
    let tmpl = build_template(&filter.input)
        .with_context(|| format!("cannot build {} template", flow.flow_type))?;

    println!(
        "{} template: {} bytes, crc32 {:08x}",
        flow.flow_type,
        tmpl.len(),
        tmpl.crc32()
    );
    for (i, row) in tmpl.as_bytes().chunks(16).enumerate() {
        let hex: Vec<_> = row.iter().map(|b| format!("{b:02x}")).collect();
        println!("{:04x}  {}", i * 16, hex.join(" "));
    }

    if let Some(path) = pcap {
        write_pcap(&path, tmpl.as_bytes())?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn replay(
    script: PathBuf,
    config: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let log = fdiradm::logger();
    let cfg = match config {
        Some(path) => fdiradm::load_cfg(&path)?,
        None => FdirCfg::default(),
    };
    let script = fdiradm::load_script(&script)?;

    let mode = cfg.fdir_mode;
    let mut dev = fdiradm::sim_dev(cfg, &log);
    dev.check_fdir_support(mode)
        .with_context(|| format!("device {} rejected mode", dev.name()))?;

    let results = fdiradm::replay(&mut dev, &script)?;
    let dump = dev.dump();

    if json {
        println!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }

    let mut t = TabWriter::new(std::io::stdout());
    writeln!(t, "STEP\tREQUEST\tRESULT")?;
    write_hr(&mut t)?;
    for r in &results {
        let res = match &r.result {
            Ok(()) => String::from("ok"),
            Err(e) => format!("{e} (errno {})", e.to_errno()),
        };
        writeln!(t, "{}\t{}\t{res}", r.step, r.desc)?;
    }
    writeln!(t)?;
    t.flush()?;

    print_fdir(&dump)?;
    Ok(())
}

fn classify(mask: Option<String>) -> anyhow::Result<()> {
    let masks: Vec<u16> = match mask {
        Some(s) => vec![parse_mask(&s)?],
        None => (0..(1 << 6)).collect(),
    };
    let listing = masks.len() > 1;

    let mut t = TabWriter::new(std::io::stdout());
    writeln!(t, "MASK\tFLAGS\tUCAST TYPE\tCLASS\tNAME")?;
    for bits in masks {
        let flags = match TunnelFilterFlags::from_bits(bits) {
            Some(flags) => format!("{flags:?}"),
            None => String::from("-"),
        };
        match classify_mask(bits) {
            Some(c) => writeln!(
                t,
                "{bits:#04x}\t{flags}\t{}\t{}\t{}",
                c.ucast_type, c.clss, c.name
            )?,
            None if !listing => {
                writeln!(t, "{bits:#04x}\t{flags}\t-\t-\tunsupported")?
            }
            None => {}
        }
    }
    t.flush()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cmd = Command::parse();
    match cmd {
        Command::Template { flow, pcap } => print_template(&flow, pcap),
        Command::Replay { script, config, json } => {
            replay(script, config, json)
        }
        Command::Classify { mask } => classify(mask),
    }
}
