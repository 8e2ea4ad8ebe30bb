// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Flow director administration library.
//!
//! `fdiradm` drives the filter engine against [`SimHw`], a device
//! that logs what it is asked to do. Filter requests come from the
//! command line or from RON scripts, device configuration from TOML.

use clap::Args;
use fdir::api::FdirAction;
use fdir::api::FdirError;
use fdir::api::FdirFilter;
use fdir::api::FdirInput;
use fdir::api::FilterOp;
use fdir::api::FilterReq;
use fdir::api::FlowType;
use fdir::api::MacAddr;
use fdir::api::NtupleFilter;
use fdir::api::TunnelFilterConf;
use fdir::api::TunnelFilterFlags;
use fdir::api::TunnelType;
use fdir::api::UdpTunnel;
use fdir::cfg::FdirCfg;
use fdir::engine::FdirDev;
use fdir::engine::FilterHw;
use fdir::engine::HwError;
use fdir::engine::hw::CompletionMode;
use fdir::engine::hw::TunnelUpdate;
use fdir::engine::hw::UcastFilter;
use fdir::engine::tunnel::TunnelClassification;
use fdir::engine::tunnel::tunnel_classification;
use fdir::provider::LogLevel;
use fdir::provider::LogProvider;
use fdir::provider::Providers;
use serde::Deserialize;
use slog::Drain;
use slog::Logger;
use slog::o;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("bad config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("bad script: {0}")]
    Script(#[from] ron::error::SpannedError),

    #[error("bad MAC address {0:?}: {1}")]
    BadMac(String, String),

    #[error("unknown tunnel filter bits in {0:#x}")]
    BadFilterType(u16),
}

/// Build the root logger. The level is taken from `RUST_LOG`; only
/// errors are shown when it is unset.
pub fn logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!())
}

/// Route engine messages into slog.
pub struct SlogLog {
    log: Logger,
}

impl SlogLog {
    pub fn new(log: &Logger) -> Self {
        Self { log: log.new(o!("component" => "engine")) }
    }
}

impl LogProvider for SlogLog {
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Note => slog::info!(self.log, "{}", msg),
            LogLevel::Warn => slog::warn!(self.log, "{}", msg),
            LogLevel::Error => slog::error!(self.log, "{}", msg),
        }
    }
}

/// The device requests [`SimHw`] can be told to fail.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd,
)]
#[serde(rename_all = "kebab-case")]
pub enum SimOp {
    Ntuple,
    Arfs,
    Tunnel,
    Ucast,
    MacVlan,
    AnyVlan,
}

/// A simulated device: every request is logged and succeeds unless
/// a failure was injected for it.
pub struct SimHw {
    log: Logger,
    fail: BTreeMap<SimOp, i32>,
    requests: u64,
}

impl SimHw {
    pub fn new(log: &Logger) -> Self {
        Self {
            log: log.new(o!("component" => "hw")),
            fail: BTreeMap::new(),
            requests: 0,
        }
    }

    pub fn fail(&mut self, op: SimOp, rc: i32) {
        self.fail.insert(op, rc);
    }

    pub fn clear_failures(&mut self) {
        self.fail.clear();
    }

    /// The number of requests seen, failed ones included.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    fn complete(&mut self, op: SimOp) -> Result<(), HwError> {
        self.requests += 1;
        match self.fail.get(&op) {
            Some(&rc) => {
                slog::debug!(self.log, "injected failure";
                    "op" => ?op, "rc" => rc);
                Err(HwError { rc })
            }
            None => Ok(()),
        }
    }
}

impl FilterHw for SimHw {
    fn configure_ntuple_filter(
        &mut self,
        pkt: &[u8],
        rx_queue: u16,
        add: bool,
        mode: CompletionMode,
    ) -> Result<(), HwError> {
        slog::debug!(self.log, "ntuple filter";
            "add" => add,
            "rx_queue" => rx_queue,
            "len" => pkt.len(),
            "mode" => ?mode
        );
        self.complete(SimOp::Ntuple)
    }

    fn arfs_mode_configure(
        &mut self,
        cfg: &fdir::api::ArfsConfig,
    ) -> Result<(), HwError> {
        slog::debug!(self.log, "searcher"; "cfg" => %cfg);
        self.complete(SimOp::Arfs)
    }

    fn tunnel_update(&mut self, update: &TunnelUpdate) -> Result<(), HwError> {
        slog::debug!(self.log, "tunnel update";
            "tunnel" => %update.tunnel,
            "mode" => ?update.mode,
            "port" => ?update.port
        );
        self.complete(SimOp::Tunnel)
    }

    fn ucast_filter(&mut self, filter: &UcastFilter) -> Result<(), HwError> {
        slog::debug!(self.log, "ucast filter"; "filter" => ?filter);
        self.complete(SimOp::Ucast)
    }

    fn mac_vlan_filter(
        &mut self,
        filter: &UcastFilter,
    ) -> Result<(), HwError> {
        slog::debug!(self.log, "mac/vlan filter"; "filter" => ?filter);
        self.complete(SimOp::MacVlan)
    }

    fn accept_any_vlan(&mut self, enable: bool) -> Result<(), HwError> {
        slog::debug!(self.log, "accept any vlan"; "enable" => enable);
        self.complete(SimOp::AnyVlan)
    }
}

/// A flow director filter as given on the command line or in a
/// script.
#[derive(Args, Clone, Debug, Deserialize)]
pub struct FlowSpec {
    /// The flow type, e.g. ipv4-tcp.
    #[arg(long = "type")]
    #[serde(rename = "type")]
    pub flow_type: FlowType,

    #[arg(long)]
    pub src: IpAddr,

    #[arg(long)]
    pub dst: IpAddr,

    #[arg(long, default_value_t = 0)]
    #[serde(default)]
    pub sport: u16,

    #[arg(long, default_value_t = 0)]
    #[serde(default)]
    pub dport: u16,

    /// Override the IP protocol implied by the flow type.
    #[arg(long)]
    #[serde(default)]
    pub proto: Option<u8>,

    #[arg(long)]
    #[serde(default)]
    pub ttl: Option<u8>,

    #[arg(long, default_value_t = 0)]
    #[serde(default)]
    pub tos: u8,

    /// The VLAN TCI, when the flow is tagged.
    #[arg(long)]
    #[serde(default)]
    pub vlan: Option<u16>,

    #[arg(long, default_value_t = 0)]
    #[serde(default)]
    pub queue: u16,
}

impl From<&FlowSpec> for FdirFilter {
    fn from(spec: &FlowSpec) -> Self {
        FdirFilter {
            input: FdirInput {
                flow_type: spec.flow_type,
                src_ip: spec.src.into(),
                dst_ip: spec.dst.into(),
                src_port: spec.sport,
                dst_port: spec.dport,
                proto: spec.proto,
                ttl: spec.ttl,
                tos: spec.tos,
                vlan_tci: spec.vlan,
                from_vf: false,
            },
            action: FdirAction { rx_queue: spec.queue },
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NtupleSpec {
    pub proto: u8,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    #[serde(default)]
    pub sport: u16,
    #[serde(default)]
    pub dport: u16,
    #[serde(default)]
    pub queue: u16,
}

impl From<&NtupleSpec> for NtupleFilter {
    fn from(spec: &NtupleSpec) -> Self {
        NtupleFilter {
            proto: spec.proto,
            src_ip: spec.src.into(),
            dst_ip: spec.dst.into(),
            src_port: spec.sport,
            dst_port: spec.dport,
            queue: spec.queue,
        }
    }
}

fn zero_mac() -> String {
    String::from("00:00:00:00:00:00")
}

#[derive(Clone, Debug, Deserialize)]
pub struct TunnelSpec {
    pub tunnel: TunnelType,
    /// The tunnel filter type bits.
    pub filter_type: u16,
    #[serde(default = "zero_mac")]
    pub outer_mac: String,
    #[serde(default = "zero_mac")]
    pub inner_mac: String,
    #[serde(default)]
    pub inner_vlan: u16,
    #[serde(default)]
    pub vni: u32,
    #[serde(default)]
    pub queue: u16,
}

fn parse_mac(s: &str) -> Result<MacAddr, Error> {
    s.parse().map_err(|e| Error::BadMac(s.to_string(), e))
}

impl TryFrom<&TunnelSpec> for TunnelFilterConf {
    type Error = Error;

    fn try_from(spec: &TunnelSpec) -> Result<Self, Self::Error> {
        let filter_type = TunnelFilterFlags::from_bits(spec.filter_type)
            .ok_or(Error::BadFilterType(spec.filter_type))?;

        Ok(TunnelFilterConf {
            outer_mac: parse_mac(&spec.outer_mac)?,
            inner_mac: parse_mac(&spec.inner_mac)?,
            inner_vlan: spec.inner_vlan,
            ip_addr: None,
            filter_type,
            tunnel_type: spec.tunnel,
            tenant_id: spec.vni,
            queue_id: spec.queue,
        })
    }
}

/// One step of a replay script.
#[derive(Clone, Debug, Deserialize)]
pub enum Step {
    AddFdir(FlowSpec),
    DelFdir(FlowSpec),
    AddNtuple(NtupleSpec),
    DelNtuple(NtupleSpec),
    AddTunnel(TunnelSpec),
    DelTunnel(TunnelSpec),
    BindPort { tunnel: TunnelType, port: u16 },
    UnbindPort { tunnel: TunnelType, port: u16 },
    /// Fail every subsequent device request of this kind.
    Fail { op: SimOp, rc: i32 },
    ClearFailures,
    /// Drop all filter records, as on device teardown.
    Release,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

/// The outcome of one script step.
#[derive(Clone, Debug)]
pub struct StepResult {
    pub step: usize,
    pub desc: String,
    pub result: Result<(), FdirError>,
}

fn read(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path)
        .map_err(|source| Error::Read { path: path.to_path_buf(), source })
}

/// Load a device configuration from a TOML file.
pub fn load_cfg(path: &Path) -> Result<FdirCfg, Error> {
    Ok(toml::from_str(&read(path)?)?)
}

pub fn load_script(path: &Path) -> Result<Script, Error> {
    parse_script(&read(path)?)
}

pub fn parse_script(s: &str) -> Result<Script, Error> {
    Ok(ron::from_str(s)?)
}

/// Classify a raw tunnel filter type mask. Masks carrying bits that
/// name no filter field are not classifiable.
pub fn classify_mask(bits: u16) -> Option<TunnelClassification> {
    TunnelFilterFlags::from_bits(bits).and_then(tunnel_classification)
}

pub fn sim_dev(cfg: FdirCfg, log: &Logger) -> FdirDev<SimHw> {
    let providers = Providers { log: Box::new(SlogLog::new(log)) };
    FdirDev::new(cfg, SimHw::new(log), providers)
}

/// Run `script` against `dev`. A failed step is recorded and the
/// script carries on.
pub fn replay(
    dev: &mut FdirDev<SimHw>,
    script: &Script,
) -> Result<Vec<StepResult>, Error> {
    let mut results = vec![];

    for (i, step) in script.steps.iter().enumerate() {
        let result = match step {
            Step::AddFdir(spec) => dev.filter_ctrl(&FilterReq::Fdir(
                FilterOp::Add,
                FdirFilter::from(spec),
            )),
            Step::DelFdir(spec) => dev.filter_ctrl(&FilterReq::Fdir(
                FilterOp::Delete,
                FdirFilter::from(spec),
            )),
            Step::AddNtuple(spec) => dev.filter_ctrl(&FilterReq::Ntuple(
                FilterOp::Add,
                NtupleFilter::from(spec),
            )),
            Step::DelNtuple(spec) => dev.filter_ctrl(&FilterReq::Ntuple(
                FilterOp::Delete,
                NtupleFilter::from(spec),
            )),
            Step::AddTunnel(spec) => dev.filter_ctrl(&FilterReq::Tunnel(
                FilterOp::Add,
                TunnelFilterConf::try_from(spec)?,
            )),
            Step::DelTunnel(spec) => dev.filter_ctrl(&FilterReq::Tunnel(
                FilterOp::Delete,
                TunnelFilterConf::try_from(spec)?,
            )),
            Step::BindPort { tunnel, port } => dev.udp_dst_port_add(
                &UdpTunnel { udp_port: *port, prot_type: *tunnel },
            ),
            Step::UnbindPort { tunnel, port } => dev.udp_dst_port_del(
                &UdpTunnel { udp_port: *port, prot_type: *tunnel },
            ),
            Step::Release => {
                dev.release_filters();
                Ok(())
            }
            Step::Fail { op, rc } => {
                dev.hw_mut().fail(*op, *rc);
                Ok(())
            }
            Step::ClearFailures => {
                dev.hw_mut().clear_failures();
                Ok(())
            }
        };

        results.push(StepResult {
            step: i,
            desc: describe(step),
            result,
        });
    }

    Ok(results)
}

fn describe(step: &Step) -> String {
    match step {
        Step::AddFdir(s) => {
            format!("add {} {} -> {}", s.flow_type, s.src, s.dst)
        }
        Step::DelFdir(s) => {
            format!("del {} {} -> {}", s.flow_type, s.src, s.dst)
        }
        Step::AddNtuple(s) => format!("add ntuple {} -> {}", s.src, s.dst),
        Step::DelNtuple(s) => format!("del ntuple {} -> {}", s.src, s.dst),
        Step::AddTunnel(s) => {
            format!("add {} filter {:#x}", s.tunnel, s.filter_type)
        }
        Step::DelTunnel(s) => {
            format!("del {} filter {:#x}", s.tunnel, s.filter_type)
        }
        Step::BindPort { tunnel, port } => format!("bind {tunnel} {port}"),
        Step::UnbindPort { tunnel, port } => {
            format!("unbind {tunnel} {port}")
        }
        Step::Fail { op, rc } => format!("fail {op:?} rc {rc}"),
        Step::ClearFailures => String::from("clear failures"),
        Step::Release => String::from("release"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use fdir::cfg::DeleteFailurePolicy;

    #[test]
    fn unknown_mask_bits_unsupported() {
        let omac = TunnelFilterFlags::OMAC.bits();
        assert_eq!(classify_mask(omac).map(|c| c.name), Some("outer-mac"));
        assert!(classify_mask(0x40 | omac).is_none());
        assert!(classify_mask(0x8000).is_none());
    }

    fn discard() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    const SCRIPT: &str = r#"
(
    steps: [
        AddFdir((type: Ipv4Tcp, src: "10.0.0.1", dst: "10.0.0.2",
                 sport: 4000, dport: 80, queue: 1)),
        AddFdir((type: Ipv6Udp, src: "fd00::1", dst: "fd00::2",
                 dport: 53, vlan: Some(100))),
        AddNtuple((proto: 17, src: "10.0.0.1", dst: "10.0.0.3",
                   dport: 53)),
        AddTunnel((tunnel: Vxlan, filter_type: 4, vni: 7777)),
        AddTunnel((tunnel: Vxlan, filter_type: 1,
                   outer_mac: "02:08:20:00:00:01")),
        BindPort(tunnel: Geneve, port: 6082),
        Fail(op: ntuple, rc: -5),
        AddFdir((type: Ipv4Udp, src: "10.0.0.1", dst: "10.0.0.9")),
        ClearFailures,
        DelFdir((type: Ipv4Tcp, src: "10.0.0.1", dst: "10.0.0.2",
                 sport: 4000, dport: 80)),
        DelTunnel((tunnel: Nvgre, filter_type: 1)),
    ],
)
"#;

    #[test]
    fn replay_script() {
        let log = discard();
        let cfg = FdirCfg { rx_queues: 2, ..Default::default() };
        let mut dev = sim_dev(cfg, &log);
        let script = parse_script(SCRIPT).unwrap();
        let results = replay(&mut dev, &script).unwrap();

        assert_eq!(results.len(), 11);
        let failed: Vec<_> = results
            .iter()
            .filter(|r| r.result.is_err())
            .map(|r| r.step)
            .collect();
        assert_eq!(failed, vec![7, 10]);
        assert_eq!(
            results[7].result,
            Err(FdirError::Hardware { rc: -5 })
        );
        assert_eq!(
            results[10].result,
            Err(FdirError::InvalidTunnelType(TunnelType::Nvgre))
        );

        let dump = dev.dump();
        assert_eq!(dump.count, 2);
        let vxlan = &dump.tunnels[0];
        assert!(vxlan.enabled);
        assert_eq!(vxlan.num_filters, 2);
        let geneve = &dump.tunnels[1];
        assert!(geneve.enabled);
        assert_eq!(geneve.udp_port, 6082);
        assert!(dev.hw().requests() > 0);
    }

    #[test]
    fn bad_tunnel_spec() {
        let mut dev = sim_dev(FdirCfg::default(), &discard());
        let script = parse_script(
            r#"(steps: [AddTunnel((tunnel: Vxlan, filter_type: 1,
                                  outer_mac: "nope"))])"#,
        )
        .unwrap();
        assert!(matches!(
            replay(&mut dev, &script),
            Err(Error::BadMac(_, _))
        ));

        let script = parse_script(
            r#"(steps: [AddTunnel((tunnel: Vxlan, filter_type: 64))])"#,
        )
        .unwrap();
        assert!(matches!(
            replay(&mut dev, &script),
            Err(Error::BadFilterType(64))
        ));
    }

    #[test]
    fn cfg_from_toml() {
        let cfg: FdirCfg = toml::from_str(
            r#"
            name = "bnxt0"
            rx_queues = 8
            delete_policy = "retain"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.name, "bnxt0");
        assert_eq!(cfg.rx_queues, 8);
        assert_eq!(cfg.max_filters, 256);
        assert_eq!(cfg.delete_policy, DeleteFailurePolicy::Retain);
    }

    #[test]
    fn flow_spec_conversion() {
        let spec: FlowSpec = ron::from_str(
            r#"(type: Ipv4Tcp, src: "10.0.0.1", dst: "10.0.0.2",
                ttl: Some(9))"#,
        )
        .unwrap();
        let f = FdirFilter::from(&spec);
        assert_eq!(f.input.flow_type, FlowType::Ipv4Tcp);
        assert_eq!(f.input.src_ip, "10.0.0.1".parse().unwrap());
        assert_eq!(f.input.ttl, Some(9));
        assert_eq!(f.action.rx_queue, 0);
    }
}
