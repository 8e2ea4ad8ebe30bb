// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod pcap;

pub use fdir::api::*;
pub use fdir::cfg::DeleteFailurePolicy;
pub use fdir::cfg::FdirCfg;
pub use fdir::engine::FdirDev;
pub use fdir::engine::FilterHw;
pub use fdir::engine::HwError;
pub use fdir::engine::hw::CompletionMode;
pub use fdir::engine::hw::TunnelMode;
pub use fdir::engine::hw::TunnelUpdate;
pub use fdir::engine::hw::UcastFilter;
pub use fdir::engine::hw::UcastOpcode;
pub use fdir::engine::tunnel::OffloadKind;
pub use fdir::provider::LogLevel;
pub use fdir::provider::LogProvider;
pub use fdir::provider::Providers;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

/// A request the engine made of the device.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HwCall {
    Ntuple { pkt: Vec<u8>, rx_queue: u16, add: bool },
    Arfs(ArfsConfig),
    Tunnel(TunnelUpdate),
    Ucast(UcastFilter),
    MacVlan(UcastFilter),
    AnyVlan(bool),
}

/// The kinds of device request, used to inject failures.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum HwOp {
    NtupleAdd,
    NtupleDel,
    Arfs,
    Tunnel,
    Ucast,
    MacVlan,
    AnyVlan,
}

/// A device that records every request and fails the ones it is told
/// to fail.
#[derive(Debug, Default)]
pub struct MockHw {
    calls: Vec<HwCall>,
    // Calls of the op still allowed to pass, and the failure rc.
    fail: BTreeMap<HwOp, (usize, i32)>,
}

impl MockHw {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent `op` with `rc`.
    pub fn fail(&mut self, op: HwOp, rc: i32) {
        self.fail.insert(op, (0, rc));
    }

    /// Let the next `pass` requests of `op` succeed, then fail every
    /// one after them with `rc`.
    pub fn fail_after(&mut self, op: HwOp, pass: usize, rc: i32) {
        self.fail.insert(op, (pass, rc));
    }

    pub fn unfail(&mut self, op: HwOp) {
        self.fail.remove(&op);
    }

    pub fn calls(&self) -> &[HwCall] {
        &self.calls
    }

    /// Return the recorded calls, clearing the record.
    pub fn take_calls(&mut self) -> Vec<HwCall> {
        std::mem::take(&mut self.calls)
    }

    /// The templates added minus the templates removed, in order.
    pub fn installed(&self) -> Vec<Vec<u8>> {
        let mut out: Vec<Vec<u8>> = vec![];
        for call in &self.calls {
            if let HwCall::Ntuple { pkt, add, .. } = call {
                if *add {
                    out.push(pkt.clone());
                } else if let Some(i) = out.iter().position(|p| p == pkt) {
                    out.remove(i);
                }
            }
        }
        out
    }

    fn record(&mut self, op: HwOp, call: HwCall) -> Result<(), HwError> {
        self.calls.push(call);
        match self.fail.get_mut(&op) {
            Some((pass, _)) if *pass > 0 => {
                *pass -= 1;
                Ok(())
            }
            Some((_, rc)) => Err(HwError { rc: *rc }),
            None => Ok(()),
        }
    }
}

impl FilterHw for MockHw {
    fn configure_ntuple_filter(
        &mut self,
        pkt: &[u8],
        rx_queue: u16,
        add: bool,
        _mode: CompletionMode,
    ) -> Result<(), HwError> {
        let op = if add { HwOp::NtupleAdd } else { HwOp::NtupleDel };
        self.record(op, HwCall::Ntuple { pkt: pkt.to_vec(), rx_queue, add })
    }

    fn arfs_mode_configure(&mut self, cfg: &ArfsConfig) -> Result<(), HwError> {
        self.record(HwOp::Arfs, HwCall::Arfs(*cfg))
    }

    fn tunnel_update(&mut self, update: &TunnelUpdate) -> Result<(), HwError> {
        self.record(HwOp::Tunnel, HwCall::Tunnel(*update))
    }

    fn ucast_filter(&mut self, filter: &UcastFilter) -> Result<(), HwError> {
        self.record(HwOp::Ucast, HwCall::Ucast(*filter))
    }

    fn mac_vlan_filter(
        &mut self,
        filter: &UcastFilter,
    ) -> Result<(), HwError> {
        self.record(HwOp::MacVlan, HwCall::MacVlan(*filter))
    }

    fn accept_any_vlan(&mut self, enable: bool) -> Result<(), HwError> {
        self.record(HwOp::AnyVlan, HwCall::AnyVlan(enable))
    }
}

/// A log provider that keeps every message.
#[derive(Clone, Default)]
pub struct VecLog {
    msgs: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl VecLog {
    pub fn msgs(&self) -> Vec<(LogLevel, String)> {
        self.msgs.lock().unwrap().clone()
    }

    /// Does any message at `level` contain `needle`?
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.msgs
            .lock()
            .unwrap()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl LogProvider for VecLog {
    fn log(&self, level: LogLevel, msg: &str) {
        self.msgs.lock().unwrap().push((level, msg.to_string()));
    }
}

pub fn ip4(bytes: [u8; 4]) -> IpAddr {
    IpAddr::Ip4(Ipv4Addr::from_const(bytes))
}

pub fn ip6(segs: [u16; 8]) -> IpAddr {
    IpAddr::Ip6(Ipv6Addr::from_const(segs))
}

pub fn input(
    flow_type: FlowType,
    src_ip: IpAddr,
    dst_ip: IpAddr,
    src_port: u16,
    dst_port: u16,
) -> FdirInput {
    FdirInput {
        flow_type,
        src_ip,
        dst_ip,
        src_port,
        dst_port,
        proto: None,
        ttl: None,
        tos: 0,
        vlan_tci: None,
        from_vf: false,
    }
}

pub fn filter(input: FdirInput, rx_queue: u16) -> FdirFilter {
    FdirFilter { input, action: FdirAction { rx_queue } }
}

pub fn tcp4(dst_last: u8, dst_port: u16, rx_queue: u16) -> FdirFilter {
    filter(
        input(
            FlowType::Ipv4Tcp,
            ip4([10, 0, 0, 1]),
            ip4([10, 0, 0, dst_last]),
            4000,
            dst_port,
        ),
        rx_queue,
    )
}

pub fn udp4(dst_last: u8, dst_port: u16, rx_queue: u16) -> FdirFilter {
    filter(
        input(
            FlowType::Ipv4Udp,
            ip4([10, 0, 0, 1]),
            ip4([10, 0, 0, dst_last]),
            4000,
            dst_port,
        ),
        rx_queue,
    )
}

pub fn tcp6(dst_last: u16, dst_port: u16, rx_queue: u16) -> FdirFilter {
    filter(
        input(
            FlowType::Ipv6Tcp,
            ip6([0xfd00, 0, 0, 0, 0, 0, 0, 1]),
            ip6([0xfd00, 0, 0, 0, 0, 0, 0, dst_last]),
            4000,
            dst_port,
        ),
        rx_queue,
    )
}

pub fn udp6(dst_last: u16, dst_port: u16, rx_queue: u16) -> FdirFilter {
    filter(
        input(
            FlowType::Ipv6Udp,
            ip6([0xfd00, 0, 0, 0, 0, 0, 0, 1]),
            ip6([0xfd00, 0, 0, 0, 0, 0, 0, dst_last]),
            4000,
            dst_port,
        ),
        rx_queue,
    )
}

pub const OUTER_MAC: MacAddr = MacAddr::from_const([2, 8, 32, 0, 0, 1]);
pub const INNER_MAC: MacAddr = MacAddr::from_const([2, 8, 32, 0, 0, 2]);

pub fn tunnel_conf(
    tunnel_type: TunnelType,
    filter_type: TunnelFilterFlags,
) -> TunnelFilterConf {
    TunnelFilterConf {
        outer_mac: OUTER_MAC,
        inner_mac: INNER_MAC,
        inner_vlan: 100,
        ip_addr: None,
        filter_type,
        tunnel_type,
        tenant_id: 7777,
        queue_id: 0,
    }
}

pub fn vxlan_conf(filter_type: TunnelFilterFlags) -> TunnelFilterConf {
    tunnel_conf(TunnelType::Vxlan, filter_type)
}

pub fn test_cfg(rx_queues: u16) -> FdirCfg {
    FdirCfg {
        name: "fdirtest0".to_string(),
        rx_queues,
        ..Default::default()
    }
}

/// Create a device over a [`MockHw`], returning a handle to its log
/// as well.
pub fn dev(cfg: FdirCfg) -> (FdirDev<MockHw>, VecLog) {
    let log = VecLog::default();
    let dev = FdirDev::new(
        cfg,
        MockHw::new(),
        Providers { log: Box::new(log.clone()) },
    );
    (dev, log)
}

/// Assert that the device calls recorded so far match the given
/// patterns, in order, and that there are no others.
#[macro_export]
macro_rules! expect_calls {
    ($hw:expr, [$($pat:pat),* $(,)?]) => {{
        let calls = $hw.calls();
        let mut it = calls.iter();
        $(
            let next = it.next();
            assert!(
                matches!(next, Some($pat)),
                "expected {}, got {:?}\nall calls: {:#?}",
                stringify!($pat),
                next,
                calls,
            );
        )*
        let rest: Vec<_> = it.collect();
        assert!(rest.is_empty(), "unexpected calls: {rest:#?}");
    }};
}
