// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Shared routines for the filter benchmarks.

use fdir::api::FdirAction;
use fdir::api::FdirFilter;
use fdir::api::FdirInput;
use fdir::api::FlowType;
use fdir::api::IpAddr;
use fdir::api::Ipv4Addr;
use fdir::api::Ipv6Addr;
use fdir::cfg::FdirCfg;
use fdir::engine::FdirDev;
use fdir::engine::FilterHw;
use fdir::engine::HwError;
use fdir::engine::hw::CompletionMode;
use fdir::engine::hw::TunnelUpdate;
use fdir::engine::hw::UcastFilter;
use fdir::provider::NullLog;
use fdir::provider::Providers;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// A device that accepts every request.
pub struct NullHw;

impl FilterHw for NullHw {
    fn configure_ntuple_filter(
        &mut self,
        _pkt: &[u8],
        _rx_queue: u16,
        _add: bool,
        _mode: CompletionMode,
    ) -> Result<(), HwError> {
        Ok(())
    }

    fn arfs_mode_configure(
        &mut self,
        _cfg: &fdir::api::ArfsConfig,
    ) -> Result<(), HwError> {
        Ok(())
    }

    fn tunnel_update(&mut self, _update: &TunnelUpdate) -> Result<(), HwError> {
        Ok(())
    }

    fn ucast_filter(&mut self, _filter: &UcastFilter) -> Result<(), HwError> {
        Ok(())
    }

    fn mac_vlan_filter(
        &mut self,
        _filter: &UcastFilter,
    ) -> Result<(), HwError> {
        Ok(())
    }

    fn accept_any_vlan(&mut self, _enable: bool) -> Result<(), HwError> {
        Ok(())
    }
}

pub fn null_dev(max_filters: u32, rx_queues: u16) -> FdirDev<NullHw> {
    let cfg = FdirCfg {
        name: "bench0".to_string(),
        max_filters,
        rx_queues,
        ..Default::default()
    };
    FdirDev::new(cfg, NullHw, Providers { log: Box::new(NullLog) })
}

/// Generate `n` random TCP/UDP filters over both address families,
/// deterministically from `seed`.
pub fn random_filters(n: usize, rx_queues: u16, seed: u64) -> Vec<FdirFilter> {
    const KINDS: [FlowType; 4] = [
        FlowType::Ipv4Tcp,
        FlowType::Ipv4Udp,
        FlowType::Ipv6Tcp,
        FlowType::Ipv6Udp,
    ];

    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let flow_type = KINDS[rng.random_range(0..KINDS.len())];
            let (src_ip, dst_ip) = if flow_type.is_ipv4() {
                (
                    IpAddr::Ip4(Ipv4Addr::from(rng.random::<u32>())),
                    IpAddr::Ip4(Ipv4Addr::from(rng.random::<u32>())),
                )
            } else {
                (
                    IpAddr::Ip6(Ipv6Addr::from(rng.random::<[u8; 16]>())),
                    IpAddr::Ip6(Ipv6Addr::from(rng.random::<[u8; 16]>())),
                )
            };

            FdirFilter {
                input: FdirInput {
                    flow_type,
                    src_ip,
                    dst_ip,
                    src_port: rng.random(),
                    dst_port: rng.random(),
                    proto: None,
                    ttl: None,
                    tos: 0,
                    vlan_tci: rng.random_bool(0.25).then(|| rng.random()),
                    from_vf: false,
                },
                action: FdirAction { rx_queue: rng.random_range(0..rx_queues) },
            }
        })
        .collect()
}
