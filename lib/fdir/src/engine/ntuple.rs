// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! 5-tuple filters, carried out as flow director filters.

use super::dev::FdirDev;
use super::hw::FilterHw;
use crate::api::FdirAction;
use crate::api::FdirError;
use crate::api::FdirFilter;
use crate::api::FdirInput;
use crate::api::FilterOp;
use crate::api::FlowType;
use crate::api::IpAddr;
use crate::api::NtupleFilter;
use crate::api::PROTO_TCP;
use crate::api::PROTO_UDP;

/// Express a 5-tuple filter as a flow director filter.
///
/// Anything that is not TCP is treated as UDP.
pub fn ntuple_to_fdir(nt: &NtupleFilter) -> FdirFilter {
    let (flow_type, proto) = if nt.proto == PROTO_TCP {
        (FlowType::Ipv4Tcp, PROTO_TCP)
    } else {
        (FlowType::Ipv4Udp, PROTO_UDP)
    };

    FdirFilter {
        input: FdirInput {
            flow_type,
            src_ip: IpAddr::Ip4(nt.src_ip),
            dst_ip: IpAddr::Ip4(nt.dst_ip),
            src_port: nt.src_port,
            dst_port: nt.dst_port,
            proto: Some(proto),
            ttl: None,
            tos: 0,
            vlan_tci: None,
            from_vf: false,
        },
        action: FdirAction { rx_queue: nt.queue },
    }
}

impl<H: FilterHw> FdirDev<H> {
    /// Add or delete a 5-tuple filter.
    pub fn ntuple_filter_conf(
        &mut self,
        op: FilterOp,
        ntuple: &NtupleFilter,
    ) -> Result<(), FdirError> {
        let fdir = ntuple_to_fdir(ntuple);
        match op {
            FilterOp::Nop => self.fdir_supported(),
            FilterOp::Add => self.add_fdir_filter(&fdir),
            FilterOp::Delete => self.del_fdir_filter(&fdir),
            _ => {
                self.error(&format!("unsupported ntuple op {op}"));
                Err(FdirError::NotSupported(format!("ntuple {op}")))
            }
        }
    }
}
