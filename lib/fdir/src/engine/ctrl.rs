// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Filter control requests.

use super::dev::FdirDev;
use super::hw::FilterHw;
use super::tunnel::OffloadKind;
use crate::api::DumpFdirResp;
use crate::api::FdirEntryDump;
use crate::api::FdirError;
use crate::api::FdirFilter;
use crate::api::FdirMode;
use crate::api::FilterOp;
use crate::api::FilterReq;
use crate::api::TunnelDump;
use crate::api::TunnelType;

cfg_if! {
    if #[cfg(all(not(feature = "std"), not(test)))] {
        use alloc::string::String;
        use alloc::vec::Vec;
    } else {
        use std::string::String;
        use std::vec::Vec;
    }
}

impl<H: FilterHw> FdirDev<H> {
    /// Accept or reject the flow director mode requested at device
    /// configuration.
    pub fn check_fdir_support(
        &mut self,
        mode: FdirMode,
    ) -> Result<(), FdirError> {
        match mode {
            FdirMode::None => {
                self.mode = FdirMode::None;
                self.note("flow director disabled");
                Ok(())
            }

            FdirMode::Perfect => {
                if self.cfg.cmt {
                    self.mode = FdirMode::None;
                    self.error("flow director not supported in 100G mode");
                    return Err(FdirError::NotSupported(String::from(
                        "flow director in 100G mode",
                    )));
                }
                self.mode = FdirMode::Perfect;
                self.note("flow director enabled");
                Ok(())
            }

            FdirMode::PerfectTunnel
            | FdirMode::Signature
            | FdirMode::PerfectMacVlan => {
                self.error(&format!("unsupported flow director mode {mode:?}"));
                Err(FdirError::NotSupported(format!("flow director {mode:?}")))
            }
        }
    }

    /// Answer a support query for the flow director and ntuple paths.
    pub(crate) fn fdir_supported(&self) -> Result<(), FdirError> {
        if self.cfg.cmt {
            self.error("flow director not supported in 100G mode");
            return Err(FdirError::NotSupported(String::from(
                "flow director in 100G mode",
            )));
        }
        Ok(())
    }

    pub fn fdir_filter_conf(
        &mut self,
        op: FilterOp,
        filter: &FdirFilter,
    ) -> Result<(), FdirError> {
        match op {
            FilterOp::Nop => self.fdir_supported(),
            FilterOp::Add => self.add_fdir_filter(filter),
            FilterOp::Delete => self.del_fdir_filter(filter),
            _ => {
                self.error(&format!("unsupported flow director op {op}"));
                Err(FdirError::NotSupported(format!("flow director {op}")))
            }
        }
    }

    /// Dispatch a filter control request.
    pub fn filter_ctrl(&mut self, req: &FilterReq) -> Result<(), FdirError> {
        match req {
            FilterReq::Fdir(op, filter) => self.fdir_filter_conf(*op, filter),
            FilterReq::Ntuple(op, ntuple) => {
                self.ntuple_filter_conf(*op, ntuple)
            }

            FilterReq::Tunnel(op, conf) => match conf.tunnel_type {
                TunnelType::Vxlan
                | TunnelType::Geneve
                | TunnelType::IpInGre => {
                    self.note(
                        "steering to a specific rx queue is not supported \
                         with UDP tunnels",
                    );
                    self.tunn_filter_config(*op, conf)
                }

                TunnelType::Teredo | TunnelType::Nvgre | TunnelType::ETag => {
                    self.error(&format!(
                        "unsupported tunnel type {}",
                        conf.tunnel_type
                    ));
                    Err(FdirError::InvalidTunnelType(conf.tunnel_type))
                }

                TunnelType::None => Ok(()),
            },

            FilterReq::Other(ft, _) => {
                self.error(&format!("unsupported filter type {ft}"));
                Err(FdirError::Invalid(format!("filter type {ft}")))
            }
        }
    }

    /// Dump the filter state of the device.
    pub fn dump(&self) -> DumpFdirResp {
        let mut filters: Vec<_> = self.fdir.iter().collect();
        filters.sort_by_key(|(_, entry)| entry.seq);

        let filters = filters
            .into_iter()
            .map(|(tmpl, entry)| FdirEntryDump {
                rx_queue: entry.rx_queue,
                pkt_len: entry.pkt_len,
                pkt: tmpl.as_bytes().to_vec(),
            })
            .collect();

        let tunnels = OffloadKind::ALL
            .iter()
            .map(|kind| {
                let info = self.tunn.get(*kind);
                TunnelDump {
                    tunnel: kind.tunnel_type(),
                    enabled: info.enable,
                    clss: info.clss,
                    udp_port: info.udp_port,
                    num_filters: info.num_filters,
                }
            })
            .collect();

        DumpFdirResp {
            name: self.cfg.name.clone(),
            mode: self.mode,
            filters,
            count: self.fdir.count(),
            max: self.cfg.max_filters,
            arfs: self.fdir.arfs(),
            tunnels,
        }
    }
}
