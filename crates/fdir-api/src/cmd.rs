// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use super::flow::ArfsConfig;
use super::flow::FdirFilter;
use super::flow::FdirMode;
use super::flow::FlowType;
use super::flow::NtupleFilter;
use super::tunnel::TunnClss;
use super::tunnel::TunnelFilterConf;
use super::tunnel::TunnelType;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// Linux errno values, which is what callers of the filter control
// path expect to see.
pub const ENOENT: i32 = 2;
pub const EIO: i32 = 5;
pub const EEXIST: i32 = 17;
pub const EINVAL: i32 = 22;
pub const ENOTSUP: i32 = 95;

/// The class of filter a control request targets.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FilterType {
    None,
    MacVlan,
    Ethertype,
    Flexible,
    Syn,
    Ntuple,
    Tunnel,
    Fdir,
    Hash,
    L2Tunnel,
    Generic,
}

impl Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::MacVlan => "macvlan",
            Self::Ethertype => "ethertype",
            Self::Flexible => "flexible",
            Self::Syn => "syn",
            Self::Ntuple => "ntuple",
            Self::Tunnel => "tunnel",
            Self::Fdir => "fdir",
            Self::Hash => "hash",
            Self::L2Tunnel => "l2-tunnel",
            Self::Generic => "generic",
        };
        write!(f, "{s}")
    }
}

/// The operation a control request performs.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FilterOp {
    /// Query whether the filter class is supported.
    Nop,
    Add,
    Update,
    Delete,
    Flush,
    Get,
    Set,
    Info,
    Stats,
}

impl Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Nop => "nop",
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Flush => "flush",
            Self::Get => "get",
            Self::Set => "set",
            Self::Info => "info",
            Self::Stats => "stats",
        };
        write!(f, "{s}")
    }
}

/// A filter control request.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FilterReq {
    Fdir(FilterOp, FdirFilter),
    Ntuple(FilterOp, NtupleFilter),
    Tunnel(FilterOp, TunnelFilterConf),
    /// Any filter class the engine does not handle.
    Other(FilterType, FilterOp),
}

/// A single installed filter.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FdirEntryDump {
    pub rx_queue: u16,
    pub pkt_len: usize,
    /// The template bytes, `pkt_len` long.
    pub pkt: Vec<u8>,
}

/// The state of one tunnel offload kind.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TunnelDump {
    pub tunnel: TunnelType,
    pub enabled: bool,
    pub clss: TunnClss,
    pub udp_port: u16,
    pub num_filters: u32,
}

/// Dump the filter state of a device.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DumpFdirResp {
    pub name: String,
    pub mode: FdirMode,
    pub filters: Vec<FdirEntryDump>,
    pub count: u32,
    pub max: u32,
    pub arfs: ArfsConfig,
    pub tunnels: Vec<TunnelDump>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Error)]
pub enum FdirError {
    #[error("filter table full: max {0} filters")]
    MaxCapacity(u64),
    #[error("unsupported flow type: {0}")]
    UnsupportedFlow(FlowType),
    #[error("rx queue {queue} out of range (max {max})")]
    InvalidQueue { queue: u16, max: u16 },
    #[error("filters from a VF representor are not supported")]
    UnsupportedSource,
    #[error("filter not found")]
    FilterNotFound,
    #[error("no {0} tunnel filter to remove")]
    TunnelFilterNotFound(TunnelType),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("invalid operation: {0}")]
    InvalidOp(FilterOp),
    #[error("invalid tunnel type: {0}")]
    InvalidTunnelType(TunnelType),
    #[error("unsupported tunnel filter type: {0:#x}")]
    UnsupportedTunnelFilter(u16),
    #[error("{tunnel} port {port} is not bound")]
    PortNotBound { tunnel: TunnelType, port: u16 },
    #[error("invalid argument: {0}")]
    Invalid(String),
    #[error("hardware request failed: rc {rc}")]
    Hardware { rc: i32 },
}

impl FdirError {
    /// Convert to an errno value.
    ///
    /// Removing an unknown filter is reported as `EEXIST`, which is
    /// what existing callers test for.
    pub fn to_errno(&self) -> i32 {
        match self {
            Self::MaxCapacity(_) => EINVAL,
            Self::UnsupportedFlow(_) => EINVAL,
            Self::InvalidQueue { .. } => EINVAL,
            Self::UnsupportedSource => EINVAL,
            Self::FilterNotFound => EEXIST,
            Self::TunnelFilterNotFound(_) => ENOENT,
            Self::NotSupported(_) => ENOTSUP,
            Self::InvalidOp(_) => EINVAL,
            Self::InvalidTunnelType(_) => EINVAL,
            Self::UnsupportedTunnelFilter(_) => EINVAL,
            Self::PortNotBound { .. } => EINVAL,
            Self::Invalid(_) => EINVAL,
            Self::Hardware { .. } => EIO,
        }
    }
}
