// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Default flows.
//!
//! A default flow steers traffic between a physical port, the driver
//! function bound to it, and the VF behind a representor. Installing
//! one amounts to looking up the interface indices of the port in the
//! port database, writing them into the computed-field array of a
//! mapper request, and handing that request to the mapper along with
//! the class template to instantiate. The mapper itself is opaque.

use crate::provider::LogLevel;
use crate::provider::LogProvider;
use crate::provider::Providers;
use alloc::boxed::Box;
use bitflags::bitflags;
use core::fmt;
use core::fmt::Display;
use thiserror::Error;

/// Driver function PARIFs are moved past the partitions reserved for
/// the physical ports.
pub const FREE_PARIF_BASE: u16 = 11;

/// Which side of a port an interface index belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IfKind {
    PhyPort,
    DrvFunc,
    VfFunc,
}

impl Display for IfKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::PhyPort => "phy-port",
            Self::DrvFunc => "drv-func",
            Self::VfFunc => "vf-func",
        };
        write!(f, "{s}")
    }
}

/// Slots of the computed-field array.
#[repr(usize)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CfIdx {
    PhyPortSvif,
    DrvFuncSvif,
    VfFuncSvif,
    PhyPortSpif,
    DrvFuncSpif,
    VfFuncSpif,
    PhyPortParif,
    DrvFuncParif,
    VfFuncParif,
    DrvFuncVnic,
    VfFuncVnic,
    PhyPortVport,
    DevPortId,
}

impl CfIdx {
    pub const COUNT: usize = CfIdx::DevPortId as usize + 1;

    pub fn svif(kind: IfKind) -> Self {
        match kind {
            IfKind::PhyPort => Self::PhyPortSvif,
            IfKind::DrvFunc => Self::DrvFuncSvif,
            IfKind::VfFunc => Self::VfFuncSvif,
        }
    }

    pub fn spif(kind: IfKind) -> Self {
        match kind {
            IfKind::PhyPort => Self::PhyPortSpif,
            IfKind::DrvFunc => Self::DrvFuncSpif,
            IfKind::VfFunc => Self::VfFuncSpif,
        }
    }

    pub fn parif(kind: IfKind) -> Self {
        match kind {
            IfKind::PhyPort => Self::PhyPortParif,
            IfKind::DrvFunc => Self::DrvFuncParif,
            IfKind::VfFunc => Self::VfFuncParif,
        }
    }

    /// There is no VNIC on the physical port side; it maps to the
    /// driver function's.
    pub fn vnic(kind: IfKind) -> Self {
        match kind {
            IfKind::PhyPort | IfKind::DrvFunc => Self::DrvFuncVnic,
            IfKind::VfFunc => Self::VfFuncVnic,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ComputedFields {
    fields: [u32; CfIdx::COUNT],
}

impl ComputedFields {
    pub fn get(&self, idx: CfIdx) -> u32 {
        self.fields[idx as usize]
    }

    pub fn set(&mut self, idx: CfIdx, val: u32) {
        self.fields[idx as usize] = val;
    }
}

bitflags! {
/// Actions already attached to a mapper request.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ActBitmap: u64 {
    const DROP = 1 << 0;
    const COUNT = 1 << 1;
    const MARK = 1 << 2;
    const POP_VLAN = 1 << 3;
    const PUSH_VLAN = 1 << 4;
    const SET_VLAN_PCP = 1 << 5;
    const SET_VLAN_VID = 1 << 6;
    const VXLAN_ENCAP = 1 << 7;
}
}

/// Action properties of a mapper request.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ActProps {
    /// The VLAN tag to encapsulate with, network order.
    pub encap_vtag: [u8; 2],
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MapperCreateParams {
    pub class_tid: u32,
    pub act: ActBitmap,
    pub act_prop: ActProps,
    pub comp_fld: ComputedFields,
}

/// The mapper table a flow lives in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlowTable {
    Regular,
    Default,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum UlpError {
    #[error("ULP context is not initialized")]
    NoContext,
    #[error("invalid port id {0}")]
    InvalidPort(u16),
    #[error("no {kind} {what} for interface {ifindex}")]
    NoIndex { what: &'static str, kind: IfKind, ifindex: u32 },
    #[error("{kind} parif {parif} for interface {ifindex} out of range")]
    ParifRange { kind: IfKind, ifindex: u32, parif: u16 },
    #[error("VLAN already set, multiple VLANs unsupported")]
    VlanAlreadySet,
    #[error("MARK already set, multiple MARKs unsupported")]
    MarkAlreadySet,
    #[error("mapper failed: rc {0}")]
    Mapper(i32),
}

/// Interface index lookups.
pub trait PortDb {
    /// Map a device port id to its ULP interface index.
    fn dev_port_to_ulp_index(&self, port_id: u16) -> Result<u32, UlpError>;
    fn svif(&self, ifindex: u32, kind: IfKind) -> Result<u16, UlpError>;
    fn spif(&self, ifindex: u32, kind: IfKind) -> Result<u16, UlpError>;
    fn parif(&self, ifindex: u32, kind: IfKind) -> Result<u16, UlpError>;
    fn default_vnic(&self, ifindex: u32, kind: IfKind)
    -> Result<u16, UlpError>;
    fn vport(&self, ifindex: u32) -> Result<u16, UlpError>;
}

pub trait UlpMapper {
    /// Instantiate the class template named by `params`, returning
    /// the new flow's id.
    fn flow_create(
        &mut self,
        params: &MapperCreateParams,
    ) -> Result<u32, UlpError>;

    fn flow_destroy(
        &mut self,
        flow_id: u32,
        table: FlowTable,
    ) -> Result<(), UlpError>;
}

pub struct UlpContext<P: PortDb, M: UlpMapper> {
    pub port_db: P,
    pub mapper: M,
    log: Box<dyn LogProvider>,
}

impl<P: PortDb, M: UlpMapper> UlpContext<P, M> {
    pub fn new(port_db: P, mapper: M, providers: Providers) -> Self {
        Self { port_db, mapper, log: providers.log }
    }
}

/// A default flow parameter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DefaultFlowParam {
    /// The device port the flow is created for.
    DevPortId(u16),
}

impl DefaultFlowParam {
    /// Decode a port id carried as a two-byte value in network order.
    pub fn dev_port_id(value: [u8; 2]) -> Self {
        Self::DevPortId(u16::from_be_bytes(value))
    }
}

fn dev_port_handler<P: PortDb>(
    port_db: &P,
    port_id: u16,
    mp: &mut MapperCreateParams,
) -> Result<(), UlpError> {
    let ifindex = port_db
        .dev_port_to_ulp_index(port_id)
        .map_err(|_| UlpError::InvalidPort(port_id))?;

    const KINDS: [IfKind; 3] =
        [IfKind::PhyPort, IfKind::DrvFunc, IfKind::VfFunc];

    for kind in KINDS {
        let svif = port_db.svif(ifindex, kind)?;
        mp.comp_fld.set(CfIdx::svif(kind), u32::from(svif));
    }

    for kind in KINDS {
        let spif = port_db.spif(ifindex, kind)?;
        mp.comp_fld.set(CfIdx::spif(kind), u32::from(spif));
    }

    for kind in KINDS {
        let mut parif = port_db.parif(ifindex, kind)?;
        if kind == IfKind::DrvFunc {
            parif = parif.checked_add(FREE_PARIF_BASE).ok_or(
                UlpError::ParifRange { kind, ifindex, parif },
            )?;
        }
        mp.comp_fld.set(CfIdx::parif(kind), u32::from(parif));
    }

    for kind in [IfKind::DrvFunc, IfKind::VfFunc] {
        let vnic = port_db.default_vnic(ifindex, kind)?;
        mp.comp_fld.set(CfIdx::vnic(kind), u32::from(vnic));
    }

    let vport = port_db.vport(ifindex)?;
    mp.comp_fld.set(CfIdx::PhyPortVport, u32::from(vport));

    if mp.act.contains(ActBitmap::SET_VLAN_VID) {
        return Err(UlpError::VlanAlreadySet);
    }
    mp.act.insert(ActBitmap::SET_VLAN_VID);
    mp.act_prop.encap_vtag = port_id.to_be_bytes();

    if mp.act.contains(ActBitmap::MARK) {
        return Err(UlpError::MarkAlreadySet);
    }
    mp.comp_fld.set(CfIdx::DevPortId, u32::from(port_id));

    Ok(())
}

/// Create the default flow described by `params` from the class
/// template `class_tid`, returning the mapper's flow id.
pub fn default_flow_create<P: PortDb, M: UlpMapper>(
    ctx: Option<&mut UlpContext<P, M>>,
    params: &[DefaultFlowParam],
    class_tid: u32,
) -> Result<u32, UlpError> {
    let Some(ctx) = ctx else {
        return Err(UlpError::NoContext);
    };

    let mut mp = MapperCreateParams::default();

    for param in params {
        let res = match param {
            DefaultFlowParam::DevPortId(port_id) => {
                dev_port_handler(&ctx.port_db, *port_id, &mut mp)
            }
        };

        if let Err(e) = res {
            ctx.log.log(
                LogLevel::Error,
                &format!("failed to create default flow: {e}"),
            );
            return Err(e);
        }
    }

    mp.class_tid = class_tid;
    match ctx.mapper.flow_create(&mp) {
        Ok(flow_id) => {
            ctx.log.log(
                LogLevel::Note,
                &format!(
                    "default flow {flow_id} created from class {class_tid}"
                ),
            );
            Ok(flow_id)
        }

        Err(e) => {
            ctx.log.log(
                LogLevel::Error,
                &format!("failed to create default flow: {e}"),
            );
            Err(e)
        }
    }
}

/// Destroy a flow created by [`default_flow_create()`].
pub fn default_flow_destroy<P: PortDb, M: UlpMapper>(
    ctx: Option<&mut UlpContext<P, M>>,
    flow_id: u32,
) -> Result<(), UlpError> {
    let Some(ctx) = ctx else {
        return Err(UlpError::NoContext);
    };

    let res = ctx.mapper.flow_destroy(flow_id, FlowTable::Default);
    match &res {
        Ok(()) => ctx.log.log(
            LogLevel::Note,
            &format!("default flow {flow_id} destroyed"),
        ),
        Err(e) => ctx.log.log(
            LogLevel::Error,
            &format!("failed to destroy flow {flow_id}: {e}"),
        ),
    }
    res
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cf_slots_distinct() {
        let mut cf = ComputedFields::default();
        let kinds = [IfKind::PhyPort, IfKind::DrvFunc, IfKind::VfFunc];
        let mut v = 1;
        for kind in kinds {
            cf.set(CfIdx::svif(kind), v);
            cf.set(CfIdx::spif(kind), v + 10);
            cf.set(CfIdx::parif(kind), v + 20);
            v += 1;
        }
        assert_eq!(cf.get(CfIdx::PhyPortSvif), 1);
        assert_eq!(cf.get(CfIdx::VfFuncSpif), 13);
        assert_eq!(cf.get(CfIdx::DrvFuncParif), 22);
        assert_eq!(cf.get(CfIdx::DevPortId), 0);
        assert_eq!(CfIdx::COUNT, 13);
    }

    #[test]
    fn tlv_port_id() {
        assert_eq!(
            DefaultFlowParam::dev_port_id([0x01, 0x02]),
            DefaultFlowParam::DevPortId(0x0102)
        );
    }
}
