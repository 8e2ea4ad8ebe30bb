// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! UDP tunnel offload state.
//!
//! Each offload kind is enabled on the device whenever it has at
//! least one tunnel filter installed, or an explicit UDP port bound.
//! VXLAN and GENEVE bind a single UDP destination port: enabling binds
//! the IANA default and disabling unbinds it.

use super::dev::FdirDev;
use super::hw::FilterHw;
use super::hw::TunnelMode;
use super::hw::TunnelUpdate;
use super::hw::UcastFilter;
use super::hw::UcastOpcode;
use crate::api::FdirError;
use crate::api::FilterOp;
use crate::api::GENEVE_DEFAULT_PORT;
use crate::api::MacAddr;
use crate::api::TunnClss;
use crate::api::TunnelFilterConf;
use crate::api::TunnelFilterFlags;
use crate::api::TunnelType;
use crate::api::UcastFilterType;
use crate::api::UdpTunnel;
use crate::api::VXLAN_DEFAULT_PORT;
use core::fmt;
use core::fmt::Display;

/// The tunnel kinds the device can offload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OffloadKind {
    Vxlan,
    Geneve,
    IpGre,
}

impl OffloadKind {
    pub const ALL: [Self; 3] = [Self::Vxlan, Self::Geneve, Self::IpGre];

    pub fn tunnel_type(&self) -> TunnelType {
        match self {
            Self::Vxlan => TunnelType::Vxlan,
            Self::Geneve => TunnelType::Geneve,
            Self::IpGre => TunnelType::IpInGre,
        }
    }

    /// The UDP port bound when the kind is enabled. IP-GRE is not
    /// carried over UDP.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Vxlan => Some(VXLAN_DEFAULT_PORT),
            Self::Geneve => Some(GENEVE_DEFAULT_PORT),
            Self::IpGre => None,
        }
    }
}

impl TryFrom<TunnelType> for OffloadKind {
    type Error = FdirError;

    fn try_from(tunnel: TunnelType) -> Result<Self, Self::Error> {
        match tunnel {
            TunnelType::Vxlan => Ok(Self::Vxlan),
            TunnelType::Geneve => Ok(Self::Geneve),
            TunnelType::IpInGre => Ok(Self::IpGre),
            TunnelType::None
            | TunnelType::Teredo
            | TunnelType::Nvgre
            | TunnelType::ETag => Err(FdirError::InvalidTunnelType(tunnel)),
        }
    }
}

impl Display for OffloadKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.tunnel_type())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TunnelInfo {
    pub enable: bool,
    pub clss: TunnClss,
    /// The bound UDP destination port, zero when unbound.
    pub udp_port: u16,
    pub num_filters: u32,
    /// The filter type of the most recently added filter.
    pub filter_type: TunnelFilterFlags,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TunnelState {
    pub vxlan: TunnelInfo,
    pub geneve: TunnelInfo,
    pub ipgre: TunnelInfo,
}

impl TunnelState {
    pub fn get(&self, kind: OffloadKind) -> &TunnelInfo {
        match kind {
            OffloadKind::Vxlan => &self.vxlan,
            OffloadKind::Geneve => &self.geneve,
            OffloadKind::IpGre => &self.ipgre,
        }
    }

    fn get_mut(&mut self, kind: OffloadKind) -> &mut TunnelInfo {
        match kind {
            OffloadKind::Vxlan => &mut self.vxlan,
            OffloadKind::Geneve => &mut self.geneve,
            OffloadKind::IpGre => &mut self.ipgre,
        }
    }
}

/// How the device classifies a given tunnel filter type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TunnelClassification {
    pub ucast_type: UcastFilterType,
    pub clss: TunnClss,
    pub name: &'static str,
}

const OMAC: u16 = TunnelFilterFlags::OMAC.bits();
const TENID: u16 = TunnelFilterFlags::TENID.bits();
const IMAC: u16 = TunnelFilterFlags::IMAC.bits();
const IVLAN: u16 = TunnelFilterFlags::IVLAN.bits();
const OMAC_TENID: u16 = OMAC | TENID;
const TENID_IMAC: u16 = TENID | IMAC;
const IMAC_IVLAN: u16 = IMAC | IVLAN;

/// Map a tunnel filter type to its unicast filter type and tunnel
/// classification. Combinations the device cannot classify return
/// `None`.
pub fn tunnel_classification(
    flags: TunnelFilterFlags,
) -> Option<TunnelClassification> {
    use TunnClss as C;
    use UcastFilterType as U;

    let (ucast_type, clss, name) = match flags.bits() {
        OMAC => (U::Mac, C::MacVlan, "outer-mac"),
        TENID => (U::Vni, C::MacVni, "vni"),
        IMAC => (U::InnerMac, C::InnerMacVlan, "inner-mac"),
        IVLAN => (U::InnerVlan, C::InnerMacVlan, "inner-vlan"),
        OMAC_TENID => (U::MacVniPair, C::MacVni, "outer-mac and vni"),
        TENID_IMAC => {
            (U::InnerMacVniPair, C::InnerMacVni, "vni and inner-mac")
        }
        IMAC_IVLAN => {
            (U::InnerPair, C::InnerMacVlan, "inner-mac and inner-vlan")
        }
        _ => return None,
    };

    Some(TunnelClassification { ucast_type, clss, name })
}

/// Build the unicast filter for `conf`, copying out the fields the
/// filter type keys on.
fn ucast_filter(
    conf: &TunnelFilterConf,
    ty: UcastFilterType,
    opcode: UcastOpcode,
) -> Result<UcastFilter, FdirError> {
    let mut f =
        UcastFilter { opcode, ty, mac: MacAddr::ZERO, vlan: 0, vni: 0 };

    match ty {
        UcastFilterType::Vni => f.vni = conf.tenant_id,
        UcastFilterType::InnerVlan => f.vlan = conf.inner_vlan,
        UcastFilterType::Mac => f.mac = conf.outer_mac,
        UcastFilterType::InnerMac => f.mac = conf.inner_mac,
        UcastFilterType::MacVniPair => {
            f.mac = conf.outer_mac;
            f.vni = conf.tenant_id;
        }
        UcastFilterType::InnerMacVniPair => {
            f.mac = conf.inner_mac;
            f.vni = conf.tenant_id;
        }
        UcastFilterType::InnerPair => {
            f.mac = conf.inner_mac;
            f.vlan = conf.inner_vlan;
        }
        UcastFilterType::Vlan | UcastFilterType::MacVlan => {
            return Err(FdirError::UnsupportedTunnelFilter(
                conf.filter_type.bits(),
            ));
        }
    }

    Ok(f)
}

impl<H: FilterHw> FdirDev<H> {
    /// Enable or disable offload for `kind`. A request matching the
    /// current state does nothing.
    pub fn tunnel_enable(
        &mut self,
        kind: OffloadKind,
        clss: TunnClss,
        enable: bool,
    ) -> Result<(), FdirError> {
        if self.tunn.get(kind).enable == enable {
            return Ok(());
        }

        let port = kind.default_port().map(|p| if enable { p } else { 0 });
        let update = TunnelUpdate {
            tunnel: kind.tunnel_type(),
            mode: Some(TunnelMode { enabled: enable, clss }),
            port,
        };

        if let Err(e) = self.hw.tunnel_update(&update) {
            self.error(&format!(
                "failed to {} {kind} offload: {e}",
                if enable { "enable" } else { "disable" }
            ));
            return Err(e.into());
        }

        let info = self.tunn.get_mut(kind);
        info.enable = enable;
        info.clss = clss;
        if let Some(port) = port {
            info.udp_port = port;
        }

        match port {
            Some(port) if enable => self.note(&format!(
                "{kind} offload enabled ({clss}, port {port})"
            )),
            _ if enable => {
                self.note(&format!("{kind} offload enabled ({clss})"))
            }
            _ => self.note(&format!("{kind} offload disabled")),
        }
        Ok(())
    }

    fn udp_kind(&self, tunnel: TunnelType) -> Result<OffloadKind, FdirError> {
        match OffloadKind::try_from(tunnel) {
            Ok(OffloadKind::IpGre) | Err(_) => {
                self.error(&format!("no UDP port for {tunnel} tunnels"));
                Err(FdirError::InvalidTunnelType(tunnel))
            }
            Ok(kind) => Ok(kind),
        }
    }

    /// Bind `tunnel.udp_port` as the destination port of the tunnel
    /// kind, replacing any previous binding.
    pub fn udp_dst_port_add(
        &mut self,
        tunnel: &UdpTunnel,
    ) -> Result<(), FdirError> {
        let kind = self.udp_kind(tunnel.prot_type)?;
        let port = tunnel.udp_port;

        if self.tunn.get(kind).udp_port == port {
            self.note(&format!("{kind} port {port} already bound"));
            return Ok(());
        }

        if !self.tunn.get(kind).enable {
            self.tunnel_enable(kind, TunnClss::MacVlan, true)?;
        }

        let update = TunnelUpdate {
            tunnel: kind.tunnel_type(),
            mode: None,
            port: Some(port),
        };
        if let Err(e) = self.hw.tunnel_update(&update) {
            self.error(&format!("failed to bind {kind} port {port}: {e}"));
            return Err(e.into());
        }

        self.tunn.get_mut(kind).udp_port = port;
        self.note(&format!("{kind} port {port} bound"));
        Ok(())
    }

    /// Unbind the destination port of the tunnel kind. Offload is
    /// disabled along with it when no filters remain.
    pub fn udp_dst_port_del(
        &mut self,
        tunnel: &UdpTunnel,
    ) -> Result<(), FdirError> {
        let kind = self.udp_kind(tunnel.prot_type)?;
        let port = tunnel.udp_port;

        if self.tunn.get(kind).udp_port != port {
            self.error(&format!("{kind} port {port} is not bound"));
            return Err(FdirError::PortNotBound {
                tunnel: tunnel.prot_type,
                port,
            });
        }

        let update = TunnelUpdate {
            tunnel: kind.tunnel_type(),
            mode: None,
            port: Some(0),
        };
        if let Err(e) = self.hw.tunnel_update(&update) {
            self.error(&format!("failed to unbind {kind} port {port}: {e}"));
            return Err(e.into());
        }

        self.tunn.get_mut(kind).udp_port = 0;
        self.note(&format!("{kind} port {port} unbound"));

        let info = self.tunn.get(kind);
        if info.enable && info.num_filters == 0 {
            let clss = info.clss;
            self.tunnel_enable(kind, clss, false)?;
        }
        Ok(())
    }

    /// Add or remove a tunnel classification filter.
    ///
    /// The first filter of a kind turns its offload on before the
    /// filter is programmed; removing the last one turns it off.
    pub fn tunn_filter_config(
        &mut self,
        op: FilterOp,
        conf: &TunnelFilterConf,
    ) -> Result<(), FdirError> {
        let add = match op {
            FilterOp::Add => true,
            FilterOp::Delete => false,
            _ => {
                self.error(&format!("unsupported tunnel filter op {op}"));
                return Err(FdirError::InvalidOp(op));
            }
        };
        let kind = OffloadKind::try_from(conf.tunnel_type)?;

        // VFs have no access to the classification filters.
        if self.cfg.is_vf {
            return self.tunnel_enable(kind, TunnClss::MacVlan, add);
        }

        let bits = conf.filter_type.bits();
        let Some(class) = tunnel_classification(conf.filter_type) else {
            self.error(&format!("unsupported tunnel filter type {bits:#x}"));
            return Err(FdirError::UnsupportedTunnelFilter(bits));
        };

        let info = *self.tunn.get(kind);
        if !add && info.num_filters == 0 {
            self.error(&format!("no {kind} filter to remove"));
            return Err(FdirError::TunnelFilterNotFound(conf.tunnel_type));
        }

        let opcode = if add { UcastOpcode::Add } else { UcastOpcode::Remove };
        let ucast = ucast_filter(conf, class.ucast_type, opcode)?;

        let enabled_here = add && !info.enable;
        if enabled_here {
            self.tunnel_enable(kind, class.clss, true)?;
        }

        self.note(&format!(
            "{kind} rule \"{}\", op {op}, type {}",
            class.name, class.ucast_type
        ));

        if let Err(e) = self.program_tunnel_filter(&ucast, conf, add) {
            self.error(&format!("{kind} filter \"{}\": {e}", class.name));
            if enabled_here {
                if let Err(re) = self.tunnel_enable(kind, class.clss, false) {
                    self.error(&format!(
                        "{kind} offload left enabled after failed \
                         rollback: {re}"
                    ));
                }
            }
            return Err(e);
        }

        let info = self.tunn.get_mut(kind);
        if add {
            info.num_filters += 1;
            info.filter_type = conf.filter_type;
        } else {
            info.num_filters -= 1;
        }
        let remaining = info.num_filters;

        if !add && remaining == 0 {
            self.tunnel_enable(kind, class.clss, false)?;
        }
        Ok(())
    }

    fn program_tunnel_filter(
        &mut self,
        ucast: &UcastFilter,
        conf: &TunnelFilterConf,
        add: bool,
    ) -> Result<(), FdirError> {
        // Filters that do not key on a VNI are plain MAC/VLAN filters.
        if !conf.filter_type.contains(TunnelFilterFlags::TENID) {
            self.hw.mac_vlan_filter(ucast)?;
            if add {
                self.hw.accept_any_vlan(true)?;
            }
        } else {
            self.hw.ucast_filter(ucast)?;
        }
        Ok(())
    }
}
