// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The device side of the engine.
//!
//! Everything the engine asks of a device goes through [`FilterHw`].
//! Implementations translate these requests into whatever firmware
//! commands the device takes; the engine only cares whether a
//! request succeeded.

use crate::api::ArfsConfig;
use crate::api::FdirError;
use crate::api::MacAddr;
use crate::api::TunnClss;
use crate::api::TunnelType;
use crate::api::UcastFilterType;
use core::fmt;
use core::fmt::Display;

/// A failed device request, carrying the (negative) return code the
/// device reported.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HwError {
    pub rc: i32,
}

impl Display for HwError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "rc {}", self.rc)
    }
}

impl From<HwError> for FdirError {
    fn from(err: HwError) -> Self {
        FdirError::Hardware { rc: err.rc }
    }
}

/// How the caller wants to learn that a filter request completed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompletionMode {
    /// Wait for the device to finish before returning.
    Block,
    /// Return immediately; the device reports completion later.
    Callback,
}

/// A change to a tunnel kind's classification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TunnelMode {
    pub enabled: bool,
    pub clss: TunnClss,
}

/// A tunnel update. Fields left `None` are not touched by the device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TunnelUpdate {
    pub tunnel: TunnelType,
    pub mode: Option<TunnelMode>,
    pub port: Option<u16>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UcastOpcode {
    Add,
    Remove,
}

/// A unicast (MAC/VLAN/VNI) classification filter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UcastFilter {
    pub opcode: UcastOpcode,
    pub ty: UcastFilterType,
    pub mac: MacAddr,
    pub vlan: u16,
    pub vni: u32,
}

pub trait FilterHw {
    /// Install (`add`) or remove the filter for `pkt`, steering
    /// matching packets to `rx_queue`.
    fn configure_ntuple_filter(
        &mut self,
        pkt: &[u8],
        rx_queue: u16,
        add: bool,
        mode: CompletionMode,
    ) -> Result<(), HwError>;

    /// Program the searcher configuration.
    fn arfs_mode_configure(&mut self, cfg: &ArfsConfig) -> Result<(), HwError>;

    fn tunnel_update(&mut self, update: &TunnelUpdate) -> Result<(), HwError>;

    /// Install or remove a unicast filter keyed on a VNI.
    fn ucast_filter(&mut self, filter: &UcastFilter) -> Result<(), HwError>;

    /// Install or remove a unicast filter keyed on MAC and/or VLAN.
    fn mac_vlan_filter(&mut self, filter: &UcastFilter)
    -> Result<(), HwError>;

    fn accept_any_vlan(&mut self, enable: bool) -> Result<(), HwError>;
}
