// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The per-device context.

use super::fdir::FdirInfo;
use super::hw::FilterHw;
use super::tunnel::TunnelState;
use crate::api::FdirMode;
use crate::cfg::FdirCfg;
use crate::provider::LogLevel;
use crate::provider::LogProvider;
use crate::provider::Providers;
use alloc::boxed::Box;

/// All filter state for one device.
///
/// Every mutating operation takes `&mut self`; callers that share a
/// device between threads must serialize access themselves.
pub struct FdirDev<H: FilterHw> {
    pub(crate) cfg: FdirCfg,
    pub(crate) hw: H,
    pub(crate) log: Box<dyn LogProvider>,
    pub(crate) fdir: FdirInfo,
    pub(crate) tunn: TunnelState,
    /// The mode accepted by the last `check_fdir_support()`.
    pub(crate) mode: FdirMode,
}

impl<H: FilterHw> FdirDev<H> {
    pub fn new(cfg: FdirCfg, hw: H, providers: Providers) -> Self {
        Self {
            cfg,
            hw,
            log: providers.log,
            fdir: FdirInfo::new(),
            tunn: TunnelState::default(),
            mode: FdirMode::None,
        }
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    pub fn cfg(&self) -> &FdirCfg {
        &self.cfg
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// The number of installed flow director filters.
    pub fn filter_count(&self) -> u32 {
        self.fdir.count()
    }

    pub fn filters(&self) -> &FdirInfo {
        &self.fdir
    }

    pub fn tunnels(&self) -> &TunnelState {
        &self.tunn
    }

    /// Is the searcher currently enabled?
    pub fn classification_enabled(&self) -> bool {
        self.fdir.arfs().enable
    }

    pub fn fdir_mode(&self) -> FdirMode {
        self.mode
    }

    pub(crate) fn note(&self, msg: &str) {
        self.log.log(LogLevel::Note, &format!("{}: {msg}", self.cfg.name));
    }

    pub(crate) fn warn(&self, msg: &str) {
        self.log.log(LogLevel::Warn, &format!("{}: {msg}", self.cfg.name));
    }

    pub(crate) fn error(&self, msg: &str) {
        self.log.log(LogLevel::Error, &format!("{}: {msg}", self.cfg.name));
    }
}
