// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The flow director filter set and its lifecycle.
//!
//! Filters are keyed by their packet template. A template can be
//! installed at most once: adding an identical filter again is a
//! successful no-op, and a delete must name a filter whose template
//! matches an installed one byte for byte.
//!
//! The searcher configuration follows the set. It is enabled before
//! the first filter is submitted, widened when a filter of a new
//! L3/L4 kind arrives, and disabled once the set is empty again.

use super::dev::FdirDev;
use super::hw::CompletionMode;
use super::hw::FilterHw;
use super::template::PacketTemplate;
use super::template::build_template;
use crate::api::ArfsConfig;
use crate::api::FdirError;
use crate::api::FdirFilter;
use crate::api::FdirInput;
use crate::api::FdirMode;
use crate::cfg::DeleteFailurePolicy;
use alloc::collections::BTreeMap;

/// An installed filter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FdirEntry {
    pub rx_queue: u16,
    pub pkt_len: usize,
    /// Insertion order, for dumping.
    pub seq: u64,
}

/// The filters installed on a device, plus the searcher
/// configuration last programmed for them.
#[derive(Debug, Default)]
pub struct FdirInfo {
    filters: BTreeMap<PacketTemplate, FdirEntry>,
    arfs: ArfsConfig,
    next_seq: u64,
}

impl FdirInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.filters.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn arfs(&self) -> ArfsConfig {
        self.arfs
    }

    pub fn get(&self, tmpl: &PacketTemplate) -> Option<&FdirEntry> {
        self.filters.get(tmpl)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PacketTemplate, &FdirEntry)> {
        self.filters.iter()
    }

    fn insert(&mut self, tmpl: PacketTemplate, rx_queue: u16) {
        let entry =
            FdirEntry { rx_queue, pkt_len: tmpl.len(), seq: self.next_seq };
        self.next_seq += 1;
        self.filters.insert(tmpl, entry);
    }

    fn remove(&mut self, tmpl: &PacketTemplate) -> Option<FdirEntry> {
        self.filters.remove(tmpl)
    }

    /// Drop every record, returning how many there were.
    fn clear(&mut self) -> usize {
        let n = self.filters.len();
        self.filters.clear();
        self.arfs = ArfsConfig::default();
        n
    }
}

impl<H: FilterHw> FdirDev<H> {
    fn fdir_template(
        &self,
        input: &FdirInput,
    ) -> Result<PacketTemplate, FdirError> {
        if !input.flow_type.is_supported() {
            return Err(FdirError::UnsupportedFlow(input.flow_type));
        }

        build_template(input).map_err(|e| {
            self.error(&format!("template build failed: {e}"));
            FdirError::UnsupportedFlow(input.flow_type)
        })
    }

    fn validate_add(
        &self,
        filter: &FdirFilter,
    ) -> Result<PacketTemplate, FdirError> {
        let input = &filter.input;
        if !input.flow_type.is_supported() {
            return Err(FdirError::UnsupportedFlow(input.flow_type));
        }

        let queue = filter.action.rx_queue;
        if queue >= self.cfg.rx_queues {
            return Err(FdirError::InvalidQueue {
                queue,
                max: self.cfg.rx_queues,
            });
        }

        if input.from_vf {
            return Err(FdirError::UnsupportedSource);
        }

        self.fdir_template(input)
    }

    /// Install a flow director filter.
    pub fn add_fdir_filter(
        &mut self,
        filter: &FdirFilter,
    ) -> Result<(), FdirError> {
        let max = self.cfg.max_filters;
        if self.fdir.count() + 1 >= max {
            self.error(&format!("filter table full ({max} max)"));
            return Err(FdirError::MaxCapacity(u64::from(max)));
        }

        let tmpl = match self.validate_add(filter) {
            Ok(tmpl) => tmpl,
            Err(e) => {
                self.error(&format!("add rejected: {e}"));
                return Err(e);
            }
        };

        if self.fdir.get(&tmpl).is_some() {
            self.note(&format!(
                "filter {:08x} already installed",
                tmpl.crc32()
            ));
            return Ok(());
        }

        let arfs = self.fdir.arfs.including(filter.input.flow_type);
        if arfs != self.fdir.arfs {
            if let Err(e) = self.hw.arfs_mode_configure(&arfs) {
                self.error(&format!("failed to configure searcher: {e}"));
                return Err(e.into());
            }
            self.fdir.arfs = arfs;
            self.note(&format!("searcher configured: {arfs}"));
        }

        let queue = filter.action.rx_queue;
        if let Err(e) = self.hw.configure_ntuple_filter(
            tmpl.as_bytes(),
            queue,
            true,
            CompletionMode::Block,
        ) {
            self.error(&format!(
                "failed to add filter {:08x}: {e}",
                tmpl.crc32()
            ));
            if self.fdir.is_empty() {
                self.disable_arfs();
            }
            return Err(e.into());
        }

        let crc = tmpl.crc32();
        self.fdir.insert(tmpl, queue);
        // Installing a filter puts the device in perfect match mode.
        self.mode = FdirMode::Perfect;
        self.note(&format!(
            "added {} filter {crc:08x} to queue {queue} ({} filters)",
            filter.input.flow_type,
            self.fdir.count()
        ));
        Ok(())
    }

    /// Remove a flow director filter.
    ///
    /// What happens when the device fails to remove the rule depends
    /// on the configured [`DeleteFailurePolicy`].
    pub fn del_fdir_filter(
        &mut self,
        filter: &FdirFilter,
    ) -> Result<(), FdirError> {
        let tmpl = match self.fdir_template(&filter.input) {
            Ok(tmpl) => tmpl,
            Err(e) => {
                self.error(&format!("delete rejected: {e}"));
                return Err(e);
            }
        };

        let crc = tmpl.crc32();
        let Some(entry) = self.fdir.get(&tmpl).copied() else {
            self.error(&format!("filter {crc:08x} not found"));
            return Err(FdirError::FilterNotFound);
        };

        if let Err(e) = self.hw.configure_ntuple_filter(
            tmpl.as_bytes(),
            entry.rx_queue,
            false,
            CompletionMode::Block,
        ) {
            match self.cfg.delete_policy {
                DeleteFailurePolicy::Retain => {
                    self.error(&format!(
                        "failed to remove filter {crc:08x}: {e}"
                    ));
                    return Err(e.into());
                }

                DeleteFailurePolicy::Release => {
                    self.warn(&format!(
                        "device failed to remove filter {crc:08x} ({e}), \
                         releasing it anyway"
                    ));
                }
            }
        }

        self.fdir.remove(&tmpl);
        self.note(&format!(
            "removed filter {crc:08x} ({} filters)",
            self.fdir.count()
        ));

        if self.fdir.is_empty() {
            self.disable_arfs();
        }
        Ok(())
    }

    fn disable_arfs(&mut self) {
        self.fdir.arfs = ArfsConfig::default();
        match self.hw.arfs_mode_configure(&self.fdir.arfs) {
            Ok(()) => self.note("searcher disabled"),
            Err(e) => self.error(&format!("failed to disable searcher: {e}")),
        }
    }

    /// Free every filter record without touching the device. Used on
    /// teardown, when the device state goes away with us.
    pub fn release_filters(&mut self) -> usize {
        let n = self.fdir.clear();
        if n > 0 {
            self.note(&format!("released {n} filters"));
        }
        n
    }
}
