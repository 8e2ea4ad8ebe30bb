// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Device configuration.

use crate::api::FdirMode;
use alloc::string::String;
use serde::Deserialize;
use serde::Serialize;

/// The maximum number of filters the searcher can hold.
pub const FDIR_MAX_FILTERS: u32 = 256;

/// What to do with a filter record when the device fails to remove
/// the corresponding rule.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteFailurePolicy {
    /// Free the record anyway and report success. The device may
    /// still hold the rule.
    #[default]
    Release,
    /// Keep the record and report the failure.
    Retain,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct FdirCfg {
    /// The device name, used to prefix log messages.
    pub name: String,
    /// The searcher capacity. One slot is always held back, so at
    /// most `max_filters - 1` filters can be installed.
    pub max_filters: u32,
    /// The number of receive queues a filter may target.
    pub rx_queues: u16,
    /// The device is a virtual function.
    pub is_vf: bool,
    /// The device runs two engines as one port (100G).
    pub cmt: bool,
    pub fdir_mode: FdirMode,
    pub delete_policy: DeleteFailurePolicy,
}

impl Default for FdirCfg {
    fn default() -> Self {
        Self {
            name: String::from("fdir0"),
            max_filters: FDIR_MAX_FILTERS,
            rx_queues: 1,
            is_vf: false,
            cmt: false,
            fdir_mode: FdirMode::Perfect,
            delete_policy: DeleteFailurePolicy::Release,
        }
    }
}
