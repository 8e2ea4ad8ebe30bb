// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! A flow director filter engine.
//!
//! The engine turns filter descriptors into raw packet templates,
//! tracks which templates are installed on a device, and keeps the
//! device's classification and tunnel offload state in step with the
//! installed set. All device interaction happens through the
//! [`engine::hw::FilterHw`] trait.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::len_without_is_empty)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
extern crate std;

#[macro_use]
extern crate alloc;

#[macro_use]
extern crate cfg_if;

pub mod api;
pub mod cfg;
pub mod engine;
#[cfg(feature = "std")]
pub mod pcap;
#[cfg(feature = "std")]
pub mod print;
pub mod provider;
