// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Types shared between the flow director engine and its consumers.

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
extern crate std;

#[macro_use]
extern crate alloc;

pub mod cmd;
pub mod flow;
pub mod ip;
pub mod mac;
pub mod tunnel;

pub use cmd::*;
pub use flow::*;
pub use ip::*;
pub use mac::*;
pub use tunnel::*;
