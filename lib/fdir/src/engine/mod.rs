// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The filter engine.
pub mod ctrl;
pub mod dev;
pub mod ether;
pub mod fdir;
pub mod hw;
pub mod ip4;
pub mod ip6;
pub mod ntuple;
pub mod tcp;
pub mod template;
pub mod tunnel;
pub mod udp;
pub mod ulp;

pub use dev::FdirDev;
pub use hw::FilterHw;
pub use hw::HwError;
pub use template::PacketTemplate;
pub use template::build_template;
