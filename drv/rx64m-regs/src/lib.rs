// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register maps for the RX64M peripherals this workspace drives.
//!
//! Each module declares a block with [`regmap::register_block!`], the bit
//! fields that drivers use, and the base address(es) of its instances as
//! `*const RegisterBlock` constants. Binding a driver to an instance is
//! `unsafe { &*BASE }`, done once when the driver is configured.
//!
//! Only the registers a driver actually touches are named; everything else
//! is reserved padding.

#![cfg_attr(not(test), no_std)]

pub mod cmt;
pub mod icu;
pub mod mpc;
pub mod port;
pub mod rspi;
pub mod sci;
pub mod system;
