// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Core of the over-the-air game propagation bootloader for six-face IR
//! tiles.
//!
//! A tile either distributes the game it holds to neighbors that want it, or
//! locks onto a neighbor as its source and receives a new game page by page
//! into the active flash slot. Distribution is gossip-style: a tile with
//! something to share periodically offers it (SEED) on a staggered rotation
//! of faces, a neighbor asks for the one page it still needs (PULL), and the
//! holder answers with that page (PUSH). Propagation ends when nothing has
//! happened for the quiescence timeout; the supervisor then re-verifies the
//! whole image and either clears the way for a jump into the active slot or
//! signals failure on the face pixels.
//!
//! Hardware stays behind seams: flash is an
//! [`embedded_storage::nor_flash::NorFlash`] device, the IR byte driver is an
//! [`ir::IrLink`], the pixels are a [`pixels::StatusPixels`], and the fine
//! timer ISR feeds [`ticks::Countdowns::on_tick`]. The invocation glue that
//! relocates vectors, wires the ISRs, and performs the final jump lives with
//! the board support, not here.

#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

mod download;
mod seed;

pub mod flash;
pub mod ir;
pub mod pixels;
pub mod supervisor;
pub mod ticks;

pub use supervisor::{BootMode, Outcome, Supervisor};
