// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Page-granular access to the game slots.
//!
//! This is the only module that touches the raw flash device; everything
//! else in the crate deals in page indexes into the active slot. The device
//! is any [`NorFlash`] implementation covering the tile's flash from address
//! zero.

use consts::{ACTIVE_BASE, BUILT_IN_BASE, BUILT_IN_PAGES, MAX_PAGES, PAGE_SIZE};
use embedded_storage::nor_flash::NorFlash;

/// One flash page worth of bytes.
pub type Page = [u8; PAGE_SIZE];

pub struct FlashService<F> {
    flash: F,
}

impl<F: NorFlash> FlashService<F> {
    pub fn new(flash: F) -> Self {
        Self { flash }
    }

    /// Burn one page of the active slot. Synchronous: when this returns Ok,
    /// program-memory reads of the page return exactly `data`.
    ///
    /// The device implementation must keep interrupts masked across the
    /// erase and program windows (flash reads are undefined while they run)
    /// and the vector table must already live in the bootloader region, so
    /// no handler fetches code from the slot being written.
    pub fn burn_page(&mut self, page: u8, data: &Page) -> Result<(), F::Error> {
        let addr = active_addr(page);
        self.flash.erase(addr, addr + PAGE_SIZE as u32)?;
        self.flash.write(addr, data)
    }

    /// 16-bit wrapping sum of the page's 128 bytes plus the page index.
    /// Folding the index in ties each page to its position, so swapped pages
    /// change the image checksum even when their bytes sum alike.
    pub fn page_checksum(&mut self, page: u8) -> Result<u16, F::Error> {
        let mut buf: Page = [0; PAGE_SIZE];
        self.read_page(page, &mut buf)?;
        let mut sum: u16 = 0;
        for &b in buf.iter() {
            sum = sum.wrapping_add(u16::from(b));
        }
        Ok(sum.wrapping_add(u16::from(page)))
    }

    /// Whole-image checksum over the first `pages` pages of the active slot.
    pub fn image_checksum(&mut self, pages: u8) -> Result<u16, F::Error> {
        let mut sum: u16 = 0;
        for page in 0..pages {
            sum = sum.wrapping_add(self.page_checksum(page)?);
        }
        Ok(sum)
    }

    /// Read one page of the active slot into `buf`.
    pub fn read_page(&mut self, page: u8, buf: &mut Page) -> Result<(), F::Error> {
        self.flash.read(active_addr(page), buf)
    }

    /// Copy the built-in game down into the active slot, so a seeding root
    /// serves the same bytes it advertises.
    pub fn copy_built_in_to_active(&mut self) -> Result<(), F::Error> {
        let mut buf: Page = [0; PAGE_SIZE];
        for page in 0..BUILT_IN_PAGES {
            self.flash
                .read(BUILT_IN_BASE + u32::from(page) * PAGE_SIZE as u32, &mut buf)?;
            self.burn_page(page, &buf)?;
        }
        Ok(())
    }
}

fn active_addr(page: u8) -> u32 {
    debug_assert!(page < MAX_PAGES);
    ACTIVE_BASE + u32::from(page) * PAGE_SIZE as u32
}
