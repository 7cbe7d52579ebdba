// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Receive half of the propagation protocol: lock onto a source, pull pages
//! in order, burn each one, and step past the page count once the image is
//! whole.

use consts::MAX_PAGES;
use embedded_storage::nor_flash::NorFlash;

use crate::flash::Page;
use crate::ir::IrLink;
use crate::pixels::{CoarseColor, StatusPixels};
use crate::supervisor::Supervisor;

/// Everything this tile knows about the image it is receiving or serving.
/// One bundle per bootloader run.
pub(crate) struct ImageState {
    /// Advertised page count; 0 until a source is locked in.
    pub(crate) total_pages: u8,
    /// The page still needed. Strictly increasing; one past `total_pages`
    /// once the image is fully received.
    pub(crate) next_page: u8,
    /// Face the first accepted SEED arrived on. `None` means this tile is
    /// the root and its built-in image is the source of truth.
    pub(crate) source_face: Option<usize>,
    /// Whole-image checksum latched from the first accepted SEED (or
    /// computed locally by the root) and never changed afterwards.
    pub(crate) image_checksum: u16,
}

impl ImageState {
    /// Fresh download-mode state: nothing latched, nothing burned.
    pub(crate) const fn empty() -> Self {
        Self {
            total_pages: 0,
            next_page: 0,
            source_face: None,
            image_checksum: 0,
        }
    }

    /// Root state: full image already in the active slot, receive role
    /// already terminal.
    pub(crate) const fn root(image_checksum: u16) -> Self {
        Self {
            total_pages: MAX_PAGES,
            next_page: MAX_PAGES + 1,
            source_face: None,
            image_checksum,
        }
    }

    /// A source is locked in once the first SEED sets the page count.
    pub(crate) fn has_source(&self) -> bool {
        self.total_pages != 0
    }

    /// Terminal for the receive role.
    pub(crate) fn receive_complete(&self) -> bool {
        self.next_page > self.total_pages
    }

    fn latch(&mut self, face: usize, pages: u8, image_checksum: u16) {
        self.total_pages = pages;
        self.image_checksum = image_checksum;
        self.source_face = Some(face);
        self.next_page = 0;
    }

    /// Account one accepted page. Returns true when it was the last one and
    /// `next_page` has stepped into the sentinel region.
    fn advance(&mut self) -> bool {
        self.next_page += 1;
        if self.next_page == self.total_pages {
            self.next_page += 1;
            return true;
        }
        false
    }
}

impl<F, L, P> Supervisor<'_, F, L, P>
where
    F: NorFlash,
    L: IrLink,
    P: StatusPixels,
{
    /// A SEED is an invitation: the sender is listening for our PULL right
    /// now, so answering here cannot collide with its transmitter.
    pub(crate) fn handle_seed(&mut self, face: usize, pages: u8, image_checksum: u16) {
        if self.image.receive_complete() {
            // Done receiving; late invitations are noise.
            return;
        }
        if !self.image.has_source() {
            // A usable image has at least one page and fits the slot.
            if pages == 0 || pages > MAX_PAGES {
                trace!("face {} advertised {} pages, ignoring", face, pages);
                return;
            }
            self.image.latch(face, pages, image_checksum);
            self.rotation.start_from(face);
            info!(
                "locked source face {}, {} pages, image checksum {}",
                face, pages, image_checksum
            );
            self.pixels.set_all(CoarseColor::OFF);
            self.pixels.set(face, CoarseColor::BLUE);
        }
        self.send_pull();
    }

    /// A PUSH only counts if it carries exactly the page we are waiting for;
    /// anything else is left for the resend cycle to repair.
    pub(crate) fn handle_push(&mut self, face: usize, page: u8, data: &Page) {
        if !self.image.has_source() || page != self.image.next_page {
            // Duplicate or out of order. The next SEED from our source will
            // prompt a fresh PULL for the right page.
            self.pixels.set(face, CoarseColor::ORANGE);
            return;
        }
        if self.flash.burn_page(page, data).is_err() {
            warn!("page {} burn failed", page);
            self.pixels.set(face, CoarseColor::RED);
            return;
        }
        debug!("page {} burned from face {}", page, face);
        if self.image.advance() {
            info!("download complete, {} pages", self.image.total_pages);
            self.pixels.set_all(CoarseColor::BLUE);
        } else {
            // Pulse green with each page that gets us closer.
            let shade = if self.image.next_page & 1 == 1 {
                CoarseColor::GREEN
            } else {
                CoarseColor::DIM_GREEN
            };
            self.pixels.set(face, shade);
        }
        self.countdowns.reset_done();
    }
}
