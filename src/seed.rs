// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Serve half of the propagation protocol: periodic SEED emission on the
//! staggered face rotation, and answering PULLs with the requested page.

use consts::{FACE_COUNT, PAGE_SIZE};
use embedded_storage::nor_flash::NorFlash;

use crate::ir::{self, IrLink};
use crate::pixels::{CoarseColor, StatusPixels};
use crate::supervisor::Supervisor;

/// Faces in seeding order, staggered so consecutive offers land away from
/// each other and the download wavefront fans out across the mesh instead of
/// funneling through one tile.
const STAGGERED_FACES: [usize; FACE_COUNT] = [2, 3, 4, 5, 1, 0];

/// Walks the staggered permutation, one face per SEED.
pub(crate) struct SeedRotation {
    next_face: usize,
}

impl SeedRotation {
    pub(crate) const fn new() -> Self {
        Self {
            next_face: STAGGERED_FACES[0],
        }
    }

    /// Start seeding as far from our own source as the table allows, to
    /// spread the distribution away from the direction it came from.
    pub(crate) fn start_from(&mut self, source_face: usize) {
        self.next_face = STAGGERED_FACES[source_face];
    }

    /// Face to seed now; the rotation then moves on.
    pub(crate) fn advance(&mut self) -> usize {
        let face = self.next_face;
        self.next_face = STAGGERED_FACES[face];
        face
    }
}

impl<F, L, P> Supervisor<'_, F, L, P>
where
    F: NorFlash,
    L: IrLink,
    P: StatusPixels,
{
    /// Emit a SEED when the pause has run out, but never before at least one
    /// page has landed: a tile must not advertise capacity it does not have.
    pub(crate) fn maybe_emit_seed(&mut self) {
        if !self.countdowns.seed_due() || self.image.next_page == 0 {
            return;
        }
        let face = self.rotation.advance();
        let pkt = ir_protocol::encode_seed(self.image.total_pages, self.image.image_checksum);
        if !ir::send_packet(&mut self.link, face, &pkt) {
            self.pixels.set(face, CoarseColor::CYAN);
        }
        self.countdowns.reset_next_seed();
    }

    /// Ask our source for the page we still need.
    pub(crate) fn send_pull(&mut self) {
        let Some(face) = self.image.source_face else {
            return;
        };
        let pkt = ir_protocol::encode_pull(self.image.next_page);
        if !ir::send_packet(&mut self.link, face, &pkt) {
            self.pixels.set(face, CoarseColor::CYAN);
        }
    }

    /// Serve a PULL if we hold the requested page. A PULL we cannot serve
    /// gets no reply at all; the puller recovers through our next SEED.
    pub(crate) fn handle_pull(&mut self, face: usize, page: u8) {
        // next_page runs one past the count once receive is complete.
        let held_pages = self.image.next_page.min(self.image.total_pages);
        if page >= held_pages {
            return;
        }
        self.send_push_page(face, page);
        // Offer again right away so the puller can chain its next request
        // instead of waiting out the seed pause.
        self.countdowns.trigger_next_seed_now();
        // As long as pulls keep coming, someone still needs us.
        self.countdowns.reset_done();
    }

    fn send_push_page(&mut self, face: usize, page: u8) {
        let mut data = [0u8; PAGE_SIZE];
        if self.flash.read_page(page, &mut data).is_err() {
            error!("page {} read failed, dropping pull", page);
            return;
        }
        let pkt = ir_protocol::encode_push(page, &data);
        if ir::send_packet(&mut self.link, face, &pkt) {
            debug!("pushed page {} to face {}", page, face);
            // Alternate tints so serving traffic is visible.
            let tint = if page & 1 == 1 {
                CoarseColor::MAGENTA
            } else {
                CoarseColor::DIM_MAGENTA
            };
            self.pixels.set(face, tint);
        } else {
            self.pixels.set(face, CoarseColor::CYAN);
        }
    }
}
