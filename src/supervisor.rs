// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Top-level propagation loop.
//!
//! Drains the per-face inboxes, dispatches each packet to the download or
//! serve half, keeps the seed rotation fed, and watches the quiescence
//! timeout. On expiry it re-verifies the whole image and tells the caller
//! whether the active slot is safe to enter.

use consts::{FACE_COUNT, MAX_PAGES, SEED_BOOT_REQUEST};
use embedded_storage::nor_flash::NorFlash;
use ir_protocol::{Packet, MAX_PACKET_LEN};

use crate::download::ImageState;
use crate::flash::FlashService;
use crate::ir::IrLink;
use crate::pixels::{CoarseColor, StatusPixels};
use crate::seed::SeedRotation;
use crate::ticks::Countdowns;

/// What the invocation glue asked for, decoded from the boot request
/// register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootMode {
    /// Copy the built-in game down and distribute it.
    Seed,
    /// Wait for a neighbor's SEED and download from it.
    Download,
}

impl BootMode {
    pub fn from_request(flag: u8) -> Self {
        if flag == SEED_BOOT_REQUEST {
            BootMode::Seed
        } else {
            BootMode::Download
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The active slot holds a verified image. The caller resets the vector
    /// table to the application region and jumps to the slot entry point.
    Launch,
    /// Incomplete or corrupt image; the caller must not enter the active
    /// slot. Halt for the watchdog, or fall back to the built-in game.
    Failed,
}

pub struct Supervisor<'a, F, L, P> {
    pub(crate) flash: FlashService<F>,
    pub(crate) link: L,
    pub(crate) pixels: P,
    pub(crate) countdowns: &'a Countdowns,
    pub(crate) image: ImageState,
    pub(crate) rotation: SeedRotation,
}

impl<'a, F, L, P> Supervisor<'a, F, L, P>
where
    F: NorFlash,
    L: IrLink,
    P: StatusPixels,
{
    pub fn new(flash: F, link: L, pixels: P, countdowns: &'a Countdowns) -> Self {
        Self {
            flash: FlashService::new(flash),
            link,
            pixels,
            countdowns,
            image: ImageState::empty(),
            rotation: SeedRotation::new(),
        }
    }

    /// Run propagation to quiescence. Interrupt vectors must already be
    /// relocated to the bootloader region and the IR/pixel/timer ISRs wired
    /// up before entry.
    pub fn run(&mut self, mode: BootMode) -> Outcome {
        if self.start(mode).is_err() {
            error!("built-in copy failed");
            self.pixels.set_all(CoarseColor::RED);
            return Outcome::Failed;
        }
        loop {
            if let Some(outcome) = self.poll() {
                return outcome;
            }
        }
    }

    /// Prepare for the requested mode. Must run once before the first
    /// [`poll`](Supervisor::poll); [`run`](Supervisor::run) does both.
    pub fn start(&mut self, mode: BootMode) -> Result<(), F::Error> {
        self.pixels.set_all(CoarseColor::ORANGE);
        if mode == BootMode::Seed {
            info!("seed mode requested");
            self.enter_seed_only()?;
        }
        self.countdowns.reset_done();
        Ok(())
    }

    /// One pass of the main loop; `Some` once the quiescence timeout has
    /// expired. Exposed so cooperative integrations can interleave other
    /// work between passes.
    pub fn poll(&mut self) -> Option<Outcome> {
        self.drain_faces();
        self.maybe_emit_seed();
        if !self.countdowns.done() {
            return None;
        }
        Some(self.finish())
    }

    /// Become the root: put the built-in game in the active slot, latch its
    /// checksum, and mark the download already complete so the loop only
    /// serves.
    fn enter_seed_only(&mut self) -> Result<(), F::Error> {
        self.flash.copy_built_in_to_active()?;
        let image_checksum = self.flash.image_checksum(MAX_PAGES)?;
        self.image = ImageState::root(image_checksum);
        info!(
            "seeding {} pages, image checksum {}",
            MAX_PAGES, image_checksum
        );
        Ok(())
    }

    /// Faces are drained in fixed numeric order each pass; fairness comes
    /// from the seed rotation, not from here.
    fn drain_faces(&mut self) {
        let mut buf = [0u8; MAX_PACKET_LEN];
        for face in 0..FACE_COUNT {
            let len = match self.link.inbound(face) {
                Some(bytes) => {
                    let len = bytes.len().min(MAX_PACKET_LEN);
                    buf[..len].copy_from_slice(&bytes[..len]);
                    len
                }
                None => continue,
            };
            self.link.consume(face);
            self.dispatch(face, &buf[..len]);
        }
    }

    fn dispatch(&mut self, face: usize, bytes: &[u8]) {
        match Packet::parse(bytes) {
            Ok(Packet::Seed {
                pages,
                image_checksum,
            }) => self.handle_seed(face, pages, image_checksum),
            Ok(Packet::Push { page, data }) => self.handle_push(face, page, data),
            Ok(Packet::Pull { page }) => self.handle_pull(face, page),
            Err(e) => {
                trace!("face {} dropped {} bytes: {:?}", face, bytes.len(), e);
                self.pixels.set(face, CoarseColor::RED);
            }
        }
    }

    fn finish(&mut self) -> Outcome {
        if self.image.receive_complete() && self.verify_image() {
            // Alternating colors so success reads at a glance.
            self.pixels.set_all(CoarseColor::GREEN);
            for face in (0..FACE_COUNT).step_by(2) {
                self.pixels.set(face, CoarseColor::BLUE);
            }
            info!("propagation quiesced, launching active slot");
            Outcome::Launch
        } else {
            warn!(
                "propagation failed at page {} of {}",
                self.image.next_page, self.image.total_pages
            );
            self.pixels.set_all(CoarseColor::RED);
            Outcome::Failed
        }
    }

    /// Final integrity gate before anyone jumps into received code: the
    /// burned pages must sum to the checksum the source advertised.
    fn verify_image(&mut self) -> bool {
        match self.flash.image_checksum(self.image.total_pages) {
            Ok(sum) => sum == self.image.image_checksum,
            Err(_) => false,
        }
    }
}
