// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Coarse countdown timekeeping derived from the fine timer callback.
//!
//! The fine timer fires every ~256 µs; a 256-step prescaler divides that
//! into ~65 ms coarse steps, on which both countdowns tick down and stop at
//! zero. Everything is a single byte because byte loads and stores are the
//! only accesses the target performs atomically; the ISR decrements, the
//! foreground resets, and a decrement lost to a concurrent reset is
//! harmless.

use core::sync::atomic::{AtomicU8, Ordering};

use consts::{DONE_TIMEOUT_COUNTS, SEED_INTERVAL_COUNTS};

/// The two propagation countdowns, shared between the timer ISR and the
/// supervisor loop.
pub struct Countdowns {
    prescaler: AtomicU8,
    until_next_seed: AtomicU8,
    until_done: AtomicU8,
}

impl Countdowns {
    pub const fn new() -> Self {
        Self {
            prescaler: AtomicU8::new(0),
            until_next_seed: AtomicU8::new(0),
            until_done: AtomicU8::new(0),
        }
    }

    /// Fine timer ISR hook; call every ~256 µs.
    pub fn on_tick(&self) {
        // Wraps 0 -> 255, so a coarse step passes every 256 calls.
        if self.prescaler.fetch_sub(1, Ordering::Relaxed) != 1 {
            return;
        }
        self.coarse_tick();
    }

    pub(crate) fn coarse_tick(&self) {
        Self::saturating_dec(&self.until_next_seed);
        Self::saturating_dec(&self.until_done);
    }

    fn saturating_dec(cell: &AtomicU8) {
        let v = cell.load(Ordering::Relaxed);
        if v != 0 {
            cell.store(v - 1, Ordering::Relaxed);
        }
    }

    /// True once the seed pause has elapsed.
    pub fn seed_due(&self) -> bool {
        self.until_next_seed.load(Ordering::Relaxed) == 0
    }

    /// True once the quiescence timeout has elapsed.
    pub fn done(&self) -> bool {
        self.until_done.load(Ordering::Relaxed) == 0
    }

    pub fn reset_next_seed(&self) {
        self.until_next_seed
            .store(SEED_INTERVAL_COUNTS, Ordering::Relaxed);
    }

    /// Make the next supervisor pass emit a seed immediately, without
    /// waiting out the pause. Used right after servicing a PULL so the
    /// puller can chain its next request.
    pub fn trigger_next_seed_now(&self) {
        self.until_next_seed.store(0, Ordering::Relaxed);
    }

    pub fn reset_done(&self) {
        self.until_done.store(DONE_TIMEOUT_COUNTS, Ordering::Relaxed);
    }
}

impl Default for Countdowns {
    fn default() -> Self {
        Self::new()
    }
}
