// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Seam to the IR byte driver, plus the single-slot mailbox the driver's
//! receive ISR uses to hand completed packets to the supervisor loop.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ir_protocol::MAX_PACKET_LEN;

/// The per-face IR transceivers as the supervisor sees them.
///
/// Reception is non-blocking: the driver parks at most one completed packet
/// per face and holds it until [`consume`](IrLink::consume). If another
/// packet finishes while a face's slot is still occupied the driver drops
/// one; the protocol tolerates loss.
pub trait IrLink {
    /// Completed packet waiting on `face`, if any. The bytes stay valid until
    /// `consume` is called for this face.
    fn inbound(&self, face: usize) -> Option<&[u8]>;

    /// Release the face's receive slot so the driver can fill it again.
    fn consume(&mut self, face: usize);

    /// Claim the face's transmitter. Returns `false` if it is busy (for
    /// example mid-receive, the link being half duplex); the caller abandons
    /// the send and waits for the next periodic opportunity.
    fn send_begin(&mut self, face: usize) -> bool;

    /// Queue one byte. Only valid between a successful
    /// [`send_begin`](IrLink::send_begin) and
    /// [`send_complete`](IrLink::send_complete).
    fn send_byte(&mut self, byte: u8);

    /// Finish the frame and release the transmitter.
    fn send_complete(&mut self);
}

/// Transmit one complete wire image on `face`. Returns `false` if the
/// transmitter was busy and nothing was sent.
pub(crate) fn send_packet<L: IrLink>(link: &mut L, face: usize, bytes: &[u8]) -> bool {
    if !link.send_begin(face) {
        return false;
    }
    for &b in bytes {
        link.send_byte(b);
    }
    link.send_complete();
    true
}

/// Single-slot hand-off cell between a face's receive ISR (producer) and the
/// supervisor loop (consumer).
///
/// The contract that makes the lock-free sharing sound: the producer only
/// touches the buffer while `ready` is clear, the consumer only while it is
/// set, and each side is a single context.
pub struct FaceMailbox<const N: usize = MAX_PACKET_LEN> {
    buf: UnsafeCell<[u8; N]>,
    len: AtomicUsize,
    ready: AtomicBool,
}

impl<const N: usize> FaceMailbox<N> {
    pub const fn new() -> Self {
        Self {
            buf: UnsafeCell::new([0; N]),
            len: AtomicUsize::new(0),
            ready: AtomicBool::new(false),
        }
    }

    /// Producer borrows the buffer to assemble a packet. `None` while the
    /// consumer still owns the previous one; the driver then drops the new
    /// packet on the floor.
    pub fn fill(&self) -> Option<&mut [u8; N]> {
        if self.ready.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: only the producer touches the buffer until fill_done
        Some(unsafe { &mut *self.buf.get() })
    }

    /// Producer publishes `len` assembled bytes.
    pub fn fill_done(&self, len: usize) {
        self.len.store(len.min(N), Ordering::Release);
        self.ready.store(true, Ordering::Release);
    }

    /// Consumer reads the parked packet, if one is ready.
    pub fn peek(&self) -> Option<&[u8]> {
        if !self.ready.load(Ordering::Acquire) {
            return None;
        }
        let len = self.len.load(Ordering::Acquire);
        // SAFETY: producer leaves the buffer alone while ready is set
        let buf = unsafe { &*self.buf.get() };
        Some(&buf[..len])
    }

    /// Consumer releases the slot back to the producer.
    pub fn consume(&self) {
        self.ready.store(false, Ordering::Release);
    }
}

impl<const N: usize> Default for FaceMailbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

// Safety: SPSC only — one ISR producer, one foreground consumer.
unsafe impl<const N: usize> Sync for FaceMailbox<N> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_off_cycle() {
        let mailbox: FaceMailbox<8> = FaceMailbox::new();
        assert!(mailbox.peek().is_none());

        let buf = mailbox.fill().expect("slot starts free");
        buf[..3].copy_from_slice(&[1, 2, 3]);
        mailbox.fill_done(3);

        // Producer is locked out until the consumer releases the slot.
        assert!(mailbox.fill().is_none());
        assert_eq!(mailbox.peek(), Some(&[1, 2, 3][..]));
        // Peeking does not consume.
        assert_eq!(mailbox.peek(), Some(&[1, 2, 3][..]));

        mailbox.consume();
        assert!(mailbox.peek().is_none());
        assert!(mailbox.fill().is_some());
    }

    #[test]
    fn oversize_len_is_clamped() {
        let mailbox: FaceMailbox<4> = FaceMailbox::new();
        mailbox.fill().expect("free");
        mailbox.fill_done(100);
        assert_eq!(mailbox.peek().expect("ready").len(), 4);
    }
}
