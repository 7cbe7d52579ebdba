// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Wire codec for the three-message game propagation protocol spoken over
//! the per-face IR links.
//!
//! Every packet is a header byte, a fixed-shape payload, and a trailing
//! 8-bit checksum: the unsigned sum of the header and payload bytes with all
//! bits inverted. The inversion means a run of zeros on the wire can never
//! verify as a packet. A packet is accepted only if its length matches the
//! expected total for its header *and* the recomputed checksum matches the
//! trailing byte; everything else is dropped without a reply, because the
//! protocol recovers lost packets through the periodic SEED/PULL cycle.

#![no_std]

use consts::PAGE_SIZE;
use heapless::Vec;


/// Header byte of a SEED packet: an invitation declaring image size and
/// whole-image checksum.
pub const SEED_HEADER: u8 = 0x6A;

/// Header byte of a PULL packet: a request naming the page the sender wants.
pub const PULL_HEADER: u8 = 0x5D;

/// Header byte of a PUSH packet: one flash page plus its page index.
pub const PUSH_HEADER: u8 = 0xA5;

/// On-wire length of a SEED packet: header, page count, image checksum low
/// byte, image checksum high byte, packet checksum.
pub const SEED_LEN: usize = 5;

/// On-wire length of a PULL packet: header, page index, packet checksum.
pub const PULL_LEN: usize = 3;

/// On-wire length of a PUSH packet: header, one page of data, page index,
/// packet checksum.
pub const PUSH_LEN: usize = PAGE_SIZE + 3;

/// Largest packet that can ever arrive; sizes the per-face receive buffers.
pub const MAX_PACKET_LEN: usize = PUSH_LEN;

/// Checksum over a packet's header and payload bytes: wrapping 8-bit sum,
/// then inverted.
pub fn packet_checksum(bytes: &[u8]) -> u8 {
    let mut sum: u8 = 0;
    for &b in bytes {
        sum = sum.wrapping_add(b);
    }
    sum ^ 0xFF
}

/// Why an inbound byte run was not accepted as a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// First byte is none of the three known headers.
    Header,
    /// Wrong total length for the packet's header byte.
    Length,
    /// Trailing checksum byte does not match the contents.
    Checksum,
}

/// A validated inbound packet, borrowing payload bytes from the receive
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Packet<'a> {
    Seed { pages: u8, image_checksum: u16 },
    Pull { page: u8 },
    Push { page: u8, data: &'a [u8; PAGE_SIZE] },
}

/// Expected total packet length for a header byte, `None` for an unknown
/// header.
pub fn expected_len(header: u8) -> Option<usize> {
    match header {
        SEED_HEADER => Some(SEED_LEN),
        PULL_HEADER => Some(PULL_LEN),
        PUSH_HEADER => Some(PUSH_LEN),
        _ => None,
    }
}

impl<'a> Packet<'a> {
    /// Validate length and checksum for `bytes` and expose the typed payload.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        let &header = bytes.first().ok_or(DecodeError::Length)?;
        let expected = expected_len(header).ok_or(DecodeError::Header)?;
        if bytes.len() != expected {
            return Err(DecodeError::Length);
        }
        let (&checksum, body) = bytes.split_last().expect("length checked above");
        if packet_checksum(body) != checksum {
            return Err(DecodeError::Checksum);
        }
        Ok(match header {
            SEED_HEADER => Packet::Seed {
                pages: bytes[1],
                image_checksum: u16::from_le_bytes([bytes[2], bytes[3]]),
            },
            PULL_HEADER => Packet::Pull { page: bytes[1] },
            _ => Packet::Push {
                page: bytes[1 + PAGE_SIZE],
                data: bytes[1..1 + PAGE_SIZE]
                    .try_into()
                    .expect("length checked above"),
            },
        })
    }
}

/// Build a complete SEED wire image. The 16-bit image checksum goes out low
/// byte first.
pub fn encode_seed(pages: u8, image_checksum: u16) -> Vec<u8, SEED_LEN> {
    let [lo, hi] = image_checksum.to_le_bytes();
    let mut out = Vec::new();
    out.extend_from_slice(&[SEED_HEADER, pages, lo, hi])
        .expect("fits");
    seal(out)
}

/// Build a complete PULL wire image.
pub fn encode_pull(page: u8) -> Vec<u8, PULL_LEN> {
    let mut out = Vec::new();
    out.extend_from_slice(&[PULL_HEADER, page]).expect("fits");
    seal(out)
}

/// Build a complete PUSH wire image. The page index trails the data so both
/// sides can fold it into a running checksum.
pub fn encode_push(page: u8, data: &[u8; PAGE_SIZE]) -> Vec<u8, PUSH_LEN> {
    let mut out = Vec::new();
    out.push(PUSH_HEADER).expect("fits");
    out.extend_from_slice(data).expect("fits");
    out.push(page).expect("fits");
    seal(out)
}

fn seal<const N: usize>(mut out: Vec<u8, N>) -> Vec<u8, N> {
    let checksum = packet_checksum(&out);
    out.push(checksum).expect("capacity reserves the checksum byte");
    out
}
