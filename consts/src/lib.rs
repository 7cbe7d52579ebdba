#![no_std]

/// Number of IR faces on a tile. A face is the only identity a neighbor has:
/// there are no addresses on this mesh.
pub const FACE_COUNT: usize = 6;

/// Flash page size in bytes. Fixed by hardware; also the erase/write unit and
/// the payload size of one PUSH packet.
pub const PAGE_SIZE: usize = 128;

/// Flash starting address of the active game slot. The game entry point sits
/// at the very bottom, so a successful handoff is a jump to this address.
pub const ACTIVE_BASE: u32 = 0x0000;

/// Flash starting address of the built-in game slot. Immutable factory image,
/// copied down into the active slot when this tile is the seed root.
pub const BUILT_IN_BASE: u32 = 0x1C00;

/// Flash starting address of the bootloader region. Fixed by hardware fuses.
/// Interrupt vectors must be relocated here before any page burn.
pub const BOOTLOADER_BASE: u32 = 0x3800;

/// Capacity of the active game slot in bytes.
pub const ACTIVE_SLOT_SIZE: u32 = 0x3800;

/// Largest image we will ever advertise or accept, in pages.
pub const MAX_PAGES: u8 = (ACTIVE_SLOT_SIZE / PAGE_SIZE as u32) as u8;

/// Number of pages the built-in slot can hold.
pub const BUILT_IN_PAGES: u8 = ((BOOTLOADER_BASE - BUILT_IN_BASE) / PAGE_SIZE as u32) as u8;

/// Fine timer callback period in microseconds.
pub const TICK_US: u32 = 256;

/// Fine ticks per coarse countdown step. Chosen so the prescaler and both
/// countdowns fit in single bytes, which is all the target can load or store
/// atomically.
pub const TICKS_PER_COUNT: u32 = 256;

/// One coarse countdown step in microseconds (about 65 ms).
pub const COUNT_US: u32 = TICK_US * TICKS_PER_COUNT;

/// Convert a millisecond delay to coarse countdown steps, rounding up so a
/// timeout is never shorter than asked for.
pub const fn ms_to_counts(ms: u32) -> u8 {
    ((ms * 1000) / COUNT_US + 1) as u8
}

/// Pause between SEED emissions. Long enough for the neighbor to hear the
/// offer and get a PULL back to us before we move on to the next face.
pub const SEED_INTERVAL_COUNTS: u8 = ms_to_counts(100);

/// Quiescence timeout. Long enough to survive several consecutive rounds of
/// a busy neighbor servicing other tiles' PULLs before getting back to us.
pub const DONE_TIMEOUT_COUNTS: u8 = ms_to_counts(10_000);

/// Value the invocation glue leaves in the boot request register when the
/// user asked for seed-only mode. Any other value means download mode.
pub const SEED_BOOT_REQUEST: u8 = b'S';
