//! Fixed sizes and bit patterns shared across the decoder.

/// Number of scaler slots (modules) tracked per crate.
pub const NUM_SLOTS: usize = 12;
/// Number of channels carried by one scaler slot.
pub const CHANNELS_PER_SLOT: usize = 32;
/// Total size of one snapshot of the scaler store.
pub const STORE_SIZE: usize = NUM_SLOTS * CHANNELS_PER_SLOT;

/// Top 12 bits of a bank header word identify the crate.
pub const HEADER_MASK: u32 = 0xfff0_0000;
/// The middle byte of a bank header word must be zero.
pub const HEADER_RESERVED_MASK: u32 = 0x0000_ff00;
/// Slot number field of a bank header word.
pub const HEADER_SLOT_MASK: u32 = 0x000f_0000;
pub const HEADER_SLOT_SHIFT: u32 = 16;
/// Channel count field of a bank header word.
pub const HEADER_NCHAN_MASK: u32 = 0x0000_00ff;

/// Event type tag of a dedicated scaler event.
pub const SCALER_EVENT_TYPE: u16 = 140;
/// Physics triggers occupy this range of event type tags.
pub const PHYSICS_TRIGGER_MIN: u16 = 1;
pub const PHYSICS_TRIGGER_MAX: u16 = 14;

/// Events longer than this are treated as corrupted and skipped.
/// A normal scaler event is on the order of 300 words.
pub const MAX_EVENT_LENGTH: usize = 10000;

/// Largest event buffer the file transport will hand out, in words.
pub const MAX_BUFFER_WORDS: usize = 100_000;

/// Number of counter blocks in one online server reply.
pub const ONLINE_MAX_BLOCKS: usize = 20;
/// Size of the per-slot message field in the online protocol.
pub const ONLINE_MSG_SIZE: usize = 50;
/// Number of counter words in one online server exchange.
pub const ONLINE_NUM_COUNTS: usize = 16 * ONLINE_MAX_BLOCKS;
/// The online reply is accumulated over at most this many reads.
pub const ONLINE_READ_RETRIES: usize = 50;

/// Channels served by one FADC module.
pub const FADC_CHANNELS: usize = 16;
