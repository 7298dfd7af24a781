//! Shared memory binary layout of the broadcast ring.
//!
//! A segment is one `RingHeader` followed immediately by `capacity` slots:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  RingHeader (64 B): magic │ version │ capacity │ write_seq  │
//! ├─────────────────────────────────────────────────────────┤
//! │  Slot[0]: sequence (8B atomic) │ payload_len │ data[4096]  │
//! ├─────────────────────────────────────────────────────────┤
//! │  Slot[1]                                                │
//! ├─────────────────────────────────────────────────────────┤
//! │  ...                                                    │
//! ├─────────────────────────────────────────────────────────┤
//! │  Slot[capacity - 1]                                     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Header and slots are each aligned to a 64-byte cache line so no two of
//! them share a line.

use aether::consts::{CACHE_LINE_SIZE, SLOT_DATA_SIZE};
use static_assertions::{const_assert, const_assert_eq};
use std::mem::size_of;
use std::sync::atomic::AtomicU64;

/// Written into `RingHeader::magic` on initialisation.
///
/// An attach that finds a different value is looking at a stale or
/// foreign segment and must reject it.
pub const RING_MAGIC: u64 = 0xAE7E_4000_DEAD_C0DE;

/// Bump when the layout of `RingHeader` or `Slot` changes incompatibly.
pub const RING_VERSION: u32 = 1;

/// Byte offset of `Slot[0]` within a segment.
pub const SLOTS_OFFSET: usize = size_of::<RingHeader>();

/// Header at offset 0 of every segment.
#[repr(C, align(64))]
pub struct RingHeader {
    /// Must equal [`RING_MAGIC`]. Validated on attach.
    pub magic: u64,

    /// Must equal [`RING_VERSION`]. Validated on attach.
    pub version: u32,

    /// Number of slots in the ring. Set once at creation, never changed.
    pub capacity: u32,

    /// Monotonically increasing publication counter. A producer claims the
    /// next sequence number with an atomic fetch-add; the target slot is
    /// `write_seq % capacity`.
    pub write_seq: AtomicU64,
}

/// One ring entry holding one message.
#[repr(C, align(64))]
pub struct Slot {
    /// Publication marker, stored by the producer after the payload with
    /// release ordering. A consumer polling for sequence `s` interprets an
    /// acquire-loaded value `v` as:
    /// - `v == s` - message ready, payload is safe to read
    /// - `v <  s` - slot not yet written at this round
    /// - `v >  s` - the consumer was lapped, the message is gone
    pub sequence: AtomicU64,

    /// Valid byte count in `data`. Always `<= SLOT_DATA_SIZE`.
    pub payload_len: u32,

    /// Raw message bytes. Only the first `payload_len` bytes are valid.
    pub data: [u8; SLOT_DATA_SIZE],
}

/// Total bytes of a segment holding one header and `capacity` slots.
///
/// This is what gets passed to `ftruncate` at creation and re-derived from
/// `RingHeader::capacity` on attach.
pub const fn segment_size(capacity: u32) -> usize {
    size_of::<RingHeader>() + capacity as usize * size_of::<Slot>()
}

// Layout problems are caught at compile time, not on the first attach.
const_assert_eq!(size_of::<RingHeader>(), CACHE_LINE_SIZE);
const_assert_eq!(std::mem::align_of::<RingHeader>(), CACHE_LINE_SIZE);
const_assert_eq!(size_of::<Slot>() % CACHE_LINE_SIZE, 0);
const_assert_eq!(std::mem::align_of::<Slot>(), CACHE_LINE_SIZE);

// segment_size cannot overflow for any u32 capacity on a 64-bit usize.
const_assert!(
    size_of::<RingHeader>() as u128 + (u32::MAX as u128) * (size_of::<Slot>() as u128)
        <= usize::MAX as u128
);
