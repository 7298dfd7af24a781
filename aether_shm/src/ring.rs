//! Lock-free publish and consume over a mapped segment.
//!
//! The whole cross-process protocol hangs on one release/acquire pair:
//! the producer's release store on `Slot::sequence` and the consumer's
//! acquire load of the same field. Observing `sequence == read_seq` with
//! acquire ordering guarantees visibility of the `payload_len` and `data`
//! stores that preceded the release.
//!
//! Neither operation blocks or allocates. Consumers poll;
//! producers that die before their release store leave a slot that simply
//! never reads as published at that round.

use crate::error::{ShmError, ShmResult};
use crate::segment::Segment;
use aether::consts::SLOT_DATA_SIZE;
use std::ptr;
use std::sync::atomic::Ordering;

/// Outcome of a [`Segment::consume`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumed {
    /// A message was copied into the caller's buffer.
    Message {
        /// Payload length of the message. When the buffer was smaller than
        /// this, only the first `buf.len()` bytes were copied - size the
        /// buffer at [`SLOT_DATA_SIZE`] to rule truncation out.
        len: u32,
    },
    /// The slot at the cursor has not been written this round. Expected
    /// control flow while polling; nothing was mutated.
    Empty,
    /// The producers overwrote the requested message. The cursor has been
    /// advanced to the oldest sequence still in the ring; the next call
    /// may succeed, or report `Lapped` again if the consumer is still
    /// being chased.
    Lapped,
}

/// A consumer's position in a ring.
///
/// Each consumer owns its cursor; there is no coordination between
/// consumers, and the ring itself stores no read positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    read_seq: u64,
}

impl Cursor {
    /// Start at an explicit sequence number.
    ///
    /// The first published message claims sequence 0, so `Cursor::at(0)`
    /// reads from the beginning. First-lap corner case: a producer that
    /// claims a sequence `s < capacity` and stalls before releasing it
    /// leaves the slot's initialisation sentinel equal to `s`, so once
    /// `write_seq` moves past `s` a consumer at `s` reads a zero-length
    /// message instead of waiting. From the second lap on, unreleased
    /// slots always read as [`Consumed::Empty`].
    pub const fn at(seq: u64) -> Self {
        Self { read_seq: seq }
    }

    /// Start at the segment's current write position ("from now").
    ///
    /// Only messages published after this call will be observed.
    pub fn live(segment: &Segment) -> Self {
        // Acquire pairs with publishers' release stores: everything
        // published before this load is excluded, everything after is
        // observable.
        Self {
            read_seq: segment.header().write_seq.load(Ordering::Acquire),
        }
    }

    /// The sequence number this cursor will try to read next.
    pub fn position(&self) -> u64 {
        self.read_seq
    }
}

impl Segment {
    /// Publish one message into the next available slot.
    ///
    /// Safe to call from any number of threads and processes concurrently:
    /// `write_seq` is incremented atomically, so every producer writes a
    /// distinct slot for its claimed sequence number. Returns the claimed
    /// sequence number.
    ///
    /// Fails with [`ShmError::PayloadTooLarge`] when the payload exceeds
    /// [`SLOT_DATA_SIZE`]; nothing is mutated in that case.
    pub fn publish(&self, payload: &[u8]) -> ShmResult<u64> {
        if payload.len() > SLOT_DATA_SIZE {
            return Err(ShmError::PayloadTooLarge {
                len: payload.len(),
                max: SLOT_DATA_SIZE,
            });
        }

        // Relaxed is enough for the claim: only the counter's atomicity
        // matters here. The payload is published by the release below.
        let seq = self.header().write_seq.fetch_add(1, Ordering::Relaxed);
        let slot = self.slot_ptr(seq);

        // SAFETY: `slot` points into the live mapping. The plain stores
        // are ordered before the release store on `sequence`; concurrent
        // consumers only read the payload after acquiring that value.
        unsafe {
            ptr::addr_of_mut!((*slot).payload_len).write(payload.len() as u32);
            ptr::copy_nonoverlapping(
                payload.as_ptr(),
                ptr::addr_of_mut!((*slot).data) as *mut u8,
                payload.len(),
            );
            // The single synchronisation edge: everything above becomes
            // visible to any consumer that acquire-loads this value.
            (*slot).sequence.store(seq, Ordering::Release);
        }

        Ok(seq)
    }

    /// Try to read the message at the cursor's position.
    ///
    /// Non-blocking; polling is the caller's responsibility. On
    /// [`Consumed::Message`] the cursor advances by one; on
    /// [`Consumed::Lapped`] it jumps to the oldest sequence still in the
    /// ring; on [`Consumed::Empty`] nothing changes.
    pub fn consume(&self, cursor: &mut Cursor, buf: &mut [u8]) -> Consumed {
        // Nothing has been published at or past the cursor yet. The relaxed
        // load is advisory - a message landing concurrently is picked up on
        // the next poll. This guard also keeps cursors on a fresh ring from
        // reading the slot initialisation sentinels (`sequence == index`)
        // as zero-length messages.
        if cursor.read_seq >= self.header().write_seq.load(Ordering::Relaxed) {
            return Consumed::Empty;
        }

        let slot = self.slot_ptr(cursor.read_seq);

        // Acquire pairs with the producer's release in `publish`.
        let seq = unsafe { (*slot).sequence.load(Ordering::Acquire) };

        if seq == cursor.read_seq {
            // SAFETY: the acquire above makes the producer's payload
            // stores for this sequence visible.
            let len = unsafe { ptr::addr_of!((*slot).payload_len).read() };
            let copy_len = (len as usize).min(buf.len());
            unsafe {
                ptr::copy_nonoverlapping(
                    ptr::addr_of!((*slot).data) as *const u8,
                    buf.as_mut_ptr(),
                    copy_len,
                );
            }
            cursor.read_seq += 1;
            return Consumed::Message { len };
        }

        if seq < cursor.read_seq {
            return Consumed::Empty;
        }

        // seq > read_seq: lapped. Jump to the oldest live sequence,
        // `write_seq - capacity`. The relaxed load is an advisory hint,
        // not a synchronisation point - the next consume's acquire load
        // re-establishes correctness. Wrapping arithmetic covers the
        // start-up window where write_seq < capacity.
        let write_seq = self.header().write_seq.load(Ordering::Relaxed);
        cursor.read_seq = write_seq.wrapping_sub(self.capacity() as u64);
        Consumed::Lapped
    }
}
