//! Segment lifecycle: create, attach, detach, destroy.
//!
//! A [`Segment`] is one process-local mapping of a named POSIX shared
//! memory object holding a ring. The daemon creates and eventually destroys
//! the name; any number of processes attach to and detach from it in
//! between. Destroying removes only the name - existing mappings stay
//! valid until each attacher unmaps.

use crate::error::{ShmError, ShmResult};
use crate::layout::{RingHeader, Slot, RING_MAGIC, RING_VERSION, segment_size, SLOTS_OFFSET};
use memmap2::MmapMut;
use nix::fcntl::OFlag;
use nix::sys::mman;
use nix::sys::stat::Mode;
use nix::unistd;
use std::fs::File;
use std::mem::size_of;
use std::os::fd::AsRawFd;
use std::os::fd::OwnedFd;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// One mapped shared memory segment.
///
/// Dropping a `Segment` unmaps it from this process (detach); the named
/// object keeps existing until [`Segment::destroy`] removes the name.
pub struct Segment {
    /// Segment name, e.g. `"/aether_prices"`.
    name: String,
    /// Raw pointer to the start of the mapped region (header location).
    base: *mut u8,
    /// Total mapped size in bytes.
    map_len: usize,
    /// Owns the mmap lifetime; unmaps on drop.
    _map: MmapMut,
}

// SAFETY: the only mutable state in the mapping is reached through atomics
// (`write_seq`, per-slot `sequence`) or through plain stores that the
// release/acquire protocol on `sequence` orders. The mapping itself lives
// as long as the struct.
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

impl Segment {
    /// Create a new named segment and initialise its ring.
    ///
    /// Fails with [`ShmError::SegmentExists`] if the name is already
    /// present - callers that own the namespace (the daemon) unlink stale
    /// names first. On any failure after the name exists, the name is
    /// unlinked before the error is returned.
    ///
    /// Every slot's `sequence` starts at its own index `i`, the highest
    /// value that is still "not yet written" for every sequence number
    /// mapping to the slot: a consumer waiting for sequence `s > i` on
    /// that slot reads `i < s` as not-ready until the producer that
    /// claimed `s` completes its release store.
    pub fn create(name: &str, capacity: u32) -> ShmResult<Self> {
        if capacity == 0 {
            return Err(ShmError::InvalidCapacity { capacity });
        }

        // O_EXCL: detect leftovers from a previous crash instead of
        // silently reusing them.
        let fd = mman::shm_open(
            name,
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR, // 0o600
        )
        .map_err(|e| match e {
            nix::errno::Errno::EEXIST => ShmError::SegmentExists {
                name: name.to_string(),
            },
            e => ShmError::Os {
                name: name.to_string(),
                source: e,
            },
        })?;

        // From here on the name exists; clean it up on any failure.
        match Self::init_mapping(name, capacity, fd) {
            Ok(segment) => Ok(segment),
            Err(e) => {
                let _ = mman::shm_unlink(name);
                Err(e)
            }
        }
    }

    fn init_mapping(name: &str, capacity: u32, fd: OwnedFd) -> ShmResult<Self> {
        let size = segment_size(capacity);

        // A fresh shm object has size 0; without this, touching the
        // mapping would fault. ftruncate also zero-fills the region, so
        // slot payload areas start out zeroed.
        unistd::ftruncate(&fd, size as libc::off_t).map_err(|e| ShmError::Os {
            name: name.to_string(),
            source: e,
        })?;

        let file = File::from(fd);
        // SAFETY: the object was just created with O_EXCL and sized above;
        // no other process can have mapped it yet.
        let mut map = unsafe { MmapMut::map_mut(&file)? };
        let base = map.as_mut_ptr();

        // SAFETY: the region is sized for one header plus `capacity` slots
        // and this process has exclusive access until the function returns.
        unsafe {
            let hdr = base as *mut RingHeader;
            ptr::write(
                hdr,
                RingHeader {
                    magic: RING_MAGIC,
                    version: RING_VERSION,
                    capacity,
                    write_seq: AtomicU64::new(0),
                },
            );

            let slots = base.add(SLOTS_OFFSET) as *mut Slot;
            for i in 0..capacity as u64 {
                // payload_len and data are already zeroed by ftruncate;
                // only the sequence sentinel needs an explicit store.
                (*slots.add(i as usize)).sequence.store(i, Ordering::Relaxed);
            }
        }

        debug!("created segment {} ({} slots, {} bytes)", name, capacity, size);

        Ok(Self {
            name: name.to_string(),
            base,
            map_len: size,
            _map: map,
        })
    }

    /// Attach to an existing named segment.
    ///
    /// The mapping size comes from the underlying object's metadata and is
    /// cross-checked against the size derived from the header's capacity.
    /// `magic` and `version` are validated before the mapping is handed
    /// out; on any mismatch the mapping is released and an error returned.
    /// Never touches `write_seq` or any slot.
    pub fn attach(name: &str) -> ShmResult<Self> {
        let fd = mman::shm_open(name, OFlag::O_RDWR, Mode::empty()).map_err(|e| match e {
            nix::errno::Errno::ENOENT => ShmError::NotFound {
                name: name.to_string(),
            },
            e => ShmError::Os {
                name: name.to_string(),
                source: e,
            },
        })?;

        let stat = nix::sys::stat::fstat(fd.as_raw_fd()).map_err(|e| ShmError::Os {
            name: name.to_string(),
            source: e,
        })?;
        let file_size = stat.st_size as usize;
        if file_size < size_of::<RingHeader>() {
            return Err(ShmError::SizeMismatch {
                name: name.to_string(),
                expected: size_of::<RingHeader>(),
                actual: file_size,
            });
        }

        let file = File::from(fd);
        // SAFETY: the mapping is shared by design; all concurrent access
        // goes through the atomic publication protocol.
        let mut map = unsafe { MmapMut::map_mut(&file)? };
        let base = map.as_mut_ptr();

        // Validate before trusting any of the mapped data. Dropping `map`
        // on the error paths releases the mapping.
        // SAFETY: the region holds at least one RingHeader (checked above).
        let hdr = unsafe { &*(base as *const RingHeader) };
        if hdr.magic != RING_MAGIC {
            return Err(ShmError::InvalidMagic {
                name: name.to_string(),
            });
        }
        if hdr.version != RING_VERSION {
            return Err(ShmError::VersionMismatch {
                name: name.to_string(),
                expected: RING_VERSION,
                actual: hdr.version,
            });
        }
        if hdr.capacity == 0 {
            return Err(ShmError::InvalidCapacity {
                capacity: hdr.capacity,
            });
        }
        // The size derived from the header must agree with the object's
        // actual size - a mismatch means a truncated or foreign segment.
        let expected = segment_size(hdr.capacity);
        if expected != map.len() {
            return Err(ShmError::SizeMismatch {
                name: name.to_string(),
                expected,
                actual: map.len(),
            });
        }

        debug!("attached segment {} ({} slots)", name, hdr.capacity);

        Ok(Self {
            name: name.to_string(),
            base,
            map_len: map.len(),
            _map: map,
        })
    }

    /// Remove the segment name.
    ///
    /// Mappings held by any process (including this one) remain valid
    /// until individually dropped; no new process can attach afterwards.
    pub fn destroy(name: &str) -> ShmResult<()> {
        mman::shm_unlink(name).map_err(|e| match e {
            nix::errno::Errno::ENOENT => ShmError::NotFound {
                name: name.to_string(),
            },
            e => ShmError::Os {
                name: name.to_string(),
                source: e,
            },
        })
    }

    /// Remove a possibly-present stale name, ignoring "not found".
    ///
    /// Used before [`Segment::create`] to clear leftovers from a crashed
    /// predecessor.
    pub fn unlink_stale(name: &str) {
        let _ = mman::shm_unlink(name);
    }

    /// The segment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total mapped size in bytes.
    pub fn len(&self) -> usize {
        self.map_len
    }

    /// Whether the mapping is empty (never true for a valid segment).
    pub fn is_empty(&self) -> bool {
        self.map_len == 0
    }

    /// Ring capacity in slots.
    pub fn capacity(&self) -> u32 {
        self.header().capacity
    }

    /// Current value of the publication counter.
    ///
    /// This equals the total number of messages ever published to the
    /// segment. The relaxed load makes it a statistic, not a
    /// synchronisation point.
    pub fn write_seq(&self) -> u64 {
        self.header().write_seq.load(Ordering::Relaxed)
    }

    /// The mapped ring header.
    pub fn header(&self) -> &RingHeader {
        // SAFETY: base points at a validated RingHeader for the lifetime
        // of the mapping.
        unsafe { &*(self.base as *const RingHeader) }
    }

    /// Raw pointer to the slot a sequence number maps to.
    pub(crate) fn slot_ptr(&self, seq: u64) -> *mut Slot {
        let idx = (seq % self.capacity() as u64) as usize;
        // SAFETY: idx < capacity, and the mapping holds `capacity` slots
        // starting at SLOTS_OFFSET.
        unsafe { (self.base.add(SLOTS_OFFSET) as *mut Slot).add(idx) }
    }
}
