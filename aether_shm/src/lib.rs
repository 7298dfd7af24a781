//! # Aether Shared Memory Ring
//!
//! A lock-free, multi-producer, multi-consumer broadcast ring buffer in
//! named POSIX shared memory. Every subscriber maps the same segment and
//! reads every message; there is no queue-style fan-out. Subscribers may
//! fall arbitrarily behind and the ring overwrites old entries - loss is
//! explicit ([`Consumed::Lapped`]), never silent.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐                               ┌────────────┐
//! │ Publisher  │──┐    shared memory segment   │ Consumer   │
//! │ (any proc) │  │  ┌───────────────────────┐ │ (any proc) │
//! └────────────┘  ├─►│ [Header][Slot 0..N-1] │◄┤            │
//! ┌────────────┐  │  └───────────────────────┘ └────────────┘
//! │ Publisher  │──┘        created and          ┌────────────┐
//! │ (any proc) │           destroyed by aetherd │ Consumer   │
//! └────────────┘                                └────────────┘
//! ```
//!
//! The daemon (`aetherd`) owns one segment per topic and hands out its
//! name over a control socket; [`subscribe`] performs that exchange and
//! attaches. Data traffic never touches the daemon.
//!
//! ## Guarantees
//!
//! - **Per-producer FIFO**: one producer's messages appear in publish
//!   order to any consumer that is not lapped in between.
//! - **No cross-producer ordering**: interleaving follows the atomic claim
//!   order of `write_seq`, not completion order - a slow producer leaves a
//!   transient `Empty` hole at its claimed sequence.
//! - **Crash isolation**: a producer that dies mid-publish leaves no lock
//!   and no torn slot; its slot simply never reads as published at that
//!   round.
//!
//! ## Example
//!
//! ```rust,ignore
//! use aether_shm::{subscribe, Consumed, Cursor};
//! use aether::consts::SLOT_DATA_SIZE;
//!
//! let sub = subscribe("prices")?;
//! sub.publish(b"tick 42")?;
//!
//! let mut cursor = Cursor::at(0);
//! let mut buf = [0u8; SLOT_DATA_SIZE];
//! match sub.consume(&mut cursor, &mut buf) {
//!     Consumed::Message { len } => println!("{:?}", &buf[..len as usize]),
//!     Consumed::Empty => {}
//!     Consumed::Lapped => eprintln!("fell behind, resynced"),
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

#[cfg(not(unix))]
compile_error!("aether_shm requires a Unix-like operating system");

// Sequence numbers and slot markers are shared across processes as plain
// 64-bit atomics; a platform that needs a lock inside the atomic cannot
// share them safely.
#[cfg(not(target_has_atomic = "64"))]
compile_error!("aether_shm requires lock-free 64-bit atomics");

#[cfg(not(target_pointer_width = "64"))]
compile_error!("aether_shm requires a 64-bit address space for segment sizing");

pub mod error;
pub mod layout;
pub mod ring;
pub mod segment;
pub mod subscribe;

pub use error::{ShmError, ShmResult};
pub use layout::{segment_size, RingHeader, Slot, RING_MAGIC, RING_VERSION};
pub use ring::{Consumed, Cursor};
pub use segment::Segment;
pub use subscribe::{subscribe, subscribe_at, SubscribeError, Subscription};
