//! # aetherd internals
//!
//! The daemon owns one shared memory segment per topic and answers
//! subscribe requests over a Unix control socket. Everything else - the
//! rings themselves, publish and consume - lives in `aether_shm` and
//! happens entirely in the subscribing processes.
//!
//! - [`registry::TopicRegistry`] - topic name to owned segment, behind one
//!   mutex
//! - [`acceptor::Acceptor`] - the control-socket thread
//!
//! The binary in `main.rs` wires these together with flag-based signal
//! handling: termination signals request a graceful shutdown, `SIGUSR1`
//! dumps per-topic statistics to the log.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod acceptor;
pub mod registry;

pub use acceptor::Acceptor;
pub use registry::{RegistryError, TopicRegistry};
