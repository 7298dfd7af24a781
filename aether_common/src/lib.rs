//! Aether Common Library
//!
//! Shared constants and the control-protocol wire format for the aether
//! workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Ring, naming and socket constants (single source of truth)
//! - [`control`] - Fixed-size subscribe request/response wire format
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! aether = { package = "aether_common", path = "../aether_common" }
//! ```
//!
//! Then import:
//! ```rust,ignore
//! use aether::consts::*;
//! use aether::control::{SubscribeRequest, SubscribeResponse};
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod consts;
pub mod control;
