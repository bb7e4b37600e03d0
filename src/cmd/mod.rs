//! # Command encoding
//!
//! Wire formats of everything the driver sends and receives: request
//! builders returning fixed byte arrays, response accessors over fixed
//! buffers, and the enums appearing inside the payloads.
//!
//! Modules ending in a domain name correspond to the driver API module of
//! the same name; `cmd_info` covers the L2-level queries that work outside
//! a Secure Session.

pub mod cmd_config;
pub mod cmd_ecc;
pub mod cmd_info;
pub mod cmd_macandd;
pub mod cmd_mcounter;
pub mod cmd_mem;
pub mod cmd_pairing;
pub mod cmd_util;
