/// Client library for the metatree daemon.
///
/// This module provides a high-level API for interacting with a remote
/// store over the TCP line protocol.
pub mod client;

pub use client::Client;
