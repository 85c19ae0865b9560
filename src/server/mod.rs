/// TCP server implementation for the metatree daemon.
///
/// This module provides the [`Router`] which handles incoming TCP connections
/// and dispatches line-protocol commands to the request adapter.
pub mod router;

pub use router::Router;
