//! camhttpd: a single-threaded, readiness-multiplexed web console for an
//! embedded camera device.
//!
//! The server holds a fixed table of connection slots, parses a restrictive
//! HTTP/1.1 subset with bounded hand-rolled decoders, and serves exactly one
//! request per accepted connection before closing it.

pub mod config;
pub mod error;
pub mod handlers;
pub mod http;
pub mod server;
