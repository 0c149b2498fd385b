//! Ports of the access-control crate.

pub mod outbound;
