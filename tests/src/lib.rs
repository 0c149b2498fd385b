//! # Keygraph Test Suite
//!
//! End-to-end flows through the action pipeline, wired the way the runtime
//! wires it: in-memory storage, notification bus, static authenticator and
//! the runtime's action registry.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs        # seeded tenant + running pipeline harness
//! └── integration/
//!     ├── create_app.rs  # single graph action, stamp, notifications
//!     ├── revocation.rs  # cascade, encrypted key reconciliation, sockets
//!     ├── bulk.rs        # composed actions, all-or-nothing
//!     ├── concurrency.rs # stale stamps, racing writers, no-op requests
//!     └── trust.rs       # root replacement acknowledgement
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p kg-tests
//! cargo test -p kg-tests integration::revocation
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod integration;
