//! # Fieldbook Testkit
//!
//! Test utilities for Fieldbook.
//!
//! This crate provides:
//! - Record fixtures and fully wired test devices sharing one cloud
//! - Scripted stand-ins for the auth, notification and conflict ports
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fieldbook_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn saves_while_offline() {
//!     let cloud = TestCloud::new(1_000);
//!     let device = TestDevice::new(&cloud);
//!     cloud.remote.set_online(false);
//!     device.engine.save_entry(entry("2025-07-10", 5, 1_000)).await.unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod ports;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::ports::*;
}

pub use fixtures::*;
pub use generators::*;
pub use ports::*;
