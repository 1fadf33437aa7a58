//! Core converge logic for redock
//!
//! The [`LifecycleManager`] drives a named container to a fresh state
//! reflecting the latest build definition: build the image, stop and remove
//! any prior container of that name, run a new detached container, and
//! optionally attach to it.

mod error;
mod manager;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::*;
pub use manager::*;
