//! Library surface of the redock CLI
//!
//! Exposed so the command implementations can be driven directly in tests
//! with a fake engine behind the manager.

pub mod commands;
