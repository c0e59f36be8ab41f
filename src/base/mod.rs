//! Base types and error handling.
//!
//! - [`NetError`]: crate-wide error enum with Chromium-style codes
//! - [`ErrorKind`]: the coarse classification callers match on
//! - [`LoadState`]: lifecycle states of a request task

pub mod context;
pub mod loadstate;
pub mod neterror;

pub use loadstate::LoadState;
pub use neterror::{ErrorKind, NetError};

#[cfg(test)]
mod tests;
