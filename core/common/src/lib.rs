//! Common types shared across DriveKeeper crates.

pub mod error;

pub use error::{Error, Result};
