//! # accounts-core
//!
//! Core types shared by the account directory crates.
//!
//! ## Modules
//!
//! - [`error`] - Error type covering directory lookups, mutations and configuration
//! - [`credentials`] - Bind credentials for the directory session

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod credentials;
pub mod error;

// Re-export commonly used types
pub use credentials::BindCredentials;
pub use error::{Error, Result};
