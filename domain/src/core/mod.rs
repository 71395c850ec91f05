//! Core domain concepts shared across all subdomains.
//!
//! - [`question::Question`] - an immutable question received from the caller
//! - [`error::DomainError`] - startup and invariant errors
//! - [`string`] - text canonicalization helpers

pub mod error;
pub mod question;
pub mod string;
