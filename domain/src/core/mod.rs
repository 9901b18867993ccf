//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`]: domain-level errors
//! - [`signal::StateSignal`]: pause/resume signal and turn outcome tag

pub mod error;
pub mod signal;
