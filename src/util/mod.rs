//! Utility functions
//!
//! Pure helpers - time formatting, retry backoff.

pub mod backoff;
pub mod time;
