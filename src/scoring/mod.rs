//! # Hosted Model Access
//!
//! Everything that talks to the external scoring model: the HTTP client and
//! the fixed instruction prompts. The rest of the system treats this module
//! as an opaque capability that takes bytes or text and returns raw reply
//! text, possibly failing or timing out.

pub mod client;
pub mod prompts;

pub use client::{ScoringClient, ScoringError};
