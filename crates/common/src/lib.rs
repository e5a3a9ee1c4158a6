//! Common types for the Teamline client workspace

mod secret;

pub use secret::Secret;
