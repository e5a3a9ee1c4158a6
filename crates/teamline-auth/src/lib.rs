//! Teamline authentication library
//!
//! Credential storage, OAuth flow, and session maintenance for the Teamline
//! client. This crate is a standalone library with no dependency on any
//! command surface; it can be tested and used independently.
//!
//! Credential flow:
//! 1. Configuration stores client id + redirect URI via
//!    `CredentialStore::set_client_registration()`
//! 2. Login binds a loopback listener with `flow::AuthorizationFlow::begin()`
//!    and suspends in `wait()` until the provider redirects back
//! 3. `flow::complete_login()` exchanges the code and stores the bundle
//! 4. `accounts::select_account()` validates and persists the tenant id
//! 5. Every operation calls `session::access_token()`, refreshing the bundle
//!    when fewer than 60 seconds remain

pub mod accounts;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod flow;
pub mod session;
pub mod store;
pub mod token;

pub use accounts::{Account, Authorization, Identity};
pub use constants::Endpoints;
pub use error::{Error, Result};
pub use flow::AuthorizationFlow;
pub use store::{ClientRegistration, CredentialStore, FileBackend, MemoryBackend, StateBackend, TokenBundle};
pub use token::TokenResponse;
