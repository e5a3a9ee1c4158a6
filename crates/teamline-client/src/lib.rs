//! Teamline resource client
//!
//! The network core behind the Teamline command handlers and the agent tool
//! bridge: a resilient, paginated, authenticated HTTP client over the
//! account-scoped REST API. Command parsing and output rendering live in the
//! consumers; this crate only executes operations and classifies failures.
//!
//! Typical call path:
//! 1. `ApiClient::bind()` resolves the selected account and a fresh access
//!    token from `teamline-auth` (failing fast when either is missing)
//! 2. A resource operation builds a `RequestDescriptor`
//! 3. The client executes it with bounded retry (429/5xx, `Retry-After`)
//! 4. Collection operations drain the `Link: rel="next"` chain before
//!    returning

pub mod client;
pub mod error;
mod pagination;
pub mod request;
pub mod resources;

pub use client::{ApiClient, USER_AGENT};
pub use error::{Error, Result};
pub use request::{RequestDescriptor, RetryPolicy};
pub use resources::comments::Comment;
pub use resources::documents::Document;
pub use resources::messages::Message;
pub use resources::people::Person;
pub use resources::projects::Project;
pub use resources::tasks::Task;
