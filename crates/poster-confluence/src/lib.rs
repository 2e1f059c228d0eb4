//! Confluence REST integration for confluence-poster.
//!
//! - [`SessionBuilder`] turns a [`Configuration`](poster_config::Configuration)
//!   into an authenticated [`Session`] (basic auth or client certificate)
//! - [`ConfluenceClient`] sends API requests over any [`Transport`] with
//!   retry on transient failures
//! - [`Upserter`] creates or updates one page per document under a parent page
//!
//! # Example
//!
//! ```ignore
//! use poster_confluence::{ConfluenceClient, RetryPolicy, SessionBuilder, Upserter};
//!
//! let session = SessionBuilder::build(&config)?;
//! let client = ConfluenceClient::new(session, RetryPolicy::from_settings(config.upload()));
//! let upserter = Upserter::new(&client, config.space_key(), config.parent_title());
//! let outcome = upserter.upsert(&document)?;
//! ```

mod client;
mod error;
mod session;
#[cfg(test)]
mod testing;
mod tls;
mod transport;
mod types;
mod upsert;

pub use client::{ConfluenceClient, RetryPolicy};
pub use error::{ApiError, SessionError, UpsertError};
pub use session::{Session, SessionBuilder};
pub use transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
pub use types::RemotePage;
pub use upsert::{UpsertAction, UpsertOutcome, Upserter, upsert};
