//! # tent-client
//!
//! Blocking Tent client:
//! - Entity discovery via `Link` headers with an HTML fallback
//! - Ordered failover across an entity's servers
//! - Hawk-signed post, feed, attachment and token requests
//!
//! All network access goes through the [`Transport`] trait;
//! [`HttpTransport`] is the `ureq` implementation.

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::{
    Client, FeedCount, FeedPage, FeedQuery, PostList, PostListPage, get_meta_post, get_post_url,
    linked_credentials,
};
pub use config::ClientConfig;
pub use discovery::discover;
pub use error::{Error, Result, TentError};
pub use executor::first_success;
pub use transport::{HttpTransport, Method, Request, Response, Transport};
