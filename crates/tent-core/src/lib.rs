//! # tent-core
//!
//! Core types for Tent clients:
//! - The post document model and its wire media types
//! - Canonical JSON encoding and version id hashing
//! - `Link` header and HTML `<link>` parsing
//! - Hawk request signing and credentials
//! - Meta posts, server URL templates, and app records
//!
//! This crate has no network code.

pub mod app;
pub mod credentials;
pub mod encoding;
pub mod error;
pub mod hash;
pub mod link;
pub mod meta;
pub mod post;
pub mod signing;
pub mod version;

pub use credentials::Credentials;
pub use error::{Error, Result};
pub use hash::VersionId;
pub use link::Link;
pub use meta::{MetaPost, ServerDescriptor};
pub use post::Post;
