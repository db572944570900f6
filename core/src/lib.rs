//! Synchronous client for a document-oriented search engine's HTTP API.
//!
//! # Overview
//! Builds URLs from path segments, encodes request bodies, fills in the
//! default search parameters and hands the request to a `Transport`. The
//! response comes back as raw decoded JSON.
//!
//! # Design
//! - `Client` is stateless between calls; it holds only its configuration
//!   and a boxed transport.
//! - Every operation has a pure `build_*` form producing an `HttpRequest`,
//!   so request shaping is testable without a server.
//! - HTTP error statuses are logged (target `elasticsearch`), not raised.
//!   Timeouts come back as `Outcome::TimedOut`.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use client::{Client, PathTarget, LOG_TARGET};
pub use config::{ClientConfig, Host};
pub use error::ElasticError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError, UreqTransport};
pub use types::{
    Body, BulkBody, BulkRequest, CountQuery, DeleteDocument, IndexDocument, Outcome, Params,
    SearchQuery,
};
