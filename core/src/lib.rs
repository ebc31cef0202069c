//! Async client for the CollectionSpace app-layer API.
//!
//! # Overview
//! Logs in with a cookie-based session, then reads, creates and updates
//! records, looks up vocabularies and authority terms, and runs paged
//! searches. Every response passes through one normalizer that turns the
//! app layer's `isError` payloads into `ApiError::Api`.
//!
//! # Design
//! - `CollectionSpaceApi` is stateless: `build_*` produces an `HttpRequest`,
//!   `parse_response` consumes an `HttpResponse` (host-does-IO pattern).
//! - `Transport` executes requests; `ReqwestTransport` keeps the cookie jar.
//! - `SessionClient` pairs the two with the cached login status and enforces
//!   that record operations only run on a confirmed session.
//!
//! ```no_run
//! use cspace_core::{ClientOptions, SearchOptions, SessionClient};
//!
//! # async fn demo() -> Result<(), cspace_core::ApiError> {
//! let mut cspace = SessionClient::new(&ClientOptions::new("demo.collectionspace.org"))?;
//! cspace.connect("admin@core.collectionspace.org", "Administrator").await?;
//! let results = cspace.search("collectionobject", "vase", &SearchOptions::default()).await?;
//! println!("{}", results["results"]);
//! cspace.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod transport;
pub mod types;

pub use client::CollectionSpaceApi;
pub use config::ClientOptions;
pub use error::{ApiError, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use session::SessionClient;
pub use transport::{ReqwestTransport, Transport};
pub use types::{ConnectionStatus, RecordPayload, SearchOptions, SortDir};
