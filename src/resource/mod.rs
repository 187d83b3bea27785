//! Resource abstraction layer
//!
//! Typed API entities that are fetched lazily and shared through a
//! per-client cache.
//!
//! # Architecture
//!
//! - [`deferred`] - Single-fulfilment async values backing pending lookups
//! - [`lazy`] - [`Resource`], an entity that resolves on first read
//! - [`registry`] - The closed set of resource kinds and the export format
//! - [`cache`] - Per-client store keyed by kind and request key
//! - [`pagination`] - `Link` header parsing and collection aggregation
//!
//! # Example
//!
//! ```no_run
//! use fedi_rest::Client;
//!
//! # async fn example() -> fedi_rest::Result<()> {
//! let client = Client::build("mastodon.social", "token")?;
//! let me = client.account(None);
//! // Nothing has been sent yet; this read performs the request
//! let name = me.get(|account| account.display_name.clone()).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod deferred;
pub mod lazy;
pub mod pagination;
pub mod registry;

pub use cache::{CacheEntry, CacheSnapshot, ResourceCache};
pub use deferred::Deferred;
pub use lazy::{PendingResponse, Resource, ResourceState};
pub use pagination::{Collection, Link};
pub use registry::{AnyResource, Entity, ResourceKind, KIND_FIELD};
