//! Lazy, cached client for the Mastodon REST API
//!
//! Lookups return at once with a pending [`Resource`]; the HTTP request is
//! sent the first time the resource is read, and at most once. Each
//! [`Client`] owns a cache, so repeated lookups of the same key share one
//! resource and one request. Collection endpoints are followed through their
//! `Link` headers and returned whole.

pub mod api;
pub mod entity;
pub mod error;
pub mod resource;

pub use api::auth::{AppRegistrar, AuthClient, Scope};
pub use api::http::describe_error;
pub use api::{Client, ClientConfig, ClientHandle, TimelineKind};
pub use error::{Error, Result};
pub use resource::{AnyResource, Collection, Entity, Resource, ResourceKind, ResourceState};
