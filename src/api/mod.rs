//! Fediverse API interaction module
//!
//! # Module Structure
//!
//! - [`auth`] - Application registration and OAuth token exchange
//! - [`client`] - Main client: lookups, cache, related resources
//! - [`http`] - HTTP transport for REST API calls

pub mod auth;
pub mod client;
pub mod http;

pub use client::{Client, ClientConfig, ClientHandle, TimelineKind, API_BASE};
