//! Lazily resolved resources
//!
//! A [`Resource`] is a typed entity that may not have been fetched yet. It is
//! built one of three ways:
//!
//! - [`Resource::from_literal`] - data already in hand (embedded in another
//!   response, a page of a collection, an imported record)
//! - [`Resource::from_deferred`] - a pending HTTP call
//! - [`Resource::from_response`] - a completed HTTP response
//!
//! Reading through [`Resource::resolve`] or [`Resource::get`] is the one
//! place a pending resource waits on the network. The first read drives the
//! request, later reads are plain field access.

use super::deferred::Deferred;
use super::registry::Entity;
use crate::api::client::{Client, ClientHandle};
use crate::api::http::HttpResponse;
use crate::error::{Error, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Deferred response backing a pending resource
pub type PendingResponse = Deferred<Arc<HttpResponse>>;

/// Observable lifecycle of a [`Resource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// Waiting on a deferred response that has not been read yet
    Pending,
    /// Hydrated from a response
    Resolved,
    /// Built directly from known data
    Literal,
}

enum Source {
    Literal,
    Response,
    Deferred(PendingResponse),
}

/// A typed API entity that resolves on first read
pub struct Resource<T: Entity> {
    source: Source,
    value: OnceCell<T>,
    client: ClientHandle,
}

impl<T: Entity> Resource<T> {
    /// A resolved resource from data already in hand. Never touches the network.
    pub fn from_literal(value: T, client: ClientHandle) -> Self {
        Self {
            source: Source::Literal,
            value: OnceCell::new_with(Some(value)),
            client,
        }
    }

    /// A pending resource around a deferred HTTP call
    pub fn from_deferred(deferred: PendingResponse, client: ClientHandle) -> Self {
        Self {
            source: Source::Deferred(deferred),
            value: OnceCell::new(),
            client,
        }
    }

    /// A resolved resource from a completed response.
    ///
    /// Fails with an invalid-payload error when the status is not 2xx or the
    /// body does not decode.
    pub fn from_response(response: &HttpResponse, client: ClientHandle) -> Result<Self> {
        if !response.is_success() {
            return Err(Error::invalid_payload(format!(
                "cannot build a {} from a {} response",
                T::KIND,
                response.status()
            )));
        }
        let value = T::hydrate(response.json()?)?;
        Ok(Self {
            source: Source::Response,
            value: OnceCell::new_with(Some(value)),
            client,
        })
    }

    /// Rebuild a resolved resource from an exported record
    pub fn from_record(record: Value, client: ClientHandle) -> Result<Self> {
        Ok(Self::from_literal(T::from_record(record)?, client))
    }

    pub fn state(&self) -> ResourceState {
        match self.source {
            Source::Literal => ResourceState::Literal,
            _ if self.value.initialized() => ResourceState::Resolved,
            _ => ResourceState::Pending,
        }
    }

    /// Wait for the backing request (at most once) and return the entity.
    ///
    /// A failed request is reported as a resolution error carrying the HTTP
    /// status; the failure is memoized, so asking again does not re-send.
    pub async fn resolve(&self) -> Result<&T> {
        self.value
            .get_or_try_init(|| async {
                let Source::Deferred(deferred) = &self.source else {
                    return Err(Error::invalid_payload(format!(
                        "{} has neither data nor a pending request",
                        T::KIND
                    )));
                };
                tracing::debug!(kind = %T::KIND, "resolving pending resource");
                let response = deferred.force().await?;
                if !response.is_success() {
                    return Err(Error::rejected(response.status()));
                }
                T::hydrate(response.json()?)
            })
            .await
    }

    /// Read one field, resolving first if needed
    pub async fn get<R>(&self, field: impl FnOnce(&T) -> R) -> Result<R> {
        self.resolve().await.map(field)
    }

    /// The entity, if it is already available without waiting
    pub fn peek(&self) -> Option<&T> {
        self.value.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.value.initialized()
    }

    /// Export as a record, resolving first if needed
    pub async fn export(&self) -> Result<Value> {
        self.resolve().await?.export()
    }

    /// The owning client, for fetching related resources
    pub fn client(&self) -> Result<Client> {
        self.client.upgrade().ok_or_else(Error::no_client)
    }

    pub fn client_handle(&self) -> &ClientHandle {
        &self.client
    }

    /// Attach (or replace) the owning client
    pub fn set_client(&mut self, client: ClientHandle) {
        self.client = client;
    }

    #[must_use]
    pub fn with_client(mut self, client: ClientHandle) -> Self {
        self.client = client;
        self
    }
}

impl<T: Entity + fmt::Debug> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &T::KIND)
            .field("state", &self.state())
            .field("value", &self.peek())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Account, Tag};
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn account_json() -> Value {
        json!({
            "id": "109",
            "username": "alice",
            "acct": "alice",
            "display_name": "Alice",
            "note": "<p>hi</p>",
            "url": "https://example.org/@alice",
            "avatar": "https://example.org/a.png",
            "header": "https://example.org/h.png",
            "locked": false,
            "created_at": "2019-12-08T03:48:33.901Z",
            "followers_count": 10,
            "following_count": 20,
            "statuses_count": 30
        })
    }

    fn ok_response(body: Value) -> HttpResponse {
        HttpResponse::new(StatusCode::OK, HeaderMap::new(), body.to_string())
    }

    fn counted(counter: Arc<AtomicUsize>, response: HttpResponse) -> PendingResponse {
        Deferred::new(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(response))
        })
    }

    #[tokio::test]
    async fn test_literal_is_resolved_without_work() {
        let tag = Tag {
            name: "rust".to_string(),
            url: "https://example.org/tags/rust".to_string(),
        };
        let resource = Resource::from_literal(tag, ClientHandle::detached());
        assert_eq!(resource.state(), ResourceState::Literal);
        assert_eq!(resource.peek().unwrap().name, "rust");
        assert_eq!(resource.get(|t| t.url.clone()).await.unwrap(), "https://example.org/tags/rust");
    }

    #[tokio::test]
    async fn test_pending_resolves_exactly_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let deferred = counted(counter.clone(), ok_response(account_json()));
        let resource: Resource<Account> = Resource::from_deferred(deferred, ClientHandle::detached());

        assert_eq!(resource.state(), ResourceState::Pending);
        assert!(resource.peek().is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert_eq!(resource.get(|a| a.username.clone()).await.unwrap(), "alice");
        assert_eq!(resource.resolve().await.unwrap().followers_count, 10);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(resource.state(), ResourceState::Resolved);
    }

    #[tokio::test]
    async fn test_rejected_response_is_resolution_error_with_status() {
        let counter = Arc::new(AtomicUsize::new(0));
        let response = HttpResponse::new(StatusCode::NOT_FOUND, HeaderMap::new(), "{}");
        let resource: Resource<Account> =
            Resource::from_deferred(counted(counter.clone(), response), ClientHandle::detached());

        let err = resource.resolve().await.unwrap_err();
        assert!(err.is_status(404));
        let err = resource.resolve().await.unwrap_err();
        assert!(err.is_status(404));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(resource.state(), ResourceState::Pending);
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_payload() {
        let response = HttpResponse::new(StatusCode::OK, HeaderMap::new(), "not json");
        let resource: Resource<Account> = Resource::from_deferred(
            Deferred::ready(Arc::new(response)),
            ClientHandle::detached(),
        );
        assert!(resource.resolve().await.unwrap_err().is_invalid_payload());
    }

    #[test]
    fn test_from_response() {
        let resource: Resource<Account> =
            Resource::from_response(&ok_response(account_json()), ClientHandle::detached()).unwrap();
        assert_eq!(resource.state(), ResourceState::Resolved);
        assert_eq!(resource.peek().unwrap().display_name, "Alice");

        let rejected = HttpResponse::new(StatusCode::FORBIDDEN, HeaderMap::new(), "{}");
        let err = Resource::<Account>::from_response(&rejected, ClientHandle::detached()).unwrap_err();
        assert!(err.is_invalid_payload());

        let missing_field = ok_response(json!({"id": "1"}));
        let err = Resource::<Account>::from_response(&missing_field, ClientHandle::detached()).unwrap_err();
        assert!(err.is_invalid_payload());
    }

    #[tokio::test]
    async fn test_export_and_reconstruct() {
        let original: Resource<Account> =
            Resource::from_response(&ok_response(account_json()), ClientHandle::detached()).unwrap();
        let record = original.export().await.unwrap();
        assert_eq!(record["kind"], "account");
        assert_eq!(record["username"], "alice");

        let rebuilt: Resource<Account> = Resource::from_record(record, ClientHandle::detached()).unwrap();
        assert_eq!(rebuilt.state(), ResourceState::Literal);
        assert_eq!(rebuilt.peek(), original.peek());
    }

    #[test]
    fn test_client_required_for_related_lookups() {
        let resource: Resource<Account> =
            Resource::from_response(&ok_response(account_json()), ClientHandle::detached()).unwrap();
        let err = resource.client().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("no client attached"));
    }
}
