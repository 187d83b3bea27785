//! Fediverse Client
//!
//! Main client for a Mastodon-compatible instance, combining the HTTP
//! transport, the resource cache and the pagination aggregator.

use super::http::{normalize_host, same_origin, HttpClient};
use crate::entity::{Account, Instance, Status, Timeline};
use crate::error::{Error, Result};
use crate::resource::{
    pagination, AnyResource, CacheEntry, CacheSnapshot, Collection, Deferred, Entity, Resource,
    ResourceCache, ResourceKind,
};
use std::sync::{Arc, Weak};
use url::Url;

/// Path of the REST API under an instance root
pub const API_BASE: &str = "/api/v1/";

/// Client configuration, fixed once the client is built
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base endpoint, e.g. `https://mastodon.social/api/v1/`
    pub base_url: Url,
    /// Bearer token sent with requests to the base endpoint
    pub access_token: Option<String>,
    /// Whether lookups are cached
    pub use_cache: bool,
}

impl ClientConfig {
    /// Configuration for an instance host; `https://` is assumed when no
    /// scheme is given
    pub fn for_instance(host: &str) -> Result<Self> {
        let base = format!("{}{}", normalize_host(host), API_BASE);
        let base_url = Url::parse(&base)
            .map_err(|e| Error::configuration(format!("invalid instance host {host:?}: {e}")))?;
        if base_url.host_str().is_none() {
            return Err(Error::configuration(format!("instance host {host:?} has no hostname")));
        }

        Ok(Self {
            base_url,
            access_token: None,
            use_cache: true,
        })
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }
}

struct ClientInner {
    config: ClientConfig,
    http: HttpClient,
    hostname: String,
    cache: ResourceCache,
}

/// Non-owning reference from a resource back to its client
#[derive(Clone, Default)]
pub struct ClientHandle(Option<Weak<ClientInner>>);

impl ClientHandle {
    /// A handle that refers to no client
    pub fn detached() -> Self {
        Self(None)
    }

    /// The client, if one was attached and is still alive
    pub fn upgrade(&self) -> Option<Client> {
        self.0
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Client { inner })
    }

    pub fn is_attached(&self) -> bool {
        self.upgrade().is_some()
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(client) => write!(f, "ClientHandle({})", client.instance_hostname()),
            None => f.write_str("ClientHandle(detached)"),
        }
    }
}

/// Which timeline to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineKind {
    Home,
    Public,
    /// Public timeline restricted to this instance
    Local,
    Tag(String),
    List(String),
}

impl TimelineKind {
    /// Request key relative to the API base
    pub fn path(&self) -> String {
        match self {
            TimelineKind::Home => "timelines/home".to_string(),
            TimelineKind::Public => "timelines/public".to_string(),
            TimelineKind::Local => "timelines/public?local=true".to_string(),
            TimelineKind::Tag(tag) => {
                format!("timelines/tag/{}", urlencoding::encode(tag.trim_start_matches('#')))
            }
            TimelineKind::List(id) => format!("timelines/list/{}", urlencoding::encode(id)),
        }
    }
}

impl std::str::FromStr for TimelineKind {
    type Err = Error;

    /// `home`, `public`, `local`, `tag:NAME` or `list:ID`
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            None => match s {
                "home" => Ok(TimelineKind::Home),
                "public" => Ok(TimelineKind::Public),
                "local" => Ok(TimelineKind::Local),
                other => Err(Error::configuration(format!("unknown timeline `{other}`"))),
            },
            Some(("tag", tag)) if !tag.is_empty() => Ok(TimelineKind::Tag(tag.to_string())),
            Some(("list", id)) if !id.is_empty() => Ok(TimelineKind::List(id.to_string())),
            Some(_) => Err(Error::configuration(format!("unknown timeline `{s}`"))),
        }
    }
}

/// Main fediverse client
///
/// Cheap to clone; clones share the transport and the cache.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a client for `host` authenticated with `access_token`
    pub fn build(host: &str, access_token: &str) -> Result<Self> {
        Self::new(ClientConfig::for_instance(host)?.with_access_token(access_token))
    }

    /// Create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = HttpClient::new(config.base_url.clone(), config.access_token.clone())?;
        let hostname = config
            .base_url
            .host_str()
            .ok_or_else(|| Error::configuration("base endpoint has no hostname"))?
            .to_string();
        let cache = ResourceCache::new(config.use_cache);

        tracing::info!(
            "Client for {} (cache {})",
            config.base_url,
            if config.use_cache { "on" } else { "off" }
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                http,
                hostname,
                cache,
            }),
        })
    }

    /// A non-owning handle for attaching to resources
    pub fn handle(&self) -> ClientHandle {
        ClientHandle(Some(Arc::downgrade(&self.inner)))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn http(&self) -> &HttpClient {
        &self.inner.http
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.inner.cache
    }

    /// Hostname of the instance this client talks to
    pub fn instance_hostname(&self) -> &str {
        &self.inner.hostname
    }

    // =========================================================================
    // Generic lookups
    // =========================================================================

    /// Look up a single resource. Returns at once with a pending resource;
    /// the request goes out the first time it is read.
    ///
    /// With `use_cache`, a second lookup of the same key returns the same
    /// object, so both callers share one request and one outcome.
    pub fn fetch<T: Entity>(&self, key: &str, use_cache: bool) -> Arc<Resource<T>> {
        let create = || {
            tracing::debug!(kind = %T::KIND, key, "deferring lookup");
            let http = self.inner.http.clone();
            let path = key.to_string();
            let deferred = Deferred::new(async move { http.get(&path).await.map(Arc::new) });
            Arc::new(Resource::from_deferred(deferred, self.handle()))
        };

        if use_cache {
            self.inner.cache.get_or_insert_with(T::KIND, key, create)
        } else {
            create()
        }
    }

    /// Look up a paginated collection, following every `next` link before
    /// returning
    pub async fn fetch_all<T: Entity>(&self, key: &str, use_cache: bool) -> Result<Arc<Collection<T>>> {
        if use_cache {
            if let Some(hit) = self.inner.cache.get::<Collection<T>>(T::KIND, key) {
                return Ok(hit);
            }
        }

        let collection =
            Arc::new(pagination::fetch_all::<T>(&self.inner.http, key, self.handle()).await?);

        if use_cache {
            self.inner.cache.put(T::KIND, key, collection.clone());
        }
        Ok(collection)
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// This client's instance, or another one by hostname
    pub fn instance(&self, host: Option<&str>) -> Arc<Resource<Instance>> {
        let key = match host {
            Some(host) if !self.is_own_host(host) => {
                format!("{}{}instance", normalize_host(host), API_BASE)
            }
            _ => "instance".to_string(),
        };
        self.fetch(&key, true)
    }

    /// Whether `host` names this client's own instance, either by bare
    /// hostname or by origin
    fn is_own_host(&self, host: &str) -> bool {
        if host.trim().trim_end_matches('/') == self.instance_hostname() {
            return true;
        }
        Url::parse(&normalize_host(host))
            .map(|url| same_origin(&url, &self.inner.config.base_url))
            .unwrap_or(false)
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// An account by id, or the authenticated account when `id` is `None`
    pub fn account(&self, id: Option<&str>) -> Arc<Resource<Account>> {
        let key = match id {
            Some(id) => format!("accounts/{}", urlencoding::encode(id)),
            None => "accounts/verify_credentials".to_string(),
        };
        self.fetch(&key, true)
    }

    /// Id of the authenticated account
    pub async fn account_id(&self) -> Result<String> {
        self.account(None).get(|account| account.id.clone()).await
    }

    async fn account_id_or_self(&self, id: Option<&str>) -> Result<String> {
        match id {
            Some(id) => Ok(id.to_string()),
            None => self.account_id().await,
        }
    }

    /// Everyone following the account (the authenticated account by default)
    pub async fn followers(&self, id: Option<&str>) -> Result<Arc<Collection<Account>>> {
        let id = self.account_id_or_self(id).await?;
        let key = format!("accounts/{}/followers", urlencoding::encode(&id));
        self.fetch_all(&key, true).await
    }

    /// Everyone the account follows (the authenticated account by default)
    pub async fn following(&self, id: Option<&str>) -> Result<Arc<Collection<Account>>> {
        let id = self.account_id_or_self(id).await?;
        let key = format!("accounts/{}/following", urlencoding::encode(&id));
        self.fetch_all(&key, true).await
    }

    /// Accounts matching `query`
    pub async fn search_accounts(
        &self,
        query: &str,
        limit: Option<u32>,
    ) -> Result<Arc<Collection<Account>>> {
        let mut key = format!("accounts/search?q={}", urlencoding::encode(query));
        if let Some(limit) = limit {
            key.push_str(&format!("&limit={}", limit));
        }
        self.fetch_all(&key, true).await
    }

    // =========================================================================
    // Statuses
    // =========================================================================

    pub fn status(&self, id: &str) -> Arc<Resource<Status>> {
        self.fetch(&format!("statuses/{}", urlencoding::encode(id)), true)
    }

    /// The most recent page of a timeline
    pub fn timeline(&self, kind: &TimelineKind) -> Arc<Resource<Timeline>> {
        self.fetch(&kind.path(), true)
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// Rebuild a resource from an exported record and attach this client.
    ///
    /// When `key` is given and caching is on, the resource is also stored in
    /// the cache under that key, replacing any previous entry.
    pub fn import(&self, record: &str, key: Option<&str>) -> Result<AnyResource> {
        let value = serde_json::from_str(record)
            .map_err(|e| Error::malformed("exported record is not valid JSON", e))?;
        let resource = AnyResource::from_record(value, self.handle())?;

        if let Some(key) = key {
            self.inner
                .cache
                .put(resource.kind(), key, resource.clone().into_entry());
        }
        Ok(resource)
    }

    /// Invalidate everything, one kind, or one key
    pub fn clear_cache(&self, kind: Option<ResourceKind>, key: Option<&str>) -> &Self {
        self.inner.cache.clear(kind, key);
        self
    }

    /// Current cache contents, optionally resolving pending entries first
    pub async fn cache_snapshot(&self, force_resolve: bool) -> Result<CacheSnapshot> {
        self.inner.cache.snapshot(force_resolve).await
    }

    /// The cached entry for (kind, key), whatever its shape
    pub fn cached(&self, kind: ResourceKind, key: &str) -> Option<Arc<dyn CacheEntry>> {
        self.inner.cache.get_entry(kind, key)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("use_cache", &self.inner.config.use_cache)
            .finish()
    }
}

// =========================================================================
// Related-resource lookups
// =========================================================================

impl Resource<Account> {
    /// Hostname of the account's home instance
    pub async fn instance_hostname(&self) -> Result<String> {
        let account = self.resolve().await?;
        match account.remote_host() {
            Some(host) => Ok(host.to_string()),
            None => Ok(self.client()?.instance_hostname().to_string()),
        }
    }

    /// `username@host`, even for accounts local to this client's instance
    pub async fn qualified_name(&self) -> Result<String> {
        let account = self.resolve().await?;
        if account.is_local() {
            let host = self.client()?.instance_hostname().to_string();
            Ok(format!("{}@{}", account.username, host))
        } else {
            Ok(account.acct.clone())
        }
    }

    /// The account's home instance
    pub async fn instance(&self) -> Result<Arc<Resource<Instance>>> {
        let account = self.resolve().await?;
        let client = self.client()?;
        Ok(client.instance(account.remote_host()))
    }

    /// Whether the home instance supports direct posts
    pub async fn supports_direct_posts(&self) -> Result<bool> {
        self.instance().await?.allows_direct_posts().await
    }

    pub async fn followers(&self) -> Result<Arc<Collection<Account>>> {
        let id = self.get(|account| account.id.clone()).await?;
        self.client()?.followers(Some(&id)).await
    }

    pub async fn following(&self) -> Result<Arc<Collection<Account>>> {
        let id = self.get(|account| account.id.clone()).await?;
        self.client()?.following(Some(&id)).await
    }
}

impl Resource<Instance> {
    /// Probe whether the server speaks the Mastodon API.
    ///
    /// A 404 from the instance endpoint means "no"; any other failure is
    /// returned as is.
    pub async fn is_mastodon(&self) -> Result<bool> {
        match self.resolve().await {
            Ok(_) => Ok(true),
            Err(err) if err.is_status(404) => {
                tracing::debug!("instance endpoint returned 404, not a Mastodon server");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn allows_direct_posts(&self) -> Result<bool> {
        self.is_mastodon().await
    }
}
