//! OAuth authentication
//!
//! Registers applications on an instance and exchanges authorization codes
//! or user credentials for the bearer token a [`Client`](super::Client)
//! is built with.

use super::client::ClientHandle;
use super::http::{normalize_host, HttpClient, HttpResponse};
use crate::entity::Application;
use crate::error::{Error, Result};
use crate::resource::{Deferred, Resource};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

pub use crate::entity::REDIRECT_NONE;

/// OAuth scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Read,
    Write,
    Follow,
    Push,
    /// Any other scope, e.g. a granular `read:statuses`
    Custom(String),
}

impl Scope {
    /// Scopes requested when none are given
    pub const DEFAULT: &'static [Scope] = &[Scope::Read, Scope::Write, Scope::Follow];

    pub fn as_str(&self) -> &str {
        match self {
            Scope::Read => "read",
            Scope::Write => "write",
            Scope::Follow => "follow",
            Scope::Push => "push",
            Scope::Custom(scope) => scope,
        }
    }

    /// Space-separated form used on the wire
    pub fn join(scopes: &[Scope]) -> String {
        scopes
            .iter()
            .map(Scope::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Err(Error::configuration("empty OAuth scope")),
            "read" => Ok(Scope::Read),
            "write" => Ok(Scope::Write),
            "follow" => Ok(Scope::Follow),
            "push" => Ok(Scope::Push),
            other => Ok(Scope::Custom(other.to_string())),
        }
    }
}

/// HTTP client rooted at an instance (not at its API base)
fn instance_http(host: &str) -> Result<HttpClient> {
    let root = format!("{}/", normalize_host(host));
    let url = Url::parse(&root)
        .map_err(|e| Error::configuration(format!("invalid instance host {host:?}: {e}")))?;
    HttpClient::new(url, None)
}

/// Registers applications on one instance
pub struct AppRegistrar {
    http: HttpClient,
    host: String,
}

impl AppRegistrar {
    pub fn for_instance(host: &str) -> Result<Self> {
        Ok(Self {
            http: instance_http(host)?,
            host: normalize_host(host),
        })
    }

    /// Register an application. The request goes out when the returned
    /// resource is first read.
    pub fn register(
        &self,
        name: &str,
        redirect_uri: &str,
        scopes: &[Scope],
    ) -> Resource<Application> {
        let http = self.http.clone();
        let scopes = Scope::join(if scopes.is_empty() { Scope::DEFAULT } else { scopes });
        let request = json!({
            "client_name": name,
            "redirect_uris": redirect_uri,
            "scopes": scopes,
        });
        let merged = json!({
            "name": name,
            "redirect_uris": redirect_uri,
            "scopes": scopes,
            "host": self.host,
        });

        tracing::debug!("deferring registration of {} on {}", name, self.host);
        let deferred = Deferred::new(async move {
            let response = http.post_json("api/v1/apps", &request).await?;
            if !response.is_success() {
                return Ok(Arc::new(response));
            }
            Ok(Arc::new(merge_registration(&response, merged)?))
        });

        Resource::from_deferred(deferred, ClientHandle::detached())
    }
}

/// Overlay the request's name, redirect URI, scopes and host on the
/// registration response, which only reliably carries the credentials
fn merge_registration(
    response: &HttpResponse,
    merged: Value,
) -> Result<HttpResponse> {
    let Value::Object(mut body) = response.json()? else {
        return Err(Error::invalid_payload("registration response is not a JSON object"));
    };
    body.remove("redirect_uri");
    if let Value::Object(fields) = merged {
        body.extend(fields);
    }
    Ok(HttpResponse::new(
        response.status(),
        response.headers().clone(),
        Value::Object(body).to_string(),
    ))
}

/// Obtains bearer tokens for a registered application
pub struct AuthClient {
    http: HttpClient,
    app: Application,
}

impl AuthClient {
    pub fn for_application(app: Application) -> Result<Self> {
        Ok(Self {
            http: instance_http(&app.host)?,
            app,
        })
    }

    pub fn application(&self) -> &Application {
        &self.app
    }

    fn scope_string(&self, scopes: Option<&[Scope]>) -> String {
        match scopes {
            Some(scopes) if !scopes.is_empty() => Scope::join(scopes),
            _ => self.app.default_scopes().join(" "),
        }
    }

    /// URL the user opens to grant access; the instance then hands out an
    /// authorization code for [`exchange_code`](Self::exchange_code)
    pub fn authorize_url(&self, state: Option<&str>, scopes: Option<&[Scope]>) -> Result<Url> {
        let mut url = self.http.url_for("oauth/authorize")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.app.client_id)
                .append_pair("redirect_uri", &self.app.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &self.scope_string(scopes));
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        Ok(url)
    }

    /// Exchange an authorization code for a bearer token
    pub async fn exchange_code(&self, code: &str) -> Result<String> {
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.app.redirect_uri.as_str()),
        ])
        .await
    }

    /// Password grant
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        scopes: Option<&[Scope]>,
    ) -> Result<String> {
        let scope = self.scope_string(scopes);
        self.request_token(&[
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("scope", scope.as_str()),
        ])
        .await
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<String> {
        let credentials = Some((self.app.client_id.as_str(), self.app.client_secret.as_str()));
        let response = self.http.post_form("oauth/token", form, credentials).await?;
        if !response.is_success() {
            return Err(Error::rejected(response.status()));
        }

        match response.json()?.get("access_token") {
            Some(Value::String(token)) if !token.is_empty() => {
                tracing::info!("Obtained access token from {}", self.app.host);
                Ok(token.clone())
            }
            _ => Err(Error::invalid_payload("token response has no access_token")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> Application {
        Application {
            name: "fedi".to_string(),
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: REDIRECT_NONE.to_string(),
            scopes: "read write".to_string(),
            host: "https://example.org".to_string(),
            website: None,
        }
    }

    #[test]
    fn test_scope_parse_and_join() {
        let scopes: Vec<Scope> = "read push read:statuses"
            .split_whitespace()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(
            scopes,
            vec![Scope::Read, Scope::Push, Scope::Custom("read:statuses".into())]
        );
        assert_eq!(Scope::join(&scopes), "read push read:statuses");
        assert_eq!(Scope::join(Scope::DEFAULT), "read write follow");
        assert!("  ".parse::<Scope>().is_err());
    }

    #[test]
    fn test_authorize_url() {
        let auth = AuthClient::for_application(app()).unwrap();
        let url = auth.authorize_url(Some("xyz"), None).unwrap();
        assert_eq!(url.path(), "/oauth/authorize");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "cid".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("scope".into(), "read write".into())));
        assert!(pairs.contains(&("redirect_uri".into(), REDIRECT_NONE.into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
    }

    #[test]
    fn test_authorize_url_with_explicit_scopes() {
        let auth = AuthClient::for_application(app()).unwrap();
        let url = auth.authorize_url(None, Some(&[Scope::Follow])).unwrap();
        assert!(url.query_pairs().any(|(k, v)| k == "scope" && v == "follow"));
        assert!(!url.query_pairs().any(|(k, _)| k == "state"));
    }

    #[test]
    fn test_register_is_lazy() {
        let registrar = AppRegistrar::for_instance("example.org").unwrap();
        let app = registrar.register("fedi", REDIRECT_NONE, &[]);
        assert!(!app.is_resolved());
    }
}
