//! Registered OAuth applications

use crate::resource::{Entity, ResourceKind};
use serde::{Deserialize, Deserializer, Serialize};

/// Out-of-band redirect: the authorization code is shown to the user
/// instead of being sent to a callback
pub const REDIRECT_NONE: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Client credentials of an application registered on one instance.
///
/// The registration response only carries the credentials; the name,
/// redirect URI, scopes and host are merged in from the request so the
/// record is enough to start an authorization flow later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    #[serde(deserialize_with = "required")]
    pub name: String,
    #[serde(deserialize_with = "required")]
    pub client_id: String,
    #[serde(deserialize_with = "required")]
    pub client_secret: String,
    #[serde(
        rename = "redirect_uris",
        alias = "redirect_uri",
        deserialize_with = "required"
    )]
    pub redirect_uri: String,
    /// Default scopes, space separated
    #[serde(deserialize_with = "required")]
    pub scopes: String,
    /// Instance root, e.g. `https://mastodon.social`
    #[serde(deserialize_with = "required")]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

fn required<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = String::deserialize(d)?;
    if value.trim().is_empty() {
        return Err(serde::de::Error::custom("field must not be empty"));
    }
    Ok(value)
}

impl Application {
    pub fn default_scopes(&self) -> Vec<&str> {
        self.scopes.split_whitespace().collect()
    }
}

impl Entity for Application {
    const KIND: ResourceKind = ResourceKind::Application;
}
