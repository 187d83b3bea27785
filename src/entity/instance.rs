//! Instances

use crate::resource::{Entity, ResourceKind};
use serde::{Deserialize, Serialize};

/// Server-wide information from `GET /api/v1/instance`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Hostname of the instance, e.g. `mastodon.social`
    #[serde(rename = "uri")]
    pub hostname: String,
    #[serde(rename = "title")]
    pub name: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub email: String,
    /// Software version, e.g. `4.2.1`
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    /// Whether new sign-ups are open
    #[serde(default)]
    pub registrations: bool,
}

impl Entity for Instance {
    const KIND: ResourceKind = ResourceKind::Instance;
}
