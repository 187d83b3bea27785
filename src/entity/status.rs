//! Statuses and the small entities embedded in them

use super::account::Account;
use super::media::MediaAttachment;
use crate::resource::registry::nested;
use crate::resource::{Entity, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who can see a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
    Direct,
    #[serde(other)]
    Unknown,
}

/// The client a status was posted with. Not an entity of its own: the API
/// only exposes the name and website here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusApplication {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
}

/// A post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(with = "nested::one")]
    pub account: Account,
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    #[serde(default)]
    pub in_reply_to_account_id: Option<String>,
    /// The boosted status, when this status is a boost
    #[serde(default, with = "nested::boxed")]
    pub reblog: Option<Box<Status>>,
    /// Body, as HTML
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reblogs_count: u64,
    #[serde(default)]
    pub favourites_count: u64,
    #[serde(default)]
    pub reblogged: Option<bool>,
    #[serde(default)]
    pub favourited: Option<bool>,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub spoiler_text: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub application: Option<StatusApplication>,
    #[serde(default, with = "nested::many")]
    pub media_attachments: Vec<MediaAttachment>,
    #[serde(default, with = "nested::many")]
    pub mentions: Vec<Mention>,
    #[serde(default, with = "nested::many")]
    pub tags: Vec<Tag>,
    #[serde(default, with = "nested::many")]
    pub emojis: Vec<Emoji>,
}

impl Status {
    pub fn is_reblog(&self) -> bool {
        self.reblog.is_some()
    }

    pub fn is_reply(&self) -> bool {
        self.in_reply_to_id.is_some()
    }
}

impl Entity for Status {
    const KIND: ResourceKind = ResourceKind::Status;
}

/// An account mentioned in a status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    pub username: String,
    pub acct: String,
    #[serde(default)]
    pub url: String,
}

impl Entity for Mention {
    const KIND: ResourceKind = ResourceKind::Mention;
}

/// A hashtag used in a status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl Entity for Tag {
    const KIND: ResourceKind = ResourceKind::Tag;
}

/// A custom emoji
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    pub shortcode: String,
    pub url: String,
    #[serde(default)]
    pub static_url: String,
    #[serde(default = "visible")]
    pub visible_in_picker: bool,
}

fn visible() -> bool {
    true
}

impl Entity for Emoji {
    const KIND: ResourceKind = ResourceKind::Emoji;
}
