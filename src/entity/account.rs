//! Accounts

use super::status::Emoji;
use crate::resource::registry::nested;
use crate::resource::{Entity, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user account, local to the queried instance or remote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    /// `username` for local accounts, `username@host` for remote ones
    pub acct: String,
    #[serde(default)]
    pub display_name: String,
    /// Profile text, as HTML
    #[serde(rename = "note", default)]
    pub bio: String,
    #[serde(rename = "url", default)]
    pub profile_url: String,
    #[serde(rename = "avatar", default)]
    pub avatar_url: String,
    #[serde(rename = "header", default)]
    pub header_image_url: String,
    /// Whether follow requests need manual approval
    #[serde(rename = "locked", default)]
    pub requires_follow_approval: bool,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub statuses_count: u64,
    #[serde(default, with = "nested::many")]
    pub emojis: Vec<Emoji>,
}

impl Account {
    /// Whether the account lives on the instance it was fetched from
    pub fn is_local(&self) -> bool {
        !self.acct.contains('@')
    }

    /// Host part of `acct` for remote accounts
    pub fn remote_host(&self) -> Option<&str> {
        self.acct.split_once('@').map(|(_, host)| host)
    }
}

impl Entity for Account {
    const KIND: ResourceKind = ResourceKind::Account;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn account(acct: &str) -> Account {
        Account::hydrate(json!({
            "id": "1",
            "username": "alice",
            "acct": acct,
            "created_at": "2019-12-08T03:48:33.901Z",
            "emojis": [{"shortcode": "blob", "url": "https://x/e.png", "static_url": "https://x/s.png"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_local_and_remote_accounts() {
        let local = account("alice");
        assert!(local.is_local());
        assert_eq!(local.remote_host(), None);

        let remote = account("alice@remote.example");
        assert!(!remote.is_local());
        assert_eq!(remote.remote_host(), Some("remote.example"));
    }

    #[test]
    fn test_optional_wire_fields_default() {
        let account = account("alice");
        assert_eq!(account.followers_count, 0);
        assert!(!account.requires_follow_approval);
        assert_eq!(account.emojis[0].shortcode, "blob");
        assert!(account.created_at.is_some());
    }

    #[test]
    fn test_export_uses_wire_names_and_tags_nested_records() {
        let record = account("alice").export().unwrap();
        assert_eq!(record["kind"], "account");
        assert_eq!(record["locked"], false);
        assert!(record.get("requires_follow_approval").is_none());
        assert_eq!(record["emojis"][0]["kind"], "emoji");

        let rebuilt = Account::from_record(record).unwrap();
        assert_eq!(rebuilt, account("alice"));
    }
}
