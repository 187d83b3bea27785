//! Resource Registry - the closed set of resource kinds
//!
//! Every entity the library knows about is listed once in the
//! `resource_kinds!` invocation below. That single list generates
//! [`ResourceKind`], the kind-to-constructor table used to rebuild exported
//! records, and [`AnyResource`], so adding a kind without a matching
//! [`Entity`] implementation fails to compile.

use super::cache::CacheEntry;
use super::lazy::Resource;
use crate::api::client::ClientHandle;
use crate::entity::{
    Account, Application, Emoji, Instance, MediaAttachment, Mention, Metadata, Status, Tag,
    Timeline,
};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Name of the discriminator field in exported records
pub const KIND_FIELD: &str = "kind";

/// Field mapping between the wire format and a typed entity
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: ResourceKind;

    /// Build the entity from a decoded API response body
    fn hydrate(body: Value) -> Result<Self> {
        serde_json::from_value(body)
            .map_err(|e| Error::malformed(format!("malformed {} payload", Self::KIND), e))
    }

    /// Export as a record: the `kind` tag plus every attribute at top level
    fn export(&self) -> Result<Value> {
        let mut record = serde_json::to_value(self)
            .map_err(|e| Error::malformed(format!("cannot export {}", Self::KIND), e))?;
        match record {
            Value::Object(ref mut fields) => {
                fields.insert(KIND_FIELD.to_string(), Value::from(Self::KIND.as_str()));
                Ok(record)
            }
            _ => Err(Error::invalid_payload(format!(
                "{} does not export as an object",
                Self::KIND
            ))),
        }
    }

    /// Rebuild the entity from an exported record
    fn from_record(record: Value) -> Result<Self> {
        let Value::Object(mut fields) = record else {
            return Err(Error::invalid_payload("record is not a JSON object"));
        };
        let kind = take_kind(&mut fields)?;
        if kind != Self::KIND {
            return Err(Error::invalid_payload(format!(
                "expected a {} record, found {}",
                Self::KIND,
                kind
            )));
        }
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| Error::malformed(format!("malformed {} record", Self::KIND), e))
    }
}

fn take_kind(fields: &mut serde_json::Map<String, Value>) -> Result<ResourceKind> {
    match fields.remove(KIND_FIELD) {
        Some(Value::String(tag)) => tag.parse(),
        Some(_) => Err(Error::invalid_payload("record kind is not a string")),
        None => Err(Error::invalid_payload("record has no kind discriminator")),
    }
}

macro_rules! resource_kinds {
    ($($variant:ident => $tag:literal),+ $(,)?) => {
        /// Discriminator for every resource the library can represent
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum ResourceKind {
            $($variant),+
        }

        impl ResourceKind {
            pub const ALL: &'static [ResourceKind] = &[$(ResourceKind::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(ResourceKind::$variant => $tag),+
                }
            }
        }

        impl FromStr for ResourceKind {
            type Err = Error;

            fn from_str(tag: &str) -> Result<Self> {
                match tag {
                    $($tag => Ok(ResourceKind::$variant),)+
                    other => Err(Error::invalid_payload(format!("unknown resource kind `{other}`"))),
                }
            }
        }

        /// A resource of any kind, as produced by importing an exported record
        #[derive(Debug, Clone)]
        pub enum AnyResource {
            $($variant(Arc<Resource<$variant>>)),+
        }

        impl AnyResource {
            pub fn kind(&self) -> ResourceKind {
                match self {
                    $(AnyResource::$variant(_) => ResourceKind::$variant),+
                }
            }

            /// Rebuild a resolved resource from its exported record.
            /// Unknown or missing discriminators are rejected.
            pub fn from_record(record: Value, client: ClientHandle) -> Result<Self> {
                let kind = match record.get(KIND_FIELD) {
                    Some(Value::String(tag)) => tag.parse::<ResourceKind>()?,
                    Some(_) => return Err(Error::invalid_payload("record kind is not a string")),
                    None => return Err(Error::invalid_payload("record has no kind discriminator")),
                };
                match kind {
                    $(ResourceKind::$variant => Ok(AnyResource::$variant(Arc::new(
                        Resource::from_record(record, client)?,
                    )))),+
                }
            }

            /// Export the wrapped resource, resolving it first if needed
            pub async fn export(&self) -> Result<Value> {
                match self {
                    $(AnyResource::$variant(resource) => resource.export().await),+
                }
            }

            pub(crate) fn into_entry(self) -> Arc<dyn CacheEntry> {
                match self {
                    $(AnyResource::$variant(resource) => resource as Arc<dyn CacheEntry>),+
                }
            }
        }

        $(
            impl From<Arc<Resource<$variant>>> for AnyResource {
                fn from(resource: Arc<Resource<$variant>>) -> Self {
                    AnyResource::$variant(resource)
                }
            }
        )+
    };
}

resource_kinds! {
    Account => "account",
    Status => "status",
    Instance => "instance",
    Application => "application",
    Timeline => "timeline",
    MediaAttachment => "media_attachment",
    Mention => "mention",
    Tag => "tag",
    Emoji => "emoji",
    Metadata => "metadata",
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serde adapters for entities embedded inside other entities.
///
/// On export a nested entity is written as a full record (with its own
/// `kind`); on read the `kind` is optional, since API responses never carry
/// it, but when present it must match the field's type.
pub(crate) mod nested {
    use super::{Entity, KIND_FIELD};
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    struct Tagged<'a, T>(&'a T);

    impl<T: Entity> Serialize for Tagged<'_, T> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            self.0
                .export()
                .map_err(S::Error::custom)?
                .serialize(serializer)
        }
    }

    struct Checked<T>(T);

    impl<'de, T: Entity> Deserialize<'de> for Checked<T> {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let mut value = Value::deserialize(deserializer)?;
            if let Value::Object(fields) = &mut value {
                if let Some(kind) = fields.remove(KIND_FIELD) {
                    if kind.as_str() != Some(T::KIND.as_str()) {
                        return Err(D::Error::custom(format!(
                            "expected nested {} record, found kind {}",
                            T::KIND,
                            kind
                        )));
                    }
                }
            }
            T::deserialize(value).map(Checked).map_err(D::Error::custom)
        }
    }

    pub mod one {
        use super::*;

        pub fn serialize<T: Entity, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
            Tagged(value).serialize(s)
        }

        pub fn deserialize<'de, T: Entity, D: Deserializer<'de>>(d: D) -> Result<T, D::Error> {
            Checked::<T>::deserialize(d).map(|c| c.0)
        }
    }

    pub mod option {
        use super::*;

        pub fn serialize<T: Entity, S: Serializer>(
            value: &Option<T>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            value.as_ref().map(Tagged).serialize(s)
        }

        pub fn deserialize<'de, T: Entity, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<T>, D::Error> {
            Ok(Option::<Checked<T>>::deserialize(d)?.map(|c| c.0))
        }
    }

    pub mod boxed {
        use super::*;

        pub fn serialize<T: Entity, S: Serializer>(
            value: &Option<Box<T>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            value.as_deref().map(Tagged).serialize(s)
        }

        pub fn deserialize<'de, T: Entity, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<Box<T>>, D::Error> {
            Ok(Option::<Checked<T>>::deserialize(d)?.map(|c| Box::new(c.0)))
        }
    }

    pub mod many {
        use super::*;

        pub fn serialize<T: Entity, S: Serializer>(value: &[T], s: S) -> Result<S::Ok, S::Error> {
            s.collect_seq(value.iter().map(Tagged))
        }

        pub fn deserialize<'de, T: Entity, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Vec<T>, D::Error> {
            let items = Option::<Vec<Checked<T>>>::deserialize(d)?.unwrap_or_default();
            Ok(items.into_iter().map(|c| c.0).collect())
        }
    }

    pub mod map {
        use super::*;
        use std::collections::BTreeMap;

        pub fn serialize<T: Entity, S: Serializer>(
            value: &BTreeMap<String, T>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            s.collect_map(value.iter().map(|(k, v)| (k, Tagged(v))))
        }

        pub fn deserialize<'de, T: Entity, D: Deserializer<'de>>(
            d: D,
        ) -> Result<BTreeMap<String, T>, D::Error> {
            let entries = Option::<BTreeMap<String, Checked<T>>>::deserialize(d)?.unwrap_or_default();
            Ok(entries.into_iter().map(|(k, c)| (k, c.0)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_kind_round_trips_through_its_tag() {
        for kind in ResourceKind::ALL {
            let parsed: ResourceKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, *kind);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                Value::from(kind.as_str()),
                "serde name should match the record tag"
            );
        }
        assert_eq!(ResourceKind::ALL.len(), 10);
    }

    #[test]
    fn test_unknown_kind_is_invalid_payload() {
        let err = "Phediverse\\Account".parse::<ResourceKind>().unwrap_err();
        assert!(err.is_invalid_payload());
    }

    #[test]
    fn test_record_without_kind_is_rejected() {
        let err = AnyResource::from_record(json!({"name": "x"}), ClientHandle::detached()).unwrap_err();
        assert!(err.is_invalid_payload());
    }

    #[test]
    fn test_record_with_unknown_kind_is_rejected() {
        let record = json!({"kind": "poll", "id": "1"});
        let err = AnyResource::from_record(record, ClientHandle::detached()).unwrap_err();
        assert!(err.to_string().contains("unknown resource kind `poll`"));
    }

    #[test]
    fn test_entity_record_kind_must_match() {
        let record = json!({"kind": "emoji", "name": "rust", "url": "https://x/tags/rust"});
        let err = Tag::from_record(record).unwrap_err();
        assert!(err.to_string().contains("expected a tag record"));
    }

    #[test]
    fn test_import_tag_record() {
        let record = json!({"kind": "tag", "name": "rust", "url": "https://x/tags/rust"});
        let resource = AnyResource::from_record(record, ClientHandle::detached()).unwrap();
        assert_eq!(resource.kind(), ResourceKind::Tag);
        let AnyResource::Tag(tag) = resource else {
            panic!("expected a tag");
        };
        assert_eq!(tag.peek().unwrap().name, "rust");
    }
}
