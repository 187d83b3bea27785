//! Timelines

use super::status::Status;
use crate::error::{Error, Result};
use crate::resource::registry::nested;
use crate::resource::{Entity, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of a timeline, newest first
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default, with = "nested::many")]
    pub statuses: Vec<Status>,
}

impl Timeline {
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

impl Entity for Timeline {
    const KIND: ResourceKind = ResourceKind::Timeline;

    /// The API answers with a bare array of statuses
    fn hydrate(body: Value) -> Result<Self> {
        let body = match body {
            Value::Array(statuses) => serde_json::json!({ "statuses": statuses }),
            other => other,
        };
        serde_json::from_value(body)
            .map_err(|e| Error::malformed("malformed timeline payload", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(id: &str) -> Value {
        json!({"id": id, "account": {"id": "1", "username": "alice", "acct": "alice"}})
    }

    #[test]
    fn test_hydrate_from_bare_array() {
        let timeline = Timeline::hydrate(json!([status("3"), status("2"), status("1")])).unwrap();
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline.statuses[0].id, "3");
    }

    #[test]
    fn test_export_wraps_statuses() {
        let timeline = Timeline::hydrate(json!([status("1")])).unwrap();
        let record = timeline.export().unwrap();
        assert_eq!(record["kind"], "timeline");
        assert_eq!(record["statuses"][0]["kind"], "status");
        assert_eq!(Timeline::from_record(record).unwrap(), timeline);
    }

    #[test]
    fn test_empty_timeline() {
        assert!(Timeline::hydrate(json!([])).unwrap().is_empty());
        assert!(Timeline::hydrate(json!("nope")).unwrap_err().is_invalid_payload());
    }
}
