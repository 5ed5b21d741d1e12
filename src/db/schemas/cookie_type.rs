//! Per-type count document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for per-type counts
pub const TYPE_COLLECTION: &str = "cookie_types";

/// Running count for one cookie type
///
/// One document per distinct type ever submitted. Created and incremented
/// exclusively through an atomic `$inc` upsert keyed on `type`, so the
/// count never loses updates under concurrent writers.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TypeCountDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Cookie type label, unique per document
    #[serde(rename = "type")]
    pub name: String,

    /// Total cookies submitted under this type
    #[serde(default)]
    pub count: i64,
}

impl IntoIndexes for TypeCountDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "type": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("type_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for TypeCountDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_source_field_name() {
        let doc = TypeCountDoc {
            _id: None,
            metadata: Metadata::default(),
            name: "chocolate chip".to_string(),
            count: 3,
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["type"], "chocolate chip");
        assert_eq!(json["count"], 3);
    }

    #[test]
    fn test_unique_index_on_type() {
        let indices = TypeCountDoc::into_indices();
        assert_eq!(indices.len(), 1);
        let (keys, opts) = &indices[0];
        assert!(keys.contains_key("type"));
        assert_eq!(opts.as_ref().unwrap().unique, Some(true));
    }
}
