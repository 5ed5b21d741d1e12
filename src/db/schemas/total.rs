//! Running-total document schema
//!
//! A single document holds the jar-wide total. It is created lazily at
//! startup (and defensively on first write) and only ever mutated by a
//! positive `$inc`.

use bson::{oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for the singleton total
pub const TOTAL_COLLECTION: &str = "totals";

/// The jar-wide running total
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TotalDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Sum of all accepted contribution amounts
    #[serde(default)]
    pub total: i64,
}

impl IntoIndexes for TotalDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        // Singleton collection, nothing worth indexing.
        vec![]
    }
}

impl MutMetadata for TotalDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
