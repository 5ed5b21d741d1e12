//! Contribution log document schema

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for contribution log entries
pub const CONTRIBUTION_COLLECTION: &str = "contributions";

/// One contribution event (or, under the aggregate policy, the running
/// roll-up for a (city, state, country, type) key)
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ContributionDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    pub city: String,
    pub state: String,
    pub country: String,

    #[serde(rename = "cookieType")]
    pub cookie_type: String,

    /// Cookies in this submission (aggregate policy: running sum for the key)
    pub cookies: i64,

    /// Submission time; refreshed on every hit under the aggregate policy
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,

    /// URL or path of the stored photo, when one was uploaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,

    /// Geocoded coordinates, when geocoding is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl ContributionDoc {
    pub fn new(
        city: String,
        state: String,
        country: String,
        cookie_type: String,
        cookies: i64,
        timestamp: DateTime<Utc>,
        photo: Option<String>,
        coords: Option<(f64, f64)>,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            city,
            state,
            country,
            cookie_type,
            cookies,
            timestamp,
            photo,
            latitude: coords.map(|(lat, _)| lat),
            longitude: coords.map(|(_, lon)| lon),
        }
    }
}

impl IntoIndexes for ContributionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "timestamp": 1 },
                Some(
                    IndexOptions::builder()
                        .name("timestamp_index".to_string())
                        .build(),
                ),
            ),
            // Key used by the aggregate log policy's upsert.
            (
                doc! { "city": 1, "state": 1, "country": 1, "cookieType": 1 },
                Some(
                    IndexOptions::builder()
                        .name("location_type_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ContributionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_splits_coordinates() {
        let doc = ContributionDoc::new(
            "Austin".into(),
            "TX".into(),
            "USA".into(),
            "chocolate chip".into(),
            3,
            Utc::now(),
            None,
            Some((30.2672, -97.7431)),
        );
        assert_eq!(doc.latitude, Some(30.2672));
        assert_eq!(doc.longitude, Some(-97.7431));
        assert!(doc.photo.is_none());
    }

    #[test]
    fn test_index_covers_aggregate_key() {
        let indices = ContributionDoc::into_indices();
        let (keys, _) = &indices[1];
        for field in ["city", "state", "country", "cookieType"] {
            assert!(keys.contains_key(field), "missing {field} in aggregate key");
        }
    }
}
