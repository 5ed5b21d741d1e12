//! The aggregation service
//!
//! All mutations go through atomic store primitives: the running total and
//! the per-type counts are `$inc` upserts, never read-then-write, so
//! concurrent writers cannot lose updates. The three mutations of one
//! submission are NOT wrapped in a transaction; a crash mid-write can
//! leave the counters drifted, which later reads surface as-is.

use std::sync::Arc;

use bson::doc;
use chrono::Utc;
use tracing::{debug, info};

use crate::config::LogPolicy;
use crate::db::schemas::{
    ContributionDoc, TotalDoc, TypeCountDoc, CONTRIBUTION_COLLECTION, TOTAL_COLLECTION,
    TYPE_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::geocode::GeocodeClient;
use crate::photos::{self, PhotoStore, UploadedPhoto};
use crate::tally::model::{LocationView, NewContribution, StatsEnvelope, TypeView};
use crate::types::{JarError, Result};

pub struct TallyService {
    totals: MongoCollection<TotalDoc>,
    types: MongoCollection<TypeCountDoc>,
    contributions: MongoCollection<ContributionDoc>,
    mongo: MongoClient,
    geocoder: Option<GeocodeClient>,
    photos: Option<Arc<dyn PhotoStore>>,
    normalize_photos: bool,
    log_policy: LogPolicy,
}

impl TallyService {
    /// Wire up the service and make sure the singleton total exists
    pub async fn new(
        mongo: MongoClient,
        geocoder: Option<GeocodeClient>,
        photos: Option<Arc<dyn PhotoStore>>,
        normalize_photos: bool,
        log_policy: LogPolicy,
    ) -> Result<Self> {
        let totals = mongo.collection::<TotalDoc>(TOTAL_COLLECTION).await?;
        let types = mongo.collection::<TypeCountDoc>(TYPE_COLLECTION).await?;
        let contributions = mongo
            .collection::<ContributionDoc>(CONTRIBUTION_COLLECTION)
            .await?;

        let service = Self {
            totals,
            types,
            contributions,
            mongo,
            geocoder,
            photos,
            normalize_photos,
            log_policy,
        };

        service.ensure_total().await?;
        Ok(service)
    }

    /// Whether a geocoder is wired in
    pub fn geocoding_enabled(&self) -> bool {
        self.geocoder.is_some()
    }

    /// Readiness check passthrough
    pub async fn ping(&self) -> Result<()> {
        self.mongo.ping().await
    }

    /// Lazily create the singleton total document.
    ///
    /// `$setOnInsert` keeps this safe against concurrent first boots: at
    /// most one document ever exists.
    async fn ensure_total(&self) -> Result<()> {
        let now = bson::DateTime::now();
        let result = self
            .totals
            .upsert_one(
                doc! {},
                doc! {
                    "$setOnInsert": {
                        "total": 0i64,
                        "metadata.created_at": now,
                        "metadata.updated_at": now,
                    }
                },
            )
            .await?;

        if result.upserted_id.is_some() {
            info!("Initialized cookie total at 0");
        }
        Ok(())
    }

    /// Read path: current total plus full type and location listings.
    ///
    /// Unfiltered full scans by design; this is a toy-scale counter and
    /// the callers expect the complete picture on every read.
    pub async fn get_stats(&self) -> Result<StatsEnvelope> {
        let total = self
            .totals
            .find_one(doc! {})
            .await?
            .map(|d| d.total)
            .unwrap_or(0);

        let types = self.types.find_many(doc! {}).await?;
        let contributions = self.contributions.find_many(doc! {}).await?;

        Ok(Self::envelope(total, types, contributions))
    }

    /// Write path: geocode and store the photo first, then apply the three
    /// counter mutations, then answer with the refreshed stats.
    pub async fn add_contribution(&self, request: NewContribution) -> Result<StatsEnvelope> {
        // Everything that can reject the submission runs before the first
        // database write, so a rejected call leaves no partial state.
        if request.photo.is_some() && self.photos.is_none() {
            return Err(JarError::Validation(
                "photo uploads are not enabled".to_string(),
            ));
        }

        let coords = match &self.geocoder {
            Some(geocoder) => {
                let query = format!("{}, {}, {}", request.city, request.state, request.country);
                match geocoder.resolve(&query).await? {
                    Some(coords) => {
                        debug!(query = %query, lat = coords.0, lon = coords.1, "Location resolved");
                        Some(coords)
                    }
                    None => return Err(JarError::UnresolvableLocation),
                }
            }
            None => None,
        };

        let photo_url = match (&request.photo, &self.photos) {
            (Some(photo), Some(store)) => {
                Some(self.store_photo(photo.clone(), store.as_ref()).await?)
            }
            _ => None,
        };

        let timestamp = Utc::now();
        let total = self.increment_total(request.cookies).await?;
        self.increment_type(&request.cookie_type, request.cookies)
            .await?;
        self.record_contribution(&request, coords, photo_url, timestamp)
            .await?;

        info!(
            cookies = request.cookies,
            cookie_type = %request.cookie_type,
            city = %request.city,
            total,
            "Contribution accepted"
        );

        let types = self.types.find_many(doc! {}).await?;
        let contributions = self.contributions.find_many(doc! {}).await?;
        Ok(Self::envelope(total, types, contributions))
    }

    async fn store_photo(&self, photo: UploadedPhoto, store: &dyn PhotoStore) -> Result<String> {
        if self.normalize_photos {
            let jpeg = photos::normalize(&photo.data)?;
            let name = photos::jpeg_name(&photo.file_name);
            store.store(&name, "image/jpeg", jpeg).await
        } else {
            store
                .store(&photo.file_name, &photo.content_type, photo.data)
                .await
        }
    }

    /// Atomic `$inc` on the singleton, returning the new total
    async fn increment_total(&self, amount: i64) -> Result<i64> {
        let now = bson::DateTime::now();
        let updated = self
            .totals
            .find_one_and_upsert(
                doc! {},
                doc! {
                    "$inc": { "total": amount },
                    "$set": { "metadata.updated_at": now },
                    "$setOnInsert": { "metadata.created_at": now },
                },
            )
            .await?;

        updated
            .map(|d| d.total)
            .ok_or_else(|| JarError::Database("total document missing after upsert".to_string()))
    }

    /// Atomic increment-or-insert keyed on the type label
    async fn increment_type(&self, cookie_type: &str, amount: i64) -> Result<()> {
        let now = bson::DateTime::now();
        self.types
            .upsert_one(
                doc! { "type": cookie_type },
                doc! {
                    "$inc": { "count": amount },
                    "$set": { "metadata.updated_at": now },
                    "$setOnInsert": { "metadata.created_at": now },
                },
            )
            .await?;
        Ok(())
    }

    async fn record_contribution(
        &self,
        request: &NewContribution,
        coords: Option<(f64, f64)>,
        photo_url: Option<String>,
        timestamp: chrono::DateTime<Utc>,
    ) -> Result<()> {
        match self.log_policy {
            LogPolicy::Append => {
                let entry = ContributionDoc::new(
                    request.city.clone(),
                    request.state.clone(),
                    request.country.clone(),
                    request.cookie_type.clone(),
                    request.cookies,
                    timestamp,
                    photo_url,
                    coords,
                );
                self.contributions.insert_one(entry).await
            }
            LogPolicy::Aggregate => {
                let now = bson::DateTime::now();
                let bson_timestamp = bson::DateTime::from_chrono(timestamp);

                let mut set = doc! {
                    "timestamp": bson_timestamp,
                    "metadata.updated_at": now,
                };
                if let Some(url) = &photo_url {
                    set.insert("photo", url);
                }
                if let Some((lat, lon)) = coords {
                    set.insert("latitude", lat);
                    set.insert("longitude", lon);
                }

                self.contributions
                    .upsert_one(
                        doc! {
                            "city": &request.city,
                            "state": &request.state,
                            "country": &request.country,
                            "cookieType": &request.cookie_type,
                        },
                        doc! {
                            "$inc": { "cookies": request.cookies },
                            "$set": set,
                            "$setOnInsert": { "metadata.created_at": now },
                        },
                    )
                    .await?;
                Ok(())
            }
        }
    }

    fn envelope(
        total: i64,
        types: Vec<TypeCountDoc>,
        contributions: Vec<ContributionDoc>,
    ) -> StatsEnvelope {
        StatsEnvelope {
            total,
            types: types.into_iter().map(TypeView::from).collect(),
            locations: contributions.into_iter().map(LocationView::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    // The increment/upsert arithmetic and the interleaving guarantees need
    // a running MongoDB; the validation and projection halves of the write
    // path are covered in tally::model and the photo/geocode modules.
}
