//! Request validation and response shapes

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::schemas::{ContributionDoc, TypeCountDoc};
use crate::photos::{photo_allowed, UploadedPhoto};
use crate::types::{JarError, Result};

/// A validated contribution, ready for the write path
#[derive(Debug)]
pub struct NewContribution {
    pub cookies: i64,
    pub city: String,
    pub state: String,
    pub country: String,
    pub cookie_type: String,
    pub photo: Option<UploadedPhoto>,
}

impl NewContribution {
    /// Validate raw form fields into a contribution.
    ///
    /// Checks run in a fixed order and fail fast: the amount first, then
    /// the location/type strings, then the photo allow-set. Nothing has
    /// been written anywhere when any of these reject.
    pub fn from_form(
        fields: &HashMap<String, String>,
        photo: Option<UploadedPhoto>,
    ) -> Result<Self> {
        let cookies = parse_cookies(fields.get("cookies").map(String::as_str))?;

        let city = require_field(fields, "city")?;
        let state = require_field(fields, "state")?;
        let country = require_field(fields, "country")?;
        let cookie_type = require_field(fields, "cookieType")?;

        if let Some(photo) = &photo {
            if !photo_allowed(&photo.file_name, &photo.content_type) {
                return Err(JarError::Validation(
                    "only image files are allowed (jpeg, jpg, png, gif)".to_string(),
                ));
            }
        }

        Ok(Self {
            cookies,
            city,
            state,
            country,
            cookie_type,
            photo,
        })
    }
}

fn parse_cookies(raw: Option<&str>) -> Result<i64> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| JarError::Validation("cookies is required".to_string()))?;

    let cookies: i64 = raw
        .parse()
        .map_err(|_| JarError::Validation("cookies must be a whole number".to_string()))?;

    if cookies <= 0 {
        return Err(JarError::Validation(
            "cookies must be strictly positive".to_string(),
        ));
    }

    Ok(cookies)
}

fn require_field(fields: &HashMap<String, String>, name: &str) -> Result<String> {
    fields
        .get(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| JarError::Validation(format!("{} is required", name)))
}

/// The envelope both routes answer with
#[derive(Debug, Serialize)]
pub struct StatsEnvelope {
    pub total: i64,
    pub types: Vec<TypeView>,
    pub locations: Vec<LocationView>,
}

/// Per-type count as served over the wire
#[derive(Debug, Serialize)]
pub struct TypeView {
    #[serde(rename = "type")]
    pub name: String,
    pub count: i64,
}

impl From<TypeCountDoc> for TypeView {
    fn from(doc: TypeCountDoc) -> Self {
        Self {
            name: doc.name,
            count: doc.count,
        }
    }
}

/// Contribution log entry as served over the wire
#[derive(Debug, Serialize)]
pub struct LocationView {
    pub city: String,
    pub state: String,
    pub country: String,
    #[serde(rename = "cookieType")]
    pub cookie_type: String,
    pub cookies: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl From<ContributionDoc> for LocationView {
    fn from(doc: ContributionDoc) -> Self {
        Self {
            city: doc.city,
            state: doc.state,
            country: doc.country,
            cookie_type: doc.cookie_type,
            cookies: doc.cookies,
            timestamp: doc.timestamp,
            photo: doc.photo,
            latitude: doc.latitude,
            longitude: doc.longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn valid_fields() -> HashMap<String, String> {
        fields(&[
            ("cookies", "3"),
            ("city", "Austin"),
            ("state", "TX"),
            ("country", "USA"),
            ("cookieType", "chocolate chip"),
        ])
    }

    #[test]
    fn test_valid_form_passes() {
        let req = NewContribution::from_form(&valid_fields(), None).unwrap();
        assert_eq!(req.cookies, 3);
        assert_eq!(req.city, "Austin");
        assert_eq!(req.cookie_type, "chocolate chip");
    }

    #[test]
    fn test_missing_cookies_rejected() {
        let mut f = valid_fields();
        f.remove("cookies");
        assert!(matches!(
            NewContribution::from_form(&f, None),
            Err(JarError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_and_negative_cookies_rejected() {
        for bad in ["0", "-2"] {
            let mut f = valid_fields();
            f.insert("cookies".into(), bad.into());
            assert!(
                matches!(NewContribution::from_form(&f, None), Err(JarError::Validation(_))),
                "cookies={bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_non_numeric_cookies_rejected() {
        let mut f = valid_fields();
        f.insert("cookies".into(), "a dozen".into());
        assert!(matches!(
            NewContribution::from_form(&f, None),
            Err(JarError::Validation(_))
        ));
    }

    #[test]
    fn test_each_string_field_required() {
        for field in ["city", "state", "country", "cookieType"] {
            let mut f = valid_fields();
            f.remove(field);
            assert!(
                NewContribution::from_form(&f, None).is_err(),
                "missing {field} should be rejected"
            );

            let mut f = valid_fields();
            f.insert(field.into(), "   ".into());
            assert!(
                NewContribution::from_form(&f, None).is_err(),
                "blank {field} should be rejected"
            );
        }
    }

    #[test]
    fn test_disallowed_photo_rejected() {
        let photo = UploadedPhoto {
            file_name: "notes.txt".into(),
            content_type: "text/plain".into(),
            data: vec![1, 2, 3],
        };
        assert!(matches!(
            NewContribution::from_form(&valid_fields(), Some(photo)),
            Err(JarError::Validation(_))
        ));
    }

    #[test]
    fn test_allowed_photo_passes() {
        let photo = UploadedPhoto {
            file_name: "cookie.jpg".into(),
            content_type: "image/jpeg".into(),
            data: vec![0xFF, 0xD8],
        };
        let req = NewContribution::from_form(&valid_fields(), Some(photo)).unwrap();
        assert!(req.photo.is_some());
    }

    #[test]
    fn test_envelope_uses_source_field_names() {
        let envelope = StatsEnvelope {
            total: 3,
            types: vec![TypeView {
                name: "chocolate chip".into(),
                count: 3,
            }],
            locations: vec![LocationView {
                city: "Austin".into(),
                state: "TX".into(),
                country: "USA".into(),
                cookie_type: "chocolate chip".into(),
                cookies: 3,
                timestamp: Utc::now(),
                photo: None,
                latitude: None,
                longitude: None,
            }],
        };

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["total"], 3);
        assert_eq!(json["types"][0]["type"], "chocolate chip");
        assert_eq!(json["locations"][0]["cookieType"], "chocolate chip");
        // Absent photo is omitted rather than serialized as null.
        assert!(json["locations"][0].get("photo").is_none());
    }
}
