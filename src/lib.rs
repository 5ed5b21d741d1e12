//! cookiejar - cookie tally REST service
//!
//! Keeps a running count of contributed cookies in MongoDB: one global
//! total, a per-type breakdown, and a log of submissions with the city,
//! state and country they came from.
//!
//! ## Optional capabilities
//!
//! - **Geocoding**: resolve submitted locations to coordinates through a
//!   Nominatim-compatible provider before accepting them
//! - **Photo uploads**: attach a photo to a submission, stored on local
//!   disk (served back under /uploads/) or in S3
//! - **Photo normalization**: cap stored photos at 800px wide, re-encoded
//!   as JPEG
//! - **Log policy**: append one document per submission, or aggregate by
//!   (city, state, country, type)
//!
//! All of the above are runtime configuration, see [`config::Args`].

pub mod config;
pub mod db;
pub mod geocode;
pub mod photos;
pub mod routes;
pub mod server;
pub mod tally;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{JarError, Result};
