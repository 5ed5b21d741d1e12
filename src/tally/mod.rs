//! The tally core: validation, aggregation, and the stats envelope
//!
//! Owns the three-collection counting model (running total, per-type
//! counts, contribution log) and coordinates the geocoder and photo
//! storage collaborators around it.

pub mod model;
pub mod service;

pub use model::{LocationView, NewContribution, StatsEnvelope, TypeView};
pub use service::TallyService;
