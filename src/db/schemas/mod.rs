//! Document schemas for the three collections

pub mod contribution;
pub mod cookie_type;
pub mod metadata;
pub mod total;

pub use contribution::{ContributionDoc, CONTRIBUTION_COLLECTION};
pub use cookie_type::{TypeCountDoc, TYPE_COLLECTION};
pub use metadata::Metadata;
pub use total::{TotalDoc, TOTAL_COLLECTION};
