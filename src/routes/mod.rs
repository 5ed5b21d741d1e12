//! HTTP routes for cookiejar

pub mod cookies;
pub mod health;
pub mod uploads;

pub use cookies::{handle_add_cookies, handle_get_cookies};
pub use health::{health_check, readiness_check, version_info};
pub use uploads::handle_upload_fetch;
