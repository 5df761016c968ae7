//! HTTP API handlers for cdp-api

pub mod buildinfo;
pub mod content;
pub mod content_types;
pub mod error;
pub mod health;
pub mod plan;

pub use buildinfo::get_build_info;
pub use content::get_content;
pub use content_types::list_content_types;
pub use error::ApiError;
pub use health::health_routes;
pub use plan::get_plan;
