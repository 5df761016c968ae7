//! # Custom Deep Populate Common Library
//!
//! Core of the deep populate service, free of any HTTP or storage concerns:
//! - Content schema model and schema provider
//! - Populate plan builder (schema graph → bounded fetch plan)
//! - Response tree sanitizer (raw nested result → cleaned result)
//! - Settings and root folder resolution
//! - Error types

pub mod config;
pub mod error;
pub mod populate;
pub mod sanitize;
pub mod schema;

pub use config::Settings;
pub use error::{Error, Result};
pub use populate::{PlanBuilder, PopulateMap, PopulatePlan, Traversal};
pub use sanitize::{sanitize, SanitizationConfig, Sanitized};
pub use schema::{AttributeSpec, ContentTypeRegistry, ModelKind, ModelSchema, SchemaProvider, SchemaRegistry};
