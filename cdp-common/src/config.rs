//! Configuration loading and root folder resolution
//!
//! The root folder holds everything a deployment needs:
//! - `cdp.db`: content store
//! - `schemas/`: content type and component schema files
//! - `config.toml`: deep populate settings (`[deep_populate]` table)

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::sanitize::SanitizationConfig;
use crate::{Error, Result};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "CDP_ROOT_FOLDER";

const DATABASE_FILE: &str = "cdp.db";
const SCHEMA_DIR: &str = "schemas";
const SETTINGS_FILE: &str = "config.toml";

/// Root folder resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `root_folder` key of the user TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root_folder) = user_config_file().and_then(|path| root_folder_from_file(&path)) {
        return root_folder;
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

fn root_folder_from_file(path: &Path) -> Option<PathBuf> {
    let content = std::fs::read_to_string(path).ok()?;
    let config = toml::from_str::<toml::Value>(&content).ok()?;
    config
        .get("root_folder")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
}

/// User config file: `<config dir>/cdp/config.toml`, then `/etc/cdp/config.toml` on Linux
fn user_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("cdp").join("config.toml"));
    if let Some(path) = user_config.filter(|p| p.exists()) {
        return Some(path);
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/cdp/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cdp"))
        .unwrap_or_else(|| PathBuf::from("./cdp_data"))
}

/// Paths inside a resolved root folder
#[derive(Debug, Clone)]
pub struct RootFolder {
    root: PathBuf,
}

impl RootFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn schema_dir(&self) -> PathBuf {
        self.root.join(SCHEMA_DIR)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    /// Create the root folder if it doesn't exist
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }
}

pub fn default_unnecessary_fields() -> Vec<String> {
    ["createdAt", "updatedAt", "publishedAt", "createdBy", "updatedBy"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn default_fields_to_keep_in_image() -> Vec<String> {
    vec!["url".to_string(), "alternativeText".to_string()]
}

fn default_depth() -> u32 {
    10
}

fn default_max_depth() -> u32 {
    20
}

fn default_true() -> bool {
    true
}

/// Deep populate settings (`[deep_populate]` table)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Depth used when a request does not give one
    #[serde(default = "default_depth", alias = "defaultDepth")]
    pub default_depth: u32,

    /// Largest depth a request may ask for
    #[serde(default = "default_max_depth", alias = "maxDepth")]
    pub max_depth: u32,

    /// Fields dropped from sanitized responses and never expanded
    #[serde(default = "default_unnecessary_fields", alias = "unnecessaryFields")]
    pub unnecessary_fields: Vec<String>,

    /// Fields kept when an object is recognized as an image
    #[serde(default = "default_fields_to_keep_in_image", alias = "fieldsToKeepInImage")]
    pub fields_to_keep_in_image: Vec<String>,

    /// Collapse same-name and content-type wrapper objects
    #[serde(default = "default_true", alias = "removeNestedFieldsWithSameName")]
    pub remove_nested_fields_with_same_name: bool,

    /// Leave `createdBy` / `updatedBy` (admin users) out of populate plans
    #[serde(default, alias = "skipCreatorFields")]
    pub skip_creator_fields: bool,

    /// Add format urls (`urlThumb`, `urlM`, `urlS`, `urlL`) to images
    #[serde(default, alias = "imageFormats")]
    pub image_formats: bool,

    /// Replace image objects by their url
    #[serde(default, alias = "imageInline")]
    pub image_inline: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            max_depth: default_max_depth(),
            unnecessary_fields: default_unnecessary_fields(),
            fields_to_keep_in_image: default_fields_to_keep_in_image(),
            remove_nested_fields_with_same_name: true,
            skip_creator_fields: false,
            image_formats: false,
            image_inline: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default, alias = "deepPopulate")]
    deep_populate: Option<Settings>,
}

impl Settings {
    /// Parse settings from TOML text; a missing table yields defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: SettingsFile =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        let settings = file.deep_populate.unwrap_or_default();
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file.
    ///
    /// A missing file is not fatal: defaults are used and a warning logged.
    /// A malformed file is rejected.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Settings file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_depth < 1 {
            return Err(Error::Config(
                "default_depth must be at least 1".to_string(),
            ));
        }
        if self.max_depth < self.default_depth {
            return Err(Error::Config(format!(
                "max_depth ({}) must not be below default_depth ({})",
                self.max_depth, self.default_depth
            )));
        }
        if self.fields_to_keep_in_image.iter().any(|f| f.is_empty()) {
            return Err(Error::Config(
                "fields_to_keep_in_image contains an empty field name".to_string(),
            ));
        }
        Ok(())
    }

    /// Check a depth taken from a request against `1..=max_depth`
    pub fn check_depth(&self, depth: i64) -> Result<u32> {
        if depth < 1 || depth > i64::from(self.max_depth) {
            return Err(Error::InvalidInput(format!(
                "Populate depth must be between 1 and {}, got {}",
                self.max_depth, depth
            )));
        }
        u32::try_from(depth).map_err(|e| Error::InvalidInput(e.to_string()))
    }

    /// Drop-list for one request: the unnecessary fields minus those the
    /// request asked to keep
    pub fn drop_list(&self, kept_fields: &[String]) -> Vec<String> {
        self.unnecessary_fields
            .iter()
            .filter(|field| !kept_fields.contains(field))
            .cloned()
            .collect()
    }

    /// Sanitizer options for one request
    pub fn sanitization_config(
        &self,
        kept_fields: &[String],
        specific_fields: &[String],
    ) -> SanitizationConfig {
        SanitizationConfig {
            fields_to_drop: self.drop_list(kept_fields).into_iter().collect(),
            image_allow_list: self.fields_to_keep_in_image.clone(),
            collapse_same_name_wrappers: self.remove_nested_fields_with_same_name,
            collapse_type_wrappers: self.remove_nested_fields_with_same_name,
            expand_image_formats: self.image_formats,
            inline_images: self.image_inline,
            specific_fields: specific_fields.iter().cloned().collect::<HashSet<_>>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.default_depth, 10);
        assert_eq!(settings.max_depth, 20);
        assert_eq!(
            settings.unnecessary_fields,
            vec!["createdAt", "updatedAt", "publishedAt", "createdBy", "updatedBy"]
        );
        assert_eq!(settings.fields_to_keep_in_image, vec!["url", "alternativeText"]);
        assert!(settings.remove_nested_fields_with_same_name);
        assert!(!settings.skip_creator_fields);
        assert!(!settings.image_formats);
        assert!(!settings.image_inline);
    }

    #[test]
    fn test_check_depth_bounds() {
        let settings = Settings::default();
        assert_eq!(settings.check_depth(1).unwrap(), 1);
        assert_eq!(settings.check_depth(20).unwrap(), 20);
        for depth in [0, -3, 21, 1_000_000, i64::MAX] {
            assert!(matches!(
                settings.check_depth(depth),
                Err(Error::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_max_depth_below_default_rejected() {
        let settings = Settings {
            default_depth: 10,
            max_depth: 5,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(Error::Config(msg)) if msg.contains("max_depth")));
    }

    #[test]
    fn test_drop_list_honors_kept_fields() {
        let settings = Settings::default();
        let kept = vec!["createdAt".to_string(), "notDropped".to_string()];
        assert_eq!(
            settings.drop_list(&kept),
            vec!["updatedAt", "publishedAt", "createdBy", "updatedBy"]
        );
    }

    #[test]
    fn test_sanitization_config_mapping() {
        let settings = Settings {
            remove_nested_fields_with_same_name: false,
            image_formats: true,
            image_inline: true,
            ..Settings::default()
        };
        let config = settings.sanitization_config(&[], &["price".to_string()]);

        assert!(!config.collapse_same_name_wrappers);
        assert!(!config.collapse_type_wrappers);
        assert!(config.expand_image_formats);
        assert!(config.inline_images);
        assert!(config.specific_fields.contains("price"));
        assert_eq!(config.fields_to_drop.len(), 5);
    }

    #[test]
    fn test_root_folder_paths() {
        let root = RootFolder::new("/srv/cdp");
        assert_eq!(root.database_path(), PathBuf::from("/srv/cdp/cdp.db"));
        assert_eq!(root.schema_dir(), PathBuf::from("/srv/cdp/schemas"));
        assert_eq!(root.settings_path(), PathBuf::from("/srv/cdp/config.toml"));
    }
}
