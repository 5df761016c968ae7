//! Populate directive: the `populate` query parameter
//!
//! `populate=custom,4,createdAt,@price` reads as: sanitized response, depth 4,
//! keep `createdAt` despite the drop-list, extract every `price` field.

use cdp_common::{Error, Result, Settings};

/// Prefix marking a field for the specific-fields side-channel
pub const SPECIFIC_FIELD_MARKER: char = '@';

/// Response shape requested by the directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulateMode {
    /// Populated rows returned as stored
    Deep,
    /// Populated rows passed through the sanitizer
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateDirective {
    pub mode: PopulateMode,
    /// Depth override; the configured default applies otherwise
    pub depth: Option<u32>,
    /// Fields removed from the drop-list for this request
    pub kept_fields: Vec<String>,
    /// Fields whose values are also returned in `specificFields`
    pub specific_fields: Vec<String>,
}

impl PopulateDirective {
    /// Parse a raw `populate` value.
    ///
    /// Returns `Ok(None)` when the first element is not a mode tag, so other
    /// populate syntaxes pass through untouched. A depth outside
    /// `1..=settings.max_depth` is rejected.
    pub fn parse(raw: &str, settings: &Settings) -> Result<Option<Self>> {
        let mut parts = raw.split(',').map(str::trim);

        let mode = match parts.next() {
            Some("deep") => PopulateMode::Deep,
            Some("custom") => PopulateMode::Custom,
            _ => return Ok(None),
        };

        let mut parts = parts.filter(|part| !part.is_empty()).peekable();

        let leading_number = parts.peek().map(|part| part.parse::<i64>());
        let depth = match leading_number {
            Some(Ok(depth)) => {
                parts.next();
                Some(settings.check_depth(depth)?)
            }
            _ => None,
        };

        let mut kept_fields = Vec::new();
        let mut specific_fields = Vec::new();
        for part in parts {
            match part.strip_prefix(SPECIFIC_FIELD_MARKER) {
                Some("") => {
                    return Err(Error::InvalidInput(format!(
                        "Empty field name after '{}'",
                        SPECIFIC_FIELD_MARKER
                    )))
                }
                Some(field) => specific_fields.push(field.to_string()),
                None => kept_fields.push(part.to_string()),
            }
        }

        Ok(Some(Self {
            mode,
            depth,
            kept_fields,
            specific_fields,
        }))
    }

    pub fn depth_or(&self, default_depth: u32) -> u32 {
        self.depth.unwrap_or(default_depth)
    }
}
