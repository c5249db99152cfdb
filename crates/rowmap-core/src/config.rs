//! Mapper configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Settings that change how rows are materialized.
///
/// A config is threaded explicitly into every compilation and the flags that
/// influence compiled code are part of the cache key, so two mappers with
/// different settings never share a materializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Write SQL NULL through to settable members instead of skipping them
    pub apply_null_values: bool,
    /// Ignore underscores when matching column names to members
    pub match_underscores: bool,
    /// Split column used by multi-mapping when none is given
    pub default_split_on: String,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            apply_null_values: false,
            match_underscores: false,
            default_split_on: "Id".to_string(),
        }
    }
}

impl MapperConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether NULL columns overwrite member values.
    pub fn apply_null_values(mut self, apply: bool) -> Self {
        self.apply_null_values = apply;
        self
    }

    /// Set whether underscores are ignored in name matching.
    pub fn match_underscores(mut self, enabled: bool) -> Self {
        self.match_underscores = enabled;
        self
    }

    /// Set the default split column.
    pub fn default_split_on(mut self, column: impl Into<String>) -> Self {
        self.default_split_on = column.into();
        self
    }

    /// Load a configuration from JSON text. Missing keys keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Custom(format!("invalid mapper config: {e}")))
    }

    /// The subset of settings that affects compiled materializers.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            apply_null_values: self.apply_null_values,
            match_underscores: self.match_underscores,
        }
    }
}

/// Compile-relevant settings carried inside every [`ShapeKey`](crate::ShapeKey).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CompileOptions {
    pub apply_null_values: bool,
    pub match_underscores: bool,
}

impl CompileOptions {
    /// Does `column` name the member called `member`?
    pub fn names_match(self, column: &str, member: &str) -> bool {
        if column.eq_ignore_ascii_case(member) {
            return true;
        }
        if !self.match_underscores {
            return false;
        }
        let mut left = column.chars().filter(|c| *c != '_');
        let mut right = member.chars().filter(|c| *c != '_');
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(a), Some(b)) if a.eq_ignore_ascii_case(&b) => {}
                _ => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MapperConfig::default();
        assert!(!config.apply_null_values);
        assert!(!config.match_underscores);
        assert_eq!(config.default_split_on, "Id");
    }

    #[test]
    fn builder_and_json() {
        let config = MapperConfig::new()
            .apply_null_values(true)
            .default_split_on("UserId");
        assert!(config.apply_null_values);
        assert_eq!(config.default_split_on, "UserId");

        let parsed = MapperConfig::from_json(r#"{"match_underscores": true}"#).unwrap();
        assert!(parsed.match_underscores);
        assert_eq!(parsed.default_split_on, "Id");

        assert!(MapperConfig::from_json("{not json").is_err());
    }

    #[test]
    fn name_matching() {
        let strict = CompileOptions::default();
        assert!(strict.names_match("FIRSTNAME", "firstName"));
        assert!(!strict.names_match("first_name", "FirstName"));

        let loose = MapperConfig::new().match_underscores(true).compile_options();
        assert!(loose.names_match("first_name", "FirstName"));
        assert!(loose.names_match("first_name", "firstname"));
        assert!(!loose.names_match("first_name", "first"));
    }
}
