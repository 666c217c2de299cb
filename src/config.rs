//! Run configuration: marker names, root set, nullability matchers and
//! document metadata.
//!
//! A config can be built in code or loaded from a JSON/YAML file; everything
//! has a usable default so the CLI works on a bare project out of the box.

use serde::Deserialize;
use std::path::Path;

use crate::document::Info;
use crate::error::{Error, Result};
use crate::model::Polarity;
use crate::nullability::MarkerMatcher;

/// Configuration for one parser instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Attribute identifying endpoint structs.
    pub endpoint_marker: String,
    /// Attribute identifying superclasses whose members fold into their
    /// subclasses.
    pub exposed_marker: String,
    /// Explicit root endpoint names. When absent, every struct carrying the
    /// endpoint marker is a root.
    pub roots: Option<Vec<String>>,
    /// Document metadata.
    pub info: Info,
    /// Nullability matchers, in registration order.
    pub matchers: Vec<MarkerMatcher>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            endpoint_marker: "endpoint".to_string(),
            exposed_marker: "exposed".to_string(),
            roots: None,
            info: Info::default(),
            matchers: vec![
                MarkerMatcher::new("nonnull*", 10, Polarity::NonNull),
                MarkerMatcher::new("nullable*", 10, Polarity::Nullable),
            ],
        }
    }
}

impl ParserConfig {
    /// Loads a config file; the format is chosen by extension (`.json`,
    /// anything else is treated as YAML).
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(config)
    }

    /// Validates fields that cannot be checked during deserialization.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint_marker.is_empty() {
            return Err(Error::InvalidMatcher(
                "endpoint marker name must not be empty".to_string(),
            ));
        }
        if let Some(roots) = &self.roots {
            if roots.is_empty() {
                return Err(Error::InvalidMatcher(
                    "explicit root set must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
