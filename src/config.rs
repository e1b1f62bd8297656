use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Attribute used by markup to declare which component an element binds to.
pub const DEFAULT_MARKER_ATTRIBUTE: &str = "data-component";

/// Runtime configuration for a [`crate::Registry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BinderConfig {
    /// Name of the marker attribute, `data-component` unless overridden.
    pub marker_attribute: String,
    /// When set, the scanner leaves elements that already have a bound
    /// instance alone instead of constructing a second one.
    pub skip_existing: bool,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            marker_attribute: DEFAULT_MARKER_ATTRIBUTE.to_string(),
            skip_existing: false,
        }
    }
}

impl BinderConfig {
    /// Parse a config from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_marker_attribute(mut self, marker_attribute: impl Into<String>) -> Self {
        self.marker_attribute = marker_attribute.into();
        self
    }

    pub fn with_skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }
}
