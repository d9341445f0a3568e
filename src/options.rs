//! Engine configuration.
//!
//! Every field has a default, so a host may pass a partial JSON document:
//!
//! ```json
//! { "bindAttribute": "data-bind", "maxSettleTurns": 16 }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{BindError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    /// `ez-bind="path"` binds the element value; `ez-bind:title="path"` an attribute.
    pub bind_attribute: String,
    /// `ez-for="path"` repeats the element for every item of an array.
    pub repeat_attribute: String,
    /// Marker opening and closing an interpolation span.
    pub template_delimiter: String,
    /// Text of the comment anchor left where a repeat template stood.
    pub anchor_label: String,
    /// Upper bound on turns drained by a single `settle()`.
    pub max_settle_turns: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            bind_attribute: "ez-bind".to_string(),
            repeat_attribute: "ez-for".to_string(),
            template_delimiter: "``".to_string(),
            anchor_label: "ez-for".to_string(),
            max_settle_turns: 64,
        }
    }
}

impl EngineOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: EngineOptions =
            serde_json::from_str(json).map_err(|e| BindError::Options(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_attribute.trim().is_empty() {
            return Err(BindError::Options("bindAttribute must not be empty".into()));
        }
        if self.repeat_attribute.trim().is_empty() {
            return Err(BindError::Options("repeatAttribute must not be empty".into()));
        }
        if self.bind_attribute == self.repeat_attribute {
            return Err(BindError::Options(
                "bindAttribute and repeatAttribute must differ".into(),
            ));
        }
        if self.template_delimiter.is_empty() {
            return Err(BindError::Options("templateDelimiter must not be empty".into()));
        }
        if self.max_settle_turns == 0 {
            return Err(BindError::Options("maxSettleTurns must be at least 1".into()));
        }
        Ok(())
    }

    /// Prefix of attribute bindings, e.g. `ez-bind:`.
    pub fn attribute_binding_prefix(&self) -> String {
        format!("{}:", self.bind_attribute)
    }
}
