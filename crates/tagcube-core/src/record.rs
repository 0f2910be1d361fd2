use serde::{Deserialize, Serialize};

use crate::tag::TagSource;

/// Normalized token record as delivered by the data provider.
///
/// The provider owns parsing and field-name reconciliation; the engine only
/// ever sees this shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub identity: String,
    #[serde(rename = "displaySymbol", alias = "display_symbol")]
    pub display_symbol: String,
    /// Normalized weight in [0, 1]; mapped onto the configured size range.
    #[serde(rename = "sizeHint", alias = "size_hint", default = "default_size_hint")]
    pub size_hint: f64,
    #[serde(rename = "sourceTag", alias = "source", default)]
    pub source: TagSource,
}

fn default_size_hint() -> f64 {
    0.5
}

impl TokenRecord {
    pub fn new(identity: &str, display_symbol: &str, size_hint: f64) -> Self {
        Self {
            identity: identity.to_string(),
            display_symbol: display_symbol.to_string(),
            size_hint,
            source: TagSource::Provider,
        }
    }

    pub fn with_source(mut self, source: TagSource) -> Self {
        self.source = source;
        self
    }
}
