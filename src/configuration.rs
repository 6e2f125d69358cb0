use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Flag configuration served by Eppo. An immutable document mapping flag keys to flag
/// definitions; whenever configuration changes, it is replaced completely.
///
/// The evaluation engine owns the semantics of these definitions. This crate only stores them,
/// serves them back synchronously, and round-trips them through persistent storage.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Flag definitions, keyed by flag key.
    pub flags: HashMap<String, TryParse<Flag>>,
}

impl Configuration {
    /// Get a flag definition by key. Returns `None` for unknown flags and for flags that failed
    /// to parse.
    pub fn get_flag(&self, flag_key: &str) -> Option<&Flag> {
        self.flags.get(flag_key).and_then(Option::from)
    }

    /// Returns whether this configuration contains no flags.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure, so one unrecognized flag doesn't take the rest of the configuration down with it.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TryParse<T> {
    /// Successfully parsed.
    Parsed(T),
    /// Unparsable value preserved as raw JSON, so it survives the next persistence round-trip.
    ParseFailed(serde_json::Value),
}

impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Option<T> {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

impl<'a, T> From<&'a TryParse<T>> for Option<&'a T> {
    fn from(value: &TryParse<T>) -> Option<&T> {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

/// A feature flag definition.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    /// Flag key.
    pub key: String,
    /// Whether the flag is enabled.
    pub enabled: bool,
    /// Type of the flag's variation values.
    pub variation_type: VariationType,
    /// Variations of the flag, keyed by variation key.
    pub variations: HashMap<String, Variation>,
    /// Allocations of the flag, in priority order.
    pub allocations: Vec<Allocation>,
    #[serde(default = "default_total_shards")]
    /// Number of shards used for bucketing.
    pub total_shards: u64,
}

fn default_total_shards() -> u64 {
    10_000
}

/// Type of a flag's variation values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariationType {
    /// String values.
    String,
    /// Integer values.
    Integer,
    /// Floating-point values.
    Numeric,
    /// Boolean values.
    Boolean,
    /// Arbitrary JSON values.
    Json,
}

/// A variation of a feature flag.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    /// Variation key.
    pub key: String,
    /// Variation value. Interpretation is up to the evaluation engine.
    pub value: serde_json::Value,
}

/// An allocation of a feature flag.
///
/// Rule matching and bucketing are owned by the evaluation engine, so everything past the key is
/// carried opaquely and round-trips through storage untouched.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    /// Allocation key.
    pub key: String,
    /// The rest of the allocation definition, preserved verbatim.
    #[serde(flatten)]
    pub definition: serde_json::Value,
}
