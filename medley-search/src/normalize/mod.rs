//! Mapping of raw upstream JSON into the canonical data model.
//!
//! One submodule per upstream family. Every normalizer returns `None` only
//! when no extraction strategy recognizes the payload at all; the caller
//! treats that as an empty result, never as a failure. Missing optional fields
//! are filled from [`fields`] fallback chains and never escape as errors.

pub mod catalog;
pub mod fields;
pub mod scraper;
pub mod strategy;

use serde_json::Value;
use tracing::warn;

use crate::types::SourceId;

/// Diagnostic for a payload whose shape matched no known strategy.
///
/// Only ever logged. Scraper endpoints are observed to switch shapes between
/// calls, so a miss is recorded with the observed shape rather than trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMiss {
    pub source: SourceId,
    pub context: &'static str,
    pub observed: String,
}

impl SchemaMiss {
    pub fn new(source: SourceId, context: &'static str, payload: &Value) -> Self {
        Self {
            source,
            context,
            observed: describe_shape(payload),
        }
    }

    pub fn log(&self) {
        warn!(
            source = %self.source,
            context = self.context,
            "Unrecognized payload shape: {}",
            self.observed
        );
    }
}

impl std::fmt::Display for SchemaMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}: unrecognized shape {}",
            self.source, self.context, self.observed
        )
    }
}

/// Short description of a payload's top level, e.g. `object{message,status}`.
pub fn describe_shape(payload: &Value) -> String {
    match payload {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => format!("array({})", items.len()),
        Value::Object(map) => {
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            format!("object{{{}}}", keys.join(","))
        }
    }
}
