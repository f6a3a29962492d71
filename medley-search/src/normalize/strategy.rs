//! Ordered extraction strategies for variably-shaped payloads.
//!
//! Scraper upstreams return the same logical list as a bare array, under
//! `data`, under `results`, or under a source-specific field, sometimes
//! alternating between calls. Each strategy is a pure lookup; callers try them
//! in priority order and take the first non-empty array.

use serde_json::Value;

/// One way of locating the item array inside a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// The payload itself is the array.
    Root,
    /// Array under a top-level field.
    Field(&'static str),
    /// Array under a nested object path.
    Path(&'static [&'static str]),
}

impl Extraction {
    /// Node this strategy points at, whatever its type.
    pub fn locate<'a>(&self, payload: &'a Value) -> Option<&'a Value> {
        match self {
            Extraction::Root => Some(payload),
            Extraction::Field(field) => payload.get(field),
            Extraction::Path(path) => path.iter().try_fold(payload, |node, key| node.get(key)),
        }
    }

    /// Non-empty array at this strategy's path.
    pub fn extract<'a>(&self, payload: &'a Value) -> Option<&'a [Value]> {
        self.locate(payload)
            .and_then(Value::as_array)
            .filter(|items| !items.is_empty())
            .map(Vec::as_slice)
    }
}

impl std::fmt::Display for Extraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Extraction::Root => write!(f, "<root>"),
            Extraction::Field(field) => write!(f, ".{field}"),
            Extraction::Path(path) => write!(f, ".{}", path.join(".")),
        }
    }
}

/// Outcome of running a strategy list.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted<'a> {
    /// First strategy that found a non-empty array.
    Items {
        strategy: Extraction,
        items: &'a [Value],
    },
    /// Some strategy found an array, but every array was empty.
    Empty,
    /// No strategy found an array at all.
    Unrecognized,
}

/// Tries `strategies` in order and stops at the first non-empty array.
pub fn extract_first<'a>(strategies: &[Extraction], payload: &'a Value) -> Extracted<'a> {
    let mut saw_array = false;

    for strategy in strategies {
        match strategy.locate(payload).and_then(Value::as_array) {
            Some(items) if !items.is_empty() => {
                return Extracted::Items {
                    strategy: *strategy,
                    items,
                };
            }
            Some(_) => saw_array = true,
            None => {}
        }
    }

    if saw_array {
        Extracted::Empty
    } else {
        Extracted::Unrecognized
    }
}

/// Base list for unstructured payloads followed by source-specific fields.
pub fn unstructured_strategies(named_fields: &[&'static str]) -> Vec<Extraction> {
    let mut strategies = vec![
        Extraction::Root,
        Extraction::Field("data"),
        Extraction::Field("results"),
    ];
    strategies.extend(named_fields.iter().copied().map(Extraction::Field));
    strategies
}

/// Strategies applied inside a `{status, data}` envelope's `data` node.
pub fn enveloped_strategies(named_fields: &[&'static str]) -> Vec<Extraction> {
    let mut strategies = vec![Extraction::Root, Extraction::Field("results")];
    strategies.extend(named_fields.iter().copied().map(Extraction::Field));
    strategies
}
