//! Per-field fallback chains over untyped JSON objects.
//!
//! Each accessor takes an ordered list of candidate keys (dotted keys walk
//! nested objects) and returns the first usable value. None of them fail:
//! absent, null, empty or placeholder values such as `"N/A"` count as missing.

use serde_json::Value;

const MISSING_MARKERS: &[&str] = &["n/a", "null", "undefined", "unknown", "?", "-"];

/// Value at a dotted key such as `images.jpg.image_url`.
pub fn lookup<'a>(object: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(object, |node, part| node.get(part))
        .filter(|value| !value.is_null())
}

fn as_clean_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    if text.is_empty() || MISSING_MARKERS.contains(&text.to_lowercase().as_str()) {
        None
    } else {
        Some(text)
    }
}

/// First non-empty string (numbers are stringified).
pub fn first_string(object: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| lookup(object, key))
        .find_map(as_clean_string)
}

/// First numeric value; numeric strings like `"8.25"` or `"7.9/10"` are accepted.
pub fn first_f32(object: &Value, keys: &[&str]) -> Option<f32> {
    keys.iter()
        .filter_map(|key| lookup(object, key))
        .find_map(|value| match value {
            Value::Number(n) => n.as_f64().map(|n| n as f32),
            Value::String(s) => leading_number(s).and_then(|n| n.parse::<f32>().ok()),
            _ => None,
        })
        .filter(|n| n.is_finite())
}

/// First non-negative integer; strings such as `"12"` or `"Episode 12"` are accepted.
pub fn first_u32(object: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .filter_map(|key| lookup(object, key))
        .find_map(|value| match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => first_digits(s).and_then(|d| d.parse::<u32>().ok()),
            _ => None,
        })
}

/// First plausible release year from a number, a date or free text.
pub fn first_year(object: &Value, keys: &[&str]) -> Option<u16> {
    keys.iter()
        .filter_map(|key| lookup(object, key))
        .find_map(|value| match value {
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| u16::try_from(n).ok())
                .filter(|y| is_plausible_year(*y)),
            Value::String(s) => year_in_text(s),
            _ => None,
        })
}

/// First non-empty list of names.
///
/// Accepts arrays of strings, arrays of objects carrying `name`/`title`, or a
/// comma-separated string.
pub fn string_list(object: &Value, keys: &[&str]) -> Vec<String> {
    for key in keys {
        let names = match lookup(object, key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(_) => first_string(item, &["name", "title", "label"]),
                    other => as_clean_string(other),
                })
                .collect::<Vec<_>>(),
            Some(Value::String(joined)) => joined
                .split([',', '|', ';'])
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
            _ => continue,
        };

        if !names.is_empty() {
            return dedup_preserving_order(names);
        }
    }
    Vec::new()
}

/// First value that is a JSON object.
pub fn first_object<'a>(object: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| lookup(object, key))
        .find(|value| value.is_object())
}

/// Lowercase, dash-separated form of a title, used as an id of last resort.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn dedup_preserving_order(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.to_lowercase()))
        .collect()
}

fn leading_number(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let end = trimmed
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map_or(trimmed.len(), |(i, _)| i);
    let number = &trimmed[..end];
    (!number.is_empty() && number != ".").then_some(number)
}

fn first_digits(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    Some(&rest[..end])
}

fn is_plausible_year(year: u16) -> bool {
    (1870..=2100).contains(&year)
}

/// First standalone four-digit run that looks like a year.
pub fn year_in_text(text: &str) -> Option<u16> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 4
                && let Ok(year) = text[start..i].parse::<u16>()
                && is_plausible_year(year)
            {
                return Some(year);
            }
        } else {
            i += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_first_string_skips_missing_markers() {
        let item = json!({ "cover": "", "poster": "N/A", "image": "https://img/x.jpg" });
        assert_eq!(
            first_string(&item, &["cover", "poster", "image"]).as_deref(),
            Some("https://img/x.jpg")
        );
        assert_eq!(first_string(&item, &["thumbnail"]), None);
    }

    #[test]
    fn test_dotted_keys_walk_nested_objects() {
        let item = json!({ "images": { "jpg": { "image_url": "https://cdn/a.jpg" } } });
        assert_eq!(
            first_string(&item, &["images.jpg.image_url"]).as_deref(),
            Some("https://cdn/a.jpg")
        );
    }

    #[test]
    fn test_numbers_from_strings() {
        let item = json!({ "score": "7.9/10", "episode": "Episode 12", "rating": null });
        assert_eq!(first_f32(&item, &["rating", "score"]), Some(7.9));
        assert_eq!(first_u32(&item, &["episode"]), Some(12));
        assert_eq!(first_f32(&json!({ "score": "N/A" }), &["score"]), None);
    }

    #[test]
    fn test_year_sources() {
        assert_eq!(first_year(&json!({ "release_date": "2019-05-01" }), &["release_date"]), Some(2019));
        assert_eq!(first_year(&json!({ "aired": "Apr 3, 1998 to Apr 24, 1999" }), &["aired"]), Some(1998));
        assert_eq!(first_year(&json!({ "year": 2021 }), &["year"]), Some(2021));
        assert_eq!(first_year(&json!({ "year": 12345 }), &["year"]), None);
        assert_eq!(year_in_text("Episode 20190"), None);
    }

    #[test]
    fn test_string_list_shapes() {
        assert_eq!(
            string_list(&json!({ "genres": ["Action", "Drama", "action"] }), &["genres"]),
            vec!["Action", "Drama"]
        );
        assert_eq!(
            string_list(&json!({ "genres": [{ "id": 1, "name": "Comedy" }] }), &["genres"]),
            vec!["Comedy"]
        );
        assert_eq!(
            string_list(&json!({ "genres": [], "tags": "Romance, School" }), &["genres", "tags"]),
            vec!["Romance", "School"]
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Re:Zero - Starting Life!  "), "re-zero-starting-life");
        assert_eq!(slugify("???"), "");
    }
}
