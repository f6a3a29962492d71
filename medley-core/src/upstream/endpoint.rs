//! Host-independent description of an upstream request.

use url::Url;

use super::error::FailureKind;

/// Query parameter carrying an API key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub param: String,
    pub value: String,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("param", &self.param)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Logical endpoint: a path below the base URL plus query parameters.
///
/// The same endpoint is replayed against every fallback host, so it never
/// contains a scheme or host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    path: String,
    query: Vec<(String, String)>,
}

impl Endpoint {
    /// Endpoint for a static path such as `/genre/movie/list`.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            path: path.trim_end_matches('/').to_string(),
            query: Vec::new(),
        }
    }

    /// Appends a percent-encoded path segment (slugs, ids, user input).
    pub fn segment(mut self, segment: impl AsRef<str>) -> Self {
        self.path.push('/');
        self.path.push_str(&urlencoding::encode(segment.as_ref()));
        self
    }

    /// Appends a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// First value for `key`, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Joins this endpoint onto `base`, keeping any path prefix of the base.
    pub(crate) fn url_for(&self, base: &str, api_key: Option<&ApiKey>) -> Result<Url, FailureKind> {
        let joined = format!("{}{}", base.trim_end_matches('/'), self.path);
        let mut url = Url::parse(&joined).map_err(|e| FailureKind::InvalidUrl {
            reason: format!("{joined}: {e}"),
        })?;

        if !self.query.is_empty() || api_key.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
            if let Some(key) = api_key {
                pairs.append_pair(&key.param, &key.value);
            }
        }

        Ok(url)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let separator = if i == 0 { '?' } else { '&' };
            write!(f, "{separator}{key}={value}")?;
        }
        Ok(())
    }
}
