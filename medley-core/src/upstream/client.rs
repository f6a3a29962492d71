//! Bounded-time HTTP client with host fallback and offline stubs.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::endpoint::{ApiKey, Endpoint};
use super::error::{FailureKind, HostFailure, UpstreamError};
use crate::config::{SourceEndpoints, UpstreamConfig};
use crate::mode::RuntimeMode;

/// Deterministic substitute payload for an upstream family.
///
/// Returned only in development mode once every real host has failed. The
/// payload must be shaped like the real response for `endpoint` so the
/// normalizers handle it unchanged.
pub trait OfflineStub: Send + Sync + std::fmt::Debug {
    fn payload(&self, endpoint: &Endpoint) -> Value;
}

/// Where a payload came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadOrigin {
    Primary,
    Fallback { host: String },
    OfflineStub,
}

/// Untyped JSON returned by an upstream.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub value: Value,
    pub origin: PayloadOrigin,
}

impl RawPayload {
    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn is_stub(&self) -> bool {
        self.origin == PayloadOrigin::OfflineStub
    }
}

/// Per-call options for [`UpstreamClient::fetch`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Cancelling this token aborts the current attempt and skips the remaining hosts.
    pub cancel: CancellationToken,
    /// Overrides the primary host budget for this call.
    pub budget: Option<Duration>,
}

impl FetchOptions {
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            budget: None,
        }
    }
}

/// Source-agnostic client for one upstream family.
///
/// Tries the primary host, then each fallback host in configured order, every
/// attempt independently time-boxed. Cheap to clone.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    source_name: String,
    hosts: Arc<[String]>,
    api_key: Option<ApiKey>,
    request_timeout: Duration,
    fallback_timeout: Duration,
    mode: RuntimeMode,
    stub: Option<Arc<dyn OfflineStub>>,
}

impl UpstreamClient {
    /// Starts a builder for the upstream named `source_name`.
    pub fn builder(source_name: impl Into<String>, endpoints: &SourceEndpoints) -> UpstreamClientBuilder {
        UpstreamClientBuilder {
            source_name: source_name.into(),
            endpoints: endpoints.clone(),
            api_key_param: None,
            upstream: UpstreamConfig::default(),
            mode: RuntimeMode::default(),
            stub: None,
            http: None,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Primary host followed by fallbacks.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Fetches `endpoint`, walking the host list until one answers with JSON.
    ///
    /// # Errors
    ///
    /// - `UpstreamError::Exhausted` - Every host failed (production mode, no
    ///   stub configured, or the caller cancelled)
    pub async fn fetch(
        &self,
        endpoint: &Endpoint,
        options: &FetchOptions,
    ) -> Result<RawPayload, UpstreamError> {
        let mut failures = Vec::with_capacity(self.hosts.len());

        for (attempt, host) in self.hosts.iter().enumerate() {
            if options.cancel.is_cancelled() {
                failures.push(HostFailure {
                    host: host.clone(),
                    kind: FailureKind::Cancelled,
                });
                break;
            }

            let budget = if attempt == 0 {
                options.budget.unwrap_or(self.request_timeout)
            } else {
                self.fallback_timeout
            };

            match self.attempt(host, endpoint, budget, &options.cancel).await {
                Ok(value) => {
                    let origin = if attempt == 0 {
                        PayloadOrigin::Primary
                    } else {
                        warn!(
                            source = %self.source_name,
                            %endpoint,
                            host = %host,
                            "Recovered via fallback host after {attempt} failed attempt(s)"
                        );
                        PayloadOrigin::Fallback { host: host.clone() }
                    };
                    return Ok(RawPayload { value, origin });
                }
                Err(kind) => {
                    debug!(source = %self.source_name, %endpoint, host = %host, "Attempt failed: {kind}");
                    let cancelled = kind.is_cancelled();
                    failures.push(HostFailure {
                        host: host.clone(),
                        kind,
                    });
                    if cancelled {
                        break;
                    }
                }
            }
        }

        let cancelled = failures.iter().any(|f| f.kind.is_cancelled());
        if !cancelled
            && self.mode.allows_offline_stub()
            && let Some(stub) = &self.stub
        {
            warn!(
                source = %self.source_name,
                %endpoint,
                "All {} host(s) failed, serving offline stub",
                failures.len()
            );
            return Ok(RawPayload {
                value: stub.payload(endpoint),
                origin: PayloadOrigin::OfflineStub,
            });
        }

        Err(UpstreamError::Exhausted {
            source_name: self.source_name.clone(),
            path: endpoint.path().to_string(),
            failures,
        })
    }

    async fn attempt(
        &self,
        host: &str,
        endpoint: &Endpoint,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> Result<Value, FailureKind> {
        let url = endpoint.url_for(host, self.api_key.as_ref())?;

        let request = async {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| FailureKind::Network {
                    reason: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FailureKind::Http {
                    status: status.as_u16(),
                });
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_ascii_lowercase();
            if !content_type.contains("json") {
                return Err(FailureKind::NotJson { content_type });
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| FailureKind::MalformedBody {
                    reason: e.to_string(),
                })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FailureKind::Cancelled),
            result = tokio::time::timeout(budget, request) => {
                result.unwrap_or(Err(FailureKind::Timeout { budget }))
            }
        }
    }
}

/// Builder for [`UpstreamClient`].
#[derive(Debug)]
pub struct UpstreamClientBuilder {
    source_name: String,
    endpoints: SourceEndpoints,
    api_key_param: Option<String>,
    upstream: UpstreamConfig,
    mode: RuntimeMode,
    stub: Option<Arc<dyn OfflineStub>>,
    http: Option<reqwest::Client>,
}

impl UpstreamClientBuilder {
    /// Sends the configured API key under this query parameter.
    pub fn api_key_param(mut self, param: impl Into<String>) -> Self {
        self.api_key_param = Some(param.into());
        self
    }

    /// Time budgets and user agent.
    pub fn upstream_config(mut self, upstream: &UpstreamConfig) -> Self {
        self.upstream = upstream.clone();
        self
    }

    pub fn mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn offline_stub(mut self, stub: Arc<dyn OfflineStub>) -> Self {
        self.stub = Some(stub);
        self
    }

    /// Shares an existing connection pool instead of creating one.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// # Errors
    ///
    /// - `UpstreamError::NoHosts` - Base URL empty and no fallbacks
    /// - `UpstreamError::ClientBuild` - reqwest client construction failed
    pub fn build(self) -> Result<UpstreamClient, UpstreamError> {
        let hosts: Vec<String> = std::iter::once(self.endpoints.base_url)
            .chain(self.endpoints.fallback_hosts)
            .map(|host| host.trim().to_string())
            .filter(|host| !host.is_empty())
            .collect();

        if hosts.is_empty() {
            return Err(UpstreamError::NoHosts {
                source_name: self.source_name,
            });
        }

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .user_agent(self.upstream.user_agent.clone())
                .build()
                .map_err(|e| UpstreamError::ClientBuild {
                    source_name: self.source_name.clone(),
                    reason: e.to_string(),
                })?,
        };

        let api_key = match (self.api_key_param, self.endpoints.api_key) {
            (Some(param), Some(value)) => Some(ApiKey { param, value }),
            _ => None,
        };

        Ok(UpstreamClient {
            http,
            source_name: self.source_name,
            hosts: hosts.into(),
            api_key,
            request_timeout: self.upstream.request_timeout,
            fallback_timeout: self.upstream.fallback_timeout,
            mode: self.mode,
            stub: self.stub,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_orders_primary_before_fallbacks() {
        let endpoints = SourceEndpoints::new("https://primary.example")
            .with_fallbacks([" ", "https://backup.example"]);

        let client = UpstreamClient::builder("catalog", &endpoints).build().unwrap();

        assert_eq!(
            client.hosts(),
            ["https://primary.example".to_string(), "https://backup.example".to_string()]
        );
    }

    #[test]
    fn test_builder_rejects_empty_host_list() {
        let endpoints = SourceEndpoints::new("");
        let error = UpstreamClient::builder("anime", &endpoints).build().unwrap_err();
        assert!(matches!(error, UpstreamError::NoHosts { .. }));
    }

    #[test]
    fn test_api_key_requires_param_and_value() {
        let endpoints = SourceEndpoints::new("https://primary.example").with_api_key("secret");

        let without_param = UpstreamClient::builder("catalog", &endpoints).build().unwrap();
        assert!(without_param.api_key.is_none());

        let with_param = UpstreamClient::builder("catalog", &endpoints)
            .api_key_param("api_key")
            .build()
            .unwrap();
        assert_eq!(with_param.api_key.unwrap().value, "secret");
    }

    #[tokio::test]
    async fn test_pre_cancelled_fetch_skips_stub() {
        #[derive(Debug)]
        struct EmptyStub;
        impl OfflineStub for EmptyStub {
            fn payload(&self, _endpoint: &Endpoint) -> Value {
                serde_json::json!({ "results": [] })
            }
        }

        let endpoints = SourceEndpoints::new("http://127.0.0.1:9");
        let client = UpstreamClient::builder("catalog", &endpoints)
            .mode(RuntimeMode::Development)
            .offline_stub(Arc::new(EmptyStub))
            .build()
            .unwrap();

        let options = FetchOptions::default();
        options.cancel.cancel();

        let error = client
            .fetch(&Endpoint::new("/search/multi"), &options)
            .await
            .unwrap_err();
        assert!(error.was_cancelled());
    }
}
