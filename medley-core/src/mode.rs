//! Whether Medley may answer from its built-in offline stubs.
//!
//! Selected with `MEDLEY_MODE` or `--mode`. The value is spelled the same way
//! in the environment, on the command line, in serialized config and in logs.

use serde::{Deserialize, Serialize};

/// How an upstream that has run out of hosts is reported.
///
/// `Development` lets every adapter fall back to its deterministic stub
/// payloads, so a frontend can be worked on with no network. `Production`
/// never fabricates data: the caller sees `ExhaustedFallbacks`.
/// A cancelled request is never stubbed in either mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    Production,
    Development,
}

/// `MEDLEY_MODE` or `--mode` held something other than a known mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown runtime mode '{0}', expected production (prod) or development (dev)")]
pub struct UnknownMode(String);

impl RuntimeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }

    /// Whether an exhausted upstream may be answered from its offline stub.
    pub fn allows_offline_stub(self) -> bool {
        self == Self::Development
    }
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuntimeMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            _ => Err(UnknownMode(s.trim().to_string())),
        }
    }
}
