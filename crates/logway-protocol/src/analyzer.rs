/// Analyzer pool declarations: the `{id, endpoint, weight}` triple as
/// it appears in the admin API, the TOML pool file, and the
/// `ANALYZERS` environment variable.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{DISPATCH_PATH, PROBE_PATH};

/// Declared pool member. `endpoint` is an absolute http(s) base URL;
/// the dispatch and probe paths are appended to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerSpec {
    pub id: String,
    pub endpoint: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("analyzer id must not be empty")]
    EmptyId,
    #[error("endpoint `{0}` is not an absolute http(s) URL")]
    BadEndpoint(String),
    #[error("weight `{0}` must be a positive finite number")]
    BadWeight(String),
    #[error("malformed analyzer entry `{0}`, expected id:endpoint:weight")]
    Malformed(String),
}

impl AnalyzerSpec {
    /// Validate and normalize a pool member declaration. Trailing
    /// slashes are trimmed so path concatenation stays predictable.
    pub fn new(id: &str, endpoint: &str, weight: f64) -> Result<Self, SpecError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SpecError::EmptyId);
        }
        if !(weight.is_finite() && weight > 0.0) {
            return Err(SpecError::BadWeight(weight.to_string()));
        }
        let endpoint = endpoint.trim().trim_end_matches('/');
        let parsed = Url::parse(endpoint).map_err(|_| SpecError::BadEndpoint(endpoint.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(SpecError::BadEndpoint(endpoint.to_string()));
        }
        Ok(Self {
            id: id.to_string(),
            endpoint: endpoint.to_string(),
            weight,
        })
    }

    /// Parse one `id:endpoint:weight` entry. The endpoint may contain
    /// colons (scheme, port); the first colon ends the id and the last
    /// colon starts the weight.
    pub fn parse_entry(entry: &str) -> Result<Self, SpecError> {
        let entry = entry.trim();
        let (id, rest) = entry
            .split_once(':')
            .ok_or_else(|| SpecError::Malformed(entry.to_string()))?;
        let (endpoint, weight) = rest
            .rsplit_once(':')
            .ok_or_else(|| SpecError::Malformed(entry.to_string()))?;
        let weight: f64 = weight
            .trim()
            .parse()
            .map_err(|_| SpecError::BadWeight(weight.to_string()))?;
        Self::new(id, endpoint, weight)
    }

    /// Parse a comma-separated pool declaration. Empty segments are
    /// skipped so a trailing comma is harmless.
    pub fn parse_pool(pool: &str) -> Result<Vec<Self>, SpecError> {
        pool.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse_entry)
            .collect()
    }

    pub fn analyze_url(&self) -> String {
        format!("{}{}", self.endpoint, DISPATCH_PATH)
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.endpoint, PROBE_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_with_port_and_weight() {
        let spec = AnalyzerSpec::parse_entry("a1:http://analyzer-1:9000:0.7").unwrap();
        assert_eq!(spec.id, "a1");
        assert_eq!(spec.endpoint, "http://analyzer-1:9000");
        assert_eq!(spec.weight, 0.7);
        assert_eq!(spec.analyze_url(), "http://analyzer-1:9000/analyze");
        assert_eq!(spec.health_url(), "http://analyzer-1:9000/health");
    }

    #[test]
    fn pool_parses_multiple_entries() {
        let pool = AnalyzerSpec::parse_pool(
            "a1:http://localhost:9001:1, a2:https://analyzer.example.com:2.5,",
        )
        .unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[0].id, "a1");
        assert_eq!(pool[1].endpoint, "https://analyzer.example.com");
        assert_eq!(pool[1].weight, 2.5);
    }

    #[test]
    fn rejects_zero_and_negative_weight() {
        assert_eq!(
            AnalyzerSpec::new("a", "http://x", 0.0),
            Err(SpecError::BadWeight("0".to_string()))
        );
        assert!(AnalyzerSpec::new("a", "http://x", -1.0).is_err());
        assert!(AnalyzerSpec::new("a", "http://x", f64::INFINITY).is_err());
    }

    #[test]
    fn rejects_empty_id_and_bad_endpoint() {
        assert_eq!(
            AnalyzerSpec::new("  ", "http://x", 1.0),
            Err(SpecError::EmptyId)
        );
        assert!(AnalyzerSpec::new("a", "not-a-url", 1.0).is_err());
        assert!(AnalyzerSpec::new("a", "ftp://x", 1.0).is_err());
        assert!(AnalyzerSpec::new("a", "/relative/path", 1.0).is_err());
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let spec = AnalyzerSpec::new("a", "http://host:8080/", 1.0).unwrap();
        assert_eq!(spec.endpoint, "http://host:8080");
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(AnalyzerSpec::parse_entry("just-an-id").is_err());
        assert!(AnalyzerSpec::parse_entry("id:no-weight").is_err());
        assert!(AnalyzerSpec::parse_entry("id:http://host:not-a-number").is_err());
    }
}
