//! Run configuration, validated once at startup and immutable after

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigurationError;

/// Browser engine to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// When to capture a collaborator trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TracePolicy {
    Off,
    #[default]
    OnFirstRetry,
    On,
}

/// When to take a screenshot of a finished case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenshotPolicy {
    Off,
    #[default]
    OnlyOnFailure,
    On,
}

/// Reporter selection. Anything richer than these is delegated to
/// external tooling consuming the JSON artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reporter {
    #[default]
    List,
    Json,
}

/// Configuration for a whole run. Read at process start; never mutated
/// while tests execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Base URL that relative step URLs resolve against
    pub base_url: String,

    /// Per-assertion timeout handed to the browser collaborator
    pub expect_timeout_ms: u64,

    /// Per-test-case deadline, checked at step boundaries
    pub test_timeout_ms: u64,

    /// Run cases in parallel (subject to `workers`)
    pub fully_parallel: bool,

    /// Rerun attempts for a failed case
    pub retries: u32,

    /// Concurrent case limit; `None` means unbounded
    pub workers: Option<usize>,

    pub reporter: Reporter,
    pub trace: TracePolicy,
    pub screenshot: ScreenshotPolicy,

    pub browser: Browser,
    pub headless: bool,

    /// Directory for the JSON report and trace files
    pub output_dir: PathBuf,

    /// Directory for screenshot files
    pub screenshot_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: "https://example.com".to_string(),
            expect_timeout_ms: 5_000,
            test_timeout_ms: 30_000,
            fully_parallel: true,
            retries: 0,
            workers: None,
            reporter: Reporter::default(),
            trace: TracePolicy::default(),
            screenshot: ScreenshotPolicy::default(),
            browser: Browser::default(),
            headless: true,
            output_dir: PathBuf::from("test-results"),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
        }
    }
}

impl RunConfig {
    /// Load a config from a YAML file; missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Spec {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigurationError::Spec {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Default config with the CI policy applied when the `CI`
    /// environment variable is set.
    pub fn from_env() -> Self {
        let config = Self::default();
        if std::env::var_os("CI").is_some() {
            config.apply_ci()
        } else {
            config
        }
    }

    /// Continuous-integration policy: two retries, one worker.
    pub fn apply_ci(mut self) -> Self {
        self.retries = 2;
        self.workers = Some(1);
        self
    }

    /// Validate the configuration. Called before any test executes;
    /// a failure here aborts the whole run.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| ConfigurationError::BaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigurationError::BaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        if self.expect_timeout_ms == 0 {
            return Err(ConfigurationError::Timeout(
                "per-assertion timeout must be positive".to_string(),
            ));
        }
        if self.test_timeout_ms == 0 {
            return Err(ConfigurationError::Timeout(
                "per-test timeout must be positive".to_string(),
            ));
        }

        if self.workers == Some(0) {
            return Err(ConfigurationError::Workers(
                "worker count must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve a step URL against the base URL. Absolute URLs pass
    /// through untouched.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match reqwest::Url::parse(&self.base_url).and_then(|base| base.join(url)) {
            Ok(joined) => joined.to_string(),
            // validate() already rejected malformed bases; fall back to
            // plain concatenation rather than failing here
            Err(_) => format!("{}/{}", self.base_url.trim_end_matches('/'), url.trim_start_matches('/')),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_defaults_match_documented_ceilings() {
        let config = RunConfig::default();
        assert_eq!(config.expect_timeout_ms, 5_000);
        assert_eq!(config.test_timeout_ms, 30_000);
        assert_eq!(config.retries, 0);
        assert_eq!(config.workers, None);
        assert!(config.fully_parallel);
        assert_eq!(config.trace, TracePolicy::OnFirstRetry);
        assert_eq!(config.screenshot, ScreenshotPolicy::OnlyOnFailure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ci_policy() {
        let config = RunConfig::default().apply_ci();
        assert_eq!(config.retries, 2);
        assert_eq!(config.workers, Some(1));
    }

    #[test_case("not a url" ; "garbage")]
    #[test_case("ftp://example.com" ; "unsupported scheme")]
    #[test_case("" ; "empty")]
    fn test_malformed_base_url_rejected(base_url: &str) {
        let config = RunConfig { base_url: base_url.to_string(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigurationError::BaseUrl { .. })));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let config = RunConfig { expect_timeout_ms: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigurationError::Timeout(_))));

        let config = RunConfig { test_timeout_ms: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigurationError::Timeout(_))));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = RunConfig { workers: Some(0), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigurationError::Workers(_))));
    }

    #[test]
    fn test_resolve_url() {
        let config = RunConfig {
            base_url: "https://jsonplaceholder.typicode.com".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_url("/posts/1"),
            "https://jsonplaceholder.typicode.com/posts/1"
        );
        assert_eq!(config.resolve_url("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn test_from_yaml_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("specrun.yaml");
        std::fs::write(&path, "base_url: https://staging.example.com\nretries: 1\n").unwrap();

        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.base_url, "https://staging.example.com");
        assert_eq!(config.retries, 1);
        // untouched keys keep their defaults
        assert_eq!(config.test_timeout_ms, 30_000);
    }
}
