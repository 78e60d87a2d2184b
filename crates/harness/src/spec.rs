//! Declarative test case model and YAML spec files

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ConfigurationError, HarnessResult};

/// A named, ordered sequence of steps. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique id within the owning group
    pub id: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Steps to execute in declared order
    pub steps: Vec<Step>,
}

/// A named collection of test cases, scoped to a single run. Order of
/// cases within a group carries no execution guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestGroup {
    /// Group id, unique within a registry
    #[serde(rename = "group")]
    pub id: String,

    pub cases: Vec<TestCase>,
}

/// HTTP method for request steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Declared primitive type for a JSON shape field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Number,
    String,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Number => "number",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
        }
    }
}

/// A single step in a test case
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a URL (absolute, or relative to the configured base)
    Navigate {
        url: String,
    },

    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Assert that an element is visible
    AssertVisible {
        selector: String,
    },

    /// Assert that an element's text matches a regex pattern
    AssertText {
        selector: String,
        pattern: String,
    },

    /// Assert that the page title matches a regex pattern
    AssertTitle {
        pattern: String,
    },

    /// Assert the exact number of elements matching a selector
    AssertCount {
        selector: String,
        count: usize,
    },

    /// Issue an HTTP request; the response becomes the subject of
    /// subsequent status/shape/header assertions
    HttpRequest {
        method: Method,
        url: String,
        #[serde(default)]
        body: Option<serde_json::Value>,
    },

    /// Assert the status code of the last HTTP response (exact match)
    AssertStatus {
        code: u16,
    },

    /// Assert that the last HTTP response body contains each declared
    /// field with the declared primitive type (extra fields are ignored)
    AssertJsonShape {
        shape: BTreeMap<String, FieldType>,
    },

    /// Assert that a header of the last HTTP response contains a
    /// substring
    AssertHeader {
        name: String,
        contains: String,
    },

    /// Take a screenshot
    Screenshot {
        name: String,
        #[serde(default)]
        full_page: bool,
    },

    /// Wait until the page URL matches a regex pattern
    WaitForUrl {
        pattern: String,
    },
}

impl Step {
    /// Short name used in step records and log lines
    pub fn name(&self) -> String {
        match self {
            Step::Navigate { url } => format!("navigate:{}", url),
            Step::Click { selector, .. } => format!("click:{}", selector),
            Step::AssertVisible { selector } => format!("assert_visible:{}", selector),
            Step::AssertText { selector, .. } => format!("assert_text:{}", selector),
            Step::AssertTitle { pattern } => format!("assert_title:{}", pattern),
            Step::AssertCount { selector, .. } => format!("assert_count:{}", selector),
            Step::HttpRequest { method, url, .. } => {
                format!("http_request:{} {}", method.as_str(), url)
            }
            Step::AssertStatus { code } => format!("assert_status:{}", code),
            Step::AssertJsonShape { shape } => format!("assert_json_shape:{} fields", shape.len()),
            Step::AssertHeader { name, .. } => format!("assert_header:{}", name),
            Step::Screenshot { name, .. } => format!("screenshot:{}", name),
            Step::WaitForUrl { pattern } => format!("wait_for_url:{}", pattern),
        }
    }

    /// Whether executing this step requires a browser context
    pub fn needs_browser(&self) -> bool {
        matches!(
            self,
            Step::Navigate { .. }
                | Step::Click { .. }
                | Step::AssertVisible { .. }
                | Step::AssertText { .. }
                | Step::AssertTitle { .. }
                | Step::AssertCount { .. }
                | Step::Screenshot { .. }
                | Step::WaitForUrl { .. }
        )
    }

    /// Validate patterns that must compile before the run starts
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let pattern = match self {
            Step::AssertText { pattern, .. }
            | Step::AssertTitle { pattern }
            | Step::WaitForUrl { pattern } => pattern,
            _ => return Ok(()),
        };
        regex::Regex::new(pattern).map_err(|e| ConfigurationError::Spec {
            path: self.name(),
            reason: format!("invalid pattern '{}': {}", pattern, e),
        })?;
        Ok(())
    }
}

impl TestCase {
    /// True when any step needs a browser context
    pub fn needs_browser(&self) -> bool {
        self.steps.iter().any(Step::needs_browser)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for step in &self.steps {
            step.validate()?;
        }
        Ok(())
    }
}

impl TestGroup {
    /// Parse a test group from a YAML string
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a test group from a YAML file
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all test groups from a directory of .yaml/.yml files
    pub fn load_all(dir: &Path) -> HarnessResult<Vec<Self>> {
        let mut groups = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            groups.push(Self::from_file(entry.path())?);
        }

        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_browser_group() {
        let yaml = r#"
group: browser-examples
cases:
  - id: open-page
    description: Open the page and check the heading
    steps:
      - action: navigate
        url: /
      - action: assert_visible
        selector: h1
      - action: assert_text
        selector: h1
        pattern: Example Domain
"#;
        let group = TestGroup::from_yaml(yaml).unwrap();
        assert_eq!(group.id, "browser-examples");
        assert_eq!(group.cases.len(), 1);
        assert_eq!(group.cases[0].steps.len(), 3);
        assert!(group.cases[0].needs_browser());
    }

    #[test]
    fn test_parse_api_group() {
        let yaml = r#"
group: api-examples
cases:
  - id: get-post
    steps:
      - action: http_request
        method: GET
        url: /posts/1
      - action: assert_status
        code: 200
      - action: assert_json_shape
        shape:
          id: number
          title: string
"#;
        let group = TestGroup::from_yaml(yaml).unwrap();
        let case = &group.cases[0];
        assert!(!case.needs_browser());
        match &case.steps[0] {
            Step::HttpRequest { method, url, body } => {
                assert_eq!(*method, Method::Get);
                assert_eq!(url, "/posts/1");
                assert!(body.is_none());
            }
            other => panic!("unexpected step: {:?}", other),
        }
        match &case.steps[2] {
            Step::AssertJsonShape { shape } => {
                assert_eq!(shape.get("id"), Some(&FieldType::Number));
                assert_eq!(shape.get("title"), Some(&FieldType::String));
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_parse_title_count_and_header_steps() {
        let yaml = r#"
group: mixed
cases:
  - id: page-shape
    steps:
      - action: assert_title
        pattern: Example Domain
      - action: assert_count
        selector: p
        count: 2
      - action: assert_header
        name: content-type
        contains: application/json
"#;
        let group = TestGroup::from_yaml(yaml).unwrap();
        let case = &group.cases[0];
        assert!(case.steps[0].needs_browser());
        assert!(case.steps[1].needs_browser());
        assert!(!case.steps[2].needs_browser());
        match &case.steps[1] {
            Step::AssertCount { selector, count } => {
                assert_eq!(selector, "p");
                assert_eq!(*count, 2);
            }
            other => panic!("unexpected step: {:?}", other),
        }
        assert!(case.validate().is_ok());

        let step = Step::AssertTitle { pattern: "[unclosed".to_string() };
        assert!(step.validate().is_err());
    }

    #[test]
    fn test_post_body_round_trips_as_json() {
        let yaml = r#"
group: api-examples
cases:
  - id: create-post
    steps:
      - action: http_request
        method: POST
        url: /posts
        body:
          title: Test Post
          userId: 1
      - action: assert_status
        code: 201
"#;
        let group = TestGroup::from_yaml(yaml).unwrap();
        match &group.cases[0].steps[0] {
            Step::HttpRequest { body: Some(body), .. } => {
                assert_eq!(body["title"], "Test Post");
                assert_eq!(body["userId"], 1);
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_pattern_rejected_at_validation() {
        let step = Step::AssertText {
            selector: "h1".to_string(),
            pattern: "[unclosed".to_string(),
        };
        assert!(step.validate().is_err());

        let step = Step::WaitForUrl { pattern: r"iana\.org".to_string() };
        assert!(step.validate().is_ok());
    }

    #[test]
    fn test_step_names() {
        let step = Step::Navigate { url: "/login".to_string() };
        assert_eq!(step.name(), "navigate:/login");

        let step = Step::AssertStatus { code: 404 };
        assert_eq!(step.name(), "assert_status:404");
    }
}
