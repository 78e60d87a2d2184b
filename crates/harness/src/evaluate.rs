//! Assertion evaluator - pure comparison of observations against
//! declared expectations
//!
//! No I/O and no mutation happens here. A false predicate is a normal
//! failing verdict, never an error; collaborator failures are handled
//! upstream by the executor.

use serde::{Deserialize, Serialize};

use crate::executor::Observation;
use crate::spec::{FieldType, Step};

/// The pass/fail decision for one assertion, with expected-vs-observed
/// detail on mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Mismatch { expected: String, actual: String },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Verdict::Mismatch { expected: expected.into(), actual: actual.into() }
    }
}

/// Judge an observation against the step that produced it. Action steps
/// carry no expectation and always pass; their failures surface as
/// collaborator errors before evaluation.
pub fn evaluate(step: &Step, observation: &Observation) -> Verdict {
    match (step, observation) {
        (Step::AssertVisible { selector }, Observation::Visibility { visible, .. }) => {
            if *visible {
                Verdict::Pass
            } else {
                Verdict::mismatch(
                    format!("element '{}' visible", selector),
                    "element not visible".to_string(),
                )
            }
        }

        (Step::AssertText { selector, pattern }, Observation::Text { text, .. }) => {
            let regex = match regex::Regex::new(pattern) {
                Ok(regex) => regex,
                // Prevented at spec-load time; judged rather than panicking
                Err(e) => {
                    return Verdict::mismatch(
                        format!("valid pattern /{}/", pattern),
                        format!("invalid pattern: {}", e),
                    )
                }
            };
            match text {
                Some(text) if regex.is_match(text) => Verdict::Pass,
                Some(text) => Verdict::mismatch(
                    format!("text of '{}' matching /{}/", selector, pattern),
                    format!("'{}'", text),
                ),
                None => Verdict::mismatch(
                    format!("text of '{}' matching /{}/", selector, pattern),
                    "element has no text content".to_string(),
                ),
            }
        }

        (Step::AssertTitle { pattern }, Observation::Title { title }) => {
            let regex = match regex::Regex::new(pattern) {
                Ok(regex) => regex,
                Err(e) => {
                    return Verdict::mismatch(
                        format!("valid pattern /{}/", pattern),
                        format!("invalid pattern: {}", e),
                    )
                }
            };
            if regex.is_match(title) {
                Verdict::Pass
            } else {
                Verdict::mismatch(format!("title matching /{}/", pattern), format!("'{}'", title))
            }
        }

        (Step::AssertCount { selector, count }, Observation::Count { count: observed, .. }) => {
            if observed == count {
                Verdict::Pass
            } else {
                Verdict::mismatch(
                    format!("{} element(s) matching '{}'", count, selector),
                    format!("{} element(s)", observed),
                )
            }
        }

        (Step::AssertStatus { code }, Observation::Http(response)) => {
            if response.status == *code {
                Verdict::Pass
            } else {
                Verdict::mismatch(format!("status {}", code), format!("status {}", response.status))
            }
        }

        (Step::AssertJsonShape { shape }, Observation::Http(response)) => {
            let body = match &response.body {
                Some(serde_json::Value::Object(map)) => map,
                Some(other) => {
                    return Verdict::mismatch(
                        "a JSON object body".to_string(),
                        format!("JSON {}", json_type_name(other)),
                    )
                }
                None => {
                    return Verdict::mismatch(
                        "a JSON object body".to_string(),
                        "no JSON body".to_string(),
                    )
                }
            };

            // Open-world: only declared fields are checked, extras are
            // ignored.
            let mut problems = Vec::new();
            for (field, declared) in shape {
                match body.get(field) {
                    None => problems.push(format!("'{}' missing", field)),
                    Some(value) if !matches_type(value, *declared) => problems.push(format!(
                        "'{}' is {}, declared {}",
                        field,
                        json_type_name(value),
                        declared.as_str()
                    )),
                    Some(_) => {}
                }
            }

            if problems.is_empty() {
                Verdict::Pass
            } else {
                Verdict::mismatch(shape_summary(shape), problems.join(", "))
            }
        }

        (Step::AssertHeader { name, contains }, Observation::Http(response)) => {
            // Header names compare case-insensitively
            let value = response
                .headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value);
            match value {
                Some(value) if value.contains(contains.as_str()) => Verdict::Pass,
                Some(value) => Verdict::mismatch(
                    format!("header '{}' containing '{}'", name, contains),
                    format!("'{}'", value),
                ),
                None => Verdict::mismatch(
                    format!("header '{}' containing '{}'", name, contains),
                    format!("no '{}' header", name),
                ),
            }
        }

        // Action steps have nothing to judge
        (
            Step::Navigate { .. }
            | Step::Click { .. }
            | Step::HttpRequest { .. }
            | Step::Screenshot { .. }
            | Step::WaitForUrl { .. },
            _,
        ) => Verdict::Pass,

        // An assertion paired with the wrong observation kind means the
        // executor misbehaved; report it as a mismatch with detail
        (step, observation) => Verdict::mismatch(
            format!("observation for {}", step.name()),
            format!("{:?}", observation),
        ),
    }
}

fn matches_type(value: &serde_json::Value, declared: FieldType) -> bool {
    match declared {
        FieldType::Number => value.is_number(),
        FieldType::String => value.is_string(),
        FieldType::Boolean => value.is_boolean(),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn shape_summary(shape: &std::collections::BTreeMap<String, FieldType>) -> String {
    let fields: Vec<String> =
        shape.iter().map(|(name, ty)| format!("{}: {}", name, ty.as_str())).collect();
    format!("{{{}}}", fields.join(", "))
}
