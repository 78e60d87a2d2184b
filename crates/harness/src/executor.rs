//! Step executor - turns one declarative step into one observation
//!
//! The executor delegates all I/O to the collaborators and performs no
//! retries; retry policy belongs to the runner. Assertion steps produce
//! an observation for the evaluator to judge - the executor never
//! decides pass or fail itself.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::browser::BrowserCollaborator;
use crate::config::RunConfig;
use crate::error::CollaboratorError;
use crate::http::{HttpCollaborator, HttpResponse};
use crate::spec::Step;

/// The runtime result of executing a step against a collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    /// The collaborator performed the action; nothing to evaluate
    Ack,
    Visibility { selector: String, visible: bool },
    Text { selector: String, text: Option<String> },
    Title { title: String },
    Count { selector: String, count: usize },
    Http(HttpResponse),
    Screenshot { path: PathBuf },
}

/// Per-case execution state. Holds the collaborators for one isolated
/// context plus the last HTTP response, which status and shape
/// assertions refer to.
pub struct StepExecutor<'a> {
    browser: Option<&'a dyn BrowserCollaborator>,
    http: &'a dyn HttpCollaborator,
    config: &'a RunConfig,
    last_response: Option<HttpResponse>,
}

impl<'a> StepExecutor<'a> {
    pub fn new(
        browser: Option<&'a dyn BrowserCollaborator>,
        http: &'a dyn HttpCollaborator,
        config: &'a RunConfig,
    ) -> Self {
        Self { browser, http, config, last_response: None }
    }

    fn browser(&self) -> Result<&'a dyn BrowserCollaborator, CollaboratorError> {
        self.browser.ok_or_else(|| {
            CollaboratorError::Protocol("no browser context for this test case".to_string())
        })
    }

    /// Execute one step. Collaborator failures surface as errors;
    /// assertion verdicts are left to the evaluator.
    pub async fn execute(&mut self, step: &Step) -> Result<Observation, CollaboratorError> {
        match step {
            Step::Navigate { url } => {
                self.browser()?.goto(&self.config.resolve_url(url)).await?;
                Ok(Observation::Ack)
            }
            Step::Click { selector, timeout_ms } => {
                let timeout = timeout_ms.unwrap_or(self.config.expect_timeout_ms);
                self.browser()?.click(selector, timeout).await?;
                Ok(Observation::Ack)
            }
            Step::AssertVisible { selector } => {
                let visible = self.browser()?.is_visible(selector).await?;
                Ok(Observation::Visibility { selector: selector.clone(), visible })
            }
            Step::AssertText { selector, .. } => {
                let text = self.browser()?.text_content(selector).await?;
                Ok(Observation::Text { selector: selector.clone(), text })
            }
            Step::AssertTitle { .. } => {
                let title = self.browser()?.title().await?;
                Ok(Observation::Title { title })
            }
            Step::AssertCount { selector, .. } => {
                let count = self.browser()?.count(selector).await?;
                Ok(Observation::Count { selector: selector.clone(), count })
            }
            Step::HttpRequest { method, url, body } => {
                let url = self.config.resolve_url(url);
                let response = self.http.request(*method, &url, body.as_ref()).await?;
                self.last_response = Some(response.clone());
                Ok(Observation::Http(response))
            }
            Step::AssertStatus { .. } | Step::AssertJsonShape { .. } | Step::AssertHeader { .. } => {
                let response = self.last_response.clone().ok_or_else(|| {
                    CollaboratorError::Protocol(
                        "no HTTP response to assert against; add an http_request step first"
                            .to_string(),
                    )
                })?;
                Ok(Observation::Http(response))
            }
            Step::Screenshot { name, full_page } => {
                let path = self.browser()?.screenshot(name, *full_page).await?;
                Ok(Observation::Screenshot { path })
            }
            Step::WaitForUrl { pattern } => {
                self.browser()?.wait_for_url(pattern).await?;
                Ok(Observation::Ack)
            }
        }
    }
}
