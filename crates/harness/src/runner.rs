//! Test runner - orchestrates isolated, parallel test case execution
//!
//! Each test case runs as its own tokio task with a fresh execution
//! context (its own browser driver and HTTP client), so no state is
//! shared across cases. A semaphore bounds concurrency to the
//! configured worker count. Within a case, steps are strictly
//! sequential and fail-fast.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserCollaborator, BrowserConfig, PlaywrightBrowser};
use crate::config::{RunConfig, ScreenshotPolicy, TracePolicy};
use crate::error::{CollaboratorError, ConfigurationError};
use crate::evaluate::{evaluate, Verdict};
use crate::executor::StepExecutor;
use crate::http::{HttpCollaborator, ReqwestHttp};
use crate::registry::TestRegistry;
use crate::spec::TestCase;

/// Record of one executed step within an outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub name: String,
    pub passed: bool,
    pub duration_ms: u64,
    /// Expected-vs-observed detail or collaborator error on failure
    pub detail: Option<String>,
}

/// Pass/fail verdict for one test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub group: String,
    pub case: String,
    pub passed: bool,
    pub duration_ms: u64,
    /// Attempts consumed, including the first run
    pub attempts: u32,
    pub steps: Vec<StepRecord>,
    /// Index of the failing step, when any
    pub failed_step: Option<usize>,
    pub error: Option<String>,
    pub screenshot: Option<PathBuf>,
}

/// Aggregated result of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub outcomes: Vec<Outcome>,
}

/// The isolated collaborators handed to one test case attempt.
pub struct ExecutionContext {
    pub browser: Option<Box<dyn BrowserCollaborator>>,
    pub http: Box<dyn HttpCollaborator>,
}

/// Builds a fresh execution context per attempt. The production
/// implementation launches Playwright and reqwest; tests substitute
/// in-memory fakes through this seam.
#[async_trait]
pub trait ContextFactory: Send + Sync {
    async fn create(
        &self,
        needs_browser: bool,
        trace: Option<PathBuf>,
    ) -> Result<ExecutionContext, CollaboratorError>;
}

struct PlaywrightFactory {
    config: Arc<RunConfig>,
}

#[async_trait]
impl ContextFactory for PlaywrightFactory {
    async fn create(
        &self,
        needs_browser: bool,
        trace: Option<PathBuf>,
    ) -> Result<ExecutionContext, CollaboratorError> {
        let browser: Option<Box<dyn BrowserCollaborator>> = if needs_browser {
            let browser =
                PlaywrightBrowser::launch(BrowserConfig::from_run(&self.config, trace)).await?;
            Some(Box::new(browser))
        } else {
            None
        };
        let http = ReqwestHttp::new(Duration::from_millis(self.config.expect_timeout_ms))?;
        Ok(ExecutionContext { browser, http: Box::new(http) })
    }
}

/// Main test runner.
pub struct TestRunner {
    config: Arc<RunConfig>,
    factory: Arc<dyn ContextFactory>,
}

impl TestRunner {
    /// Create a runner over the production collaborators. Validates the
    /// configuration before anything executes.
    pub fn new(config: RunConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let config = Arc::new(config);
        let factory = Arc::new(PlaywrightFactory { config: config.clone() });
        Ok(Self { config, factory })
    }

    /// Create a runner with a custom context factory.
    pub fn with_factory(
        config: RunConfig,
        factory: Arc<dyn ContextFactory>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config: Arc::new(config), factory })
    }

    /// Run every case in the registry. Individual failures are recorded
    /// in the suite result; only infrastructure problems would surface
    /// earlier, at construction time.
    pub async fn run(&self, registry: &TestRegistry) -> SuiteResult {
        let start = Instant::now();

        let permits = if self.config.fully_parallel {
            self.config.workers.unwrap_or(Semaphore::MAX_PERMITS)
        } else {
            1
        };
        let semaphore = Arc::new(Semaphore::new(permits));

        info!("running {} test case(s) across {} group(s)", registry.case_count(), registry.groups().count());

        let mut tasks = JoinSet::new();
        for group in registry.groups() {
            for case in &group.cases {
                let config = self.config.clone();
                let factory = self.factory.clone();
                let semaphore = semaphore.clone();
                let group_id = group.id.clone();
                let case = case.clone();
                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    run_case(config, factory, group_id, case).await
                });
            }
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    if outcome.passed {
                        info!(
                            "passed: {}/{} ({} ms)",
                            outcome.group, outcome.case, outcome.duration_ms
                        );
                    } else {
                        error!(
                            "failed: {}/{} - {}",
                            outcome.group,
                            outcome.case,
                            outcome.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                    outcomes.push(outcome);
                }
                Err(e) => error!("test task panicked: {}", e),
            }
        }

        // Deterministic report order regardless of completion order
        outcomes.sort_by(|a, b| a.group.cmp(&b.group).then_with(|| a.case.cmp(&b.case)));

        let passed = outcomes.iter().filter(|o| o.passed).count();
        let failed = outcomes.len() - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("{} passed, {} failed ({} ms)", passed, failed, duration_ms);

        SuiteResult { total: outcomes.len(), passed, failed, duration_ms, outcomes }
    }
}

/// Run one case through its retry budget. Every attempt gets a fresh
/// execution context.
async fn run_case(
    config: Arc<RunConfig>,
    factory: Arc<dyn ContextFactory>,
    group: String,
    case: TestCase,
) -> Outcome {
    let start = Instant::now();
    let mut attempt = 1;

    let mut outcome = loop {
        let trace = trace_path(&config, &group, &case.id, attempt);
        let outcome = attempt_case(&config, factory.as_ref(), &group, &case, trace).await;

        if outcome.passed || attempt > config.retries {
            break outcome;
        }

        debug!(
            "attempt {} of {}/{} failed, retrying: {}",
            attempt,
            group,
            case.id,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
        attempt += 1;
    };

    outcome.attempts = attempt;
    outcome.duration_ms = start.elapsed().as_millis() as u64;
    outcome
}

/// Trace destination for an attempt, per the configured policy. The
/// on-first-retry policy starts capturing from the second attempt on.
fn trace_path(config: &RunConfig, group: &str, case: &str, attempt: u32) -> Option<PathBuf> {
    let capture = match config.trace {
        TracePolicy::On => true,
        TracePolicy::OnFirstRetry => attempt > 1,
        TracePolicy::Off => false,
    };
    if !capture {
        return None;
    }

    let dir = config.output_dir.join("traces");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!("cannot create trace dir {}: {}", dir.display(), e);
        return None;
    }
    Some(dir.join(format!("{}-{}-attempt{}.zip", group, case, attempt)))
}

/// One attempt at a case: fresh context, sequential fail-fast steps,
/// deadline checked only at step boundaries so a step in flight is
/// never interrupted.
async fn attempt_case(
    config: &RunConfig,
    factory: &dyn ContextFactory,
    group: &str,
    case: &TestCase,
    trace: Option<PathBuf>,
) -> Outcome {
    let start = Instant::now();
    let mut outcome = Outcome {
        group: group.to_string(),
        case: case.id.clone(),
        passed: false,
        duration_ms: 0,
        attempts: 0,
        steps: Vec::new(),
        failed_step: None,
        error: None,
        screenshot: None,
    };

    let context = match factory.create(case.needs_browser(), trace).await {
        Ok(context) => context,
        Err(e) => {
            outcome.error = Some(format!("context setup: {}", e));
            outcome.duration_ms = start.elapsed().as_millis() as u64;
            return outcome;
        }
    };

    let mut executor = StepExecutor::new(context.browser.as_deref(), context.http.as_ref(), config);
    let deadline = start + Duration::from_millis(config.test_timeout_ms);

    for (index, step) in case.steps.iter().enumerate() {
        if Instant::now() >= deadline {
            outcome.failed_step = Some(index);
            outcome.error =
                Some(format!("test case exceeded {} ms at step {}", config.test_timeout_ms, index));
            break;
        }

        let step_start = Instant::now();
        let name = step.name();
        debug!("{}/{} step {}: {}", group, case.id, index, name);

        match executor.execute(step).await {
            Ok(observation) => match evaluate(step, &observation) {
                Verdict::Pass => outcome.steps.push(StepRecord {
                    index,
                    name,
                    passed: true,
                    duration_ms: step_start.elapsed().as_millis() as u64,
                    detail: None,
                }),
                Verdict::Mismatch { expected, actual } => {
                    let detail = format!("expected {}, observed {}", expected, actual);
                    outcome.error = Some(format!("step {} ({}): {}", index, name, detail));
                    outcome.steps.push(StepRecord {
                        index,
                        name,
                        passed: false,
                        duration_ms: step_start.elapsed().as_millis() as u64,
                        detail: Some(detail),
                    });
                    outcome.failed_step = Some(index);
                    break;
                }
            },
            Err(e) => {
                outcome.error = Some(format!("step {} ({}): {}", index, name, e));
                outcome.steps.push(StepRecord {
                    index,
                    name,
                    passed: false,
                    duration_ms: step_start.elapsed().as_millis() as u64,
                    detail: Some(e.to_string()),
                });
                outcome.failed_step = Some(index);
                break;
            }
        }
    }

    outcome.passed = outcome.error.is_none();

    let want_screenshot = match config.screenshot {
        ScreenshotPolicy::On => true,
        ScreenshotPolicy::OnlyOnFailure => !outcome.passed,
        ScreenshotPolicy::Off => false,
    };
    if want_screenshot {
        if let Some(browser) = context.browser.as_deref() {
            let name = format!("{}-{}-{}", group, case.id, if outcome.passed { "final" } else { "failure" });
            match browser.screenshot(&name, true).await {
                Ok(path) => outcome.screenshot = Some(path),
                Err(e) => debug!("screenshot for {}/{} not captured: {}", group, case.id, e),
            }
        }
    }

    if let Some(browser) = context.browser.as_deref() {
        if let Err(e) = browser.close().await {
            debug!("browser close for {}/{}: {}", group, case.id, e);
        }
    }

    outcome.duration_ms = start.elapsed().as_millis() as u64;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_policy_first_retry() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            output_dir: dir.path().to_path_buf(),
            trace: TracePolicy::OnFirstRetry,
            ..Default::default()
        };
        assert!(trace_path(&config, "g", "c", 1).is_none());
        assert!(trace_path(&config, "g", "c", 2).is_some());

        let config = RunConfig { trace: TracePolicy::Off, ..config };
        assert!(trace_path(&config, "g", "c", 2).is_none());
    }
}
