//! specrun test harness
//!
//! A Rust-controlled runner for declarative browser and API tests that:
//! - Parses YAML test specs into ordered step sequences
//! - Drives Playwright through a Node driver subprocess
//! - Issues HTTP requests and validates structured responses
//! - Aggregates per-case outcomes into a structured report
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Test Runner (Rust)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRegistry                                               │
//! │    ├── register(group, case) -> DuplicateIdentifier?        │
//! │    └── groups() -> lazy, restartable iterator               │
//! │  TestRunner                                                 │
//! │    ├── task per TestCase, semaphore-bounded workers         │
//! │    ├── StepExecutor::execute(step) -> Observation           │
//! │    └── evaluate(step, observation) -> Verdict               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Collaborators (external, behind traits)                    │
//! │    ├── BrowserCollaborator: goto / click / is_visible /     │
//! │    │     text_content / screenshot / wait_for_url           │
//! │    └── HttpCollaborator: request -> {status, headers, body} │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Spec (YAML)                                                │
//! │    group: <id>                                              │
//! │    cases:                                                   │
//! │      - id: <unique within group>                            │
//! │        steps:                                               │
//! │          - action: navigate | click | assert_visible |      │
//! │            assert_text | http_request | assert_status |     │
//! │            assert_json_shape | screenshot | wait_for_url    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps within a case are strictly sequential and fail-fast; cases are
//! independent and may run in parallel, each with its own execution
//! context.

pub mod browser;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod executor;
pub mod http;
pub mod registry;
pub mod report;
pub mod runner;
pub mod spec;

pub use config::RunConfig;
pub use error::{CollaboratorError, ConfigurationError, HarnessError, HarnessResult, RegistrationError};
pub use evaluate::{evaluate, Verdict};
pub use executor::{Observation, StepExecutor};
pub use registry::TestRegistry;
pub use runner::{Outcome, SuiteResult, TestRunner};
pub use spec::{Step, TestCase, TestGroup};
