//! Reporting - console summary and structured JSON artifact
//!
//! Anything richer (HTML, CI annotations) is expected to consume the
//! JSON file rather than live here.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{Reporter, RunConfig};
use crate::error::HarnessResult;
use crate::runner::SuiteResult;

/// Envelope written to `test-results.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub generated_at: String,
    pub suite: SuiteResult,
}

/// Emit the suite result per the configured reporter. The list reporter
/// prints to the console; the json reporter writes the artifact and
/// prints only the closing summary.
pub fn emit(suite: &SuiteResult, config: &RunConfig) -> HarnessResult<()> {
    match config.reporter {
        Reporter::List => print_list(suite),
        Reporter::Json => {
            let path = write_json(suite, &config.output_dir)?;
            println!("report written to {}", path.display());
            print_summary(suite);
        }
    }
    Ok(())
}

/// Serialize the suite result to `<output_dir>/test-results.json`.
pub fn write_json(suite: &SuiteResult, output_dir: &Path) -> HarnessResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let report = JsonReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        suite: suite.clone(),
    };

    let path = output_dir.join("test-results.json");
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&path, json)?;

    info!("results written to {}", path.display());
    Ok(path)
}

/// Per-case console lines plus a summary.
pub fn print_list(suite: &SuiteResult) {
    for outcome in &suite.outcomes {
        let label = format!("{}/{}", outcome.group, outcome.case);
        if outcome.passed {
            println!("  {} {} ({} ms)", "✓".green(), label, outcome.duration_ms);
        } else {
            println!("  {} {} ({} ms)", "✗".red(), label, outcome.duration_ms);
            if let Some(index) = outcome.failed_step {
                println!("      failed at step {}", index);
            }
            if let Some(error) = &outcome.error {
                println!("      {}", error.red());
            }
            if let Some(screenshot) = &outcome.screenshot {
                println!("      screenshot: {}", screenshot.display());
            }
        }
    }
    println!();
    print_summary(suite);
}

fn print_summary(suite: &SuiteResult) {
    let passed = format!("{} passed", suite.passed);
    let failed = format!("{} failed", suite.failed);
    println!(
        "{}, {} of {} total ({} ms)",
        if suite.passed > 0 { passed.green().to_string() } else { passed },
        if suite.failed > 0 { failed.red().to_string() } else { failed },
        suite.total,
        suite.duration_ms
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::Outcome;

    fn suite() -> SuiteResult {
        SuiteResult {
            total: 1,
            passed: 1,
            failed: 0,
            duration_ms: 12,
            outcomes: vec![Outcome {
                group: "api".to_string(),
                case: "get-post".to_string(),
                passed: true,
                duration_ms: 12,
                attempts: 1,
                steps: Vec::new(),
                failed_step: None,
                error: None,
                screenshot: None,
            }],
        }
    }

    #[test]
    fn test_write_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(&suite(), dir.path()).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        let report: JsonReport = serde_json::from_str(&content).unwrap();
        assert_eq!(report.suite.total, 1);
        assert_eq!(report.suite.outcomes[0].case, "get-post");
        assert!(!report.generated_at.is_empty());
    }
}
