//! specrun command-line entry point
//!
//! Loads YAML test specs, assembles the run configuration, and drives
//! the harness. Exit codes: 0 all passed, 1 test failures, 2
//! configuration or internal error.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use specrun_harness::config::{Browser, Reporter};
use specrun_harness::{report, RunConfig, TestRegistry, TestRunner};

#[derive(Parser, Debug)]
#[command(name = "specrun")]
#[command(about = "Declarative browser and API test runner")]
struct Args {
    /// Directory of YAML spec files
    #[arg(short, long, default_value = "specs")]
    specs: PathBuf,

    /// Run only this group
    #[arg(short, long)]
    group: Option<String>,

    /// Run only the test case with this id
    #[arg(short, long)]
    name: Option<String>,

    /// Optional YAML config file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL for relative step URLs
    #[arg(long)]
    base_url: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<String>,

    /// Run the browser headless (true/false)
    #[arg(long)]
    headless: Option<bool>,

    /// Concurrent case limit (default: unbounded)
    #[arg(long)]
    workers: Option<usize>,

    /// Rerun attempts for failed cases
    #[arg(long)]
    retries: Option<u32>,

    /// Apply the continuous-integration policy (2 retries, 1 worker).
    /// Also applied when the CI environment variable is set.
    #[arg(long)]
    ci: bool,

    /// Reporter (list, json)
    #[arg(long)]
    reporter: Option<String>,

    /// Output directory for reports and traces
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(run(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(2);
        }
    }
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunConfig::default(),
    };

    if args.ci || std::env::var_os("CI").is_some() {
        config = config.apply_ci();
    }

    let config = apply_overrides(config, &args);

    let registry = TestRegistry::load_dir(&args.specs)
        .with_context(|| format!("loading specs from {}", args.specs.display()))?;
    let registry = registry.filtered(args.group.as_deref(), args.name.as_deref());
    if registry.is_empty() {
        bail!("no test cases matched the given filters");
    }

    let runner = TestRunner::new(config.clone())?;
    let suite = runner.run(&registry).await;

    report::emit(&suite, &config)?;

    Ok(suite.failed == 0)
}

/// Lay explicit flags over the loaded configuration. Flags that were
/// not given leave the config-file (or default) value untouched.
fn apply_overrides(mut config: RunConfig, args: &Args) -> RunConfig {
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(workers) = args.workers {
        config.workers = Some(workers);
    }
    if let Some(retries) = args.retries {
        config.retries = retries;
    }
    if let Some(browser) = &args.browser {
        config.browser = match browser.as_str() {
            "firefox" => Browser::Firefox,
            "webkit" => Browser::Webkit,
            _ => Browser::Chromium,
        };
    }
    if let Some(headless) = args.headless {
        config.headless = headless;
    }
    if let Some(reporter) = &args.reporter {
        config.reporter = match reporter.as_str() {
            "json" => Reporter::Json,
            _ => Reporter::List,
        };
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
        config.screenshot_dir = output.join("screenshots");
    }
    config
}
