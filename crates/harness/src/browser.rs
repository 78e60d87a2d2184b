//! Browser collaborator - Playwright driven through a Node subprocess
//!
//! A small driver script is staged into a temp directory and run with
//! `node`. The driver reads one JSON command per stdin line, performs it
//! against a single page, and answers with one JSON line on stdout. One
//! driver process per execution context keeps cases isolated.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{Browser, RunConfig};
use crate::error::CollaboratorError;

/// External browser automation seam.
#[async_trait]
pub trait BrowserCollaborator: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), CollaboratorError>;
    async fn click(&self, selector: &str, timeout_ms: u64) -> Result<(), CollaboratorError>;
    async fn is_visible(&self, selector: &str) -> Result<bool, CollaboratorError>;
    async fn text_content(&self, selector: &str) -> Result<Option<String>, CollaboratorError>;
    async fn title(&self) -> Result<String, CollaboratorError>;
    async fn count(&self, selector: &str) -> Result<usize, CollaboratorError>;
    async fn screenshot(&self, name: &str, full_page: bool) -> Result<PathBuf, CollaboratorError>;
    async fn wait_for_url(&self, pattern: &str) -> Result<(), CollaboratorError>;

    /// Release collaborator resources. Default is a no-op for
    /// collaborators with nothing to tear down.
    async fn close(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Configuration for one driver process.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub browser: Browser,
    pub headless: bool,
    pub expect_timeout_ms: u64,
    pub screenshot_dir: PathBuf,
    /// Write a Playwright trace zip to this path on close, when set
    pub trace: Option<PathBuf>,
}

impl BrowserConfig {
    pub fn from_run(config: &RunConfig, trace: Option<PathBuf>) -> Self {
        Self {
            browser: config.browser,
            headless: config.headless,
            expect_timeout_ms: config.expect_timeout_ms,
            screenshot_dir: config.screenshot_dir.clone(),
            trace,
        }
    }
}

const DRIVER_JS: &str = r#"
const readline = require('readline');
const { chromium, firefox, webkit } = require('playwright');

(async () => {
  const engines = { chromium, firefox, webkit };
  const engine = engines[process.env.SPECRUN_BROWSER] || chromium;
  const browser = await engine.launch({ headless: process.env.SPECRUN_HEADLESS !== '0' });
  const context = await browser.newContext();
  const tracing = process.env.SPECRUN_TRACE_PATH;
  if (tracing) {
    await context.tracing.start({ screenshots: true, snapshots: true });
  }
  const page = await context.newPage();
  const timeout = parseInt(process.env.SPECRUN_TIMEOUT_MS || '5000', 10);
  page.setDefaultTimeout(timeout);

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    let cmd;
    try { cmd = JSON.parse(line); } catch (e) { continue; }
    try {
      let value = null;
      switch (cmd.op) {
        case 'goto':
          await page.goto(cmd.url);
          break;
        case 'click':
          await page.click(cmd.selector, { timeout: cmd.timeout_ms || timeout });
          break;
        case 'is_visible':
          try {
            await page.locator(cmd.selector).first().waitFor({ state: 'visible', timeout });
            value = true;
          } catch (e) {
            value = false;
          }
          break;
        case 'title':
          value = await page.title();
          break;
        case 'count':
          value = await page.locator(cmd.selector).count();
          break;
        case 'text_content':
          value = await page.locator(cmd.selector).first().textContent({ timeout });
          break;
        case 'screenshot':
          await page.screenshot({ path: cmd.path, fullPage: !!cmd.full_page });
          value = cmd.path;
          break;
        case 'wait_for_url':
          await page.waitForURL(new RegExp(cmd.pattern), { timeout });
          break;
        case 'close':
          if (tracing) {
            await context.tracing.stop({ path: tracing });
          }
          await browser.close();
          console.log(JSON.stringify({ ok: true, value: null }));
          process.exit(0);
        default:
          throw new Error('unknown op: ' + cmd.op);
      }
      console.log(JSON.stringify({ ok: true, value }));
    } catch (error) {
      const message = (error && error.message) ? error.message : String(error);
      console.log(JSON.stringify({ ok: false, error: message }));
    }
  }
})();
"#;

#[derive(Debug, Deserialize)]
struct DriverReply {
    ok: bool,
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

struct DriverProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// Production collaborator: one Playwright page behind a Node driver.
pub struct PlaywrightBrowser {
    driver: Mutex<DriverProcess>,
    expect_timeout_ms: u64,
    screenshot_dir: PathBuf,
    // Keeps the staged driver script alive for the process lifetime
    _script_dir: tempfile::TempDir,
}

impl PlaywrightBrowser {
    /// Launch the driver process. Fails fast when Playwright is not
    /// installed.
    pub async fn launch(config: BrowserConfig) -> Result<Self, CollaboratorError> {
        Self::check_playwright_installed()?;

        std::fs::create_dir_all(&config.screenshot_dir)?;

        let script_dir = tempfile::tempdir()?;
        let driver_path = script_dir.path().join("driver.js");
        std::fs::write(&driver_path, DRIVER_JS)?;

        debug!("launching {} driver: {}", config.browser.as_str(), driver_path.display());

        let mut cmd = TokioCommand::new("node");
        cmd.arg(&driver_path)
            .env("SPECRUN_BROWSER", config.browser.as_str())
            .env("SPECRUN_HEADLESS", if config.headless { "1" } else { "0" })
            .env("SPECRUN_TIMEOUT_MS", config.expect_timeout_ms.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(trace_path) = &config.trace {
            cmd.env("SPECRUN_TRACE_PATH", trace_path);
        }

        let mut child = cmd.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CollaboratorError::Protocol("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CollaboratorError::Protocol("driver stdout unavailable".to_string()))?;

        Ok(Self {
            driver: Mutex::new(DriverProcess {
                child,
                stdin,
                stdout: BufReader::new(stdout).lines(),
            }),
            expect_timeout_ms: config.expect_timeout_ms,
            screenshot_dir: config.screenshot_dir,
            _script_dir: script_dir,
        })
    }

    fn check_playwright_installed() -> Result<(), CollaboratorError> {
        let status = std::process::Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(CollaboratorError::PlaywrightNotFound),
        }
    }

    async fn call(&self, cmd: serde_json::Value) -> Result<Option<serde_json::Value>, String> {
        let mut driver = self.driver.lock().await;

        let mut line = cmd.to_string();
        line.push('\n');
        driver
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| format!("driver write failed: {}", e))?;

        let reply = driver
            .stdout
            .next_line()
            .await
            .map_err(|e| format!("driver read failed: {}", e))?
            .ok_or_else(|| "driver closed its stdout".to_string())?;

        let reply: DriverReply =
            serde_json::from_str(&reply).map_err(|e| format!("unparseable driver reply: {}", e))?;

        if reply.ok {
            Ok(reply.value)
        } else {
            Err(reply.error.unwrap_or_else(|| "unknown driver error".to_string()))
        }
    }

    fn timed_out(message: &str) -> bool {
        message.to_ascii_lowercase().contains("timeout")
    }

    fn element_error(target: &str, timeout_ms: u64, message: String) -> CollaboratorError {
        if Self::timed_out(&message) {
            CollaboratorError::AssertionTimeout { target: target.to_string(), timeout_ms }
        } else {
            CollaboratorError::ElementNotFound(format!("{}: {}", target, message))
        }
    }
}

#[async_trait]
impl BrowserCollaborator for PlaywrightBrowser {
    async fn goto(&self, url: &str) -> Result<(), CollaboratorError> {
        self.call(json!({ "op": "goto", "url": url })).await.map_err(|message| {
            if Self::timed_out(&message) {
                CollaboratorError::NavigationTimeout(url.to_string())
            } else {
                CollaboratorError::Protocol(format!("goto {}: {}", url, message))
            }
        })?;
        Ok(())
    }

    async fn click(&self, selector: &str, timeout_ms: u64) -> Result<(), CollaboratorError> {
        self.call(json!({ "op": "click", "selector": selector, "timeout_ms": timeout_ms }))
            .await
            .map_err(|message| Self::element_error(selector, timeout_ms, message))?;
        Ok(())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, CollaboratorError> {
        let value = self
            .call(json!({ "op": "is_visible", "selector": selector }))
            .await
            .map_err(|message| Self::element_error(selector, self.expect_timeout_ms, message))?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>, CollaboratorError> {
        let value = self
            .call(json!({ "op": "text_content", "selector": selector }))
            .await
            .map_err(|message| Self::element_error(selector, self.expect_timeout_ms, message))?;
        Ok(value.and_then(|v| v.as_str().map(String::from)))
    }

    async fn title(&self) -> Result<String, CollaboratorError> {
        let value = self
            .call(json!({ "op": "title" }))
            .await
            .map_err(|message| CollaboratorError::Protocol(format!("title: {}", message)))?;
        Ok(value.and_then(|v| v.as_str().map(String::from)).unwrap_or_default())
    }

    async fn count(&self, selector: &str) -> Result<usize, CollaboratorError> {
        let value = self
            .call(json!({ "op": "count", "selector": selector }))
            .await
            .map_err(|message| Self::element_error(selector, self.expect_timeout_ms, message))?;
        Ok(value.and_then(|v| v.as_u64()).unwrap_or(0) as usize)
    }

    async fn screenshot(&self, name: &str, full_page: bool) -> Result<PathBuf, CollaboratorError> {
        let path = self.screenshot_dir.join(format!("{}.png", name));
        self.call(json!({
            "op": "screenshot",
            "path": path.to_string_lossy(),
            "full_page": full_page,
        }))
        .await
        .map_err(|message| CollaboratorError::Protocol(format!("screenshot {}: {}", name, message)))?;
        Ok(path)
    }

    async fn wait_for_url(&self, pattern: &str) -> Result<(), CollaboratorError> {
        self.call(json!({ "op": "wait_for_url", "pattern": pattern })).await.map_err(|message| {
            if Self::timed_out(&message) {
                CollaboratorError::NavigationTimeout(format!("url matching /{}/", pattern))
            } else {
                CollaboratorError::Protocol(format!("wait_for_url /{}/: {}", pattern, message))
            }
        })?;
        Ok(())
    }

    async fn close(&self) -> Result<(), CollaboratorError> {
        let _ = self.call(json!({ "op": "close" })).await;
        let mut driver = self.driver.lock().await;
        let _ = driver.child.wait().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_waits_for_visibility_within_timeout() {
        // The visibility check must poll up to the assertion timeout and
        // answer false on expiry rather than sample the DOM once.
        assert!(DRIVER_JS.contains("waitFor({ state: 'visible', timeout })"));
        assert!(!DRIVER_JS.contains("isVisible()"));
    }

    #[test]
    fn test_driver_covers_every_browser_op() {
        for op in
            ["goto", "click", "is_visible", "text_content", "title", "count", "screenshot", "wait_for_url", "close"]
        {
            assert!(DRIVER_JS.contains(&format!("case '{}':", op)), "missing op {}", op);
        }
    }
}
