//! Playwright browser automation
//!
//! Each page is served by its own Node process running a generated bridge
//! script. The bridge launches the browser, opens one context and page,
//! then answers newline-delimited JSON requests on stdin:
//!
//! ```text
//! -> {"id":3,"op":"click","target":{"selector":".task-item","has_text":"Buy milk"},"timeout_ms":5000}
//! <- {"id":3,"ok":true,"value":null}
//! ```

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::driver::{Locator, PageDriver, PageLauncher};
use crate::error::{E2eError, E2eResult};

/// Extra time granted to the bridge on top of an operation's own timeout
const REPLY_SLACK: Duration = Duration::from_secs(5);

/// Time allowed for snapshot reads, which never wait in the browser
const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// `node_modules` directory holding `playwright`; defaults to
    /// `./node_modules` when it exists
    pub node_path: Option<PathBuf>,

    /// Browser start-up budget in milliseconds
    pub launch_timeout_ms: u64,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_path: None,
            launch_timeout_ms: 30_000,
        }
    }
}

impl PlaywrightConfig {
    fn resolved_node_path(&self) -> Option<PathBuf> {
        self.node_path.clone().or_else(|| {
            let local = PathBuf::from("node_modules");
            local.is_dir().then_some(local)
        })
    }
}

/// Starts one bridge process per page
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
    base_url: String,
}

impl PlaywrightLauncher {
    /// Create a launcher; fails when Playwright is not installed
    pub fn new(config: PlaywrightConfig, base_url: impl Into<String>) -> E2eResult<Self> {
        Self::check_playwright_installed()?;
        Ok(Self {
            config,
            base_url: base_url.into(),
        })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Build the bridge script for this launcher's settings
    pub fn build_script(&self) -> String {
        let mut script = String::new();

        // Header
        script.push_str(&format!(
            r#"
const {{ chromium, firefox, webkit }} = require('playwright');
const readline = require('readline');

const send = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless}, timeout: {launch_timeout} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }},
    baseURL: {base_url}
  }});
  const page = await context.newPage();
"#,
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            launch_timeout = self.config.launch_timeout_ms,
            width = self.config.viewport_width,
            height = self.config.viewport_height,
            base_url = js_string(&self.base_url),
        ));

        script.push_str(BRIDGE_BODY);
        script
    }
}

#[async_trait]
impl PageLauncher for PlaywrightLauncher {
    async fn open_page(&self) -> E2eResult<Arc<dyn PageDriver>> {
        let page = PlaywrightPage::spawn(&self.build_script(), &self.config).await?;
        Ok(Arc::new(page))
    }
}

/// Request loop shared by every bridge script
const BRIDGE_BODY: &str = r#"
  const resolve = (desc, root) => {
    let loc = (root || page).locator(desc.selector);
    if (desc.has_text != null) loc = loc.filter({ hasText: desc.has_text });
    if (desc.child) loc = resolve(desc.child, loc);
    return loc;
  };

  const handle = async (req) => {
    switch (req.op) {
      case 'goto':
        await page.goto(req.url, { waitUntil: 'load', timeout: req.timeout_ms });
        return null;
      case 'fill':
        await resolve(req.target).fill(req.value, { timeout: req.timeout_ms });
        return null;
      case 'click':
        await resolve(req.target).click({ timeout: req.timeout_ms });
        return null;
      case 'count':
        return await resolve(req.target).evaluateAll(
          (els) => els.filter((e) => e.getClientRects().length > 0).length);
      case 'texts':
        return await resolve(req.target).allInnerTexts();
      case 'property': {
        const loc = resolve(req.target);
        if ((await loc.count()) === 0) return null;
        const value = await loc.first().evaluate((e, name) => e[name], req.name);
        return value === undefined ? null : value;
      }
      case 'css_value': {
        const loc = resolve(req.target);
        if ((await loc.count()) === 0) return null;
        return await loc.first().evaluate(
          (e, prop) => getComputedStyle(e).getPropertyValue(prop), req.property);
      }
      case 'close':
        return null;
      default:
        throw new Error('unknown op: ' + req.op);
    }
  };

  send({ id: 0, ok: true, value: 'ready' });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    const req = JSON.parse(line);
    try {
      const value = await handle(req);
      send({ id: req.id, ok: true, value: value });
    } catch (error) {
      send({ id: req.id, ok: false, timeout: error.name === 'TimeoutError', error: error.message });
    }
    if (req.op === 'close') break;
  }

  await browser.close();
})().catch((error) => {
  send({ id: 0, ok: false, error: error.message });
  process.exit(1);
});
"#;

/// A JavaScript string literal for `s`
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    Goto { url: &'a str, timeout_ms: u64 },
    Fill { target: &'a Locator, value: &'a str, timeout_ms: u64 },
    Click { target: &'a Locator, timeout_ms: u64 },
    Count { target: &'a Locator },
    Texts { target: &'a Locator },
    Property { target: &'a Locator, name: &'a str },
    CssValue { target: &'a Locator, property: &'a str },
    Close,
}

impl BridgeCommand<'_> {
    fn describe(&self) -> String {
        match self {
            BridgeCommand::Goto { url, .. } => format!("goto:{}", url),
            BridgeCommand::Fill { target, .. } => format!("fill:{}", target),
            BridgeCommand::Click { target, .. } => format!("click:{}", target),
            BridgeCommand::Count { target } => format!("count:{}", target),
            BridgeCommand::Texts { target } => format!("texts:{}", target),
            BridgeCommand::Property { target, name } => format!("property:{}:{}", target, name),
            BridgeCommand::CssValue { target, property } => format!("css:{}:{}", target, property),
            BridgeCommand::Close => "close".to_string(),
        }
    }

    /// How long to wait for the bridge to answer
    fn reply_timeout(&self) -> Duration {
        match self {
            BridgeCommand::Goto { timeout_ms, .. }
            | BridgeCommand::Fill { timeout_ms, .. }
            | BridgeCommand::Click { timeout_ms, .. } => {
                Duration::from_millis(*timeout_ms) + REPLY_SLACK
            }
            _ => READ_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a BridgeCommand<'a>,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timeout: bool,
}

impl BridgeResponse {
    fn into_result(self, op: &str) -> E2eResult<Value> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.error.unwrap_or_else(|| "unknown error".to_string());
        if self.timeout {
            Err(E2eError::Timeout(format!("{} ({})", op, message)))
        } else {
            Err(E2eError::Playwright(format!("{}: {}", op, message)))
        }
    }
}

struct BridgeIo {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl BridgeIo {
    /// Next response line, skipping anything that is not a bridge message
    async fn read_response(&mut self) -> E2eResult<BridgeResponse> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Bridge("bridge exited unexpectedly".to_string()))?;

            match serde_json::from_str::<BridgeResponse>(&line) {
                Ok(resp) => return Ok(resp),
                Err(_) => trace!("[bridge] {}", line),
            }
        }
    }

    /// Wait for the reply to request `id`, dropping replies to abandoned requests
    async fn response_for(&mut self, id: u64, op: &str) -> E2eResult<Value> {
        loop {
            let resp = self.read_response().await?;
            if resp.id == id {
                return resp.into_result(op);
            }
            warn!("Discarding stale bridge response #{}", resp.id);
        }
    }
}

/// A browser page driven through a Playwright bridge process
pub struct PlaywrightPage {
    io: Mutex<BridgeIo>,
    next_id: AtomicU64,

    /// Holds the bridge script until the process exits
    _script_dir: TempDir,
}

impl PlaywrightPage {
    /// Write the script, start Node on it and wait for the ready message
    pub async fn spawn(script: &str, config: &PlaywrightConfig) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, script)?;

        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut cmd = TokioCommand::new("node");
        cmd.arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(node_path) = config.resolved_node_path() {
            cmd.env("NODE_PATH", std::fs::canonicalize(&node_path).unwrap_or(node_path));
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdout unavailable".to_string()))?;

        let mut io = BridgeIo {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        let launch = Duration::from_millis(config.launch_timeout_ms) + REPLY_SLACK;
        let ready = timeout(launch, io.read_response())
            .await
            .map_err(|_| E2eError::Timeout("browser launch".to_string()))??;
        ready.into_result("launch")?;

        info!("Playwright bridge ready ({})", config.browser.as_str());

        Ok(Self {
            io: Mutex::new(io),
            next_id: AtomicU64::new(1),
            _script_dir: script_dir,
        })
    }

    async fn request(&self, command: BridgeCommand<'_>) -> E2eResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let op = command.describe();
        let mut line = serde_json::to_string(&BridgeRequest { id, command: &command })?;
        line.push('\n');

        debug!("bridge #{} {}", id, op);

        let mut io = self.io.lock().await;
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        timeout(command.reply_timeout(), io.response_for(id, &op))
            .await
            .map_err(|_| E2eError::Timeout(format!("{} (bridge did not reply)", op)))?
    }
}

#[async_trait]
impl PageDriver for PlaywrightPage {
    async fn goto(&self, url: &str, timeout: Duration) -> E2eResult<()> {
        self.request(BridgeCommand::Goto {
            url,
            timeout_ms: timeout.as_millis() as u64,
        })
        .await?;
        Ok(())
    }

    async fn fill(&self, target: &Locator, value: &str, timeout: Duration) -> E2eResult<()> {
        self.request(BridgeCommand::Fill {
            target,
            value,
            timeout_ms: timeout.as_millis() as u64,
        })
        .await?;
        Ok(())
    }

    async fn click(&self, target: &Locator, timeout: Duration) -> E2eResult<()> {
        self.request(BridgeCommand::Click {
            target,
            timeout_ms: timeout.as_millis() as u64,
        })
        .await?;
        Ok(())
    }

    async fn count(&self, target: &Locator) -> E2eResult<usize> {
        let value = self.request(BridgeCommand::Count { target }).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| E2eError::Bridge(format!("count returned {}", value)))
    }

    async fn texts(&self, target: &Locator) -> E2eResult<Vec<String>> {
        let value = self.request(BridgeCommand::Texts { target }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn property(&self, target: &Locator, name: &str) -> E2eResult<Value> {
        self.request(BridgeCommand::Property { target, name }).await
    }

    async fn css_value(&self, target: &Locator, property: &str) -> E2eResult<Option<String>> {
        let value = self.request(BridgeCommand::CssValue { target, property }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn close(&self) -> E2eResult<()> {
        if let Err(e) = self.request(BridgeCommand::Close).await {
            warn!("Bridge close request failed: {}", e);
        }

        let mut io = self.io.lock().await;
        if timeout(Duration::from_secs(5), io.child.wait()).await.is_ok() {
            return Ok(());
        }

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = io.child.id() {
                warn!("Bridge did not exit, sending SIGTERM (pid: {})", pid);
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && timeout(Duration::from_millis(500), io.child.wait()).await.is_ok()
                {
                    return Ok(());
                }
            }
        }

        // Force kill if still running
        io.child.kill().await?;
        Ok(())
    }
}
