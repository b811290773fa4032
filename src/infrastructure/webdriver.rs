//! WebDriver browser
//!
//! One `fantoccini` client per run. Every `WebDriverPage` owns a window
//! handle; commands switch the session to that window first, so pages can
//! be used in any order from a single task. Element handles given out by a
//! page stay valid until its next `goto`.

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::wd::{Capabilities, WindowHandle};
use fantoccini::{Client, ClientBuilder};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::browser::{BrowserPage, BrowserSession, ElementHandle, Locator};
use super::config::BrowserEngine;
use super::errors::BrowserError;

const IDLE_POLL: Duration = Duration::from_millis(250);

const IDLE_STATE_SCRIPT: &str = "return [document.readyState, \
     (performance.getEntriesByType ? performance.getEntriesByType('resource').length : 0)];";

#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub endpoint: String,
    pub engine: BrowserEngine,
    pub headless: bool,
    /// `host:port` of an already running browser to attach to
    pub debugger_address: Option<String>,
}

impl WebDriverConfig {
    pub fn new(endpoint: impl Into<String>, engine: BrowserEngine) -> Self {
        Self {
            endpoint: endpoint.into(),
            engine,
            headless: false,
            debugger_address: None,
        }
    }
}

/// Session capabilities for the configured browser
pub fn capabilities(config: &WebDriverConfig) -> Capabilities {
    let (browser_name, options_key, options) = match config.engine {
        BrowserEngine::Firefox => {
            let args: Vec<&str> = if config.headless { vec!["-headless"] } else { Vec::new() };
            ("firefox", "moz:firefoxOptions", json!({ "args": args }))
        }
        BrowserEngine::Edge => ("MicrosoftEdge", "ms:edgeOptions", chromium_options(config)),
        BrowserEngine::Chrome => ("chrome", "goog:chromeOptions", chromium_options(config)),
    };

    let mut caps = Capabilities::new();
    caps.insert("browserName".to_string(), json!(browser_name));
    caps.insert("acceptInsecureCerts".to_string(), json!(true));
    caps.insert(options_key.to_string(), options);
    caps
}

fn chromium_options(config: &WebDriverConfig) -> Value {
    // launch arguments are meaningless when attaching
    if let Some(address) = &config.debugger_address {
        return json!({ "debuggerAddress": address });
    }
    let mut args = Vec::new();
    if config.headless {
        args.push("--headless=new");
    }
    args.extend([
        "--window-size=1400,1200",
        "--disable-dev-shm-usage",
        "--no-first-run",
        "--no-default-browser-check",
        "--lang=ko-KR",
    ]);
    if !cfg!(target_os = "macos") {
        args.push("--no-sandbox");
    }
    json!({ "args": args })
}

fn command_error(command: &str, e: &CmdError) -> BrowserError {
    classify(command, &e.to_string())
}

/// Classifies a failed command by the WebDriver error named in its message
fn classify(command: &str, message: &str) -> BrowserError {
    let kind = [
        "stale element reference",
        "no such element",
        "invalid selector",
        "element click intercepted",
        "element not interactable",
        "no such window",
    ]
    .into_iter()
    .find(|kind| message.contains(kind))
    .unwrap_or("command failed");
    BrowserError::protocol(command, kind, message)
}

fn wd_locator(locator: &Locator) -> fantoccini::Locator<'_> {
    match locator {
        Locator::Css(css) => fantoccini::Locator::Css(css),
        Locator::XPath(xpath) => fantoccini::Locator::XPath(xpath),
    }
}

struct Shared {
    client: Client,
    active_window: Mutex<Option<WindowHandle>>,
}

/// A live WebDriver session
pub struct WebDriverSession {
    shared: Arc<Shared>,
    initial_window_taken: AtomicBool,
}

impl WebDriverSession {
    pub async fn connect(config: &WebDriverConfig) -> Result<Self, BrowserError> {
        info!(
            "Creating WebDriver session at {} ({:?}, headless={}, attach={:?})",
            config.endpoint, config.engine, config.headless, config.debugger_address
        );
        let client = ClientBuilder::native()
            .capabilities(capabilities(config))
            .connect(&config.endpoint)
            .await
            .map_err(|e| BrowserError::transport(format!("session create: {e}")))?;
        info!("WebDriver session ready");

        Ok(Self {
            shared: Arc::new(Shared {
                client,
                active_window: Mutex::new(None),
            }),
            initial_window_taken: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    type Page = WebDriverPage;

    async fn new_page(&self) -> Result<WebDriverPage, BrowserError> {
        let client = &self.shared.client;
        let mut active = self.shared.active_window.lock().await;
        // The window the session starts with is handed out first
        let window = if self.initial_window_taken.swap(true, Ordering::SeqCst) {
            client
                .new_window(true)
                .await
                .map_err(|e| command_error("new window", &e))?
                .handle
        } else {
            let handle = client
                .window()
                .await
                .map_err(|e| command_error("current window", &e))?;
            *active = Some(handle.clone());
            handle
        };
        debug!("Opened window {:?}", window);
        drop(active);

        Ok(WebDriverPage {
            shared: Arc::clone(&self.shared),
            window,
            elements: Mutex::new(HashMap::new()),
            next_element: AtomicU64::new(0),
        })
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        self.shared
            .client
            .clone()
            .close()
            .await
            .map_err(|e| command_error("close session", &e))?;
        info!("WebDriver session closed");
        Ok(())
    }
}

/// One window of a `WebDriverSession`
pub struct WebDriverPage {
    shared: Arc<Shared>,
    window: WindowHandle,
    elements: Mutex<HashMap<String, Element>>,
    next_element: AtomicU64,
}

impl WebDriverPage {
    fn client(&self) -> &Client {
        &self.shared.client
    }

    /// Points the session at this page's window; the guard keeps it there
    async fn focus(&self) -> Result<MutexGuard<'_, Option<WindowHandle>>, BrowserError> {
        let mut active = self.shared.active_window.lock().await;
        if active.as_ref() != Some(&self.window) {
            self.client()
                .switch_to_window(self.window.clone())
                .await
                .map_err(|e| command_error("switch window", &e))?;
            *active = Some(self.window.clone());
        }
        Ok(active)
    }

    async fn element(&self, handle: &ElementHandle) -> Result<Element, BrowserError> {
        self.elements
            .lock()
            .await
            .get(handle.id())
            .cloned()
            .ok_or_else(|| BrowserError::NoSuchElement {
                handle: handle.id().to_string(),
            })
    }

    async fn register(&self, found: Vec<Element>) -> Vec<ElementHandle> {
        let mut elements = self.elements.lock().await;
        found
            .into_iter()
            .map(|element| {
                let id = format!("e{}", self.next_element.fetch_add(1, Ordering::Relaxed));
                elements.insert(id.clone(), element);
                ElementHandle(id)
            })
            .collect()
    }

    /// Script call without switching windows; callers hold the focus
    async fn run_script(&self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
        self.client()
            .execute(script, args)
            .await
            .map_err(|e| command_error("execute", &e))
    }

    fn element_arg(element: &Element) -> Result<Value, BrowserError> {
        serde_json::to_value(element)
            .map_err(|e| BrowserError::protocol("execute", "invalid argument", &e.to_string()))
    }
}

#[async_trait]
impl BrowserPage for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let _focus = self.focus().await?;
        self.elements.lock().await.clear();
        self.client()
            .goto(url)
            .await
            .map_err(|e| command_error("goto", &e))
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let _focus = self.focus().await?;
        self.client()
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(|e| command_error("current url", &e))
    }

    async fn content(&self) -> Result<String, BrowserError> {
        let _focus = self.focus().await?;
        self.client()
            .source()
            .await
            .map_err(|e| command_error("page source", &e))
    }

    async fn find_elements(
        &self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let _focus = self.focus().await?;
        let found = match scope {
            Some(handle) => self.element(handle).await?.find_all(wd_locator(locator)).await,
            None => self.client().find_all(wd_locator(locator)).await,
        };
        let found = found.map_err(|e| match command_error("find elements", &e) {
            BrowserError::Protocol { error, message, .. } if error == "invalid selector" => {
                BrowserError::invalid_selector(locator.as_str(), message)
            }
            other => other,
        })?;
        Ok(self.register(found).await)
    }

    async fn inner_text(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        let _focus = self.focus().await?;
        self.element(element)
            .await?
            .text()
            .await
            .map_err(|e| command_error("element text", &e))
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let _focus = self.focus().await?;
        self.element(element)
            .await?
            .attr(name)
            .await
            .map_err(|e| command_error("element attribute", &e))
    }

    async fn inner_html(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        let _focus = self.focus().await?;
        self.element(element)
            .await?
            .html(true)
            .await
            .map_err(|e| command_error("element html", &e))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        let _focus = self.focus().await?;
        let target = self.element(element).await?;
        match target.click().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let native = command_error("click", &e);
                debug!("Native click rejected ({}), dispatching script click", native);
                let arg = Self::element_arg(&target)?;
                self.run_script("arguments[0].click();", vec![arg])
                    .await
                    .map(|_| ())
                    .map_err(|_| native)
            }
        }
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        let _focus = self.focus().await?;
        let arg = Self::element_arg(&self.element(element).await?)?;
        self.run_script(
            "arguments[0].scrollIntoView({block: 'center', inline: 'nearest'});",
            vec![arg],
        )
        .await
        .map(|_| ())
    }

    async fn scroll_to_bottom(&self) -> Result<(), BrowserError> {
        self.execute("window.scrollTo(0, document.body.scrollHeight);", Vec::new())
            .await
            .map(|_| ())
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
        let _focus = self.focus().await?;
        self.run_script(script, args).await
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<(), BrowserError> {
        let started = Instant::now();
        let mut last_count: Option<u64> = None;
        loop {
            let state = self.execute(IDLE_STATE_SCRIPT, Vec::new()).await?;
            let ready = state.get(0).and_then(Value::as_str) == Some("complete");
            let count = state.get(1).and_then(Value::as_u64);
            if ready && count.is_some() && count == last_count {
                return Ok(());
            }
            last_count = count;
            if started.elapsed() >= timeout {
                debug!("Page not idle after {:?}, continuing", timeout);
                return Ok(());
            }
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        let _focus = self.focus().await?;
        self.client()
            .screenshot()
            .await
            .map_err(|e| command_error("screenshot", &e))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut active = self.focus().await?;
        let client = self.client();
        let result = client
            .close_window()
            .await
            .map_err(|e| command_error("close window", &e));
        *active = None;
        self.elements.lock().await.clear();
        result?;

        // keep the session pointed at a live window
        let remaining = client
            .windows()
            .await
            .map_err(|e| command_error("list windows", &e))?;
        debug!("Closed window {:?} ({} left)", self.window, remaining.len());
        if let Some(next) = remaining.into_iter().next() {
            match client.switch_to_window(next.clone()).await {
                Ok(()) => *active = Some(next),
                Err(e) => warn!("Could not switch to window {:?}: {}", next, e),
            }
        }
        Ok(())
    }
}
