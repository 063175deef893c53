use headless_chrome::protocol::cdp::Target;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::BrowserConfig;
use crate::plugins::traits::{BrowserEngine, BrowsingContext};
use crate::utils::error::BrowserError;

// about:blank reports "complete" before the real navigation commits.
const READY_STATE_SCRIPT: &str =
    "location.href === 'about:blank' ? 'loading' : document.readyState";

const RESPONSE_STATUS_SCRIPT: &str = r#"
    (function() {
        const entry = performance.getEntriesByType('navigation')[0];
        return entry && entry.responseStatus ? entry.responseStatus : 0;
    })()
"#;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One Chrome process shared by every cycle of a run loop.
pub struct ChromeEngine {
    browser: Mutex<Option<Arc<Browser>>>,
}

impl ChromeEngine {
    /// Launch Chrome. Blocks until the DevTools connection is up.
    pub fn launch(
        config: &BrowserConfig,
        headless: bool,
        idle_timeout: Duration,
    ) -> Result<Self, BrowserError> {
        let args: Vec<&OsStr> = config.launch_args.iter().map(OsStr::new).collect();

        let mut launch_options = LaunchOptions::default_builder()
            .headless(headless)
            .sandbox(config.sandbox)
            .idle_browser_timeout(idle_timeout)
            .args(args)
            .build()
            .map_err(|e| BrowserError::Launch(format!("invalid launch options: {}", e)))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(PathBuf::from(chrome_path));
        }

        let browser =
            Browser::new(launch_options).map_err(|e| BrowserError::Launch(e.to_string()))?;
        tracing::info!("Chrome launched (headless: {})", headless);

        Ok(Self {
            browser: Mutex::new(Some(Arc::new(browser))),
        })
    }

    fn current(&self) -> Result<Arc<Browser>, BrowserError> {
        let guard = self
            .browser
            .lock()
            .map_err(|_| BrowserError::Context("browser lock poisoned".to_string()))?;
        guard
            .clone()
            .ok_or_else(|| BrowserError::Context("browser already shut down".to_string()))
    }
}

impl BrowserEngine for ChromeEngine {
    fn new_context(&self, user_agent: &str) -> Result<Box<dyn BrowsingContext>, BrowserError> {
        let browser = self.current()?;
        let context = browser
            .new_context()
            .map_err(|e| BrowserError::Context(e.to_string()))?;
        let context_id = context.get_id().to_string();

        let setup = context.new_tab().and_then(|tab| {
            tab.set_user_agent(user_agent, None, None)?;
            Ok(tab)
        });

        let mut page = ChromeContext {
            browser: browser.clone(),
            context_id,
            tab: None,
            closed: false,
        };

        match setup {
            Ok(tab) => {
                page.tab = Some(tab);
                Ok(Box::new(page))
            }
            Err(e) => {
                if let Err(close_err) = page.close() {
                    tracing::warn!("Failed to dispose half-open context: {}", close_err);
                }
                Err(BrowserError::Context(e.to_string()))
            }
        }
    }

    fn shutdown(&self) {
        let browser = match self.browser.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if browser.is_some() {
            // The process is killed once the last Arc goes away
            drop(browser);
            tracing::info!("Chrome shut down");
        }
    }
}

pub struct ChromeContext {
    browser: Arc<Browser>,
    context_id: String,
    tab: Option<Arc<Tab>>,
    closed: bool,
}

impl ChromeContext {
    fn tab(&self) -> Result<&Arc<Tab>, BrowserError> {
        self.tab
            .as_ref()
            .ok_or_else(|| BrowserError::Context("context has no open tab".to_string()))
    }

    fn wait_until_parsed(&self, tab: &Tab, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Evaluation fails while the execution context is being replaced; keep polling
            let state = tab
                .evaluate(READY_STATE_SCRIPT, false)
                .ok()
                .and_then(|remote| remote.value)
                .and_then(|value| value.as_str().map(str::to_string));

            if matches!(state.as_deref(), Some("interactive") | Some("complete")) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::NavigationTimeout(timeout));
            }
            std::thread::sleep(READY_POLL_INTERVAL);
        }
    }

    /// Any tab outside this context, used when setup never produced our own
    fn any_browser_tab(&self) -> Option<Arc<Tab>> {
        // Copy the list so the lock is not held across DevTools calls
        let tabs: Vec<Arc<Tab>> = self.browser.get_tabs().lock().ok()?.clone();
        tabs.into_iter()
            .find(|tab| {
                tab.get_browser_context_id()
                    .ok()
                    .flatten()
                    .map_or(true, |id| id != self.context_id)
            })
    }
}

impl BrowsingContext for ChromeContext {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Option<u16>, BrowserError> {
        let tab = self.tab()?.clone();
        tab.set_default_timeout(timeout);

        tab.navigate_to(url).map_err(|e| {
            let message = e.to_string();
            if message.to_lowercase().contains("timed out") {
                BrowserError::NavigationTimeout(timeout)
            } else {
                BrowserError::Navigation(message)
            }
        })?;

        self.wait_until_parsed(&tab, timeout)?;

        let status = tab
            .evaluate(RESPONSE_STATUS_SCRIPT, false)
            .ok()
            .and_then(|remote| remote.value)
            .and_then(|value| value.as_u64())
            .and_then(|code| u16::try_from(code).ok())
            .filter(|code| *code > 0);

        Ok(status)
    }

    fn evaluate(&mut self, script: &str) -> Result<Option<String>, BrowserError> {
        let remote = self
            .tab()?
            .evaluate(script, false)
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?;

        Ok(match remote.value {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text),
            Some(other) => Some(other.to_string()),
        })
    }

    fn close(&mut self) -> Result<(), BrowserError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Disposing the context closes its tabs too
        let own_tab = self.tab.take();
        let carrier = match &own_tab {
            Some(tab) => Some(tab.clone()),
            None => self.any_browser_tab(),
        };
        let Some(carrier) = carrier else {
            return Err(BrowserError::Context(
                "no tab left to dispose the context through".to_string(),
            ));
        };

        let disposed = carrier
            .call_method(Target::DisposeBrowserContext {
                browser_context_id: self.context_id.clone(),
            })
            .map(|_| ())
            .map_err(|e| BrowserError::Context(format!("failed to dispose context: {}", e)));

        if disposed.is_err() {
            if let Some(tab) = own_tab {
                if let Err(e) = tab.close(false) {
                    tracing::debug!("Tab close failed: {}", e);
                }
            }
        }
        disposed
    }
}
