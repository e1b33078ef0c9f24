//! [`BrowserDriver`] backed by a headless Chrome over the DevTools protocol.
//!
//! `headless_chrome` is a blocking API. Every call runs on the blocking pool
//! with an owned `Arc<Tab>`, so the async crawl loop never stalls a runtime
//! worker. The browser is launched on first use: runs that only touch static
//! sources never start Chrome.
//!
//! A failed navigation or click is reported as [`FetchError::Navigation`] for
//! that page. Only when the browser itself stops answering is it reported as
//! [`FetchError::Browser`], which ends the traversal.

use super::BrowserDriver;
use crate::error::FetchError;
use crate::sources::Locator;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    /// Chrome binary; `None` lets `headless_chrome` look for one.
    pub path: Option<PathBuf>,
    pub window_size: (u32, u32),
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            headless: true,
            path: None,
            window_size: (1366, 900),
        }
    }
}

impl ChromeOptions {
    fn launch_options(&self) -> LaunchOptions<'static> {
        LaunchOptions {
            headless: self.headless,
            sandbox: false,
            path: self.path.clone(),
            window_size: Some(self.window_size),
            // Static-only stretches can leave the browser idle for a while.
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        }
    }
}

struct Session {
    browser: Arc<Browser>,
    /// Open tabs; the last one is active.
    tabs: Vec<Arc<Tab>>,
}

pub struct ChromeDriver {
    options: ChromeOptions,
    session: Option<Session>,
}

fn browser_err(e: impl Display) -> FetchError {
    FetchError::Browser(e.to_string())
}

/// Error for a failed operation on the page at `url`.
fn page_err(browser: &Browser, url: &str, e: impl Display) -> FetchError {
    classify(browser.get_version().is_ok(), url, e)
}

fn classify(browser_alive: bool, url: &str, e: impl Display) -> FetchError {
    if browser_alive {
        FetchError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        }
    } else {
        FetchError::Browser(format!("session lost at {url}: {e}"))
    }
}

async fn blocking<T, F>(f: F) -> Result<T, FetchError>
where
    F: FnOnce() -> Result<T, FetchError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FetchError::Browser(format!("browser task failed: {e}")))?
}

impl ChromeDriver {
    pub fn new(options: ChromeOptions) -> Self {
        Self {
            options,
            session: None,
        }
    }

    async fn session(&mut self) -> Result<&mut Session, FetchError> {
        if self.session.is_none() {
            let launch = self.options.launch_options();
            info!(headless = launch.headless, "Launching Chrome");
            let session = blocking(move || {
                let browser = Browser::new(launch).map_err(browser_err)?;
                let tab = browser.new_tab().map_err(browser_err)?;
                Ok(Session {
                    browser: Arc::new(browser),
                    tabs: vec![tab],
                })
            })
            .await?;
            self.session = Some(session);
        }
        self.session
            .as_mut()
            .ok_or_else(|| FetchError::Browser("browser session unavailable".into()))
    }

    async fn active(&mut self) -> Result<(Arc<Browser>, Arc<Tab>), FetchError> {
        let session = self.session().await?;
        let tab = session
            .tabs
            .last()
            .cloned()
            .ok_or_else(|| FetchError::Browser("no open tab".into()))?;
        Ok((Arc::clone(&session.browser), tab))
    }
}

impl BrowserDriver for ChromeDriver {
    #[instrument(level = "debug", skip(self))]
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        let (browser, tab) = self.active().await?;
        let url = url.to_string();
        blocking(move || {
            tab.navigate_to(&url)
                .and_then(|tab| tab.wait_until_navigated())
                .map_err(|e| page_err(&browser, &url, e))?;
            Ok(())
        })
        .await
    }

    async fn page_source(&mut self) -> Result<String, FetchError> {
        let (browser, tab) = self.active().await?;
        blocking(move || {
            tab.get_content()
                .map_err(|e| page_err(&browser, &tab.get_url(), e))
        })
        .await
    }

    async fn count(&mut self, locator: &Locator) -> Result<usize, FetchError> {
        let (_, tab) = self.active().await?;
        let locator = locator.clone();
        blocking(move || {
            // headless_chrome reports "no match" as an error.
            let found = match &locator {
                Locator::Css(q) => tab.find_elements(q).map(|v| v.len()),
                Locator::XPath(q) => tab.find_elements_by_xpath(q).map(|v| v.len()),
            };
            Ok(found.unwrap_or(0))
        })
        .await
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<bool, FetchError> {
        let (_, tab) = self.active().await?;
        let locator = locator.clone();
        blocking(move || {
            let found = match &locator {
                Locator::Css(q) => tab.wait_for_element_with_custom_timeout(q, timeout).is_ok(),
                Locator::XPath(q) => tab.wait_for_xpath_with_custom_timeout(q, timeout).is_ok(),
            };
            if !found {
                debug!(%locator, ?timeout, "Element did not show up");
            }
            Ok(found)
        })
        .await
    }

    async fn click(&mut self, locator: &Locator) -> Result<bool, FetchError> {
        let (browser, tab) = self.active().await?;
        let locator = locator.clone();
        blocking(move || {
            let element = match &locator {
                Locator::Css(q) => tab.find_element(q),
                Locator::XPath(q) => tab.find_element_by_xpath(q),
            };
            let Ok(element) = element else {
                return Ok(false);
            };
            // A JS click is not intercepted by overlays the way a pointer click is.
            element
                .call_js_fn("function() { this.click(); }", vec![], false)
                .map_err(|e| page_err(&browser, &tab.get_url(), e))?;
            Ok(true)
        })
        .await
    }

    async fn type_text(&mut self, locator: &Locator, text: &str) -> Result<(), FetchError> {
        let (browser, tab) = self.active().await?;
        let locator = locator.clone();
        let text = text.to_string();
        blocking(move || {
            let element = match &locator {
                Locator::Css(q) => tab.find_element(q),
                Locator::XPath(q) => tab.find_element_by_xpath(q),
            }
            .map_err(|_| FetchError::Timeout {
                what: format!("input {locator}"),
            })?;
            element
                .click()
                .and_then(|element| element.type_into(&text))
                .map_err(|e| page_err(&browser, &tab.get_url(), e))?;
            Ok(())
        })
        .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn open_tab(&mut self, url: &str) -> Result<(), FetchError> {
        let session = self.session().await?;
        let browser = Arc::clone(&session.browser);
        let url = url.to_string();
        let tab = blocking(move || {
            let tab = browser
                .new_tab()
                .map_err(|e| page_err(&browser, &url, e))?;
            let loaded = tab
                .navigate_to(&url)
                .and_then(|tab| tab.wait_until_navigated())
                .map(|_| ());
            if let Err(e) = loaded {
                let err = page_err(&browser, &url, e);
                // Not on the tab stack yet, so close_tab could never reach it.
                if let Err(close) = tab.close(true) {
                    warn!(%url, error = %close, "Failed to close unloaded tab");
                }
                return Err(err);
            }
            Ok(tab)
        })
        .await?;
        self.session().await?.tabs.push(tab);
        Ok(())
    }

    async fn close_tab(&mut self) -> Result<(), FetchError> {
        let session = self.session().await?;
        if session.tabs.len() < 2 {
            warn!("Refusing to close the primary tab");
            return Ok(());
        }
        let browser = Arc::clone(&session.browser);
        let closing = session.tabs.pop();
        let previous = session.tabs.last().cloned();
        blocking(move || {
            if let Some(tab) = closing {
                tab.close(true)
                    .map_err(|e| page_err(&browser, &tab.get_url(), e))?;
            }
            if let Some(tab) = previous {
                tab.activate()
                    .map_err(|e| page_err(&browser, &tab.get_url(), e))?;
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_options_follow_settings() {
        let options = ChromeOptions {
            headless: false,
            path: Some(PathBuf::from("/usr/bin/chromium")),
            window_size: (800, 600),
        };
        let launch = options.launch_options();
        assert!(!launch.headless);
        assert!(!launch.sandbox);
        assert_eq!(launch.window_size, Some((800, 600)));
        assert_eq!(launch.path, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[test]
    fn test_page_failures_keep_the_session() {
        let err = classify(true, "https://www.ara.ad/x.html", "net::ERR_TIMED_OUT");
        assert!(matches!(err, FetchError::Navigation { .. }));
        assert!(!err.is_session_loss());
        assert_eq!(
            err.to_string(),
            "could not load https://www.ara.ad/x.html: net::ERR_TIMED_OUT"
        );

        let lost = classify(false, "https://www.ara.ad/x.html", "connection closed");
        assert!(lost.is_session_loss());
    }

    #[test]
    fn test_driver_starts_without_browser() {
        let driver = ChromeDriver::new(ChromeOptions::default());
        assert!(driver.session.is_none());
    }
}
