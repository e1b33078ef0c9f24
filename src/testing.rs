//! In-memory transports for exercising the crawl loop without a network or a
//! browser.
//!
//! [`ScriptedBrowser`] evaluates CSS locators on its current HTML with
//! `scraper`. XPath locators only match when aliased to a CSS selector with
//! [`ScriptedBrowser::with_xpath`]. A click on a scripted locator replaces the
//! active tab's HTML with the next version of that script; navigating resets
//! every script. Unreachable URLs fail the way a live browser does when a page
//! does not load: [`FetchError::Navigation`] with the session intact.

use crate::error::FetchError;
use crate::fetch::{BrowserDriver, StaticFetch};
use crate::sources::Locator;
use scraper::{Html, Selector};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

pub type Log = Rc<RefCell<Vec<String>>>;

#[derive(Debug, Default)]
pub struct FakeHttp {
    pages: HashMap<String, String>,
    requests: Log,
}

impl FakeHttp {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn request_log(&self) -> Log {
        Rc::clone(&self.requests)
    }
}

impl StaticFetch for FakeHttp {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        self.requests.borrow_mut().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                url: url.to_string(),
            })
    }
}

#[derive(Debug, Default, Clone)]
struct TabState {
    html: String,
    click_positions: HashMap<String, usize>,
}

#[derive(Debug)]
pub struct ScriptedBrowser {
    pages: HashMap<String, String>,
    unreachable: HashSet<String>,
    scripts: HashMap<String, Vec<String>>,
    xpath_aliases: HashMap<String, String>,
    tabs: Vec<TabState>,
    navigations: Log,
    clicks: Log,
    typed: Log,
}

impl Default for ScriptedBrowser {
    fn default() -> Self {
        Self {
            pages: HashMap::new(),
            unreachable: HashSet::new(),
            scripts: HashMap::new(),
            xpath_aliases: HashMap::new(),
            tabs: vec![TabState::default()],
            navigations: Log::default(),
            clicks: Log::default(),
            typed: Log::default(),
        }
    }
}

impl ScriptedBrowser {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }

    /// Successive HTML versions shown after each click on `query`.
    pub fn with_clicks(mut self, query: &str, versions: Vec<String>) -> Self {
        self.scripts.insert(query.to_string(), versions);
        self
    }

    /// Let an XPath locator match whatever `css` matches.
    pub fn with_xpath(mut self, xpath: &str, css: &str) -> Self {
        self.xpath_aliases
            .insert(xpath.to_string(), css.to_string());
        self
    }

    pub fn navigation_log(&self) -> Log {
        Rc::clone(&self.navigations)
    }

    pub fn click_log(&self) -> Log {
        Rc::clone(&self.clicks)
    }

    pub fn typed_log(&self) -> Log {
        Rc::clone(&self.typed)
    }

    pub fn open_tabs(&self) -> usize {
        self.tabs.len()
    }

    fn active(&mut self) -> &mut TabState {
        if self.tabs.is_empty() {
            self.tabs.push(TabState::default());
        }
        let last = self.tabs.len() - 1;
        &mut self.tabs[last]
    }

    fn load(&self, url: &str) -> Result<String, FetchError> {
        self.navigations.borrow_mut().push(url.to_string());
        if self.unreachable.contains(url) {
            return Err(FetchError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".into(),
            });
        }
        self.pages.get(url).cloned().ok_or_else(|| FetchError::NotFound {
            url: url.to_string(),
        })
    }

    fn matches(&mut self, locator: &Locator) -> usize {
        let css = match locator {
            Locator::Css(q) => q.clone(),
            Locator::XPath(q) => match self.xpath_aliases.get(q) {
                Some(css) => css.clone(),
                None => return 0,
            },
        };
        let Ok(selector) = Selector::parse(&css) else {
            return 0;
        };
        Html::parse_document(&self.active().html)
            .select(&selector)
            .count()
    }
}

impl BrowserDriver for ScriptedBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        let html = self.load(url)?;
        *self.active() = TabState {
            html,
            click_positions: HashMap::new(),
        };
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, FetchError> {
        Ok(self.active().html.clone())
    }

    async fn count(&mut self, locator: &Locator) -> Result<usize, FetchError> {
        Ok(self.matches(locator))
    }

    async fn wait_for(&mut self, locator: &Locator, _timeout: Duration) -> Result<bool, FetchError> {
        Ok(self.matches(locator) > 0)
    }

    async fn click(&mut self, locator: &Locator) -> Result<bool, FetchError> {
        if self.matches(locator) == 0 {
            return Ok(false);
        }
        let query = locator.query().to_string();
        self.clicks.borrow_mut().push(query.clone());
        let Some(versions) = self.scripts.get(&query).cloned() else {
            return Ok(true);
        };
        let tab = self.active();
        let position = tab.click_positions.entry(query).or_insert(0);
        if let Some(next) = versions.get(*position) {
            tab.html = next.clone();
            *position += 1;
        }
        Ok(true)
    }

    async fn type_text(&mut self, locator: &Locator, text: &str) -> Result<(), FetchError> {
        if self.matches(locator) == 0 {
            return Err(FetchError::Timeout {
                what: format!("input {locator}"),
            });
        }
        self.typed.borrow_mut().push(text.to_string());
        Ok(())
    }

    async fn open_tab(&mut self, url: &str) -> Result<(), FetchError> {
        let html = self.load(url)?;
        self.tabs.push(TabState {
            html,
            click_positions: HashMap::new(),
        });
        Ok(())
    }

    async fn close_tab(&mut self) -> Result<(), FetchError> {
        if self.tabs.len() > 1 {
            self.tabs.pop();
        }
        Ok(())
    }
}
