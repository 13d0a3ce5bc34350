//! Browser seam used by the page object
//!
//! A [`PageDriver`] is one isolated browser page. Actions (`goto`, `fill`,
//! `click`) auto-wait up to the given timeout; reads (`count`, `texts`,
//! `property`, `css_value`) return a snapshot and never wait, leaving
//! retries to [`crate::wait::Poller`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// Element lookup, shaped like a Playwright locator chain:
/// `page.locator(selector).filter({ hasText }).locator(child...)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub selector: String,

    /// Keep only matches whose text contains this string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_text: Option<String>,

    /// Narrow to descendants of the matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<Box<Locator>>,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            has_text: None,
            child: None,
        }
    }

    /// Filter the innermost matches by contained text
    pub fn has_text(mut self, text: impl Into<String>) -> Self {
        match self.child.take() {
            Some(child) => self.child = Some(Box::new(child.has_text(text))),
            None => self.has_text = Some(text.into()),
        }
        self
    }

    /// Append a descendant selector to the chain
    pub fn locator(mut self, child: Locator) -> Self {
        match self.child.take() {
            Some(inner) => self.child = Some(Box::new(inner.locator(child))),
            None => self.child = Some(Box::new(child)),
        }
        self
    }

    /// The last link of the chain
    pub fn leaf(&self) -> &Locator {
        match &self.child {
            Some(child) => child.leaf(),
            None => self,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selector)?;
        if let Some(text) = &self.has_text {
            write!(f, " >> has-text={:?}", text)?;
        }
        if let Some(child) = &self.child {
            write!(f, " >> {}", child)?;
        }
        Ok(())
    }
}

/// One browser page
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and resolve once the page has loaded
    async fn goto(&self, url: &str, timeout: Duration) -> E2eResult<()>;

    /// Replace the value of an input
    async fn fill(&self, target: &Locator, value: &str, timeout: Duration) -> E2eResult<()>;

    /// Click once the element is actionable
    async fn click(&self, target: &Locator, timeout: Duration) -> E2eResult<()>;

    /// Number of visible matches
    async fn count(&self, target: &Locator) -> E2eResult<usize>;

    /// Inner text of every match
    async fn texts(&self, target: &Locator) -> E2eResult<Vec<String>>;

    /// A DOM property of the first match, `Null` when nothing matches
    async fn property(&self, target: &Locator, name: &str) -> E2eResult<serde_json::Value>;

    /// A computed style of the first match, `None` when nothing matches
    async fn css_value(&self, target: &Locator, property: &str) -> E2eResult<Option<String>>;

    async fn close(&self) -> E2eResult<()>;
}

/// Opens isolated pages, one per scenario
#[async_trait]
pub trait PageLauncher: Send + Sync {
    async fn open_page(&self) -> E2eResult<Arc<dyn PageDriver>>;
}
