//! Mock browser engine driving a scripted page.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::browser::{BrowserEngine, BrowserError, BrowserSession, ElementHandle, ElementQuery};

#[derive(Default)]
struct Inner {
    fail_open: bool,
    /// URL reported after navigation; defaults to the navigated URL.
    landed_url: Option<String>,
    current_url: String,
    title: String,
    /// Successive `page_text` results; the last one sticks.
    page_texts: Vec<String>,
    text_index: usize,
    /// Present elements: matching query and the handle id it resolves to.
    elements: Vec<(ElementQuery, String)>,
    element_texts: Vec<(String, String)>,
    navigations: Vec<String>,
    fills: Vec<(String, String)>,
    clicks: Vec<String>,
    frames_entered: usize,
    screenshots: usize,
    closed: bool,
}

/// Browser engine whose single scripted page is shared with the test, so
/// interactions can be inspected after the strategy ran.
pub struct MockBrowserEngine {
    inner: Arc<RwLock<Inner>>,
}

impl MockBrowserEngine {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    pub async fn set_fail_open(&self, fail: bool) {
        self.inner.write().await.fail_open = fail;
    }

    pub async fn set_landed_url(&self, url: impl Into<String>) {
        self.inner.write().await.landed_url = Some(url.into());
    }

    pub async fn set_title(&self, title: impl Into<String>) {
        self.inner.write().await.title = title.into();
    }

    /// Queue the next `page_text` result.
    pub async fn push_page_text(&self, text: impl Into<String>) {
        self.inner.write().await.page_texts.push(text.into());
    }

    pub async fn clear_page_texts(&self) {
        let mut inner = self.inner.write().await;
        inner.page_texts.clear();
        inner.text_index = 0;
    }

    /// Make an element findable through the given query.
    pub async fn add_element(&self, query: ElementQuery, id: &str) {
        self.inner
            .write()
            .await
            .elements
            .push((query, id.to_string()));
    }

    pub async fn remove_element(&self, query: &ElementQuery) {
        self.inner.write().await.elements.retain(|(q, _)| q != query);
    }

    pub async fn set_element_text(&self, id: &str, text: impl Into<String>) {
        self.inner
            .write()
            .await
            .element_texts
            .push((id.to_string(), text.into()));
    }

    pub async fn navigations(&self) -> Vec<String> {
        self.inner.read().await.navigations.clone()
    }

    pub async fn fills(&self) -> Vec<(String, String)> {
        self.inner.read().await.fills.clone()
    }

    pub async fn clicks(&self) -> Vec<String> {
        self.inner.read().await.clicks.clone()
    }

    pub async fn frames_entered(&self) -> usize {
        self.inner.read().await.frames_entered
    }

    pub async fn screenshot_count(&self) -> usize {
        self.inner.read().await.screenshots
    }

    pub async fn was_closed(&self) -> bool {
        self.inner.read().await.closed
    }
}

impl Default for MockBrowserEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserEngine for MockBrowserEngine {
    fn name(&self) -> &str {
        "mock-browser"
    }

    async fn open(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        if self.inner.read().await.fail_open {
            return Err(BrowserError::Session("scripted failure".to_string()));
        }
        Ok(Box::new(MockBrowserSession {
            inner: self.inner.clone(),
        }))
    }
}

struct MockBrowserSession {
    inner: Arc<RwLock<Inner>>,
}

#[async_trait]
impl BrowserSession for MockBrowserSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let mut inner = self.inner.write().await;
        inner.navigations.push(url.to_string());
        inner.current_url = inner.landed_url.clone().unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.inner.read().await.current_url.clone())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.inner.read().await.title.clone())
    }

    async fn page_text(&self) -> Result<String, BrowserError> {
        let mut inner = self.inner.write().await;
        if inner.page_texts.is_empty() {
            return Ok(String::new());
        }
        let index = inner.text_index.min(inner.page_texts.len() - 1);
        inner.text_index += 1;
        Ok(inner.page_texts[index].clone())
    }

    async fn find(&self, queries: &[ElementQuery]) -> Result<Option<ElementHandle>, BrowserError> {
        let inner = self.inner.read().await;
        for query in queries {
            if let Some((_, id)) = inner.elements.iter().find(|(q, _)| q == query) {
                return Ok(Some(ElementHandle(id.clone())));
            }
        }
        Ok(None)
    }

    async fn element_text(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        Ok(self
            .inner
            .read()
            .await
            .element_texts
            .iter()
            .find(|(id, _)| *id == element.0)
            .map(|(_, text)| text.clone())
            .unwrap_or_default())
    }

    async fn fill(&self, element: &ElementHandle, text: &str) -> Result<(), BrowserError> {
        self.inner
            .write()
            .await
            .fills
            .push((element.0.clone(), text.to_string()));
        Ok(())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.inner.write().await.clicks.push(element.0.clone());
        Ok(())
    }

    async fn enter_frame(&self, _element: &ElementHandle) -> Result<(), BrowserError> {
        self.inner.write().await.frames_entered += 1;
        Ok(())
    }

    async fn leave_frame(&self) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        self.inner.write().await.screenshots += 1;
        // Just enough bytes to look like a PNG on disk.
        Ok(vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a])
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.inner.write().await.closed = true;
        Ok(())
    }
}
