//! Headless browser abstraction used by the web purchase path.

use async_trait::async_trait;
use thiserror::Error;

/// Error type for browser automation.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to open browser session: {0}")]
    Session(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element not found")]
    ElementNotFound,

    #[error("Browser operation timed out")]
    Timeout,

    #[error("Browser protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A way to locate an element on the page. Queries are tried in order, so a
/// caller can express "the quantity field, however this page labels it".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementQuery {
    /// CSS selector.
    Css(String),
    /// Accessibility label (aria-label).
    AccessibleLabel(String),
    /// Element whose visible text contains the given string.
    VisibleText(String),
}

/// Opaque handle to a located element, valid within one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

/// One live browser page.
///
/// `close` must always be called; implementations hold remote session state.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// The URL after navigation and any redirects.
    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn title(&self) -> Result<String, BrowserError>;

    /// Visible text of the whole page.
    async fn page_text(&self) -> Result<String, BrowserError>;

    /// First element matching any of the queries, tried in order.
    async fn find(&self, queries: &[ElementQuery]) -> Result<Option<ElementHandle>, BrowserError>;

    async fn element_text(&self, element: &ElementHandle) -> Result<String, BrowserError>;

    /// Clear and type into an input element.
    async fn fill(&self, element: &ElementHandle, text: &str) -> Result<(), BrowserError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError>;

    /// Switch into an iframe (payment forms commonly live in one).
    async fn enter_frame(&self, element: &ElementHandle) -> Result<(), BrowserError>;

    /// Switch back to the parent document.
    async fn leave_frame(&self) -> Result<(), BrowserError>;

    /// PNG screenshot of the current page.
    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// Factory for browser sessions.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &str;

    /// Open a fresh session.
    async fn open(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}
