//! W3C WebDriver client (chromedriver/geckodriver compatible).

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::BrowserConfig;

use super::{BrowserEngine, BrowserError, BrowserSession, ElementHandle, ElementQuery};

// W3C element identifier key in find-element responses.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Browser engine speaking the W3C WebDriver protocol over HTTP.
pub struct WebDriverEngine {
    client: Client,
    config: BrowserConfig,
}

impl WebDriverEngine {
    /// Create a new engine pointed at a running WebDriver endpoint.
    pub fn new(config: BrowserConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(
                (config.navigation_timeout_secs + config.action_timeout_secs) as u64,
            ))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }
}

#[async_trait]
impl BrowserEngine for WebDriverEngine {
    fn name(&self) -> &str {
        "webdriver"
    }

    async fn open(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "timeouts": {
                        "pageLoad": self.config.navigation_timeout_secs * 1000,
                        "implicit": self.config.action_timeout_secs * 1000,
                    }
                }
            }
        });

        let base = self.config.webdriver_url.trim_end_matches('/').to_string();
        let response = self
            .client
            .post(format!("{}/session", base))
            .json(&capabilities)
            .send()
            .await
            .map_err(|e| BrowserError::Session(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| BrowserError::Session(e.to_string()))?;

        let session_id = body["value"]["sessionId"]
            .as_str()
            .ok_or_else(|| BrowserError::Session(format!("no session id in {}", body)))?
            .to_string();

        debug!(session_id = %session_id, "webdriver session opened");

        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            base: format!("{}/session/{}", base, session_id),
        }))
    }
}

struct WebDriverSession {
    client: Client,
    base: String,
}

impl WebDriverSession {
    fn map_send_error(e: reqwest::Error) -> BrowserError {
        if e.is_timeout() {
            BrowserError::Timeout
        } else {
            BrowserError::Protocol(e.to_string())
        }
    }

    /// Issue a command and return the `value` field of the response body.
    /// WebDriver errors come back as `value.error` / `value.message`.
    async fn command(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, BrowserError> {
        let url = format!("{}{}", self.base, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        } else {
            // chromedriver rejects POSTs with no body.
            request = request.json(&json!({}));
        }

        let response = request.send().await.map_err(Self::map_send_error)?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;

        let value = &body["value"];
        if let Some(error) = value["error"].as_str() {
            let message = value["message"].as_str().unwrap_or_default().to_string();
            return Err(match error {
                "no such element" | "stale element reference" => BrowserError::ElementNotFound,
                "timeout" | "script timeout" => BrowserError::Timeout,
                _ => BrowserError::Protocol(format!("{}: {}", error, message)),
            });
        }
        Ok(value.clone())
    }

    async fn get(&self, path: &str) -> Result<Value, BrowserError> {
        let url = format!("{}{}", self.base, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;

        let value = &body["value"];
        if let Some(error) = value["error"].as_str() {
            let message = value["message"].as_str().unwrap_or_default().to_string();
            return Err(match error {
                "no such element" | "stale element reference" => BrowserError::ElementNotFound,
                _ => BrowserError::Protocol(format!("{}: {}", error, message)),
            });
        }
        Ok(value.clone())
    }

    fn locator_for(query: &ElementQuery) -> (&'static str, String) {
        match query {
            ElementQuery::Css(selector) => ("css selector", selector.clone()),
            ElementQuery::AccessibleLabel(label) => (
                "xpath",
                format!("//*[@aria-label={}]", xpath_literal(label)),
            ),
            // An unrestricted contains() would match every ancestor of the
            // text node and find-element would return <html> first; only
            // interactive or leaf nodes are clickable targets.
            ElementQuery::VisibleText(text) => (
                "xpath",
                format!(
                    "//*[self::button or self::a or not(*)][contains(normalize-space(.), {})]",
                    xpath_literal(text)
                ),
            ),
        }
    }

    async fn find_one(&self, query: &ElementQuery) -> Result<Option<ElementHandle>, BrowserError> {
        let (using, value) = Self::locator_for(query);
        let result = self
            .command(
                reqwest::Method::POST,
                "/element",
                Some(json!({ "using": using, "value": value })),
            )
            .await;

        match result {
            Ok(value) => {
                let id = value[ELEMENT_KEY]
                    .as_str()
                    .ok_or_else(|| BrowserError::Protocol(format!("no element id in {}", value)))?;
                Ok(Some(ElementHandle(id.to_string())))
            }
            Err(BrowserError::ElementNotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Quote a string for embedding in an XPath expression.
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{}'", s)
    } else if !s.contains('"') {
        format!("\"{}\"", s)
    } else {
        // Mixed quotes need concat().
        let parts: Vec<String> = s
            .split('\'')
            .map(|part| format!("'{}'", part))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        debug!(url, "navigating");
        self.command(reqwest::Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map_err(|e| match e {
                BrowserError::Timeout => BrowserError::Timeout,
                other => BrowserError::Navigation(other.to_string()),
            })?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let value = self.get("/url").await?;
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| BrowserError::Protocol("current url is not a string".to_string()))
    }

    async fn title(&self) -> Result<String, BrowserError> {
        let value = self.get("/title").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn page_text(&self) -> Result<String, BrowserError> {
        let body = self
            .find(&[ElementQuery::Css("body".to_string())])
            .await?
            .ok_or(BrowserError::ElementNotFound)?;
        self.element_text(&body).await
    }

    async fn find(&self, queries: &[ElementQuery]) -> Result<Option<ElementHandle>, BrowserError> {
        for query in queries {
            if let Some(element) = self.find_one(query).await? {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    async fn element_text(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        let value = self.get(&format!("/element/{}/text", element.0)).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn fill(&self, element: &ElementHandle, text: &str) -> Result<(), BrowserError> {
        self.command(
            reqwest::Method::POST,
            &format!("/element/{}/clear", element.0),
            None,
        )
        .await?;
        self.command(
            reqwest::Method::POST,
            &format!("/element/{}/value", element.0),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.command(
            reqwest::Method::POST,
            &format!("/element/{}/click", element.0),
            None,
        )
        .await?;
        Ok(())
    }

    async fn enter_frame(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.command(
            reqwest::Method::POST,
            "/frame",
            Some(json!({ "id": { ELEMENT_KEY: element.0 } })),
        )
        .await?;
        Ok(())
    }

    async fn leave_frame(&self) -> Result<(), BrowserError> {
        self.command(reqwest::Method::POST, "/frame/parent", None)
            .await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        let value = self.get("/screenshot").await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| BrowserError::Protocol("screenshot is not a string".to_string()))?;
        general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| BrowserError::Protocol(format!("invalid screenshot payload: {}", e)))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let response = self
            .client
            .delete(&self.base)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        if !response.status().is_success() {
            return Err(BrowserError::Protocol(format!(
                "session delete returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
