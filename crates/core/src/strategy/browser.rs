//! Purchase path driven through a headless browser, for vendors without a
//! transactional API.

use async_trait::async_trait;
use regex_lite::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::browser::{BrowserEngine, BrowserSession, ElementQuery};
use crate::config::BrowserConfig;
use crate::fraud::{FraudGate, TargetDecision};
use crate::instrument::{Instrument, InstrumentDetails, InstrumentIssuer};
use crate::store::{AcquisitionRequest, Event};

use super::{PurchaseOutcome, PurchaseStrategy};

/// Buys through the vendor's checkout pages: navigate, set quantity, fill the
/// payment form, submit, and read back a confirmation reference.
pub struct BrowserStrategy {
    engine: Arc<dyn BrowserEngine>,
    issuer: Arc<dyn InstrumentIssuer>,
    gate: Arc<FraudGate>,
    config: BrowserConfig,
}

impl BrowserStrategy {
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        issuer: Arc<dyn InstrumentIssuer>,
        gate: Arc<FraudGate>,
        config: BrowserConfig,
    ) -> Self {
        Self {
            engine,
            issuer,
            gate,
            config,
        }
    }

    /// First displayed monetary amount on the page, in cents.
    ///
    /// Grouped thousands ("$1,234.00") parse as one amount; a lone comma
    /// followed by two digits ("£9,50") is a decimal separator.
    fn parse_price_cents(text: &str) -> Option<i64> {
        let pattern = Regex::new(r"[$€£]\s*(\d{1,3}(?:,\d{3})+|\d+)(?:[.,](\d{2}))?").ok()?;
        let captures = pattern.captures(text)?;
        let whole: i64 = captures.get(1)?.as_str().replace(',', "").parse().ok()?;
        let cents: i64 = captures
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        Some(whole * 100 + cents)
    }

    /// Confirmation reference from the visible page text.
    fn parse_confirmation(text: &str) -> Option<String> {
        let pattern =
            Regex::new(r"(?i)(?:order|confirmation|booking)\s*(?:#|number|ref(?:erence)?)?[:#]?\s*([A-Z0-9][A-Z0-9-]{3,})")
                .ok()?;
        pattern
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Confirmation reference from the post-checkout URL query string.
    fn confirmation_from_url(url: &str) -> Option<String> {
        let parsed = reqwest::Url::parse(url).ok()?;
        for (key, value) in parsed.query_pairs() {
            if matches!(key.as_ref(), "order" | "confirmation" | "ref" | "reference")
                && !value.is_empty()
            {
                return Some(value.to_string());
            }
        }
        None
    }

    async fn capture(&self, session: &dyn BrowserSession, request_id: &str, label: &str) {
        let Some(dir) = &self.config.screenshot_dir else {
            return;
        };
        let result = async {
            let bytes = session.screenshot().await?;
            tokio::fs::create_dir_all(dir).await?;
            let path = dir.join(format!("{}-{}.png", request_id, label));
            tokio::fs::write(&path, bytes).await?;
            Ok::<_, crate::browser::BrowserError>(())
        }
        .await;
        if let Err(e) = result {
            warn!(request_id, label, error = %e, "screenshot capture failed");
        }
    }

    async fn fill_payment_form(
        &self,
        session: &dyn BrowserSession,
        details: &InstrumentDetails,
    ) -> Result<(), PurchaseOutcome> {
        let number_queries = [
            ElementQuery::Css("input[name='card_number']".to_string()),
            ElementQuery::Css("input[autocomplete='cc-number']".to_string()),
            ElementQuery::AccessibleLabel("Card number".to_string()),
        ];

        // Payment forms commonly live inside a processor iframe; try the
        // top document first, then the first plausible frame.
        let mut in_frame = false;
        let mut number = session
            .find(&number_queries)
            .await
            .map_err(|e| PurchaseOutcome::manual_handoff(format!("payment form lookup: {}", e)))?;
        if number.is_none() {
            let frame = session
                .find(&[
                    ElementQuery::Css("iframe[name*='card']".to_string()),
                    ElementQuery::Css("iframe[src*='pay']".to_string()),
                    ElementQuery::Css("iframe[title*='payment']".to_string()),
                ])
                .await
                .map_err(|e| {
                    PurchaseOutcome::manual_handoff(format!("payment frame lookup: {}", e))
                })?;
            if let Some(frame) = frame {
                session.enter_frame(&frame).await.map_err(|e| {
                    PurchaseOutcome::manual_handoff(format!("cannot enter payment frame: {}", e))
                })?;
                in_frame = true;
                number = session.find(&number_queries).await.map_err(|e| {
                    PurchaseOutcome::manual_handoff(format!("payment form lookup: {}", e))
                })?;
            }
        }

        let Some(number) = number else {
            return Err(PurchaseOutcome::manual_handoff("payment form not found"));
        };

        let expiry = session
            .find(&[
                ElementQuery::Css("input[name='expiry']".to_string()),
                ElementQuery::Css("input[autocomplete='cc-exp']".to_string()),
                ElementQuery::AccessibleLabel("Expiration date".to_string()),
            ])
            .await
            .unwrap_or(None);
        let cvc = session
            .find(&[
                ElementQuery::Css("input[name='cvc']".to_string()),
                ElementQuery::Css("input[autocomplete='cc-csc']".to_string()),
                ElementQuery::AccessibleLabel("Security code".to_string()),
            ])
            .await
            .unwrap_or(None);

        let (Some(expiry), Some(cvc)) = (expiry, cvc) else {
            return Err(PurchaseOutcome::manual_handoff("payment form incomplete"));
        };

        let fill = async {
            session.fill(&number, &details.number).await?;
            session
                .fill(
                    &expiry,
                    &format!(
                        "{:02}/{:02}",
                        details.expiry_month,
                        details.expiry_year % 100
                    ),
                )
                .await?;
            session.fill(&cvc, &details.cvc).await?;
            Ok::<_, crate::browser::BrowserError>(())
        }
        .await;
        if let Err(e) = fill {
            return Err(PurchaseOutcome::manual_handoff(format!(
                "payment form fill failed: {}",
                e
            )));
        }

        if in_frame {
            if let Err(e) = session.leave_frame().await {
                return Err(PurchaseOutcome::manual_handoff(format!(
                    "cannot leave payment frame: {}",
                    e
                )));
            }
        }
        Ok(())
    }

    async fn run(
        &self,
        session: &dyn BrowserSession,
        request: &AcquisitionRequest,
        event: &Event,
        instrument: &Instrument,
        url: &str,
    ) -> PurchaseOutcome {
        if let Err(e) = session.navigate(url).await {
            return PurchaseOutcome::manual_handoff(format!("navigation failed: {}", e));
        }

        // Redirects can land somewhere other than the configured target;
        // the landed host goes through the gate again.
        let landed_url = match session.current_url().await {
            Ok(landed) => landed,
            Err(e) => return PurchaseOutcome::manual_handoff(format!("cannot read url: {}", e)),
        };
        match self
            .gate
            .validate_target(&landed_url, None, event.face_value_cents)
        {
            TargetDecision::Accept { .. } => {}
            TargetDecision::Reject(reason) => {
                return PurchaseOutcome::hard_failure(format!("after redirect: {}", reason));
            }
        }

        let page_text = session.page_text().await.unwrap_or_default();
        match Self::parse_price_cents(&page_text) {
            Some(price_cents) => {
                match self
                    .gate
                    .validate_target(&landed_url, Some(price_cents), event.face_value_cents)
                {
                    TargetDecision::Accept { .. } => {
                        debug!(request_id = %request.id, price_cents, "displayed price in tolerance")
                    }
                    TargetDecision::Reject(reason) => {
                        return PurchaseOutcome::hard_failure(reason.to_string());
                    }
                }
            }
            None => {
                warn!(request_id = %request.id, "no price visible, relying on instrument spend cap");
            }
        }

        self.capture(session, &request.id, "before").await;

        let quantity = session
            .find(&[
                ElementQuery::Css("input[name='quantity']".to_string()),
                ElementQuery::AccessibleLabel("Quantity".to_string()),
                ElementQuery::Css("input[type='number']".to_string()),
            ])
            .await
            .unwrap_or(None);
        match quantity {
            Some(quantity) => {
                if let Err(e) = session.fill(&quantity, &request.units.to_string()).await {
                    return PurchaseOutcome::manual_handoff(format!(
                        "cannot set quantity: {}",
                        e
                    ));
                }
            }
            // Pages without a quantity control sell one per checkout.
            None if request.units == 1 => {}
            None => {
                return PurchaseOutcome::manual_handoff("quantity control not found");
            }
        }

        let checkout = session
            .find(&[
                ElementQuery::VisibleText("Buy".to_string()),
                ElementQuery::VisibleText("Checkout".to_string()),
                ElementQuery::VisibleText("Get Tickets".to_string()),
                ElementQuery::Css("button[type='submit']".to_string()),
            ])
            .await
            .unwrap_or(None);
        let Some(checkout) = checkout else {
            return PurchaseOutcome::manual_handoff("checkout control not found");
        };
        if let Err(e) = session.click(&checkout).await {
            return PurchaseOutcome::manual_handoff(format!("checkout click failed: {}", e));
        }

        // Credentials are fetched only once a payment form is in reach.
        let details = match self.issuer.retrieve_details(&instrument.id).await {
            Ok(details) => details,
            Err(e) => {
                return PurchaseOutcome::manual_handoff(format!(
                    "instrument details unavailable: {}",
                    e
                ))
            }
        };

        if let Err(outcome) = self.fill_payment_form(session, &details).await {
            return outcome;
        }

        let pay = session
            .find(&[
                ElementQuery::VisibleText("Pay".to_string()),
                ElementQuery::VisibleText("Place order".to_string()),
                ElementQuery::VisibleText("Complete purchase".to_string()),
                ElementQuery::Css("button[type='submit']".to_string()),
            ])
            .await
            .unwrap_or(None);
        let Some(pay) = pay else {
            return PurchaseOutcome::manual_handoff("payment submit control not found");
        };
        if let Err(e) = session.click(&pay).await {
            return PurchaseOutcome::manual_handoff(format!("payment click failed: {}", e));
        }

        self.capture(session, &request.id, "after").await;

        // Page text first, then the tab title, then the landing URL.
        let confirmation_text = session.page_text().await.unwrap_or_default();
        let mut reference = Self::parse_confirmation(&confirmation_text);
        if reference.is_none() {
            if let Ok(title) = session.title().await {
                reference = Self::parse_confirmation(&title);
            }
        }
        if reference.is_none() {
            if let Ok(final_url) = session.current_url().await {
                reference = Self::confirmation_from_url(&final_url);
            }
        }

        match reference {
            Some(reference) => {
                info!(request_id = %request.id, "browser purchase settled");
                PurchaseOutcome::purchased(reference)
            }
            None => PurchaseOutcome::manual_handoff("no confirmation reference visible"),
        }
    }
}

#[async_trait]
impl PurchaseStrategy for BrowserStrategy {
    fn name(&self) -> &str {
        "browser"
    }

    fn applies_to(&self, target_url: &str) -> bool {
        reqwest::Url::parse(target_url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    async fn attempt(
        &self,
        request: &AcquisitionRequest,
        event: &Event,
        instrument: &Instrument,
    ) -> PurchaseOutcome {
        let url = match &request.target_url {
            Some(url) => url.clone(),
            None => return PurchaseOutcome::hard_failure("no target url on request"),
        };

        let session = match self.engine.open().await {
            Ok(session) => session,
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "browser session failed to open");
                return PurchaseOutcome::manual_handoff(format!("browser unavailable: {}", e));
            }
        };

        let outcome = self
            .run(session.as_ref(), request, event, instrument, &url)
            .await;

        // The session must not leak whatever the outcome was.
        if let Err(e) = session.close().await {
            warn!(request_id = %request.id, error = %e, "browser session close failed");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FraudConfig;
    use crate::testing::{fixtures, MockBrowserEngine, MockInstrumentIssuer};

    fn gate() -> Arc<FraudGate> {
        Arc::new(FraudGate::new(&FraudConfig {
            blocklist: vec!["resellerbay.example".to_string()],
            allowlist: vec![],
            max_overage_fraction: 0.15,
        }))
    }

    fn strategy(engine: Arc<MockBrowserEngine>, config: BrowserConfig) -> BrowserStrategy {
        BrowserStrategy::new(engine, Arc::new(MockInstrumentIssuer::new()), gate(), config)
    }

    fn css(selector: &str) -> ElementQuery {
        ElementQuery::Css(selector.to_string())
    }

    fn text(t: &str) -> ElementQuery {
        ElementQuery::VisibleText(t.to_string())
    }

    /// Wire up a page that can be purchased end to end.
    async fn purchasable_engine() -> Arc<MockBrowserEngine> {
        let engine = Arc::new(MockBrowserEngine::new());
        engine.push_page_text("General admission $50.00 per ticket").await;
        engine.push_page_text("Thanks! Order #AB12-34").await;
        engine.add_element(css("input[name='quantity']"), "qty").await;
        engine.add_element(text("Buy"), "buy").await;
        engine.add_element(css("input[name='card_number']"), "num").await;
        engine.add_element(css("input[name='expiry']"), "exp").await;
        engine.add_element(css("input[name='cvc']"), "cvc").await;
        engine.add_element(text("Pay"), "pay").await;
        engine
    }

    #[test]
    fn test_parse_price_cents() {
        assert_eq!(BrowserStrategy::parse_price_cents("from $50.00"), Some(5_000));
        assert_eq!(BrowserStrategy::parse_price_cents("€ 12"), Some(1_200));
        assert_eq!(BrowserStrategy::parse_price_cents("£9,50 each"), Some(950));
        assert_eq!(BrowserStrategy::parse_price_cents("sold out"), None);
    }

    #[test]
    fn test_parse_price_cents_grouped_thousands() {
        assert_eq!(
            BrowserStrategy::parse_price_cents("VIP ticket $1,234.00"),
            Some(123_400)
        );
        assert_eq!(
            BrowserStrategy::parse_price_cents("$1,150 per seat"),
            Some(115_000)
        );
        assert_eq!(
            BrowserStrategy::parse_price_cents("resale from $12,345,678"),
            Some(1_234_567_800)
        );
    }

    #[test]
    fn test_parse_confirmation() {
        assert_eq!(
            BrowserStrategy::parse_confirmation("Your order #AB12-34 is confirmed").as_deref(),
            Some("AB12-34")
        );
        assert_eq!(
            BrowserStrategy::parse_confirmation("Confirmation number: Z99X1").as_deref(),
            Some("Z99X1")
        );
        assert!(BrowserStrategy::parse_confirmation("thanks for visiting").is_none());
    }

    #[test]
    fn test_confirmation_from_url() {
        assert_eq!(
            BrowserStrategy::confirmation_from_url("https://v.example/done?order=XYZ9").as_deref(),
            Some("XYZ9")
        );
        assert!(BrowserStrategy::confirmation_from_url("https://v.example/done").is_none());
    }

    #[test]
    fn test_applies_to_web_urls_only() {
        let strategy = strategy(Arc::new(MockBrowserEngine::new()), BrowserConfig::default());
        assert!(strategy.applies_to("https://smallvenue.example.org/box"));
        assert!(!strategy.applies_to("ftp://smallvenue.example.org/box"));
        assert!(!strategy.applies_to("not a url"));
    }

    #[tokio::test]
    async fn test_successful_checkout() {
        let engine = purchasable_engine().await;
        let strategy = strategy(engine.clone(), BrowserConfig::default());

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 2, 10_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(outcome.success, "outcome: {:?}", outcome);
        assert_eq!(outcome.confirmation_reference.as_deref(), Some("AB12-34"));

        let fills = engine.fills().await;
        assert!(fills.contains(&("qty".to_string(), "2".to_string())));
        assert!(fills.iter().any(|(id, v)| id == "num" && v.len() >= 12));
        let clicks = engine.clicks().await;
        assert_eq!(clicks, vec!["buy".to_string(), "pay".to_string()]);
        assert!(engine.was_closed().await);
    }

    #[tokio::test]
    async fn test_redirect_to_blocklisted_host_is_hard_failure() {
        let engine = purchasable_engine().await;
        engine
            .set_landed_url("https://resellerbay.example/offer/123")
            .await;
        let strategy = strategy(engine.clone(), BrowserConfig::default());

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 2, 10_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(outcome.is_terminal());
        assert!(!outcome.success);
        assert!(!outcome.requires_manual_handoff);
        // Nothing was typed anywhere before the gate cut things short.
        assert!(engine.fills().await.is_empty());
        assert!(engine.was_closed().await);
    }

    #[tokio::test]
    async fn test_displayed_price_above_ceiling_is_hard_failure() {
        let engine = purchasable_engine().await;
        engine.clear_page_texts().await;
        // Face $50, ceiling $57.50.
        engine.push_page_text("General admission $60.00").await;
        let strategy = strategy(engine.clone(), BrowserConfig::default());

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 2, 10_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(outcome.is_terminal());
        assert!(!outcome.requires_manual_handoff);
        assert!(engine.clicks().await.is_empty());
    }

    #[tokio::test]
    async fn test_grouped_price_above_ceiling_is_hard_failure() {
        let engine = purchasable_engine().await;
        engine.clear_page_texts().await;
        // Scalper pricing with a thousands separator still trips the gate.
        engine.push_page_text("VIP package $1,150.00").await;
        let strategy = strategy(engine.clone(), BrowserConfig::default());

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 2, 10_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(outcome.is_terminal());
        assert!(!outcome.success);
        assert!(engine.fills().await.is_empty());
        assert!(engine.clicks().await.is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_falls_back_to_page_title() {
        let engine = purchasable_engine().await;
        engine.clear_page_texts().await;
        engine
            .push_page_text("General admission $50.00 per ticket")
            .await;
        engine.push_page_text("Thanks for your purchase").await;
        engine.set_title("Order #T1T5-99 confirmed").await;
        let strategy = strategy(engine, BrowserConfig::default());

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 2, 10_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(outcome.success, "outcome: {:?}", outcome);
        assert_eq!(outcome.confirmation_reference.as_deref(), Some("T1T5-99"));
    }

    #[tokio::test]
    async fn test_browser_unavailable_hands_off() {
        let engine = Arc::new(MockBrowserEngine::new());
        engine.set_fail_open(true).await;
        let strategy = strategy(engine.clone(), BrowserConfig::default());

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 2, 10_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(outcome.requires_manual_handoff);
        assert!(engine.navigations().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_payment_form_hands_off() {
        let engine = Arc::new(MockBrowserEngine::new());
        engine.push_page_text("General admission $50.00").await;
        engine.add_element(css("input[name='quantity']"), "qty").await;
        engine.add_element(text("Buy"), "buy").await;
        let strategy = strategy(engine.clone(), BrowserConfig::default());

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 2, 10_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(outcome.requires_manual_handoff);
        assert!(engine.was_closed().await);
    }

    #[tokio::test]
    async fn test_no_quantity_control_single_unit_proceeds() {
        let engine = purchasable_engine().await;
        engine.remove_element(&css("input[name='quantity']")).await;
        let strategy = strategy(engine.clone(), BrowserConfig::default());

        let single = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 1, 5_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;
        assert!(single.success);

        let multi = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 3, 15_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;
        assert!(multi.requires_manual_handoff);
    }

    #[tokio::test]
    async fn test_screenshots_written_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let engine = purchasable_engine().await;
        let config = BrowserConfig {
            screenshot_dir: Some(dir.path().to_path_buf()),
            ..BrowserConfig::default()
        };
        let strategy = strategy(engine, config);

        let request = fixtures::acquisition_request("ev-1", 2, 10_000);
        let outcome = strategy
            .attempt(&request, &fixtures::event("ev-1", 5_000), &fixtures::instrument())
            .await;
        assert!(outcome.success);

        assert!(dir.path().join(format!("{}-before.png", request.id)).exists());
        assert!(dir.path().join(format!("{}-after.png", request.id)).exists());
    }
}
