//! Mock structured vendor API.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::instrument::InstrumentDetails;
use crate::vendor::{InventoryClass, PaymentConfirmation, VendorApi, VendorError, VendorOrder};

/// One recorded `create_order` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedOrder {
    pub event_url: String,
    pub class_id: String,
    pub units: i64,
}

/// Mock vendor with scriptable inventory and recorded orders/payments.
pub struct MockVendorApi {
    classes: RwLock<Vec<InventoryClass>>,
    orders: RwLock<Vec<RecordedOrder>>,
    payments: RwLock<Vec<String>>,
    payment_reference: RwLock<String>,
    order_total_override: RwLock<Option<i64>>,
    fail_listing: RwLock<bool>,
    fail_payment: RwLock<bool>,
}

impl MockVendorApi {
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(Vec::new()),
            orders: RwLock::new(Vec::new()),
            payments: RwLock::new(Vec::new()),
            payment_reference: RwLock::new("VENDOR-REF-1".to_string()),
            order_total_override: RwLock::new(None),
            fail_listing: RwLock::new(false),
            fail_payment: RwLock::new(false),
        }
    }

    pub async fn set_classes(&self, classes: Vec<InventoryClass>) {
        *self.classes.write().await = classes;
    }

    pub async fn set_payment_reference(&self, reference: impl Into<String>) {
        *self.payment_reference.write().await = reference.into();
    }

    /// Force the order total instead of price × units.
    pub async fn set_order_total(&self, total_cents: i64) {
        *self.order_total_override.write().await = Some(total_cents);
    }

    pub async fn set_fail_listing(&self, fail: bool) {
        *self.fail_listing.write().await = fail;
    }

    pub async fn set_fail_payment(&self, fail: bool) {
        *self.fail_payment.write().await = fail;
    }

    /// All recorded orders.
    pub async fn orders(&self) -> Vec<RecordedOrder> {
        self.orders.read().await.clone()
    }

    /// Order ids that were paid for.
    pub async fn payments(&self) -> Vec<String> {
        self.payments.read().await.clone()
    }
}

impl Default for MockVendorApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VendorApi for MockVendorApi {
    fn name(&self) -> &str {
        "mock-vendor"
    }

    async fn list_inventory_classes(
        &self,
        _event_url: &str,
    ) -> Result<Vec<InventoryClass>, VendorError> {
        if *self.fail_listing.read().await {
            return Err(VendorError::ConnectionFailed("vendor down".to_string()));
        }
        Ok(self.classes.read().await.clone())
    }

    async fn create_order(
        &self,
        event_url: &str,
        class_id: &str,
        units: i64,
    ) -> Result<VendorOrder, VendorError> {
        let price = self
            .classes
            .read()
            .await
            .iter()
            .find(|c| c.id == class_id)
            .map(|c| c.price_cents)
            .unwrap_or(0);

        let mut orders = self.orders.write().await;
        orders.push(RecordedOrder {
            event_url: event_url.to_string(),
            class_id: class_id.to_string(),
            units,
        });

        let total_cents = self
            .order_total_override
            .read()
            .await
            .unwrap_or(price * units);

        Ok(VendorOrder {
            id: format!("order-{}", orders.len()),
            total_cents,
        })
    }

    async fn submit_payment(
        &self,
        _event_url: &str,
        order_id: &str,
        _details: &InstrumentDetails,
    ) -> Result<PaymentConfirmation, VendorError> {
        if *self.fail_payment.read().await {
            return Err(VendorError::Api {
                status: 402,
                message: "payment declined".to_string(),
            });
        }

        self.payments.write().await.push(order_id.to_string());
        Ok(PaymentConfirmation {
            reference: self.payment_reference.read().await.clone(),
        })
    }
}
