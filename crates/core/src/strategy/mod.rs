mod browser;
mod manual;
mod structured_api;
mod types;

pub use browser::BrowserStrategy;
pub use manual::ManualEscalationStrategy;
pub use structured_api::StructuredApiStrategy;
pub use types::{PurchaseOutcome, PurchaseStrategy};
