//! Anti-fraud gate: every purchase target passes through here before any
//! funds move.

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::FraudConfig;

/// Highest price the pool tolerates for `amount_cents`, rounded up.
pub fn ceiling_cents(amount_cents: i64, overage_fraction: f64) -> i64 {
    (amount_cents as f64 * (1.0 + overage_fraction)).ceil() as i64
}

/// Why a purchase target was rejected.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RejectReason {
    #[error("domain {domain} is blocklisted as a reseller")]
    BlocklistedDomain { domain: String },

    #[error("price {observed_cents} exceeds ceiling {ceiling_cents}")]
    PriceCeilingExceeded {
        observed_cents: i64,
        ceiling_cents: i64,
    },

    #[error("malformed target url: {url}")]
    MalformedUrl { url: String },
}

impl RejectReason {
    /// Short rule label for metrics.
    pub fn rule(&self) -> &'static str {
        match self {
            RejectReason::BlocklistedDomain { .. } => "blocklist",
            RejectReason::PriceCeilingExceeded { .. } => "price_ceiling",
            RejectReason::MalformedUrl { .. } => "malformed_url",
        }
    }
}

/// Outcome of validating a purchase target.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetDecision {
    /// Target passed every rule. `allowlisted` is an audit flag only;
    /// non-allowlisted primary vendors are still accepted.
    Accept { allowlisted: bool },
    /// Target failed a rule and must not be purchased from.
    Reject(RejectReason),
}

impl TargetDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TargetDecision::Accept { .. })
    }
}

/// Stateless policy check over a configured blocklist/allowlist and a
/// price ceiling.
pub struct FraudGate {
    blocklist: Vec<String>,
    allowlist: Vec<String>,
    max_overage_fraction: f64,
}

impl FraudGate {
    pub fn new(config: &FraudConfig) -> Self {
        Self {
            blocklist: config.blocklist.iter().map(|d| d.to_lowercase()).collect(),
            allowlist: config.allowlist.iter().map(|d| d.to_lowercase()).collect(),
            max_overage_fraction: config.max_overage_fraction,
        }
    }

    /// The overage fraction the gate applies (shared with spend-cap sizing).
    pub fn max_overage_fraction(&self) -> f64 {
        self.max_overage_fraction
    }

    /// Validate a purchase target against the blocklist, allowlist and
    /// per-unit price ceiling.
    ///
    /// `observed_price_cents` is the per-unit price as seen by the caller
    /// (vendor API class price, or the price displayed on the page). Pass
    /// `None` when no price has been observed yet; the price rule is then
    /// skipped and must be re-checked once a price is known.
    ///
    /// The blocklist always dominates: an allowlisted domain that is also
    /// blocklisted is rejected.
    pub fn validate_target(
        &self,
        target_url: &str,
        observed_price_cents: Option<i64>,
        face_value_cents: i64,
    ) -> TargetDecision {
        let host = match reqwest::Url::parse(target_url) {
            Ok(url) => match url.host_str() {
                Some(host) => host.to_lowercase(),
                None => {
                    return TargetDecision::Reject(RejectReason::MalformedUrl {
                        url: target_url.to_string(),
                    })
                }
            },
            Err(_) => {
                return TargetDecision::Reject(RejectReason::MalformedUrl {
                    url: target_url.to_string(),
                })
            }
        };

        if let Some(domain) = self.matching_domain(&self.blocklist, &host) {
            warn!(%host, %domain, "purchase target rejected, blocklisted domain");
            return TargetDecision::Reject(RejectReason::BlocklistedDomain { domain });
        }

        if let Some(observed_cents) = observed_price_cents {
            let ceiling = ceiling_cents(face_value_cents, self.max_overage_fraction);
            if observed_cents > ceiling {
                warn!(
                    observed_cents,
                    ceiling, "purchase target rejected, price above ceiling"
                );
                return TargetDecision::Reject(RejectReason::PriceCeilingExceeded {
                    observed_cents,
                    ceiling_cents: ceiling,
                });
            }
        }

        let allowlisted = self.matching_domain(&self.allowlist, &host).is_some();
        if !allowlisted {
            debug!(%host, "purchase target accepted but not allowlisted");
        }
        TargetDecision::Accept { allowlisted }
    }

    /// Match `host` against an entry exactly or as a subdomain of it.
    fn matching_domain(&self, entries: &[String], host: &str) -> Option<String> {
        entries
            .iter()
            .find(|entry| host == entry.as_str() || host.ends_with(&format!(".{}", entry)))
            .cloned()
    }
}
