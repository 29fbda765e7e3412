use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub fraud: FraudConfig,
    pub issuer: IssuerConfig,
    #[serde(default)]
    pub vendor: VendorConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub notifications: NotifyConfig,
    #[serde(default)]
    pub orchestrator: crate::orchestrator::OrchestratorConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("encore.db")
}

/// Anti-fraud policy configuration.
///
/// The blocklist holds secondary-market/reseller domains and is checked before
/// any funds move; the allowlist holds known primary vendors and only controls
/// the audit flag (direct venue sites are legitimate but not enumerable).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FraudConfig {
    /// Reseller/secondary-market domains. Matches the host itself and any
    /// subdomain.
    #[serde(default)]
    pub blocklist: Vec<String>,
    /// Known primary vendor domains.
    #[serde(default)]
    pub allowlist: Vec<String>,
    /// Maximum tolerated overage above face value (0.15 = 15%).
    #[serde(default = "default_max_overage")]
    pub max_overage_fraction: f64,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            blocklist: Vec::new(),
            allowlist: Vec::new(),
            max_overage_fraction: default_max_overage(),
        }
    }
}

fn default_max_overage() -> f64 {
    0.15
}

/// Payment instrument issuance provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IssuerConfig {
    /// Issuer API base URL (e.g., "https://api.issuer.example").
    pub api_base: String,
    /// Issuer API key.
    pub api_key: String,
    /// Account that holds issued instruments.
    pub holder_id: String,
    /// Request timeout in seconds.
    #[serde(default = "default_issuer_timeout")]
    pub timeout_secs: u32,
}

fn default_issuer_timeout() -> u32 {
    30
}

/// Structured vendor API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct VendorConfig {
    /// Platforms with a transactional API we can call directly.
    #[serde(default)]
    pub platforms: Vec<VendorPlatform>,
    /// Request timeout in seconds.
    #[serde(default = "default_vendor_timeout")]
    pub timeout_secs: u32,
}

fn default_vendor_timeout() -> u32 {
    30
}

/// One vendor platform reachable through a structured API.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct VendorPlatform {
    /// Host the platform serves events from (e.g., "tickets.example.com").
    pub host: String,
    /// API base URL for that platform.
    pub api_base: String,
    /// API key for that platform.
    pub api_key: String,
}

/// Headless browser engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    /// WebDriver endpoint (e.g., a local chromedriver/geckodriver).
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    /// Page navigation timeout in seconds.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u32,
    /// Per-action (element lookup/interaction) timeout in seconds.
    #[serde(default = "default_action_timeout")]
    pub action_timeout_secs: u32,
    /// Directory for before/after checkout screenshots (None = disabled).
    #[serde(default)]
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            navigation_timeout_secs: default_navigation_timeout(),
            action_timeout_secs: default_action_timeout(),
            screenshot_dir: None,
        }
    }
}

fn default_webdriver_url() -> String {
    "http://127.0.0.1:4444".to_string()
}

fn default_navigation_timeout() -> u32 {
    30
}

fn default_action_timeout() -> u32 {
    10
}

/// Manual-escalation notification configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NotifyConfig {
    /// Administrators to notify on manual handoff.
    #[serde(default)]
    pub admins: Vec<AdminContact>,
    /// Delivery timeout in seconds.
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u32,
}

fn default_notify_timeout() -> u32 {
    10
}

/// One administrator notification target.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AdminContact {
    /// Display name, included in delivery logs.
    pub name: String,
    /// Webhook URL the escalation message is posted to.
    pub webhook_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraud_config_defaults() {
        let config = FraudConfig::default();
        assert!(config.blocklist.is_empty());
        assert!(config.allowlist.is_empty());
        assert!((config.max_overage_fraction - 0.15).abs() < f64::EPSILON);
    }

    #[test]
    fn test_browser_config_defaults() {
        let config = BrowserConfig::default();
        assert_eq!(config.navigation_timeout_secs, 30);
        assert_eq!(config.action_timeout_secs, 10);
        assert!(config.screenshot_dir.is_none());
    }

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[fraud]
blocklist = ["resellerbay.example"]

[issuer]
api_base = "https://api.issuer.example"
api_key = "key"
holder_id = "pool-1"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.fraud.blocklist, vec!["resellerbay.example"]);
        assert_eq!(config.issuer.timeout_secs, 30);
        assert_eq!(config.database.path, PathBuf::from("encore.db"));
        assert!(config.vendor.platforms.is_empty());
    }

    #[test]
    fn test_deserialize_vendor_platforms() {
        let toml = r#"
[fraud]

[issuer]
api_base = "https://api.issuer.example"
api_key = "key"
holder_id = "pool-1"

[[vendor.platforms]]
host = "tickets.example.com"
api_base = "https://tickets.example.com/api/v1"
api_key = "vendor-key"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.vendor.platforms.len(), 1);
        assert_eq!(config.vendor.platforms[0].host, "tickets.example.com");
    }
}
