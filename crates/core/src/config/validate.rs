use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Overage fraction is within a sane range
/// - Issuer endpoint and holder are present
/// - Vendor platforms and admin contacts are well-formed
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&config.fraud.max_overage_fraction) {
        return Err(ConfigError::ValidationError(format!(
            "fraud.max_overage_fraction must be between 0.0 and 1.0, got {}",
            config.fraud.max_overage_fraction
        )));
    }

    if config.issuer.api_base.is_empty() {
        return Err(ConfigError::ValidationError(
            "issuer.api_base cannot be empty".to_string(),
        ));
    }

    if config.issuer.holder_id.is_empty() {
        return Err(ConfigError::ValidationError(
            "issuer.holder_id cannot be empty".to_string(),
        ));
    }

    for platform in &config.vendor.platforms {
        if platform.host.is_empty() || platform.api_base.is_empty() {
            return Err(ConfigError::ValidationError(
                "vendor.platforms entries require host and api_base".to_string(),
            ));
        }
    }

    for admin in &config.notifications.admins {
        if admin.webhook_url.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "notifications.admins entry '{}' has an empty webhook_url",
                admin.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn valid_config() -> Config {
        load_config_from_str(
            r#"
[fraud]
blocklist = ["resellerbay.example"]

[issuer]
api_base = "https://api.issuer.example"
api_key = "key"
holder_id = "pool-1"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_overage_out_of_range() {
        let mut config = valid_config();
        config.fraud.max_overage_fraction = 1.5;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_empty_holder_fails() {
        let mut config = valid_config();
        config.issuer.holder_id = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_bad_admin_contact() {
        let mut config = valid_config();
        config.notifications.admins.push(crate::config::AdminContact {
            name: "ops".to_string(),
            webhook_url: String::new(),
        });
        assert!(validate_config(&config).is_err());
    }
}
