//! Ledger configuration
//!
//! Controls how customer accounts are provisioned when the import tool first
//! sees them, and which checks run on imported commands.
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables (`LEDGER_DEFAULT_CREDIT_LIMIT`, `LEDGER_DEFAULT_PAYMENT_TERMS`)
//! 2. Config file passed with `--config`
//! 3. Default values
//!
//! # Example Config File
//!
//! ```toml
//! default_credit_limit = "5000.00"
//! default_payment_terms = "net30"
//! enforce_credit_limit = true
//! warning_window_days = 30
//!
//! [credit_policy]
//! auto_suspend_days = 90
//! grace_period_days = 5
//! warning_thresholds = [30, 60]
//!
//! [[customers]]
//! id = 7
//! credit_limit = "25000.00"
//! payment_terms = "net60"
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::core::credit_policy::DEFAULT_WARNING_WINDOW_DAYS;
use crate::types::{CreditPolicy, CustomerAccount, CustomerId, LedgerError, PaymentTerms};

/// Environment variable overriding [`LedgerConfig::default_credit_limit`]
pub const ENV_DEFAULT_CREDIT_LIMIT: &str = "LEDGER_DEFAULT_CREDIT_LIMIT";

/// Environment variable overriding [`LedgerConfig::default_payment_terms`]
pub const ENV_DEFAULT_PAYMENT_TERMS: &str = "LEDGER_DEFAULT_PAYMENT_TERMS";

/// Per-customer settings that replace the defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerOverride {
    pub id: CustomerId,
    #[serde(default)]
    pub credit_limit: Option<Decimal>,
    #[serde(default)]
    pub payment_terms: Option<PaymentTerms>,
    #[serde(default)]
    pub credit_policy: Option<CreditPolicy>,
}

/// Ledger-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Credit limit given to customers without an override
    #[serde(default = "default_credit_limit")]
    pub default_credit_limit: Decimal,

    /// Payment terms given to customers without an override
    #[serde(default)]
    pub default_payment_terms: PaymentTerms,

    /// Suspension policy given to customers without an override
    #[serde(default)]
    pub credit_policy: CreditPolicy,

    /// Reject imported invoices that do not fit the customer's credit
    #[serde(default = "default_enforce_credit_limit")]
    pub enforce_credit_limit: bool,

    /// Days before suspension at which overdue customers are warned
    #[serde(default = "default_warning_window_days")]
    pub warning_window_days: u32,

    /// Per-customer overrides
    #[serde(default)]
    pub customers: Vec<CustomerOverride>,
}

fn default_credit_limit() -> Decimal {
    Decimal::new(1000, 0)
}

fn default_enforce_credit_limit() -> bool {
    true
}

fn default_warning_window_days() -> u32 {
    DEFAULT_WARNING_WINDOW_DAYS
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_credit_limit: default_credit_limit(),
            default_payment_terms: PaymentTerms::default(),
            credit_policy: CreditPolicy::default(),
            enforce_credit_limit: default_enforce_credit_limit(),
            warning_window_days: default_warning_window_days(),
            customers: Vec::new(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file
    /// 3. Environment variables
    ///
    /// # Errors
    ///
    /// - `Io` if the file cannot be read
    /// - `Config` if the file is not valid TOML or the result fails validation
    pub fn load(path: Option<&Path>) -> Result<Self, LedgerError> {
        let mut config = match path {
            Some(path) => {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(path)?;
                toml::from_str(&contents)?
            }
            None => {
                debug!("No config file given, using defaults");
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no account could be created with
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.default_credit_limit < Decimal::ZERO {
            return Err(LedgerError::config(
                "default_credit_limit must not be negative",
            ));
        }
        validate_policy("credit_policy", &self.credit_policy)?;

        let mut seen = std::collections::HashSet::new();
        for customer in &self.customers {
            if !seen.insert(customer.id) {
                return Err(LedgerError::config(format!(
                    "customer {} is configured more than once",
                    customer.id
                )));
            }
            if customer.credit_limit.is_some_and(|limit| limit < Decimal::ZERO) {
                return Err(LedgerError::config(format!(
                    "credit_limit of customer {} must not be negative",
                    customer.id
                )));
            }
            if let Some(policy) = &customer.credit_policy {
                validate_policy(&format!("credit_policy of customer {}", customer.id), policy)?;
            }
        }
        Ok(())
    }

    /// Build the account a customer gets on first use
    pub fn account_for(&self, id: CustomerId) -> CustomerAccount {
        let custom = self.customers.iter().find(|c| c.id == id);

        CustomerAccount::new(
            id,
            custom
                .and_then(|c| c.payment_terms)
                .unwrap_or(self.default_payment_terms),
            custom
                .and_then(|c| c.credit_limit)
                .unwrap_or(self.default_credit_limit),
            custom
                .and_then(|c| c.credit_policy.clone())
                .unwrap_or_else(|| self.credit_policy.clone()),
        )
    }

    /// Apply environment-style overrides read through `lookup`
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DEFAULT_CREDIT_LIMIT) {
            match value.trim().parse::<Decimal>() {
                Ok(limit) => {
                    debug!(limit = %limit, "Overriding default credit limit from environment");
                    self.default_credit_limit = limit;
                }
                Err(_) => warn!(value = %value, "Ignoring unparsable {}", ENV_DEFAULT_CREDIT_LIMIT),
            }
        }

        if let Some(value) = lookup(ENV_DEFAULT_PAYMENT_TERMS) {
            match value.parse::<PaymentTerms>() {
                Ok(terms) => {
                    debug!(terms = %terms, "Overriding default payment terms from environment");
                    self.default_payment_terms = terms;
                }
                Err(_) => warn!(value = %value, "Ignoring unknown {}", ENV_DEFAULT_PAYMENT_TERMS),
            }
        }
    }
}

fn validate_policy(name: &str, policy: &CreditPolicy) -> Result<(), LedgerError> {
    if policy.auto_suspend_days == 0 {
        return Err(LedgerError::config(format!(
            "{}: auto_suspend_days must be greater than 0",
            name
        )));
    }
    if let Some(threshold) = policy
        .warning_thresholds
        .iter()
        .find(|&&t| t >= policy.auto_suspend_days)
    {
        return Err(LedgerError::config(format!(
            "{}: warning threshold {} is not below auto_suspend_days {}",
            name, threshold, policy.auto_suspend_days
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.default_credit_limit, Decimal::new(1000, 0));
        assert_eq!(config.default_payment_terms, PaymentTerms::Net30);
        assert!(config.enforce_credit_limit);
        assert_eq!(config.warning_window_days, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
default_credit_limit = "5000.00"
default_payment_terms = "net15"
enforce_credit_limit = false

[credit_policy]
auto_suspend_days = 60
grace_period_days = 5
warning_thresholds = [30]

[[customers]]
id = 7
credit_limit = "25000"
payment_terms = "net60"
"#,
        );

        let config = LedgerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.default_credit_limit, Decimal::new(500000, 2));
        assert_eq!(config.default_payment_terms, PaymentTerms::Net15);
        assert!(!config.enforce_credit_limit);
        assert_eq!(config.credit_policy.grace_period_days, 5);
        assert_eq!(config.warning_window_days, 30);
        assert_eq!(config.customers.len(), 1);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config("warning_window_days = 10\n");
        let config = LedgerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.warning_window_days, 10);
        assert_eq!(config.default_credit_limit, Decimal::new(1000, 0));
        assert_eq!(config.credit_policy, CreditPolicy::default());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = LedgerConfig::load(Some(Path::new("no/such/ledger.toml")));
        assert!(matches!(result, Err(LedgerError::Io { .. })));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let file = write_config("default_credit_limit = [");
        let result = LedgerConfig::load(Some(file.path()));
        assert!(matches!(result, Err(LedgerError::Config { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DEFAULT_CREDIT_LIMIT, "250.50"),
            (ENV_DEFAULT_PAYMENT_TERMS, "cash"),
        ]);
        let mut config = LedgerConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.default_credit_limit, Decimal::new(25050, 2));
        assert_eq!(config.default_payment_terms, PaymentTerms::Cash);
    }

    #[test]
    fn test_invalid_env_overrides_are_ignored() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DEFAULT_CREDIT_LIMIT, "lots"),
            (ENV_DEFAULT_PAYMENT_TERMS, "net90"),
        ]);
        let mut config = LedgerConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_settings() {
        let mut config = LedgerConfig::default();
        config.default_credit_limit = Decimal::new(-1, 0);
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.credit_policy.warning_thresholds = vec![30, 90];
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.credit_policy.auto_suspend_days = 0;
        config.credit_policy.warning_thresholds.clear();
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        let custom = CustomerOverride {
            id: 1,
            credit_limit: None,
            payment_terms: None,
            credit_policy: None,
        };
        config.customers = vec![custom.clone(), custom];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_account_for_applies_overrides() {
        let mut config = LedgerConfig::default();
        config.customers.push(CustomerOverride {
            id: 7,
            credit_limit: Some(Decimal::new(25000, 0)),
            payment_terms: None,
            credit_policy: None,
        });

        let custom = config.account_for(7);
        assert_eq!(custom.credit_limit, Decimal::new(25000, 0));
        assert_eq!(custom.payment_terms, PaymentTerms::Net30);

        let plain = config.account_for(8);
        assert_eq!(plain.credit_limit, Decimal::new(1000, 0));
        assert_eq!(plain.credit_policy, CreditPolicy::default());
    }
}
