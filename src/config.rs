use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub withdrawal: WithdrawalConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Text file plus ANSI stdout
    #[default]
    Text,
    /// JSON records, file only
    Json,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub dir: String,
    pub file: String,
    pub format: LogFormat,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "./logs".to_string(),
            file: "custody_ledger.log".to_string(),
            format: LogFormat::Text,
            rotation: LogRotation::Daily,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// sqlx SQLite URL, e.g. `sqlite://data/ledger.db`
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/ledger.db".to_string(),
            max_connections: 1,
            busy_timeout_ms: 5000,
        }
    }
}

/// Which amount an external-address transfer consumes from the daily cap
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpendBasis {
    /// amount + fee
    #[default]
    Gross,
    /// amount only
    Net,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Cap assigned to a wallet the first time its limit row is touched
    pub default_daily_limit: Decimal,
    /// Flat platform fee, in percent of the transfer amount
    pub platform_fee_percent: Decimal,
    /// Token tag written on every transaction row
    pub currency: String,
    /// Network name passed to explorer links
    pub network: String,
    /// Offset of the reference calendar used for daily resets
    pub reference_utc_offset_minutes: i32,
    #[serde(default)]
    pub external_spend_basis: SpendBasis,
    /// Attempts for the local confirm unit of work after a settlement succeeded
    pub commit_attempts: u32,
    pub commit_retry_delay_ms: u64,
    pub history_limit: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_daily_limit: Decimal::from(1000),
            platform_fee_percent: Decimal::ZERO,
            currency: "USDC".to_string(),
            network: "devnet".to_string(),
            reference_utc_offset_minutes: 0,
            external_spend_basis: SpendBasis::Gross,
            commit_attempts: 3,
            commit_retry_delay_ms: 100,
            history_limit: 20,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WithdrawalConfig {
    pub min_amount: Decimal,
    pub fee_percent: Decimal,
    /// Fiat units paid per ledger-currency unit, keyed by upper-case currency tag
    pub fiat_rates: HashMap<String, Decimal>,
}

impl Default for WithdrawalConfig {
    fn default() -> Self {
        let mut fiat_rates = HashMap::new();
        fiat_rates.insert("USD".to_string(), Decimal::ONE);
        Self {
            min_amount: Decimal::from(10),
            fee_percent: Decimal::ONE,
            fiat_rates,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReconciliationConfig {
    pub enabled: bool,
    pub scan_interval_secs: u64,
    pub stale_threshold_secs: u64,
    pub batch_size: u32,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_secs: 30,
            stale_threshold_secs: 300,
            batch_size: 100,
        }
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml`
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        Self::load_from_path(format!("config/{}.yaml", env))
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("ledger.default_daily_limit", self.ledger.default_daily_limit)?;
        percent("ledger.platform_fee_percent", self.ledger.platform_fee_percent)?;
        non_negative("withdrawal.min_amount", self.withdrawal.min_amount)?;
        percent("withdrawal.fee_percent", self.withdrawal.fee_percent)?;

        if self.ledger.commit_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "ledger.commit_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.ledger.reference_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::Invalid {
                field: "ledger.reference_utc_offset_minutes",
                reason: "must be within one day".to_string(),
            });
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "database.max_connections",
                reason: "must be at least 1".to_string(),
            });
        }
        for (currency, rate) in &self.withdrawal.fiat_rates {
            if *rate <= Decimal::ZERO {
                return Err(ConfigError::Invalid {
                    field: "withdrawal.fiat_rates",
                    reason: format!("rate for {} must be positive", currency),
                });
            }
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            database: DatabaseConfig::default(),
            ledger: LedgerConfig::default(),
            withdrawal: WithdrawalConfig::default(),
            reconciliation: ReconciliationConfig::default(),
        }
    }
}

fn non_negative(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value < Decimal::ZERO {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{} is negative", value),
        });
    }
    Ok(())
}

fn percent(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    non_negative(field, value)?;
    if value > Decimal::ONE_HUNDRED {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{} exceeds 100%", value),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
logging:
  level: debug
  dir: ./logs
  file: ledger.log
  format: json
  rotation: never
database:
  url: "sqlite::memory:"
  max_connections: 1
  busy_timeout_ms: 1000
ledger:
  default_daily_limit: 500
  platform_fee_percent: "1.5"
  currency: USDC
  network: devnet
  reference_utc_offset_minutes: 480
  external_spend_basis: net
  commit_attempts: 2
  commit_retry_delay_ms: 10
  history_limit: 10
withdrawal:
  min_amount: 25
  fee_percent: 2
  fiat_rates:
    USD: 1
    EUR: "0.92"
"#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.ledger.default_daily_limit, Decimal::from(500));
        assert_eq!(config.ledger.platform_fee_percent, Decimal::new(15, 1));
        assert_eq!(config.ledger.external_spend_basis, SpendBasis::Net);
        assert_eq!(config.withdrawal.fiat_rates["EUR"], Decimal::new(92, 2));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.rotation, LogRotation::Never);
        // omitted section falls back to defaults
        assert!(config.reconciliation.enabled);
        assert_eq!(config.reconciliation.batch_size, 100);
    }

    #[test]
    fn test_default_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_negative_cap() {
        let mut config = AppConfig::default();
        config.ledger.default_daily_limit = Decimal::from(-1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "ledger.default_daily_limit",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_fee_above_hundred() {
        let mut config = AppConfig::default();
        config.withdrawal.fee_percent = Decimal::from(101);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_commit_attempts() {
        let mut config = AppConfig::default();
        config.ledger.commit_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_logging_section_is_optional() {
        let yaml = r#"
ledger:
  default_daily_limit: 50
  platform_fee_percent: 0
  currency: USDC
  network: devnet
  reference_utc_offset_minutes: 0
  commit_attempts: 1
  commit_retry_delay_ms: 0
  history_limit: 5
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.logging.rotation, LogRotation::Daily);
        assert_eq!(config.ledger.default_daily_limit, Decimal::from(50));
    }

    #[test]
    fn test_rejects_unknown_rotation() {
        let yaml = "logging:\n  rotation: weekly\n";
        assert!(matches!(AppConfig::from_yaml(yaml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = AppConfig::load_from_path("does/not/exist.yaml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
