//! # Billing Configuration
//!
//! Configuration for the settlement saga, the remote API client and the
//! local order cache.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SAFFRON_API_URL=https://api.example.com                            │
//! │     SAFFRON_BILLING_ROLES=owner,manager                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/pos/billing.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.saffron.pos/billing.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     5% tax, no service charge, Owner/Admin/Manager/Cashier             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # billing.toml
//! [billing]
//! required_roles = ["Owner", "Admin", "Manager", "Cashier"]
//! tax_rate_bps = 500
//! include_tax = true
//! service_charge_rate_bps = 0
//! include_service_charge = false
//! redirect_delay_ms = 1500
//!
//! [remote]
//! base_url = "http://localhost:8080/api"
//! timeout_secs = 15
//!
//! [cache]
//! backend = "sqlite"
//! path = "/var/lib/saffron/orders.db"
//! ```

use directories::ProjectDirs;
use saffron_core::validation::validate_rate;
use saffron_core::{BillInputs, Order, Rate, Role, BILLING_ROLES};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};

/// File name looked up in the platform config directory.
pub const CONFIG_FILE_NAME: &str = "billing.toml";

// =============================================================================
// Billing Settings
// =============================================================================

/// Who may settle and how the preview is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingSettings {
    /// Roles allowed to close a table and take payment. May only narrow
    /// [`BILLING_ROLES`].
    #[serde(default = "default_required_roles")]
    pub required_roles: Vec<Role>,

    /// Tax rate in basis points (500 = 5%).
    #[serde(default = "default_tax_rate")]
    pub tax_rate_bps: u32,

    #[serde(default = "default_true")]
    pub include_tax: bool,

    /// Service charge in basis points.
    #[serde(default)]
    pub service_charge_rate_bps: u32,

    #[serde(default)]
    pub include_service_charge: bool,

    /// How long the UI shows the success state before navigating away.
    #[serde(default = "default_redirect_delay")]
    pub redirect_delay_ms: u64,
}

fn default_required_roles() -> Vec<Role> {
    BILLING_ROLES.to_vec()
}

fn default_tax_rate() -> u32 {
    500
}

fn default_true() -> bool {
    true
}

fn default_redirect_delay() -> u64 {
    1500
}

impl Default for BillingSettings {
    fn default() -> Self {
        BillingSettings {
            required_roles: default_required_roles(),
            tax_rate_bps: default_tax_rate(),
            include_tax: true,
            service_charge_rate_bps: 0,
            include_service_charge: false,
            redirect_delay_ms: default_redirect_delay(),
        }
    }
}

impl BillingSettings {
    /// Configured roles that are also billing roles.
    pub fn billing_roles(&self) -> Vec<Role> {
        self.required_roles
            .iter()
            .filter(|r| BILLING_ROLES.contains(r))
            .cloned()
            .collect()
    }

    pub fn tax_rate(&self) -> Rate {
        Rate::from_bps(self.tax_rate_bps)
    }

    pub fn service_charge_rate(&self) -> Rate {
        Rate::from_bps(self.service_charge_rate_bps)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }

    /// Calculator inputs for the live preview of `order`.
    pub fn bill_inputs(&self, order: &Order) -> BillInputs {
        let mut inputs = BillInputs::for_order(order);
        inputs = if self.include_tax {
            inputs.tax(self.tax_rate())
        } else {
            inputs.without_tax()
        };
        if self.include_service_charge {
            inputs = inputs.service_charge(self.service_charge_rate());
        }
        inputs
    }
}

// =============================================================================
// Remote Settings
// =============================================================================

/// Back-office API connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token. Usually supplied through `SAFFRON_API_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Whole-request timeout. A timeout is the failing step's error.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Transport retries of transient failures (same idempotency key).
    /// 0 disables retrying.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}
fn default_timeout() -> u64 {
    15
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_max_retries() -> u32 {
    2
}
fn default_initial_backoff() -> u64 {
    250
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: default_base_url(),
            api_token: None,
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
        }
    }
}

impl RemoteSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

// =============================================================================
// Cache Settings
// =============================================================================

/// Where in-progress orders are cached between screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Process memory; lost on restart.
    #[default]
    Memory,
    /// SQLite file at `cache.path`.
    Sqlite,
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackend::Memory => write!(f, "memory"),
            CacheBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(CacheBackend::Memory),
            "sqlite" | "db" => Ok(CacheBackend::Sqlite),
            other => Err(ConfigError::Invalid(format!(
                "Unknown cache backend: '{}'. Valid options: memory, sqlite",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub backend: CacheBackend,

    /// SQLite file. Defaults to `orders.db` in the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl CacheSettings {
    /// The SQLite path to use, falling back to the platform data directory.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| {
            ProjectDirs::from("com", "saffron", "pos").map(|d| d.data_dir().join("orders.db"))
        })
    }
}

// =============================================================================
// Main Billing Configuration
// =============================================================================

/// Complete billing configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default)]
    pub billing: BillingSettings,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub cache: CacheSettings,
}

impl BillingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (billing.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading billing config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides_from(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Billing config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.billing.required_roles.is_empty() {
            return Err(ConfigError::Invalid(
                "required_roles must name at least one role".into(),
            ));
        }

        if let Some(role) = self
            .billing
            .required_roles
            .iter()
            .find(|r| !BILLING_ROLES.contains(r))
        {
            return Err(ConfigError::Invalid(format!(
                "required_roles may only name billing roles, got '{}'",
                role
            )));
        }

        validate_rate("tax_rate_bps", self.billing.tax_rate())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        validate_rate("service_charge_rate_bps", self.billing.service_charge_rate())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let url = url::Url::parse(&self.remote.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.remote.base_url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.remote.base_url
            )));
        }

        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `SAFFRON_*` overrides read through `lookup`.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SAFFRON_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.remote.base_url = url;
        }

        if let Some(token) = lookup("SAFFRON_API_TOKEN") {
            self.remote.api_token = Some(token).filter(|t| !t.is_empty());
        }

        if let Some(raw) = lookup("SAFFRON_API_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) => self.remote.timeout_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid SAFFRON_API_TIMEOUT_SECS"),
            }
        }

        if let Some(raw) = lookup("SAFFRON_TAX_RATE_BPS") {
            match raw.parse::<u32>() {
                Ok(bps) => self.billing.tax_rate_bps = bps,
                Err(_) => warn!(value = %raw, "Ignoring invalid SAFFRON_TAX_RATE_BPS"),
            }
        }

        if let Some(raw) = lookup("SAFFRON_SERVICE_CHARGE_BPS") {
            match raw.parse::<u32>() {
                Ok(bps) => {
                    self.billing.service_charge_rate_bps = bps;
                    self.billing.include_service_charge = bps > 0;
                }
                Err(_) => warn!(value = %raw, "Ignoring invalid SAFFRON_SERVICE_CHARGE_BPS"),
            }
        }

        if let Some(raw) = lookup("SAFFRON_CACHE_BACKEND") {
            match raw.parse() {
                Ok(backend) => self.cache.backend = backend,
                Err(e) => warn!(error = %e, "Ignoring invalid SAFFRON_CACHE_BACKEND"),
            }
        }

        if let Some(path) = lookup("SAFFRON_CACHE_PATH") {
            debug!(path = %path, "Overriding cache path from environment");
            self.cache.path = Some(PathBuf::from(path));
        }

        if let Some(raw) = lookup("SAFFRON_BILLING_ROLES") {
            let roles: Vec<Role> = raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .filter_map(|s| s.parse().ok())
                .collect();
            if !roles.is_empty() {
                self.billing.required_roles = roles;
            }
        }
    }

    /// Platform config location, e.g. `~/.config/pos/billing.toml`.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "saffron", "pos").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use saffron_core::{preview_order, Money, OrderItem, OrderStatus};
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = BillingConfig::default();
        assert_eq!(config.billing.required_roles, BILLING_ROLES.to_vec());
        assert_eq!(config.billing.tax_rate().bps(), 500);
        assert_eq!(config.billing.redirect_delay(), Duration::from_millis(1500));
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = BillingConfig::default();
        config.remote.base_url = "ftp://example.com".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));

        let mut config = BillingConfig::default();
        config.billing.required_roles.clear();
        assert!(config.validate().is_err());

        let mut config = BillingConfig::default();
        config.billing.required_roles = vec![Role::Other("Auditor".into())];
        assert!(config.validate().is_err());

        let mut config = BillingConfig::default();
        config.billing.required_roles = vec![Role::Manager];
        assert!(config.validate().is_ok());

        let mut config = BillingConfig::default();
        config.billing.tax_rate_bps = 12_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_partial_file_uses_defaults() {
        let toml_str = r#"
            [billing]
            tax_rate_bps = 1800
            required_roles = ["owner", "Cashier"]

            [cache]
            backend = "sqlite"
            path = "/tmp/orders.db"
        "#;
        let config: BillingConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.billing.tax_rate_bps, 1800);
        assert_eq!(config.billing.required_roles, vec![Role::Owner, Role::Cashier]);
        assert!(config.billing.include_tax);
        assert_eq!(config.remote, RemoteSettings::default());
        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        assert_eq!(config.cache.resolved_path(), Some(PathBuf::from("/tmp/orders.db")));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = BillingConfig::default();
        config.apply_env_overrides_from(env(&[
            ("SAFFRON_API_URL", "https://pos.example.com/api"),
            ("SAFFRON_API_TOKEN", "secret"),
            ("SAFFRON_API_TIMEOUT_SECS", "not-a-number"),
            ("SAFFRON_SERVICE_CHARGE_BPS", "1000"),
            ("SAFFRON_BILLING_ROLES", "owner, manager"),
            ("SAFFRON_CACHE_BACKEND", "sqlite"),
        ]));

        assert_eq!(config.remote.base_url, "https://pos.example.com/api");
        assert_eq!(config.remote.api_token.as_deref(), Some("secret"));
        assert_eq!(config.remote.timeout_secs, 15);
        assert_eq!(config.billing.service_charge_rate_bps, 1000);
        assert!(config.billing.include_service_charge);
        assert_eq!(config.billing.required_roles, vec![Role::Owner, Role::Manager]);
        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_roles_cannot_widen_billing_roles() {
        let mut config = BillingConfig::default();
        config.apply_env_overrides_from(env(&[("SAFFRON_BILLING_ROLES", "waiter")]));

        assert_eq!(config.billing.required_roles, vec![Role::Waiter]);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert!(config.billing.billing_roles().is_empty());

        let settings = BillingSettings {
            required_roles: vec![Role::Chef, Role::Cashier],
            ..BillingSettings::default()
        };
        assert_eq!(settings.billing_roles(), vec![Role::Cashier]);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = BillingConfig::default();
        config.billing.tax_rate_bps = 1200;
        config.save(Some(path.clone())).unwrap();

        let loaded: BillingConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_bill_inputs_follow_settings() {
        let order = Order {
            id: "ord-1".into(),
            table_number: 3,
            items: vec![OrderItem::new("Thali", 1, Money::from_cents(20000))],
            status: OrderStatus::Ready,
            discount: None,
            subtotal: None,
            tax: None,
        };

        let mut settings = BillingSettings::default();
        settings.include_service_charge = true;
        settings.service_charge_rate_bps = 1000;

        let totals = preview_order(&order, &settings.bill_inputs(&order));
        assert_eq!(totals.tax.cents(), 1000);
        assert_eq!(totals.service_charge.cents(), 2000);
        assert_eq!(totals.total.cents(), 23000);
    }
}
