use std::{env, fmt, fs, path::Path, str::FromStr, time::Duration};

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::Network;

/// Client settings loaded from TOML, then overridden by `HYPERLIQUID_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub testnet: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub vault_address: Option<String>,
    #[serde(default)]
    pub referral_code: Option<String>,
    #[serde(default = "default_symbol_refresh_secs")]
    pub symbol_refresh_secs: u64,
    #[serde(default = "default_slippage")]
    pub default_slippage: Decimal,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub global_limit: GlobalLimitConfig,
    #[serde(default)]
    pub l1_limit: L1LimitConfig,
}

/// Token bucket shared by every outbound request.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalLimitConfig {
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default = "default_capacity")]
    pub refill_amount: u32,
    #[serde(default = "default_refill_interval_ms")]
    pub refill_interval_ms: u64,
    #[serde(default = "default_starvation_warn_ms")]
    pub starvation_warn_ms: u64,
}

/// Per-address quota derived from traded volume.
#[derive(Debug, Clone, Deserialize)]
pub struct L1LimitConfig {
    #[serde(default = "default_initial_buffer")]
    pub initial_buffer: f64,
    #[serde(default = "default_cancel_bonus")]
    pub cancel_bonus: f64,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_fixed_volume")]
    pub fixed_volume: f64,
}

fn default_symbol_refresh_secs() -> u64 {
    60
}

fn default_slippage() -> Decimal {
    Decimal::new(5, 2)
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_capacity() -> u32 {
    1200
}

fn default_refill_interval_ms() -> u64 {
    60_000
}

fn default_starvation_warn_ms() -> u64 {
    30_000
}

fn default_initial_buffer() -> f64 {
    10_000.0
}

fn default_cancel_bonus() -> f64 {
    100_000.0
}

fn default_cooldown_ms() -> u64 {
    10_000
}

fn default_fixed_volume() -> f64 {
    50_000.0
}

impl Default for GlobalLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_amount: default_capacity(),
            refill_interval_ms: default_refill_interval_ms(),
            starvation_warn_ms: default_starvation_warn_ms(),
        }
    }
}

impl GlobalLimitConfig {
    pub fn refill_interval(&self) -> Duration {
        Duration::from_millis(self.refill_interval_ms)
    }

    pub fn starvation_threshold(&self) -> Duration {
        Duration::from_millis(self.starvation_warn_ms)
    }
}

impl Default for L1LimitConfig {
    fn default() -> Self {
        Self {
            initial_buffer: default_initial_buffer(),
            cancel_bonus: default_cancel_bonus(),
            cooldown_ms: default_cooldown_ms(),
            fixed_volume: default_fixed_volume(),
        }
    }
}

impl L1LimitConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            testnet: false,
            base_url: None,
            wallet_address: None,
            vault_address: None,
            referral_code: None,
            symbol_refresh_secs: default_symbol_refresh_secs(),
            default_slippage: default_slippage(),
            request_timeout_ms: default_request_timeout_ms(),
            global_limit: GlobalLimitConfig::default(),
            l1_limit: L1LimitConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Read a config file. Accepts either top-level keys or a `[hyperliquid]` table.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&data)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults plus environment overrides, for setups without a config file.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        let raw: toml::Value = toml::from_str(data).context("failed to parse TOML config")?;
        let table = match raw.get("hyperliquid") {
            Some(section) => section.clone(),
            None => raw,
        };
        table
            .try_into()
            .context("invalid hyperliquid config structure")
    }

    pub fn network(&self) -> Network {
        Network::from_testnet_flag(self.testnet)
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.network().default_base_url())
    }

    pub fn symbol_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.symbol_refresh_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply `HYPERLIQUID_*` overrides read through `lookup`. A value that does
    /// not parse is an error rather than a silent fallback to the file value.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let lookup = &lookup;
        override_parse(lookup, "HYPERLIQUID_TESTNET", &mut self.testnet)?;
        override_string(lookup, "HYPERLIQUID_BASE_URL", &mut self.base_url);
        override_string(lookup, "HYPERLIQUID_WALLET_ADDRESS", &mut self.wallet_address);
        override_string(lookup, "HYPERLIQUID_VAULT_ADDRESS", &mut self.vault_address);
        override_string(lookup, "HYPERLIQUID_REFERRAL_CODE", &mut self.referral_code);
        override_parse(
            lookup,
            "HYPERLIQUID_SYMBOL_REFRESH_SECS",
            &mut self.symbol_refresh_secs,
        )?;
        override_parse(
            lookup,
            "HYPERLIQUID_DEFAULT_SLIPPAGE",
            &mut self.default_slippage,
        )?;
        override_parse(
            lookup,
            "HYPERLIQUID_REQUEST_TIMEOUT_MS",
            &mut self.request_timeout_ms,
        )?;
        override_parse(
            lookup,
            "HYPERLIQUID_GLOBAL_CAPACITY",
            &mut self.global_limit.capacity,
        )?;
        override_parse(
            lookup,
            "HYPERLIQUID_GLOBAL_REFILL_AMOUNT",
            &mut self.global_limit.refill_amount,
        )?;
        override_parse(
            lookup,
            "HYPERLIQUID_GLOBAL_REFILL_INTERVAL_MS",
            &mut self.global_limit.refill_interval_ms,
        )?;
        override_parse(
            lookup,
            "HYPERLIQUID_GLOBAL_STARVATION_WARN_MS",
            &mut self.global_limit.starvation_warn_ms,
        )?;
        override_parse(
            lookup,
            "HYPERLIQUID_L1_INITIAL_BUFFER",
            &mut self.l1_limit.initial_buffer,
        )?;
        override_parse(
            lookup,
            "HYPERLIQUID_L1_CANCEL_BONUS",
            &mut self.l1_limit.cancel_bonus,
        )?;
        override_parse(
            lookup,
            "HYPERLIQUID_L1_COOLDOWN_MS",
            &mut self.l1_limit.cooldown_ms,
        )?;
        override_parse(
            lookup,
            "HYPERLIQUID_L1_FIXED_VOLUME",
            &mut self.l1_limit.fixed_volume,
        )?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.global_limit.capacity > 0,
            "global_limit.capacity must be positive"
        );
        anyhow::ensure!(
            self.global_limit.refill_amount > 0,
            "global_limit.refill_amount must be positive"
        );
        anyhow::ensure!(
            self.global_limit.refill_interval_ms > 0,
            "global_limit.refill_interval_ms must be positive"
        );
        anyhow::ensure!(
            self.global_limit.starvation_warn_ms > 0,
            "global_limit.starvation_warn_ms must be positive"
        );
        anyhow::ensure!(
            self.l1_limit.initial_buffer >= 0.0,
            "l1_limit.initial_buffer must be non-negative"
        );
        anyhow::ensure!(
            self.l1_limit.cancel_bonus >= 0.0,
            "l1_limit.cancel_bonus must be non-negative"
        );
        anyhow::ensure!(
            self.symbol_refresh_secs > 0,
            "symbol_refresh_secs must be positive"
        );
        anyhow::ensure!(
            self.default_slippage >= Decimal::ZERO && self.default_slippage < Decimal::ONE,
            "default_slippage must be within [0, 1)"
        );
        if let Some(url) = &self.base_url {
            url::Url::parse(url).with_context(|| format!("base_url `{url}` is not a valid URL"))?;
        }
        Ok(())
    }
}

fn override_parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut T,
) -> Result<()>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Some(value) = lookup(key) {
        *field = value
            .trim()
            .parse::<T>()
            .map_err(|err| anyhow!("{key}=`{value}` is not valid: {err}"))?;
    }
    Ok(())
}

fn override_string(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut Option<String>,
) {
    if let Some(value) = lookup(key) {
        if !value.is_empty() {
            *field = Some(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_exchange_limits() {
        let cfg = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.global_limit.capacity, 1200);
        assert_eq!(cfg.global_limit.refill_interval(), Duration::from_secs(60));
        assert_eq!(cfg.l1_limit.initial_buffer, 10_000.0);
        assert_eq!(cfg.l1_limit.cooldown(), Duration::from_secs(10));
        assert_eq!(cfg.default_slippage, Decimal::new(5, 2));
        assert_eq!(cfg.base_url(), "https://api.hyperliquid.xyz");
        cfg.validate().unwrap();
    }

    #[test]
    fn nested_section_is_accepted() {
        let cfg = ClientConfig::from_toml_str(
            r#"
            [hyperliquid]
            testnet = true
            referral_code = "ALPHA"

            [hyperliquid.global_limit]
            capacity = 600
            "#,
        )
        .unwrap();
        assert!(cfg.testnet);
        assert_eq!(cfg.referral_code.as_deref(), Some("ALPHA"));
        assert_eq!(cfg.global_limit.capacity, 600);
        assert_eq!(cfg.global_limit.refill_amount, 1200);
        assert_eq!(cfg.base_url(), "https://api.hyperliquid-testnet.xyz");
    }

    #[test]
    fn validation_rejects_empty_bucket() {
        let cfg = ClientConfig::from_toml_str("[global_limit]\ncapacity = 0\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| {
            pairs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
        }
    }

    #[test]
    fn environment_overrides_apply() {
        let mut cfg = ClientConfig::default();
        cfg.apply_overrides(overrides(&[
            ("HYPERLIQUID_TESTNET", "true"),
            ("HYPERLIQUID_L1_CANCEL_BONUS", "5000"),
            ("HYPERLIQUID_GLOBAL_STARVATION_WARN_MS", "2500"),
            ("HYPERLIQUID_DEFAULT_SLIPPAGE", " 0.01 "),
        ]))
        .unwrap();
        assert_eq!(cfg.network(), Network::Testnet);
        assert_eq!(cfg.l1_limit.cancel_bonus, 5000.0);
        assert_eq!(
            cfg.global_limit.starvation_threshold(),
            Duration::from_millis(2500)
        );
        assert_eq!(cfg.default_slippage, Decimal::new(1, 2));
    }

    #[test]
    fn unparsable_override_is_an_error() {
        let mut cfg = ClientConfig::default();
        let err = cfg
            .apply_overrides(overrides(&[("HYPERLIQUID_TESTNET", "yes")]))
            .unwrap_err();
        assert!(err.to_string().contains("HYPERLIQUID_TESTNET"));
        assert!(!cfg.testnet);
    }

    #[test]
    fn validation_rejects_zero_starvation_threshold() {
        let cfg =
            ClientConfig::from_toml_str("[global_limit]\nstarvation_warn_ms = 0\n").unwrap();
        assert!(cfg.validate().is_err());
    }
}
