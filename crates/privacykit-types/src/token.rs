use crate::error::{PrivacyKitError, PrivacyKitResult};
use crate::privacy::FeeSchedule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

pub const PROVIDER_SHADOWWIRE: &str = "shadowwire";
pub const PROVIDER_ARCIUM: &str = "arcium";
pub const PROVIDER_NOIR: &str = "noir";
pub const PROVIDER_PRIVACY_CASH: &str = "privacy-cash";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u32,
    /// Provider id -> cost parameters for this token.
    pub fees: HashMap<String, FeeSchedule>,
}

/// Static per-token metadata and amount scaling.
pub struct TokenRegistry {
    tokens: HashMap<String, TokenInfo>,
}

static GLOBAL_REGISTRY: OnceLock<TokenRegistry> = OnceLock::new();

impl TokenRegistry {
    /// Process-wide registry with the built-in token table.
    pub fn global() -> &'static TokenRegistry {
        GLOBAL_REGISTRY.get_or_init(TokenRegistry::builtin)
    }

    fn builtin() -> Self {
        let mut tokens = HashMap::new();

        tokens.insert(
            "SOL".to_string(),
            TokenInfo {
                symbol: "SOL".to_string(),
                decimals: 9,
                fees: fee_table(&[
                    (PROVIDER_SHADOWWIRE, 0.01, 0.1, Some(1_000.0), None),
                    (PROVIDER_ARCIUM, 0.002, 0.05, None, Some(1_000)),
                    (PROVIDER_NOIR, 0.005, 0.01, None, Some(5_000)),
                    (PROVIDER_PRIVACY_CASH, 0.003, 0.1, None, Some(10_000)),
                ]),
            },
        );

        tokens.insert(
            "USDC".to_string(),
            TokenInfo {
                symbol: "USDC".to_string(),
                decimals: 6,
                fees: fee_table(&[
                    (PROVIDER_SHADOWWIRE, 0.01, 1.0, Some(100_000.0), None),
                    (PROVIDER_ARCIUM, 0.002, 1.0, None, Some(1_000)),
                    (PROVIDER_NOIR, 0.005, 1.0, None, Some(5_000)),
                    (PROVIDER_PRIVACY_CASH, 0.003, 10.0, None, Some(10_000)),
                ]),
            },
        );

        tokens.insert(
            "USDT".to_string(),
            TokenInfo {
                symbol: "USDT".to_string(),
                decimals: 6,
                fees: fee_table(&[
                    (PROVIDER_SHADOWWIRE, 0.01, 1.0, Some(100_000.0), None),
                    (PROVIDER_ARCIUM, 0.002, 1.0, None, Some(1_000)),
                    (PROVIDER_NOIR, 0.005, 1.0, None, Some(5_000)),
                    (PROVIDER_PRIVACY_CASH, 0.003, 10.0, None, Some(10_000)),
                ]),
            },
        );

        Self { tokens }
    }

    pub fn get(&self, symbol: &str) -> Option<&TokenInfo> {
        self.tokens.get(symbol)
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.tokens.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn decimals(&self, symbol: &str) -> PrivacyKitResult<u32> {
        self.get(symbol)
            .map(|t| t.decimals)
            .ok_or_else(|| PrivacyKitError::UnsupportedToken {
                token: symbol.to_string(),
                provider: None,
            })
    }

    pub fn fee_schedule(&self, symbol: &str, provider: &str) -> Option<&FeeSchedule> {
        self.get(symbol).and_then(|t| t.fees.get(provider))
    }

    /// Scale a display amount to base units: round(amount * 10^decimals).
    pub fn to_base_units(&self, amount: f64, symbol: &str) -> PrivacyKitResult<u128> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(PrivacyKitError::InvalidInput(format!(
                "invalid amount: {}",
                amount
            )));
        }
        let decimals = self.decimals(symbol)?;
        let scaled = amount * 10f64.powi(decimals as i32);
        Ok(scaled.round() as u128)
    }

    pub fn from_base_units(&self, units: u128, symbol: &str) -> PrivacyKitResult<f64> {
        let decimals = self.decimals(symbol)?;
        Ok(units as f64 / 10f64.powi(decimals as i32))
    }
}

fn fee_table(
    rows: &[(&str, f64, f64, Option<f64>, Option<u64>)],
) -> HashMap<String, FeeSchedule> {
    rows.iter()
        .map(|(provider, fee_fraction, min_amount, max_amount, anonymity_set)| {
            (
                provider.to_string(),
                FeeSchedule {
                    fee_fraction: *fee_fraction,
                    min_amount: *min_amount,
                    max_amount: *max_amount,
                    anonymity_set: *anonymity_set,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_unit_scaling() {
        let registry = TokenRegistry::global();

        assert_eq!(registry.to_base_units(1.5, "SOL").unwrap(), 1_500_000_000);
        assert_eq!(registry.to_base_units(100.0, "USDC").unwrap(), 100_000_000);
        assert_eq!(registry.from_base_units(1_500_000_000, "SOL").unwrap(), 1.5);
    }

    #[test]
    fn test_unknown_token() {
        let registry = TokenRegistry::global();
        let result = registry.to_base_units(1.0, "DOGE");
        assert!(matches!(
            result,
            Err(PrivacyKitError::UnsupportedToken { .. })
        ));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let registry = TokenRegistry::global();
        assert!(registry.to_base_units(-1.0, "SOL").is_err());
    }

    #[test]
    fn test_fee_schedule_lookup() {
        let registry = TokenRegistry::global();

        let schedule = registry.fee_schedule("USDC", PROVIDER_ARCIUM).unwrap();
        assert_eq!(schedule.fee_fraction, 0.002);

        let schedule = registry.fee_schedule("USDC", PROVIDER_SHADOWWIRE).unwrap();
        assert_eq!(schedule.fee_fraction, 0.01);

        assert!(registry.fee_schedule("DOGE", PROVIDER_ARCIUM).is_none());
    }

    #[test]
    fn test_roundtrip_scaling() {
        let registry = TokenRegistry::global();
        let units = registry.to_base_units(42.125, "USDC").unwrap();
        let amount = registry.from_base_units(units, "USDC").unwrap();
        assert!((amount - 42.125).abs() < 1e-9);
    }
}
