use crate::errors::{WalletError, WalletResult};
use crate::models::Currency;

/// Largest precision a currency may declare; 10^30 still leaves headroom in a u128.
pub const MAX_DECIMAL_DIGITS: u32 = 30;

/// A non-negative decimal amount of some currency.
///
/// Stored as an integer count of the currency's smallest unit, so formatting never goes
/// through floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount {
    base_units: u128,
    decimals: u32,
}

impl Amount {
    /// Parse user input for a currency with `decimals` fractional digits.
    pub fn parse(amount_str: &str, decimals: u32) -> WalletResult<Self> {
        check_decimals(decimals)?;
        let trimmed = amount_str.trim();
        if trimmed.is_empty() {
            return Err(WalletError::InvalidAmount(
                "Amount cannot be empty".to_string(),
            ));
        }

        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() > 2 {
            return Err(WalletError::InvalidAmount(
                "Invalid decimal format".to_string(),
            ));
        }

        let whole_str = parts[0];
        let fractional_str = parts.get(1).copied().unwrap_or("");
        if whole_str.is_empty() && fractional_str.is_empty() {
            return Err(WalletError::InvalidAmount(
                "Invalid number format".to_string(),
            ));
        }
        if !whole_str.chars().all(|c| c.is_ascii_digit())
            || !fractional_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(WalletError::InvalidAmount(
                "Invalid number format".to_string(),
            ));
        }
        if fractional_str.len() > decimals as usize {
            return Err(WalletError::InvalidAmount(format!(
                "Too many decimal places (at most {})",
                decimals
            )));
        }

        let whole: u128 = if whole_str.is_empty() {
            0
        } else {
            whole_str
                .parse()
                .map_err(|_| WalletError::InvalidAmount("Amount overflow".to_string()))?
        };

        let fractional_units: u128 = if fractional_str.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", fractional_str, width = decimals as usize);
            padded
                .parse()
                .map_err(|_| WalletError::InvalidAmount("Invalid fractional part".to_string()))?
        };

        let base_units = whole
            .checked_mul(unit_scale(decimals))
            .and_then(|w| w.checked_add(fractional_units))
            .ok_or_else(|| WalletError::InvalidAmount("Amount overflow".to_string()))?;

        Ok(Amount {
            base_units,
            decimals,
        })
    }

    /// Parse an amount the user wants to send: must be strictly positive.
    pub fn parse_for_currency(amount_str: &str, currency: &Currency) -> WalletResult<Self> {
        let amount = Self::parse(amount_str, currency.decimal_digits)?;
        if amount.is_zero() {
            return Err(WalletError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        Ok(amount)
    }

    pub fn base_units(&self) -> u128 {
        self.base_units
    }

    pub fn is_zero(&self) -> bool {
        self.base_units == 0
    }

    /// Full precision, trailing zeros trimmed.
    pub fn as_string(&self) -> String {
        let scale = unit_scale(self.decimals);
        let whole = self.base_units / scale;
        let fractional = self.base_units % scale;

        if fractional == 0 {
            whole.to_string()
        } else {
            let frac_str = format!("{:0width$}", fractional, width = self.decimals as usize);
            format!("{}.{}", whole, frac_str.trim_end_matches('0'))
        }
    }
}

fn check_decimals(decimals: u32) -> WalletResult<()> {
    if decimals > MAX_DECIMAL_DIGITS {
        return Err(WalletError::InvalidAmount(format!(
            "Unsupported precision: {} decimal digits",
            decimals
        )));
    }
    Ok(())
}

fn unit_scale(decimals: u32) -> u128 {
    10_u128.pow(decimals)
}
