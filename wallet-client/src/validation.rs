use crate::errors::{WalletError, WalletResult};
use regex::Regex;

const MAX_INPUT_LEN: usize = 1000;
const MAX_ADDRESS_LEN: usize = 128;
const MAX_PASSWORD_LEN: usize = 256;
const MAX_WALLET_NAME_LEN: usize = 50;

/// Input validation applied before anything reaches the wallet backend or local storage
pub struct InputValidator {
    // Compiled regex patterns for performance
    identifier_pattern: Regex,
    address_pattern: Regex,
    pin_pattern: Regex,

    // Blacklisted patterns for security
    malicious_patterns: Vec<Regex>,
}

impl InputValidator {
    pub fn new() -> WalletResult<Self> {
        let identifier_pattern = compile(r"^[A-Za-z0-9_\-]{1,128}$", "identifier")?;
        let address_pattern = compile(r"^[A-Za-z0-9:._\-]+$", "address")?;
        let pin_pattern = compile(r"^[0-9]{4,8}$", "pin")?;

        // Common malicious patterns to block
        let malicious_patterns = [
            r"<script",
            r"javascript:",
            r"data:text/html",
            r"vbscript:",
            r"onload=",
            r"onerror=",
        ]
        .iter()
        .map(|pattern| compile(pattern, "malicious pattern"))
        .collect::<WalletResult<Vec<_>>>()?;

        Ok(InputValidator {
            identifier_pattern,
            address_pattern,
            pin_pattern,
            malicious_patterns,
        })
    }

    /// Validate a server-assigned wallet id before it is spliced into a URL path
    pub fn validate_wallet_id(&self, wallet_id: &str) -> WalletResult<()> {
        self.validate_identifier(wallet_id, "Wallet id")
    }

    /// Validate the account id whose wallets are listed as transfer recipients
    pub fn validate_account_id(&self, account_id: &str) -> WalletResult<()> {
        self.validate_identifier(account_id, "Account id")
    }

    /// Validate a destination address. Formats differ per chain, so only the shape is checked.
    pub fn validate_address(&self, address: &str) -> WalletResult<()> {
        self.check_basic_security(address)?;

        if address.is_empty() {
            return Err(WalletError::InvalidAddress(
                "Address cannot be empty".to_string(),
            ));
        }

        if address.len() > MAX_ADDRESS_LEN {
            return Err(WalletError::InvalidAddress("Address too long".to_string()));
        }

        if !self.address_pattern.is_match(address) {
            return Err(WalletError::InvalidAddress(
                "Address format is invalid".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate a server-side wallet password
    pub fn validate_password(&self, password: &str) -> WalletResult<()> {
        if password.is_empty() {
            return Err(WalletError::ValidationError(
                "Password cannot be empty".to_string(),
            ));
        }

        if password.len() > MAX_PASSWORD_LEN {
            return Err(WalletError::ValidationError(
                "Password too long".to_string(),
            ));
        }

        if password.chars().any(|c| c.is_control()) {
            return Err(WalletError::ValidationError(
                "Password contains unsupported characters".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate a local wallet PIN
    pub fn validate_pin(&self, pin: &str) -> WalletResult<()> {
        if !self.pin_pattern.is_match(pin) {
            return Err(WalletError::ValidationError(
                "PIN must be 4 to 8 digits".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate a local wallet display name
    pub fn validate_wallet_name(&self, name: &str) -> WalletResult<()> {
        self.check_basic_security(name)?;

        if name.trim().is_empty() {
            return Err(WalletError::ValidationError(
                "Wallet name cannot be empty".to_string(),
            ));
        }

        if name.chars().count() > MAX_WALLET_NAME_LEN {
            return Err(WalletError::ValidationError(
                "Wallet name too long".to_string(),
            ));
        }

        if name.chars().any(|c| c.is_control()) {
            return Err(WalletError::ValidationError(
                "Wallet name contains invalid characters".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_identifier(&self, value: &str, label: &str) -> WalletResult<()> {
        self.check_basic_security(value)?;
        if !self.identifier_pattern.is_match(value) {
            return Err(WalletError::ValidationError(format!(
                "{} is invalid",
                label
            )));
        }
        Ok(())
    }

    /// Check for basic security issues in any input
    fn check_basic_security(&self, input: &str) -> WalletResult<()> {
        if input.len() > MAX_INPUT_LEN {
            return Err(WalletError::ValidationError("Input too long".to_string()));
        }

        let lowered = input.to_lowercase();
        for pattern in &self.malicious_patterns {
            if pattern.is_match(&lowered) {
                return Err(WalletError::ValidationError(
                    "Input contains potentially malicious content".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn compile(pattern: &str, label: &str) -> WalletResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| WalletError::ValidationError(format!("Invalid {} regex: {}", label, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> InputValidator {
        InputValidator::new().unwrap()
    }

    #[test]
    fn wallet_ids() {
        let v = validator();
        assert!(v.validate_wallet_id("5f1a-77c2_ab").is_ok());
        assert!(v.validate_wallet_id("").is_err());
        assert!(v.validate_wallet_id("../admin").is_err());
        assert!(v.validate_wallet_id("a b").is_err());
    }

    #[test]
    fn addresses() {
        let v = validator();
        assert!(v
            .validate_address("0x52908400098527886E0F7030069857D2E4169EE7")
            .is_ok());
        assert!(v.validate_address("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq").is_ok());
        assert!(matches!(
            v.validate_address(""),
            Err(WalletError::InvalidAddress(_))
        ));
        assert!(v.validate_address("0xabc def").is_err());
        assert!(v.validate_address("javascript:alert(1)").is_err());
    }

    #[test]
    fn pins() {
        let v = validator();
        assert!(v.validate_pin("1234").is_ok());
        assert!(v.validate_pin("12345678").is_ok());
        assert!(v.validate_pin("123").is_err());
        assert!(v.validate_pin("12a4").is_err());
    }

    #[test]
    fn passwords_and_names() {
        let v = validator();
        assert!(v.validate_password("hunter2").is_ok());
        assert!(v.validate_password("").is_err());
        assert!(v.validate_password("line\nbreak").is_err());
        assert!(v.validate_wallet_name("Savings ₿").is_ok());
        assert!(v.validate_wallet_name("   ").is_err());
        assert!(v.validate_wallet_name(&"x".repeat(51)).is_err());
        assert!(v.validate_wallet_name("<script>").is_err());
    }
}
