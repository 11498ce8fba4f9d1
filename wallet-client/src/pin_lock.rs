use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::config_store::PinLockConfig;
use crate::credentials::CredentialsManager;
use crate::errors::{WalletError, WalletResult};

const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);
const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(32);

#[derive(Debug, Default)]
struct PinState {
    unlocked_until: Option<Instant>,
    failed_attempts: u32,
    next_allowed_attempt: Option<Instant>,
    backoff_exponent: u32,
    locked_out_until: Option<Instant>,
}

/// Local PIN gate in front of wallets whose credentials carry a PIN.
///
/// Wrong PINs back off exponentially; after `max_failed_attempts` the wallet refuses PINs for
/// the lockout period. A correct PIN keeps the wallet open for `timeout`. Wallets without a
/// PIN are always open.
pub struct PinLockManager {
    credentials: Arc<CredentialsManager>,
    state: RwLock<HashMap<String, PinState>>,
    timeout: Duration,
    max_failed_attempts: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
    lockout: Duration,
    max_backoff_exponent: u32,
}

impl PinLockManager {
    pub fn new(credentials: Arc<CredentialsManager>, config: &PinLockConfig) -> Self {
        let timeout = Duration::from_secs(u64::from(config.unlock_minutes) * 60);
        Self::with_policy(
            credentials,
            timeout,
            config.max_failed_attempts,
            DEFAULT_BACKOFF_BASE,
            DEFAULT_BACKOFF_CAP,
            timeout,
        )
    }

    pub fn with_policy(
        credentials: Arc<CredentialsManager>,
        timeout: Duration,
        max_failed_attempts: u32,
        backoff_base: Duration,
        backoff_cap: Duration,
        lockout: Duration,
    ) -> Self {
        Self {
            credentials,
            state: RwLock::new(HashMap::new()),
            timeout,
            max_failed_attempts: max_failed_attempts.max(1),
            backoff_base,
            backoff_cap,
            lockout,
            max_backoff_exponent: 8,
        }
    }

    /// Unreadable credentials are an error, never "no PIN".
    pub fn requires_pin(&self, wallet_id: &str) -> WalletResult<bool> {
        Ok(self.stored_pin(wallet_id)?.is_some())
    }

    /// Check `pin` against the wallet's stored PIN and open the wallet on success.
    pub fn unlock(&self, wallet_id: &str, pin: &str) -> WalletResult<()> {
        let Some(expected) = self.stored_pin(wallet_id)? else {
            return Ok(());
        };

        let mut state = self.state.write();
        let entry = state.entry(wallet_id.to_string()).or_default();
        let now = Instant::now();

        if let Some(until) = entry.locked_out_until {
            if now < until {
                return Err(WalletError::PermissionDenied(format!(
                    "Too many wrong PINs. Retry in {} seconds",
                    until.saturating_duration_since(now).as_secs().max(1)
                )));
            }
            *entry = PinState::default();
        }

        if let Some(until) = entry.next_allowed_attempt {
            if now < until {
                let remaining = until.saturating_duration_since(now);
                return Err(WalletError::PermissionDenied(format!(
                    "PIN entry temporarily disabled. Retry in {}.{:03} seconds",
                    remaining.as_secs(),
                    remaining.subsec_millis()
                )));
            }
        }

        // Hash comparison is constant time
        if blake3::hash(pin.as_bytes()) == blake3::hash(expected.as_bytes()) {
            *entry = PinState {
                unlocked_until: Some(now + self.timeout),
                ..PinState::default()
            };
            log::debug!("Wallet {} unlocked", wallet_id);
            return Ok(());
        }

        self.register_failed_attempt(entry, now)
    }

    /// `false` also when the wallet's credentials cannot be read.
    pub fn is_unlocked(&self, wallet_id: &str) -> bool {
        self.ensure_unlocked(wallet_id).is_ok()
    }

    /// Fail with `PermissionDenied` unless the wallet is open, or with the storage error when
    /// its credentials cannot be read.
    pub fn ensure_unlocked(&self, wallet_id: &str) -> WalletResult<()> {
        if !self.requires_pin(wallet_id)? {
            return Ok(());
        }
        let open = self
            .state
            .read()
            .get(wallet_id)
            .and_then(|s| s.unlocked_until)
            .map(|until| Instant::now() < until)
            .unwrap_or(false);
        if open {
            Ok(())
        } else {
            Err(WalletError::PermissionDenied(
                "Wallet is locked with a PIN".to_string(),
            ))
        }
    }

    pub fn lock(&self, wallet_id: &str) {
        if let Some(entry) = self.state.write().get_mut(wallet_id) {
            entry.unlocked_until = None;
        }
    }

    /// Lock every wallet and forget all attempt counters.
    pub fn lock_all(&self) {
        self.state.write().clear();
    }

    pub fn remaining_attempts(&self, wallet_id: &str) -> u32 {
        let state = self.state.read();
        let failed = state.get(wallet_id).map(|s| s.failed_attempts).unwrap_or(0);
        self.max_failed_attempts.saturating_sub(failed)
    }

    fn stored_pin(&self, wallet_id: &str) -> WalletResult<Option<String>> {
        match self.credentials.load_credentials(wallet_id) {
            Ok(credentials) => Ok(credentials.pin),
            Err(WalletError::NoWalletCredentialsFound) => Ok(None),
            Err(e) => {
                log::warn!("PIN check for wallet {} failed: {}", wallet_id, e);
                Err(e)
            }
        }
    }

    fn register_failed_attempt(&self, entry: &mut PinState, now: Instant) -> WalletResult<()> {
        entry.unlocked_until = None;
        entry.failed_attempts += 1;
        if entry.failed_attempts >= self.max_failed_attempts {
            entry.next_allowed_attempt = None;
            entry.backoff_exponent = 0;
            entry.locked_out_until = Some(now + self.lockout);
            log::warn!("PIN attempts exhausted, wallet locked out");
            return Err(WalletError::PermissionDenied(
                "Maximum PIN attempts exceeded".to_string(),
            ));
        }

        entry.backoff_exponent = (entry.backoff_exponent + 1).min(self.max_backoff_exponent);
        let multiplier = 1_u32 << entry.backoff_exponent.saturating_sub(1);
        let delay = self
            .backoff_base
            .checked_mul(multiplier)
            .unwrap_or(self.backoff_cap)
            .min(self.backoff_cap);
        entry.next_allowed_attempt = Some(now + delay);

        Err(WalletError::PermissionDenied(format!(
            "Wrong PIN, {} attempts left",
            self.max_failed_attempts - entry.failed_attempts
        )))
    }
}
