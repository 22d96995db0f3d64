//! # Idempotency Keys
//!
//! Every mutating call that moves money carries a client-generated key so
//! that a retried delivery of the *same* request is de-duplicated by the
//! server.
//!
//! ## Key Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Saga attempt #1                                                        │
//! │    bill key  = bill_9f3c…   ──► CreateBill (retried by transport: same) │
//! │    pay key   = pay_41ab…    ──► ProcessPayment                          │
//! │                                                                         │
//! │  User presses "Retry" after a reported failure                          │
//! │    Saga attempt #2 → brand-new keys                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are UUID v4 (122 random bits). Two attempts started in the same
//! millisecond still get different keys; nothing here reads the clock.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What a key protects. Only used to prefix the key for log readability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    Bill,
    Payment,
}

impl KeyPurpose {
    pub const fn prefix(&self) -> &'static str {
        match self {
            KeyPurpose::Bill => "bill",
            KeyPurpose::Payment => "pay",
        }
    }
}

/// A client-generated idempotency token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Generates a fresh random key for one logical attempt.
    ///
    /// ```rust
    /// use saffron_core::idempotency::{IdempotencyKey, KeyPurpose};
    ///
    /// let a = IdempotencyKey::generate(KeyPurpose::Bill);
    /// let b = IdempotencyKey::generate(KeyPurpose::Bill);
    /// assert_ne!(a, b);
    /// assert!(a.as_str().starts_with("bill_"));
    /// ```
    pub fn generate(purpose: KeyPurpose) -> Self {
        IdempotencyKey(format!("{}_{}", purpose.prefix(), Uuid::new_v4().simple()))
    }

    /// Wraps a key that was generated elsewhere (server echo, test fixture).
    pub fn from_string(key: impl Into<String>) -> Self {
        IdempotencyKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Key Source
// =============================================================================

/// Produces keys for the orchestrator. Injected so tests can pin them.
pub trait KeySource: Send + Sync {
    fn new_key(&self, purpose: KeyPurpose) -> IdempotencyKey;
}

/// Default source backed by [`IdempotencyKey::generate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomKeySource;

impl KeySource for RandomKeySource {
    fn new_key(&self, purpose: KeyPurpose) -> IdempotencyKey {
        IdempotencyKey::generate(purpose)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_do_not_collide_in_a_tight_loop() {
        let keys: HashSet<_> = (0..10_000)
            .map(|_| IdempotencyKey::generate(KeyPurpose::Payment))
            .collect();
        assert_eq!(keys.len(), 10_000);
    }

    #[test]
    fn test_prefixes() {
        let source = RandomKeySource;
        assert!(source.new_key(KeyPurpose::Bill).as_str().starts_with("bill_"));
        assert!(source.new_key(KeyPurpose::Payment).as_str().starts_with("pay_"));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let key = IdempotencyKey::from_string("bill_abc");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"bill_abc\"");
    }
}
