//! Runtime configuration handed to the [`Engine`](crate::Engine) at build time.
//!
//! Nothing here is read from the environment: the application layer
//! deserializes its settings and passes the result to
//! [`EngineBuilder::config`](crate::EngineBuilder::config).

use sea_orm::IsolationLevel;
use serde::{Deserialize, Serialize};

/// What to do when a money-moving flow would credit a frozen wallet.
///
/// Debits from a frozen wallet are always refused; credits are a product
/// decision that differs per flow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrozenCredit {
    #[default]
    Allow,
    Reject,
}

/// Frozen-wallet credit policy, one entry per flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrozenCreditPolicy {
    pub transfer: FrozenCredit,
    pub qr_payment: FrozenCredit,
    pub mission_reward: FrozenCredit,
    pub purchase: FrozenCredit,
    pub adjustment: FrozenCredit,
}

impl Default for FrozenCreditPolicy {
    fn default() -> Self {
        Self {
            transfer: FrozenCredit::Reject,
            qr_payment: FrozenCredit::Allow,
            mission_reward: FrozenCredit::Allow,
            purchase: FrozenCredit::Allow,
            adjustment: FrozenCredit::Allow,
        }
    }
}

/// Isolation level requested for every money-moving unit of work.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    #[default]
    Serializable,
    RepeatableRead,
    /// Let the backend decide (SQLite ignores isolation levels anyway).
    Backend,
}

impl Isolation {
    pub(crate) fn level(self) -> Option<IsolationLevel> {
        match self {
            Self::Serializable => Some(IsolationLevel::Serializable),
            Self::RepeatableRead => Some(IsolationLevel::RepeatableRead),
            Self::Backend => None,
        }
    }
}

#[derive(Clone)]
pub struct EngineConfig {
    /// Secret used to sign and verify QR codes.
    pub qr_signing_secret: String,
    /// Lifetime of a freshly created QR code.
    pub qr_expiry_minutes: i64,
    pub frozen_credit: FrozenCreditPolicy,
    pub isolation: Isolation,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("qr_signing_secret", &"<redacted>")
            .field("qr_expiry_minutes", &self.qr_expiry_minutes)
            .field("frozen_credit", &self.frozen_credit)
            .field("isolation", &self.isolation)
            .finish()
    }
}

impl EngineConfig {
    #[must_use]
    pub fn new(qr_signing_secret: impl Into<String>) -> Self {
        Self {
            qr_signing_secret: qr_signing_secret.into(),
            qr_expiry_minutes: 10,
            frozen_credit: FrozenCreditPolicy::default(),
            isolation: Isolation::default(),
        }
    }

    #[must_use]
    pub fn qr_expiry_minutes(mut self, minutes: i64) -> Self {
        self.qr_expiry_minutes = minutes;
        self
    }

    #[must_use]
    pub fn frozen_credit(mut self, policy: FrozenCreditPolicy) -> Self {
        self.frozen_credit = policy;
        self
    }

    #[must_use]
    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }
}
