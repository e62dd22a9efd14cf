//! The module contains `Wallet` struct and its implementation.

use chrono::{DateTime, Utc};

use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, EntryType, ResultEngine, util::parse_uuid};

/// A user's point wallet.
///
/// Balances are integer points. `balance` never goes below zero and the
/// lifetime counters only grow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: i64,
    /// Reserved for holds; no flow uses it yet.
    pub locked_balance: i64,
    pub lifetime_earned: i64,
    pub lifetime_spent: i64,
    pub is_frozen: bool,
    pub frozen_reason: Option<String>,
    pub frozen_at: Option<DateTime<Utc>>,
    pub frozen_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Balance of a wallet around a single delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub before: i64,
    pub after: i64,
}

impl Wallet {
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance: 0,
            locked_balance: 0,
            lifetime_earned: 0,
            lifetime_spent: 0,
            is_frozen: false,
            frozen_reason: None,
            frozen_at: None,
            frozen_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a credit or a debit of `amount` points.
    ///
    /// Fails without touching the wallet when `amount` is not positive, when
    /// a debit exceeds the balance, or on overflow.
    pub fn apply(&mut self, amount: i64, entry_type: EntryType) -> ResultEngine<BalanceChange> {
        if amount <= 0 {
            return Err(EngineError::InvalidInput(
                "amount must be > 0".to_string(),
            ));
        }
        let before = self.balance;
        let overflow = || EngineError::InvalidInput("amount overflows the balance".to_string());
        match entry_type {
            EntryType::Credit => {
                let after = before.checked_add(amount).ok_or_else(overflow)?;
                let earned = self.lifetime_earned.checked_add(amount).ok_or_else(overflow)?;
                self.balance = after;
                self.lifetime_earned = earned;
            }
            EntryType::Debit => {
                if before < amount {
                    return Err(EngineError::InsufficientBalance(format!(
                        "balance {before} is below {amount}"
                    )));
                }
                let spent = self.lifetime_spent.checked_add(amount).ok_or_else(overflow)?;
                self.balance = before - amount;
                self.lifetime_spent = spent;
            }
        }
        Ok(BalanceChange {
            before,
            after: self.balance,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub user_id: String,
    pub balance: i64,
    pub locked_balance: i64,
    pub lifetime_earned: i64,
    pub lifetime_spent: i64,
    pub is_frozen: bool,
    pub frozen_reason: Option<String>,
    pub frozen_at: Option<DateTimeUtc>,
    pub frozen_by: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ledger::Entity")]
    Ledger,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    User,
}

impl Related<super::ledger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ledger.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Wallet> for ActiveModel {
    fn from(value: &Wallet) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            user_id: ActiveValue::Set(value.user_id.to_string()),
            balance: ActiveValue::Set(value.balance),
            locked_balance: ActiveValue::Set(value.locked_balance),
            lifetime_earned: ActiveValue::Set(value.lifetime_earned),
            lifetime_spent: ActiveValue::Set(value.lifetime_spent),
            is_frozen: ActiveValue::Set(value.is_frozen),
            frozen_reason: ActiveValue::Set(value.frozen_reason.clone()),
            frozen_at: ActiveValue::Set(value.frozen_at),
            frozen_by: ActiveValue::Set(value.frozen_by.map(|id| id.to_string())),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

impl TryFrom<Model> for Wallet {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "wallet")?,
            user_id: parse_uuid(&model.user_id, "user")?,
            balance: model.balance,
            locked_balance: model.locked_balance,
            lifetime_earned: model.lifetime_earned,
            lifetime_spent: model.lifetime_spent,
            is_frozen: model.is_frozen,
            frozen_reason: model.frozen_reason,
            frozen_at: model.frozen_at,
            frozen_by: model
                .frozen_by
                .as_deref()
                .map(|id| parse_uuid(id, "user"))
                .transpose()?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn wallet(balance: i64) -> Wallet {
        let mut wallet = Wallet::new(Uuid::new_v4(), Utc.timestamp_opt(0, 0).unwrap());
        wallet.balance = balance;
        wallet
    }

    #[test]
    fn credit_grows_balance_and_earned() {
        let mut wallet = wallet(10);
        let change = wallet.apply(30, EntryType::Credit).unwrap();

        assert_eq!(change, BalanceChange { before: 10, after: 40 });
        assert_eq!(wallet.balance, 40);
        assert_eq!(wallet.lifetime_earned, 30);
        assert_eq!(wallet.lifetime_spent, 0);
    }

    #[test]
    fn debit_to_zero_is_allowed() {
        let mut wallet = wallet(25);
        let change = wallet.apply(25, EntryType::Debit).unwrap();

        assert_eq!(change, BalanceChange { before: 25, after: 0 });
        assert_eq!(wallet.lifetime_spent, 25);
    }

    #[test]
    fn overdraft_leaves_wallet_untouched() {
        let mut wallet = wallet(10);
        let err = wallet.apply(50, EntryType::Debit).unwrap_err();

        assert_eq!(
            err,
            EngineError::InsufficientBalance("balance 10 is below 50".to_string())
        );
        assert_eq!(wallet.balance, 10);
        assert_eq!(wallet.lifetime_spent, 0);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let mut wallet = wallet(10);
        assert!(wallet.apply(0, EntryType::Credit).is_err());
        assert!(wallet.apply(-5, EntryType::Debit).is_err());
        assert_eq!(wallet.balance, 10);
    }

    #[test]
    fn credit_overflow_is_rejected() {
        let mut wallet = wallet(i64::MAX - 1);
        assert!(wallet.apply(2, EntryType::Credit).is_err());
        assert_eq!(wallet.balance, i64::MAX - 1);
    }
}
