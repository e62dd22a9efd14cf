//! Wallet store: snapshot reads, locked reads and balance deltas.

use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseTransaction, QueryFilter, QuerySelect, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, EntryType, FrozenCredit, LedgerEntry, ReferenceType, ResultEngine, Wallet,
    wallets,
};

use super::Engine;

/// One balance change to apply to a locked wallet.
pub(super) struct Posting {
    pub entry_type: EntryType,
    pub amount: i64,
    pub transaction_id: Option<Uuid>,
    pub description: Option<String>,
    pub reference: (ReferenceType, Uuid),
    pub at: DateTime<Utc>,
}

impl Posting {
    pub(super) fn debit(amount: i64, reference: (ReferenceType, Uuid), at: DateTime<Utc>) -> Self {
        Self {
            entry_type: EntryType::Debit,
            amount,
            transaction_id: None,
            description: None,
            reference,
            at,
        }
    }

    pub(super) fn credit(amount: i64, reference: (ReferenceType, Uuid), at: DateTime<Utc>) -> Self {
        Self {
            entry_type: EntryType::Credit,
            ..Self::debit(amount, reference, at)
        }
    }

    pub(super) fn transaction(mut self, transaction_id: Uuid) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    pub(super) fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// Frozen wallets can never be debited by a user-initiated flow.
pub(super) fn ensure_debitable(wallet: &Wallet) -> ResultEngine<()> {
    if wallet.is_frozen {
        return Err(EngineError::Frozen(format!("wallet {} is frozen", wallet.id)));
    }
    Ok(())
}

pub(super) fn ensure_creditable(wallet: &Wallet, policy: FrozenCredit) -> ResultEngine<()> {
    if wallet.is_frozen && policy == FrozenCredit::Reject {
        return Err(EngineError::Frozen(format!(
            "wallet {} is frozen and cannot receive points",
            wallet.id
        )));
    }
    Ok(())
}

pub(super) fn ensure_funds(wallet: &Wallet, amount: i64) -> ResultEngine<()> {
    if wallet.balance < amount {
        return Err(EngineError::InsufficientBalance(format!(
            "balance {} is below {amount}",
            wallet.balance
        )));
    }
    Ok(())
}

impl Engine {
    /// Plain snapshot of a user's wallet.
    pub(super) async fn wallet_of<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
    ) -> ResultEngine<Wallet> {
        let model = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("wallet not exists".to_string()))?;
        Wallet::try_from(model)
    }

    /// Lock the wallets of `user_ids` for the rest of the unit of work.
    ///
    /// Rows are locked in ascending wallet id order whatever the order of
    /// `user_ids`, so two flows touching the same pair of wallets cannot
    /// deadlock. The result follows the order of `user_ids`.
    pub(super) async fn lock_wallets(
        &self,
        db_tx: &DatabaseTransaction,
        user_ids: &[Uuid],
    ) -> ResultEngine<Vec<Wallet>> {
        let mut targets: Vec<(String, Uuid)> = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            let model = wallets::Entity::find()
                .filter(wallets::Column::UserId.eq(user_id.to_string()))
                .one(db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("wallet of user {user_id}")))?;
            targets.push((model.id, *user_id));
        }
        targets.sort_by(|a, b| a.0.cmp(&b.0));

        let mut locked: Vec<Wallet> = Vec::with_capacity(targets.len());
        for (wallet_id, _) in &targets {
            let model = wallets::Entity::find_by_id(wallet_id.clone())
                .lock_exclusive()
                .one(db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("wallet not exists".to_string()))?;
            locked.push(Wallet::try_from(model)?);
        }

        user_ids
            .iter()
            .map(|user_id| {
                locked
                    .iter()
                    .find(|w| w.user_id == *user_id)
                    .cloned()
                    .ok_or_else(|| EngineError::NotFound(format!("wallet of user {user_id}")))
            })
            .collect()
    }

    pub(super) async fn lock_wallet(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<Wallet> {
        let mut wallets = self.lock_wallets(db_tx, &[user_id]).await?;
        wallets
            .pop()
            .ok_or_else(|| EngineError::NotFound("wallet not exists".to_string()))
    }

    /// Apply one delta to a locked wallet and append the matching ledger entry.
    pub(super) async fn post(
        &self,
        db_tx: &DatabaseTransaction,
        wallet: &mut Wallet,
        posting: Posting,
    ) -> ResultEngine<LedgerEntry> {
        let change = self
            .apply_delta(db_tx, wallet, posting.amount, posting.entry_type, posting.at)
            .await?;
        let entry = LedgerEntry::new(
            wallet.id,
            posting.transaction_id,
            posting.entry_type,
            posting.amount,
            change,
            posting.description,
            posting.reference,
            posting.at,
        );
        self.append_entry(db_tx, &entry).await?;
        Ok(entry)
    }

    async fn apply_delta(
        &self,
        db_tx: &DatabaseTransaction,
        wallet: &mut Wallet,
        amount: i64,
        entry_type: EntryType,
        at: DateTime<Utc>,
    ) -> ResultEngine<crate::BalanceChange> {
        let mut next = wallet.clone();
        let change = next.apply(amount, entry_type)?;
        next.updated_at = at;
        wallets::ActiveModel::from(&next).update(db_tx).await?;
        *wallet = next;
        Ok(change)
    }

    pub(super) async fn save_wallet(
        &self,
        db_tx: &DatabaseTransaction,
        wallet: &Wallet,
    ) -> ResultEngine<()> {
        wallets::ActiveModel::from(wallet).update(db_tx).await?;
        Ok(())
    }
}
