use chrono::Utc;
use sea_orm::{Condition, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, EntryType, LedgerEntry, Page, ResultEngine, TransactionRecord, Wallet,
    WalletTransaction, ledger, transactions,
    util::normalize_required_text,
};

use super::{Engine, with_tx};

impl Engine {
    /// Return a wallet snapshot from DB.
    pub async fn wallet(&self, user_id: Uuid) -> ResultEngine<Wallet> {
        self.wallet_of(&self.database, user_id).await
    }

    /// Ledger entries of the user's wallet, newest first.
    pub async fn ledger(&self, user_id: Uuid, page: Page) -> ResultEngine<Vec<LedgerEntry>> {
        let wallet = self.wallet_of(&self.database, user_id).await?;
        ledger::Entity::find()
            .filter(ledger::Column::WalletId.eq(wallet.id.to_string()))
            .order_by_desc(ledger::Column::CreatedAt)
            .order_by_asc(ledger::Column::EntryType)
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.database)
            .await?
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect()
    }

    /// Transactions touching the user's wallet, newest first, each with its
    /// direction from the wallet's point of view.
    pub async fn transactions(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> ResultEngine<Vec<WalletTransaction>> {
        let wallet = self.wallet_of(&self.database, user_id).await?;
        let wallet_id = wallet.id.to_string();
        let models = transactions::Entity::find()
            .filter(
                Condition::any()
                    .add(transactions::Column::FromWalletId.eq(wallet_id.clone()))
                    .add(transactions::Column::ToWalletId.eq(wallet_id)),
            )
            .order_by_desc(transactions::Column::CreatedAt)
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.database)
            .await?;

        models
            .into_iter()
            .map(|model| {
                let transaction = TransactionRecord::try_from(model)?;
                let direction = if transaction.from_wallet_id == Some(wallet.id) {
                    EntryType::Debit
                } else {
                    EntryType::Credit
                };
                Ok(WalletTransaction {
                    transaction,
                    direction,
                })
            })
            .collect()
    }

    /// Freeze a wallet. Admin only.
    pub async fn freeze_wallet(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        reason: &str,
    ) -> ResultEngine<Wallet> {
        let reason = normalize_required_text(reason, "reason")?;
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, admin_id).await?;
            let mut wallet = self.lock_wallet(&db_tx, user_id).await?;
            if wallet.is_frozen {
                return Err(EngineError::InvalidState("wallet already frozen".to_string()));
            }
            let now = Utc::now();
            wallet.is_frozen = true;
            wallet.frozen_reason = Some(reason);
            wallet.frozen_at = Some(now);
            wallet.frozen_by = Some(admin_id);
            wallet.updated_at = now;
            self.save_wallet(&db_tx, &wallet).await?;
            tracing::info!(wallet = %wallet.id, by = %admin_id, "wallet frozen");
            Ok(wallet)
        })
    }

    /// Lift a freeze. Admin only.
    pub async fn unfreeze_wallet(&self, admin_id: Uuid, user_id: Uuid) -> ResultEngine<Wallet> {
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, admin_id).await?;
            let mut wallet = self.lock_wallet(&db_tx, user_id).await?;
            if !wallet.is_frozen {
                return Err(EngineError::InvalidState("wallet is not frozen".to_string()));
            }
            wallet.is_frozen = false;
            wallet.frozen_reason = None;
            wallet.frozen_at = None;
            wallet.frozen_by = None;
            wallet.updated_at = Utc::now();
            self.save_wallet(&db_tx, &wallet).await?;
            tracing::info!(wallet = %wallet.id, by = %admin_id, "wallet unfrozen");
            Ok(wallet)
        })
    }
}
