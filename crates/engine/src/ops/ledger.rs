use sea_orm::{ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{LedgerEntry, ResultEngine, ledger};

use super::Engine;

impl Engine {
    /// Append-only: there is no update or delete counterpart.
    pub(super) async fn append_entry(
        &self,
        db_tx: &DatabaseTransaction,
        entry: &LedgerEntry,
    ) -> ResultEngine<()> {
        ledger::ActiveModel::from(entry).insert(db_tx).await?;
        Ok(())
    }

    pub(super) async fn entries_for_transaction<C: ConnectionTrait>(
        &self,
        db: &C,
        transaction_id: Uuid,
    ) -> ResultEngine<Vec<LedgerEntry>> {
        ledger::Entity::find()
            .filter(ledger::Column::TransactionId.eq(transaction_id.to_string()))
            .order_by_asc(ledger::Column::CreatedAt)
            .order_by_desc(ledger::Column::EntryType)
            .all(db)
            .await?
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect()
    }
}
