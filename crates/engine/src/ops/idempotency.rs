//! Transaction log: idempotency lookups, record creation and race settlement.
//!
//! Every money-moving flow looks its key up before opening the unit of work.
//! Two racing requests with the same key both miss that lookup; the UNIQUE
//! index on `transactions.idempotency_key` then rejects the loser's insert and
//! [`Engine::settle`] turns that rejection into a replay of the winner.
//!
//! Flows that lock a QR code, product or mission log first never reach that
//! insert: the loser waits on the row lock and then fails validation against
//! the state the winner left behind. `settle` replays the winner for those
//! failures too, as long as the key is on record by the time it looks.

use std::future::Future;

use sea_orm::{ConnectionTrait, DatabaseTransaction, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Receipt, ResultEngine, TransactionRecord, TransactionType, mission_logs,
    transactions, util::readable_code,
};

use super::Engine;

const CODE_ATTEMPTS: usize = 5;

impl Engine {
    pub(super) async fn find_by_idempotency_key<C: ConnectionTrait>(
        &self,
        db: &C,
        key: &str,
    ) -> ResultEngine<Option<TransactionRecord>> {
        transactions::Entity::find()
            .filter(transactions::Column::IdempotencyKey.eq(key.to_string()))
            .one(db)
            .await?
            .map(TransactionRecord::try_from)
            .transpose()
    }

    /// Insert `record`, redrawing its readable code while another record
    /// already holds it.
    pub(super) async fn create_record(
        &self,
        db_tx: &DatabaseTransaction,
        record: &mut TransactionRecord,
    ) -> ResultEngine<()> {
        for _ in 0..CODE_ATTEMPTS {
            let taken = transactions::Entity::find()
                .filter(transactions::Column::Code.eq(record.code.clone()))
                .one(db_tx)
                .await?
                .is_some();
            if !taken {
                transactions::ActiveModel::from(&*record).insert(db_tx).await?;
                return Ok(());
            }
            tracing::debug!(code = %record.code, "transaction code collision, redrawing");
            record.code = readable_code(record.transaction_type.code_prefix(), record.created_at);
        }
        Err(EngineError::InvalidState(
            "could not allocate a unique transaction code".to_string(),
        ))
    }

    pub(super) async fn receipt_for<C: ConnectionTrait>(
        &self,
        db: &C,
        transaction: TransactionRecord,
        replayed: bool,
    ) -> ResultEngine<Receipt> {
        let entries = self.entries_for_transaction(db, transaction.id).await?;
        Ok(Receipt {
            transaction,
            entries,
            replayed,
        })
    }

    /// Stored outcome of `key`, if `initiated_by` already ran a
    /// `transaction_type` request with it.
    ///
    /// A key that belongs to someone else, to another kind of operation, or to
    /// a mission grading, is a `DuplicateRequest`.
    pub(super) async fn replay_receipt(
        &self,
        key: &str,
        initiated_by: Uuid,
        transaction_type: TransactionType,
    ) -> ResultEngine<Option<Receipt>> {
        let Some(record) = self.find_by_idempotency_key(&self.database, key).await? else {
            let graded = mission_logs::Entity::find()
                .filter(mission_logs::Column::GradeIdempotencyKey.eq(key.to_string()))
                .one(&self.database)
                .await?;
            if graded.is_some() {
                return Err(EngineError::DuplicateRequest(format!(
                    "idempotency key {key} already used for another request"
                )));
            }
            return Ok(None);
        };
        record.ensure_replayable(initiated_by, transaction_type)?;
        tracing::debug!(key, code = %record.code, "idempotent replay");
        self.receipt_for(&self.database, record, true).await.map(Some)
    }

    /// Resolve the outcome of a unit of work that may have lost an
    /// idempotency race.
    ///
    /// A unique violation with no stored winner is returned as is. Any other
    /// failure is returned unless a request with the same key committed
    /// meanwhile, in which case its outcome wins.
    pub(super) async fn settle<T, F, Fut>(
        &self,
        result: ResultEngine<T>,
        key: &str,
        replay: F,
    ) -> ResultEngine<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResultEngine<Option<T>>>,
    {
        match result {
            Ok(value) => Ok(value),
            Err(err) if err.is_unique_violation() => match replay().await? {
                Some(winner) => {
                    tracing::warn!(key, "lost idempotency race, returning the stored outcome");
                    Ok(winner)
                }
                None => Err(err),
            },
            Err(err) => match replay().await {
                Ok(Some(winner)) => {
                    tracing::warn!(
                        key,
                        "request failed after a concurrent one with the same key committed, \
                         returning the stored outcome"
                    );
                    Ok(winner)
                }
                _ => Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use migration::MigratorTrait;
    use sea_orm::{Database, TransactionTrait};
    use uuid::Uuid;

    use crate::{EngineConfig, TransactionRecord, TransactionType};

    use super::Engine;

    async fn engine() -> Engine {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        Engine::builder()
            .database(db)
            .config(EngineConfig::new("test-secret"))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn colliding_code_is_redrawn() {
        let engine = engine().await;
        let now = Utc::now();
        let mut first = TransactionRecord::completed(
            TransactionType::Adjustment,
            "first".to_string(),
            Uuid::new_v4(),
            5,
            now,
        );
        let mut second = TransactionRecord::completed(
            TransactionType::Adjustment,
            "second".to_string(),
            Uuid::new_v4(),
            5,
            now,
        );
        second.code = first.code.clone();

        let db_tx = engine.database.begin().await.unwrap();
        engine.create_record(&db_tx, &mut first).await.unwrap();
        engine.create_record(&db_tx, &mut second).await.unwrap();
        db_tx.commit().await.unwrap();

        assert_ne!(first.code, second.code);
        assert!(second.code.starts_with("ADJ-"));
    }

    #[tokio::test]
    async fn failure_without_a_stored_winner_is_kept() {
        let engine = engine().await;
        let result: crate::ResultEngine<u8> =
            Err(crate::EngineError::InvalidState("qr already used".to_string()));
        let err = engine
            .settle(result, "k", || async { Ok(None) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidState);

        let result: crate::ResultEngine<u8> =
            Err(crate::EngineError::InvalidState("qr already used".to_string()));
        let winner = engine
            .settle(result, "k", || async { Ok(Some(7)) })
            .await
            .unwrap();
        assert_eq!(winner, 7);
    }
}
