use chrono::Utc;
use sea_orm::{DatabaseTransaction, TransactionTrait};

use crate::{
    EngineError, Receipt, ReferenceType, ResultEngine, TransactionRecord, TransactionType,
    TransferCmd,
    util::{normalize_optional_text, require_idempotency_key, require_positive},
};

use super::{
    Engine,
    store::{Posting, ensure_creditable, ensure_debitable, ensure_funds},
    with_tx,
};

impl Engine {
    /// Move `amount` points between two users' wallets.
    ///
    /// Rejects self-transfers, a frozen source, a frozen destination (unless
    /// the transfer policy allows frozen credits) and insufficient balance.
    pub async fn transfer(&self, cmd: TransferCmd) -> ResultEngine<Receipt> {
        let key = require_idempotency_key(&cmd.idempotency_key)?;
        let amount = require_positive(cmd.amount, "amount")?;
        if cmd.from_user_id == cmd.to_user_id {
            return Err(EngineError::SelfTargeting(
                "cannot transfer to yourself".to_string(),
            ));
        }
        if let Some(receipt) = self
            .replay_receipt(&key, cmd.from_user_id, TransactionType::Transfer)
            .await?
        {
            return Ok(receipt);
        }

        let description = normalize_optional_text(cmd.description.as_deref());
        let result = with_tx!(self, |db_tx| {
            self.transfer_in_tx(&db_tx, &cmd, &key, amount, description)
                .await
        });
        let receipt = self
            .settle(result, &key, || {
                self.replay_receipt(&key, cmd.from_user_id, TransactionType::Transfer)
            })
            .await?;
        if !receipt.replayed {
            tracing::info!(
                code = %receipt.transaction.code,
                amount,
                "transfer committed"
            );
        }
        Ok(receipt)
    }

    async fn transfer_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        cmd: &TransferCmd,
        key: &str,
        amount: i64,
        description: Option<String>,
    ) -> ResultEngine<Receipt> {
        let now = Utc::now();
        let mut locked = self
            .lock_wallets(db_tx, &[cmd.from_user_id, cmd.to_user_id])
            .await?;
        let (mut payer, mut payee) = match (locked.pop(), locked.pop()) {
            (Some(payee), Some(payer)) => (payer, payee),
            _ => return Err(EngineError::NotFound("wallet not exists".to_string())),
        };
        ensure_debitable(&payer)?;
        ensure_funds(&payer, amount)?;
        ensure_creditable(&payee, self.config.frozen_credit.transfer)?;

        let mut record = TransactionRecord::completed(
            TransactionType::Transfer,
            key.to_string(),
            cmd.from_user_id,
            amount,
            now,
        );
        record.from_wallet_id = Some(payer.id);
        record.to_wallet_id = Some(payee.id);
        record.description = description.clone();
        self.create_record(db_tx, &mut record).await?;

        let reference = (ReferenceType::Transfer, record.id);
        let debit = self
            .post(
                db_tx,
                &mut payer,
                Posting::debit(amount, reference, now)
                    .transaction(record.id)
                    .description(description.clone()),
            )
            .await?;
        let credit = self
            .post(
                db_tx,
                &mut payee,
                Posting::credit(amount, reference, now)
                    .transaction(record.id)
                    .description(description),
            )
            .await?;

        Ok(Receipt {
            transaction: record,
            entries: vec![debit, credit],
            replayed: false,
        })
    }
}
