use chrono::Utc;
use sea_orm::{DatabaseTransaction, TransactionTrait};

use crate::{
    AdjustBalanceCmd, EngineError, Receipt, ReferenceType, ResultEngine, TransactionRecord,
    TransactionType,
    util::{normalize_required_text, require_idempotency_key},
};

use super::{
    Engine,
    store::{Posting, ensure_creditable, ensure_funds},
    with_tx,
};

impl Engine {
    /// Admin correction of a single wallet by a signed `amount`.
    ///
    /// A negative amount is a debit and may not drive the balance below zero.
    /// Debits ignore the frozen flag: an admin may correct a frozen wallet.
    pub async fn adjust_balance(&self, cmd: AdjustBalanceCmd) -> ResultEngine<Receipt> {
        let key = require_idempotency_key(&cmd.idempotency_key)?;
        let reason = normalize_required_text(&cmd.reason, "reason")?;
        if cmd.amount == 0 {
            return Err(EngineError::InvalidInput(
                "adjustment amount must not be 0".to_string(),
            ));
        }
        if cmd.amount == i64::MIN {
            return Err(EngineError::InvalidInput(
                "adjustment amount out of range".to_string(),
            ));
        }
        if let Some(receipt) = self
            .replay_receipt(&key, cmd.admin_id, TransactionType::Adjustment)
            .await?
        {
            return Ok(receipt);
        }

        let result = with_tx!(self, |db_tx| {
            self.adjust_in_tx(&db_tx, &cmd, &key, reason).await
        });
        let receipt = self
            .settle(result, &key, || {
                self.replay_receipt(&key, cmd.admin_id, TransactionType::Adjustment)
            })
            .await?;
        if !receipt.replayed {
            tracing::info!(
                code = %receipt.transaction.code,
                amount = cmd.amount,
                user = %cmd.user_id,
                "balance adjustment committed"
            );
        }
        Ok(receipt)
    }

    async fn adjust_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        cmd: &AdjustBalanceCmd,
        key: &str,
        reason: String,
    ) -> ResultEngine<Receipt> {
        self.require_admin(db_tx, cmd.admin_id).await?;
        let mut wallet = self.lock_wallet(db_tx, cmd.user_id).await?;
        let amount = cmd.amount.abs();
        let is_credit = cmd.amount > 0;
        if is_credit {
            ensure_creditable(&wallet, self.config.frozen_credit.adjustment)?;
        } else {
            ensure_funds(&wallet, amount)?;
        }

        let now = Utc::now();
        let mut record = TransactionRecord::completed(
            TransactionType::Adjustment,
            key.to_string(),
            cmd.admin_id,
            amount,
            now,
        );
        if is_credit {
            record.to_wallet_id = Some(wallet.id);
        } else {
            record.from_wallet_id = Some(wallet.id);
        }
        record.description = Some(reason.clone());
        self.create_record(db_tx, &mut record).await?;

        let reference = (ReferenceType::Adjustment, record.id);
        let posting = if is_credit {
            Posting::credit(amount, reference, now)
        } else {
            Posting::debit(amount, reference, now)
        };
        let entry = self
            .post(
                db_tx,
                &mut wallet,
                posting.transaction(record.id).description(Some(reason)),
            )
            .await?;

        Ok(Receipt {
            transaction: record,
            entries: vec![entry],
            replayed: false,
        })
    }
}
