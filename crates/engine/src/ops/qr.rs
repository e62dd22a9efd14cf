//! QR codes: issuing, reading, cancelling and paying.

use chrono::{Duration, Utc};
use sea_orm::{DatabaseTransaction, QueryFilter, QuerySelect, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    CreateQrCmd, EngineError, QrCode, QrPaymentCmd, QrStatus, Receipt, ReferenceType,
    ResultEngine, Role, TransactionRecord, TransactionType, products, qr_codes, signature,
    util::{
        normalize_optional_text, normalize_required_text, require_idempotency_key,
        require_positive,
    },
};

use super::{
    Engine,
    store::{Posting, ensure_creditable, ensure_debitable, ensure_funds},
    with_tx,
};

/// What a payment attempt did to the code.
enum QrStep {
    Paid(Receipt),
    /// The code was past its expiry and has been flipped to EXPIRED. The flip
    /// is committed even though the payment is refused.
    Expired(QrCode),
}

impl Engine {
    /// Issue a single-use code payable to `cmd.creator_id`. Only lecturers
    /// issue codes.
    pub async fn create_qr(&self, cmd: CreateQrCmd) -> ResultEngine<QrCode> {
        let amount = require_positive(cmd.amount, "amount")?;
        let description = normalize_optional_text(cmd.description.as_deref());
        with_tx!(self, |db_tx| {
            self.require_role(&db_tx, cmd.creator_id, &[Role::Lecturer])
                .await?;
            if let Some(product_id) = cmd.product_id {
                let product = products::Entity::find_by_id(product_id.to_string())
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| EngineError::NotFound("product not exists".to_string()))?;
                if product.seller_id != cmd.creator_id.to_string() {
                    return Err(EngineError::Forbidden(
                        "only the seller can issue a product code".to_string(),
                    ));
                }
                if !product.is_active {
                    return Err(EngineError::InvalidState(
                        "product is not active".to_string(),
                    ));
                }
            }

            let now = Utc::now();
            let code = Uuid::new_v4().to_string();
            let signature = signature::sign(
                &code,
                amount,
                cmd.creator_id,
                self.config.qr_signing_secret.as_bytes(),
            )?;
            let qr = QrCode {
                id: Uuid::new_v4(),
                code,
                qr_type: cmd.qr_type,
                creator_id: cmd.creator_id,
                amount,
                description,
                signature,
                status: QrStatus::Active,
                is_single_use: true,
                max_uses: 1,
                current_uses: 0,
                used_by: None,
                used_at: None,
                product_id: cmd.product_id,
                transaction_id: None,
                expires_at: now + Duration::minutes(self.config.qr_expiry_minutes),
                created_at: now,
                updated_at: now,
            };
            qr_codes::ActiveModel::from(&qr).insert(&db_tx).await?;
            Ok(qr)
        })
    }

    /// Creator-only detail read. An ACTIVE code past its expiry is flipped to
    /// EXPIRED here.
    pub async fn qr(&self, code: &str, viewer_id: Uuid) -> ResultEngine<QrCode> {
        let code = normalize_required_text(code, "qr code")?;
        with_tx!(self, |db_tx| {
            let mut qr = self.lock_qr_by_code(&db_tx, &code).await?;
            if qr.creator_id != viewer_id {
                return Err(EngineError::Forbidden(
                    "only the creator can view this qr code".to_string(),
                ));
            }
            if qr.is_due_to_expire(Utc::now()) {
                self.expire_qr(&db_tx, &mut qr).await?;
            }
            Ok(qr)
        })
    }

    /// Cancel an ACTIVE code. Only its creator may do so.
    pub async fn cancel_qr(&self, qr_id: Uuid, creator_id: Uuid) -> ResultEngine<QrCode> {
        with_tx!(self, |db_tx| {
            let model = qr_codes::Entity::find_by_id(qr_id.to_string())
                .lock_exclusive()
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("qr code not exists".to_string()))?;
            let mut qr = QrCode::try_from(model)?;
            if qr.creator_id != creator_id {
                return Err(EngineError::Forbidden(
                    "only the creator can cancel this qr code".to_string(),
                ));
            }
            if qr.status != QrStatus::Active {
                return Err(EngineError::InvalidState(format!(
                    "qr code is {}",
                    qr.status.as_str()
                )));
            }
            qr.status = QrStatus::Cancelled;
            qr.updated_at = Utc::now();
            qr_codes::ActiveModel::from(&qr).update(&db_tx).await?;
            Ok(qr)
        })
    }

    /// Pay a scanned code: the payer's wallet is debited the code amount and
    /// the creator's wallet credited, and the code becomes USED.
    ///
    /// Checks, in order: signature, expiry, status, self-payment, then the
    /// usual transfer preconditions.
    pub async fn pay_qr(&self, cmd: QrPaymentCmd) -> ResultEngine<Receipt> {
        let key = require_idempotency_key(&cmd.idempotency_key)?;
        let code = normalize_required_text(&cmd.code, "qr code")?;
        if let Some(receipt) = self
            .replay_receipt(&key, cmd.payer_id, TransactionType::QrPayment)
            .await?
        {
            return Ok(receipt);
        }

        let step = with_tx!(self, |db_tx| {
            self.pay_qr_in_tx(&db_tx, cmd.payer_id, &code, &key).await
        });
        let result = match step {
            Ok(QrStep::Paid(receipt)) => Ok(receipt),
            Ok(QrStep::Expired(qr)) => Err(EngineError::Expired(format!(
                "qr code expired at {}",
                qr.expires_at
            ))),
            Err(err) => Err(err),
        };
        let receipt = self
            .settle(result, &key, || {
                self.replay_receipt(&key, cmd.payer_id, TransactionType::QrPayment)
            })
            .await?;
        if !receipt.replayed {
            tracing::info!(
                code = %receipt.transaction.code,
                amount = receipt.transaction.amount,
                "qr payment committed"
            );
        }
        Ok(receipt)
    }

    async fn pay_qr_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        payer_id: Uuid,
        code: &str,
        key: &str,
    ) -> ResultEngine<QrStep> {
        let mut qr = self.lock_qr_by_code(db_tx, code).await?;
        if !signature::verify(
            &qr.code,
            qr.amount,
            qr.creator_id,
            &qr.signature,
            self.config.qr_signing_secret.as_bytes(),
        ) {
            return Err(EngineError::SignatureInvalid(
                "qr signature does not match".to_string(),
            ));
        }

        let now = Utc::now();
        if qr.status == QrStatus::Expired {
            return Err(EngineError::Expired(format!(
                "qr code expired at {}",
                qr.expires_at
            )));
        }
        if qr.is_due_to_expire(now) {
            self.expire_qr(db_tx, &mut qr).await?;
            return Ok(QrStep::Expired(qr));
        }
        match qr.status {
            QrStatus::Active => {}
            QrStatus::Used => {
                return Err(EngineError::InvalidState("qr already used".to_string()));
            }
            other => {
                return Err(EngineError::InvalidState(format!(
                    "qr code is {}",
                    other.as_str()
                )));
            }
        }
        if qr.creator_id == payer_id {
            return Err(EngineError::SelfTargeting(
                "cannot pay your own qr code".to_string(),
            ));
        }

        let mut locked = self.lock_wallets(db_tx, &[payer_id, qr.creator_id]).await?;
        let (mut payer, mut payee) = match (locked.pop(), locked.pop()) {
            (Some(payee), Some(payer)) => (payer, payee),
            _ => return Err(EngineError::NotFound("wallet not exists".to_string())),
        };
        ensure_debitable(&payer)?;
        ensure_funds(&payer, qr.amount)?;
        ensure_creditable(&payee, self.config.frozen_credit.qr_payment)?;

        let mut record = TransactionRecord::completed(
            TransactionType::QrPayment,
            key.to_string(),
            payer_id,
            qr.amount,
            now,
        );
        record.from_wallet_id = Some(payer.id);
        record.to_wallet_id = Some(payee.id);
        record.description = qr.description.clone();
        record.qr_code_id = Some(qr.id);
        self.create_record(db_tx, &mut record).await?;

        let reference = (ReferenceType::QrPayment, qr.id);
        let debit = self
            .post(
                db_tx,
                &mut payer,
                Posting::debit(qr.amount, reference, now)
                    .transaction(record.id)
                    .description(Some("QR payment".to_string())),
            )
            .await?;
        let credit = self
            .post(
                db_tx,
                &mut payee,
                Posting::credit(qr.amount, reference, now)
                    .transaction(record.id)
                    .description(Some("QR payment received".to_string())),
            )
            .await?;

        qr.status = QrStatus::Used;
        qr.used_by = Some(payer_id);
        qr.used_at = Some(now);
        qr.current_uses += 1;
        qr.transaction_id = Some(record.id);
        qr.updated_at = now;
        qr_codes::ActiveModel::from(&qr).update(db_tx).await?;

        Ok(QrStep::Paid(Receipt {
            transaction: record,
            entries: vec![debit, credit],
            replayed: false,
        }))
    }

    async fn lock_qr_by_code(
        &self,
        db_tx: &DatabaseTransaction,
        code: &str,
    ) -> ResultEngine<QrCode> {
        let model = qr_codes::Entity::find()
            .filter(qr_codes::Column::Code.eq(code.to_string()))
            .lock_exclusive()
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("qr code not exists".to_string()))?;
        QrCode::try_from(model)
    }

    async fn expire_qr(&self, db_tx: &DatabaseTransaction, qr: &mut QrCode) -> ResultEngine<()> {
        qr.status = QrStatus::Expired;
        qr.updated_at = Utc::now();
        qr_codes::ActiveModel::from(&*qr).update(db_tx).await?;
        tracing::warn!(code = %qr.code, "qr code expired");
        Ok(())
    }
}
