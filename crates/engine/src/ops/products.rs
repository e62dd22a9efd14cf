//! Marketplace: products and the purchase flow.

use chrono::Utc;
use sea_orm::{DatabaseTransaction, QueryFilter, QuerySelect, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    CreateProductCmd, EngineError, Order, OrderStatus, Product, PurchaseCmd, PurchaseReceipt,
    Receipt, ReferenceType, ResultEngine, Role, TransactionRecord, TransactionType, orders,
    products,
    util::{
        normalize_optional_text, normalize_required_text, readable_code,
        require_idempotency_key, require_positive,
    },
};

use super::{
    Engine,
    store::{Posting, ensure_creditable, ensure_debitable, ensure_funds},
    with_tx,
};

impl Engine {
    /// Lecturers and admins list products for sale.
    pub async fn create_product(&self, cmd: CreateProductCmd) -> ResultEngine<Product> {
        let name = normalize_required_text(&cmd.name, "name")?;
        let price = require_positive(cmd.price, "price")?;
        if cmd.stock < 0 {
            return Err(EngineError::InvalidInput("stock must be >= 0".to_string()));
        }
        with_tx!(self, |db_tx| {
            self.require_role(&db_tx, cmd.seller_id, &[Role::Lecturer, Role::Admin])
                .await?;
            let now = Utc::now();
            let product = Product {
                id: Uuid::new_v4(),
                seller_id: cmd.seller_id,
                name,
                description: normalize_optional_text(cmd.description.as_deref()),
                price,
                stock: cmd.stock,
                is_unlimited: cmd.is_unlimited,
                sold_count: 0,
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            products::ActiveModel::from(&product).insert(&db_tx).await?;
            Ok(product)
        })
    }

    pub async fn product(&self, product_id: Uuid) -> ResultEngine<Product> {
        let model = products::Entity::find_by_id(product_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound("product not exists".to_string()))?;
        Product::try_from(model)
    }

    /// Take a product off sale. Its seller or an admin may do so; orders
    /// already placed are kept.
    pub async fn deactivate_product(
        &self,
        product_id: Uuid,
        actor_id: Uuid,
    ) -> ResultEngine<Product> {
        with_tx!(self, |db_tx| {
            let actor = self.require_user(&db_tx, actor_id).await?;
            let model = products::Entity::find_by_id(product_id.to_string())
                .lock_exclusive()
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("product not exists".to_string()))?;
            let mut product = Product::try_from(model)?;
            if product.seller_id != actor.id && actor.role != Role::Admin {
                return Err(EngineError::Forbidden(
                    "only the seller can deactivate this product".to_string(),
                ));
            }
            if !product.is_active {
                return Err(EngineError::InvalidState(
                    "product is already inactive".to_string(),
                ));
            }
            product.is_active = false;
            product.updated_at = Utc::now();
            products::ActiveModel::from(&product).update(&db_tx).await?;
            tracing::info!(product = %product.id, "product deactivated");
            Ok(product)
        })
    }

    /// Buy `quantity` units: the buyer pays `price × quantity` to the seller
    /// and a COMPLETED order is written with the transaction.
    pub async fn purchase(&self, cmd: PurchaseCmd) -> ResultEngine<PurchaseReceipt> {
        let key = require_idempotency_key(&cmd.idempotency_key)?;
        let quantity = require_positive(cmd.quantity, "quantity")?;
        if let Some(receipt) = self.replay_purchase(&key, cmd.buyer_id).await? {
            return Ok(receipt);
        }

        let result = with_tx!(self, |db_tx| {
            self.purchase_in_tx(&db_tx, &cmd, &key, quantity).await
        });
        let purchase = self
            .settle(result, &key, || self.replay_purchase(&key, cmd.buyer_id))
            .await?;
        if !purchase.receipt.replayed {
            tracing::info!(
                code = %purchase.receipt.transaction.code,
                order = %purchase.order.code,
                amount = purchase.order.total_price,
                "purchase committed"
            );
        }
        Ok(purchase)
    }

    async fn purchase_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        cmd: &PurchaseCmd,
        key: &str,
        quantity: i64,
    ) -> ResultEngine<PurchaseReceipt> {
        let model = products::Entity::find_by_id(cmd.product_id.to_string())
            .lock_exclusive()
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("product not exists".to_string()))?;
        let mut product = Product::try_from(model)?;
        if !product.is_active {
            return Err(EngineError::InvalidState("product is not active".to_string()));
        }
        if product.seller_id == cmd.buyer_id {
            return Err(EngineError::SelfTargeting(
                "cannot buy your own product".to_string(),
            ));
        }
        if !product.has_stock_for(quantity) {
            return Err(EngineError::InvalidState(format!(
                "only {} left in stock",
                product.stock
            )));
        }
        let total = product
            .price
            .checked_mul(quantity)
            .ok_or_else(|| EngineError::InvalidInput("order total overflows".to_string()))?;

        let mut locked = self
            .lock_wallets(db_tx, &[cmd.buyer_id, product.seller_id])
            .await?;
        let (mut buyer, mut seller) = match (locked.pop(), locked.pop()) {
            (Some(seller), Some(buyer)) => (buyer, seller),
            _ => return Err(EngineError::NotFound("wallet not exists".to_string())),
        };
        ensure_debitable(&buyer)?;
        ensure_funds(&buyer, total)?;
        ensure_creditable(&seller, self.config.frozen_credit.purchase)?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let mut record = TransactionRecord::completed(
            TransactionType::Purchase,
            key.to_string(),
            cmd.buyer_id,
            total,
            now,
        );
        record.from_wallet_id = Some(buyer.id);
        record.to_wallet_id = Some(seller.id);
        record.description = Some(format!("Purchase: {}", product.name));
        record.order_id = Some(order_id);
        self.create_record(db_tx, &mut record).await?;

        let order = Order {
            id: order_id,
            code: readable_code("ORD", now),
            buyer_id: cmd.buyer_id,
            seller_id: product.seller_id,
            product_id: product.id,
            quantity,
            unit_price: product.price,
            total_price: total,
            status: OrderStatus::Completed,
            transaction_id: Some(record.id),
            created_at: now,
        };
        orders::ActiveModel::from(&order).insert(db_tx).await?;

        let reference = (ReferenceType::Order, order.id);
        let debit = self
            .post(
                db_tx,
                &mut buyer,
                Posting::debit(total, reference, now)
                    .transaction(record.id)
                    .description(record.description.clone()),
            )
            .await?;
        let credit = self
            .post(
                db_tx,
                &mut seller,
                Posting::credit(total, reference, now)
                    .transaction(record.id)
                    .description(record.description.clone()),
            )
            .await?;

        if !product.is_unlimited {
            product.stock -= quantity;
            product.sold_count += quantity;
            product.updated_at = now;
            products::ActiveModel::from(&product).update(db_tx).await?;
        }

        Ok(PurchaseReceipt {
            receipt: Receipt {
                transaction: record,
                entries: vec![debit, credit],
                replayed: false,
            },
            order,
        })
    }

    async fn replay_purchase(
        &self,
        key: &str,
        buyer_id: Uuid,
    ) -> ResultEngine<Option<PurchaseReceipt>> {
        let Some(receipt) = self
            .replay_receipt(key, buyer_id, TransactionType::Purchase)
            .await?
        else {
            return Ok(None);
        };
        let model = orders::Entity::find()
            .filter(orders::Column::TransactionId.eq(receipt.transaction.id.to_string()))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound("order not exists".to_string()))?;
        Ok(Some(PurchaseReceipt {
            receipt,
            order: Order::try_from(model)?,
        }))
    }
}
