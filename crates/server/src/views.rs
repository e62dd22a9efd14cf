//! Conversions from engine results to the JSON shapes in `api_types`.

use api_types::{
    mission::{GradeView, MissionLogView, MissionView},
    product::{OrderView, ProductView, PurchaseView},
    qr::QrView,
    transaction::{ReceiptView, TransactionView, WalletTransactionView},
    user::{Role as ApiRole, UserView},
    wallet::{Direction, LedgerEntryView, WalletView},
};

pub(crate) fn map_role(role: engine::Role) -> ApiRole {
    match role {
        engine::Role::Admin => ApiRole::Admin,
        engine::Role::Lecturer => ApiRole::Lecturer,
        engine::Role::Student => ApiRole::Student,
    }
}

pub(crate) fn role_from_api(role: ApiRole) -> engine::Role {
    match role {
        ApiRole::Admin => engine::Role::Admin,
        ApiRole::Lecturer => engine::Role::Lecturer,
        ApiRole::Student => engine::Role::Student,
    }
}

fn map_direction(entry_type: engine::EntryType) -> Direction {
    match entry_type {
        engine::EntryType::Credit => Direction::Credit,
        engine::EntryType::Debit => Direction::Debit,
    }
}

pub(crate) fn user_view(user: engine::User) -> UserView {
    UserView {
        id: user.id,
        username: user.username,
        full_name: user.full_name,
        role: map_role(user.role),
        created_at: user.created_at,
    }
}

pub(crate) fn wallet_view(wallet: engine::Wallet) -> WalletView {
    WalletView {
        id: wallet.id,
        user_id: wallet.user_id,
        balance: wallet.balance,
        locked_balance: wallet.locked_balance,
        lifetime_earned: wallet.lifetime_earned,
        lifetime_spent: wallet.lifetime_spent,
        is_frozen: wallet.is_frozen,
        frozen_reason: wallet.frozen_reason,
        frozen_at: wallet.frozen_at,
    }
}

pub(crate) fn entry_view(entry: engine::LedgerEntry) -> LedgerEntryView {
    LedgerEntryView {
        id: entry.id,
        transaction_id: entry.transaction_id,
        entry_type: map_direction(entry.entry_type),
        amount: entry.amount,
        balance_before: entry.balance_before,
        balance_after: entry.balance_after,
        description: entry.description,
        reference_type: entry.reference_type.as_str().to_string(),
        reference_id: entry.reference_id,
        created_at: entry.created_at,
    }
}

pub(crate) fn transaction_view(tx: engine::TransactionRecord) -> TransactionView {
    TransactionView {
        id: tx.id,
        code: tx.code,
        transaction_type: tx.transaction_type.as_str().to_string(),
        status: tx.status.as_str().to_string(),
        amount: tx.amount,
        description: tx.description,
        created_at: tx.created_at,
    }
}

pub(crate) fn wallet_transaction_view(tx: engine::WalletTransaction) -> WalletTransactionView {
    WalletTransactionView {
        transaction: transaction_view(tx.transaction),
        direction: map_direction(tx.direction),
    }
}

pub(crate) fn receipt_view(receipt: engine::Receipt) -> ReceiptView {
    ReceiptView {
        transaction: transaction_view(receipt.transaction),
        entries: receipt.entries.into_iter().map(entry_view).collect(),
        replayed: receipt.replayed,
    }
}

pub(crate) fn qr_view(qr: engine::QrCode) -> QrView {
    QrView {
        id: qr.id,
        code: qr.code,
        qr_type: qr.qr_type.as_str().to_string(),
        creator_id: qr.creator_id,
        amount: qr.amount,
        description: qr.description,
        signature: qr.signature,
        status: qr.status.as_str().to_string(),
        used_by: qr.used_by,
        used_at: qr.used_at,
        product_id: qr.product_id,
        transaction_id: qr.transaction_id,
        expires_at: qr.expires_at,
        created_at: qr.created_at,
    }
}

pub(crate) fn mission_view(mission: engine::Mission) -> MissionView {
    MissionView {
        id: mission.id,
        creator_id: mission.creator_id,
        title: mission.title,
        description: mission.description,
        reward_points: mission.reward_points,
        max_participants: mission.max_participants,
        current_participants: mission.current_participants,
        is_active: mission.is_active,
        is_repeatable: mission.is_repeatable,
    }
}

pub(crate) fn mission_log_view(log: engine::MissionLog) -> MissionLogView {
    // Answers are stored as JSON text; anything unparsable is passed through as a string.
    let answers = log.answers.map(|raw| {
        serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
    });
    MissionLogView {
        id: log.id,
        mission_id: log.mission_id,
        user_id: log.user_id,
        status: log.status.as_str().to_string(),
        score: log.score,
        answers,
        reward_claimed: log.reward_claimed,
        reward_points: log.reward_points,
        started_at: log.started_at,
        submitted_at: log.submitted_at,
        graded_at: log.graded_at,
        notes: log.notes,
    }
}

pub(crate) fn grade_view(outcome: engine::GradeOutcome) -> GradeView {
    GradeView {
        log: mission_log_view(outcome.log),
        receipt: outcome.receipt.map(receipt_view),
        replayed: outcome.replayed,
    }
}

pub(crate) fn product_view(product: engine::Product) -> ProductView {
    ProductView {
        id: product.id,
        seller_id: product.seller_id,
        name: product.name,
        description: product.description,
        price: product.price,
        stock: product.stock,
        is_unlimited: product.is_unlimited,
        sold_count: product.sold_count,
        is_active: product.is_active,
    }
}

pub(crate) fn purchase_view(purchase: engine::PurchaseReceipt) -> PurchaseView {
    let order = purchase.order;
    PurchaseView {
        order: OrderView {
            id: order.id,
            code: order.code,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            product_id: order.product_id,
            quantity: order.quantity,
            unit_price: order.unit_price,
            total_price: order.total_price,
            status: order.status.as_str().to_string(),
            created_at: order.created_at,
        },
        receipt: receipt_view(purchase.receipt),
    }
}
