use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine code, e.g. `INSUFFICIENT_BALANCE`.
    pub code: String,
    pub error: String,
}

/// Offset pagination for listings, one-based.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

pub mod user {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Role {
        Admin,
        Lecturer,
        Student,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserNew {
        pub username: String,
        pub full_name: String,
        pub role: Role,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserView {
        pub id: Uuid,
        pub username: String,
        pub full_name: String,
        pub role: Role,
        pub created_at: DateTime<Utc>,
    }
}

pub mod wallet {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WalletView {
        pub id: Uuid,
        pub user_id: Uuid,
        pub balance: i64,
        pub locked_balance: i64,
        pub lifetime_earned: i64,
        pub lifetime_spent: i64,
        pub is_frozen: bool,
        pub frozen_reason: Option<String>,
        pub frozen_at: Option<DateTime<Utc>>,
    }

    /// Side of a movement from one wallet's point of view.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "UPPERCASE")]
    pub enum Direction {
        Credit,
        Debit,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LedgerEntryView {
        pub id: Uuid,
        pub transaction_id: Option<Uuid>,
        pub entry_type: Direction,
        pub amount: i64,
        pub balance_before: i64,
        pub balance_after: i64,
        pub description: Option<String>,
        /// One of `transfer`, `qr_payment`, `mission_log`, `order`, `adjustment`.
        pub reference_type: String,
        pub reference_id: Uuid,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LedgerResponse {
        pub entries: Vec<LedgerEntryView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FreezeWallet {
        pub reason: String,
    }
}

pub mod transaction {
    use super::*;
    use crate::wallet::{Direction, LedgerEntryView};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        pub code: String,
        /// e.g. `TRANSFER`, `QR_PAYMENT`, `MISSION_REWARD`, `PURCHASE`, `ADJUSTMENT`.
        pub transaction_type: String,
        pub status: String,
        pub amount: i64,
        pub description: Option<String>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WalletTransactionView {
        #[serde(flatten)]
        pub transaction: TransactionView,
        pub direction: Direction,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub transactions: Vec<WalletTransactionView>,
    }

    /// Result of a money-moving request.
    ///
    /// `replayed` is true when the idempotency key matched an earlier request.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReceiptView {
        pub transaction: TransactionView,
        pub entries: Vec<LedgerEntryView>,
        pub replayed: bool,
    }

    /// Body of `POST /transfers`. The idempotency key travels in the
    /// `idempotency-key` header.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferNew {
        pub to_user_id: Uuid,
        pub amount: i64,
        pub description: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AdjustmentNew {
        pub user_id: Uuid,
        /// Signed: negative amounts debit the wallet.
        pub amount: i64,
        pub reason: String,
    }
}

pub mod qr {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct QrNew {
        pub amount: i64,
        pub description: Option<String>,
        /// Turns the code into a checkout code for one of the creator's products.
        pub product_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct QrView {
        pub id: Uuid,
        pub code: String,
        pub qr_type: String,
        pub creator_id: Uuid,
        pub amount: i64,
        pub description: Option<String>,
        pub signature: String,
        pub status: String,
        pub used_by: Option<Uuid>,
        pub used_at: Option<DateTime<Utc>>,
        pub product_id: Option<Uuid>,
        pub transaction_id: Option<Uuid>,
        pub expires_at: DateTime<Utc>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct QrPay {
        pub code: String,
    }
}

pub mod mission {
    use super::*;
    use crate::transaction::ReceiptView;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MissionNew {
        pub title: String,
        pub description: Option<String>,
        pub reward_points: i64,
        pub max_participants: Option<i32>,
        #[serde(default)]
        pub is_repeatable: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MissionView {
        pub id: Uuid,
        pub creator_id: Uuid,
        pub title: String,
        pub description: Option<String>,
        pub reward_points: i64,
        pub max_participants: Option<i32>,
        pub current_participants: i32,
        pub is_active: bool,
        pub is_repeatable: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MissionLogView {
        pub id: Uuid,
        pub mission_id: Uuid,
        pub user_id: Uuid,
        pub status: String,
        pub score: Option<f64>,
        pub answers: Option<serde_json::Value>,
        pub reward_claimed: bool,
        pub reward_points: Option<i64>,
        pub started_at: DateTime<Utc>,
        pub submitted_at: Option<DateTime<Utc>>,
        pub graded_at: Option<DateTime<Utc>>,
        pub notes: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct MissionSubmit {
        pub answers: Option<serde_json::Value>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MissionGrade {
        pub approved: bool,
        pub score: Option<f64>,
        pub notes: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GradeView {
        pub log: MissionLogView,
        pub receipt: Option<ReceiptView>,
        pub replayed: bool,
    }
}

pub mod product {
    use super::*;
    use crate::transaction::ReceiptView;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProductNew {
        pub name: String,
        pub description: Option<String>,
        pub price: i64,
        #[serde(default)]
        pub stock: i64,
        #[serde(default)]
        pub is_unlimited: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProductView {
        pub id: Uuid,
        pub seller_id: Uuid,
        pub name: String,
        pub description: Option<String>,
        pub price: i64,
        pub stock: i64,
        pub is_unlimited: bool,
        pub sold_count: i64,
        pub is_active: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PurchaseNew {
        pub quantity: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct OrderView {
        pub id: Uuid,
        pub code: String,
        pub buyer_id: Uuid,
        pub seller_id: Uuid,
        pub product_id: Uuid,
        pub quantity: i64,
        pub unit_price: i64,
        pub total_price: i64,
        pub status: String,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PurchaseView {
        pub order: OrderView,
        pub receipt: ReceiptView,
    }
}
